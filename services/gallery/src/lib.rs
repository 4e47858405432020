//! Gallery service
//!
//! Identities, image uploads and a chat front end that shows a user's images
//! once their chat account is linked to the identity.

pub mod bot;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod state;
pub mod validation;
