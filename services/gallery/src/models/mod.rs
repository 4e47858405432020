//! Gallery domain models

pub mod asset;
pub mod chat;
pub mod identity;

// Re-export for convenience
pub use asset::{Asset, NewAsset, Upload};
pub use chat::ChatBinding;
pub use identity::{Identity, IdentityId, LoginCredentials, NewIdentity};
