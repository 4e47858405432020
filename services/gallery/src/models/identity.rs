//! Identity model and related payloads

use serde::{Deserialize, Serialize};

/// Numeric identifier of a primary account
pub type IdentityId = i64;

/// Primary account
///
/// `asset_urls` is derived from the identity's uploads when the identity is
/// fetched; it is never persisted. The password is accepted on input but is
/// never serialised back out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub id: IdentityId,
    pub name: String,
    pub login: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_deserializing)]
    pub asset_urls: Vec<String>,
}

/// Registration payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIdentity {
    pub name: String,
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub description: String,
}

impl NewIdentity {
    /// The identity as stored before an id is assigned
    pub fn into_identity(self) -> Identity {
        Identity {
            id: 0,
            name: self.name,
            login: self.login,
            password: self.password,
            description: self.description,
            asset_urls: Vec::new(),
        }
    }
}

/// Login credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub login: String,
    pub password: String,
}
