//! Asset model: one uploaded image

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identity::IdentityId;

/// Metadata record of an uploaded object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: i64,
    pub identity_id: IdentityId,
    /// Object key, generated server side
    pub stored_name: String,
    pub extension: String,
}

/// Metadata record about to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAsset {
    pub identity_id: IdentityId,
    pub stored_name: String,
    pub extension: String,
}

impl NewAsset {
    /// Build a record with a fresh collision-resistant stored name
    ///
    /// The name is a random UUID followed by the caller's extension, which is
    /// used verbatim (including its leading dot, if any).
    pub fn generate(identity_id: IdentityId, extension: &str) -> Self {
        Self {
            identity_id,
            stored_name: format!("{}{}", Uuid::new_v4(), extension),
            extension: extension.to_string(),
        }
    }
}

/// Caller-supplied upload
#[derive(Debug, Clone)]
pub struct Upload {
    pub identity_id: IdentityId,
    pub extension: String,
    pub data: Bytes,
}
