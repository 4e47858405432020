//! Store contracts consumed by the controller, and their adapters
//!
//! Read-style operations report an absent record as `StoreError::NotFound`
//! so callers can tell it apart from a storage failure.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;
use crate::models::{Asset, ChatBinding, Identity, IdentityId, NewAsset};

pub mod asset;
pub mod identity;
pub mod memory;
pub mod objects;

pub use asset::PgAssetStore;
pub use identity::PgIdentityStore;
pub use memory::{MemoryAssetStore, MemoryIdentityStore, MemoryObjectStore};
pub use objects::S3ObjectStore;

/// Primary identities and chat bindings
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Insert a new identity; a taken login is a `Conflict`
    async fn create(&self, identity: &Identity) -> Result<IdentityId, StoreError>;

    async fn get(&self, id: IdentityId) -> Result<Identity, StoreError>;

    async fn update(&self, identity: &Identity) -> Result<(), StoreError>;

    async fn delete(&self, id: IdentityId) -> Result<(), StoreError>;

    /// Identity whose login and password both match exactly
    async fn find_by_credentials(&self, login: &str, password: &str)
    -> Result<Identity, StoreError>;

    /// Binding of a chat account
    async fn find_binding(&self, chat_id: i64) -> Result<ChatBinding, StoreError>;

    /// Bind a chat account; an existing binding is a `Conflict`
    async fn create_binding(&self, binding: &ChatBinding) -> Result<(), StoreError>;
}

/// Upload metadata records
#[async_trait]
pub trait AssetMetadataStore: Send + Sync {
    async fn create(&self, asset: &NewAsset) -> Result<Asset, StoreError>;

    /// Assets of an identity, oldest first
    async fn list_by_identity(&self, identity_id: IdentityId) -> Result<Vec<Asset>, StoreError>;

    async fn delete(&self, asset_id: i64) -> Result<(), StoreError>;
}

/// Binary payloads keyed by stored name
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, stored_name: &str, data: Bytes) -> Result<(), StoreError>;

    /// Remove a payload; removing an absent payload succeeds
    async fn delete(&self, stored_name: &str) -> Result<(), StoreError>;

    /// Presentable URLs, one per asset, in input order
    async fn urls(&self, assets: &[Asset]) -> Result<Vec<String>, StoreError>;

    /// Payloads, one per asset, in input order
    async fn fetch(&self, assets: &[Asset]) -> Result<Vec<Bytes>, StoreError>;
}
