//! In-memory store adapters
//!
//! Used by the test suites and by `STORAGE_BACKEND=memory` for local runs.
//! Each adapter keeps its state behind an `Arc<Mutex<_>>`, so clones share
//! the same data.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;

use super::{AssetMetadataStore, IdentityStore, ObjectStore};
use crate::error::StoreError;
use crate::models::{Asset, ChatBinding, Identity, IdentityId, NewAsset};

/// Relational state shared by the identity and asset stores, so asset
/// ownership and delete cascades behave as in PostgreSQL
#[derive(Debug, Default)]
struct Tables {
    next_identity_id: IdentityId,
    users: BTreeMap<IdentityId, Identity>,
    bindings: HashMap<i64, IdentityId>,
    next_asset_id: i64,
    assets: Vec<Asset>,
}

impl Tables {
    fn login_taken(&self, login: &str, except: IdentityId) -> bool {
        self.users
            .values()
            .any(|user| user.login == login && user.id != except)
    }
}

/// Identity store held in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryIdentityStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chat bindings
    pub async fn binding_count(&self) -> usize {
        self.tables.lock().await.bindings.len()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn create(&self, identity: &Identity) -> Result<IdentityId, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.login_taken(&identity.login, 0) {
            return Err(StoreError::Conflict("login already exists".to_string()));
        }

        tables.next_identity_id += 1;
        let id = tables.next_identity_id;
        let mut stored = identity.clone();
        stored.id = id;
        stored.asset_urls.clear();
        tables.users.insert(id, stored);
        Ok(id)
    }

    async fn get(&self, id: IdentityId) -> Result<Identity, StoreError> {
        let tables = self.tables.lock().await;
        tables.users.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn update(&self, identity: &Identity) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&identity.id) {
            return Err(StoreError::NotFound);
        }
        if tables.login_taken(&identity.login, identity.id) {
            return Err(StoreError::Conflict("login already exists".to_string()));
        }

        let mut stored = identity.clone();
        stored.asset_urls.clear();
        tables.users.insert(identity.id, stored);
        Ok(())
    }

    async fn delete(&self, id: IdentityId) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.users.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        tables.bindings.retain(|_, bound| *bound != id);
        tables.assets.retain(|asset| asset.identity_id != id);
        Ok(())
    }

    async fn find_by_credentials(
        &self,
        login: &str,
        password: &str,
    ) -> Result<Identity, StoreError> {
        let tables = self.tables.lock().await;
        tables
            .users
            .values()
            .find(|user| user.login == login && user.password == password)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_binding(&self, chat_id: i64) -> Result<ChatBinding, StoreError> {
        let tables = self.tables.lock().await;
        tables
            .bindings
            .get(&chat_id)
            .map(|&identity_id| ChatBinding {
                chat_id,
                identity_id,
            })
            .ok_or(StoreError::NotFound)
    }

    async fn create_binding(&self, binding: &ChatBinding) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&binding.identity_id) {
            return Err(StoreError::NotFound);
        }
        if tables.bindings.contains_key(&binding.chat_id) {
            return Err(StoreError::Conflict("chat binding already exists".to_string()));
        }

        tables.bindings.insert(binding.chat_id, binding.identity_id);
        Ok(())
    }
}

/// Asset metadata store held in process memory
///
/// Shares its tables with the identity store it was created from.
#[derive(Debug, Clone)]
pub struct MemoryAssetStore {
    tables: Arc<Mutex<Tables>>,
    fail_creates: Arc<AtomicBool>,
}

impl MemoryAssetStore {
    pub fn new(identities: &MemoryIdentityStore) -> Self {
        Self {
            tables: identities.tables.clone(),
            fail_creates: Arc::default(),
        }
    }

    /// Make every subsequent `create` fail
    pub fn set_fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    /// All records, in insertion order
    pub async fn records(&self) -> Vec<Asset> {
        self.tables.lock().await.assets.clone()
    }
}

#[async_trait]
impl AssetMetadataStore for MemoryAssetStore {
    async fn create(&self, asset: &NewAsset) -> Result<Asset, StoreError> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::Protocol(format!(
                "failed to record {}: write refused",
                asset.stored_name
            ))));
        }

        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&asset.identity_id) {
            return Err(StoreError::NotFound);
        }
        if tables
            .assets
            .iter()
            .any(|record| record.stored_name == asset.stored_name)
        {
            return Err(StoreError::Conflict("image name already exists".to_string()));
        }

        tables.next_asset_id += 1;
        let record = Asset {
            id: tables.next_asset_id,
            identity_id: asset.identity_id,
            stored_name: asset.stored_name.clone(),
            extension: asset.extension.clone(),
        };
        tables.assets.push(record.clone());
        Ok(record)
    }

    async fn list_by_identity(&self, identity_id: IdentityId) -> Result<Vec<Asset>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .assets
            .iter()
            .filter(|record| record.identity_id == identity_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, asset_id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let before = tables.assets.len();
        tables.assets.retain(|record| record.id != asset_id);
        if tables.assets.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// Object store held in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<HashMap<String, Bytes>>>,
    fail_puts: Arc<AtomicBool>,
    fail_reads: Arc<AtomicBool>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `urls` and `fetch` fail
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub async fn contains(&self, stored_name: &str) -> bool {
        self.objects.lock().await.contains_key(stored_name)
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.lock().await.is_empty()
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::ObjectStore("read refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, stored_name: &str, data: Bytes) -> Result<(), StoreError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::ObjectStore(format!(
                "failed to put {}: write refused",
                stored_name
            )));
        }

        self.objects
            .lock()
            .await
            .insert(stored_name.to_string(), data);
        Ok(())
    }

    async fn delete(&self, stored_name: &str) -> Result<(), StoreError> {
        self.objects.lock().await.remove(stored_name);
        Ok(())
    }

    async fn urls(&self, assets: &[Asset]) -> Result<Vec<String>, StoreError> {
        self.check_reads()?;
        Ok(assets
            .iter()
            .map(|asset| format!("memory://objects/{}", asset.stored_name))
            .collect())
    }

    async fn fetch(&self, assets: &[Asset]) -> Result<Vec<Bytes>, StoreError> {
        self.check_reads()?;
        let objects = self.objects.lock().await;
        assets
            .iter()
            .map(|asset| {
                objects.get(&asset.stored_name).cloned().ok_or_else(|| {
                    StoreError::ObjectStore(format!("object {} not found", asset.stored_name))
                })
            })
            .collect()
    }
}
