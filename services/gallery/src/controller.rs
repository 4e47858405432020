//! Orchestration controller
//!
//! Sequences the token codec and the three stores for every identity, upload
//! and chat-linking operation. The controller holds no mutable state; every
//! store call runs under the caller's `Context` and is attempted at most once.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{info, warn};

use crate::context::Context;
use crate::error::{ServiceError, ServiceResult, StoreError};
use crate::jwt::TokenCodec;
use crate::models::{ChatBinding, Identity, IdentityId, NewAsset, Upload};
use crate::repositories::{AssetMetadataStore, IdentityStore, ObjectStore};

/// Upper bound for each best-effort cleanup step
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Controller {
    identities: Arc<dyn IdentityStore>,
    assets: Arc<dyn AssetMetadataStore>,
    objects: Arc<dyn ObjectStore>,
    tokens: TokenCodec,
}

impl Controller {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        assets: Arc<dyn AssetMetadataStore>,
        objects: Arc<dyn ObjectStore>,
        tokens: TokenCodec,
    ) -> Self {
        Self {
            identities,
            assets,
            objects,
            tokens,
        }
    }

    /// Codec used to issue and verify identity tokens
    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    /// Register a new identity and return its id
    pub async fn register_identity(
        &self,
        ctx: &Context,
        identity: Identity,
    ) -> ServiceResult<IdentityId> {
        let id = ctx
            .run(self.identities.create(&identity))
            .await?
            .map_err(|e| ServiceError::storage("register_identity", e))?;

        info!("Registered identity {} ({})", id, identity.login);
        Ok(id)
    }

    /// Fetch an identity together with the URLs of its uploads
    pub async fn fetch_identity(&self, ctx: &Context, id: IdentityId) -> ServiceResult<Identity> {
        let mut identity = ctx
            .run(self.identities.get(id))
            .await?
            .map_err(|e| match e {
                StoreError::NotFound => ServiceError::NotFound("identity"),
                e => ServiceError::storage("fetch_identity", e),
            })?;

        let assets = ctx
            .run(self.assets.list_by_identity(identity.id))
            .await?
            .map_err(|e| ServiceError::storage("fetch_identity", e))?;

        let urls = ctx
            .run(self.objects.urls(&assets))
            .await?
            .map_err(|e| ServiceError::storage("fetch_identity", e))?;

        identity.asset_urls = urls;
        Ok(identity)
    }

    /// Update an identity; only the identity itself may do so
    pub async fn update_identity(
        &self,
        ctx: &Context,
        caller: IdentityId,
        identity: Identity,
    ) -> ServiceResult<()> {
        if caller != identity.id {
            return Err(ServiceError::Forbidden(format!(
                "identity {} cannot modify identity {}",
                caller, identity.id
            )));
        }

        ctx.run(self.identities.update(&identity))
            .await?
            .map_err(|e| match e {
                StoreError::NotFound => ServiceError::NotFound("identity"),
                e => ServiceError::storage("update_identity", e),
            })
    }

    /// Delete an identity
    ///
    /// No ownership check happens here; callers decide who may delete. The
    /// identity's asset records go with it; their payloads are removed
    /// afterwards on a best-effort basis.
    pub async fn delete_identity(&self, ctx: &Context, id: IdentityId) -> ServiceResult<()> {
        let assets = match ctx.run(self.assets.list_by_identity(id)).await? {
            Ok(assets) => assets,
            Err(e) => {
                warn!("Could not list assets of identity {} before delete: {}", id, e);
                Vec::new()
            }
        };

        ctx.run(self.identities.delete(id))
            .await?
            .map_err(|e| match e {
                StoreError::NotFound => ServiceError::NotFound("identity"),
                e => ServiceError::storage("delete_identity", e),
            })?;

        info!("Deleted identity {}", id);

        for asset in &assets {
            match tokio::time::timeout(CLEANUP_TIMEOUT, self.objects.delete(&asset.stored_name))
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Orphaned payload {}: {}", asset.stored_name, e),
                Err(_) => warn!("Orphaned payload {}: cleanup timed out", asset.stored_name),
            }
        }

        Ok(())
    }

    /// Exchange a login/password pair for a signed token
    pub async fn authenticate(
        &self,
        ctx: &Context,
        login: &str,
        password: &str,
    ) -> ServiceResult<String> {
        let identity = self.check_credentials(ctx, login, password).await?;
        Ok(self.tokens.issue(identity.id)?)
    }

    /// Store an upload: metadata record first, then the payload
    ///
    /// A failed payload write triggers a best-effort delete of the record
    /// just written; the payload error is returned either way.
    pub async fn upload_asset(&self, ctx: &Context, upload: Upload) -> ServiceResult<String> {
        let new_asset = NewAsset::generate(upload.identity_id, &upload.extension);

        let asset = ctx
            .run(self.assets.create(&new_asset))
            .await?
            .map_err(|e| match e {
                StoreError::NotFound => ServiceError::NotFound("identity"),
                e => ServiceError::storage("upload_asset", e),
            })?;

        let stored = ctx.run(self.objects.put(&asset.stored_name, upload.data)).await;
        let err = match stored {
            Ok(Ok(())) => {
                info!(
                    "Stored asset {} for identity {}",
                    asset.stored_name, asset.identity_id
                );
                return Ok(asset.stored_name);
            }
            Ok(Err(e)) => ServiceError::storage("upload_asset", e),
            Err(interrupted) => interrupted,
        };

        warn!(
            "Payload write for {} failed ({}), removing its metadata record",
            asset.stored_name, err
        );
        match tokio::time::timeout(CLEANUP_TIMEOUT, self.assets.delete(asset.id)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Orphaned metadata record {}: {}", asset.id, e),
            Err(_) => warn!("Orphaned metadata record {}: rollback timed out", asset.id),
        }

        Err(err)
    }

    /// Bind a chat account to the identity owning the credentials
    ///
    /// Linking an already bound chat account succeeds without changing it.
    pub async fn link_chat_identity(
        &self,
        ctx: &Context,
        chat_id: i64,
        login: &str,
        password: &str,
    ) -> ServiceResult<()> {
        let identity = self.check_credentials(ctx, login, password).await?;

        match ctx.run(self.identities.find_binding(chat_id)).await? {
            Ok(_) => return Ok(()),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(ServiceError::storage("link_chat_identity", e)),
        }

        let binding = ChatBinding {
            chat_id,
            identity_id: identity.id,
        };
        match ctx.run(self.identities.create_binding(&binding)).await?
        {
            Ok(()) => {
                info!("Linked chat {} to identity {}", chat_id, identity.id);
                Ok(())
            }
            // Lost a race with a concurrent link for the same chat
            Err(StoreError::Conflict(_)) => Ok(()),
            Err(StoreError::NotFound) => Err(ServiceError::NotFound("identity")),
            Err(e) => Err(ServiceError::storage("link_chat_identity", e)),
        }
    }

    /// Payloads of every asset owned by the identity bound to `chat_id`
    pub async fn fetch_assets_for_chat_identity(
        &self,
        ctx: &Context,
        chat_id: i64,
    ) -> ServiceResult<Vec<Bytes>> {
        let binding = ctx
            .run(self.identities.find_binding(chat_id))
            .await?
            .map_err(|e| match e {
                StoreError::NotFound => ServiceError::NotFound("chat binding"),
                e => ServiceError::storage("fetch_assets_for_chat_identity", e),
            })?;

        let assets = ctx
            .run(self.assets.list_by_identity(binding.identity_id))
            .await?
            .map_err(|e| ServiceError::storage("fetch_assets_for_chat_identity", e))?;

        if assets.is_empty() {
            return Ok(Vec::new());
        }

        ctx.run(self.objects.fetch(&assets))
            .await?
            .map_err(|e| ServiceError::storage("fetch_assets_for_chat_identity", e))
    }

    async fn check_credentials(
        &self,
        ctx: &Context,
        login: &str,
        password: &str,
    ) -> ServiceResult<Identity> {
        ctx.run(self.identities.find_by_credentials(login, password))
            .await?
            .map_err(|e| match e {
                StoreError::NotFound => ServiceError::Unauthenticated,
                e => ServiceError::storage("check_credentials", e),
            })
    }
}
