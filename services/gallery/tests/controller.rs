//! Controller scenarios against the in-memory stores

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use gallery::{
    context::Context,
    controller::Controller,
    error::ServiceError,
    jwt::{JwtConfig, TokenCodec},
    models::{Identity, IdentityId, Upload},
    repositories::{MemoryAssetStore, MemoryIdentityStore, MemoryObjectStore},
};

struct Harness {
    controller: Controller,
    identities: MemoryIdentityStore,
    assets: MemoryAssetStore,
    objects: MemoryObjectStore,
}

fn harness() -> Harness {
    let identities = MemoryIdentityStore::new();
    let assets = MemoryAssetStore::new(&identities);
    let objects = MemoryObjectStore::new();
    let controller = Controller::new(
        Arc::new(identities.clone()),
        Arc::new(assets.clone()),
        Arc::new(objects.clone()),
        TokenCodec::new(&JwtConfig {
            secret: "controller-tests".to_string(),
            token_expiry: 3600,
        }),
    );

    Harness {
        controller,
        identities,
        assets,
        objects,
    }
}

fn identity(login: &str, password: &str) -> Identity {
    Identity {
        name: login.to_string(),
        login: login.to_string(),
        password: password.to_string(),
        ..Identity::default()
    }
}

async fn register(h: &Harness, login: &str, password: &str) -> IdentityId {
    h.controller
        .register_identity(&Context::background(), identity(login, password))
        .await
        .unwrap()
}

fn png(identity_id: IdentityId, data: &'static str) -> Upload {
    Upload {
        identity_id,
        extension: ".png".to_string(),
        data: Bytes::from(data),
    }
}

#[tokio::test]
async fn test_register_authenticate_verify() {
    let h = harness();
    let ctx = Context::background();
    let id = register(&h, "alice", "p1").await;

    let token = h.controller.authenticate(&ctx, "alice", "p1").await.unwrap();
    assert_eq!(h.controller.tokens().verify(&token).unwrap(), id);
}

#[tokio::test]
async fn test_wrong_password_is_unauthenticated() {
    let h = harness();
    register(&h, "alice", "p1").await;

    let result = h
        .controller
        .authenticate(&Context::background(), "alice", "wrong")
        .await;
    assert!(matches!(result, Err(ServiceError::Unauthenticated)));
}

#[tokio::test]
async fn test_duplicate_login_conflicts() {
    let h = harness();
    register(&h, "alice", "p1").await;

    let result = h
        .controller
        .register_identity(&Context::background(), identity("alice", "p2"))
        .await;
    assert!(matches!(result, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn test_update_requires_same_identity() {
    let h = harness();
    let ctx = Context::background();
    let alice = register(&h, "alice", "p1").await;
    let bob = register(&h, "bob", "p2").await;

    for (caller, target) in [(alice, bob), (bob, alice), (alice, 999)] {
        let mut changed = identity("mallory", "x");
        changed.id = target;
        let result = h.controller.update_identity(&ctx, caller, changed).await;
        assert!(
            matches!(result, Err(ServiceError::Forbidden(_))),
            "caller {} updating {} must be forbidden",
            caller,
            target
        );
    }

    let unchanged = h.controller.fetch_identity(&ctx, bob).await.unwrap();
    assert_eq!(unchanged.login, "bob");

    let mut renamed = identity("alice2", "p1");
    renamed.id = alice;
    h.controller
        .update_identity(&ctx, alice, renamed)
        .await
        .unwrap();
    assert_eq!(
        h.controller.fetch_identity(&ctx, alice).await.unwrap().login,
        "alice2"
    );
}

#[tokio::test]
async fn test_fetch_and_delete_unknown_identity() {
    let h = harness();
    let ctx = Context::background();

    assert!(matches!(
        h.controller.fetch_identity(&ctx, 42).await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        h.controller.delete_identity(&ctx, 42).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_link_twice_creates_one_binding() {
    let h = harness();
    let ctx = Context::background();
    register(&h, "alice", "p1").await;

    h.controller
        .link_chat_identity(&ctx, 555, "alice", "p1")
        .await
        .unwrap();
    h.controller
        .link_chat_identity(&ctx, 555, "alice", "p1")
        .await
        .unwrap();

    assert_eq!(h.identities.binding_count().await, 1);
}

#[tokio::test]
async fn test_link_with_bad_credentials_stays_unlinked() {
    let h = harness();
    let ctx = Context::background();
    register(&h, "alice", "p1").await;

    let result = h.controller.link_chat_identity(&ctx, 555, "alice", "nope").await;
    assert!(matches!(result, Err(ServiceError::Unauthenticated)));
    assert_eq!(h.identities.binding_count().await, 0);

    assert!(matches!(
        h.controller.fetch_assets_for_chat_identity(&ctx, 555).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_linked_identity_without_assets_fetches_empty() {
    let h = harness();
    let ctx = Context::background();
    register(&h, "alice", "p1").await;

    h.controller
        .link_chat_identity(&ctx, 555, "alice", "p1")
        .await
        .unwrap();

    let payloads = h
        .controller
        .fetch_assets_for_chat_identity(&ctx, 555)
        .await
        .unwrap();
    assert!(payloads.is_empty());
}

#[tokio::test]
async fn test_uploads_get_distinct_names() {
    let h = harness();
    let ctx = Context::background();
    let alice = register(&h, "alice", "p1").await;

    let first = h.controller.upload_asset(&ctx, png(alice, "a")).await.unwrap();
    let second = h.controller.upload_asset(&ctx, png(alice, "a")).await.unwrap();

    assert_ne!(first, second);
    assert!(first.ends_with(".png"));
    assert!(second.ends_with(".png"));
    assert!(h.objects.contains(&first).await);
    assert!(h.objects.contains(&second).await);
}

#[tokio::test]
async fn test_failed_payload_write_removes_metadata() {
    let h = harness();
    let ctx = Context::background();
    let alice = register(&h, "alice", "p1").await;
    h.objects.set_fail_puts(true);

    let result = h.controller.upload_asset(&ctx, png(alice, "a")).await;
    assert!(matches!(result, Err(ServiceError::Storage { .. })));
    assert!(h.assets.records().await.is_empty());
    assert!(h.objects.is_empty().await);
}

#[tokio::test]
async fn test_chat_fetch_preserves_upload_order() {
    let h = harness();
    let ctx = Context::background();
    let alice = register(&h, "alice", "p1").await;
    let bob = register(&h, "bob", "p2").await;

    h.controller.upload_asset(&ctx, png(alice, "one")).await.unwrap();
    h.controller.upload_asset(&ctx, png(bob, "other")).await.unwrap();
    h.controller.upload_asset(&ctx, png(alice, "two")).await.unwrap();
    h.controller.upload_asset(&ctx, png(alice, "three")).await.unwrap();

    h.controller
        .link_chat_identity(&ctx, 555, "alice", "p1")
        .await
        .unwrap();

    let payloads = h
        .controller
        .fetch_assets_for_chat_identity(&ctx, 555)
        .await
        .unwrap();
    assert_eq!(
        payloads,
        vec![Bytes::from("one"), Bytes::from("two"), Bytes::from("three")]
    );
}

#[tokio::test]
async fn test_fetch_identity_lists_urls_in_order() {
    let h = harness();
    let ctx = Context::background();
    let alice = register(&h, "alice", "p1").await;

    let first = h.controller.upload_asset(&ctx, png(alice, "1")).await.unwrap();
    let second = h.controller.upload_asset(&ctx, png(alice, "2")).await.unwrap();

    let fetched = h.controller.fetch_identity(&ctx, alice).await.unwrap();
    assert_eq!(
        fetched.asset_urls,
        vec![
            format!("memory://objects/{}", first),
            format!("memory://objects/{}", second),
        ]
    );
}

#[tokio::test]
async fn test_deleted_identity_loses_binding() {
    let h = harness();
    let ctx = Context::background();
    let alice = register(&h, "alice", "p1").await;

    h.controller
        .link_chat_identity(&ctx, 555, "alice", "p1")
        .await
        .unwrap();
    h.controller.delete_identity(&ctx, alice).await.unwrap();

    assert!(matches!(
        h.controller.fetch_assets_for_chat_identity(&ctx, 555).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_cancelled_context_aborts() {
    let h = harness();
    let ctx = Context::background();
    ctx.cancel();

    let result = h.controller.register_identity(&ctx, identity("alice", "p1")).await;
    assert!(matches!(result, Err(ServiceError::Cancelled)));
    assert!(matches!(
        h.controller.authenticate(&ctx, "alice", "p1").await,
        Err(ServiceError::Cancelled)
    ));
}

#[tokio::test]
async fn test_expired_deadline_aborts() {
    let h = harness();
    let ctx = Context::background().with_timeout(Duration::ZERO);
    tokio::time::sleep(Duration::from_millis(5)).await;

    let result = h.controller.fetch_identity(&ctx, 1).await;
    assert!(matches!(result, Err(ServiceError::DeadlineExceeded)));
}

#[tokio::test]
async fn test_upload_for_missing_identity_is_not_found() {
    let h = harness();
    let ctx = Context::background();
    let alice = register(&h, "alice", "p1").await;
    h.controller.delete_identity(&ctx, alice).await.unwrap();

    for owner in [alice, 999] {
        let result = h.controller.upload_asset(&ctx, png(owner, "a")).await;
        assert!(
            matches!(result, Err(ServiceError::NotFound(_))),
            "upload for identity {} must fail",
            owner
        );
    }
    assert!(h.assets.records().await.is_empty());
    assert!(h.objects.is_empty().await);
}

#[tokio::test]
async fn test_failed_metadata_write_skips_payload() {
    let h = harness();
    let ctx = Context::background();
    let alice = register(&h, "alice", "p1").await;
    h.assets.set_fail_creates(true);

    let result = h.controller.upload_asset(&ctx, png(alice, "a")).await;
    assert!(matches!(result, Err(ServiceError::Storage { .. })));
    assert!(h.objects.is_empty().await);
}

#[tokio::test]
async fn test_url_failure_returns_no_identity() {
    let h = harness();
    let ctx = Context::background();
    let alice = register(&h, "alice", "p1").await;
    h.controller.upload_asset(&ctx, png(alice, "a")).await.unwrap();
    h.objects.set_fail_reads(true);

    let result = h.controller.fetch_identity(&ctx, alice).await;
    assert!(matches!(result, Err(ServiceError::Storage { .. })));
}

#[tokio::test]
async fn test_payload_fetch_failure_is_storage_error() {
    let h = harness();
    let ctx = Context::background();
    let alice = register(&h, "alice", "p1").await;
    h.controller.upload_asset(&ctx, png(alice, "a")).await.unwrap();
    h.controller
        .link_chat_identity(&ctx, 555, "alice", "p1")
        .await
        .unwrap();
    h.objects.set_fail_reads(true);

    let result = h.controller.fetch_assets_for_chat_identity(&ctx, 555).await;
    assert!(matches!(result, Err(ServiceError::Storage { .. })));
}

#[tokio::test]
async fn test_delete_identity_removes_its_payloads() {
    let h = harness();
    let ctx = Context::background();
    let alice = register(&h, "alice", "p1").await;
    let bob = register(&h, "bob", "p2").await;

    h.controller.upload_asset(&ctx, png(alice, "a")).await.unwrap();
    h.controller.upload_asset(&ctx, png(alice, "b")).await.unwrap();
    let kept = h.controller.upload_asset(&ctx, png(bob, "c")).await.unwrap();

    h.controller.delete_identity(&ctx, alice).await.unwrap();

    assert_eq!(h.objects.len().await, 1);
    assert!(h.objects.contains(&kept).await);
    let records = h.assets.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].identity_id, bob);
}
