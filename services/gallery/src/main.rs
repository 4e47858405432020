use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::{database, object_storage};
use gallery::{
    bot::{
        Bot,
        telegram::{TelegramClient, TelegramConfig},
    },
    config::{AppConfig, StorageBackend},
    controller::Controller,
    jwt::{JwtConfig, TokenCodec},
    repositories::{
        AssetMetadataStore, IdentityStore, MemoryAssetStore, MemoryIdentityStore,
        MemoryObjectStore, ObjectStore, PgAssetStore, PgIdentityStore, S3ObjectStore,
    },
    routes,
    state::AppState,
};

type Stores = (
    Arc<dyn IdentityStore>,
    Arc<dyn AssetMetadataStore>,
    Arc<dyn ObjectStore>,
);

async fn build_stores(backend: StorageBackend) -> Result<Stores> {
    match backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage, nothing will survive a restart");
            let memory = MemoryIdentityStore::new();
            let assets: Arc<dyn AssetMetadataStore> = Arc::new(MemoryAssetStore::new(&memory));
            let identities: Arc<dyn IdentityStore> = Arc::new(memory);
            let objects: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
            Ok((identities, assets, objects))
        }
        StorageBackend::Postgres => {
            let db_config = database::DatabaseConfig::from_env()?;
            let pool = database::init_pool(&db_config).await?;

            if database::health_check(&pool).await? {
                info!("Database connection successful");
            } else {
                anyhow::bail!("Failed to connect to database");
            }

            if let Err(e) = database::run_migrations(&pool).await {
                warn!("Failed to run migrations: {}", e);
            }

            let storage_config = object_storage::ObjectStorageConfig::from_env()?;
            let client = object_storage::init_client(&storage_config).await;
            object_storage::ensure_bucket(&client, &storage_config.bucket).await?;

            let identities: Arc<dyn IdentityStore> = Arc::new(PgIdentityStore::new(pool.clone()));
            let assets: Arc<dyn AssetMetadataStore> = Arc::new(PgAssetStore::new(pool));
            let objects: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(
                client,
                storage_config.bucket,
                Duration::from_secs(storage_config.presign_expiry),
            ));
            Ok((identities, assets, objects))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting gallery service");

    let config = AppConfig::from_env()?;
    let jwt_config = JwtConfig::from_env()?;

    let (identities, assets, objects) = build_stores(config.storage_backend).await?;
    let controller = Controller::new(identities, assets, objects, TokenCodec::new(&jwt_config));

    let shutdown = CancellationToken::new();

    // Chat front end
    match TelegramConfig::from_env() {
        Some(telegram_config) => {
            let client = Arc::new(TelegramClient::new(&telegram_config)?);
            let (tx, rx) = mpsc::channel(64);

            let bot = Bot::new(controller.clone(), client.clone(), config.request_timeout);
            tokio::spawn(bot.run(rx, shutdown.clone()));

            let poll_shutdown = shutdown.clone();
            tokio::spawn(async move { client.poll(tx, poll_shutdown).await });
        }
        None => info!("TELEGRAM_BOT_TOKEN not set, chat bot disabled"),
    }

    let app_state = AppState {
        controller,
        request_timeout: config.request_timeout,
        max_upload_bytes: config.max_upload_bytes,
        shutdown: shutdown.clone(),
    };
    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(config.http_addr).await?;
    info!("Gallery service listening on {}", config.http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
