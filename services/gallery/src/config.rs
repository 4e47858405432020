//! Service configuration loaded from environment variables

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;

/// Where identities, asset records and payloads live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// PostgreSQL for metadata, S3 for payloads
    Postgres,
    /// Process memory; nothing survives a restart
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => anyhow::bail!("unknown STORAGE_BACKEND: {}", other),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Env: `HTTP_ADDR`, default `0.0.0.0:8000`
    pub http_addr: SocketAddr,
    /// Env: `REQUEST_TIMEOUT` (seconds), default 30
    pub request_timeout: Duration,
    /// Env: `MAX_UPLOAD_BYTES`, default 10 MiB
    pub max_upload_bytes: usize,
    /// Env: `STORAGE_BACKEND` (`postgres` | `memory`), default `postgres`
    pub storage_backend: StorageBackend,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env::var("HTTP_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid HTTP_ADDR: {}", e))?;

        let request_timeout = env::var("REQUEST_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10 * 1024 * 1024);

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse()?;

        Ok(AppConfig {
            http_addr,
            request_timeout: Duration::from_secs(request_timeout),
            max_upload_bytes,
            storage_backend,
        })
    }
}
