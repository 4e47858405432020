//! Application state shared across handlers

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::context::Context;
use crate::controller::Controller;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub controller: Controller,
    pub request_timeout: Duration,
    pub max_upload_bytes: usize,
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Execution context for one request
    pub fn request_context(&self) -> Context {
        Context::with_parent(&self.shutdown).with_timeout(self.request_timeout)
    }
}
