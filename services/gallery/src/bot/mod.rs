//! Chat front end
//!
//! One task consumes platform events from a queue and processes them one at
//! a time against the controller. The platform itself sits behind
//! `ChatPlatform` so the loop does not depend on a particular messenger.

pub mod telegram;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::context::Context;
use crate::controller::Controller;
use crate::error::ServiceError;

/// Callback payload of the "show images" button
pub const SHOW_IMAGES: &str = "show";
/// Command that opens the menu
pub const START_COMMAND: &str = "/start";

/// Inbound platform event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// The user asked for the menu
    Start { chat_id: i64 },
    /// Free text, read as `login password`
    Text {
        chat_id: i64,
        sender_id: i64,
        text: String,
    },
    /// The user pressed the "show images" button
    ShowImages { chat_id: i64, sender_id: i64 },
}

/// Outbound side of a chat platform
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()>;

    /// Send `text` with a button that raises `ChatEvent::ShowImages`
    async fn send_menu(&self, chat_id: i64, text: &str) -> Result<()>;

    async fn send_photo(&self, chat_id: i64, name: &str, data: Bytes) -> Result<()>;
}

/// First two whitespace-separated words of `text`
pub fn parse_credentials(text: &str) -> Option<(&str, &str)> {
    let mut words = text.split_whitespace();
    Some((words.next()?, words.next()?))
}

/// Attachment name for the payload at `index`
pub fn attachment_name(index: usize) -> String {
    format!("{}.jpg", index)
}

/// Chat bot driving the controller
pub struct Bot {
    controller: Controller,
    platform: Arc<dyn ChatPlatform>,
    event_timeout: Duration,
}

impl Bot {
    pub fn new(
        controller: Controller,
        platform: Arc<dyn ChatPlatform>,
        event_timeout: Duration,
    ) -> Self {
        Self {
            controller,
            platform,
            event_timeout,
        }
    }

    /// Process events until the queue closes or `shutdown` fires
    pub async fn run(self, mut events: mpsc::Receiver<ChatEvent>, shutdown: CancellationToken) {
        info!("Chat bot started");

        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            let ctx = Context::with_parent(&shutdown).with_timeout(self.event_timeout);
            self.handle_event(&ctx, event).await;
        }

        info!("Chat bot stopped");
    }

    /// Handle a single event; failures are reported to the user and logged
    pub async fn handle_event(&self, ctx: &Context, event: ChatEvent) {
        let outcome = match event {
            ChatEvent::Start { chat_id } => {
                self.platform
                    .send_menu(chat_id, "Choose what to do:")
                    .await
            }
            ChatEvent::Text {
                chat_id,
                sender_id,
                text,
            } => self.link(ctx, chat_id, sender_id, &text).await,
            ChatEvent::ShowImages { chat_id, sender_id } => {
                self.show_images(ctx, chat_id, sender_id).await
            }
        };

        if let Err(e) = outcome {
            error!("Failed to answer chat event: {}", e);
        }
    }

    async fn link(&self, ctx: &Context, chat_id: i64, sender_id: i64, text: &str) -> Result<()> {
        let Some((login, password)) = parse_credentials(text) else {
            return self
                .platform
                .send_text(chat_id, "Send your login and password separated by a space")
                .await;
        };

        let reply = match self
            .controller
            .link_chat_identity(ctx, sender_id, login, password)
            .await
        {
            Ok(()) => "Your account is linked",
            Err(ServiceError::Unauthenticated) => "Wrong login or password",
            Err(e) => {
                warn!("Linking chat {} failed: {}", sender_id, e);
                "Could not link your account, try again later"
            }
        };

        self.platform.send_text(chat_id, reply).await
    }

    async fn show_images(&self, ctx: &Context, chat_id: i64, sender_id: i64) -> Result<()> {
        let images = match self
            .controller
            .fetch_assets_for_chat_identity(ctx, sender_id)
            .await
        {
            Ok(images) => images,
            Err(ServiceError::NotFound(_)) => {
                return self
                    .platform
                    .send_text(chat_id, "Link your account first: send your login and password")
                    .await;
            }
            Err(e) => {
                warn!("Fetching images for chat {} failed: {}", sender_id, e);
                return self
                    .platform
                    .send_text(chat_id, "Could not load your images, try again later")
                    .await;
            }
        };

        if images.is_empty() {
            return self
                .platform
                .send_text(chat_id, "You have no images yet")
                .await;
        }

        for (index, data) in images.into_iter().enumerate() {
            if let Err(e) = self
                .platform
                .send_photo(chat_id, &attachment_name(index), data)
                .await
            {
                error!("Failed to send image {} to chat {}: {}", index, chat_id, e);
            }
        }

        Ok(())
    }
}
