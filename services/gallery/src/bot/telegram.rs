//! Telegram Bot API adapter
//!
//! Long-polls `getUpdates`, turns updates into `ChatEvent`s and implements
//! `ChatPlatform` on top of `sendMessage`/`sendPhoto`.

use std::env;
use std::time::Duration;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, multipart};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ChatEvent, ChatPlatform, SHOW_IMAGES, START_COMMAND};

/// Pause after a failed poll before trying again
const RETRY_DELAY: Duration = Duration::from_secs(3);

/// Telegram configuration
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub api_url: String,
    /// Long-poll timeout in seconds
    pub poll_timeout: u64,
}

impl TelegramConfig {
    /// Load configuration from environment variables
    ///
    /// Returns `None` when `TELEGRAM_BOT_TOKEN` is unset or empty; the chat
    /// front end is then disabled.
    pub fn from_env() -> Option<Self> {
        let token = env::var("TELEGRAM_BOT_TOKEN")
            .ok()
            .filter(|token| !token.is_empty())?;

        let api_url = env::var("TELEGRAM_API_URL")
            .unwrap_or_else(|_| "https://api.telegram.org".to_string())
            .trim_end_matches('/')
            .to_string();

        let poll_timeout = env::var("TELEGRAM_POLL_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Some(Self {
            token,
            api_url,
            poll_timeout,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

impl Update {
    /// Chat event carried by this update, if any
    pub fn to_event(&self) -> Option<ChatEvent> {
        if let Some(message) = &self.message {
            let text = message.text.as_deref()?.trim();
            if text == START_COMMAND {
                return Some(ChatEvent::Start {
                    chat_id: message.chat.id,
                });
            }
            let sender = message.from.as_ref()?;
            return Some(ChatEvent::Text {
                chat_id: message.chat.id,
                sender_id: sender.id,
                text: text.to_string(),
            });
        }

        let query = self.callback_query.as_ref()?;
        if query.data.as_deref() != Some(SHOW_IMAGES) {
            return None;
        }
        let chat_id = query
            .message
            .as_ref()
            .map(|message| message.chat.id)
            .unwrap_or(query.from.id);
        Some(ChatEvent::ShowImages {
            chat_id,
            sender_id: query.from.id,
        })
    }
}

/// Telegram Bot API client
#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
    poll_timeout: u64,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout + 10))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", config.api_url, config.token),
            poll_timeout: config.poll_timeout,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn read_response<T: DeserializeOwned>(
        response: reqwest::Response,
        method: &str,
    ) -> Result<T> {
        let body: ApiResponse<T> = response
            .json()
            .await
            .with_context(|| format!("Invalid {} response", method))?;

        match (body.ok, body.result) {
            (true, Some(result)) => Ok(result),
            _ => anyhow::bail!(
                "{} failed: {}",
                method,
                body.description.unwrap_or_else(|| "no description".to_string())
            ),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, payload: serde_json::Value) -> Result<T> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("{} request failed", method))?;

        Self::read_response(response, method).await
    }

    /// Fetch updates after `offset`, waiting up to the poll timeout
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": self.poll_timeout,
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }

    async fn answer_callback(&self, query_id: &str) -> Result<()> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                json!({ "callback_query_id": query_id }),
            )
            .await?;
        Ok(())
    }

    /// Forward updates to `events` until `shutdown` fires or the receiver
    /// goes away
    pub async fn poll(&self, events: mpsc::Sender<ChatEvent>, shutdown: CancellationToken) {
        info!("Polling Telegram for updates");
        let mut offset = 0;

        loop {
            let updates = tokio::select! {
                _ = shutdown.cancelled() => break,
                updates = self.get_updates(offset) => updates,
            };

            let updates = match updates {
                Ok(updates) => updates,
                Err(e) => {
                    warn!("Telegram poll failed: {:#}", e);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(RETRY_DELAY) => continue,
                    }
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);

                if let Some(query) = &update.callback_query {
                    if let Err(e) = self.answer_callback(&query.id).await {
                        debug!("Failed to answer callback query: {:#}", e);
                    }
                }

                let Some(event) = update.to_event() else {
                    continue;
                };
                if events.send(event).await.is_err() {
                    info!("Chat event queue closed, stopping poller");
                    return;
                }
            }
        }

        info!("Telegram poller stopped");
    }
}

#[async_trait]
impl ChatPlatform for TelegramClient {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await?;
        Ok(())
    }

    async fn send_menu(&self, chat_id: i64, text: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "sendMessage",
                json!({
                    "chat_id": chat_id,
                    "text": text,
                    "reply_markup": {
                        "inline_keyboard": [[
                            { "text": "Show my images", "callback_data": SHOW_IMAGES }
                        ]]
                    }
                }),
            )
            .await?;
        Ok(())
    }

    async fn send_photo(&self, chat_id: i64, name: &str, data: Bytes) -> Result<()> {
        let photo = multipart::Part::bytes(data.to_vec()).file_name(name.to_string());
        let form = multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("photo", photo);

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .context("sendPhoto request failed")?;

        let _: serde_json::Value = Self::read_response(response, "sendPhoto").await?;
        Ok(())
    }
}
