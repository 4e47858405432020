//! Chat account binding

use serde::{Deserialize, Serialize};

use super::identity::IdentityId;

/// Link between a chat-platform account and a primary identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatBinding {
    pub chat_id: i64,
    pub identity_id: IdentityId,
}
