pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use teloxide::types::{ChatId, MessageId, UserId};

/// Who sent an incoming message
#[derive(Debug, Clone)]
pub struct Sender {
    pub id: UserId,
    pub full_name: String,
    pub username: Option<String>,
}

/// What an incoming message carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Non-blank text
    Text(String),
    /// Photo, video, document, voice and the like, caption included.
    /// Relayed by copying the message.
    Media,
    /// Nothing worth relaying (blank text, stickers, service messages)
    Empty,
}

/// A message received from the platform, reduced to what the relay needs
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub sender: Sender,
    pub content: Content,
    /// Id of the message this one replies to, if any
    pub reply_to: Option<MessageId>,
}

/// Outgoing side of the platform. Sends that may later be replied to return
/// the id of the new message. Text longer than one platform message goes out
/// in several chunks.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Plain text, no markup. Returns the id of the first chunk.
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageId>;

    /// Text with HTML markup. Returns the ids of all chunks, in order.
    async fn send_html(&self, chat: ChatId, html: &str) -> Result<Vec<MessageId>>;

    /// Plain text with the anonymous/open menu attached
    async fn send_menu(&self, chat: ChatId, text: &str) -> Result<MessageId>;

    async fn reply_text(&self, chat: ChatId, reply_to: MessageId, text: &str) -> Result<()>;

    /// Copy an existing message (media included) into another chat
    async fn copy_to(&self, to: ChatId, from: ChatId, message_id: MessageId)
        -> Result<MessageId>;
}
