use async_trait::async_trait;

use crate::{domain::ChatId, Result};

/// Outbound half of the chat transport.
///
/// Implementations own connection lifecycle, authentication and delivery
/// retries; the router only ever sends one plain-text reply per inbound message.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Maximum reply length the platform accepts, in characters.
    fn max_message_len(&self) -> usize;

    async fn send_reply(&self, chat_id: ChatId, text: &str) -> Result<()>;
}
