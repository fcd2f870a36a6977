//! Telegram update handlers.
//!
//! Each text message is converted into a core `InboundMessage`, serialized per
//! chat, and handed to the message router. Router errors are logged here; the
//! router never retries a failed send.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use kbot_core::domain::{ChatId, ChatKind, InboundMessage, UserId};

use crate::router::AppState;

/// Map a Telegram message into the router's input, if it is one we handle.
pub fn to_inbound(msg: &Message) -> Option<InboundMessage> {
    let text = msg.text()?;
    let sender = msg.from()?;
    let chat_kind = if msg.chat.is_private() {
        ChatKind::Direct
    } else {
        ChatKind::Group
    };

    Some(InboundMessage {
        chat_id: ChatId(msg.chat.id.0),
        sender_id: UserId(sender.id.0 as i64),
        text: text.to_string(),
        chat_kind,
    })
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(inbound) = to_inbound(&msg) else {
        return Ok(());
    };

    let _guard = state.chat_locks.lock_chat(inbound.chat_id).await;
    match state.router.handle(&inbound).await {
        Ok(outcome) => {
            tracing::debug!(chat_id = inbound.chat_id.0, ?outcome, "message routed");
        }
        Err(e) => {
            tracing::error!(chat_id = inbound.chat_id.0, "failed to handle message: {e}");
        }
    }

    Ok(())
}
