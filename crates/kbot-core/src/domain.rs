use serde::{Deserialize, Serialize};

/// Chat platform user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Chat platform chat id (numeric, negative for groups on Telegram).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

/// Whether a message arrived in a one-to-one chat or a multi-member chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Direct,
    Group,
}

/// A single inbound text message, already stripped of transport details.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub chat_id: ChatId,
    pub sender_id: UserId,
    pub text: String,
    pub chat_kind: ChatKind,
}
