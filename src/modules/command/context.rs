use serde::{Deserialize, Serialize};

use super::models::ContentRef;
use super::role::Actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub kind: ChatKind,
}

/// 每个事件显式传入的上下文 / Explicit per-event context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    pub chat: Chat,
    pub actor: Actor,
    /// 被回复的消息，即要保存的内容 / Replied-to message, i.e. the content to store
    #[serde(default)]
    pub reply_to: Option<ContentRef>,
}

/// 入站事件 / Inbound event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InboundEvent {
    /// 用户输入的消息 / Typed message
    Message { text: String },
    /// 内联按钮回调 / Inline button callback
    Callback { data: String },
}

impl InboundEvent {
    pub fn raw(&self) -> &str {
        match self {
            InboundEvent::Message { text } => text,
            InboundEvent::Callback { data } => data,
        }
    }
}
