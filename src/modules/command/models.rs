//! 命令记录 / Command records
//!
//! 记录归命令存储所有，只由注册流程修改；被替换的记录标记为非活跃而不是删除。
//! Records are owned by the command store and only mutated by the registration flow;
//! superseded records go inactive instead of being deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::role::Role;

/// 命令回放的内容类型 / Kind of payload a command replays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    /// 复制一条已有消息 / Copies an existing message
    Copy,
}

/// 流程游标 / Workflow cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    /// 等待选择角色 / Awaiting role selection
    Role,
}

/// 被回复消息的引用 / Reference to the replied-to message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    pub chat_id: i64,
    pub message_id: i64,
}

/// 持久化的命令定义 / Persisted command definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub name: String,
    pub owner_id: i64,
    pub role: Option<Role>,
    #[serde(rename = "type")]
    pub command_type: Option<CommandType>,
    pub content: Option<ContentRef>,
    pub caption: Option<String>,
    pub is_active: bool,
    pub state: Option<RecordState>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommandRecord {
    pub fn is_pending(&self) -> bool {
        self.state.is_some()
    }
}

/// 新写入的记录 / A record write
#[derive(Debug, Clone, PartialEq)]
pub enum NewCommand {
    /// 内容和角色都已知 / Content and role both known
    Complete {
        owner_id: i64,
        name: String,
        role: Role,
        command_type: CommandType,
        content: ContentRef,
    },
    /// 只有名字，等待后续事件提供角色 / Name only, a later event supplies the role
    Pending { owner_id: i64, name: String },
}

impl NewCommand {
    pub fn name(&self) -> &str {
        match self {
            NewCommand::Complete { name, .. } | NewCommand::Pending { name, .. } => name,
        }
    }
}

/// 只更新元数据，保留原有内容 / Metadata-only update that keeps the previous content
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataUpdate {
    pub owner_id: i64,
    pub name: String,
    pub role: Role,
    pub command_type: CommandType,
}

/// 查询条件 / Lookup filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandFilter {
    pub name: String,
    pub is_active: Option<bool>,
    pub owner_id: Option<i64>,
    pub state: Option<RecordState>,
}

impl CommandFilter {
    /// 按名字查找活跃记录
    pub fn active(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_active: Some(true),
            ..Default::default()
        }
    }

    /// 按 `{id, name}` 查找某用户尚未完成的记录
    pub fn pending(owner_id: i64, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_active: None,
            owner_id: Some(owner_id),
            state: Some(RecordState::Role),
        }
    }

    pub fn matches(&self, record: &CommandRecord) -> bool {
        record.name == self.name
            && self.is_active.map_or(true, |a| record.is_active == a)
            && self.owner_id.map_or(true, |id| record.owner_id == id)
            && self.state.map_or(true, |s| record.state == Some(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, active: bool, state: Option<RecordState>) -> CommandRecord {
        let now = Utc::now();
        CommandRecord {
            name: name.to_string(),
            owner_id: 1,
            role: None,
            command_type: None,
            content: None,
            caption: None,
            is_active: active,
            state,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_filter_matches() {
        assert!(CommandFilter::active("rules").matches(&record("rules", true, None)));
        assert!(!CommandFilter::active("rules").matches(&record("rules", false, None)));
        assert!(!CommandFilter::active("rules").matches(&record("faq", true, None)));
        assert!(CommandFilter::pending(1, "rules").matches(&record(
            "rules",
            false,
            Some(RecordState::Role)
        )));
        assert!(!CommandFilter::pending(2, "rules").matches(&record(
            "rules",
            false,
            Some(RecordState::Role)
        )));
    }

    #[test]
    fn test_record_serializes_type_field() {
        let mut rec = record("rules", true, None);
        rec.command_type = Some(CommandType::Copy);
        rec.role = Some(Role::Admins);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["type"], "copy");
        assert_eq!(json["role"], "admins");
        assert_eq!(json["state"], serde_json::Value::Null);
    }
}
