//! 命令存储接口与内存实现
//! Command store interface and in-memory implementation

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

use super::models::{CommandFilter, CommandRecord, MetadataUpdate, NewCommand, RecordState};

/// 存储层错误 / Store-layer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("存储不可用: {message}")]
    Unavailable { message: String },

    #[error("写入失败: {message}")]
    WriteFailed { message: String },
}

/// 命令存储 / Command store
///
/// 写入同名记录时执行逻辑替换：旧的活跃记录变为非活跃，不会同时存在两条活跃记录。
/// Writing a name that already has an active record performs a logical replace: the previous
/// one goes inactive, so two active records with the same name never coexist.
#[async_trait]
pub trait CommandStore: Send + Sync {
    async fn get_command(&self, filter: &CommandFilter) -> Result<Option<CommandRecord>, StoreError>;

    /// `Pending` 写入按 `{owner_id, name}` 覆盖该用户之前的草稿
    /// `Pending` writes overwrite the owner's previous draft keyed by `{owner_id, name}`
    async fn add_command(&self, command: NewCommand) -> Result<(), StoreError>;

    /// 软替换：写入新的活跃记录，内容沿用旧记录（旧记录没有内容时为空）
    /// Soft replace: writes a new active record carrying over the previous content (none if absent)
    async fn update_metadata_preserving_content(
        &self,
        update: MetadataUpdate,
    ) -> Result<(), StoreError>;

    /// 清理超过 `older_than` 仍未完成的草稿，返回清理数量
    /// Removes drafts left unfinished for longer than `older_than`, returning how many
    async fn reap_pending(&self, older_than: chrono::Duration) -> Result<usize, StoreError>;
}

/// 内存存储，后写者胜 / In-memory store with last-write-wins semantics
#[derive(Debug, Default)]
pub struct MemoryCommandStore {
    records: RwLock<Vec<CommandRecord>>,
}

impl MemoryCommandStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有记录，包括历史记录 / Every record including history
    pub fn snapshot(&self) -> Vec<CommandRecord> {
        self.records.read().clone()
    }

    pub fn active(&self) -> Vec<CommandRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.is_active)
            .cloned()
            .collect()
    }

    fn deactivate(records: &mut [CommandRecord], name: &str) {
        let now = Utc::now();
        for record in records.iter_mut().filter(|r| r.is_active && r.name == name) {
            record.is_active = false;
            record.updated_at = now;
        }
    }
}

#[async_trait]
impl CommandStore for MemoryCommandStore {
    async fn get_command(&self, filter: &CommandFilter) -> Result<Option<CommandRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .iter()
            .rev()
            .find(|r| filter.matches(r))
            .cloned())
    }

    async fn add_command(&self, command: NewCommand) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut records = self.records.write();
        match command {
            NewCommand::Pending { owner_id, name } => {
                records.retain(|r| {
                    !(r.owner_id == owner_id && r.name == name && r.state == Some(RecordState::Role))
                });
                debug!(name = %name, owner_id, "存储草稿记录");
                records.push(CommandRecord {
                    name,
                    owner_id,
                    role: None,
                    command_type: None,
                    content: None,
                    caption: None,
                    is_active: false,
                    state: Some(RecordState::Role),
                    created_at: now,
                    updated_at: now,
                });
            }
            NewCommand::Complete {
                owner_id,
                name,
                role,
                command_type,
                content,
            } => {
                Self::deactivate(&mut records, &name);
                records.retain(|r| !(r.owner_id == owner_id && r.name == name && r.is_pending()));
                debug!(name = %name, owner_id, role = %role, "存储完整记录");
                records.push(CommandRecord {
                    name,
                    owner_id,
                    role: Some(role),
                    command_type: Some(command_type),
                    content: Some(content),
                    caption: None,
                    is_active: true,
                    state: None,
                    created_at: now,
                    updated_at: now,
                });
            }
        }
        Ok(())
    }

    async fn update_metadata_preserving_content(
        &self,
        update: MetadataUpdate,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut records = self.records.write();
        let previous = records
            .iter()
            .rev()
            .find(|r| r.is_active && r.name == update.name)
            .and_then(|r| r.content);

        Self::deactivate(&mut records, &update.name);
        debug!(name = %update.name, role = %update.role, kept_content = previous.is_some(), "软替换记录");
        records.push(CommandRecord {
            name: update.name,
            owner_id: update.owner_id,
            role: Some(update.role),
            command_type: Some(update.command_type),
            content: previous,
            caption: None,
            is_active: true,
            state: None,
            created_at: now,
            updated_at: now,
        });
        Ok(())
    }

    async fn reap_pending(&self, older_than: chrono::Duration) -> Result<usize, StoreError> {
        // 截止时间早于可表示范围时没有草稿会过期
        let Some(cutoff) = Utc::now().checked_sub_signed(older_than) else {
            return Ok(0);
        };
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|r| !(r.is_pending() && r.updated_at < cutoff));
        Ok(before - records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::command::models::{CommandType, ContentRef};
    use crate::modules::command::role::Role;

    fn complete(name: &str, role: Role, message_id: i64) -> NewCommand {
        NewCommand::Complete {
            owner_id: 1,
            name: name.to_string(),
            role,
            command_type: CommandType::Copy,
            content: ContentRef {
                chat_id: -100,
                message_id,
            },
        }
    }

    #[tokio::test]
    async fn test_add_replaces_active_record() {
        let store = MemoryCommandStore::new();
        store.add_command(complete("rules", Role::Everyone, 1)).await.unwrap();
        store.add_command(complete("rules", Role::Admins, 2)).await.unwrap();

        let active = store.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].role, Some(Role::Admins));
        assert_eq!(store.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn test_soft_replace_keeps_content() {
        let store = MemoryCommandStore::new();
        store.add_command(complete("rules", Role::Everyone, 7)).await.unwrap();
        store
            .update_metadata_preserving_content(MetadataUpdate {
                owner_id: 2,
                name: "rules".to_string(),
                role: Role::Master,
                command_type: CommandType::Copy,
            })
            .await
            .unwrap();

        let current = store
            .get_command(&CommandFilter::active("rules"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.role, Some(Role::Master));
        assert_eq!(current.content.map(|c| c.message_id), Some(7));
        assert_eq!(store.active().len(), 1);
    }

    #[tokio::test]
    async fn test_pending_draft_is_overwritten_and_inactive() {
        let store = MemoryCommandStore::new();
        for _ in 0..2 {
            store
                .add_command(NewCommand::Pending {
                    owner_id: 5,
                    name: "faq".to_string(),
                })
                .await
                .unwrap();
        }
        assert_eq!(store.snapshot().len(), 1);
        assert!(store
            .get_command(&CommandFilter::active("faq"))
            .await
            .unwrap()
            .is_none());
        assert!(store
            .get_command(&CommandFilter::pending(5, "faq"))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_reap_pending() {
        let store = MemoryCommandStore::new();
        store
            .add_command(NewCommand::Pending {
                owner_id: 5,
                name: "faq".to_string(),
            })
            .await
            .unwrap();
        store.add_command(complete("rules", Role::Everyone, 1)).await.unwrap();

        assert_eq!(store.reap_pending(chrono::Duration::hours(1)).await.unwrap(), 0);
        assert_eq!(store.reap_pending(chrono::Duration::seconds(-1)).await.unwrap(), 1);
        assert_eq!(store.active().len(), 1);
    }

    #[tokio::test]
    async fn test_reap_pending_with_unrepresentable_cutoff() {
        let store = MemoryCommandStore::new();
        store
            .add_command(NewCommand::Pending {
                owner_id: 5,
                name: "faq".to_string(),
            })
            .await
            .unwrap();

        let ttl = chrono::Duration::try_days(365 * 1_000_000).unwrap();
        assert_eq!(store.reap_pending(ttl).await.unwrap(), 0);
        assert_eq!(store.snapshot().len(), 1);
    }
}
