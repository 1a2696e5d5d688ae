//! 自定义命令注册流程 / Custom command registration flow
//!
//! 状态：`Start` → `AwaitingRole` → `Complete`，任一校验失败进入 `Rejected`。
//! States: `Start` → `AwaitingRole` → `Complete`, any failed gate ends in `Rejected`.
//!
//! 所有写入都发生在全部校验通过之后，并且每个事件只做一次读后写。
//! Every write happens after all gates pass, one read-then-write per event.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::context::{ChatKind, EventContext, InboundEvent};
use super::directive::DirectiveCodec;
use super::keyboard::{replace_suggestion, role_keyboard, role_keyboard_fits, role_prompt, Reply};
use super::models::{CommandFilter, CommandType, MetadataUpdate, NewCommand};
use super::reserved::ReservedNames;
use super::role::{normalize_role, Permissions, Role};
use super::store::CommandStore;
use crate::comm::config::ConfigError;
use crate::comm::config_validator::BotConfiguration;
use crate::error::{AppError, AppResult, PermissionScope, Rejection};

/// 注册命令本身的名字 / Name of the registration command itself
pub const ADD_COMMAND: &str = "addcommand";

lazy_static! {
    static ref NAME_RE: Regex = Regex::new(r"^!?(\w+)$").expect("valid regex");
}

/// 校验命令名并转为小写；`!Rules` → `rules`
/// Validates a command name and lower-cases it
pub fn canonical_name(input: &str) -> Option<String> {
    NAME_RE
        .captures(input)
        .map(|caps| caps[1].to_lowercase())
}

fn pending_ttl(secs: u64) -> AppResult<chrono::Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| {
            ConfigError::invalid("commands.pending_ttl_secs", "草稿保留时长超出范围").into()
        })
}

/// 事件被静默忽略的原因 / Why an event was silently ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// 频道，或群聊中未回复任何消息 / Channel, or a group message that is not a reply
    NotApplicable,
    /// 不是指令 / Not a directive
    NotADirective,
    /// 其他命令 / Some other command
    OtherCommand,
    /// 重复选择当前角色 / Re-selecting the current role
    Noop,
}

/// 流程状态 / Workflow state reached by an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Ignored,
    Rejected,
    AwaitingRole,
    Complete,
}

/// 单个事件的处理结果 / Result of handling one event
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Ignored(IgnoreReason),
    Rejected { rejection: Rejection, reply: Reply },
    /// 同名命令已存在且未要求替换 / Name taken and no replace requested
    AlreadyExists { name: String, reply: Reply },
    AwaitingRole { name: String, reply: Reply },
    Complete { name: String, role: Role, reply: Reply },
}

impl Outcome {
    fn rejected(rejection: Rejection) -> Self {
        let reply = Reply::text(rejection.user_message());
        Outcome::Rejected { rejection, reply }
    }

    pub fn reply(&self) -> Option<&Reply> {
        match self {
            Outcome::Ignored(_) => None,
            Outcome::Rejected { reply, .. }
            | Outcome::AlreadyExists { reply, .. }
            | Outcome::AwaitingRole { reply, .. }
            | Outcome::Complete { reply, .. } => Some(reply),
        }
    }

    pub fn state(&self) -> WorkflowState {
        match self {
            Outcome::Ignored(_) => WorkflowState::Ignored,
            Outcome::Rejected { .. } | Outcome::AlreadyExists { .. } => WorkflowState::Rejected,
            Outcome::AwaitingRole { .. } => WorkflowState::AwaitingRole,
            Outcome::Complete { .. } => WorkflowState::Complete,
        }
    }
}

/// 注册流程 / Registration workflow
///
/// 自身不持有可变状态，持久状态全部在 [`CommandStore`] 中。
/// Holds no mutable state of its own; durable state lives in the [`CommandStore`].
pub struct AddCommandWorkflow {
    store: Arc<dyn CommandStore>,
    codec: DirectiveCodec,
    permissions: Permissions,
    reserved: ReservedNames,
    pending_ttl: chrono::Duration,
}

impl AddCommandWorkflow {
    pub fn new(store: Arc<dyn CommandStore>) -> Self {
        Self {
            store,
            codec: DirectiveCodec::default(),
            permissions: Permissions::default(),
            reserved: ReservedNames::builtin(),
            pending_ttl: chrono::Duration::days(1),
        }
    }

    /// 从已校验的配置构建 / Builds from a validated configuration
    pub fn from_config(config: &BotConfiguration, store: Arc<dyn CommandStore>) -> AppResult<Self> {
        Ok(Self::new(store)
            .with_codec(DirectiveCodec::new(config.max_token_bytes))
            .with_permissions(Permissions::new(config.master_identity()?))
            .with_reserved(ReservedNames::builtin().extend(&config.reserved_names))
            .with_pending_ttl(pending_ttl(config.pending_ttl_secs)?))
    }

    pub fn with_codec(mut self, codec: DirectiveCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_reserved(mut self, reserved: ReservedNames) -> Self {
        self.reserved = reserved;
        self
    }

    pub fn with_pending_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.pending_ttl = ttl;
        self
    }

    pub fn codec(&self) -> &DirectiveCodec {
        &self.codec
    }

    /// 清理被放弃的草稿记录 / Reaps abandoned drafts older than the configured TTL
    pub async fn reap_abandoned(&self) -> AppResult<usize> {
        let reaped = self.store.reap_pending(self.pending_ttl).await?;
        if reaped > 0 {
            info!(reaped, "清理过期的草稿命令");
        }
        Ok(reaped)
    }

    #[instrument(skip_all, fields(chat_id = ctx.chat.id, actor_id = ctx.actor.id))]
    pub async fn handle(&self, ctx: &EventContext, event: &InboundEvent) -> AppResult<Outcome> {
        if ctx.chat.kind == ChatKind::Channel {
            return Ok(Outcome::Ignored(IgnoreReason::NotApplicable));
        }
        // 群聊里必须回复一条消息；按钮回调绑定在机器人之前的消息上，不受此限制
        if ctx.chat.kind != ChatKind::Private
            && matches!(event, InboundEvent::Message { .. })
            && ctx.reply_to.is_none()
        {
            return Ok(Outcome::Ignored(IgnoreReason::NotApplicable));
        }

        // 用户输入只接受 `/command` 形式，令牌只来自按钮回调
        let decoded = match event {
            InboundEvent::Message { text } => self.codec.decode_command_line(text),
            InboundEvent::Callback { data } => self.codec.decode(data),
        };
        let directive = match decoded {
            Ok(directive) => directive,
            Err(AppError::MalformedDirective { message, .. }) => {
                debug!(%message, raw = event.raw(), "忽略非指令事件");
                return Ok(Outcome::Ignored(IgnoreReason::NotADirective));
            }
            Err(e) => return Err(e),
        };
        if directive.command != ADD_COMMAND {
            return Ok(Outcome::Ignored(IgnoreReason::OtherCommand));
        }

        if !self.permissions.can_register(&ctx.actor) {
            warn!("非管理员尝试注册命令");
            return Ok(Outcome::rejected(Rejection::PermissionDenied {
                action: PermissionScope::Register,
            }));
        }

        if directive.flags.has("noop") {
            return Ok(Outcome::Ignored(IgnoreReason::Noop));
        }

        let Some(name) = canonical_name(&directive.reason) else {
            debug!(reason = %directive.reason, "命令名无效");
            return Ok(Outcome::rejected(Rejection::InvalidName {
                input: directive.reason.clone(),
            }));
        };
        if self.reserved.contains(&name) {
            warn!(%name, "尝试使用保留命令名");
            return Ok(Outcome::rejected(Rejection::ReservedName { name }));
        }
        // 两步流程也要检查，否则草稿之后的角色按钮无法编码
        if !role_keyboard_fits(&self.codec, ADD_COMMAND, &name)? {
            debug!(%name, max = self.codec.max_token_bytes(), "命令名过长");
            return Ok(Outcome::rejected(Rejection::InvalidName {
                input: directive.reason.clone(),
            }));
        }

        let replace = directive.flags.has("replace");
        let existing = self.store.get_command(&CommandFilter::active(&name)).await?;
        if let Some(existing) = &existing {
            if !replace {
                let reply = Reply::text(concat!(
                    "ℹ️ <b>This command already exists.</b>\n\n",
                    "/commands - to see the list of commands.\n",
                    "/addcommand <code>&lt;name&gt;</code> - to add a command.\n",
                    "/removecommand <code>&lt;name&gt;</code> - to remove a command."
                ))
                .with_keyboard(replace_suggestion(ADD_COMMAND, &name)?);
                return Ok(Outcome::AlreadyExists { name, reply });
            }
            if !self.permissions.can_replace(existing.role, &ctx.actor) {
                warn!(%name, "非 master 尝试替换 master 命令");
                return Ok(Outcome::rejected(Rejection::PermissionDenied {
                    action: PermissionScope::ReplaceMaster,
                }));
            }
        }

        let soft_replace = directive.flags.get("replace") == Some("soft");
        if ctx.reply_to.is_none() && !soft_replace {
            self.store
                .add_command(NewCommand::Pending {
                    owner_id: ctx.actor.id,
                    name: name.clone(),
                })
                .await?;
            info!(%name, "命令草稿已创建，等待选择角色");
            let reply = Reply::text("Who can use this command?").with_keyboard(role_prompt());
            return Ok(Outcome::AwaitingRole { name, reply });
        }

        let role = normalize_role(directive.flags.get("role"));
        // 先编码按钮，编码失败时不会留下写入
        let keyboard = role_keyboard(&self.codec, ADD_COMMAND, &name, role)?;

        match ctx.reply_to {
            Some(content) if !soft_replace => {
                self.store
                    .add_command(NewCommand::Complete {
                        owner_id: ctx.actor.id,
                        name: name.clone(),
                        role,
                        command_type: CommandType::Copy,
                        content,
                    })
                    .await?
            }
            _ => {
                self.store
                    .update_metadata_preserving_content(MetadataUpdate {
                        owner_id: ctx.actor.id,
                        name: name.clone(),
                        role,
                        command_type: CommandType::Copy,
                    })
                    .await?
            }
        }
        info!(%name, %role, replaced = existing.is_some(), "命令已保存");

        let reply = Reply::text(format!(
            "✅ <b>Successfully added <code>!{}</code></b>.\nWho should be able to use it?",
            name
        ))
        .with_keyboard(keyboard);
        Ok(Outcome::Complete { name, role, reply })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::command::context::Chat;
    use crate::modules::command::models::ContentRef;
    use crate::modules::command::role::{Actor, MasterIdentity, Standing};
    use crate::modules::command::store::MemoryCommandStore;

    fn private_admin(text: &str) -> (EventContext, InboundEvent) {
        (
            EventContext {
                chat: Chat {
                    id: 10,
                    kind: ChatKind::Private,
                },
                actor: Actor::new(10, Standing::Admin),
                reply_to: None,
            },
            InboundEvent::Message {
                text: text.to_string(),
            },
        )
    }

    #[test]
    fn test_canonical_name() {
        for input in ["!Rules", "rules", "RULES"] {
            assert_eq!(canonical_name(input).as_deref(), Some("rules"));
        }
        assert_eq!(canonical_name("two words"), None);
        assert_eq!(canonical_name("!!rules"), None);
        assert_eq!(canonical_name(""), None);
    }

    #[tokio::test]
    async fn test_ignores_channels() {
        let workflow = AddCommandWorkflow::new(Arc::new(MemoryCommandStore::new()));
        let (mut ctx, event) = private_admin("/addcommand rules");
        ctx.chat.kind = ChatKind::Channel;
        ctx.reply_to = Some(ContentRef {
            chat_id: 10,
            message_id: 1,
        });
        let outcome = workflow.handle(&ctx, &event).await.unwrap();
        assert_eq!(outcome, Outcome::Ignored(IgnoreReason::NotApplicable));
    }

    #[tokio::test]
    async fn test_group_message_requires_reply() {
        let store = Arc::new(MemoryCommandStore::new());
        let workflow = AddCommandWorkflow::new(store.clone());
        let (mut ctx, event) = private_admin("/addcommand rules");
        ctx.chat.kind = ChatKind::Supergroup;
        let outcome = workflow.handle(&ctx, &event).await.unwrap();
        assert_eq!(outcome.state(), WorkflowState::Ignored);
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_other_commands_and_plain_text_are_ignored() {
        let workflow = AddCommandWorkflow::new(Arc::new(MemoryCommandStore::new()));
        let (ctx, _) = private_admin("");
        for text in ["/removecommand rules", "just chatting"] {
            let event = InboundEvent::Message {
                text: text.to_string(),
            };
            let outcome = workflow.handle(&ctx, &event).await.unwrap();
            assert_eq!(outcome.state(), WorkflowState::Ignored, "{}", text);
        }
    }

    #[tokio::test]
    async fn test_master_may_register_without_admin_standing() {
        let store = Arc::new(MemoryCommandStore::new());
        let workflow = AddCommandWorkflow::new(store.clone())
            .with_permissions(Permissions::new(Some(MasterIdentity::Id(10))));
        let (mut ctx, event) = private_admin("/addcommand faq");
        ctx.actor.standing = Standing::Member;
        let outcome = workflow.handle(&ctx, &event).await.unwrap();
        assert_eq!(outcome.state(), WorkflowState::AwaitingRole);
    }

    #[tokio::test]
    async fn test_invalid_name_gets_usage_hint() {
        let store = Arc::new(MemoryCommandStore::new());
        let workflow = AddCommandWorkflow::new(store.clone());
        let (ctx, event) = private_admin("/addcommand two words");
        let outcome = workflow.handle(&ctx, &event).await.unwrap();
        match outcome {
            Outcome::Rejected { rejection, reply } => {
                assert!(matches!(rejection, Rejection::InvalidName { .. }));
                assert!(reply.text.contains("/addcommand rules"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_typed_token_is_not_a_directive() {
        let store = Arc::new(MemoryCommandStore::new());
        let workflow = AddCommandWorkflow::new(store.clone());
        let (ctx, event) = private_admin("addcommand::faq");
        let outcome = workflow.handle(&ctx, &event).await.unwrap();
        assert_eq!(outcome, Outcome::Ignored(IgnoreReason::NotADirective));
        assert!(store.snapshot().is_empty());

        let callback = InboundEvent::Callback {
            data: "addcommand::faq".to_string(),
        };
        let outcome = workflow.handle(&ctx, &callback).await.unwrap();
        assert_eq!(outcome.state(), WorkflowState::AwaitingRole);
    }

    #[tokio::test]
    async fn test_name_too_long_for_role_buttons_leaves_no_draft() {
        let store = Arc::new(MemoryCommandStore::new());
        let workflow = AddCommandWorkflow::new(store.clone());
        let (ctx, event) = private_admin(&format!("/addcommand {}", "a".repeat(22)));
        let outcome = workflow.handle(&ctx, &event).await.unwrap();
        assert!(matches!(
            outcome,
            Outcome::Rejected {
                rejection: Rejection::InvalidName { .. },
                ..
            }
        ));
        assert!(store.snapshot().is_empty());

        let (ctx, event) = private_admin(&format!("/addcommand {}", "a".repeat(21)));
        let outcome = workflow.handle(&ctx, &event).await.unwrap();
        assert_eq!(outcome.state(), WorkflowState::AwaitingRole);
    }

    #[test]
    fn test_pending_ttl_out_of_range() {
        assert_eq!(pending_ttl(60).unwrap(), chrono::Duration::seconds(60));
        for secs in [u64::MAX, i64::MAX as u64] {
            assert!(matches!(pending_ttl(secs), Err(AppError::Config(_))), "{}", secs);
        }

        let config = BotConfiguration {
            pending_ttl_secs: u64::MAX,
            ..Default::default()
        };
        assert!(AddCommandWorkflow::from_config(&config, Arc::new(MemoryCommandStore::new())).is_err());
    }

    #[tokio::test]
    async fn test_existing_without_replace_suggests_replace() {
        let store = Arc::new(MemoryCommandStore::new());
        let workflow = AddCommandWorkflow::new(store.clone());
        let (mut ctx, event) = private_admin("/addcommand rules");
        ctx.reply_to = Some(ContentRef {
            chat_id: 10,
            message_id: 3,
        });
        workflow.handle(&ctx, &event).await.unwrap();

        let outcome = workflow.handle(&ctx, &event).await.unwrap();
        let Outcome::AlreadyExists { name, reply } = outcome else {
            panic!("expected AlreadyExists");
        };
        assert_eq!(name, "rules");
        let keyboard = reply.keyboard.unwrap();
        assert_eq!(keyboard.reply_rows()[0][0], "/addcommand -replace rules");
        assert_eq!(store.snapshot().len(), 1);
    }
}
