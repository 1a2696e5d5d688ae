/// 自定义命令模块
/// Custom command module
///
/// 包含指令编解码、角色权限、注册流程和命令存储
/// Directive codec, role permissions, the registration flow and the command store
pub mod cmd;
pub mod context;
pub mod directive;
pub mod keyboard;
pub mod models;
pub mod reserved;
pub mod role;
pub mod store;
pub mod workflow;

pub use context::{Chat, ChatKind, EventContext, InboundEvent};
pub use directive::{decode, encode, to_command_line, Directive, DirectiveCodec, Flags};
pub use keyboard::{InlineButton, Keyboard, Reply};
pub use models::{CommandFilter, CommandRecord, ContentRef};
pub use role::{normalize_role, Actor, MasterIdentity, Permissions, Role, Standing};
pub use store::{CommandStore, MemoryCommandStore, StoreError};
pub use workflow::{AddCommandWorkflow, Outcome, WorkflowState};

/// 注册命令模块的 CLI 命令
pub fn register_command_commands() {
    crate::command_registry::register_module(Box::new(cmd::DirectiveCommands));
}
