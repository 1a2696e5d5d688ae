//! 群聊自定义命令注册
//! Custom chat command registration
//!
//! - [`modules::command::directive`]: 指令编解码 / directive codec
//! - [`modules::command::workflow`]: 注册流程 / registration workflow
//! - [`modules::command::store`]: 命令存储接口 / command store interface

pub mod comm;
pub mod error;
#[path = "bootstrap/command_registry.rs"]
pub mod command_registry;

// Modules
pub mod modules;

/// 初始化所有模块的命令
pub fn init_commands() {
    modules::command::register_command_commands();
}

pub use command_registry::*;
pub use error::{AppError, AppResult};
