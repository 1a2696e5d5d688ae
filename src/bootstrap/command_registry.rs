use clap::Command;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

/// 命令注册器特trait，各模块实现此trait来注册命令
pub trait CommandModule {
    /// 获取模块名称
    fn module_name(&self) -> &'static str;

    /// 注册模块的子命令
    fn register_commands(&self) -> Vec<Command>;

    /// 处理模块命令
    fn handle_command(
        &self,
        command_name: &str,
        matches: &clap::ArgMatches,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// 命令注册器，使用单例模式
pub struct CommandRegistry {
    modules: BTreeMap<String, Box<dyn CommandModule + Send + Sync>>,
}

impl CommandRegistry {
    fn new() -> Self {
        Self {
            modules: BTreeMap::new(),
        }
    }

    /// 获取全局单例实例
    pub fn instance() -> &'static Arc<Mutex<CommandRegistry>> {
        static INSTANCE: OnceLock<Arc<Mutex<CommandRegistry>>> = OnceLock::new();
        INSTANCE.get_or_init(|| Arc::new(Mutex::new(CommandRegistry::new())))
    }

    /// 注册模块
    pub fn register_module(&mut self, module: Box<dyn CommandModule + Send + Sync>) {
        let module_name = module.module_name().to_string();
        self.modules.insert(module_name, module);
    }

    /// 构建完整的命令行应用
    pub fn build_app(&self) -> Command {
        let mut app = Command::new("v-chat-commands")
            .version(env!("CARGO_PKG_VERSION"))
            .about("群聊自定义命令注册工具 / Custom chat command registration toolkit")
            .subcommand_required(true)
            .arg_required_else_help(true);

        // 添加内置的version命令
        app = app.subcommand(Command::new("version").about("显示版本信息"));

        // 添加各模块注册的命令
        for module in self.modules.values() {
            for command in module.register_commands() {
                app = app.subcommand(command);
            }
        }

        app
    }

    /// 处理命令
    pub fn handle_command(
        &self,
        command_name: &str,
        matches: &clap::ArgMatches,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // 查找对应的模块来处理命令
        for module in self.modules.values() {
            if module
                .register_commands()
                .iter()
                .any(|command| command.get_name() == command_name)
            {
                return module.handle_command(command_name, matches);
            }
        }

        Err(format!("未找到处理命令 '{}' 的模块", command_name).into())
    }
}

/// 便捷函数：注册模块
pub fn register_module(module: Box<dyn CommandModule + Send + Sync>) {
    CommandRegistry::instance().lock().register_module(module);
}

pub fn build_app() -> Command {
    CommandRegistry::instance().lock().build_app()
}

pub fn handle_command(
    command_name: &str,
    matches: &clap::ArgMatches,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    CommandRegistry::instance()
        .lock()
        .handle_command(command_name, matches)
}
