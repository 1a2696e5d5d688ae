use clap::ArgMatches;
use std::error::Error;

use v_chat_commands::comm::enhanced_config::EnhancedConfigManager;
use v_chat_commands::comm::tracing::init_tracing;
use v_chat_commands::{build_app, handle_command, init_commands};

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // 配置加载失败时仍然用默认级别输出日志
    let level = EnhancedConfigManager::new()
        .map(|manager| manager.get_bot_config().logging_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_tracing(&level)?;

    // 初始化所有模块的命令
    init_commands();

    // 构建命令行应用
    let matches: ArgMatches = build_app().get_matches();

    match matches.subcommand() {
        Some(("version", _)) => {
            println!("v-chat-commands {}", env!("CARGO_PKG_VERSION"));
        }
        Some((command_name, sub_matches)) => {
            // 尝试使用模块处理命令
            if let Err(e) = handle_command(command_name, sub_matches) {
                eprintln!("处理命令 '{}' 时出错: {}", command_name, e);
                std::process::exit(1);
            }
        }
        None => {
            // 这种情况不应该发生，因为我们设置了 subcommand_required(true)
            eprintln!("未知命令，请使用 --help 查看可用命令");
            std::process::exit(1);
        }
    }

    Ok(())
}
