use clap::{Arg, ArgAction, Command};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

use super::context::{EventContext, InboundEvent};
use super::directive::{decode, to_command_line, Directive, DirectiveCodec};
use super::store::MemoryCommandStore;
use super::workflow::{AddCommandWorkflow, ADD_COMMAND};
use crate::command_registry::CommandModule;
use crate::comm::enhanced_config::EnhancedConfigManager;

type CmdResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// 指令相关的命令行工具 / Directive CLI tools
pub struct DirectiveCommands;

/// 回放文件中的一条事件 / One event of a replay file
#[derive(Debug, Deserialize)]
struct ReplayStep {
    context: EventContext,
    event: InboundEvent,
}

impl CommandModule for DirectiveCommands {
    fn module_name(&self) -> &'static str {
        "command"
    }

    fn register_commands(&self) -> Vec<Command> {
        vec![
            Command::new("encode")
                .about("把指令编码为回调令牌")
                .arg(
                    Arg::new("command")
                        .short('c')
                        .long("command")
                        .value_name("COMMAND")
                        .default_value(ADD_COMMAND),
                )
                .arg(
                    Arg::new("flag")
                        .short('f')
                        .long("flag")
                        .value_name("KEY[=VALUE]")
                        .help("标志，可重复")
                        .action(ArgAction::Append),
                )
                .arg(Arg::new("reason").value_name("REASON").default_value(""))
                .arg(
                    Arg::new("line")
                        .long("line")
                        .help("输出命令行形式而不是令牌")
                        .action(ArgAction::SetTrue),
                ),
            Command::new("decode")
                .about("解码令牌或命令行，输出 JSON")
                .arg(Arg::new("input").value_name("INPUT").required(true)),
            Command::new("simulate")
                .about("用内存存储回放 JSON 事件文件")
                .arg(
                    Arg::new("events")
                        .short('e')
                        .long("events")
                        .value_name("FILE")
                        .required(true),
                ),
        ]
    }

    fn handle_command(&self, command_name: &str, matches: &clap::ArgMatches) -> CmdResult {
        match command_name {
            "encode" => handle_encode(matches),
            "decode" => handle_decode(matches),
            "simulate" => handle_simulate(matches),
            _ => Err(format!("未知命令: {}", command_name).into()),
        }
    }
}

fn load_config() -> Result<EnhancedConfigManager, Box<dyn std::error::Error + Send + Sync>> {
    let manager = EnhancedConfigManager::new()?;
    manager.validate_required_config()?;
    Ok(manager)
}

fn handle_encode(matches: &clap::ArgMatches) -> CmdResult {
    let config = load_config()?;
    let command = matches
        .get_one::<String>("command")
        .map(String::as_str)
        .unwrap_or(ADD_COMMAND);
    let mut directive = Directive::new(command);
    if let Some(reason) = matches.get_one::<String>("reason") {
        directive.reason = reason.clone();
    }
    for flag in matches.get_many::<String>("flag").into_iter().flatten() {
        match flag.split_once('=') {
            Some((key, value)) => directive.flags.set_value(key, value),
            None => directive.flags.set(flag.as_str()),
        };
    }

    let output = if matches.get_flag("line") {
        to_command_line(&directive)?
    } else {
        DirectiveCodec::new(config.get_bot_config().max_token_bytes).encode(&directive)?
    };
    println!("{}", output);
    Ok(())
}

fn handle_decode(matches: &clap::ArgMatches) -> CmdResult {
    let input = matches
        .get_one::<String>("input")
        .ok_or("缺少输入")?;
    let directive = decode(input)?;
    println!("{}", serde_json::to_string_pretty(&directive)?);
    Ok(())
}

fn handle_simulate(matches: &clap::ArgMatches) -> CmdResult {
    let config = load_config()?;
    config.print_config_summary();

    let path = matches.get_one::<String>("events").ok_or("缺少事件文件")?;
    let steps: Vec<ReplayStep> = serde_json::from_str(&std::fs::read_to_string(path)?)?;

    let store = Arc::new(MemoryCommandStore::new());
    let workflow = AddCommandWorkflow::from_config(config.get_bot_config(), store.clone())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        workflow.reap_abandoned().await?;
        for step in &steps {
            match workflow.handle(&step.context, &step.event).await {
                Ok(outcome) => println!(
                    "{}",
                    serde_json::json!({
                        "state": outcome.state(),
                        "reply": outcome.reply(),
                    })
                ),
                Err(e) => {
                    error!(code = e.error_code(), "处理事件失败: {}", e);
                    println!("{}", serde_json::json!({ "error": e.user_message() }));
                }
            }
        }
        Ok::<_, crate::error::AppError>(())
    })?;

    println!("{}", serde_json::to_string_pretty(&store.active())?);
    Ok(())
}
