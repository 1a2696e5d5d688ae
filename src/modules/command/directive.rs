//! 指令编解码 / Directive codec
//!
//! 指令 `{command, flags, reason}` 有两种文本形式：
//! A directive `{command, flags, reason}` has two textual forms:
//!
//! - 紧凑令牌，用于按钮回调数据：`addcommand:noop,replace=soft,role=Admins:rules`
//!   Compact token used as button callback data
//! - 用户输入的命令行：`/addcommand -replace=soft -role=admins rules`
//!   Typed command line
//!
//! [`decode`] 同时接受两种形式；[`encode`] 生成令牌，[`to_command_line`] 生成命令行。
//! [`decode`] accepts both; [`encode`] produces tokens, [`to_command_line`] produces command lines.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};

/// Telegram `callback_data` 的上限
pub const DEFAULT_MAX_TOKEN_BYTES: usize = 64;

const FLAG_MARKER: char = '-';
const END_OF_FLAGS: &str = "--";

lazy_static! {
    static ref WORD_RE: Regex = Regex::new(r"^\w+$").expect("valid regex");
    static ref TOKEN_RE: Regex =
        Regex::new(r"(?s)^(?P<command>\w+):(?P<flags>[^:]*):(?P<reason>.*)$").expect("valid regex");
    static ref TOKEN_FLAG_RE: Regex =
        Regex::new(r"^(?P<key>\w+)(?:=(?P<value>[^,:\s]*))?$").expect("valid regex");
    static ref LINE_COMMAND_RE: Regex =
        Regex::new(r"^/(?P<command>\w+)(?:@\w+)?(?:\s+|$)").expect("valid regex");
    static ref LINE_FLAG_RE: Regex =
        Regex::new(r"^-(?P<key>\w+)(?:=(?P<value>\S*))?(?:\s+|$)").expect("valid regex");
    static ref LINE_END_OF_FLAGS_RE: Regex = Regex::new(r"^--(?:\s+|$)").expect("valid regex");
}

/// 标志值 / Flag value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    /// 仅出现，无值，等价于 true / Present without a value, meaning true
    Present,
    Value(String),
}

/// 标志集合，键区分大小写、无序 / Flag bag with case-sensitive, unordered keys
///
/// "是否存在" 与 "取值" 是两个不同的查询：`-replace` 存在但没有值。
/// "Has flag" and "flag value" are separate queries: `-replace` is present with no value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags(BTreeMap<String, FlagValue>);

impl Flags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// 取值；仅出现的标志返回 `None`
    pub fn get(&self, key: &str) -> Option<&str> {
        match self.0.get(key)? {
            FlagValue::Present => None,
            FlagValue::Value(value) => Some(value.as_str()),
        }
    }

    pub fn set(&mut self, key: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), FlagValue::Present);
        self
    }

    pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), FlagValue::Value(value.into()));
        self
    }

    /// false 的布尔标志不会被编码，直接移除
    /// A false boolean flag is never encoded, so it is removed
    pub fn set_bool(&mut self, key: impl Into<String>, on: bool) -> &mut Self {
        let key = key.into();
        if on {
            self.0.insert(key, FlagValue::Present);
        } else {
            self.0.remove(&key);
        }
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<FlagValue> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlagValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// 指令：每个事件新建，不持久化
/// Directive: built fresh per event, never persisted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub command: String,
    #[serde(default)]
    pub flags: Flags,
    #[serde(default)]
    pub reason: String,
}

impl Directive {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            flags: Flags::new(),
            reason: String::new(),
        }
    }

    pub fn with_flag(mut self, key: impl Into<String>) -> Self {
        self.flags.set(key);
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.flags.set_value(key, value);
        self
    }

    pub fn with_bool(mut self, key: impl Into<String>, on: bool) -> Self {
        self.flags.set_bool(key, on);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// 检查命令名与标志能否被无损表示
    /// Checks that the command and flags can be represented losslessly
    fn check_representable(&self, separators: &[char]) -> AppResult<()> {
        if !WORD_RE.is_match(&self.command) {
            return Err(AppError::malformed(&self.command, "命令名必须是单词字符"));
        }
        for (key, value) in self.flags.iter() {
            if !WORD_RE.is_match(key) {
                return Err(AppError::malformed(key, "标志名必须是单词字符"));
            }
            if let FlagValue::Value(value) = value {
                if value.chars().any(|c| c.is_whitespace() || separators.contains(&c)) {
                    return Err(AppError::malformed(value, "标志值包含不可编码的字符"));
                }
            }
        }
        Ok(())
    }
}

/// 带配置上限的编解码器 / Codec bound to the configured token ceiling
#[derive(Debug, Clone, Copy)]
pub struct DirectiveCodec {
    max_token_bytes: usize,
}

impl Default for DirectiveCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKEN_BYTES)
    }
}

impl DirectiveCodec {
    pub fn new(max_token_bytes: usize) -> Self {
        Self { max_token_bytes }
    }

    pub fn max_token_bytes(&self) -> usize {
        self.max_token_bytes
    }

    pub fn encode(&self, directive: &Directive) -> AppResult<String> {
        encode(directive, self.max_token_bytes)
    }

    pub fn decode(&self, raw: &str) -> AppResult<Directive> {
        decode(raw)
    }

    pub fn decode_command_line(&self, raw: &str) -> AppResult<Directive> {
        decode_command_line(raw)
    }
}

/// 编码为紧凑令牌，超过 `max_bytes` 时返回 `EncodingTooLarge`，从不截断
/// Encodes to a compact token; never truncates, fails with `EncodingTooLarge` past `max_bytes`
pub fn encode(directive: &Directive, max_bytes: usize) -> AppResult<String> {
    directive.check_representable(&[',', ':'])?;

    let flags = directive
        .flags
        .iter()
        .map(|(key, value)| match value {
            FlagValue::Present => key.to_string(),
            FlagValue::Value(value) => format!("{}={}", key, value),
        })
        .collect::<Vec<_>>()
        .join(",");
    let token = format!("{}:{}:{}", directive.command, flags, directive.reason);

    if token.len() > max_bytes {
        return Err(AppError::EncodingTooLarge {
            len: token.len(),
            max: max_bytes,
        });
    }
    Ok(token)
}

/// 渲染为可直接发送的命令行 / Renders a ready-to-send command line
pub fn to_command_line(directive: &Directive) -> AppResult<String> {
    directive.check_representable(&[])?;
    // 命令行形式会吞掉理由开头的空白
    if directive.reason.starts_with(char::is_whitespace) {
        return Err(AppError::malformed(
            &directive.reason,
            "理由不能以空白开头",
        ));
    }

    let mut line = format!("/{}", directive.command);
    for (key, value) in directive.flags.iter() {
        line.push(' ');
        line.push(FLAG_MARKER);
        line.push_str(key);
        if let FlagValue::Value(value) = value {
            line.push('=');
            line.push_str(value);
        }
    }
    if !directive.reason.is_empty() {
        line.push(' ');
        // 以 '-' 开头的理由需要显式结束标志列表
        if directive.reason.starts_with(FLAG_MARKER) {
            line.push_str(END_OF_FLAGS);
            line.push(' ');
        }
        line.push_str(&directive.reason);
    }
    Ok(line)
}

/// 解码令牌或用户输入的命令行
/// Decodes either a callback token or a typed command line
pub fn decode(raw: &str) -> AppResult<Directive> {
    if raw.trim().is_empty() {
        return Err(AppError::malformed(raw, "输入为空"));
    }
    if raw.starts_with('/') {
        decode_command_line(raw)
    } else {
        decode_token(raw)
    }
}

fn decode_token(raw: &str) -> AppResult<Directive> {
    let caps = TOKEN_RE
        .captures(raw)
        .ok_or_else(|| AppError::malformed(raw, "不是有效的令牌"))?;

    let mut flags = Flags::new();
    let flag_part = &caps["flags"];
    if !flag_part.is_empty() {
        for item in flag_part.split(',') {
            let flag = TOKEN_FLAG_RE
                .captures(item)
                .ok_or_else(|| AppError::malformed(raw, format!("无效的标志: {:?}", item)))?;
            match flag.name("value") {
                Some(value) => flags.set_value(&flag["key"], value.as_str()),
                None => flags.set(&flag["key"]),
            };
        }
    }

    Ok(Directive {
        command: caps["command"].to_string(),
        flags,
        reason: caps["reason"].to_string(),
    })
}

/// 只解码用户输入的命令行形式 / Decodes the typed `/command` form only
pub fn decode_command_line(raw: &str) -> AppResult<Directive> {
    let caps = LINE_COMMAND_RE
        .captures(raw)
        .ok_or_else(|| AppError::malformed(raw, "不是有效的命令"))?;
    let command = caps["command"].to_string();
    let mut rest = &raw[caps.get(0).map_or(0, |m| m.end())..];

    let mut flags = Flags::new();
    loop {
        if let Some(end) = LINE_END_OF_FLAGS_RE.find(rest) {
            rest = &rest[end.end()..];
            break;
        }
        let Some(flag) = LINE_FLAG_RE.captures(rest) else {
            break;
        };
        match flag.name("value") {
            Some(value) => flags.set_value(&flag["key"], value.as_str()),
            None => flags.set(&flag["key"]),
        };
        rest = &rest[flag.get(0).map_or(0, |m| m.end())..];
    }

    Ok(Directive {
        command,
        flags,
        reason: rest.trim_start().to_string(),
    })
}
