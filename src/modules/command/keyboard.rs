//! 出站回复与键盘 / Outbound replies and keyboards
//!
//! 结构与 Telegram Bot API 的 `reply_markup` 保持一致，便于传输层直接序列化。
//! Shapes follow Telegram Bot API `reply_markup` so the transport can serialize them as is.

use serde::{Deserialize, Serialize};

use super::directive::{to_command_line, Directive, DirectiveCodec};
use super::role::Role;
use crate::error::{AppError, AppResult};

const SELECTED_MARK: &str = "✅ ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParseMode {
    #[default]
    #[serde(rename = "HTML")]
    Html,
}

/// 内联按钮，`callback_data` 为编码后的指令令牌
/// Inline button whose `callback_data` is an encoded directive token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Keyboard {
    /// 内联键盘 / Inline keyboard
    Inline {
        inline_keyboard: Vec<Vec<InlineButton>>,
    },
    /// 回复键盘，按钮文本就是下一条要发送的消息
    /// Reply keyboard, each button text is the next message to send
    Reply {
        keyboard: Vec<Vec<String>>,
        one_time_keyboard: bool,
        resize_keyboard: bool,
    },
}

impl Keyboard {
    pub fn one_time(rows: Vec<Vec<String>>) -> Self {
        Keyboard::Reply {
            keyboard: rows,
            one_time_keyboard: true,
            resize_keyboard: true,
        }
    }

    pub fn inline_rows(&self) -> &[Vec<InlineButton>] {
        match self {
            Keyboard::Inline { inline_keyboard } => inline_keyboard,
            Keyboard::Reply { .. } => &[],
        }
    }

    pub fn reply_rows(&self) -> &[Vec<String>] {
        match self {
            Keyboard::Reply { keyboard, .. } => keyboard,
            Keyboard::Inline { .. } => &[],
        }
    }
}

/// 回复给用户的消息 / Message sent back to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    #[serde(default)]
    pub parse_mode: ParseMode,
    #[serde(skip_serializing_if = "Option::is_none", rename = "reply_markup")]
    pub keyboard: Option<Keyboard>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parse_mode: ParseMode::Html,
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// 角色选择内联键盘：当前角色带 ✅ 并标记 `noop`，重复点击不产生写入
/// Role-selection inline keyboard: the current role is marked ✅ and tagged `noop`
pub fn role_keyboard(
    codec: &DirectiveCodec,
    command: &str,
    name: &str,
    current: Role,
) -> AppResult<Keyboard> {
    let row = Role::ALL
        .iter()
        .map(|&candidate| {
            let selected = candidate == current;
            let directive = Directive::new(command)
                .with_bool("noop", selected)
                .with_value("role", candidate.label())
                .with_value("replace", "soft")
                .with_reason(name);
            let text = if selected {
                format!("{}{}", SELECTED_MARK, candidate.label())
            } else {
                candidate.label().to_string()
            };
            Ok(InlineButton {
                text,
                callback_data: codec.encode(&directive)?,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Keyboard::Inline {
        inline_keyboard: vec![row],
    })
}

/// 最长的角色按钮：带 `noop` 且角色标签最长
/// The longest role button: `noop`-tagged with the longest role label
fn longest_role_button(command: &str, name: &str) -> Directive {
    let label = Role::ALL
        .iter()
        .map(|role| role.label())
        .max_by_key(|label| label.len())
        .unwrap_or_default();
    Directive::new(command)
        .with_flag("noop")
        .with_value("role", label)
        .with_value("replace", "soft")
        .with_reason(name)
}

/// 该命令名的所有角色按钮是否都能在上限内编码
/// Whether every role button for this name encodes within the codec ceiling
pub fn role_keyboard_fits(codec: &DirectiveCodec, command: &str, name: &str) -> AppResult<bool> {
    match codec.encode(&longest_role_button(command, name)) {
        Ok(_) => Ok(true),
        Err(AppError::EncodingTooLarge { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

/// 一键替换建议：`/addcommand -replace <name>`
/// One-tap replace suggestion
pub fn replace_suggestion(command: &str, name: &str) -> AppResult<Keyboard> {
    let directive = Directive::new(command).with_flag("replace").with_reason(name);
    Ok(Keyboard::one_time(vec![vec![to_command_line(&directive)?]]))
}

/// 两步流程的角色选择回复键盘
/// Reply keyboard for the two-step flow
pub fn role_prompt() -> Keyboard {
    Keyboard::one_time(vec![Role::ALL
        .iter()
        .map(|role| role.label().to_string())
        .collect()])
}
