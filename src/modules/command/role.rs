//! 角色与权限 / Roles and permissions

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 调用命令所需的最低权限 / Minimum privilege required to invoke a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Master,
    Admins,
    Everyone,
}

impl Role {
    /// 角色选择键盘的顺序 / Order used by role-selection keyboards
    pub const ALL: [Role; 3] = [Role::Master, Role::Admins, Role::Everyone];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Master => "master",
            Role::Admins => "admins",
            Role::Everyone => "everyone",
        }
    }

    /// 按钮上显示的名字 / Label shown on buttons
    pub fn label(&self) -> &'static str {
        match self {
            Role::Master => "Master",
            Role::Admins => "Admins",
            Role::Everyone => "Everyone",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 将任意文本归一化为三种角色之一，无法识别的一律为 `Everyone`
/// Maps arbitrary text to one of the three roles; anything unrecognized becomes `Everyone`
///
/// 仅用于赋值，不用于访问检查。
/// Used for assignment only, never for access checks.
pub fn normalize_role(input: Option<&str>) -> Role {
    match input.unwrap_or_default().to_lowercase().as_str() {
        "master" => Role::Master,
        "admins" => Role::Admins,
        _ => Role::Everyone,
    }
}

/// 聊天平台报告的成员身份 / Standing reported by the chat platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Standing {
    #[default]
    Member,
    Admin,
}

/// 触发事件的用户 / The user behind an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub standing: Standing,
}

impl Actor {
    pub fn new(id: i64, standing: Standing) -> Self {
        Self {
            id,
            username: None,
            standing,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// 进程级配置的 master 身份，可为数字 id 或 `@username`
/// Process-wide master identity, either a numeric id or a `@username`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MasterIdentity {
    Id(i64),
    Username(String),
}

impl FromStr for MasterIdentity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<i64>() {
            return Ok(MasterIdentity::Id(id));
        }
        let name = s.trim_start_matches('@');
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(format!("无效的 master 身份: {:?}", s));
        }
        Ok(MasterIdentity::Username(name.to_lowercase()))
    }
}

impl MasterIdentity {
    pub fn matches(&self, actor: &Actor) -> bool {
        match self {
            MasterIdentity::Id(id) => actor.id == *id,
            MasterIdentity::Username(name) => actor
                .username
                .as_deref()
                .map(|u| u.trim_start_matches('@').eq_ignore_ascii_case(name))
                .unwrap_or(false),
        }
    }
}

/// 权限判断 / Access decisions
#[derive(Debug, Clone, Default)]
pub struct Permissions {
    master: Option<MasterIdentity>,
}

impl Permissions {
    pub fn new(master: Option<MasterIdentity>) -> Self {
        Self { master }
    }

    /// 未配置 master 时没有人是 master
    pub fn is_master(&self, actor: &Actor) -> bool {
        self.master.as_ref().is_some_and(|m| m.matches(actor))
    }

    /// 只有管理员或 master 可以发起注册
    pub fn can_register(&self, actor: &Actor) -> bool {
        actor.standing == Standing::Admin || self.is_master(actor)
    }

    /// 替换 `master` 角色的命令需要 master 身份
    pub fn can_replace(&self, existing: Option<Role>, actor: &Actor) -> bool {
        existing != Some(Role::Master) || self.is_master(actor)
    }
}
