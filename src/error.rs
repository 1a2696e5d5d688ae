use thiserror::Error;

use crate::modules::command::store::StoreError;

/// 统一的应用错误类型
/// Unified application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("配置错误: {0}")]
    Config(#[from] crate::comm::config::ConfigError),

    /// 指令编码后超过传输载荷上限 / Encoded directive exceeds the transport payload ceiling
    #[error("指令编码过长: {len} 字节 (上限 {max})")]
    EncodingTooLarge { len: usize, max: usize },

    /// 输入不符合指令语法 / Input does not match the directive grammar
    #[error("指令格式错误: {message} (输入: {input:?})")]
    MalformedDirective { input: String, message: String },

    #[error("请求被拒绝: {0}")]
    Rejected(#[from] Rejection),

    #[error("存储错误: {0}")]
    Persistence(#[from] StoreError),

    #[error("内部错误: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// 创建指令格式错误
    pub fn malformed<T: Into<String>, U: Into<String>>(input: T, message: U) -> Self {
        Self::MalformedDirective {
            input: input.into(),
            message: message.into(),
        }
    }

    /// 获取错误代码
    pub fn error_code(&self) -> i32 {
        match self {
            AppError::Config(_) => 1001,
            AppError::EncodingTooLarge { .. } => 1002,
            AppError::MalformedDirective { .. } => 1003,
            AppError::Rejected(rejection) => rejection.error_code(),
            AppError::Persistence(_) => 1006,
            AppError::Internal(_) => 1000,
        }
    }

    /// 面向终端用户的提示文本 / Text shown to the end user
    ///
    /// 存储错误只给出通用提示，细节留在日志里
    /// Persistence failures get a generic message, details stay in the logs
    pub fn user_message(&self) -> String {
        match self {
            AppError::Rejected(rejection) => rejection.user_message(),
            _ => "⚠️ <b>Something went wrong, please try again later.</b>".to_string(),
        }
    }
}

/// 注册流程中的校验失败 / Validation failures of the registration flow
///
/// 这些是正常使用中的预期分支，作为 `Outcome::Rejected` 返回而不是 `Err`
/// These are expected branches of normal use, returned as `Outcome::Rejected` rather than `Err`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("权限不足: {action}")]
    PermissionDenied { action: PermissionScope },

    #[error("命令名无效: {input:?}")]
    InvalidName { input: String },

    #[error("命令名已被保留: {name}")]
    ReservedName { name: String },
}

/// 权限检查发生的位置 / Which authorization gate failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionScope {
    /// 仅管理员可注册命令 / Only admins may register commands
    Register,
    /// 仅 master 可替换 master 命令 / Only the master may replace master commands
    ReplaceMaster,
}

impl std::fmt::Display for PermissionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionScope::Register => write!(f, "register"),
            PermissionScope::ReplaceMaster => write!(f, "replace master command"),
        }
    }
}

impl Rejection {
    pub fn error_code(&self) -> i32 {
        match self {
            Rejection::PermissionDenied { .. } => 1004,
            Rejection::InvalidName { .. } | Rejection::ReservedName { .. } => 1005,
        }
    }

    /// 渲染发送给用户的 HTML 文本
    pub fn user_message(&self) -> String {
        match self {
            Rejection::PermissionDenied {
                action: PermissionScope::Register,
            } => "ℹ️ <b>Sorry, only admins access this command.</b>".to_string(),
            Rejection::PermissionDenied {
                action: PermissionScope::ReplaceMaster,
            } => "ℹ️ <b>Sorry, only master can replace this command.</b>".to_string(),
            Rejection::InvalidName { .. } => concat!(
                "<b>Send a valid command.</b>\n\n",
                "Example:\n",
                "<code>/addcommand rules</code>"
            )
            .to_string(),
            Rejection::ReservedName { .. } => concat!(
                "❗️ Sorry you can't use this name, it's preserved.\n\n",
                "Try another one."
            )
            .to_string(),
        }
    }
}

/// 应用结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_distinguish_rejections() {
        let denied = AppError::from(Rejection::PermissionDenied {
            action: PermissionScope::Register,
        });
        let reserved = AppError::from(Rejection::ReservedName {
            name: "help".to_string(),
        });
        assert_eq!(denied.error_code(), 1004);
        assert_eq!(reserved.error_code(), 1005);
    }

    #[test]
    fn test_persistence_message_is_generic() {
        let err = AppError::from(StoreError::Unavailable {
            message: "connection refused".to_string(),
        });
        assert!(!err.user_message().contains("connection refused"));
        assert!(err.to_string().contains("connection refused"));
    }
}
