use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::comm::config::ConfigError;
use crate::modules::command::directive::DEFAULT_MAX_TOKEN_BYTES;
use crate::modules::command::role::MasterIdentity;

lazy_static! {
    static ref RESERVED_NAME_RE: Regex = Regex::new(r"^/?\w+$").expect("valid regex");
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// 最长的角色按钮前缀 `addcommand:noop,replace=soft,role=Everyone:` 为 43 字节，
/// 再留出一个短命令名的空间
/// The longest role button prefix is 43 bytes, plus room for a short name
const MIN_TOKEN_BYTES: usize = 48;
const MAX_TOKEN_BYTES: usize = 4096;

/// 草稿最长保留一年 / Drafts are kept for at most a year
const MAX_PENDING_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// 机器人配置 / Bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfiguration {
    /// master 身份：数字 id 或 `@username`
    pub master: Option<String>,
    pub max_token_bytes: usize,
    /// 额外的保留命令名
    pub reserved_names: Vec<String>,
    /// 草稿记录保留时长（秒）
    pub pending_ttl_secs: u64,
    pub logging_level: String,
}

impl Default for BotConfiguration {
    fn default() -> Self {
        Self {
            master: None,
            max_token_bytes: DEFAULT_MAX_TOKEN_BYTES,
            reserved_names: Vec::new(),
            pending_ttl_secs: 86400,
            logging_level: "info".to_string(),
        }
    }
}

impl BotConfiguration {
    /// 解析 master 身份，未配置时为 `None`
    pub fn master_identity(&self) -> Result<Option<MasterIdentity>, ConfigError> {
        self.master
            .as_deref()
            .map(|m| {
                m.parse::<MasterIdentity>()
                    .map_err(|e| ConfigError::invalid("bot.master", e))
            })
            .transpose()
    }
}

/// 配置验证器
pub struct ConfigValidator;

impl ConfigValidator {
    /// 验证整个配置
    pub fn validate_config(config: &BotConfiguration) -> Result<(), ConfigError> {
        config.master_identity()?;

        if !(MIN_TOKEN_BYTES..=MAX_TOKEN_BYTES).contains(&config.max_token_bytes) {
            return Err(ConfigError::invalid(
                "directive.max_token_bytes",
                format!(
                    "令牌上限必须在{}-{}字节范围内",
                    MIN_TOKEN_BYTES, MAX_TOKEN_BYTES
                ),
            ));
        }

        if let Some(bad) = config
            .reserved_names
            .iter()
            .find(|name| !RESERVED_NAME_RE.is_match(name))
        {
            return Err(ConfigError::invalid(
                "commands.reserved",
                format!("无效的命令名: {:?}", bad),
            ));
        }

        if !(1..=MAX_PENDING_TTL_SECS).contains(&config.pending_ttl_secs) {
            return Err(ConfigError::invalid(
                "commands.pending_ttl_secs",
                format!("草稿保留时长必须在1-{}秒范围内", MAX_PENDING_TTL_SECS),
            ));
        }

        if !LOG_LEVELS.contains(&config.logging_level.as_str()) {
            return Err(ConfigError::invalid(
                "logging.level",
                format!("值必须是以下之一: {}", LOG_LEVELS.join(", ")),
            ));
        }

        Ok(())
    }
}

/// 环境特定配置加载器
pub struct EnvironmentConfigLoader {
    environment: String,
}

impl EnvironmentConfigLoader {
    pub fn new() -> Self {
        Self::with_environment(std::env::var("VCMD_ENV").unwrap_or_else(|_| "development".to_string()))
    }

    pub fn with_environment(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
        }
    }

    /// 获取当前环境
    pub fn get_environment(&self) -> &str {
        &self.environment
    }

    /// 获取环境特定的配置文件路径
    pub fn get_config_paths(&self) -> Vec<String> {
        vec![
            "config/default.toml".to_string(),
            format!("config/{}.toml", self.environment),
            "config/local.toml".to_string(),
        ]
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for EnvironmentConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ConfigValidator::validate_config(&BotConfiguration::default()).is_ok());
    }

    #[test]
    fn test_invalid_token_ceiling() {
        let config = BotConfiguration {
            max_token_bytes: 8,
            ..Default::default()
        };
        assert!(ConfigValidator::validate_config(&config).is_err());
    }

    #[test]
    fn test_token_ceiling_fits_role_buttons() {
        use crate::modules::command::directive::{encode, Directive};

        let prefix = Directive::new("addcommand")
            .with_flag("noop")
            .with_value("role", "Everyone")
            .with_value("replace", "soft");
        assert!(encode(&prefix, MIN_TOKEN_BYTES).is_ok());
        assert!(encode(&prefix.with_reason("rules"), MIN_TOKEN_BYTES).is_ok());

        let config = BotConfiguration {
            max_token_bytes: 40,
            ..Default::default()
        };
        assert!(ConfigValidator::validate_config(&config).is_err());
        let config = BotConfiguration {
            max_token_bytes: MIN_TOKEN_BYTES,
            ..Default::default()
        };
        assert!(ConfigValidator::validate_config(&config).is_ok());
    }

    #[test]
    fn test_pending_ttl_bounds() {
        for secs in [0, MAX_PENDING_TTL_SECS + 1, 9_000_000_000_000] {
            let config = BotConfiguration {
                pending_ttl_secs: secs,
                ..Default::default()
            };
            assert!(
                matches!(
                    ConfigValidator::validate_config(&config),
                    Err(ConfigError::InvalidValue { .. })
                ),
                "{}",
                secs
            );
        }
        let config = BotConfiguration {
            pending_ttl_secs: MAX_PENDING_TTL_SECS,
            ..Default::default()
        };
        assert!(ConfigValidator::validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_master_and_reserved() {
        let config = BotConfiguration {
            master: Some("not a user".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            ConfigValidator::validate_config(&config),
            Err(ConfigError::InvalidValue { .. })
        ));

        let config = BotConfiguration {
            reserved_names: vec!["ok".to_string(), "not ok".to_string()],
            ..Default::default()
        };
        assert!(ConfigValidator::validate_config(&config).is_err());
    }

    #[test]
    fn test_environment_loader() {
        let loader = EnvironmentConfigLoader::with_environment("production");
        let paths = loader.get_config_paths();

        assert_eq!(paths.len(), 3);
        assert!(paths.contains(&"config/production.toml".to_string()));
        assert!(loader.is_production());
    }
}
