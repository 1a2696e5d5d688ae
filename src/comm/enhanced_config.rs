use crate::comm::config::{ConfigError, ConfigManager, ConfigSource};
use crate::comm::config_validator::{BotConfiguration, ConfigValidator, EnvironmentConfigLoader};
use config::FileFormat;
use tracing::{debug, info};

/// 增强的配置管理器：加载、校验并保存机器人配置
/// Loads, validates and holds the bot configuration
pub struct EnhancedConfigManager {
    config_manager: ConfigManager,
    env_loader: EnvironmentConfigLoader,
    bot_config: BotConfiguration,
}

impl EnhancedConfigManager {
    /// 从环境对应的配置文件和 `VCMD_*` 环境变量创建
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_extra_sources(EnvironmentConfigLoader::new(), Vec::new())
    }

    /// 额外的配置源优先级最高
    /// Extra sources take precedence over files and environment
    pub fn with_extra_sources(
        env_loader: EnvironmentConfigLoader,
        extra: Vec<ConfigSource>,
    ) -> Result<Self, ConfigError> {
        let mut sources: Vec<ConfigSource> = env_loader
            .get_config_paths()
            .into_iter()
            .map(|path| ConfigSource::File {
                path,
                format: Some(FileFormat::Toml),
                required: false,
            })
            .collect();
        sources.push(ConfigSource::Env {
            prefix: "VCMD".to_string(),
            separator: "__",
        });
        sources.extend(extra);

        let config_manager =
            ConfigManager::with_sources(sources).map_err(|e| ConfigError::InitializationError {
                message: e.to_string(),
            })?;
        let bot_config = Self::load_bot_config(&config_manager)?;

        Ok(Self {
            config_manager,
            env_loader,
            bot_config,
        })
    }

    fn load_bot_config(config_manager: &ConfigManager) -> Result<BotConfiguration, ConfigError> {
        let mut bot_config = BotConfiguration::default();

        if let Some(master) = config_manager.get_optional::<String>("bot.master")? {
            bot_config.master = Some(master);
        }
        if let Some(max) = config_manager.get_optional::<usize>("directive.max_token_bytes")? {
            bot_config.max_token_bytes = max;
        }
        if let Some(reserved) = config_manager.get_optional::<Vec<String>>("commands.reserved")? {
            bot_config.reserved_names = reserved;
        }
        if let Some(ttl) = config_manager.get_optional::<u64>("commands.pending_ttl_secs")? {
            bot_config.pending_ttl_secs = ttl;
        }
        bot_config.logging_level = config_manager.get_or("logging.level", bot_config.logging_level);

        ConfigValidator::validate_config(&bot_config)?;

        debug!("机器人配置: {:?}", bot_config);
        Ok(bot_config)
    }

    pub fn get_bot_config(&self) -> &BotConfiguration {
        &self.bot_config
    }

    /// 生产环境必须配置 master
    pub fn validate_required_config(&self) -> Result<(), ConfigError> {
        if self.env_loader.is_production() && self.bot_config.master.is_none() {
            return Err(ConfigError::KeyNotFound {
                key: "bot.master".to_string(),
            });
        }
        Ok(())
    }

    /// 打印配置摘要
    pub fn print_config_summary(&self) {
        let (total, loaded, _) = self.config_manager.get_sources_stats();
        info!("=== 配置摘要 ===");
        info!("环境: {}", self.env_loader.get_environment());
        info!("配置源: 已加载 {}/{}", loaded, total);
        info!("master: {}", if self.bot_config.master.is_some() { "已配置" } else { "未配置" });
        info!("令牌上限: {} 字节", self.bot_config.max_token_bytes);
        info!("额外保留命令: {:?}", self.bot_config.reserved_names);
        info!("草稿保留: {} 秒", self.bot_config.pending_ttl_secs);
        for source in self.config_manager.get_sources_info() {
            debug!(loaded = source.loaded, priority = source.priority, "{}", source.description);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn memory(pairs: &[(&str, serde_json::Value)]) -> ConfigSource {
        ConfigSource::Memory(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn test_loads_overrides() {
        let manager = EnhancedConfigManager::with_extra_sources(
            EnvironmentConfigLoader::with_environment("test"),
            vec![memory(&[
                ("bot.master", serde_json::json!("@owner")),
                ("directive.max_token_bytes", serde_json::json!(128)),
                ("commands.reserved", serde_json::json!(["rules"])),
            ])],
        )
        .unwrap();

        let config = manager.get_bot_config();
        assert_eq!(config.master.as_deref(), Some("@owner"));
        assert_eq!(config.max_token_bytes, 128);
        assert_eq!(config.reserved_names, vec!["rules".to_string()]);
        assert_eq!(config.pending_ttl_secs, 86400);
    }

    #[test]
    fn test_production_requires_master() {
        let manager = EnhancedConfigManager::with_extra_sources(
            EnvironmentConfigLoader::with_environment("production"),
            vec![memory(&[("logging.level", serde_json::json!("debug"))])],
        )
        .unwrap();
        assert!(manager.validate_required_config().is_err());
    }

    #[test]
    fn test_rejects_invalid_values() {
        let result = EnhancedConfigManager::with_extra_sources(
            EnvironmentConfigLoader::with_environment("test"),
            vec![memory(&[("directive.max_token_bytes", serde_json::json!(4))])],
        );
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
