use anyhow::{anyhow, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("配置项 '{key}' 不存在")]
    KeyNotFound { key: String },
    #[error("配置项 '{key}' 类型转换失败: {message}")]
    TypeConversionError { key: String, message: String },
    #[error("配置项 '{key}' 无效: {message}")]
    InvalidValue { key: String, message: String },
    #[error("配置初始化失败: {message}")]
    InitializationError { message: String },
}

impl ConfigError {
    pub fn invalid<T: Into<String>, U: Into<String>>(key: T, message: U) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// 配置数据源信息
#[derive(Debug, Clone)]
pub struct ConfigSourceInfo {
    pub source_type: String,
    pub description: String,
    pub priority: u8,
    pub loaded: bool,
}

/// 配置管理器
pub struct ConfigManager {
    config: Config,
    sources_info: Vec<ConfigSourceInfo>,
}

impl ConfigManager {
    /// 使用指定的配置源创建配置管理器，后添加者优先生效
    /// Builds from the given sources; later sources take precedence
    pub fn with_sources(sources: Vec<ConfigSource>) -> Result<Self> {
        let mut builder = Config::builder();
        let mut sources_info = Vec::new();

        for (index, source) in sources.into_iter().enumerate() {
            let info = source.get_source_info(index as u8 + 1);

            // 可选文件不存在时只记录，不添加
            if let ConfigSource::File { path, required, .. } = &source {
                let exists = std::path::Path::new(path).exists();
                if !exists && *required {
                    return Err(anyhow!("必需的配置文件不存在: {}", path));
                }
                if !exists {
                    sources_info.push(info);
                    continue;
                }
            }

            builder = source
                .add_to_builder(builder)
                .map_err(|e| anyhow!("添加配置源失败: {}", e))?;
            sources_info.push(ConfigSourceInfo {
                loaded: true,
                ..info
            });
        }

        let config = builder
            .build()
            .map_err(|e| anyhow!("构建配置失败: {}", e))?;
        Ok(Self {
            config,
            sources_info,
        })
    }

    /// 获取指定 key 的配置值
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.config
            .get(key)
            .map_err(|e| anyhow!("获取配置 '{}' 失败: {}", key, e))
    }

    /// 获取指定 key 的配置值，如果不存在返回默认值
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// 安全获取配置值，区分缺失与类型错误
    pub fn get_safe<T: DeserializeOwned>(&self, key: &str) -> std::result::Result<T, ConfigError> {
        self.config.get(key).map_err(|e| match e {
            config::ConfigError::NotFound(_) => ConfigError::KeyNotFound {
                key: key.to_string(),
            },
            other => ConfigError::TypeConversionError {
                key: key.to_string(),
                message: other.to_string(),
            },
        })
    }

    /// 可选配置：缺失时返回 `None`，类型错误时报错
    pub fn get_optional<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> std::result::Result<Option<T>, ConfigError> {
        match self.get_safe(key) {
            Ok(value) => Ok(Some(value)),
            Err(ConfigError::KeyNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 获取所有配置源信息
    pub fn get_sources_info(&self) -> &[ConfigSourceInfo] {
        &self.sources_info
    }

    /// 获取配置源统计信息 (总计, 已加载, 未加载)
    pub fn get_sources_stats(&self) -> (usize, usize, usize) {
        let total = self.sources_info.len();
        let loaded = self.sources_info.iter().filter(|info| info.loaded).count();
        (total, loaded, total - loaded)
    }
}

/// 配置源类型
pub enum ConfigSource {
    /// 文件配置源
    File {
        path: String,
        format: Option<FileFormat>,
        required: bool,
    },
    /// 环境变量配置源
    Env {
        prefix: String,
        separator: &'static str,
    },
    /// 内存配置源（HashMap）
    Memory(HashMap<String, serde_json::Value>),
    /// 字符串配置源
    String { content: String, format: FileFormat },
}

impl ConfigSource {
    /// 获取配置源信息
    pub fn get_source_info(&self, priority: u8) -> ConfigSourceInfo {
        let (source_type, description) = match self {
            ConfigSource::File { path, required, .. } => (
                "File",
                format!("文件配置源: {} (必需: {})", path, required),
            ),
            ConfigSource::Env { prefix, separator } => (
                "Environment",
                format!("环境变量配置源: 前缀={}, 分隔符={}", prefix, separator),
            ),
            ConfigSource::Memory(map) => ("Memory", format!("内存配置源: {} 个配置项", map.len())),
            ConfigSource::String { .. } => ("String", "字符串配置源".to_string()),
        };
        ConfigSourceInfo {
            source_type: source_type.to_string(),
            description,
            priority,
            loaded: false,
        }
    }

    pub fn add_to_builder(
        self,
        builder: ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<ConfigBuilder<config::builder::DefaultState>> {
        match self {
            ConfigSource::File {
                path,
                format,
                required,
            } => {
                let file_source = match format {
                    Some(format) => File::with_name(&path).format(format),
                    None => File::with_name(&path),
                };
                Ok(builder.add_source(file_source.required(required)))
            }
            ConfigSource::Env { prefix, separator } => Ok(builder.add_source(
                Environment::with_prefix(&prefix)
                    .separator(separator)
                    .prefix_separator("_")
                    .ignore_empty(true),
            )),
            ConfigSource::Memory(map) => {
                // 点分隔的 key 展开为嵌套表
                let mut builder = builder;
                for (key, value) in map {
                    builder = builder
                        .set_override(key.as_str(), json_to_config_value(value))
                        .map_err(|e| anyhow!("设置内存配置 '{}' 失败: {}", key, e))?;
                }
                Ok(builder)
            }
            ConfigSource::String { content, format } => {
                Ok(builder.add_source(File::from_str(&content, format)))
            }
        }
    }
}

fn json_to_config_value(value: serde_json::Value) -> config::Value {
    use config::ValueKind;

    let kind = match value {
        serde_json::Value::Null => ValueKind::Nil,
        serde_json::Value::Bool(b) => ValueKind::Boolean(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => ValueKind::I64(i),
            None => ValueKind::Float(n.as_f64().unwrap_or_default()),
        },
        serde_json::Value::String(s) => ValueKind::String(s),
        serde_json::Value::Array(items) => {
            ValueKind::Array(items.into_iter().map(json_to_config_value).collect())
        }
        serde_json::Value::Object(map) => ValueKind::Table(
            map.into_iter()
                .map(|(k, v)| (k, json_to_config_value(v)))
                .collect(),
        ),
    };
    config::Value::new(None, kind)
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ConfigManager, ConfigSource};
    use config::FileFormat;
    use std::collections::HashMap;

    #[test]
    fn test_config_from_string() {
        let source = ConfigSource::String {
            content: "[directive]\nmax_token_bytes = 64".to_string(),
            format: FileFormat::Toml,
        };
        let manager = ConfigManager::with_sources(vec![source]).unwrap();
        assert_eq!(manager.get::<i64>("directive.max_token_bytes").unwrap(), 64);
    }

    #[test]
    fn test_config_from_memory() {
        let mut map = HashMap::new();
        map.insert(
            "bot.master".to_string(),
            serde_json::Value::String("@owner".to_string()),
        );
        let manager = ConfigManager::with_sources(vec![ConfigSource::Memory(map)]).unwrap();
        assert_eq!(manager.get::<String>("bot.master").unwrap(), "@owner");
    }

    #[test]
    fn test_missing_optional_file_is_recorded() {
        let source = ConfigSource::File {
            path: "config/does-not-exist.toml".to_string(),
            format: Some(FileFormat::Toml),
            required: false,
        };
        let manager = ConfigManager::with_sources(vec![source]).unwrap();
        assert_eq!(manager.get_sources_stats(), (1, 0, 1));
        assert!(matches!(
            manager.get_safe::<String>("bot.master"),
            Err(ConfigError::KeyNotFound { .. })
        ));
        assert_eq!(manager.get_optional::<String>("bot.master").unwrap(), None);
    }
}
