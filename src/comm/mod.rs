/// 通用模块：配置与日志
/// Common module: configuration and logging

pub mod config;
pub mod config_validator;
pub mod enhanced_config;
pub mod tracing;
