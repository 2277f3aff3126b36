//! 翻译配置管理模块
//!
//! 支持 TOML 配置文件加载与环境变量覆盖，所有字段都有合理默认值。

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::translation::error::{TranslationError, TranslationResult};

/// 配置常量
pub mod constants {
    /// 单次批量翻译请求接受的最大字符串数，超出部分被截断
    pub const MAX_BATCH_CAP: usize = 50;

    /// 客户端调度器每个批次包含的单元数
    pub const DEFAULT_CHUNK_SIZE: usize = 10;

    /// 客户端调度器的并发工作者上限
    pub const DEFAULT_MAX_CONCURRENT: usize = 5;

    /// 单个批次的最大尝试次数（含首次）
    pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

    /// 重试退避基准（毫秒），按尝试次数指数递增
    pub const DEFAULT_BACKOFF_MS: u64 = 500;

    /// 翻译服务单次调用超时（秒）——大批次耗时较长，放宽但必须有界
    pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 120;

    /// 本地热缓存容量（条目数）
    pub const DEFAULT_LOCAL_CACHE_SIZE: usize = 4096;
}

/// 翻译服务提供方配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API 密钥，缺失时所有调用在发起网络请求前即失败
    #[serde(default)]
    pub api_key: String,
    /// 模型名称
    #[serde(default = "default_model")]
    pub model: String,
    /// API 端点基地址
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// 单次调用超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_timeout_secs() -> u64 {
    constants::DEFAULT_PROVIDER_TIMEOUT_SECS
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// 缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// 持久化缓存文件路径，为空时只使用内存缓存
    #[serde(default)]
    pub db_path: Option<String>,
    /// 本地 LRU 热缓存容量
    #[serde(default = "default_local_cache_size")]
    pub local_cache_size: usize,
}

fn default_local_cache_size() -> usize {
    constants::DEFAULT_LOCAL_CACHE_SIZE
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            local_cache_size: default_local_cache_size(),
        }
    }
}

/// 客户端交付调度器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 每个批次的单元数，应不大于服务端批量上限
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// 同时在途的批次请求上限
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// 单个批次的最大尝试次数（含首次）
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// 指数退避基准（毫秒）
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_chunk_size() -> usize {
    constants::DEFAULT_CHUNK_SIZE
}

fn default_max_concurrent() -> usize {
    constants::DEFAULT_MAX_CONCURRENT
}

fn default_max_attempts() -> usize {
    constants::DEFAULT_MAX_ATTEMPTS
}

fn default_backoff_ms() -> u64 {
    constants::DEFAULT_BACKOFF_MS
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_concurrent: default_max_concurrent(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl SchedulerConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Web 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 批量翻译接口接受的最大字符串数，超出部分被静默截断
    #[serde(default = "default_batch_cap")]
    pub batch_cap: usize,
}

fn default_bind_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7080
}

fn default_batch_cap() -> usize {
    constants::MAX_BATCH_CAP
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            batch_cap: default_batch_cap(),
        }
    }
}

/// 应用总配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl AppConfig {
    /// 加载配置：可选 TOML 文件 + 环境变量覆盖
    pub fn load(path: Option<&Path>) -> TranslationResult<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    TranslationError::Config(format!("无法读取配置文件 {}: {}", path.display(), e))
                })?;
                toml::from_str(&raw)
                    .map_err(|e| TranslationError::Config(format!("配置文件解析失败: {}", e)))?
            }
            None => AppConfig::default(),
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// 环境变量覆盖文件配置
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("WIKIGLOT_API_KEY") {
            self.provider.api_key = key;
        }
        if let Ok(model) = std::env::var("WIKIGLOT_MODEL") {
            self.provider.model = model;
        }
        if let Ok(base) = std::env::var("WIKIGLOT_API_BASE") {
            self.provider.api_base = base;
        }
        if let Ok(db_path) = std::env::var("WIKIGLOT_CACHE_DB") {
            self.cache.db_path = Some(db_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.batch_cap, constants::MAX_BATCH_CAP);
        assert_eq!(config.scheduler.chunk_size, constants::DEFAULT_CHUNK_SIZE);
        assert!(config.scheduler.chunk_size <= config.server.batch_cap);
        assert!(config.provider.api_key.is_empty());
    }

    #[test]
    fn test_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [provider]
            api_key = "k"
            model = "gemini-2.0-pro"

            [server]
            port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(config.provider.api_key, "k");
        assert_eq!(config.provider.model, "gemini-2.0-pro");
        assert_eq!(config.server.port, 9000);
        // 未指定的字段回落到默认值
        assert_eq!(config.server.batch_cap, constants::MAX_BATCH_CAP);
        assert_eq!(config.provider.timeout_secs, 120);
    }
}
