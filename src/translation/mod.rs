//! 翻译模块
//!
//! 以内容寻址为核心的增量页面翻译，模块划分：
//! - **segmenter**: 文档分段与占位符管理
//! - **cache**: 指纹缓存（内容哈希 → 译文）
//! - **provider**: 外部翻译服务客户端
//! - **engine**: 批次编排（缓存划分 + 服务调用 + 回写）
//! - **scheduler**: 渐进式交付调度
//! - **config** / **error**: 配置与错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wikiglot::translation::cache::FingerprintCache;
//! use wikiglot::translation::config::AppConfig;
//! use wikiglot::translation::engine::TranslationEngine;
//! use wikiglot::translation::provider::GeminiClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load(None)?;
//! let provider = Arc::new(GeminiClient::new(config.provider.clone())?);
//! let cache = Arc::new(FingerprintCache::new(&config.cache)?);
//! let engine = TranslationEngine::new(provider, cache);
//!
//! let html = engine.translate_html("<p>Hello world</p>", "es").await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod provider;
pub mod scheduler;
pub mod segmenter;

pub use cache::{ContentHash, FingerprintCache};
pub use config::AppConfig;
pub use engine::TranslationEngine;
pub use error::{TranslationError, TranslationResult};
pub use provider::{GeminiClient, TranslationProvider};
pub use scheduler::{BatchTranslate, DeliveryScheduler, SchedulerReport};
pub use segmenter::{SegmentedDocument, UnitOutcome};
