//! # wikiglot
//!
//! 增量式、缓存优先的页面翻译服务：把渲染好的 HTML 切分为内容寻址
//! 的可翻译单元，通过指纹缓存让全站相同的文字只翻译一次，未命中的
//! 部分成批提交给外部翻译服务，客户端按批次、有界并发地渐进交付。
//!
//! ## 模块组织
//!
//! - `parsers` - HTML 解析、序列化与站内链接本地化
//! - `translation` - 分段、缓存、服务客户端、批次编排与交付调度
//! - `web` - REST 接口层

pub mod parsers;
pub mod translation;
pub mod web;

pub use translation::{
    AppConfig, ContentHash, DeliveryScheduler, FingerprintCache, GeminiClient, TranslationEngine,
    TranslationError, TranslationResult,
};
