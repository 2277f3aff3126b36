//! Web 模块的数据类型定义

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::translation::engine::TranslationEngine;
use crate::web::store::RevisionStore;

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TranslationEngine>,
    pub revisions: Arc<dyn RevisionStore>,
    /// 批量翻译接口的服务端上限，超出部分被静默截断
    pub batch_cap: usize,
}

/// 批量翻译请求
#[derive(Debug, Deserialize)]
pub struct BatchTranslateRequest {
    pub strings: Vec<String>,
    #[serde(rename = "targetLang")]
    pub target_lang: String,
}

/// 批量翻译响应
#[derive(Debug, Serialize)]
pub struct BatchTranslateResponse {
    pub translations: HashMap<String, String>,
}

/// 分节翻译请求
#[derive(Debug, Deserialize)]
pub struct SectionTranslateRequest {
    #[serde(rename = "targetLang")]
    pub target_lang: String,
    /// 从 0 开始的节编号，缺省为首节（导语）
    #[serde(default)]
    pub section: usize,
}

/// 分节翻译响应
///
/// `html` 为空字符串表示没有更多节（渐进拉取的结束哨兵）。
#[derive(Debug, Serialize)]
pub struct SectionTranslateResponse {
    pub html: String,
    pub section: usize,
}

/// 错误响应
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// 健康检查响应
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
