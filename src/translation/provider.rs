//! 翻译服务客户端模块
//!
//! 对外部翻译服务的单次调用封装：一个批次一个 HTTP 请求，要求服务
//! 严格返回与输入等长的 JSON 字符串数组。数量不匹配与解析失败同等
//! 致命——位置对应是把译文系回原文的唯一契约，部分结果一律拒收。
//! 本层不做任何重试，重试策略属于调用方（调度器/编排器）。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::translation::config::ProviderConfig;
use crate::translation::error::{TranslationError, TranslationResult};

/// 翻译服务抽象
///
/// 输入必须已由调用方去重；输出与输入按位置一一对应。
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn translate(&self, units: &[String], target_lang: &str)
        -> TranslationResult<Vec<String>>;
}

// ---------------------------------------------------------------------------
// Gemini 客户端
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
}

#[derive(Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

/// Gemini 翻译客户端
pub struct GeminiClient {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: ProviderConfig) -> TranslationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| TranslationError::Config(format!("HTTP 客户端创建失败: {}", e)))?;

        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.config.api_base.trim_end_matches('/'),
            self.config.model,
            self.config.api_key,
        )
    }

    /// 构造翻译指令
    ///
    /// 明确约束输出形态：只译人类可读文本、逐字保留内嵌标记、不增不减、
    /// 严格返回等长 JSON 字符串数组。
    fn build_prompt(units: &[String], target_lang: &str) -> TranslationResult<String> {
        let payload = serde_json::to_string(units)?;

        Ok(format!(
            concat!(
                "You are a professional translator. Translate the following JSON array of ",
                "text strings into the language with code '{lang}'.\n",
                "Rules:\n",
                "- Preserve any embedded markup verbatim and do not change its scope.\n",
                "- Translate only human-readable text; leave code, URLs and proper nouns alone ",
                "where inappropriate to translate.\n",
                "- Do not add, merge or omit entries.\n",
                "- Return ONLY a JSON array of strings with exactly {count} elements, ",
                "in the same order as the input. No markdown, no commentary.\n",
                "Input:\n{input}",
            ),
            lang = target_lang,
            count = units.len(),
            input = payload,
        ))
    }

    /// 去除模型偶尔包裹的 Markdown 代码栅栏
    fn strip_code_fences(raw: &str) -> &str {
        static FENCE: OnceLock<Regex> = OnceLock::new();
        let fence = FENCE.get_or_init(|| {
            Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").unwrap()
        });

        match fence.captures(raw) {
            Some(captures) => captures.get(1).map(|m| m.as_str()).unwrap_or(raw),
            None => raw.trim(),
        }
    }

    /// 解析模型文本为译文列表并校验数量
    fn parse_translations(raw: &str, expected: usize) -> TranslationResult<Vec<String>> {
        let cleaned = Self::strip_code_fences(raw);

        let translations: Vec<String> = serde_json::from_str(cleaned).map_err(|e| {
            TranslationError::Response(format!("无法解析译文数组: {}", e))
        })?;

        if translations.len() != expected {
            return Err(TranslationError::Response(format!(
                "译文数量不匹配: 期望 {}, 实际 {}",
                expected,
                translations.len()
            )));
        }

        Ok(translations)
    }
}

#[async_trait]
impl TranslationProvider for GeminiClient {
    async fn translate(
        &self,
        units: &[String],
        target_lang: &str,
    ) -> TranslationResult<Vec<String>> {
        // 凭证检查先于任何网络调用
        if self.config.api_key.is_empty() {
            return Err(TranslationError::Config("未配置 API 密钥".to_string()));
        }

        if units.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(
            count = units.len(),
            lang = target_lang,
            "发送翻译批次"
        );

        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: Self::build_prompt(units, target_lang)?,
                }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranslationError::Transport(format!(
                "翻译服务返回 {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        // 响应体不是合法 JSON 属于响应格式问题，不是传输问题
        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_decode() {
                TranslationError::Response(format!("响应体解码失败: {}", e))
            } else {
                TranslationError::from(e)
            }
        })?;

        if let Some(error) = parsed.error {
            return Err(TranslationError::Transport(format!(
                "翻译服务报告错误: {}",
                error.message
            )));
        }

        let raw_text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| {
                TranslationError::Response("响应中缺少候选文本".to_string())
            })?;

        Self::parse_translations(raw_text, units.len())
    }
}

// ---------------------------------------------------------------------------
// 测试用 Mock
// ---------------------------------------------------------------------------

/// Mock 行为
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// 按词典翻译，词典外的文本返回 `"{lang}:{text}"`
    Dictionary(HashMap<String, String>),
    /// 每次调用都返回传输错误
    FailTransport,
    /// 返回比输入少一个元素的列表（用于数量校验场景）
    DropLast,
}

/// 测试用翻译服务：记录每次调用的输入，行为可配置
pub struct MockProvider {
    behavior: MockBehavior,
    calls: AtomicUsize,
    submitted: std::sync::Mutex<Vec<Vec<String>>>,
}

impl MockProvider {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            submitted: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_dictionary(pairs: &[(&str, &str)]) -> Self {
        let dict = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self::new(MockBehavior::Dictionary(dict))
    }

    /// 已发生的调用次数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 每次调用提交的输入批次
    pub fn submitted_batches(&self) -> Vec<Vec<String>> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranslationProvider for MockProvider {
    async fn translate(
        &self,
        units: &[String],
        target_lang: &str,
    ) -> TranslationResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(units.to_vec());

        match &self.behavior {
            MockBehavior::Dictionary(dict) => Ok(units
                .iter()
                .map(|unit| {
                    dict.get(unit)
                        .cloned()
                        .unwrap_or_else(|| format!("{}:{}", target_lang, unit))
                })
                .collect()),
            MockBehavior::FailTransport => {
                Err(TranslationError::Transport("mock transport failure".to_string()))
            }
            MockBehavior::DropLast => Ok(units
                .iter()
                .take(units.len().saturating_sub(1))
                .cloned()
                .collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(
            GeminiClient::strip_code_fences("```json\n[\"a\"]\n```"),
            "[\"a\"]"
        );
        assert_eq!(GeminiClient::strip_code_fences("```\n[\"a\"]\n```"), "[\"a\"]");
        assert_eq!(GeminiClient::strip_code_fences("  [\"a\"]  "), "[\"a\"]");
    }

    #[test]
    fn test_parse_translations_enforces_count_parity() {
        let ok = GeminiClient::parse_translations("[\"uno\", \"dos\"]", 2);
        assert_eq!(ok.unwrap(), vec!["uno".to_string(), "dos".to_string()]);

        // 数量不匹配与解析失败同等致命
        let short = GeminiClient::parse_translations("[\"uno\", \"dos\"]", 3);
        assert!(matches!(short, Err(TranslationError::Response(_))));

        let garbage = GeminiClient::parse_translations("not json", 1);
        assert!(matches!(garbage, Err(TranslationError::Response(_))));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_network() {
        let client = GeminiClient::new(ProviderConfig::default()).unwrap();
        let result = client.translate(&["Hello".to_string()], "es").await;
        assert!(matches!(result, Err(TranslationError::Config(_))));
    }

    #[tokio::test]
    async fn test_mock_provider_counts_calls() {
        let provider = MockProvider::with_dictionary(&[("Hello", "Hola")]);
        let out = provider
            .translate(&["Hello".to_string(), "Other".to_string()], "es")
            .await
            .unwrap();
        assert_eq!(out, vec!["Hola".to_string(), "es:Other".to_string()]);
        assert_eq!(provider.call_count(), 1);
    }
}
