//! 批次编排引擎
//!
//! 把一组源字符串拆分为缓存命中与未命中两部分，只为未命中调用外部
//! 翻译服务，并把新产出写回指纹缓存。对外提供两种入口：
//!
//! - `translate_strings`：宽容模式。任何无法解析的字符串回退为原文，
//!   整个调用永不失败（失败单元的可视化标记由调用方负责）。
//! - `translate_html`：严格模式。组合分段器 + 本编排核心 + 重组，
//!   翻译服务失败时整个调用失败，不产出半成品文档。

use std::collections::HashMap;
use std::sync::Arc;

use crate::translation::cache::{ContentHash, FingerprintCache};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::provider::TranslationProvider;
use crate::translation::segmenter::{self, UnitOutcome};

/// 去重后的工作集：哈希按首次出现顺序排列
struct WorkingSet {
    order: Vec<ContentHash>,
    texts: HashMap<ContentHash, String>,
}

impl WorkingSet {
    fn build(strings: &[String]) -> Self {
        let mut order = Vec::new();
        let mut texts = HashMap::new();

        for raw in strings {
            let normalized = raw.trim();
            if normalized.is_empty() {
                continue;
            }

            let hash = ContentHash::of(normalized);
            if !texts.contains_key(&hash) {
                order.push(hash.clone());
                texts.insert(hash, normalized.to_string());
            }
        }

        Self { order, texts }
    }
}

/// 翻译编排引擎
pub struct TranslationEngine {
    provider: Arc<dyn TranslationProvider>,
    cache: Arc<FingerprintCache>,
}

impl TranslationEngine {
    pub fn new(provider: Arc<dyn TranslationProvider>, cache: Arc<FingerprintCache>) -> Self {
        Self { provider, cache }
    }

    pub fn cache(&self) -> &FingerprintCache {
        &self.cache
    }

    /// 只查缓存，不触发任何翻译服务调用
    pub async fn cached_translations(
        &self,
        strings: &[String],
        lang: &str,
    ) -> HashMap<String, String> {
        let set = WorkingSet::build(strings);
        let hits = self.cache.lookup(&set.order, lang).await;

        let mut results = HashMap::new();
        for hash in &set.order {
            if let Some(translation) = hits.get(hash) {
                results.insert(set.texts[hash].clone(), translation.clone());
            }
        }
        results
    }

    /// 解析核心：缓存命中 + 未命中走翻译服务
    ///
    /// 返回（已解析的 哈希→译文 映射, 可选的服务错误）。服务失败时
    /// 已有的缓存命中仍然保留在映射里，由调用方决定宽容或严格。
    async fn resolve(
        &self,
        set: &WorkingSet,
        lang: &str,
    ) -> (HashMap<ContentHash, String>, Option<TranslationError>) {
        let mut resolved = self.cache.lookup(&set.order, lang).await;

        // 未命中集合保持首次出现顺序，去重由工作集保证
        let misses: Vec<ContentHash> = set
            .order
            .iter()
            .filter(|hash| !resolved.contains_key(*hash))
            .cloned()
            .collect();

        if misses.is_empty() {
            return (resolved, None);
        }

        let batch: Vec<String> = misses.iter().map(|hash| set.texts[hash].clone()).collect();

        tracing::info!(
            total = set.order.len(),
            cached = resolved.len(),
            misses = misses.len(),
            lang,
            "翻译批次: 缓存命中/未命中划分完成"
        );

        let translations = match self.provider.translate(&batch, lang).await {
            Ok(translations) => translations,
            Err(e) => {
                tracing::warn!(lang, "翻译服务调用失败: {}", e);
                return (resolved, Some(e));
            }
        };

        // 位置对应是唯一契约，数量不一致时整批作废，一条也不入缓存
        if translations.len() != misses.len() {
            let error = TranslationError::Response(format!(
                "译文数量不匹配: 期望 {}, 实际 {}",
                misses.len(),
                translations.len()
            ));
            tracing::warn!(lang, "{}", error);
            return (resolved, Some(error));
        }

        let mut fresh = HashMap::new();
        for (hash, translation) in misses.into_iter().zip(translations) {
            fresh.insert(hash, translation);
        }

        self.cache.store(&fresh, lang).await;
        resolved.extend(fresh);

        (resolved, None)
    }

    /// 宽容模式：为每个输入字符串给出译文，解析不到的回退为原文
    ///
    /// 输出键是调用方传入的原始字符串（未做规范化），便于调用方按原
    /// 键回填。失败/回退单元的用户可见标记是调用方的策略，不在此层。
    pub async fn translate_strings(
        &self,
        strings: &[String],
        lang: &str,
    ) -> HashMap<String, String> {
        if strings.is_empty() {
            return HashMap::new();
        }

        let set = WorkingSet::build(strings);
        let (resolved, _error) = self.resolve(&set, lang).await;

        let mut results = HashMap::new();
        for raw in strings {
            let translation = resolved
                .get(&ContentHash::of(raw))
                .cloned()
                .unwrap_or_else(|| raw.clone());
            results.insert(raw.clone(), translation);
        }
        results
    }

    /// 严格模式：整篇 HTML 的分段、解析与重组
    ///
    /// 任一环节失败即整体失败，调用方不会收到半翻译的文档。
    pub async fn translate_html(&self, html: &str, lang: &str) -> TranslationResult<String> {
        if html.trim().is_empty() {
            return Ok(String::new());
        }

        let segmented = segmenter::segment(html, lang);
        if segmented.units.is_empty() {
            return Ok(segmented.html);
        }

        let set = WorkingSet::build(&segmented.units);
        let (resolved, error) = self.resolve(&set, lang).await;

        if let Some(error) = error {
            return Err(error);
        }

        let mut outcomes = HashMap::new();
        for hash in &set.order {
            let text = set.texts[hash].clone();
            match resolved.get(hash) {
                Some(translation) => {
                    outcomes.insert(text, UnitOutcome::Translated(translation.clone()));
                }
                None => {
                    // 解析核心无错误返回时不应出现未解析单元
                    return Err(TranslationError::Mismatch(format!(
                        "单元未解析: {}",
                        hash
                    )));
                }
            }
        }

        Ok(segmenter::apply_outcomes(&segmented.html, &outcomes))
    }
}
