//! 交付调度器模块
//!
//! 把布满占位符的骨架页面渐进式地解析为完整译文页面：扫描占位符、
//! 构建 单元→占位符位置 的多重映射、按固定大小切分批次，然后在有界
//! 并发的工作者池里逐批请求翻译。批次失败按指数退避独立重试，达到
//! 尝试上限后该批次的所有单元被标记为终态失败，绝不拖垮其它批次；
//! 全部批次结束后，任何仍未解析的单元（服务端返回了对不上号的键）
//! 一律清扫为失败态——没有占位符会永远停留在"加载中"。

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::translation::config::SchedulerConfig;
use crate::translation::engine::TranslationEngine;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::segmenter::{self, UnitOutcome};

/// 批量翻译入口抽象
///
/// 调度器透过它请求一个批次的译文；实现可以是跨网络的 REST 调用，
/// 也可以是进程内直连编排引擎。
#[async_trait]
pub trait BatchTranslate: Send + Sync {
    async fn translate_batch(
        &self,
        units: &[String],
        lang: &str,
    ) -> TranslationResult<HashMap<String, String>>;
}

/// 进程内直连编排引擎的批量翻译客户端
pub struct EngineBatchClient {
    engine: Arc<TranslationEngine>,
}

impl EngineBatchClient {
    pub fn new(engine: Arc<TranslationEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl BatchTranslate for EngineBatchClient {
    async fn translate_batch(
        &self,
        units: &[String],
        lang: &str,
    ) -> TranslationResult<HashMap<String, String>> {
        Ok(self.engine.translate_strings(units, lang).await)
    }
}

/// 跨网络调用批量翻译接口的客户端
pub struct HttpBatchClient {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct BatchRequestBody<'a> {
    strings: &'a [String],
    #[serde(rename = "targetLang")]
    target_lang: &'a str,
}

#[derive(serde::Deserialize)]
struct BatchResponseBody {
    translations: HashMap<String, String>,
}

impl HttpBatchClient {
    /// `endpoint` 形如 `http://host:port/api/translate_batch`
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl BatchTranslate for HttpBatchClient {
    async fn translate_batch(
        &self,
        units: &[String],
        lang: &str,
    ) -> TranslationResult<HashMap<String, String>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&BatchRequestBody {
                strings: units,
                target_lang: lang,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslationError::Transport(format!(
                "批量翻译接口返回 {}",
                status
            )));
        }

        let body: BatchResponseBody = response.json().await?;
        Ok(body.translations)
    }
}

/// 一次页面交付的汇总报告
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerReport {
    /// 最终 HTML：译文已就位，失败单元带有错误标记
    pub html: String,
    /// 去重后的单元数
    pub total_units: usize,
    /// 页面上的占位符总数（含重复单元）
    pub total_placeholders: usize,
    /// 成功解析的单元数
    pub applied_units: usize,
    /// 终态失败的单元数
    pub failed_units: usize,
    /// 批次数
    pub batches: usize,
    /// 发生的重试次数
    pub retries: usize,
}

/// 交付调度器
///
/// 队列、在途计数与工作者池都封装在这个对象里，没有任何全局状态。
pub struct DeliveryScheduler {
    client: Arc<dyn BatchTranslate>,
    config: SchedulerConfig,
}

impl DeliveryScheduler {
    pub fn new(client: Arc<dyn BatchTranslate>, config: SchedulerConfig) -> Self {
        Self { client, config }
    }

    /// 把骨架页面解析为最终页面
    ///
    /// 调用方在页面被卸载时直接丢弃返回的 future 即可，未应用的结果
    /// 随之丢弃，不需要显式取消信号。
    pub async fn translate_page(&self, skeleton_html: &str, lang: &str) -> SchedulerReport {
        let scan = segmenter::scan_placeholders(skeleton_html);
        let total_units = scan.unique_units.len();
        let total_placeholders = scan.placeholder_count();

        if total_units == 0 {
            return SchedulerReport {
                html: skeleton_html.to_string(),
                total_units: 0,
                total_placeholders: 0,
                applied_units: 0,
                failed_units: 0,
                batches: 0,
                retries: 0,
            };
        }

        // 切分批次：批次大小独立于服务端上限，但应不大于它
        let chunk_size = self.config.chunk_size.max(1);
        let batches: Vec<Vec<String>> = scan
            .unique_units
            .chunks(chunk_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        let batch_count = batches.len();

        tracing::info!(
            units = total_units,
            placeholders = total_placeholders,
            batches = batch_count,
            workers = self.config.max_concurrent.max(1).min(batch_count),
            lang,
            "开始交付调度"
        );

        let queue: Arc<Mutex<VecDeque<Vec<String>>>> =
            Arc::new(Mutex::new(batches.into_iter().collect()));
        let outcomes: Arc<Mutex<HashMap<String, UnitOutcome>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let retries = Arc::new(AtomicUsize::new(0));

        // 有界工作者池：一个工作者完成一个批次后立即领取下一个
        let worker_count = self.config.max_concurrent.max(1).min(batch_count);
        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let queue = Arc::clone(&queue);
            let outcomes = Arc::clone(&outcomes);
            let retries = Arc::clone(&retries);
            let client = Arc::clone(&self.client);
            let config = self.config.clone();
            let lang = lang.to_string();

            workers.push(tokio::spawn(async move {
                loop {
                    // 弹出操作互斥，批次只会被一个工作者领取
                    let batch = { queue.lock().await.pop_front() };
                    let Some(batch) = batch else {
                        break;
                    };

                    Self::process_batch(&client, &config, &lang, batch, &outcomes, &retries)
                        .await;
                }
            }));
        }

        // 工作者不 panic；join 失败只可能是运行时被关停
        let _ = futures::future::join_all(workers).await;

        // 清扫：队列已空且无在途请求后，仍未解析的单元标记为失败
        let mut outcomes = outcomes.lock().await.clone();
        for unit in &scan.unique_units {
            if !outcomes.contains_key(unit) {
                tracing::warn!(unit = %unit, "译文键不匹配，清扫为失败态");
                outcomes.insert(unit.clone(), UnitOutcome::Failed);
            }
        }

        let applied_units = outcomes
            .values()
            .filter(|o| matches!(o, UnitOutcome::Translated(_)))
            .count();
        let failed_units = total_units - applied_units;

        let html = segmenter::apply_outcomes(skeleton_html, &outcomes);

        tracing::info!(
            applied = applied_units,
            failed = failed_units,
            retries = retries.load(Ordering::Relaxed),
            "交付调度完成"
        );

        SchedulerReport {
            html,
            total_units,
            total_placeholders,
            applied_units,
            failed_units,
            batches: batch_count,
            retries: retries.load(Ordering::Relaxed),
        }
    }

    /// 处理单个批次：Queued → InFlight → {Applied | Retrying → InFlight | Failed}
    async fn process_batch(
        client: &Arc<dyn BatchTranslate>,
        config: &SchedulerConfig,
        lang: &str,
        batch: Vec<String>,
        outcomes: &Arc<Mutex<HashMap<String, UnitOutcome>>>,
        retries: &Arc<AtomicUsize>,
    ) {
        let max_attempts = config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match client.translate_batch(&batch, lang).await {
                Ok(translations) => {
                    let mut outcomes = outcomes.lock().await;
                    for unit in &batch {
                        // 键对不上号的单元留给完成阶段的清扫
                        if let Some(translation) = translations.get(unit) {
                            outcomes.insert(
                                unit.clone(),
                                UnitOutcome::Translated(translation.clone()),
                            );
                        }
                    }
                    return;
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    retries.fetch_add(1, Ordering::Relaxed);
                    let backoff = config.backoff() * 2u32.saturating_pow(attempt as u32 - 1);
                    tracing::debug!(
                        attempt,
                        max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        "批次失败，退避后重试: {}",
                        e
                    );
                    sleep(backoff).await;
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        units = batch.len(),
                        "批次达到终态失败: {}",
                        e
                    );
                    let mut outcomes = outcomes.lock().await;
                    for unit in batch {
                        outcomes.insert(unit, UnitOutcome::Failed);
                    }
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::cache::FingerprintCache;
    use crate::translation::provider::MockProvider;
    use crate::translation::segmenter::TOKEN_ERROR_CLASS;

    fn scheduler_with(provider: MockProvider, config: SchedulerConfig) -> DeliveryScheduler {
        let engine = Arc::new(TranslationEngine::new(
            Arc::new(provider),
            Arc::new(FingerprintCache::in_memory(64)),
        ));
        DeliveryScheduler::new(Arc::new(EngineBatchClient::new(engine)), config)
    }

    fn fast_config() -> SchedulerConfig {
        SchedulerConfig {
            chunk_size: 2,
            max_concurrent: 3,
            max_attempts: 2,
            backoff_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_translate_page_applies_all_units() {
        let provider =
            MockProvider::with_dictionary(&[("Hello", "Hola"), ("World", "Mundo")]);
        let scheduler = scheduler_with(provider, fast_config());

        let skeleton = segmenter::segment("<p>Hello</p><p>World</p><p>Hello</p>", "es");
        let report = scheduler.translate_page(&skeleton.html, "es").await;

        assert_eq!(report.total_units, 2);
        assert_eq!(report.total_placeholders, 3);
        assert_eq!(report.applied_units, 2);
        assert_eq!(report.failed_units, 0);
        // 同一单元的每个占位符都被替换
        assert_eq!(report.html.matches("Hola").count(), 2);
        assert!(report.html.contains("Mundo"));
    }

    /// 总是返回传输错误的批量客户端
    struct FailingClient;

    #[async_trait]
    impl BatchTranslate for FailingClient {
        async fn translate_batch(
            &self,
            _units: &[String],
            _lang: &str,
        ) -> TranslationResult<HashMap<String, String>> {
            Err(TranslationError::Transport("connection refused".to_string()))
        }
    }

    /// 前 N 次失败、之后成功的批量客户端（验证重试路径）
    struct FlakyClient {
        failures: AtomicUsize,
    }

    #[async_trait]
    impl BatchTranslate for FlakyClient {
        async fn translate_batch(
            &self,
            units: &[String],
            lang: &str,
        ) -> TranslationResult<HashMap<String, String>> {
            if self.failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n > 0 { Some(n - 1) } else { None }
            }).is_ok() {
                return Err(TranslationError::Transport("flaky".to_string()));
            }
            Ok(units
                .iter()
                .map(|u| (u.clone(), format!("{}:{}", lang, u)))
                .collect())
        }
    }

    /// 返回与任何待译单元都对不上号的键（触发清扫路径）
    struct MismatchedClient;

    #[async_trait]
    impl BatchTranslate for MismatchedClient {
        async fn translate_batch(
            &self,
            _units: &[String],
            _lang: &str,
        ) -> TranslationResult<HashMap<String, String>> {
            let mut map = HashMap::new();
            map.insert("unrelated key".to_string(), "whatever".to_string());
            Ok(map)
        }
    }

    #[tokio::test]
    async fn test_terminal_failure_marks_placeholders() {
        let scheduler = DeliveryScheduler::new(Arc::new(FailingClient), fast_config());

        let skeleton = segmenter::segment("<p>Hello</p>", "es");
        let report = scheduler.translate_page(&skeleton.html, "es").await;

        assert_eq!(report.applied_units, 0);
        assert_eq!(report.failed_units, 1);
        assert!(report.retries >= 1);
        assert!(report.html.contains(TOKEN_ERROR_CLASS));
    }

    #[tokio::test]
    async fn test_retry_recovers_after_transient_failure() {
        let client = FlakyClient {
            failures: AtomicUsize::new(1),
        };
        let scheduler = DeliveryScheduler::new(Arc::new(client), fast_config());

        let skeleton = segmenter::segment("<p>Hello</p>", "es");
        let report = scheduler.translate_page(&skeleton.html, "es").await;

        assert_eq!(report.applied_units, 1);
        assert_eq!(report.failed_units, 0);
        assert_eq!(report.retries, 1);
        assert!(report.html.contains("es:Hello"));
    }

    #[tokio::test]
    async fn test_mismatched_keys_are_swept_to_failed() {
        let scheduler = DeliveryScheduler::new(Arc::new(MismatchedClient), fast_config());

        let skeleton = segmenter::segment("<p>Hello</p>", "es");
        let report = scheduler.translate_page(&skeleton.html, "es").await;

        // 没有占位符停留在"加载中"：对不上号的单元被清扫为失败态
        assert_eq!(report.applied_units, 0);
        assert_eq!(report.failed_units, 1);
        assert!(report.html.contains(TOKEN_ERROR_CLASS));
    }

    #[tokio::test]
    async fn test_batch_failure_is_isolated() {
        // 字典外的单元由 Mock 返回 "{lang}:{text}"，不会失败；
        // 这里验证一个批次的失败不影响其它批次的成功。
        struct HalfFailingClient;

        #[async_trait]
        impl BatchTranslate for HalfFailingClient {
            async fn translate_batch(
                &self,
                units: &[String],
                lang: &str,
            ) -> TranslationResult<HashMap<String, String>> {
                if units.iter().any(|u| u.contains("poison")) {
                    return Err(TranslationError::Transport("poisoned batch".to_string()));
                }
                Ok(units
                    .iter()
                    .map(|u| (u.clone(), format!("{}:{}", lang, u)))
                    .collect())
            }
        }

        let config = SchedulerConfig {
            chunk_size: 1,
            max_concurrent: 2,
            max_attempts: 2,
            backoff_ms: 1,
        };
        let scheduler = DeliveryScheduler::new(Arc::new(HalfFailingClient), config);

        let skeleton = segmenter::segment("<p>good one</p><p>poison pill</p>", "es");
        let report = scheduler.translate_page(&skeleton.html, "es").await;

        assert_eq!(report.batches, 2);
        assert_eq!(report.applied_units, 1);
        assert_eq!(report.failed_units, 1);
        assert!(report.html.contains("es:good one"));
        assert!(report.html.contains(TOKEN_ERROR_CLASS));
    }

    #[tokio::test]
    async fn test_empty_page_completes_immediately() {
        let provider = MockProvider::with_dictionary(&[]);
        let scheduler = scheduler_with(provider, fast_config());

        let report = scheduler.translate_page("<p></p>", "es").await;
        assert_eq!(report.total_units, 0);
        assert_eq!(report.batches, 0);
    }
}
