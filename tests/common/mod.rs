// 集成测试公共模块
//
// 提供测试辅助工具和共享数据；各测试二进制只使用其中一部分。
#![allow(dead_code)]

use std::sync::Arc;

use wikiglot::translation::cache::FingerprintCache;
use wikiglot::translation::engine::TranslationEngine;
use wikiglot::translation::provider::MockProvider;
use wikiglot::web::types::AppState;
use wikiglot::web::MemoryRevisionStore;

/// 词典式 Mock + 内存缓存的引擎
pub fn engine_with_dictionary(
    pairs: &[(&str, &str)],
) -> (Arc<MockProvider>, Arc<TranslationEngine>) {
    let provider = Arc::new(MockProvider::with_dictionary(pairs));
    let engine = Arc::new(TranslationEngine::new(
        provider.clone(),
        Arc::new(FingerprintCache::in_memory(256)),
    ));
    (provider, engine)
}

/// 指定缓存的引擎
pub fn engine_with_cache(
    provider: Arc<MockProvider>,
    cache: Arc<FingerprintCache>,
) -> Arc<TranslationEngine> {
    Arc::new(TranslationEngine::new(provider, cache))
}

/// 构建带空内存修订源的应用状态
pub async fn app_state(engine: Arc<TranslationEngine>, batch_cap: usize) -> AppState {
    AppState {
        engine,
        revisions: Arc::new(MemoryRevisionStore::new()),
        batch_cap,
    }
}

/// 一段接近真实渲染输出的条目 HTML
///
/// 覆盖：重复文本、站内/红链/锚点链接、引用标记、编辑入口、样式标签。
pub fn sample_article_html() -> &'static str {
    concat!(
        "<style>.infobox{float:right}</style>",
        "<p>The <a href=\"/wiki/Apple\">apple</a> is a round fruit.",
        "<sup class=\"reference\"><a href=\"#cite_note-1\">[1]</a></sup></p>",
        "<h2>History<span class=\"mw-editsection\">[edit]</span></h2>",
        "<p>  Apples have been grown for thousands of years.  </p>",
        "<ul><li>Read more</li><li>Read more</li></ul>",
        "<p><a class=\"new\" href=\"/wiki/Malus_sieversii_cultivars\">missing page</a></p>",
    )
}
