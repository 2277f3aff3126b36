//! 缓存系统集成测试
//!
//! 覆盖持久层的跨进程可见性与并发写入时的 first-writer-wins 语义

use std::collections::HashMap;
use std::sync::Arc;

use wikiglot::translation::cache::{ContentHash, FingerprintCache};
use wikiglot::translation::config::CacheConfig;
use wikiglot::translation::provider::MockProvider;

mod common;

use common::engine_with_cache;

fn disk_config(dir: &tempfile::TempDir) -> CacheConfig {
    CacheConfig {
        db_path: Some(
            dir.path()
                .join("translations.redb")
                .to_string_lossy()
                .to_string(),
        ),
        local_cache_size: 8,
    }
}

#[tokio::test]
async fn test_entries_survive_cache_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = disk_config(&dir);
    let hash = ContentHash::of("Hello world");

    {
        let cache = FingerprintCache::new(&config).unwrap();
        let mut entries = HashMap::new();
        entries.insert(hash.clone(), "Hola mundo".to_string());
        cache.store(&entries, "es").await;
    }

    // 重新打开数据库：热层是空的，命中必然来自持久层
    let cache = FingerprintCache::new(&config).unwrap();
    let hits = cache.lookup(&[hash.clone()], "es").await;
    assert_eq!(hits.get(&hash).map(String::as_str), Some("Hola mundo"));
}

#[tokio::test]
async fn test_concurrent_duplicate_store_keeps_one_row() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(FingerprintCache::new(&disk_config(&dir)).unwrap());
    let hash = ContentHash::of("Hello");

    let mut entries = HashMap::new();
    entries.insert(hash.clone(), "Hola".to_string());

    // 两个并发写入者写同一 (hash, lang) 键位
    let a = {
        let cache = Arc::clone(&cache);
        let entries = entries.clone();
        tokio::spawn(async move { cache.store(&entries, "es").await })
    };
    let b = {
        let cache = Arc::clone(&cache);
        let entries = entries.clone();
        tokio::spawn(async move { cache.store(&entries, "es").await })
    };
    a.await.unwrap();
    b.await.unwrap();

    // 后写者被静默丢弃：恰好一行存活，没有任何错误
    let stats = cache.stats();
    assert_eq!(stats.inserts, 1);
    assert_eq!(stats.ignored_conflicts, 1);
    assert_eq!(stats.write_errors, 0);

    let hits = cache.lookup(&[hash.clone()], "es").await;
    assert_eq!(hits.get(&hash).map(String::as_str), Some("Hola"));
}

#[tokio::test]
async fn test_two_callers_share_one_surviving_row() {
    // 两个调用方（各自的引擎与服务连接）同时翻译同一段未缓存文本
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(FingerprintCache::new(&disk_config(&dir)).unwrap());

    let provider_a = Arc::new(MockProvider::with_dictionary(&[("Hello", "Hola")]));
    let provider_b = Arc::new(MockProvider::with_dictionary(&[("Hello", "Hola")]));
    let engine_a = engine_with_cache(provider_a.clone(), Arc::clone(&cache));
    let engine_b = engine_with_cache(provider_b.clone(), Arc::clone(&cache));

    let input = vec!["Hello".to_string()];
    let (results_a, results_b) = tokio::join!(
        engine_a.translate_strings(&input, "es"),
        engine_b.translate_strings(&input, "es"),
    );

    // 双方都拿到正确译文，且不报错
    assert_eq!(results_a["Hello"], "Hola");
    assert_eq!(results_b["Hello"], "Hola");

    // 双方都可能调用了翻译服务，但缓存里恰好一行存活
    let total_calls = provider_a.call_count() + provider_b.call_count();
    assert!(total_calls >= 1);
    assert_eq!(cache.stats().inserts, 1);
}

#[tokio::test]
async fn test_languages_are_isolated() {
    let cache = FingerprintCache::in_memory(16);
    let hash = ContentHash::of("Hello");

    let mut es = HashMap::new();
    es.insert(hash.clone(), "Hola".to_string());
    cache.store(&es, "es").await;

    let mut fr = HashMap::new();
    fr.insert(hash.clone(), "Bonjour".to_string());
    cache.store(&fr, "fr").await;

    assert_eq!(cache.lookup(&[hash.clone()], "es").await[&hash], "Hola");
    assert_eq!(cache.lookup(&[hash.clone()], "fr").await[&hash], "Bonjour");
}
