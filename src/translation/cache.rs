//! 指纹缓存模块
//!
//! 以（内容哈希, 目标语言）为键的翻译缓存。相同的规范化文本在任何
//! 页面、任何时间都会得到相同的键，因此同一段文字全站只需翻译一次。
//! 缓存条目一经写入即不可变、永不过期；并发写入同一键位时后写者被
//! 静默丢弃（first-writer-wins）——翻译被视为输入的纯函数，冲突双方
//! 的值在假设上逐字节相同。
//!
//! 结构为两层：进程内 LRU 热层 + 可选的 redb 持久层。

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use lru::LruCache;
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::translation::config::CacheConfig;
use crate::translation::error::{TranslationError, TranslationResult};

/// 持久层表：键 `"{hash_hex}:{lang}"`，值为 JSON 编码的缓存行
const TRANSLATIONS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("translations");

/// 规范化文本的 256 位 blake3 摘要（十六进制）
///
/// 不变量：相同的规范化文本 ⇒ 相同的哈希，与来源页面、语言、时间无关。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    /// 对文本做规范化（去首尾空白）后计算摘要
    pub fn of(text: &str) -> Self {
        Self(blake3::hash(text.trim().as_bytes()).to_hex().to_string())
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 持久层中的一行
#[derive(Debug, Serialize, Deserialize)]
struct CacheRow {
    text: String,
    created_at: String,
}

/// 缓存统计信息
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    ignored_conflicts: AtomicU64,
    write_errors: AtomicU64,
}

/// 统计快照
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub ignored_conflicts: u64,
    pub write_errors: u64,
}

/// 指纹缓存
pub struct FingerprintCache {
    local: RwLock<LruCache<String, String>>,
    db: Option<Database>,
    stats: CacheStats,
}

impl FingerprintCache {
    /// 按配置创建缓存，`db_path` 为空时只保留内存热层
    pub fn new(config: &CacheConfig) -> TranslationResult<Self> {
        let db = match &config.db_path {
            Some(path) => Some(Self::open_database(Path::new(path))?),
            None => None,
        };

        Ok(Self {
            local: RwLock::new(LruCache::new(
                NonZeroUsize::new(config.local_cache_size)
                    .unwrap_or(NonZeroUsize::new(1024).unwrap()),
            )),
            db,
            stats: CacheStats::default(),
        })
    }

    /// 纯内存缓存（测试用）
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            local: RwLock::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1024).unwrap()),
            )),
            db: None,
            stats: CacheStats::default(),
        }
    }

    fn open_database(path: &Path) -> TranslationResult<Database> {
        let db = Database::create(path)
            .map_err(|e| TranslationError::Storage(format!("打开缓存数据库失败: {}", e)))?;

        // 预先建表，读路径不必区分"表不存在"和"无数据"
        let txn = db
            .begin_write()
            .map_err(|e| TranslationError::Storage(e.to_string()))?;
        txn.open_table(TRANSLATIONS_TABLE)
            .map_err(|e| TranslationError::Storage(e.to_string()))?;
        txn.commit()
            .map_err(|e| TranslationError::Storage(e.to_string()))?;

        Ok(db)
    }

    fn key(hash: &ContentHash, lang: &str) -> String {
        format!("{}:{}", hash.as_hex(), lang)
    }

    /// 批量查询，只返回命中项；键不存在是未命中而非错误
    pub async fn lookup(
        &self,
        hashes: &[ContentHash],
        lang: &str,
    ) -> HashMap<ContentHash, String> {
        let mut results = HashMap::new();
        let mut cold: Vec<&ContentHash> = Vec::new();
        let mut hits = 0u64;
        let mut misses = 0u64;

        {
            // LruCache::get 会更新访问顺序，需要写锁
            let mut local = self.local.write().await;
            for hash in hashes {
                match local.get(&Self::key(hash, lang)) {
                    Some(text) => {
                        results.insert(hash.clone(), text.clone());
                        hits += 1;
                    }
                    None => cold.push(hash),
                }
            }
        }

        if !cold.is_empty() {
            let disk_hits = match &self.db {
                Some(db) => self.lookup_disk(db, &cold, lang),
                None => HashMap::new(),
            };

            // 输入可能含重复哈希，命中/未命中按探测次数逐一计数
            for hash in &cold {
                if disk_hits.contains_key(*hash) {
                    hits += 1;
                } else {
                    misses += 1;
                }
            }

            if !disk_hits.is_empty() {
                let mut local = self.local.write().await;
                for (hash, text) in &disk_hits {
                    local.put(Self::key(hash, lang), text.clone());
                }
            }
            results.extend(disk_hits);
        }

        self.stats.hits.fetch_add(hits, Ordering::Relaxed);
        self.stats.misses.fetch_add(misses, Ordering::Relaxed);

        results
    }

    fn lookup_disk(
        &self,
        db: &Database,
        hashes: &[&ContentHash],
        lang: &str,
    ) -> HashMap<ContentHash, String> {
        let mut results = HashMap::new();

        let txn = match db.begin_read() {
            Ok(txn) => txn,
            Err(e) => {
                tracing::warn!("缓存读事务创建失败: {}", e);
                return results;
            }
        };
        let table = match txn.open_table(TRANSLATIONS_TABLE) {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!("缓存表打开失败: {}", e);
                return results;
            }
        };

        for hash in hashes {
            match table.get(Self::key(hash, lang).as_str()) {
                Ok(Some(raw)) => match serde_json::from_str::<CacheRow>(raw.value()) {
                    Ok(row) => {
                        results.insert((*hash).clone(), row.text);
                    }
                    Err(e) => {
                        tracing::warn!(hash = %hash, "缓存行解码失败: {}", e);
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(hash = %hash, "缓存读取失败: {}", e);
                }
            }
        }

        results
    }

    /// 批量写入，尽力而为且幂等
    ///
    /// 已存在的键被静默跳过；单行写入失败只记录日志，绝不让调用方的
    /// 整体翻译流程失败。
    pub async fn store(&self, entries: &HashMap<ContentHash, String>, lang: &str) {
        if entries.is_empty() {
            return;
        }

        if let Some(db) = &self.db {
            if let Err(e) = self.store_disk(db, entries, lang) {
                self.stats.write_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("缓存写入失败（继续执行）: {}", e);
            }
        }

        // 热层总是预热，同一请求路径内的后续查询直接命中
        let mut local = self.local.write().await;
        for (hash, text) in entries {
            local.put(Self::key(hash, lang), text.clone());
        }
    }

    fn store_disk(
        &self,
        db: &Database,
        entries: &HashMap<ContentHash, String>,
        lang: &str,
    ) -> TranslationResult<()> {
        let txn = db
            .begin_write()
            .map_err(|e| TranslationError::Storage(e.to_string()))?;
        {
            let mut table = txn
                .open_table(TRANSLATIONS_TABLE)
                .map_err(|e| TranslationError::Storage(e.to_string()))?;

            for (hash, text) in entries {
                let key = Self::key(hash, lang);

                // first-writer-wins：键已存在时丢弃本次写入
                let exists = table
                    .get(key.as_str())
                    .map_err(|e| TranslationError::Storage(e.to_string()))?
                    .is_some();
                if exists {
                    self.stats.ignored_conflicts.fetch_add(1, Ordering::Relaxed);
                    continue;
                }

                let row = CacheRow {
                    text: text.clone(),
                    created_at: Utc::now().to_rfc3339(),
                };
                let encoded = serde_json::to_string(&row)
                    .map_err(|e| TranslationError::Storage(e.to_string()))?;
                table
                    .insert(key.as_str(), encoded.as_str())
                    .map_err(|e| TranslationError::Storage(e.to_string()))?;
                self.stats.inserts.fetch_add(1, Ordering::Relaxed);
            }
        }
        txn.commit()
            .map_err(|e| TranslationError::Storage(e.to_string()))?;

        Ok(())
    }

    /// 获取统计快照
    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            inserts: self.stats.inserts.load(Ordering::Relaxed),
            ignored_conflicts: self.stats.ignored_conflicts.load(Ordering::Relaxed),
            write_errors: self.stats.write_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_determinism_across_whitespace() {
        assert_eq!(ContentHash::of("Hello world"), ContentHash::of("  Hello world  "));
        assert_eq!(ContentHash::of("Hello world"), ContentHash::of("\nHello world\t"));
        assert_ne!(ContentHash::of("Hello world"), ContentHash::of("Hello  world"));
    }

    #[tokio::test]
    async fn test_lookup_miss_is_not_an_error() {
        let cache = FingerprintCache::in_memory(16);
        let hits = cache.lookup(&[ContentHash::of("absent")], "es").await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_stats_count_each_probe() {
        let cache = FingerprintCache::in_memory(16);
        let present = ContentHash::of("Hello");
        let absent = ContentHash::of("absent");

        let mut entries = HashMap::new();
        entries.insert(present.clone(), "Hola".to_string());
        cache.store(&entries, "es").await;

        // 同一哈希重复探测，每次探测各计一次
        cache
            .lookup(&[present.clone(), present.clone(), absent.clone(), absent], "es")
            .await;

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 2);
    }

    #[tokio::test]
    async fn test_store_then_lookup() {
        let cache = FingerprintCache::in_memory(16);
        let hash = ContentHash::of("Hello");

        let mut entries = HashMap::new();
        entries.insert(hash.clone(), "Hola".to_string());
        cache.store(&entries, "es").await;

        let hits = cache.lookup(&[hash.clone()], "es").await;
        assert_eq!(hits.get(&hash).map(String::as_str), Some("Hola"));

        // 相同哈希、不同语言互不可见
        let other = cache.lookup(&[hash], "fr").await;
        assert!(other.is_empty());
    }
}
