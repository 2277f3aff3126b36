//! 修订内容源
//!
//! 宿主系统的渲染管线（把存储的文档修订渲染为 HTML）不在本库范围内，
//! 这里只定义它的接口：按（修订号, 节编号）取出一节渲染好的 HTML。
//! `MemoryRevisionStore` 是用于测试与本地演示的内存实现。

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::translation::error::{TranslationError, TranslationResult};

/// 渲染管线接口
#[async_trait]
pub trait RevisionStore: Send + Sync {
    /// 修订是否存在
    async fn revision_exists(&self, rev_id: u64) -> bool;

    /// 取出指定节渲染后的 HTML
    ///
    /// 返回 `None` 表示该修订没有这一节（文档结束）。
    async fn section_html(&self, rev_id: u64, section: usize)
        -> TranslationResult<Option<String>>;
}

/// 内存修订源
#[derive(Default)]
pub struct MemoryRevisionStore {
    revisions: RwLock<HashMap<u64, Vec<String>>>,
}

impl MemoryRevisionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入一个修订的全部节
    pub async fn insert(&self, rev_id: u64, sections: Vec<String>) {
        self.revisions.write().await.insert(rev_id, sections);
    }

    /// 从 JSON 种子文件加载：`{ "<rev_id>": ["<section html>", ...], ... }`
    pub async fn load_seed(&self, path: &Path) -> TranslationResult<usize> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TranslationError::Config(format!("无法读取种子文件 {}: {}", path.display(), e))
        })?;
        let parsed: HashMap<String, Vec<String>> = serde_json::from_str(&raw)
            .map_err(|e| TranslationError::Config(format!("种子文件解析失败: {}", e)))?;

        let mut revisions = self.revisions.write().await;
        let mut loaded = 0usize;
        for (key, sections) in parsed {
            let rev_id: u64 = key.parse().map_err(|_| {
                TranslationError::Config(format!("无效的修订号: {}", key))
            })?;
            revisions.insert(rev_id, sections);
            loaded += 1;
        }

        Ok(loaded)
    }
}

#[async_trait]
impl RevisionStore for MemoryRevisionStore {
    async fn revision_exists(&self, rev_id: u64) -> bool {
        self.revisions.read().await.contains_key(&rev_id)
    }

    async fn section_html(
        &self,
        rev_id: u64,
        section: usize,
    ) -> TranslationResult<Option<String>> {
        let revisions = self.revisions.read().await;
        Ok(revisions
            .get(&rev_id)
            .and_then(|sections| sections.get(section))
            .cloned())
    }
}
