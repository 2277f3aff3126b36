//! Web 服务器模块
//!
//! 对外暴露批量翻译与分节翻译两个 REST 接口，外加健康检查和缓存
//! 统计。宿主渲染管线通过 [`store::RevisionStore`] 接入。

pub mod handlers;
pub mod routes;
pub mod store;
pub mod types;

use std::sync::Arc;

use crate::translation::config::ServerConfig;
use crate::translation::engine::TranslationEngine;
use crate::translation::error::{TranslationError, TranslationResult};

pub use routes::build_router;
pub use store::{MemoryRevisionStore, RevisionStore};
pub use types::AppState;

/// Web 服务器
pub struct WebServer {
    config: ServerConfig,
    state: AppState,
}

impl WebServer {
    pub fn new(
        config: ServerConfig,
        engine: Arc<TranslationEngine>,
        revisions: Arc<dyn RevisionStore>,
    ) -> Self {
        let state = AppState {
            engine,
            revisions,
            batch_cap: config.batch_cap,
        };
        Self { config, state }
    }

    /// 启动并一直服务，直到进程终止
    pub async fn start(self) -> TranslationResult<()> {
        let addr = format!("{}:{}", self.config.bind_addr, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| TranslationError::Config(format!("无法绑定 {}: {}", addr, e)))?;

        tracing::info!("wikiglot-web 监听于 http://{}", addr);

        let router = build_router(self.state);
        axum::serve(listener, router)
            .await
            .map_err(|e| TranslationError::Transport(e.to_string()))
    }
}
