//! Web 服务器主程序入口

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use wikiglot::translation::cache::FingerprintCache;
use wikiglot::translation::config::AppConfig;
use wikiglot::translation::engine::TranslationEngine;
use wikiglot::translation::provider::GeminiClient;
use wikiglot::web::{MemoryRevisionStore, WebServer};

#[derive(Parser, Debug)]
#[command(name = "wikiglot-web", about = "Incremental page translation server")]
struct Args {
    /// 配置文件路径（TOML）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 绑定地址，覆盖配置文件
    #[arg(short, long)]
    bind: Option<String>,

    /// 端口，覆盖配置文件
    #[arg(short, long)]
    port: Option<u16>,

    /// 修订内容种子文件（JSON），用于本地演示分节翻译接口
    #[arg(long)]
    seed: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    if config.provider.api_key.is_empty() {
        tracing::warn!("未配置 API 密钥，所有未命中缓存的翻译调用都会失败");
    }

    let provider = Arc::new(GeminiClient::new(config.provider.clone())?);
    let cache = Arc::new(FingerprintCache::new(&config.cache)?);
    let engine = Arc::new(TranslationEngine::new(provider, cache));

    let revisions = Arc::new(MemoryRevisionStore::new());
    if let Some(seed) = args.seed {
        let loaded = revisions.load_seed(&seed).await?;
        tracing::info!(revisions = loaded, "已加载修订种子");
    }

    let server = WebServer::new(config.server.clone(), engine, revisions);
    server.start().await?;

    Ok(())
}
