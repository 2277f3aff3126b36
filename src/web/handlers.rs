//! REST 接口处理器

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use crate::translation::error::TranslationError;
use crate::web::types::{
    AppState, BatchTranslateRequest, BatchTranslateResponse, ErrorResponse, HealthResponse,
    SectionTranslateRequest, SectionTranslateResponse,
};

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorResponse { error: message })).into_response()
}

/// 把翻译错误映射为 HTTP 状态码
fn status_for(error: &TranslationError) -> StatusCode {
    match error {
        TranslationError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        TranslationError::Transport(_) | TranslationError::Response(_) => StatusCode::BAD_GATEWAY,
        TranslationError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// 健康检查
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// 缓存统计
pub async fn cache_stats(State(state): State<AppState>) -> Response {
    Json(state.engine.cache().stats()).into_response()
}

/// 批量翻译（宽容模式）
///
/// 超出服务端上限的字符串被静默截断——截断而非整体拒绝，客户端批次
/// 策略独立于服务端上限，截断的尾部由客户端在后续批次里重新提交。
pub async fn translate_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchTranslateRequest>,
) -> Response {
    if request.target_lang.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "targetLang 不能为空".to_string());
    }

    let mut strings = request.strings;
    if strings.len() > state.batch_cap {
        tracing::warn!(
            received = strings.len(),
            cap = state.batch_cap,
            "批量翻译请求超限，截断尾部"
        );
        strings.truncate(state.batch_cap);
    }

    tracing::info!(
        count = strings.len(),
        lang = %request.target_lang,
        "批量翻译请求"
    );

    let translations = state
        .engine
        .translate_strings(&strings, &request.target_lang)
        .await;

    Json(BatchTranslateResponse { translations }).into_response()
}

/// 分节翻译（严格模式）
///
/// 空 `html` 表示没有更多节，客户端据此停止渐进拉取。
pub async fn translate_section(
    Path(rev_id): Path<u64>,
    State(state): State<AppState>,
    Json(request): Json<SectionTranslateRequest>,
) -> Response {
    if request.target_lang.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "targetLang 不能为空".to_string());
    }

    if !state.revisions.revision_exists(rev_id).await {
        return error_response(StatusCode::NOT_FOUND, format!("修订 {} 不存在", rev_id));
    }

    let section_html = match state.revisions.section_html(rev_id, request.section).await {
        Ok(html) => html,
        Err(e) => {
            tracing::error!(rev_id, section = request.section, "取节失败: {}", e);
            return error_response(status_for(&e), e.to_string());
        }
    };

    let Some(source_html) = section_html else {
        return Json(SectionTranslateResponse {
            html: String::new(),
            section: request.section,
        })
        .into_response();
    };

    match state
        .engine
        .translate_html(&source_html, &request.target_lang)
        .await
    {
        Ok(html) => Json(SectionTranslateResponse {
            html,
            section: request.section,
        })
        .into_response(),
        Err(e) => {
            tracing::error!(
                rev_id,
                section = request.section,
                lang = %request.target_lang,
                "分节翻译失败: {}",
                e
            );
            error_response(status_for(&e), e.to_string())
        }
    }
}
