//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制

use thiserror::Error;

/// 翻译错误类型
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// 配置错误（如缺少 API 密钥），不可重试
    #[error("配置错误: {0}")]
    Config(String),

    /// 网络传输错误（超时、非成功状态码等），可重试
    #[error("网络错误: {0}")]
    Transport(String),

    /// 翻译服务响应格式错误（JSON 解析失败或数量不匹配），可重试
    #[error("响应格式错误: {0}")]
    Response(String),

    /// 缓存读写错误，不应阻断翻译流程
    #[error("缓存错误: {0}")]
    Cache(String),

    /// 持久化存储错误
    #[error("存储错误: {0}")]
    Storage(String),

    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 返回译文的键与任何待译单元都不匹配
    #[error("译文键不匹配: {0}")]
    Mismatch(String),
}

/// 翻译结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

impl TranslationError {
    /// 检查错误是否可重试
    ///
    /// 响应格式错误也算可重试：同样的输入再调用一次可能得到合法输出。
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::Transport(_) => true,
            TranslationError::Response(_) => true,
            TranslationError::Cache(_) => true,
            TranslationError::Storage(_) => true,
            TranslationError::Config(_) => false,
            TranslationError::InvalidInput(_) => false,
            TranslationError::Mismatch(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::Config(_) => ErrorSeverity::Critical,
            TranslationError::Transport(_) => ErrorSeverity::Warning,
            TranslationError::Response(_) => ErrorSeverity::Error,
            TranslationError::Cache(_) => ErrorSeverity::Warning,
            TranslationError::Storage(_) => ErrorSeverity::Warning,
            TranslationError::InvalidInput(_) => ErrorSeverity::Info,
            TranslationError::Mismatch(_) => ErrorSeverity::Warning,
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl From<reqwest::Error> for TranslationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TranslationError::Transport(format!("请求超时: {}", err))
        } else {
            TranslationError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(err: serde_json::Error) -> Self {
        TranslationError::Response(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(TranslationError::Transport("timeout".into()).is_retryable());
        assert!(TranslationError::Response("bad json".into()).is_retryable());
        assert!(!TranslationError::Config("no api key".into()).is_retryable());
        assert!(!TranslationError::Mismatch("unknown key".into()).is_retryable());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(
            TranslationError::Config("x".into()).severity()
                > TranslationError::Transport("x".into()).severity()
        );
    }
}
