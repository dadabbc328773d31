//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制

use std::fmt;

use thiserror::Error;

/// 翻译错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// 内容处理器解析或重组失败
    #[error("内容处理错误 [{content_type}]: {message}")]
    Processor {
        content_type: String,
        message: String,
    },

    /// 未注册对应内容类型的处理器
    #[error("没有注册内容类型 \"{0}\" 的处理器")]
    NoProcessor(String),

    /// 翻译后端错误，是否可重试由后端决定
    #[error("翻译后端错误: {message}")]
    Provider { message: String, retryable: bool },

    /// 后端返回的译文数量与请求不一致
    #[error("译文数量不匹配: 期望 {expected} 条，实际 {got} 条")]
    CountMismatch { expected: usize, got: usize },

    /// 缓存错误
    #[error("缓存错误: {0}")]
    Cache(String),

    /// 操作被取消
    #[error("操作已取消")]
    Cancelled,

    /// 超时错误
    #[error("操作超时: {0}")]
    Timeout(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(String),

    /// 网络错误
    #[error("网络错误: {0}")]
    Network(String),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(String),
}

impl TranslationError {
    /// 检查错误是否可重试
    ///
    /// 只有后端显式标记为可重试的错误才会被重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TranslationError::Provider {
                retryable: true,
                ..
            }
        )
    }

    /// 是否为取消错误
    pub fn is_cancellation(&self) -> bool {
        matches!(self, TranslationError::Cancelled)
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::Processor { .. } => ErrorSeverity::Error,
            TranslationError::NoProcessor(_) => ErrorSeverity::Error,
            TranslationError::Provider { retryable, .. } => {
                if *retryable {
                    ErrorSeverity::Warning
                } else {
                    ErrorSeverity::Error
                }
            }
            TranslationError::CountMismatch { .. } => ErrorSeverity::Error,
            TranslationError::Cache(_) => ErrorSeverity::Warning,
            TranslationError::Cancelled => ErrorSeverity::Info,
            TranslationError::Timeout(_) => ErrorSeverity::Warning,
            TranslationError::Config(_) => ErrorSeverity::Critical,
            TranslationError::Serialization(_) => ErrorSeverity::Error,
            TranslationError::Network(_) => ErrorSeverity::Warning,
            TranslationError::Io(_) => ErrorSeverity::Error,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::Processor { .. } => ErrorCategory::Processing,
            TranslationError::NoProcessor(_) => ErrorCategory::Processing,
            TranslationError::Provider { .. } => ErrorCategory::Provider,
            TranslationError::CountMismatch { .. } => ErrorCategory::Provider,
            TranslationError::Cache(_) => ErrorCategory::Cache,
            TranslationError::Cancelled => ErrorCategory::Cancellation,
            TranslationError::Timeout(_) => ErrorCategory::Timeout,
            TranslationError::Config(_) => ErrorCategory::Configuration,
            TranslationError::Serialization(_) => ErrorCategory::Serialization,
            TranslationError::Network(_) => ErrorCategory::Network,
            TranslationError::Io(_) => ErrorCategory::Io,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(mut self, context: T) -> Self {
        match &mut self {
            TranslationError::Processor { message, .. }
            | TranslationError::Provider { message, .. } => {
                *message = format!("{} (上下文: {})", message, context);
            }
            TranslationError::Cache(msg)
            | TranslationError::Timeout(msg)
            | TranslationError::Config(msg)
            | TranslationError::Serialization(msg)
            | TranslationError::Network(msg)
            | TranslationError::Io(msg) => {
                *msg = format!("{} (上下文: {})", msg, context);
            }
            TranslationError::NoProcessor(_)
            | TranslationError::CountMismatch { .. }
            | TranslationError::Cancelled => {}
        }

        self
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Provider,
    Cache,
    Processing,
    Cancellation,
    Timeout,
    Serialization,
    Io,
}

/// 标准错误转换
impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::Io(error.to_string())
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::Serialization(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::Config(format!("TOML解析错误: {}", error))
    }
}

impl From<config::ConfigError> for TranslationError {
    fn from(error: config::ConfigError) -> Self {
        TranslationError::Config(error.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        TranslationError::Timeout(format!("异步操作超时: {}", error))
    }
}

#[cfg(feature = "openai")]
impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        // 连接失败和超时属于瞬时故障
        let retryable = error.is_timeout() || error.is_connect() || error.is_request();
        TranslationError::Provider {
            message: format!("HTTP请求失败: {}", error),
            retryable,
        }
    }
}

#[cfg(feature = "redis-cache")]
impl From<redis::RedisError> for TranslationError {
    fn from(error: redis::RedisError) -> Self {
        TranslationError::Cache(format!("Redis错误: {}", error))
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误统计信息
#[derive(Debug, Clone, Default)]
pub struct ErrorStats {
    pub total_errors: usize,
    pub by_category: std::collections::HashMap<ErrorCategory, usize>,
    pub by_severity: std::collections::HashMap<ErrorSeverity, usize>,
    pub retryable_errors: usize,
    pub critical_errors: usize,
}

impl ErrorStats {
    /// 记录错误
    pub fn record_error(&mut self, error: &TranslationError) {
        self.total_errors += 1;

        let category = error.category();
        *self.by_category.entry(category).or_insert(0) += 1;

        let severity = error.severity();
        *self.by_severity.entry(severity).or_insert(0) += 1;

        if error.is_retryable() {
            self.retryable_errors += 1;
        }

        if severity == ErrorSeverity::Critical {
            self.critical_errors += 1;
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Default::default();
    }

    /// 获取错误率
    pub fn error_rate(&self, total_operations: usize) -> f64 {
        if total_operations == 0 {
            0.0
        } else {
            self.total_errors as f64 / total_operations as f64
        }
    }
}

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 记录并返回错误
    pub fn log_error<T>(error: TranslationError) -> TranslationResult<T> {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("翻译信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
            ErrorSeverity::Error => tracing::error!("翻译错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("翻译严重错误: {}", error),
        }

        Err(error)
    }

    /// 创建可重试的后端错误
    pub fn retryable_provider_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::Provider {
            message: msg.to_string(),
            retryable: true,
        }
    }

    /// 创建不可重试的后端错误
    pub fn fatal_provider_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::Provider {
            message: msg.to_string(),
            retryable: false,
        }
    }

    /// 创建内容处理错误
    pub fn processor_error<C: fmt::Display, M: fmt::Display>(
        content_type: C,
        msg: M,
    ) -> TranslationError {
        TranslationError::Processor {
            content_type: content_type.to_string(),
            message: msg.to_string(),
        }
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::Config(msg.to_string())
    }

    /// 创建缓存错误
    pub fn cache_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::Cache(msg.to_string())
    }

    /// 创建超时错误
    pub fn timeout_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::Timeout(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_flagged_provider_errors_retry() {
        assert!(helpers::retryable_provider_error("503").is_retryable());
        assert!(!helpers::fatal_provider_error("401").is_retryable());
        assert!(!TranslationError::Network("reset".into()).is_retryable());
        assert!(!TranslationError::CountMismatch { expected: 2, got: 1 }.is_retryable());
        assert!(!TranslationError::Cancelled.is_retryable());
        assert!(TranslationError::Cancelled.is_cancellation());
    }

    #[test]
    fn test_with_context_appends_message() {
        let error = helpers::cache_error("写入失败").with_context("redis");
        assert_eq!(error, TranslationError::Cache("写入失败 (上下文: redis)".into()));

        // 无消息的变体保持不变
        let error = TranslationError::Cancelled.with_context("ignored");
        assert_eq!(error, TranslationError::Cancelled);
    }

    #[test]
    fn test_error_stats() {
        let mut stats = ErrorStats::default();
        stats.record_error(&helpers::retryable_provider_error("timeout"));
        stats.record_error(&helpers::config_error("missing target"));
        stats.record_error(&TranslationError::Cancelled);

        assert_eq!(stats.total_errors, 3);
        assert_eq!(stats.retryable_errors, 1);
        assert_eq!(stats.critical_errors, 1);
        assert_eq!(stats.by_category[&ErrorCategory::Provider], 1);
        assert!((stats.error_rate(6) - 0.5).abs() < f64::EPSILON);

        stats.reset();
        assert_eq!(stats.total_errors, 0);
    }
}
