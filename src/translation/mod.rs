//! 翻译模块
//!
//! - **core**: 文本单元、指纹、差异比较、批量解析引擎和统一服务
//! - **processor**: HTML 与源代码的提取和写回
//! - **provider**: 翻译后端接口、OpenAI 后端、限速与重试包装
//! - **pipeline**: 缓存批量查询
//! - **storage**: 进程内缓存、Redis 缓存、导出与导入
//! - **config**: 服务配置与应用配置加载
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use translayer::translation::{
//!     LocalCache, MockBackend, TranslationService, TranslatorConfig,
//! };
//!
//! # async fn example() -> translayer::translation::TranslationResult<()> {
//! let config = TranslatorConfig::new("es").with_cache(Arc::new(LocalCache::default()));
//! let service = TranslationService::new(Arc::new(MockBackend::new()), config)?;
//!
//! let result = service
//!     .process_html(&CancellationToken::new(), "<p>Hello</p>")
//!     .await?;
//! println!("{}", result.content);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

// ============================================================================
// 子模块声明
// ============================================================================

/// 配置管理模块
pub mod config;

/// 核心翻译模块
pub mod core;

/// 错误处理模块
pub mod error;

/// 缓存查询
pub mod pipeline;

/// 内容处理器
pub mod processor;

/// 翻译后端
pub mod provider;

/// 缓存存储与导出
pub mod storage;

// ============================================================================
// 核心API导出
// ============================================================================

pub use self::core::{
    diff, fingerprint, DiffResult, HealthLevel, HealthStatus, ProcessedContent, ServiceStats,
    TextUnit, TranslationService, TranslationStyle,
};

pub use config::{constants, AppConfig, ConfigManager, TranslatorConfig};

pub use error::{ErrorCategory, ErrorSeverity, TranslationError, TranslationResult};

pub use processor::{ContentProcessor, HtmlProcessor, SourceProcessor, SourceSyntax};

#[cfg(feature = "openai")]
pub use provider::{OpenAiBackend, OpenAiConfig};
pub use provider::{
    MockBackend, RateLimitConfig, RateLimitedBackend, RateLimiter, RetryConfig, RetryingBackend,
    TranslateRequest, TranslationBackend,
};

#[cfg(feature = "redis-cache")]
pub use storage::{RedisCache, RedisCacheConfig};
pub use storage::{CacheExporter, CacheImporter, LocalCache, TranslationCache};

// ============================================================================
// 便利函数
// ============================================================================

/// 翻译一个 HTML 文档，不使用缓存
///
/// 适合一次性调用；需要缓存、术语表等参数时请直接构造 [`TranslationService`]。
pub async fn translate_html(
    backend: Arc<dyn TranslationBackend>,
    html: &str,
    target_lang: &str,
) -> TranslationResult<String> {
    let service = TranslationService::new(backend, TranslatorConfig::new(target_lang))?;
    let result = service.process_html(&CancellationToken::new(), html).await?;
    Ok(result.content)
}
