//! 翻译后端
//!
//! [`TranslationBackend`] 是编排层与外部翻译服务之间的唯一接口。
//! 速率限制和重试以包装器的形式实现同一接口，可以任意嵌套：
//!
//! ```text
//! RetryingBackend
//!     └── RateLimitedBackend
//!             └── OpenAiBackend
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::translation::core::types::TranslationStyle;
use crate::translation::error::TranslationResult;

pub mod mock;
#[cfg(feature = "openai")]
pub mod openai;
pub mod rate_limit;
pub mod retry;

pub use mock::MockBackend;
#[cfg(feature = "openai")]
pub use openai::{OpenAiBackend, OpenAiConfig};
pub use rate_limit::{RateLimitConfig, RateLimitedBackend, RateLimiter};
pub use retry::{with_retry, RetryConfig, RetryingBackend};

/// 一次批量翻译请求
///
/// `text_contexts` 与 `texts` 按下标对应，空字符串表示没有上下文。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TranslateRequest {
    pub texts: Vec<String>,
    pub text_contexts: Vec<String>,
    pub target_lang: String,
    pub source_lang: String,
    pub excluded_terms: Vec<String>,
    /// 整体内容的说明，例如 "电商网站的结账页面"
    pub context: String,
    pub glossary: BTreeMap<String, String>,
    pub style: TranslationStyle,
}

impl TranslateRequest {
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// 是否存在至少一个非空的单条上下文
    pub fn has_text_contexts(&self) -> bool {
        self.text_contexts.iter().any(|c| !c.is_empty())
    }
}

/// 翻译后端接口
///
/// 成功时返回与 `texts` 数量相同、顺序一致的译文。
/// 错误通过 [`TranslationError::Provider`](crate::translation::error::TranslationError::Provider)
/// 的 `retryable` 标记说明是否值得重试。
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    async fn translate(
        &self,
        cancel: &CancellationToken,
        request: TranslateRequest,
    ) -> TranslationResult<Vec<String>>;

    /// 后端名称，用于日志
    fn name(&self) -> &str;

    /// 参与扩展缓存键的模型标识
    fn model(&self) -> &str {
        "default"
    }
}
