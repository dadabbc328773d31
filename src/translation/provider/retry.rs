//! 指数退避重试
//!
//! 只有 `is_retryable()` 为真的错误会被重试。第 k 次重试前等待
//! `min(base_delay * 2^(k-1), max_delay)`，等待期间响应取消。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{TranslateRequest, TranslationBackend};
use crate::translation::error::{TranslationError, TranslationResult};

/// 重试配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// 首次调用之外的最大重试次数
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// 第 `retry` 次重试（从 1 开始）前的等待时间
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// 带重试地执行异步操作
///
/// 每次调用前检查取消，取消时返回 [`TranslationError::Cancelled`]。
/// 重试耗尽后返回最后一次的错误。
pub async fn with_retry<T, F, Fut>(
    cancel: &CancellationToken,
    config: &RetryConfig,
    mut operation: F,
) -> TranslationResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = TranslationResult<T>>,
{
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(TranslationError::Cancelled);
        }

        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !error.is_retryable() || attempt >= config.max_retries {
            return Err(error);
        }

        attempt += 1;
        let delay = config.delay_for(attempt);
        tracing::warn!(
            "翻译请求失败，{:?} 后进行第 {}/{} 次重试: {}",
            delay,
            attempt,
            config.max_retries,
            error
        );
        metrics::counter!("translayer_retries_total").increment(1);

        tokio::select! {
            _ = cancel.cancelled() => return Err(TranslationError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// 对内层后端的每次调用应用重试
pub struct RetryingBackend {
    inner: Arc<dyn TranslationBackend>,
    config: RetryConfig,
}

impl RetryingBackend {
    pub fn new(inner: Arc<dyn TranslationBackend>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

#[async_trait]
impl TranslationBackend for RetryingBackend {
    async fn translate(
        &self,
        cancel: &CancellationToken,
        request: TranslateRequest,
    ) -> TranslationResult<Vec<String>> {
        with_retry(cancel, &self.config, || {
            self.inner.translate(cancel, request.clone())
        })
        .await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::error::helpers;
    use crate::translation::provider::MockBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        }
    }

    #[test]
    fn test_delay_schedule() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for(1), Duration::from_secs(1));
        assert_eq!(config.delay_for(2), Duration::from_secs(2));
        assert_eq!(config.delay_for(3), Duration::from_secs(4));
        assert_eq!(config.delay_for(6), Duration::from_secs(30));
        assert_eq!(config.delay_for(100), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();

        let result: TranslationResult<()> = with_retry(&cancel, &fast_config(2), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(helpers::retryable_provider_error("503")) }
        })
        .await;

        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_returns_immediately() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();

        let result: TranslationResult<()> = with_retry(&cancel, &fast_config(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TranslationError::CountMismatch { expected: 2, got: 1 }) }
        })
        .await;

        assert_eq!(
            result.unwrap_err(),
            TranslationError::CountMismatch { expected: 2, got: 1 }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failure() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();

        let result = with_retry(&cancel, &fast_config(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(helpers::retryable_provider_error("timeout"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_attempt() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: TranslationResult<()> = with_retry(&cancel, &fast_config(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;

        assert_eq!(result, Err(TranslationError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_during_backoff() {
        let cancel = CancellationToken::new();
        let config = RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
        };

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let result: TranslationResult<()> = with_retry(&cancel, &config, || async {
            Err(helpers::retryable_provider_error("429"))
        })
        .await;

        assert_eq!(result, Err(TranslationError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrying_backend() {
        let inner = Arc::new(MockBackend::new().with_responder(|_| {
            Err(helpers::retryable_provider_error("502 bad gateway"))
        }));
        let backend = RetryingBackend::new(inner.clone(), fast_config(2));
        let cancel = CancellationToken::new();

        let err = backend
            .translate(
                &cancel,
                TranslateRequest {
                    texts: vec!["Hello".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(inner.calls(), 3);
    }
}
