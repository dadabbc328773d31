//! 令牌桶速率限制

use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{TranslateRequest, TranslationBackend};
use crate::translation::error::{TranslationError, TranslationResult};

/// 默认每分钟请求数
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;

/// 速率限制配置
///
/// 两个字段为 0 时分别取默认值：每分钟 60 次，突发容量等于每分钟请求数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub burst_size: u32,
}

impl RateLimitConfig {
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            burst_size: 0,
        }
    }
}

type DirectLimiter = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// 令牌桶
///
/// 初始为满桶，每 `60 秒 / 每分钟请求数` 补充一个令牌。
/// 并发获取由 governor 的原子状态保证不会超发。
pub struct RateLimiter {
    limiter: DirectLimiter,
    clock: DefaultClock,
    requests_per_minute: NonZeroU32,
    burst_size: NonZeroU32,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let requests_per_minute = NonZeroU32::new(config.requests_per_minute)
            .or_else(|| NonZeroU32::new(DEFAULT_REQUESTS_PER_MINUTE))
            .unwrap_or(NonZeroU32::MIN);
        let burst_size = NonZeroU32::new(config.burst_size).unwrap_or(requests_per_minute);

        let quota = Quota::per_minute(requests_per_minute).allow_burst(burst_size);

        Self {
            limiter: governor::RateLimiter::direct(quota),
            clock: DefaultClock::default(),
            requests_per_minute,
            burst_size,
        }
    }

    /// 尝试获取一个令牌，不等待
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// 等待直到获得令牌，取消时返回 [`TranslationError::Cancelled`]
    pub async fn wait(&self, cancel: &CancellationToken) -> TranslationResult<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(TranslationError::Cancelled);
            }

            let delay = match self.limiter.check() {
                Ok(()) => return Ok(()),
                Err(not_until) => not_until.wait_time_from(self.clock.now()),
            };

            tokio::select! {
                _ = cancel.cancelled() => return Err(TranslationError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute.get()
    }

    pub fn burst_size(&self) -> u32 {
        self.burst_size.get()
    }

    /// 补充一个令牌所需的时间
    pub fn token_interval(&self) -> Duration {
        Duration::from_secs(60) / self.requests_per_minute.get()
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("requests_per_minute", &self.requests_per_minute)
            .field("burst_size", &self.burst_size)
            .finish()
    }
}

/// 在调用内层后端前先等待令牌
pub struct RateLimitedBackend {
    inner: Arc<dyn TranslationBackend>,
    limiter: Arc<RateLimiter>,
}

impl RateLimitedBackend {
    pub fn new(inner: Arc<dyn TranslationBackend>, config: RateLimitConfig) -> Self {
        Self::with_limiter(inner, Arc::new(RateLimiter::new(config)))
    }

    /// 多个后端共享同一个限流器
    pub fn with_limiter(inner: Arc<dyn TranslationBackend>, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

#[async_trait]
impl TranslationBackend for RateLimitedBackend {
    async fn translate(
        &self,
        cancel: &CancellationToken,
        request: TranslateRequest,
    ) -> TranslationResult<Vec<String>> {
        if !self.limiter.try_acquire() {
            tracing::debug!("等待速率限制令牌 ({})", self.inner.name());
            self.limiter.wait(cancel).await?;
        }
        self.inner.translate(cancel, request).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}
