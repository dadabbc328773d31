//! 存储模块
//!
//! 以组合键（指纹 + 目标语言）保存译文。进程内缓存与 Redis 缓存实现
//! 同一个 [`TranslationCache`] 接口，由调用方以 `Arc` 注入。

use async_trait::async_trait;

use crate::translation::error::{TranslationError, TranslationResult};

pub mod export;
pub mod memory;
#[cfg(feature = "redis-cache")]
pub mod redis;

pub use export::{CacheExporter, CacheImporter, ExportData, ExportEntry, ImportReport};
pub use memory::{CacheStats, LocalCache};
#[cfg(feature = "redis-cache")]
pub use self::redis::{RedisCache, RedisCacheConfig};

/// 译文缓存接口
///
/// `get` 不返回错误：读取失败按未命中处理。写入错误由调用方决定如何处理。
#[async_trait]
pub trait TranslationCache: Send + Sync {
    /// 读取译文
    async fn get(&self, key: &str) -> Option<String>;

    /// 写入译文
    async fn set(&self, key: &str, value: &str) -> TranslationResult<()>;

    /// 当前有效的全部条目，用于导出
    async fn entries(&self) -> TranslationResult<Vec<(String, String)>> {
        Err(TranslationError::Cache(format!(
            "缓存 \"{}\" 不支持导出",
            self.name()
        )))
    }

    /// 释放连接等资源，由创建缓存的一方在使用结束后调用
    async fn close(&self) {}

    /// 缓存名称，用于日志
    fn name(&self) -> &str;
}
