//! Redis 翻译缓存
//!
//! 多个进程共享同一份译文缓存。过期由 Redis 服务端负责。

use std::time::Duration;

use ::redis::aio::MultiplexedConnection;
use ::redis::Client;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::TranslationCache;
use crate::translation::error::{TranslationError, TranslationResult};

pub use crate::translation::config::constants::DEFAULT_KEY_PREFIX;
use crate::translation::config::constants::DEFAULT_REDIS_URL;

/// 连接超时
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// SCAN 每批返回的键数量提示
const SCAN_BATCH: usize = 200;

/// Redis 缓存配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisCacheConfig {
    pub url: String,
    /// 过期时间（秒），0 表示永久缓存
    pub ttl_secs: u64,
    pub key_prefix: String,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REDIS_URL.to_string(),
            ttl_secs: 0,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

/// Redis 缓存客户端
pub struct RedisCache {
    conn: RwLock<Option<MultiplexedConnection>>,
    config: RedisCacheConfig,
}

impl RedisCache {
    /// 连接 Redis 并执行一次 PING
    pub async fn connect(mut config: RedisCacheConfig) -> TranslationResult<Self> {
        if config.key_prefix.is_empty() {
            config.key_prefix = DEFAULT_KEY_PREFIX.to_string();
        }

        let client = Client::open(config.url.as_str())?;
        let conn = tokio::time::timeout(CONNECT_TIMEOUT, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| TranslationError::Cache(format!("连接 Redis 超时: {}", config.url)))??;

        let cache = Self::from_connection(conn, config);
        cache.ping().await?;

        tracing::info!("已连接 Redis 缓存，键前缀: {}", cache.config.key_prefix);
        Ok(cache)
    }

    /// 使用已有连接创建缓存
    pub fn from_connection(conn: MultiplexedConnection, mut config: RedisCacheConfig) -> Self {
        if config.key_prefix.is_empty() {
            config.key_prefix = DEFAULT_KEY_PREFIX.to_string();
        }
        Self {
            conn: RwLock::new(Some(conn)),
            config,
        }
    }

    pub fn config(&self) -> &RedisCacheConfig {
        &self.config
    }

    /// 测试 Redis 连接
    pub async fn ping(&self) -> TranslationResult<()> {
        let mut conn = self.connection().await?;
        let _: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    async fn connection(&self) -> TranslationResult<MultiplexedConnection> {
        self.conn
            .read()
            .await
            .clone()
            .ok_or_else(|| TranslationError::Cache("Redis 连接已关闭".to_string()))
    }

    async fn try_get(&self, key: &str) -> TranslationResult<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = ::redis::cmd("GET")
            .arg(self.full_key(key))
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }
}

#[async_trait]
impl TranslationCache for RedisCache {
    async fn get(&self, key: &str) -> Option<String> {
        match self.try_get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Redis 读取失败，按未命中处理: {}", e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> TranslationResult<()> {
        let mut conn = self.connection().await?;
        let mut cmd = ::redis::cmd("SET");
        cmd.arg(self.full_key(key)).arg(value);
        if self.config.ttl_secs > 0 {
            cmd.arg("EX").arg(self.config.ttl_secs);
        }
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn entries(&self) -> TranslationResult<Vec<(String, String)>> {
        let mut conn = self.connection().await?;
        let pattern = format!("{}*", self.config.key_prefix);
        let mut cursor: u64 = 0;
        let mut entries = Vec::new();

        loop {
            let (next, keys): (u64, Vec<String>) = ::redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            for full_key in keys {
                // 扫描期间过期的键直接跳过
                let value: Option<String> = ::redis::cmd("GET")
                    .arg(&full_key)
                    .query_async(&mut conn)
                    .await?;
                if let (Some(value), Some(key)) =
                    (value, full_key.strip_prefix(&self.config.key_prefix))
                {
                    entries.push((key.to_string(), value));
                }
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        entries.sort();
        Ok(entries)
    }

    /// 关闭连接，之后的读取视为未命中，写入返回错误
    async fn close(&self) {
        if self.conn.write().await.take().is_some() {
            tracing::debug!("Redis 缓存连接已关闭");
        }
    }

    fn name(&self) -> &str {
        "redis"
    }
}
