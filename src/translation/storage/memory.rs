//! 进程内翻译缓存

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::TranslationCache;
use crate::translation::error::TranslationResult;

// ============================================================================
// 核心类型
// ============================================================================

/// 缓存条目
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    inserted_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        match ttl {
            Some(ttl) => self.inserted_at.elapsed() > ttl,
            None => false,
        }
    }
}

/// 缓存统计信息
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// 读取时发现并删除的过期条目
    pub expired: u64,
    /// 容量满时驱逐的条目
    pub evictions: u64,
    pub total_entries: usize,
}

impl CacheStats {
    /// 计算缓存命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_requests as f64
        }
    }
}

#[derive(Debug, Default)]
struct CacheCounters {
    total_requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    expired: AtomicU64,
    evictions: AtomicU64,
}

impl CacheCounters {
    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn reset(&self) {
        for counter in [
            &self.total_requests,
            &self.cache_hits,
            &self.cache_misses,
            &self.expired,
            &self.evictions,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// 进程内缓存
///
/// TTL 为 `None` 时条目永不过期。过期条目在下一次读取时删除，
/// 在此之前仍计入 [`LocalCache::len`]。
///
/// 读取只持有读锁，多个读取可以同时进行；只有写入和删除过期条目时
/// 才获取写锁。
pub struct LocalCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    counters: CacheCounters,
    ttl: Option<Duration>,
    max_entries: Option<usize>,
}

// ============================================================================
// 实现
// ============================================================================

impl LocalCache {
    /// 创建缓存，`ttl` 为零视为永不过期
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            counters: CacheCounters::default(),
            ttl: ttl.filter(|ttl| !ttl.is_zero()),
            max_entries: None,
        }
    }

    /// 限制条目数量，写满后驱逐最早写入的条目
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries.max(1));
        self
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// 条目数量（包含尚未被读取清理的过期条目）
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 清空缓存
    pub fn clear(&self) {
        self.write_entries().clear();
    }

    /// 清理过期条目，返回删除数量
    pub fn cleanup_expired(&self) -> usize {
        let mut entries = self.write_entries();
        let initial_size = entries.len();
        entries.retain(|_, entry| !entry.is_expired(self.ttl));
        let removed = initial_size - entries.len();

        self.counters
            .expired
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// 获取统计信息
    pub fn stats(&self) -> CacheStats {
        let counters = &self.counters;
        CacheStats {
            total_requests: counters.total_requests.load(Ordering::Relaxed),
            cache_hits: counters.cache_hits.load(Ordering::Relaxed),
            cache_misses: counters.cache_misses.load(Ordering::Relaxed),
            expired: counters.expired.load(Ordering::Relaxed),
            evictions: counters.evictions.load(Ordering::Relaxed),
            total_entries: self.len(),
        }
    }

    /// 重置统计信息
    pub fn reset_stats(&self) {
        self.counters.reset();
    }

    // 锁中毒时继续使用内部数据，缓存内容不会因 panic 处于不一致状态
    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn evict_oldest(&self, entries: &mut HashMap<String, CacheEntry>) {
        let oldest_key = entries
            .iter()
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest_key {
            entries.remove(&key);
            CacheCounters::inc(&self.counters.evictions);
        }
    }

    fn lookup(&self, key: &str) -> Option<String> {
        CacheCounters::inc(&self.counters.total_requests);

        let expired = match self.read_entries().get(key) {
            Some(entry) if !entry.is_expired(self.ttl) => {
                CacheCounters::inc(&self.counters.cache_hits);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            let mut entries = self.write_entries();
            // 两次加锁之间条目可能已被重新写入
            if entries
                .get(key)
                .is_some_and(|entry| entry.is_expired(self.ttl))
            {
                entries.remove(key);
                CacheCounters::inc(&self.counters.expired);
            }
        }

        CacheCounters::inc(&self.counters.cache_misses);
        None
    }

    fn store(&self, key: &str, value: &str) {
        let mut entries = self.write_entries();

        if let Some(max) = self.max_entries {
            if entries.len() >= max && !entries.contains_key(key) {
                self.evict_oldest(&mut entries);
            }
        }

        entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                inserted_at: Instant::now(),
            },
        );
    }
}

impl Default for LocalCache {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl TranslationCache for LocalCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.lookup(key)
    }

    async fn set(&self, key: &str, value: &str) -> TranslationResult<()> {
        self.store(key, value);
        Ok(())
    }

    async fn entries(&self) -> TranslationResult<Vec<(String, String)>> {
        let entries = self.read_entries();
        let mut live: Vec<(String, String)> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired(self.ttl))
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect();
        live.sort();
        Ok(live)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_basic_operations() {
        let cache = LocalCache::default();

        // 测试插入和获取
        cache.set("hello:es", "hola").await.unwrap();
        assert_eq!(cache.get("hello:es").await, Some("hola".to_string()));
        assert_eq!(cache.get("world:es").await, None);

        // 测试大小
        assert_eq!(cache.len(), 1);

        // 测试清空
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("hello:es").await, None);
    }

    #[tokio::test]
    async fn test_cache_stats() {
        let cache = LocalCache::default();
        cache.set("a", "1").await.unwrap();

        cache.get("a").await;
        cache.get("a").await;
        cache.get("b").await;

        let stats = cache.stats();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.cache_hits, 2);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.total_entries, 1);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 1e-9);

        cache.reset_stats();
        assert_eq!(cache.stats().total_requests, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_evicted_on_read() {
        let cache = LocalCache::new(Some(Duration::from_secs(60)));
        cache.set("k", "v").await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;

        // 读取前过期条目仍然计数
        assert_eq!(cache.len(), 1);
        assert!(cache.entries().await.unwrap().is_empty());

        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().expired, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_never_expires() {
        let cache = LocalCache::new(Some(Duration::ZERO));
        assert_eq!(cache.ttl(), None);

        cache.set("k", "v").await.unwrap();
        tokio::time::advance(Duration::from_secs(86_400 * 365)).await;
        assert_eq!(cache.get("k").await, Some("v".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_expired() {
        let cache = LocalCache::new(Some(Duration::from_secs(10)));
        cache.set("old", "1").await.unwrap();
        tokio::time::advance(Duration::from_secs(11)).await;
        cache.set("new", "2").await.unwrap();

        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_entries_evicts_oldest() {
        let cache = LocalCache::default().with_max_entries(2);
        cache.set("a", "1").await.unwrap();
        tokio::time::advance(Duration::from_millis(1)).await;
        cache.set("b", "2").await.unwrap();
        tokio::time::advance(Duration::from_millis(1)).await;
        cache.set("c", "3").await.unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").await, None);
        assert_eq!(cache.get("c").await, Some("3".to_string()));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reads() {
        let cache = std::sync::Arc::new(LocalCache::default());
        cache.set("a", "1").await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..64 {
            let cache = cache.clone();
            tasks.spawn(async move {
                let key = if i % 2 == 0 { "a" } else { "missing" };
                cache.get(key).await
            });
        }

        let mut hits = 0;
        while let Some(result) = tasks.join_next().await {
            if result.unwrap().is_some() {
                hits += 1;
            }
        }

        let stats = cache.stats();
        assert_eq!(hits, 32);
        assert_eq!(stats.total_requests, 64);
        assert_eq!(stats.cache_hits, 32);
        assert_eq!(stats.cache_misses, 32);
        assert_eq!(stats.expired, 0);
    }

    #[tokio::test]
    async fn test_entries_are_sorted_and_live() {
        let cache = LocalCache::default();
        cache.set("b", "2").await.unwrap();
        cache.set("a", "1").await.unwrap();

        let entries = cache.entries().await.unwrap();
        assert_eq!(
            entries,
            vec![("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())]
        );
        assert_eq!(cache.name(), "memory");
    }
}
