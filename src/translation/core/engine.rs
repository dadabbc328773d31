//! 批量翻译引擎
//!
//! 引擎负责一次调用中的批量解析：
//!
//! 1. 按组合键查询缓存，命中的译文直接使用
//! 2. 未命中的单元按指纹去重，保留首次出现的单元
//! 3. 把全部未命中单元合并成一个请求发送给后端
//! 4. 校验译文数量，写回缓存
//!
//! 引擎只处理文本单元，不关心内容格式。写回由处理器完成。

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::fingerprint::{cache_key, cache_key_extended};
use super::types::TextUnit;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::lookup::{
    parallel_lookup_with, sequential_lookup_with, LookupOutcome,
};
use crate::translation::provider::{TranslateRequest, TranslationBackend};
use crate::translation::storage::TranslationCache;

/// 默认的并行查询阈值
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 5;

/// 引擎配置
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 单元数量达到该值时并行查询缓存，0 表示始终顺序查询
    pub parallel_threshold: usize,

    /// 使用 `指纹:源语言:目标语言:模型` 作为缓存键
    ///
    /// 不同模型或源语言的译文互不覆盖，但与短键缓存不兼容
    pub extended_keys: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            extended_keys: false,
        }
    }
}

/// 一次批量解析的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// 指纹 → 译文，覆盖所有成功解析的唯一指纹
    pub translations: HashMap<String, String>,
    /// 译文来自缓存的单元数量，重复出现的单元分别计数
    pub cached_count: usize,
    /// 由后端翻译的唯一指纹数量
    pub translated_count: usize,
}

/// 批量翻译引擎
///
/// 所有方法只需要 `&self`，可以在并发调用之间共享。
pub struct TranslationEngine {
    backend: Arc<dyn TranslationBackend>,
    cache: Option<Arc<dyn TranslationCache>>,
    stats: EngineStats,
    config: EngineConfig,
}

impl TranslationEngine {
    pub fn new(
        backend: Arc<dyn TranslationBackend>,
        cache: Option<Arc<dyn TranslationCache>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            backend,
            cache,
            stats: EngineStats::default(),
            config,
        }
    }

    pub fn backend(&self) -> &Arc<dyn TranslationBackend> {
        &self.backend
    }

    pub fn cache(&self) -> Option<&Arc<dyn TranslationCache>> {
        self.cache.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 单元对应的缓存键
    pub fn key_for(&self, fingerprint: &str, source_lang: &str, target_lang: &str) -> String {
        if self.config.extended_keys {
            cache_key_extended(fingerprint, source_lang, target_lang, self.backend.model())
        } else {
            cache_key(fingerprint, target_lang)
        }
    }

    /// 解析一批文本单元
    ///
    /// `template` 提供语言、术语表等请求参数，其中的 `texts` 和
    /// `text_contexts` 会被未命中的单元覆盖。
    ///
    /// 后端返回的译文数量与请求不一致时返回 `CountMismatch`，
    /// 此时不会写入任何缓存。
    pub async fn resolve(
        &self,
        cancel: &CancellationToken,
        units: &[TextUnit],
        template: &TranslateRequest,
    ) -> TranslationResult<BatchOutcome> {
        let start_time = Instant::now();

        if cancel.is_cancelled() {
            return Err(TranslationError::Cancelled);
        }

        let LookupOutcome { hits, misses } = self.lookup(cancel, units, template).await?;

        let cached_units = units
            .iter()
            .filter(|unit| hits.contains_key(&unit.fingerprint))
            .count();
        let mut outcome = BatchOutcome {
            cached_count: cached_units,
            translations: hits,
            translated_count: 0,
        };
        self.stats.add_cache_hits(outcome.cached_count);
        if outcome.cached_count > 0 {
            metrics::counter!("translayer_cache_hits_total").increment(outcome.cached_count as u64);
        }

        tracing::debug!(
            "批量解析: {} 个单元, 缓存命中 {}, 待翻译 {}",
            units.len(),
            outcome.cached_count,
            misses.len()
        );

        if !misses.is_empty() {
            let translated = self.dispatch(cancel, &misses, template).await?;
            self.write_back(&misses, &translated, template).await;

            outcome.translated_count = misses.len();
            for (unit, text) in misses.iter().zip(translated) {
                outcome.translations.insert(unit.fingerprint.clone(), text);
            }
        }

        self.stats.inc_batches_processed();
        self.stats.add_units_resolved(units.len());
        self.stats.add_processing_time(start_time.elapsed());

        Ok(outcome)
    }

    async fn lookup(
        &self,
        cancel: &CancellationToken,
        units: &[TextUnit],
        template: &TranslateRequest,
    ) -> TranslationResult<LookupOutcome> {
        let key_of = |fp: &str| self.key_for(fp, &template.source_lang, &template.target_lang);

        match &self.cache {
            Some(cache) => {
                let threshold = self.config.parallel_threshold;
                if threshold > 0 && units.len() >= threshold {
                    parallel_lookup_with(cache, units, key_of, cancel).await
                } else {
                    sequential_lookup_with(cache, units, key_of, cancel).await
                }
            }
            None => {
                // 没有缓存时仍然需要去重
                let empty: Arc<dyn TranslationCache> = Arc::new(NoCache);
                sequential_lookup_with(&empty, units, key_of, cancel).await
            }
        }
    }

    /// 把所有未命中单元合并为一个后端请求
    async fn dispatch(
        &self,
        cancel: &CancellationToken,
        misses: &[TextUnit],
        template: &TranslateRequest,
    ) -> TranslationResult<Vec<String>> {
        if cancel.is_cancelled() {
            return Err(TranslationError::Cancelled);
        }

        let request = TranslateRequest {
            texts: misses.iter().map(|u| u.text.clone()).collect(),
            text_contexts: misses.iter().map(|u| u.context.clone()).collect(),
            ..template.clone()
        };
        let expected = request.len();
        let chars_sent: usize = request.texts.iter().map(|t| t.chars().count()).sum();

        tracing::debug!(
            "发送翻译请求: 后端 {}, {} 条文本, {} 字符",
            self.backend.name(),
            expected,
            chars_sent
        );

        self.stats.inc_backend_requests();
        self.stats.add_characters_sent(chars_sent);
        metrics::counter!("translayer_backend_requests_total").increment(1);

        let translated = match self.backend.translate(cancel, request).await {
            Ok(translated) => translated,
            Err(e) => {
                if !e.is_cancellation() {
                    self.stats.inc_translation_errors();
                }
                return Err(e);
            }
        };

        if translated.len() != expected {
            self.stats.inc_translation_errors();
            return Err(TranslationError::CountMismatch {
                expected,
                got: translated.len(),
            });
        }

        self.stats.add_units_translated(expected);
        self.stats
            .add_characters_received(translated.iter().map(|t| t.chars().count()).sum());
        metrics::counter!("translayer_units_translated_total").increment(expected as u64);

        Ok(translated)
    }

    /// 写回缓存，失败只记录不中断
    async fn write_back(&self, misses: &[TextUnit], translated: &[String], template: &TranslateRequest) {
        let Some(cache) = &self.cache else {
            return;
        };

        for (unit, text) in misses.iter().zip(translated) {
            let key = self.key_for(&unit.fingerprint, &template.source_lang, &template.target_lang);
            if let Err(e) = cache.set(&key, text).await {
                tracing::warn!("写入缓存失败 ({}): {}", cache.name(), e);
                self.stats.inc_cache_write_failures();
                metrics::counter!("translayer_cache_write_failures_total").increment(1);
            }
        }
    }

    /// 获取统计信息
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }
}

/// 未配置缓存时使用的空实现
struct NoCache;

#[async_trait::async_trait]
impl TranslationCache for NoCache {
    async fn get(&self, _key: &str) -> Option<String> {
        None
    }

    async fn set(&self, _key: &str, _value: &str) -> TranslationResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "none"
    }
}

// ============================================================================
// 统计信息
// ============================================================================

/// 引擎统计信息
///
/// 所有计数器都是累加的，使用 Relaxed 顺序更新。
#[derive(Debug, Default)]
pub struct EngineStats {
    /// 完成的批量解析次数
    pub batches_processed: AtomicUsize,
    /// 参与解析的单元总数（包含重复指纹）
    pub units_resolved: AtomicUsize,
    /// 译文来自缓存的单元数
    pub cache_hits: AtomicUsize,
    /// 后端翻译的唯一指纹数
    pub units_translated: AtomicUsize,
    pub backend_requests: AtomicUsize,
    pub characters_sent: AtomicUsize,
    pub characters_received: AtomicUsize,
    /// 后端调用失败和数量不匹配
    pub translation_errors: AtomicUsize,
    pub cache_write_failures: AtomicUsize,
    /// 总处理时间（微秒）
    pub total_processing_time: AtomicU64,
}

impl EngineStats {
    pub fn inc_batches_processed(&self) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_units_resolved(&self, count: usize) {
        self.units_resolved.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_cache_hits(&self, count: usize) {
        self.cache_hits.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_units_translated(&self, count: usize) {
        self.units_translated.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_backend_requests(&self) {
        self.backend_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_characters_sent(&self, count: usize) {
        self.characters_sent.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_characters_received(&self, count: usize) {
        self.characters_received.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_translation_errors(&self) {
        self.translation_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_write_failures(&self) {
        self.cache_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_processing_time(&self, duration: Duration) {
        self.total_processing_time
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn processing_time(&self) -> Duration {
        Duration::from_micros(self.total_processing_time.load(Ordering::Relaxed))
    }

    /// 所有计数器归零
    pub fn reset(&self) {
        for counter in [
            &self.batches_processed,
            &self.units_resolved,
            &self.cache_hits,
            &self.units_translated,
            &self.backend_requests,
            &self.characters_sent,
            &self.characters_received,
            &self.translation_errors,
            &self.cache_write_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.total_processing_time.store(0, Ordering::Relaxed);
    }
}
