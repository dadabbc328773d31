//! 统一翻译服务
//!
//! 对外的主要入口。一次 [`TranslationService::process`] 调用依次完成：
//! 语言判断、提取、批量解析、写回和收尾处理。服务本身只需要 `&self`，
//! 可以放进 `Arc` 在多个任务之间共享。

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::engine::{EngineConfig, EngineStats, TranslationEngine};
use super::languages;
use super::types::{ProcessedContent, TextUnit};
use crate::translation::config::TranslatorConfig;
use crate::translation::error::{helpers, TranslationError, TranslationResult};
use crate::translation::processor::{default_processors, html, ContentProcessor};
use crate::translation::provider::{TranslateRequest, TranslationBackend};
use crate::translation::storage::TranslationCache;

/// 统一翻译服务
pub struct TranslationService {
    config: TranslatorConfig,
    processors: HashMap<String, Arc<dyn ContentProcessor>>,
    engine: TranslationEngine,
    stats: ServiceStats,
}

impl TranslationService {
    /// 创建翻译服务
    ///
    /// 配置中未注册的内容类型使用默认处理器。
    pub fn new(backend: Arc<dyn TranslationBackend>, config: TranslatorConfig) -> TranslationResult<Self> {
        config.validate()?;

        let mut processors = default_processors()?;
        processors.extend(
            config
                .processors
                .iter()
                .map(|(name, processor)| (name.clone(), Arc::clone(processor))),
        );

        let engine = TranslationEngine::new(
            backend,
            config.cache.clone(),
            EngineConfig {
                parallel_threshold: config.parallel_threshold,
                extended_keys: config.extended_keys,
            },
        );

        tracing::debug!(
            "创建翻译服务: {} -> {}, 缓存: {}",
            config.source_lang,
            config.target_lang,
            config.cache.as_ref().map_or("无", |c| c.name())
        );

        Ok(Self {
            config,
            processors,
            engine,
            stats: ServiceStats::default(),
        })
    }

    /// 翻译一段内容
    ///
    /// 源语言与目标语言的基础语言相同时原样返回，不调用后端。
    /// 提取或后端出错时整个调用失败，不返回部分结果。
    pub async fn process(
        &self,
        cancel: &CancellationToken,
        content: &str,
        content_type: &str,
    ) -> TranslationResult<ProcessedContent> {
        let start_time = Instant::now();
        self.stats.inc_calls();

        let result = self.process_inner(cancel, content, content_type).await;

        match &result {
            Ok(processed) => {
                self.stats.add_units_extracted(processed.total_units);
                self.stats.add_units_translated(processed.translated_count);
                self.stats.add_units_cached(processed.cached_count);
                tracing::info!(
                    "翻译完成 [{}]: {} 个单元, 翻译 {}, 缓存 {}, 耗时 {:?}",
                    content_type,
                    processed.total_units,
                    processed.translated_count,
                    processed.cached_count,
                    start_time.elapsed()
                );
            }
            Err(e) if e.is_cancellation() => {
                tracing::info!("翻译已取消 [{}]", content_type);
            }
            Err(e) => {
                self.stats.inc_failures();
                tracing::error!("翻译失败 [{}]: {}", content_type, e);
            }
        }
        self.stats.add_processing_time(start_time.elapsed());

        result
    }

    async fn process_inner(
        &self,
        cancel: &CancellationToken,
        content: &str,
        content_type: &str,
    ) -> TranslationResult<ProcessedContent> {
        tracing::info!(
            "开始翻译 [{}]: {} -> {}",
            content_type,
            self.config.source_lang,
            self.config.target_lang
        );

        if self.is_source_lang(None) {
            tracing::info!(
                "目标语言 {} 与源语言 {} 相同，跳过翻译",
                self.config.target_lang,
                self.config.source_lang
            );
            self.stats.inc_short_circuits();
            return Ok(ProcessedContent::unchanged(content, 0));
        }

        let processor = self.processor(content_type)?;

        let (parsed, units) = processor.extract(content)?;
        if units.is_empty() {
            tracing::info!("没有找到需要翻译的文本");
            return Ok(ProcessedContent::unchanged(content, 0));
        }

        let outcome = self
            .engine
            .resolve(cancel, &units, &self.request_template())
            .await?;

        let applied = processor.apply(parsed, &units, &outcome.translations)?;
        let finalized = processor.finalize(applied, &self.config.target_lang)?;

        Ok(ProcessedContent {
            content: finalized,
            total_units: units.len(),
            translated_count: outcome.translated_count,
            cached_count: outcome.cached_count,
        })
    }

    /// 翻译 HTML 文档
    pub async fn process_html(&self, cancel: &CancellationToken, content: &str) -> TranslationResult<ProcessedContent> {
        self.process(cancel, content, html::CONTENT_TYPE).await
    }

    /// 带超时的翻译
    ///
    /// 超时后取消内部的子令牌并返回 `Timeout`，外部令牌不受影响。
    pub async fn process_with_timeout(
        &self,
        cancel: &CancellationToken,
        content: &str,
        content_type: &str,
        timeout: Duration,
    ) -> TranslationResult<ProcessedContent> {
        let child = cancel.child_token();

        match tokio::time::timeout(timeout, self.process(&child, content, content_type)).await {
            Ok(result) => result,
            Err(_) => {
                child.cancel();
                Err(helpers::timeout_error(format!(
                    "翻译 [{}] 超过 {:?}",
                    content_type, timeout
                )))
            }
        }
    }

    /// 只提取文本单元，不做翻译
    pub fn extract(&self, content: &str, content_type: &str) -> TranslationResult<Vec<TextUnit>> {
        let processor = self.processor(content_type)?;
        let (_, units) = processor.extract(content)?;
        Ok(units)
    }

    /// 目标语言是否与源语言相同
    ///
    /// `target_override` 非空时同时检查该语言，配置的目标语言已与源语言
    /// 相同时始终返回 `true`。
    pub fn is_source_lang(&self, target_override: Option<&str>) -> bool {
        let same = |target: &str| languages::same_base_language(&self.config.source_lang, target);
        same(self.config.target_lang.as_str()) || non_empty(target_override).is_some_and(same)
    }

    /// 目标语言是否从右向左书写
    pub fn is_rtl(&self, target_override: Option<&str>) -> bool {
        languages::is_rtl(self.resolve_target(target_override))
    }

    /// 目标语言的书写方向，`rtl` 或 `ltr`
    pub fn direction(&self, target_override: Option<&str>) -> &'static str {
        languages::direction(self.resolve_target(target_override))
    }

    fn resolve_target<'a>(&'a self, target_override: Option<&'a str>) -> &'a str {
        non_empty(target_override).unwrap_or(&self.config.target_lang)
    }

    pub fn target_lang(&self) -> &str {
        &self.config.target_lang
    }

    pub fn source_lang(&self) -> &str {
        &self.config.source_lang
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&Arc<dyn TranslationCache>> {
        self.engine.cache()
    }

    pub fn backend(&self) -> &Arc<dyn TranslationBackend> {
        self.engine.backend()
    }

    /// 内容类型对应的处理器
    pub fn processor(&self, content_type: &str) -> TranslationResult<&Arc<dyn ContentProcessor>> {
        self.processors
            .get(content_type)
            .ok_or_else(|| TranslationError::NoProcessor(content_type.to_string()))
    }

    /// 已注册的内容类型，按名称排序
    pub fn content_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.processors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    fn request_template(&self) -> TranslateRequest {
        TranslateRequest {
            target_lang: self.config.target_lang.clone(),
            source_lang: self.config.source_lang.clone(),
            excluded_terms: self.config.excluded_terms.clone(),
            context: self.config.context.clone(),
            glossary: self.config.glossary.clone(),
            style: self.config.style,
            ..Default::default()
        }
    }

    /// 获取服务统计信息
    pub fn stats(&self) -> &ServiceStats {
        &self.stats
    }

    pub fn engine_stats(&self) -> &EngineStats {
        self.engine.stats()
    }

    /// 重置服务和引擎的统计信息
    pub fn reset_stats(&self) {
        self.stats.reset();
        self.engine.reset_stats();
    }

    /// 健康检查
    pub fn health(&self) -> HealthStatus {
        let mut components = HashMap::new();

        let processors = if self.processors.is_empty() {
            HealthLevel::Unhealthy
        } else {
            HealthLevel::Healthy
        };
        components.insert("processors".to_string(), processors);

        let cache = if self.cache().is_some() {
            HealthLevel::Healthy
        } else {
            HealthLevel::Degraded
        };
        components.insert("cache".to_string(), cache);

        let engine = self.engine.stats();
        let requests = engine.backend_requests.load(Ordering::Relaxed);
        let errors = engine.translation_errors.load(Ordering::Relaxed);
        let backend = if requests > 0 && errors * 2 > requests {
            HealthLevel::Unhealthy
        } else if errors > 0 || engine.cache_write_failures.load(Ordering::Relaxed) > 0 {
            HealthLevel::Degraded
        } else {
            HealthLevel::Healthy
        };
        components.insert("backend".to_string(), backend);

        let overall = components
            .values()
            .copied()
            .max()
            .unwrap_or(HealthLevel::Healthy);

        HealthStatus { overall, components }
    }
}

// 空字符串视为未指定
fn non_empty(lang: Option<&str>) -> Option<&str> {
    lang.filter(|lang| !lang.trim().is_empty())
}

// ============================================================================
// 统计信息
// ============================================================================

/// 服务运行统计信息
#[derive(Debug, Default)]
pub struct ServiceStats {
    /// process 调用次数
    pub calls: AtomicUsize,
    /// 提取到的单元总数
    pub units_extracted: AtomicUsize,
    pub units_translated: AtomicUsize,
    pub units_cached: AtomicUsize,
    /// 失败的调用（不含取消）
    pub failures: AtomicUsize,
    /// 因语言相同而跳过的调用
    pub short_circuits: AtomicUsize,
    /// 总处理时间（微秒）
    pub processing_time: AtomicU64,
}

impl ServiceStats {
    pub fn inc_calls(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_units_extracted(&self, count: usize) {
        self.units_extracted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_units_translated(&self, count: usize) {
        self.units_translated.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_units_cached(&self, count: usize) {
        self.units_cached.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_failures(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_short_circuits(&self) {
        self.short_circuits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_processing_time(&self, duration: Duration) {
        self.processing_time
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// 获取统计信息的快照
    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            units_extracted: self.units_extracted.load(Ordering::Relaxed),
            units_translated: self.units_translated.load(Ordering::Relaxed),
            units_cached: self.units_cached.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            short_circuits: self.short_circuits.load(Ordering::Relaxed),
            processing_time: Duration::from_micros(self.processing_time.load(Ordering::Relaxed)),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.calls,
            &self.units_extracted,
            &self.units_translated,
            &self.units_cached,
            &self.failures,
            &self.short_circuits,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.processing_time.store(0, Ordering::Relaxed);
    }
}

/// 服务统计信息快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStatsSnapshot {
    pub calls: usize,
    pub units_extracted: usize,
    pub units_translated: usize,
    pub units_cached: usize,
    pub failures: usize,
    pub short_circuits: usize,
    pub processing_time: Duration,
}

impl ServiceStatsSnapshot {
    /// 译文来自缓存的单元占提取单元的比例
    pub fn cache_hit_rate(&self) -> f64 {
        if self.units_extracted == 0 {
            0.0
        } else {
            self.units_cached as f64 / self.units_extracted as f64
        }
    }
}

/// 系统健康状态
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub overall: HealthLevel,
    /// 组件名称（`processors`、`cache`、`backend`）→ 健康级别
    pub components: HashMap<String, HealthLevel>,
}

/// 健康级别，按严重程度排序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Unhealthy,
}
