//! 翻译服务的运行时配置

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::translation::core::engine::DEFAULT_PARALLEL_THRESHOLD;
use crate::translation::core::types::TranslationStyle;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::processor::ContentProcessor;
use crate::translation::storage::TranslationCache;

/// 默认源语言
pub const DEFAULT_SOURCE_LANG: &str = "en";

/// 构造 [`TranslationService`](crate::translation::TranslationService) 所需的全部参数
///
/// 缓存和处理器以 `Arc` 注入，多个服务可以共享同一份缓存。
/// 未注册的内容类型在创建服务时使用默认处理器补齐。
#[derive(Clone)]
pub struct TranslatorConfig {
    pub target_lang: String,
    pub source_lang: String,
    pub cache: Option<Arc<dyn TranslationCache>>,
    /// 保持原样、不做翻译的术语
    pub excluded_terms: Vec<String>,
    /// 整体内容的说明
    pub context: String,
    /// 原文 → 指定译法
    pub glossary: BTreeMap<String, String>,
    pub style: TranslationStyle,
    pub processors: HashMap<String, Arc<dyn ContentProcessor>>,
    /// 单元数量达到该值时并行查询缓存，0 表示禁用
    pub parallel_threshold: usize,
    /// 缓存键包含源语言和模型
    pub extended_keys: bool,
}

impl TranslatorConfig {
    pub fn new(target_lang: impl Into<String>) -> Self {
        Self {
            target_lang: target_lang.into(),
            source_lang: DEFAULT_SOURCE_LANG.to_string(),
            cache: None,
            excluded_terms: Vec::new(),
            context: String::new(),
            glossary: BTreeMap::new(),
            style: TranslationStyle::default(),
            processors: HashMap::new(),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            extended_keys: false,
        }
    }

    pub fn with_source_lang(mut self, source_lang: impl Into<String>) -> Self {
        self.source_lang = source_lang.into();
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn TranslationCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_excluded_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_terms = terms.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_glossary_entry(mut self, term: impl Into<String>, translation: impl Into<String>) -> Self {
        self.glossary.insert(term.into(), translation.into());
        self
    }

    pub fn with_style(mut self, style: TranslationStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn with_extended_keys(mut self, enabled: bool) -> Self {
        self.extended_keys = enabled;
        self
    }

    /// 注册处理器，同一内容类型的旧处理器会被替换
    pub fn register_processor(mut self, processor: Arc<dyn ContentProcessor>) -> Self {
        self.processors
            .insert(processor.content_type().to_string(), processor);
        self
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.target_lang.trim().is_empty() {
            return Err(TranslationError::Config("目标语言不能为空".to_string()));
        }

        if self.source_lang.trim().is_empty() {
            return Err(TranslationError::Config("源语言不能为空".to_string()));
        }

        Ok(())
    }
}

impl fmt::Debug for TranslatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut processors: Vec<&String> = self.processors.keys().collect();
        processors.sort();

        f.debug_struct("TranslatorConfig")
            .field("target_lang", &self.target_lang)
            .field("source_lang", &self.source_lang)
            .field("cache", &self.cache.as_ref().map(|c| c.name().to_string()))
            .field("excluded_terms", &self.excluded_terms)
            .field("context", &self.context)
            .field("glossary", &self.glossary)
            .field("style", &self.style)
            .field("processors", &processors)
            .field("parallel_threshold", &self.parallel_threshold)
            .field("extended_keys", &self.extended_keys)
            .finish()
    }
}
