// 集成测试公共模块
//
// 提供测试辅助工具和共享功能

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use translayer::translation::error::{TranslationError, TranslationResult};
use translayer::translation::storage::{LocalCache, TranslationCache};
use translayer::translation::{
    ContentProcessor, HtmlProcessor, MockBackend, TextUnit, TranslationBackend,
    TranslationService, TranslatorConfig,
};

/// 测试用 HTML 文档
pub const SAMPLE_HTML: &str = "<html><head></head><body>\
<h1>Hello</h1>\
<p>World</p>\
<p>Hello</p>\
</body></html>";

/// 测试用 Go 源文件
pub const SAMPLE_GO: &str = r#"package main

import "fmt"

// Greet prints a friendly greeting.
func Greet() {
	fmt.Println("Hello, friend")
}
"#;

/// 提取 HTML 单元
#[allow(dead_code)]
pub fn html_units(html: &str) -> Vec<TextUnit> {
    let (_, units) = HtmlProcessor::new()
        .extract(html)
        .expect("HTML extraction should succeed");
    units
}

/// 共享同一份内存缓存的服务
#[allow(dead_code)]
pub fn service_with_cache(
    backend: Arc<dyn TranslationBackend>,
    target_lang: &str,
    cache: Arc<dyn TranslationCache>,
) -> TranslationService {
    let config = TranslatorConfig::new(target_lang).with_cache(cache);
    TranslationService::new(backend, config).expect("service should build")
}

/// 不带缓存的服务
#[allow(dead_code)]
pub fn service_without_cache(backend: Arc<dyn TranslationBackend>, target_lang: &str) -> TranslationService {
    TranslationService::new(backend, TranslatorConfig::new(target_lang)).expect("service should build")
}

#[allow(dead_code)]
pub fn mock_backend() -> Arc<MockBackend> {
    Arc::new(MockBackend::new())
}

#[allow(dead_code)]
pub fn memory_cache() -> Arc<LocalCache> {
    Arc::new(LocalCache::new(None))
}

/// 读取正常、写入总是失败的缓存
#[allow(dead_code)]
#[derive(Default)]
pub struct FailingCache {
    entries: Mutex<HashMap<String, String>>,
    pub write_attempts: AtomicUsize,
}

#[allow(dead_code)]
impl FailingCache {
    pub fn with_entry(key: &str, value: &str) -> Self {
        let cache = Self::default();
        if let Ok(mut entries) = cache.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
        cache
    }

    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationCache for FailingCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    async fn set(&self, _key: &str, _value: &str) -> TranslationResult<()> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        Err(TranslationError::Cache("写入被拒绝".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// 断言辅助
#[allow(dead_code)]
pub struct AssertionHelper;

#[allow(dead_code)]
impl AssertionHelper {
    /// 断言内容中包含全部片段
    pub fn assert_contains_all(content: &str, fragments: &[&str]) {
        for fragment in fragments {
            assert!(
                content.contains(fragment),
                "expected `{}` in output:\n{}",
                fragment,
                content
            );
        }
    }
}
