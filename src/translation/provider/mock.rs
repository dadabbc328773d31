//! 内存中的模拟后端
//!
//! 不访问网络，按固定词表返回译文，未知文本返回 `[原文]`。
//! 用于 `--dry-run` 以外的离线演示和测试。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{TranslateRequest, TranslationBackend};
use crate::translation::error::{TranslationError, TranslationResult};

type Responder = Arc<dyn Fn(&TranslateRequest) -> TranslationResult<Vec<String>> + Send + Sync>;

/// 模拟翻译后端
pub struct MockBackend {
    translations: HashMap<String, String>,
    responder: Option<Responder>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<TranslateRequest>>,
}

impl MockBackend {
    /// 带默认西班牙语词表的模拟后端
    pub fn new() -> Self {
        let translations = [
            ("Hello", "Hola"),
            ("World", "Mundo"),
            ("Hello World", "Hola Mundo"),
            ("Welcome to our site.", "Bienvenido a nuestro sitio."),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            translations,
            responder: None,
            delay: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_translation(mut self, source: &str, target: &str) -> Self {
        self.translations
            .insert(source.to_string(), target.to_string());
        self
    }

    /// 用自定义函数代替词表生成结果（包括返回错误）
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&TranslateRequest) -> TranslationResult<Vec<String>> + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// 每次调用前等待，等待期间响应取消
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 调用次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 收到的全部请求
    pub fn requests(&self) -> Vec<TranslateRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn last_request(&self) -> Option<TranslateRequest> {
        self.requests().pop()
    }

    pub fn reset(&self) {
        self.calls.store(0, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.clear();
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    async fn translate(
        &self,
        cancel: &CancellationToken,
        request: TranslateRequest,
    ) -> TranslationResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(TranslationError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        if let Some(responder) = &self.responder {
            return responder(&request);
        }

        Ok(request
            .texts
            .iter()
            .map(|text| {
                self.translations
                    .get(text)
                    .cloned()
                    .unwrap_or_else(|| format!("[{}]", text))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(texts: &[&str]) -> TranslateRequest {
        TranslateRequest {
            texts: texts.iter().map(|t| t.to_string()).collect(),
            target_lang: "es_ES".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_dictionary_and_fallback() {
        let backend = MockBackend::new().with_translation("Goodbye", "Adiós");
        let cancel = CancellationToken::new();

        let result = backend
            .translate(&cancel, request(&["Hello", "Goodbye", "Unknown"]))
            .await
            .unwrap();

        assert_eq!(result, vec!["Hola", "Adiós", "[Unknown]"]);
        assert_eq!(backend.calls(), 1);
        assert_eq!(backend.last_request().unwrap().texts.len(), 3);

        backend.reset();
        assert_eq!(backend.calls(), 0);
        assert!(backend.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_observes_cancellation() {
        let backend = MockBackend::new().with_delay(Duration::from_secs(60));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = backend.translate(&cancel, request(&["Hello"])).await.unwrap_err();
        assert_eq!(err, TranslationError::Cancelled);
    }
}
