//! 错误处理集成测试
//!
//! 测试异常输入、错误分类、限速与取消

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use translayer::translation::error::{ErrorStats, TranslationError};
use translayer::translation::{
    AppConfig, ConfigManager, ErrorCategory, ErrorSeverity, MockBackend, RateLimitConfig,
    RateLimitedBackend, RateLimiter, TranslateRequest, TranslationBackend,
};

mod common {
    include!("common/mod.rs");
}

use common::{html_units, mock_backend, service_without_cache};

/// 测试无效HTML输入的错误处理
#[tokio::test]
async fn test_invalid_html_error_handling() {
    let backend = mock_backend();
    let service = service_without_cache(backend.clone(), "es");
    let cancel = CancellationToken::new();

    let invalid_html_cases = [
        "",                                         // 空HTML
        "<html><head></head><body></body></html>", // 有效但空的HTML
        "<div>Unclosed div",                        // 未闭合标签
        "<html><>Invalid tag</>",                   // 无效标签
        "<script>alert('test')</script>",           // 只有脚本
        "<!DOCTYPE html>",                          // 只有DOCTYPE
    ];

    for (i, html) in invalid_html_cases.iter().enumerate() {
        let result = service.process_html(&cancel, html).await;
        assert!(result.is_ok(), "case {} should not fail: {:?}", i, result);
    }

    // 只有第三、四个用例含有可翻译文本
    assert_eq!(backend.calls(), 2);
    println!("✅ 无效HTML处理通过");
}

/// 忽略的元素不会被提取
#[test]
fn test_ignored_elements_not_extracted() {
    let units = html_units(
        "<p>Visible</p><script>var x = 'Hidden';</script><pre>code</pre>\
         <p data-no-translate>Skip me</p>",
    );
    let texts: Vec<&str> = units.iter().map(|u| u.text.as_str()).collect();
    assert_eq!(texts, vec!["Visible"]);
    println!("✅ 忽略元素通过");
}

/// 错误分类与严重程度
#[test]
fn test_error_classification() {
    let cases = [
        (
            TranslationError::Provider {
                message: "rate limit".into(),
                retryable: true,
            },
            ErrorCategory::Provider,
            ErrorSeverity::Warning,
            true,
        ),
        (
            TranslationError::CountMismatch { expected: 3, got: 2 },
            ErrorCategory::Provider,
            ErrorSeverity::Error,
            false,
        ),
        (
            TranslationError::Config("bad".into()),
            ErrorCategory::Configuration,
            ErrorSeverity::Critical,
            false,
        ),
        (
            TranslationError::Cancelled,
            ErrorCategory::Cancellation,
            ErrorSeverity::Info,
            false,
        ),
    ];

    let mut stats = ErrorStats::default();
    for (error, category, severity, retryable) in &cases {
        assert_eq!(error.category(), *category, "{}", error);
        assert_eq!(error.severity(), *severity, "{}", error);
        assert_eq!(error.is_retryable(), *retryable, "{}", error);
        stats.record_error(error);
    }

    assert_eq!(stats.total_errors, 4);
    assert_eq!(stats.retryable_errors, 1);
    assert_eq!(stats.critical_errors, 1);
    assert!((stats.error_rate(8) - 0.5).abs() < f64::EPSILON);
    println!("✅ 错误分类通过");
}

/// 突发容量用完后需要等待补充令牌
#[tokio::test]
async fn test_rate_limiter_burst() {
    // 每 100ms 补充一个令牌
    let limiter = RateLimiter::new(RateLimitConfig {
        requests_per_minute: 600,
        burst_size: 3,
    });

    assert!(limiter.try_acquire());
    assert!(limiter.try_acquire());
    assert!(limiter.try_acquire());
    assert!(!limiter.try_acquire());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(limiter.try_acquire());
    println!("✅ 限速突发通过");
}

/// 等待令牌时取消返回 Cancelled，不调用后端
#[tokio::test(start_paused = true)]
async fn test_rate_limited_backend_cancellation() {
    let inner = Arc::new(MockBackend::new());
    let backend = RateLimitedBackend::new(
        inner.clone(),
        RateLimitConfig {
            requests_per_minute: 1,
            burst_size: 1,
        },
    );
    let request = TranslateRequest {
        texts: vec!["Hello".to_string()],
        target_lang: "es".to_string(),
        source_lang: "en".to_string(),
        ..Default::default()
    };

    let cancel = CancellationToken::new();
    backend.translate(&cancel, request.clone()).await.unwrap();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        canceller.cancel();
    });

    let err = backend.translate(&cancel, request).await.unwrap_err();
    assert!(err.is_cancellation());
    assert_eq!(inner.calls(), 1);
    println!("✅ 限速等待取消通过");
}

/// 配置文件中的无效值在验证时报错
#[test]
fn test_invalid_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("translayer.toml");
    std::fs::write(
        &path,
        r#"
[translation]
target_lang = "de"

[retry]
base_delay_ms = 5000
max_delay_ms = 100
"#,
    )
    .unwrap();

    let config = ConfigManager::load_from_file(&path).unwrap();
    assert_eq!(config.translation.target_lang, "de");
    assert!(matches!(config.validate(), Err(TranslationError::Config(_))));

    std::fs::write(&path, "[translation\ntarget_lang = ").unwrap();
    assert!(ConfigManager::load_from_file(&path).is_err());

    assert!(ConfigManager::from_file(dir.path().join("missing.toml")).is_err());
    println!("✅ 无效配置通过");
}

/// 默认配置只缺目标语言
#[test]
fn test_default_config_requires_target() {
    assert!(AppConfig::default().validate().is_err());
    assert!(AppConfig::default_with_lang("ja").validate().is_ok());
    println!("✅ 默认配置验证通过");
}
