//! 统一的环境变量管理系统
//!
//! 每个环境变量是一个实现了 [`EnvVar`] 的单元结构体，
//! 名称、默认值、说明和解析规则放在一起，文档由 [`generate_env_docs`] 生成。

use std::env;
use std::fmt;
use std::time::Duration;

use crate::translation::core::types::TranslationStyle;
use crate::translation::error::TranslationError;

/// 环境变量解析错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

impl From<EnvError> for TranslationError {
    fn from(error: EnvError) -> Self {
        TranslationError::Config(error.to_string())
    }
}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    /// 只在变量被设置时返回值，不使用默认值
    ///
    /// 用于覆盖配置文件中的值。空字符串视为未设置。
    fn get_optional() -> EnvResult<Option<T>> {
        match env::var(Self::NAME) {
            Ok(value) if !value.trim().is_empty() => Self::parse(&value).map(Some),
            _ => Ok(None),
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "TRANSLAYER_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("warn".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.trim().to_lowercase().as_str() {
                level @ ("trace" | "debug" | "info" | "warn" | "error") => Ok(level.to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }

    /// 禁用颜色输出
    pub struct NoColor;
    impl EnvVar<bool> for NoColor {
        const NAME: &'static str = "NO_COLOR";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Disable colored output when set to any value";

        fn parse(value: &str) -> EnvResult<bool> {
            // 任何非空值都表示禁用颜色
            Ok(!value.is_empty())
        }
    }
}

/// 翻译相关环境变量
pub mod translation {
    use super::*;

    /// 目标语言
    pub struct TargetLang;
    impl EnvVar<String> for TargetLang {
        const NAME: &'static str = "TRANSLAYER_TARGET_LANG";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Target language tag, e.g. es, pt-BR, zh_CN";

        fn parse(value: &str) -> EnvResult<String> {
            parse_lang(value, Self::NAME)
        }
    }

    /// 源语言
    pub struct SourceLang;
    impl EnvVar<String> for SourceLang {
        const NAME: &'static str = "TRANSLAYER_SOURCE_LANG";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Source language tag (default: en)";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("en".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            parse_lang(value, Self::NAME)
        }
    }

    /// 译文风格
    pub struct Style;
    impl EnvVar<TranslationStyle> for Style {
        const NAME: &'static str = "TRANSLAYER_STYLE";
        const DEFAULT: Option<TranslationStyle> = Some(TranslationStyle::Neutral);
        const DESCRIPTION: &'static str =
            "Translation style: neutral, formal, casual, technical, marketing";

        fn parse(value: &str) -> EnvResult<TranslationStyle> {
            value.parse().map_err(|message| EnvError {
                variable: Self::NAME.to_string(),
                message,
            })
        }
    }

    /// 并行查询缓存的单元数阈值
    pub struct ParallelThreshold;
    impl EnvVar<usize> for ParallelThreshold {
        const NAME: &'static str = "TRANSLAYER_PARALLEL_THRESHOLD";
        const DEFAULT: Option<usize> = Some(5);
        const DESCRIPTION: &'static str = "Unit count at which cache lookups run in parallel (0 disables)";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 0, 100_000)
        }
    }

    /// 单次调用超时
    pub struct Timeout;
    impl EnvVar<Duration> for Timeout {
        const NAME: &'static str = "TRANSLAYER_TIMEOUT";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(0));
        const DESCRIPTION: &'static str = "Per-call timeout in seconds (0 = no timeout)";

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_duration_secs(value, Self::NAME, 86_400)
        }
    }
}

/// 翻译后端环境变量
pub mod provider {
    use super::*;

    /// OpenAI API 密钥
    pub struct ApiKey;
    impl EnvVar<String> for ApiKey {
        const NAME: &'static str = "OPENAI_API_KEY";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "API key for the OpenAI-compatible backend";

        fn parse(value: &str) -> EnvResult<String> {
            let key = value.trim();
            if key.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API key cannot be empty".to_string(),
                });
            }
            Ok(key.to_string())
        }
    }

    /// 模型名称
    pub struct Model;
    impl EnvVar<String> for Model {
        const NAME: &'static str = "TRANSLAYER_MODEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Chat completions model name";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }

    /// 后端地址
    pub struct BaseUrl;
    impl EnvVar<String> for BaseUrl {
        const NAME: &'static str = "TRANSLAYER_API_BASE_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Base URL of the OpenAI-compatible API";

        fn parse(value: &str) -> EnvResult<String> {
            parse_http_url(value, Self::NAME)
        }
    }

    /// 后端类型
    pub struct Backend;
    impl EnvVar<String> for Backend {
        const NAME: &'static str = "TRANSLAYER_BACKEND";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Translation backend: openai, mock";

        fn parse(value: &str) -> EnvResult<String> {
            match value.trim().to_lowercase().as_str() {
                kind @ ("openai" | "mock") => Ok(kind.to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid backend '{}'. Use: openai, mock", value),
                }),
            }
        }
    }

    /// 最大重试次数
    pub struct MaxRetries;
    impl EnvVar<usize> for MaxRetries {
        const NAME: &'static str = "TRANSLAYER_MAX_RETRIES";
        const DEFAULT: Option<usize> = Some(3);
        const DESCRIPTION: &'static str = "Retries after a retryable backend error";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 0, 20)
        }
    }

    /// 每分钟请求数
    pub struct RequestsPerMinute;
    impl EnvVar<usize> for RequestsPerMinute {
        const NAME: &'static str = "TRANSLAYER_REQUESTS_PER_MINUTE";
        const DEFAULT: Option<usize> = Some(60);
        const DESCRIPTION: &'static str = "Backend rate limit in requests per minute";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 100_000)
        }
    }

    /// 突发请求数
    pub struct BurstSize;
    impl EnvVar<usize> for BurstSize {
        const NAME: &'static str = "TRANSLAYER_BURST_SIZE";
        const DEFAULT: Option<usize> = Some(0);
        const DESCRIPTION: &'static str = "Rate limiter burst size (0 = requests per minute)";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 0, 100_000)
        }
    }
}

/// 缓存相关环境变量
pub mod cache {
    use super::*;

    /// 缓存类型
    pub struct Backend;
    impl EnvVar<String> for Backend {
        const NAME: &'static str = "TRANSLAYER_CACHE";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Cache backend: none, memory, redis";

        fn parse(value: &str) -> EnvResult<String> {
            match value.trim().to_lowercase().as_str() {
                kind @ ("none" | "memory" | "redis") => Ok(kind.to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid cache backend '{}'. Use: none, memory, redis", value),
                }),
            }
        }
    }

    /// 缓存过期时间
    pub struct Ttl;
    impl EnvVar<Duration> for Ttl {
        const NAME: &'static str = "TRANSLAYER_CACHE_TTL";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(0));
        const DESCRIPTION: &'static str = "Cache entry TTL in seconds (0 = never expire)";

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_duration_secs(value, Self::NAME, 31_536_000)
        }
    }

    /// Redis 地址
    pub struct RedisUrl;
    impl EnvVar<String> for RedisUrl {
        const NAME: &'static str = "TRANSLAYER_REDIS_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Redis connection URL, e.g. redis://127.0.0.1:6379";

        fn parse(value: &str) -> EnvResult<String> {
            let url = value.trim();
            if !(url.starts_with("redis://") || url.starts_with("rediss://") || url.starts_with("unix://")) {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "URL must start with redis://, rediss:// or unix://".to_string(),
                });
            }
            Ok(url.to_string())
        }
    }

    /// 键前缀
    pub struct KeyPrefix;
    impl EnvVar<String> for KeyPrefix {
        const NAME: &'static str = "TRANSLAYER_CACHE_PREFIX";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Key prefix for the Redis cache (default: translayer:)";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }
}

// ============================================================================
// 解析助手
// ============================================================================

fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Invalid boolean '{}'. Use: true/false, 1/0, yes/no, on/off", value),
        }),
    }
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let parsed = value.trim().parse::<usize>().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: format!("Invalid number '{}'", value),
    })?;

    if parsed < min || parsed > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} out of range [{}, {}]", parsed, min, max),
        });
    }

    Ok(parsed)
}

fn parse_duration_secs(value: &str, var_name: &str, max_secs: usize) -> EnvResult<Duration> {
    parse_positive_usize(value, var_name, 0, max_secs).map(|secs| Duration::from_secs(secs as u64))
}

fn parse_lang(value: &str, var_name: &str) -> EnvResult<String> {
    let lang = value.trim();
    let valid = !lang.is_empty()
        && lang.len() <= 16
        && lang
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if !valid {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Invalid language tag '{}'", value),
        });
    }
    Ok(lang.to_string())
}

fn parse_http_url(value: &str, var_name: &str) -> EnvResult<String> {
    let trimmed = value.trim();
    match url::Url::parse(trimmed) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
            Ok(trimmed.trim_end_matches('/').to_string())
        }
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Invalid URL '{}'. Must be http:// or https://", value),
        }),
    }
}

/// 限速开关
pub mod rate_limit {
    use super::*;

    pub struct Enabled;
    impl EnvVar<bool> for Enabled {
        const NAME: &'static str = "TRANSLAYER_RATE_LIMIT_ENABLED";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Enable the client-side rate limiter";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }
}

/// 所有已知变量：名称、说明、默认值
fn known_variables() -> Vec<(&'static str, &'static str, String)> {
    vec![
        (core::LogLevel::NAME, core::LogLevel::DESCRIPTION, "warn".to_string()),
        (core::NoColor::NAME, core::NoColor::DESCRIPTION, format!("{:?}", core::NoColor::DEFAULT)),
        (translation::TargetLang::NAME, translation::TargetLang::DESCRIPTION, "(required)".to_string()),
        (translation::SourceLang::NAME, translation::SourceLang::DESCRIPTION, "en".to_string()),
        (translation::Style::NAME, translation::Style::DESCRIPTION, "neutral".to_string()),
        (
            translation::ParallelThreshold::NAME,
            translation::ParallelThreshold::DESCRIPTION,
            format!("{:?}", translation::ParallelThreshold::DEFAULT),
        ),
        (translation::Timeout::NAME, translation::Timeout::DESCRIPTION, "0".to_string()),
        (provider::ApiKey::NAME, provider::ApiKey::DESCRIPTION, "(none)".to_string()),
        (provider::Model::NAME, provider::Model::DESCRIPTION, "gpt-4o-mini".to_string()),
        (provider::BaseUrl::NAME, provider::BaseUrl::DESCRIPTION, "https://api.openai.com/v1".to_string()),
        (provider::Backend::NAME, provider::Backend::DESCRIPTION, "openai".to_string()),
        (provider::MaxRetries::NAME, provider::MaxRetries::DESCRIPTION, "3".to_string()),
        (provider::RequestsPerMinute::NAME, provider::RequestsPerMinute::DESCRIPTION, "60".to_string()),
        (provider::BurstSize::NAME, provider::BurstSize::DESCRIPTION, "0".to_string()),
        (rate_limit::Enabled::NAME, rate_limit::Enabled::DESCRIPTION, "true".to_string()),
        (cache::Backend::NAME, cache::Backend::DESCRIPTION, "memory".to_string()),
        (cache::Ttl::NAME, cache::Ttl::DESCRIPTION, "0".to_string()),
        (cache::RedisUrl::NAME, cache::RedisUrl::DESCRIPTION, "redis://127.0.0.1:6379".to_string()),
        (cache::KeyPrefix::NAME, cache::KeyPrefix::DESCRIPTION, "translayer:".to_string()),
    ]
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables\n\n");
    for (name, description, default) in known_variables() {
        docs.push_str(&format!("- `{}`: {} (default: {})\n", name, description, default));
    }
    docs
}
