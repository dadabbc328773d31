//! 应用配置管理
//!
//! 加载顺序：默认值 → 配置文件 → `.env` → 环境变量。
//! 命令行参数由调用方最后覆盖，然后调用 [`AppConfig::validate`]。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use super::translator::TranslatorConfig;
use crate::translation::core::types::TranslationStyle;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::provider::{RateLimitConfig, RetryConfig};
use crate::translation::storage::TranslationCache;

// ============================================================================
// 配置结构
// ============================================================================

/// 应用配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub translation: TranslationSection,
    pub cache: CacheSection,
    pub provider: ProviderSection,
    pub rate_limit: RateLimitSection,
    pub retry: RetrySection,
}

/// `[translation]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationSection {
    pub target_lang: String,
    pub source_lang: String,
    pub style: TranslationStyle,
    pub context: String,
    pub excluded_terms: Vec<String>,
    pub glossary: BTreeMap<String, String>,
    pub parallel_threshold: usize,
    pub extended_keys: bool,
    /// 单次调用超时（秒），0 表示不限制
    pub timeout_secs: u64,
}

impl Default for TranslationSection {
    fn default() -> Self {
        Self {
            target_lang: String::new(),
            source_lang: constants::DEFAULT_SOURCE_LANG.to_string(),
            style: TranslationStyle::Neutral,
            context: String::new(),
            excluded_terms: Vec::new(),
            glossary: BTreeMap::new(),
            parallel_threshold: constants::DEFAULT_PARALLEL_THRESHOLD,
            extended_keys: false,
            timeout_secs: 0,
        }
    }
}

/// 缓存类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    None,
    #[default]
    Memory,
    Redis,
}

impl std::str::FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" => Ok(CacheBackend::None),
            "memory" => Ok(CacheBackend::Memory),
            "redis" => Ok(CacheBackend::Redis),
            other => Err(format!("未知的缓存类型: {}", other)),
        }
    }
}

/// `[cache]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub backend: CacheBackend,
    /// 过期时间（秒），0 表示永不过期
    pub ttl_secs: u64,
    /// 内存缓存的最大条目数，0 表示不限制
    pub max_entries: usize,
    pub redis_url: String,
    pub key_prefix: String,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            ttl_secs: 0,
            max_entries: 0,
            redis_url: constants::DEFAULT_REDIS_URL.to_string(),
            key_prefix: constants::DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

/// 后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Mock,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(format!("未知的翻译后端: {}", other)),
        }
    }
}

/// `[provider]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    pub kind: ProviderKind,
    /// 不写入生成的配置文件
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            kind: ProviderKind::OpenAi,
            api_key: None,
            model: constants::DEFAULT_MODEL.to_string(),
            base_url: constants::DEFAULT_BASE_URL.to_string(),
            temperature: constants::DEFAULT_TEMPERATURE,
            timeout_secs: constants::DEFAULT_PROVIDER_TIMEOUT.as_secs(),
        }
    }
}

/// `[rate_limit]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    pub enabled: bool,
    pub requests_per_minute: u32,
    /// 0 表示等于每分钟请求数
    pub burst_size: u32,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: constants::DEFAULT_REQUESTS_PER_MINUTE,
            burst_size: 0,
        }
    }
}

/// `[retry]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_retries: defaults.max_retries,
            base_delay_ms: defaults.base_delay.as_millis() as u64,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
        }
    }
}

impl AppConfig {
    /// 带目标语言的默认配置
    pub fn default_with_lang(target_lang: &str) -> Self {
        let mut config = Self::default();
        config.translation.target_lang = target_lang.to_string();
        config
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.translation.target_lang.trim().is_empty() {
            return Err(TranslationError::Config("目标语言不能为空".to_string()));
        }

        if self.translation.source_lang.trim().is_empty() {
            return Err(TranslationError::Config("源语言不能为空".to_string()));
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(TranslationError::Config(format!(
                "重试基础延迟 {}ms 不能大于最大延迟 {}ms",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }

        if self.rate_limit.enabled && self.rate_limit.requests_per_minute == 0 {
            return Err(TranslationError::Config(
                "启用限速时每分钟请求数不能为0".to_string(),
            ));
        }

        if self.provider.kind == ProviderKind::OpenAi && url::Url::parse(&self.provider.base_url).is_err() {
            return Err(TranslationError::Config(format!(
                "后端地址无效: {}",
                self.provider.base_url
            )));
        }

        Ok(())
    }

    /// 应用环境变量覆盖，只覆盖已设置的变量
    pub fn apply_env_overrides(&mut self) -> TranslationResult<()> {
        use crate::env::{cache, provider, rate_limit, translation, EnvVar};

        // 翻译相关环境变量
        if let Some(target_lang) = translation::TargetLang::get_optional()? {
            self.translation.target_lang = target_lang;
        }
        if let Some(source_lang) = translation::SourceLang::get_optional()? {
            self.translation.source_lang = source_lang;
        }
        if let Some(style) = translation::Style::get_optional()? {
            self.translation.style = style;
        }
        if let Some(threshold) = translation::ParallelThreshold::get_optional()? {
            self.translation.parallel_threshold = threshold;
        }
        if let Some(timeout) = translation::Timeout::get_optional()? {
            self.translation.timeout_secs = timeout.as_secs();
        }

        // 后端相关环境变量
        if let Some(api_key) = provider::ApiKey::get_optional()? {
            self.provider.api_key = Some(api_key);
        }
        if let Some(model) = provider::Model::get_optional()? {
            self.provider.model = model;
        }
        if let Some(base_url) = provider::BaseUrl::get_optional()? {
            tracing::info!("环境变量覆盖后端地址: {}", base_url);
            self.provider.base_url = base_url;
        }
        if let Some(kind) = provider::Backend::get_optional()? {
            self.provider.kind = kind.parse().map_err(TranslationError::Config)?;
        }
        if let Some(max_retries) = provider::MaxRetries::get_optional()? {
            self.retry.max_retries = max_retries as u32;
        }
        if let Some(rpm) = provider::RequestsPerMinute::get_optional()? {
            self.rate_limit.requests_per_minute = rpm as u32;
        }
        if let Some(burst) = provider::BurstSize::get_optional()? {
            self.rate_limit.burst_size = burst as u32;
        }
        if let Some(enabled) = rate_limit::Enabled::get_optional()? {
            self.rate_limit.enabled = enabled;
        }

        // 缓存相关环境变量
        if let Some(backend) = cache::Backend::get_optional()? {
            self.cache.backend = backend.parse().map_err(TranslationError::Config)?;
        }
        if let Some(ttl) = cache::Ttl::get_optional()? {
            self.cache.ttl_secs = ttl.as_secs();
        }
        if let Some(url) = cache::RedisUrl::get_optional()? {
            self.cache.redis_url = url;
        }
        if let Some(prefix) = cache::KeyPrefix::get_optional()? {
            self.cache.key_prefix = prefix;
        }

        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.retry.max_retries,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    /// 限速配置，未启用时返回 `None`
    pub fn rate_limit_config(&self) -> Option<RateLimitConfig> {
        self.rate_limit.enabled.then_some(RateLimitConfig {
            requests_per_minute: self.rate_limit.requests_per_minute,
            burst_size: self.rate_limit.burst_size,
        })
    }

    /// 缓存过期时间，0 视为永不过期
    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache.ttl_secs > 0).then(|| Duration::from_secs(self.cache.ttl_secs))
    }

    /// 单次调用超时
    pub fn timeout(&self) -> Option<Duration> {
        (self.translation.timeout_secs > 0).then(|| Duration::from_secs(self.translation.timeout_secs))
    }

    #[cfg(feature = "openai")]
    pub fn openai_config(&self) -> TranslationResult<crate::translation::provider::OpenAiConfig> {
        let api_key = self
            .provider
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                TranslationError::Config(format!(
                    "未设置 API 密钥，请设置环境变量 {}",
                    <crate::env::provider::ApiKey as crate::env::EnvVar<String>>::NAME
                ))
            })?;

        Ok(crate::translation::provider::OpenAiConfig {
            api_key,
            model: self.provider.model.clone(),
            temperature: self.provider.temperature,
            base_url: self.provider.base_url.clone(),
            timeout: Duration::from_secs(self.provider.timeout_secs.max(1)),
        })
    }

    #[cfg(feature = "redis-cache")]
    pub fn redis_config(&self) -> crate::translation::storage::RedisCacheConfig {
        crate::translation::storage::RedisCacheConfig {
            url: self.cache.redis_url.clone(),
            ttl_secs: self.cache.ttl_secs,
            key_prefix: self.cache.key_prefix.clone(),
        }
    }

    /// 构造服务配置
    pub fn translator_config(&self, cache: Option<Arc<dyn TranslationCache>>) -> TranslatorConfig {
        let t = &self.translation;
        let mut config = TranslatorConfig::new(t.target_lang.clone())
            .with_source_lang(t.source_lang.clone())
            .with_excluded_terms(t.excluded_terms.iter().cloned())
            .with_context(t.context.clone())
            .with_style(t.style)
            .with_parallel_threshold(t.parallel_threshold)
            .with_extended_keys(t.extended_keys);
        config.glossary = t.glossary.clone();
        config.cache = cache;
        config
    }
}

// ============================================================================
// 配置管理器
// ============================================================================

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: AppConfig,
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// 按搜索路径加载配置，并应用 `.env` 与环境变量
    pub fn new() -> TranslationResult<Self> {
        Self::load_dotenv();

        let (mut config, source) = match Self::find_config_file() {
            Some(path) => {
                tracing::info!("加载配置文件: {}", path.display());
                (Self::load_from_file(&path)?, Some(path))
            }
            None => {
                tracing::info!("未找到配置文件，使用默认配置");
                (AppConfig::default(), None)
            }
        };

        config.apply_env_overrides()?;
        Ok(Self { config, source })
    }

    /// 从指定文件加载配置，并应用 `.env` 与环境变量
    pub fn from_file(path: impl AsRef<Path>) -> TranslationResult<Self> {
        Self::load_dotenv();

        let path = PathBuf::from(shellexpand::tilde(&path.as_ref().to_string_lossy()).as_ref());
        if !path.exists() {
            return Err(TranslationError::Config(format!(
                "配置文件不存在: {}",
                path.display()
            )));
        }

        let mut config = Self::load_from_file(&path)?;
        config.apply_env_overrides()?;
        Ok(Self {
            config,
            source: Some(path),
        })
    }

    /// 获取配置
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    pub fn into_config(self) -> AppConfig {
        self.config
    }

    /// 配置来源文件
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// 搜索路径中第一个存在的文件
    fn find_config_file() -> Option<PathBuf> {
        constants::CONFIG_PATHS.iter().find_map(|path| {
            let expanded = shellexpand::tilde(path);
            let candidate = PathBuf::from(expanded.as_ref());
            candidate.exists().then_some(candidate)
        })
    }

    /// 从指定文件加载配置，`.json` 使用 serde_json，其余按 TOML 处理
    pub fn load_from_file(path: &Path) -> TranslationResult<AppConfig> {
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            let content = std::fs::read_to_string(path)
                .map_err(|e| TranslationError::Config(format!("读取配置文件失败: {}", e)))?;
            return serde_json::from_str(&content)
                .map_err(|e| TranslationError::Config(format!("解析JSON配置失败: {}", e)));
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Toml))
            .build()
            .map_err(|e| TranslationError::Config(format!("解析TOML配置失败: {}", e)))?;

        settings
            .try_deserialize::<AppConfig>()
            .map_err(|e| TranslationError::Config(format!("解析TOML配置失败: {}", e)))
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: impl AsRef<Path>, target_lang: &str) -> TranslationResult<()> {
        let config = AppConfig::default_with_lang(target_lang);
        let content = toml::to_string_pretty(&config)
            .map_err(|e| TranslationError::Config(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| TranslationError::Config(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.translation.source_lang, "en");
        assert_eq!(config.translation.parallel_threshold, 5);
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.retry_config(), RetryConfig::default());
        assert_eq!(
            config.rate_limit_config(),
            Some(RateLimitConfig {
                requests_per_minute: 60,
                burst_size: 0
            })
        );
        assert_eq!(config.cache_ttl(), None);
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_validate() {
        assert!(AppConfig::default().validate().is_err());
        assert!(AppConfig::default_with_lang("es").validate().is_ok());

        let mut config = AppConfig::default_with_lang("es");
        config.retry.base_delay_ms = 60_000;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default_with_lang("es");
        config.rate_limit.requests_per_minute = 0;
        assert!(config.validate().is_err());
        config.rate_limit.enabled = false;
        assert!(config.validate().is_ok());
        assert_eq!(config.rate_limit_config(), None);
    }

    #[test]
    fn test_load_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("translayer.toml");
        std::fs::write(
            &path,
            r#"
[translation]
target_lang = "fr"
style = "formal"
excluded_terms = ["Acme"]

[translation.glossary]
cart = "panier"

[cache]
backend = "none"
ttl_secs = 600

[retry]
max_retries = 5
"#,
        )
        .unwrap();

        let config = ConfigManager::load_from_file(&path).unwrap();
        assert_eq!(config.translation.target_lang, "fr");
        assert_eq!(config.translation.style, TranslationStyle::Formal);
        assert_eq!(config.translation.excluded_terms, vec!["Acme"]);
        assert_eq!(config.translation.glossary["cart"], "panier");
        assert_eq!(config.cache.backend, CacheBackend::None);
        assert_eq!(config.cache_ttl(), Some(Duration::from_secs(600)));
        assert_eq!(config.retry.max_retries, 5);
        // 未写出的字段使用默认值
        assert_eq!(config.translation.source_lang, "en");
        assert_eq!(config.retry.max_delay_ms, 30_000);
    }

    #[test]
    fn test_load_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"translation": {"target_lang": "de"}, "provider": {"kind": "mock"}}"#).unwrap();

        let config = ConfigManager::load_from_file(&path).unwrap();
        assert_eq!(config.translation.target_lang, "de");
        assert_eq!(config.provider.kind, ProviderKind::Mock);
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigManager::from_file("/nonexistent/translayer.toml").unwrap_err();
        assert!(matches!(err, TranslationError::Config(_)));
    }

    #[test]
    fn test_generate_example_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.toml");
        ConfigManager::generate_example_config(&path, "ja").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("api_key"));

        let config = ConfigManager::load_from_file(&path).unwrap();
        assert_eq!(config.translation.target_lang, "ja");
    }

    #[test]
    fn test_translator_config() {
        let mut config = AppConfig::default_with_lang("es");
        config.translation.glossary.insert("cart".into(), "carrito".into());
        config.translation.style = TranslationStyle::Casual;

        let translator = config.translator_config(None);
        assert_eq!(translator.target_lang, "es");
        assert_eq!(translator.style, TranslationStyle::Casual);
        assert_eq!(translator.glossary["cart"], "carrito");
        assert!(translator.cache.is_none());
    }

    #[cfg(feature = "openai")]
    #[test]
    fn test_openai_config_requires_key() {
        let mut config = AppConfig::default_with_lang("es");
        assert!(config.openai_config().is_err());

        config.provider.api_key = Some("sk-test".into());
        let openai = config.openai_config().unwrap();
        assert_eq!(openai.api_key, "sk-test");
        assert_eq!(openai.model, "gpt-4o-mini");
    }
}
