//! 翻译配置管理模块
//!
//! - [`TranslatorConfig`]：构造翻译服务的运行时参数
//! - [`AppConfig`] / [`ConfigManager`]：配置文件、`.env` 和环境变量的分层加载

pub mod manager;
pub mod translator;

// 重新导出主要类型
pub use manager::{
    AppConfig, CacheBackend, CacheSection, ConfigManager, ProviderKind, ProviderSection,
    RateLimitSection, RetrySection, TranslationSection,
};
pub use translator::TranslatorConfig;

/// 配置常量
pub mod constants {
    use std::time::Duration;

    pub use super::translator::DEFAULT_SOURCE_LANG;
    pub use crate::translation::core::engine::DEFAULT_PARALLEL_THRESHOLD;
    pub use crate::translation::provider::rate_limit::DEFAULT_REQUESTS_PER_MINUTE;

    // 默认后端设置
    pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
    pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
    pub const DEFAULT_TEMPERATURE: f32 = 0.3;
    pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(120);

    // 缓存设置
    pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
    pub const DEFAULT_KEY_PREFIX: &str = "translayer:";

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "translayer.toml",
        ".translayer.toml",
        "~/.config/translayer/config.toml",
    ];
}

/// 搜索路径中是否存在配置文件
pub fn config_file_exists() -> bool {
    constants::CONFIG_PATHS
        .iter()
        .any(|path| std::path::Path::new(shellexpand::tilde(path).as_ref()).exists())
}
