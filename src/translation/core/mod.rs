//! 翻译系统核心模块
//!
//! 与内容格式无关的部分：文本单元和指纹、语言判断、差异比较、
//! 批量解析引擎，以及对外的统一翻译服务。
//!
//! ## 模块依赖关系
//!
//! ```text
//! TranslationService (service.rs)
//!     ├── ContentProcessor (processor/)
//!     └── TranslationEngine (engine.rs)
//!             ├── parallel / sequential lookup (pipeline/lookup.rs)
//!             ├── TranslationCache (storage/)
//!             └── TranslationBackend (provider/)
//! ```

pub mod diff;
pub mod engine;
pub mod fingerprint;
pub mod languages;
pub mod service;
pub mod types;

/// 批量解析引擎
pub use engine::{BatchOutcome, EngineConfig, EngineStats, TranslationEngine};

/// 统一翻译服务 - 主要的对外接口
pub use service::{HealthLevel, HealthStatus, ServiceStats, ServiceStatsSnapshot, TranslationService};

pub use diff::{diff, diff_by_fingerprint, DiffResult, DiffStats, ModifiedUnit};
pub use fingerprint::{cache_key, cache_key_extended, fingerprint};
pub use types::{ProcessedContent, TextUnit, TranslationStyle};
