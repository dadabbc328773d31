//! # translayer
//!
//! 把 HTML 文档和源代码中的可翻译文本交给 AI 翻译后端，
//! 按内容指纹缓存译文，并把结果写回原格式。
//!
//! ## 模块组织
//!
//! - `translation` - 提取、缓存、批量翻译和写回
//! - `env` - 类型安全的环境变量

pub mod env;
pub mod translation;

// Re-export commonly used items for convenience
pub use translation::{
    ProcessedContent, TextUnit, TranslationError, TranslationResult, TranslationService,
    TranslatorConfig,
};
