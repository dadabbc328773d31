//! 内容处理器
//!
//! 处理器负责从某种格式的内容中提取 [`TextUnit`]，并在拿到译文后把
//! 结果写回原格式。编排层只通过 [`ContentProcessor`] 与处理器交互，
//! 不理解任何具体的标记语法。

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::translation::core::types::TextUnit;
use crate::translation::error::TranslationResult;

pub mod html;
pub mod source;

pub use html::HtmlProcessor;
pub use source::{SourceProcessor, SourceSyntax};

/// 处理器内部的解析结果，编排层只负责在 extract 与 apply 之间传递
pub type ParsedContent = Box<dyn Any + Send>;

/// 内容处理器接口
///
/// 处理器不保存单次调用的状态，可以在多个并发调用之间共享。
pub trait ContentProcessor: Send + Sync {
    /// 提取可翻译单元，相同文本的单元会分别出现
    fn extract(&self, content: &str) -> TranslationResult<(ParsedContent, Vec<TextUnit>)>;

    /// 按指纹写回译文，没有译文的单元保持原样
    fn apply(
        &self,
        parsed: ParsedContent,
        units: &[TextUnit],
        translations: &HashMap<String, String>,
    ) -> TranslationResult<String>;

    /// 内容类型名称，例如 `html`、`go`
    fn content_type(&self) -> &str;

    /// 译文写回后的收尾处理，`target_lang` 为目标语言
    fn finalize(&self, content: String, _target_lang: &str) -> TranslationResult<String> {
        Ok(content)
    }
}

/// 保留原文首尾空白，中间替换为译文
pub fn preserve_whitespace(original: &str, translated: &str) -> String {
    let is_ws = |c: char| matches!(c, ' ' | '\t' | '\n' | '\r');
    let leading_len = original.len() - original.trim_start_matches(is_ws).len();
    let trailing_len = original.len() - original.trim_end_matches(is_ws).len();

    if leading_len == original.len() {
        return translated.to_string();
    }

    format!(
        "{}{}{}",
        &original[..leading_len],
        translated,
        &original[original.len() - trailing_len..]
    )
}

/// 默认注册的处理器：HTML 以及常见的 C 系源代码
pub fn default_processors() -> TranslationResult<HashMap<String, Arc<dyn ContentProcessor>>> {
    let mut processors: HashMap<String, Arc<dyn ContentProcessor>> = HashMap::new();

    let html: Arc<dyn ContentProcessor> = Arc::new(HtmlProcessor::new());
    processors.insert(html.content_type().to_string(), html);

    for syntax in SourceSyntax::all() {
        let processor: Arc<dyn ContentProcessor> = Arc::new(SourceProcessor::new(syntax.clone())?);
        processors.insert(processor.content_type().to_string(), processor);
    }

    Ok(processors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preserve_whitespace() {
        assert_eq!(preserve_whitespace("  Hello\n", "Hola"), "  Hola\n");
        assert_eq!(preserve_whitespace("Hello", "Hola"), "Hola");
        assert_eq!(preserve_whitespace("\tHello", "Hola"), "\tHola");
        assert_eq!(preserve_whitespace("   ", "Hola"), "Hola");
    }

    #[test]
    fn test_default_processors() {
        let processors = default_processors().unwrap();
        for name in ["html", "go", "rust", "javascript", "typescript", "c", "java"] {
            assert!(processors.contains_key(name), "missing processor {}", name);
        }
    }
}
