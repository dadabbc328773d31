//! 源代码内容处理器
//!
//! 用正则表达式从左到右扫描 C 系语言源代码，识别注释和字符串字面量。
//! 注释中的 `//` 和字符串中的 `/*` 由扫描顺序自然区分。
//! 写回时只替换这些片段，其余代码逐字节保留。

use std::collections::HashMap;
use std::ops::Range;

use regex::Regex;

use super::{preserve_whitespace, ContentProcessor, ParsedContent};
use crate::translation::core::types::{TextUnit, UNIT_SOURCE_COMMENT, UNIT_SOURCE_STRING};
use crate::translation::error::{helpers, TranslationResult};

/// 单引号的含义
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleQuote {
    /// 字符字面量，不翻译
    Char,
    /// 普通字符串（JavaScript）
    String,
}

/// 一种语言的词法差异
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSyntax {
    /// 内容类型名称
    pub name: &'static str,
    /// 上下文中使用的语言名称
    pub display_name: &'static str,
    pub single_quote: SingleQuote,
    /// 是否支持反引号字符串（Go 原始字符串、JS 模板字符串）
    pub backtick_strings: bool,
    /// 以这些前缀开头的行上的字符串不翻译（导入路径等）
    pub skip_line_prefixes: &'static [&'static str],
}

impl SourceSyntax {
    pub fn go() -> Self {
        Self {
            name: "go",
            display_name: "Go",
            single_quote: SingleQuote::Char,
            backtick_strings: true,
            skip_line_prefixes: &["import", "package"],
        }
    }

    pub fn rust() -> Self {
        Self {
            name: "rust",
            display_name: "Rust",
            single_quote: SingleQuote::Char,
            backtick_strings: false,
            skip_line_prefixes: &["use ", "mod ", "extern crate", "#["],
        }
    }

    pub fn c() -> Self {
        Self {
            name: "c",
            display_name: "C",
            single_quote: SingleQuote::Char,
            backtick_strings: false,
            skip_line_prefixes: &["#include", "#pragma"],
        }
    }

    pub fn java() -> Self {
        Self {
            name: "java",
            display_name: "Java",
            single_quote: SingleQuote::Char,
            backtick_strings: false,
            skip_line_prefixes: &["import", "package", "@"],
        }
    }

    pub fn javascript() -> Self {
        Self {
            name: "javascript",
            display_name: "JavaScript",
            single_quote: SingleQuote::String,
            backtick_strings: true,
            skip_line_prefixes: &["import", "export * from", "\"use strict\"", "'use strict'"],
        }
    }

    pub fn typescript() -> Self {
        Self {
            name: "typescript",
            display_name: "TypeScript",
            ..Self::javascript()
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            Self::go(),
            Self::rust(),
            Self::c(),
            Self::java(),
            Self::javascript(),
            Self::typescript(),
        ]
    }

    /// 按名称或常见别名查找
    pub fn by_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "go" | "golang" => Some(Self::go()),
            "rust" | "rs" => Some(Self::rust()),
            "c" | "h" | "cpp" | "c++" => Some(Self::c()),
            "java" => Some(Self::java()),
            "javascript" | "js" | "jsx" | "mjs" => Some(Self::javascript()),
            "typescript" | "ts" | "tsx" => Some(Self::typescript()),
            _ => None,
        }
    }

    fn pattern(&self) -> String {
        let mut alternatives = vec![
            r"(?P<line>//[^\n]*)".to_string(),
            r"(?P<block>/\*(?s:.*?)\*/)".to_string(),
            r#"(?P<dq>"(?:[^"\\\n]|\\.)*")"#.to_string(),
        ];
        match self.single_quote {
            SingleQuote::String => alternatives.push(r"(?P<sq>'(?:[^'\\\n]|\\.)*')".to_string()),
            SingleQuote::Char => {
                alternatives.push(r"(?P<chr>'(?:\\[^'\n]{1,10}|[^'\\\n])')".to_string())
            }
        }
        if self.backtick_strings {
            alternatives.push(r"(?P<bt>`[^`]*`)".to_string());
        }
        alternatives.join("|")
    }
}

/// 扫描到的片段
#[derive(Debug, Clone)]
enum SegmentKind {
    /// `prefix` 为 `//`、`///`、`//!`
    LineComment { prefix: String },
    /// `prefix` 为 `/*` 或 `/**`
    BlockComment { prefix: String },
    /// `raw_inner` 为引号内的原始文本（保留转义）
    Str { quote: char, raw_inner: String },
}

#[derive(Debug, Clone)]
struct Segment {
    span: Range<usize>,
    kind: SegmentKind,
    /// 供写回时保留首尾空白的原文
    original: String,
    fingerprint: String,
}

struct ParsedSource {
    source: String,
    segments: Vec<Segment>,
}

/// 源代码处理器
#[derive(Debug, Clone)]
pub struct SourceProcessor {
    syntax: SourceSyntax,
    scanner: Regex,
    translate_comments: bool,
    translate_strings: bool,
}

impl SourceProcessor {
    pub fn new(syntax: SourceSyntax) -> TranslationResult<Self> {
        let scanner = Regex::new(&syntax.pattern()).map_err(|e| {
            helpers::config_error(format!("{} 扫描规则无效: {}", syntax.name, e))
        })?;
        Ok(Self {
            syntax,
            scanner,
            translate_comments: true,
            translate_strings: true,
        })
    }

    /// 按语言名称创建
    pub fn for_language(name: &str) -> TranslationResult<Self> {
        let syntax = SourceSyntax::by_name(name)
            .ok_or_else(|| helpers::config_error(format!("不支持的源代码语言: {}", name)))?;
        Self::new(syntax)
    }

    pub fn with_comments(mut self, enabled: bool) -> Self {
        self.translate_comments = enabled;
        self
    }

    pub fn with_strings(mut self, enabled: bool) -> Self {
        self.translate_strings = enabled;
        self
    }

    pub fn syntax(&self) -> &SourceSyntax {
        &self.syntax
    }

    fn scan(&self, source: &str) -> Vec<(Segment, TextUnit)> {
        let skipped_lines = skipped_ranges(source, &self.syntax);
        let mut found = Vec::new();

        for caps in self.scanner.captures_iter(source) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let span = whole.range();
            let matched = whole.as_str();

            let item = if caps.name("line").is_some() {
                self.line_comment(matched, span.start)
            } else if caps.name("block").is_some() {
                self.block_comment(matched, span.start)
            } else if caps.name("dq").is_some() || caps.name("sq").is_some() || caps.name("bt").is_some() {
                if skipped_lines.iter().any(|r| r.contains(&span.start)) {
                    None
                } else {
                    self.string_literal(matched, span.start)
                }
            } else {
                // 字符字面量只用于推进扫描位置
                None
            };

            if let Some((kind, original, unit)) = item {
                found.push((
                    Segment {
                        span,
                        kind,
                        original,
                        fingerprint: unit.fingerprint.clone(),
                    },
                    unit,
                ));
            }
        }

        found
    }

    fn comment_unit(&self, text: &str, offset: usize) -> TextUnit {
        TextUnit::new(format!("comment-{}", offset), text, UNIT_SOURCE_COMMENT)
            .with_context(format!("{} source comment", self.syntax.display_name))
            .with_attribute("offset", offset.to_string())
    }

    fn line_comment(&self, matched: &str, offset: usize) -> Option<(SegmentKind, String, TextUnit)> {
        if !self.translate_comments {
            return None;
        }

        let body = &matched[2..];
        let marker_len = body
            .chars()
            .take_while(|c| *c == '/' || *c == '!')
            .count()
            .min(1);
        let prefix = &matched[..2 + marker_len];
        let text = &matched[2 + marker_len..];

        if text.trim().is_empty() || is_directive(text) {
            return None;
        }

        Some((
            SegmentKind::LineComment {
                prefix: prefix.to_string(),
            },
            text.to_string(),
            self.comment_unit(text, offset),
        ))
    }

    fn block_comment(&self, matched: &str, offset: usize) -> Option<(SegmentKind, String, TextUnit)> {
        if !self.translate_comments || matched.len() < 4 {
            return None;
        }

        let inner = &matched[2..matched.len() - 2];
        let (prefix, inner) = match inner.strip_prefix('*') {
            Some(rest) if !rest.is_empty() => ("/**", rest),
            _ => ("/*", inner),
        };

        // 多行块注释去掉每行开头的 `*` 后合并
        let text = inner
            .lines()
            .map(|line| line.trim().trim_start_matches('*').trim())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if text.is_empty() || is_directive(&text) {
            return None;
        }

        Some((
            SegmentKind::BlockComment {
                prefix: prefix.to_string(),
            },
            text.clone(),
            self.comment_unit(&text, offset),
        ))
    }

    fn string_literal(&self, matched: &str, offset: usize) -> Option<(SegmentKind, String, TextUnit)> {
        if !self.translate_strings {
            return None;
        }

        let quote = matched.chars().next()?;
        let raw_inner = &matched[1..matched.len() - 1];

        // 模板字符串中的插值无法安全翻译
        if quote == '`' && raw_inner.contains("${") {
            return None;
        }

        let text = if quote == '`' {
            raw_inner.to_string()
        } else {
            unescape(raw_inner)
        };
        if !is_translatable_string(text.trim()) {
            return None;
        }

        let unit = TextUnit::new(format!("string-{}", offset), &text, UNIT_SOURCE_STRING)
            .with_context(format!("{} string literal", self.syntax.display_name))
            .with_attribute("offset", offset.to_string())
            .with_attribute("quote", quote.to_string());

        Some((
            SegmentKind::Str {
                quote,
                raw_inner: raw_inner.to_string(),
            },
            text,
            unit,
        ))
    }

    fn render(&self, segment: &Segment, translated: &str) -> String {
        match &segment.kind {
            SegmentKind::LineComment { prefix } => translated
                .lines()
                .map(|line| format!("{} {}", prefix, line.trim()))
                .collect::<Vec<_>>()
                .join("\n"),
            SegmentKind::BlockComment { prefix } => {
                format!("{} {} */", prefix, translated.replace("*/", "* /"))
            }
            SegmentKind::Str { quote, raw_inner } => {
                let value = preserve_whitespace(&segment.original, translated);
                if *quote == '`' {
                    let escaped = if self.syntax.name == "go" {
                        // Go 原始字符串不能包含反引号
                        value.replace('`', "'")
                    } else {
                        value.replace('`', "\\`")
                    };
                    format!("`{}`", escaped)
                } else if value.is_empty() {
                    format!("{}{}{}", quote, raw_inner, quote)
                } else {
                    format!("{}{}{}", quote, escape(&value, *quote), quote)
                }
            }
        }
    }
}

impl ContentProcessor for SourceProcessor {
    fn extract(&self, content: &str) -> TranslationResult<(ParsedContent, Vec<TextUnit>)> {
        let (segments, units): (Vec<Segment>, Vec<TextUnit>) = self.scan(content).into_iter().unzip();

        tracing::debug!(
            "从 {} 源代码中提取到 {} 个文本单元",
            self.syntax.display_name,
            units.len()
        );

        let parsed: ParsedContent = Box::new(ParsedSource {
            source: content.to_string(),
            segments,
        });
        Ok((parsed, units))
    }

    fn apply(
        &self,
        parsed: ParsedContent,
        _units: &[TextUnit],
        translations: &HashMap<String, String>,
    ) -> TranslationResult<String> {
        let parsed = parsed
            .downcast::<ParsedSource>()
            .map_err(|_| helpers::processor_error(self.syntax.name, "解析结果类型不匹配"))?;

        let source = &parsed.source;
        let mut output = String::with_capacity(source.len());
        let mut cursor = 0;

        for segment in &parsed.segments {
            let Some(translated) = translations.get(&segment.fingerprint) else {
                continue;
            };
            if segment.span.start < cursor || segment.span.end > source.len() {
                return Err(helpers::processor_error(self.syntax.name, "片段位置无效"));
            }

            output.push_str(&source[cursor..segment.span.start]);
            output.push_str(&self.render(segment, translated));
            cursor = segment.span.end;
        }
        output.push_str(&source[cursor..]);

        Ok(output)
    }

    fn content_type(&self) -> &str {
        self.syntax.name
    }
}

/// 以跳过前缀开头的行，以及 Go 风格的 `import ( ... )` 块
fn skipped_ranges(source: &str, syntax: &SourceSyntax) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut offset = 0;
    let mut block_start: Option<usize> = None;

    for line in source.split_inclusive('\n') {
        let trimmed = line.trim();
        let line_range = offset..offset + line.len();

        if let Some(start) = block_start {
            if trimmed.starts_with(')') {
                ranges.push(start..line_range.end);
                block_start = None;
            }
        } else if trimmed.starts_with("import (") || trimmed == "import(" {
            block_start = Some(offset);
        } else if syntax
            .skip_line_prefixes
            .iter()
            .any(|prefix| trimmed.starts_with(prefix))
            || trimmed.contains("require(")
        {
            ranges.push(line_range);
        }

        offset += line.len();
    }

    if let Some(start) = block_start {
        ranges.push(start..source.len());
    }
    ranges
}

/// 编译器指令和工具注释
fn is_directive(text: &str) -> bool {
    const DIRECTIVES: &[&str] = &[
        "go:",
        "+build",
        "nolint",
        "eslint",
        "prettier-ignore",
        "@ts-",
        "#region",
        "#endregion",
        "SPDX-License-Identifier",
    ];
    let trimmed = text.trim_start();
    DIRECTIVES.iter().any(|d| trimmed.starts_with(d))
}

/// 判断字符串字面量是否像人类可读的文本
pub fn is_translatable_string(s: &str) -> bool {
    if s.chars().count() < 2 {
        return false;
    }

    let has_space = s.contains(char::is_whitespace);

    // 路径和 URL
    if s.contains('/') && !has_space {
        return false;
    }

    // 格式化占位符，例如 "%d"
    if s.starts_with('%') && s.len() < 5 {
        return false;
    }

    // 常量和缩写
    if s == s.to_uppercase() && !has_space {
        return false;
    }

    // 结构体标签，例如 json:"name"
    if !has_space && s.contains(":\"") {
        return false;
    }

    // 标识符形式的键，例如 user_id、en-US、config.json
    if !has_space
        && s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.'))
    {
        return false;
    }

    s.chars().any(|c| c.is_ascii_alphabetic())
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn escape(value: &str, quote: char) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::core::fingerprint::fingerprint;

    const GO_SOURCE: &str = r#"package main

import (
	"fmt"
	"strings"
)

// Greet prints a greeting
func Greet() {
	/* Say hello */
	fmt.Println("Hello, world")
	key := "user_id"
	url := "https://example.com/path"
	tag := `json:"name"`
	r := '"'
	fmt.Println("Hello, world", r, key, url, tag)
}
"#;

    fn go() -> SourceProcessor {
        SourceProcessor::new(SourceSyntax::go()).unwrap()
    }

    #[test]
    fn test_go_extraction() {
        let (_, units) = go().extract(GO_SOURCE).unwrap();
        let texts: Vec<&str> = units.iter().map(|u| u.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Greet prints a greeting", "Say hello", "Hello, world", "Hello, world"]
        );
        assert_eq!(units[0].unit_type, UNIT_SOURCE_COMMENT);
        assert_eq!(units[0].context, "Go source comment");
        assert_eq!(units[2].unit_type, UNIT_SOURCE_STRING);
        assert_eq!(units[2].context, "Go string literal");
        assert!(units[2].id.starts_with("string-"));
        assert_eq!(units[2].fingerprint, units[3].fingerprint);
    }

    #[test]
    fn test_go_apply() {
        let processor = go();
        let (parsed, units) = processor.extract(GO_SOURCE).unwrap();

        let mut translations = HashMap::new();
        translations.insert(fingerprint("Greet prints a greeting"), "Greet imprime un saludo".to_string());
        translations.insert(fingerprint("Say hello"), "Di hola".to_string());
        translations.insert(fingerprint("Hello, world"), "Hola, \"mundo\"".to_string());

        let output = processor.apply(parsed, &units, &translations).unwrap();
        assert!(output.contains("// Greet imprime un saludo\n"));
        assert!(output.contains("/* Di hola */"));
        assert_eq!(output.matches(r#"fmt.Println("Hola, \"mundo\""#).count(), 2);
        assert!(output.contains("\"fmt\""));
        assert!(output.contains("r := '\"'"));
        assert!(output.contains("`json:\"name\"`"));
    }

    #[test]
    fn test_untranslated_segments_unchanged() {
        let processor = go();
        let (parsed, units) = processor.extract(GO_SOURCE).unwrap();
        let output = processor.apply(parsed, &units, &HashMap::new()).unwrap();
        assert_eq!(output, GO_SOURCE);
    }

    #[test]
    fn test_comment_markers_inside_strings() {
        let processor = SourceProcessor::new(SourceSyntax::rust()).unwrap();
        let source = "let s = \"not // a comment\"; // real comment\n";
        let (_, units) = processor.extract(source).unwrap();
        let texts: Vec<&str> = units.iter().map(|u| u.text.as_str()).collect();
        assert_eq!(texts, vec!["not // a comment", "real comment"]);
    }

    #[test]
    fn test_rust_doc_comments_keep_prefix() {
        let processor = SourceProcessor::new(SourceSyntax::rust()).unwrap();
        let source = "/// Returns the total\nfn total<'a>(x: &'a str) {}\n";
        let (parsed, units) = processor.extract(source).unwrap();
        assert_eq!(units.len(), 1);

        let mut translations = HashMap::new();
        translations.insert(units[0].fingerprint.clone(), "Devuelve el total".to_string());
        let output = processor.apply(parsed, &units, &translations).unwrap();
        assert_eq!(output, "/// Devuelve el total\nfn total<'a>(x: &'a str) {}\n");
    }

    #[test]
    fn test_javascript_strings() {
        let processor = SourceProcessor::for_language("js").unwrap();
        let source = "import x from 'library';\nconst a = 'Click here';\nconst b = `Hi ${name}`;\n";
        let (_, units) = processor.extract(source).unwrap();
        let texts: Vec<&str> = units.iter().map(|u| u.text.as_str()).collect();
        assert_eq!(texts, vec!["Click here"]);
        assert_eq!(processor.content_type(), "javascript");
    }

    #[test]
    fn test_options_disable_kinds() {
        let processor = go().with_strings(false);
        let (_, units) = processor.extract(GO_SOURCE).unwrap();
        assert!(units.iter().all(|u| u.unit_type == UNIT_SOURCE_COMMENT));

        let processor = go().with_comments(false);
        let (_, units) = processor.extract(GO_SOURCE).unwrap();
        assert!(units.iter().all(|u| u.unit_type == UNIT_SOURCE_STRING));
    }

    #[test]
    fn test_translatable_string_rules() {
        assert!(is_translatable_string("Hello world"));
        assert!(is_translatable_string("Save"));
        assert!(!is_translatable_string("a"));
        assert!(!is_translatable_string("/usr/bin"));
        assert!(!is_translatable_string("%d"));
        assert!(!is_translatable_string("API_KEY"));
        assert!(!is_translatable_string("user_id"));
        assert!(!is_translatable_string("12345"));
    }

    #[test]
    fn test_directives_skipped() {
        let processor = go();
        let (_, units) = processor.extract("//go:generate stringer\n// +build linux\n// Real\n").unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, "Real");
    }

    #[test]
    fn test_unknown_language() {
        assert!(SourceProcessor::for_language("cobol").is_err());
    }
}
