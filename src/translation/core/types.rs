//! 核心数据类型

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::fingerprint::fingerprint;

/// HTML 文本节点
pub const UNIT_HTML_TEXT: &str = "html_text";
/// HTML 可翻译属性（title、alt 等）
pub const UNIT_HTML_ATTRIBUTE: &str = "html_attribute";
/// 源代码注释
pub const UNIT_SOURCE_COMMENT: &str = "source_comment";
/// 源代码字符串字面量
pub const UNIT_SOURCE_STRING: &str = "source_string";

/// 可翻译文本单元
///
/// 由内容处理器在一次提取中产生。`id` 只在本次提取内有意义，
/// 用于差异比较；`fingerprint` 相同的单元可以互相替代。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextUnit {
    pub id: String,
    pub text: String,
    pub fingerprint: String,
    pub unit_type: String,
    pub context: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl TextUnit {
    /// 创建文本单元，文本会被去除首尾空白并计算指纹
    pub fn new(id: impl Into<String>, text: &str, unit_type: &str) -> Self {
        let text = text.trim().to_string();
        Self {
            id: id.into(),
            fingerprint: fingerprint(&text),
            text,
            unit_type: unit_type.to_string(),
            context: String::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// 一次处理调用的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedContent {
    /// 重组后的内容
    pub content: String,
    /// 提取到的单元总数（含重复）
    pub total_units: usize,
    /// 本次由后端翻译的唯一指纹数
    pub translated_count: usize,
    /// 命中缓存的唯一指纹数
    pub cached_count: usize,
}

impl ProcessedContent {
    /// 未做任何翻译的结果
    pub fn unchanged(content: &str, total_units: usize) -> Self {
        Self {
            content: content.to_string(),
            total_units,
            translated_count: 0,
            cached_count: 0,
        }
    }
}

/// 译文风格
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationStyle {
    #[default]
    Neutral,
    Formal,
    Casual,
    Technical,
    Marketing,
}

impl TranslationStyle {
    /// 写入提示词的风格说明
    pub fn description(&self) -> &'static str {
        match self {
            TranslationStyle::Neutral => {
                "Use a neutral, natural tone that reads as if originally written in the target language."
            }
            TranslationStyle::Formal => {
                "Use a formal, professional register. Prefer polite forms of address where the language distinguishes them."
            }
            TranslationStyle::Casual => {
                "Use a casual, friendly and conversational tone. Prefer informal forms of address where the language distinguishes them."
            }
            TranslationStyle::Technical => {
                "Use precise technical language. Keep established technical terms, identifiers and units unchanged."
            }
            TranslationStyle::Marketing => {
                "Use persuasive, engaging marketing language adapted to the target culture rather than a literal rendering."
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TranslationStyle::Neutral => "neutral",
            TranslationStyle::Formal => "formal",
            TranslationStyle::Casual => "casual",
            TranslationStyle::Technical => "technical",
            TranslationStyle::Marketing => "marketing",
        }
    }
}

impl fmt::Display for TranslationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TranslationStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "neutral" => Ok(TranslationStyle::Neutral),
            "formal" => Ok(TranslationStyle::Formal),
            "casual" => Ok(TranslationStyle::Casual),
            "technical" => Ok(TranslationStyle::Technical),
            "marketing" => Ok(TranslationStyle::Marketing),
            other => Err(format!("未知的翻译风格: {}", other)),
        }
    }
}
