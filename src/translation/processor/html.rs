//! HTML 内容处理器
//!
//! 使用 html5ever 解析文档，按文档顺序收集文本节点和可翻译属性。
//! rcdom 的节点不能跨线程传递，解析结果只保存源文本，写回时重新解析；
//! 同一输入两次解析得到的节点顺序一致。

use std::collections::HashMap;
use std::rc::Rc;

use html5ever::interface::{Attribute, QualName};
use html5ever::serialize::{serialize, SerializeOpts};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{namespace_url, ns, parse_document, LocalName};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};

use super::{preserve_whitespace, ContentProcessor, ParsedContent};
use crate::translation::core::languages::{direction, expand_short_code, to_html_lang};
use crate::translation::core::types::{TextUnit, UNIT_HTML_ATTRIBUTE, UNIT_HTML_TEXT};
use crate::translation::error::{helpers, TranslationResult};

pub const CONTENT_TYPE: &str = "html";

/// 内容不翻译的元素
pub const IGNORED_TAGS: &[&str] = &["script", "style", "code", "pre", "textarea", "noscript"];

/// 值需要翻译的属性
pub const TRANSLATABLE_ATTRIBUTES: &[&str] = &["title", "alt", "placeholder", "aria-label"];

/// 带有该属性的元素及其子树跳过翻译
pub const NO_TRANSLATE_ATTRIBUTE: &str = "data-no-translate";

/// 兄弟文本超过该长度时不作为上下文
const MAX_SIBLING_CHARS: usize = 100;
const MAX_SIBLINGS: usize = 3;
const MAX_ANCESTORS: usize = 3;

// ============================================================================
// DOM 工具函数
// ============================================================================

fn parse_html(content: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(content)
}

fn serialize_dom(dom: &RcDom) -> TranslationResult<String> {
    let mut buf: Vec<u8> = Vec::new();
    let serializable: SerializableHandle = dom.document.clone().into();
    serialize(&mut buf, &serializable, SerializeOpts::default())
        .map_err(|e| helpers::processor_error(CONTENT_TYPE, format!("无法序列化DOM: {}", e)))?;
    String::from_utf8(buf)
        .map_err(|e| helpers::processor_error(CONTENT_TYPE, format!("序列化结果不是UTF-8: {}", e)))
}

pub fn get_node_name(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// 设置或新增属性，`None` 表示删除
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<&str>) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let mut attrs = attrs.borrow_mut();

        match attr_value {
            Some(value) => {
                if let Some(attr) = attrs.iter_mut().find(|attr| &*attr.name.local == attr_name) {
                    attr.value = StrTendril::from_slice(value);
                } else {
                    attrs.push(Attribute {
                        name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                        value: StrTendril::from_slice(value),
                    });
                }
            }
            None => attrs.retain(|attr| &*attr.name.local != attr_name),
        }
    }
}

pub fn get_child_node_by_name(parent: &Handle, node_name: &str) -> Option<Handle> {
    parent
        .children
        .borrow()
        .iter()
        .find(|child| get_node_name(child).as_deref() == Some(node_name))
        .cloned()
}

fn text_of(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

// ============================================================================
// 文本位置收集
// ============================================================================

enum SlotKind {
    Text,
    Attribute(&'static str),
}

/// 一个可写回译文的位置
struct Slot {
    node: Handle,
    kind: SlotKind,
    /// 未去除空白的原始文本
    raw: String,
    unit: TextUnit,
}

/// HTML 处理器
#[derive(Debug, Clone)]
pub struct HtmlProcessor {
    ignored_tags: Vec<String>,
    translate_attributes: bool,
}

/// extract 阶段保存的解析结果
struct ParsedHtml {
    source: String,
}

impl HtmlProcessor {
    pub fn new() -> Self {
        Self {
            ignored_tags: IGNORED_TAGS.iter().map(|t| t.to_string()).collect(),
            translate_attributes: true,
        }
    }

    /// 自定义忽略的元素列表
    pub fn with_ignored_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ignored_tags = tags
            .into_iter()
            .map(|t| t.as_ref().to_lowercase())
            .collect();
        self
    }

    /// 是否翻译 title、alt 等属性
    pub fn with_attributes(mut self, enabled: bool) -> Self {
        self.translate_attributes = enabled;
        self
    }

    fn is_skipped_element(&self, node: &Handle, name: &str) -> bool {
        if self.ignored_tags.iter().any(|tag| tag == name) {
            return true;
        }
        get_node_attr(node, NO_TRANSLATE_ATTRIBUTE).is_some()
            || get_node_attr(node, "translate").is_some_and(|v| v.eq_ignore_ascii_case("no"))
    }

    fn collect_slots(&self, dom: &RcDom) -> Vec<Slot> {
        let mut slots = Vec::new();
        let mut ancestors = Vec::new();
        self.walk(&dom.document, &mut ancestors, &mut slots);
        slots
    }

    fn walk(&self, node: &Handle, ancestors: &mut Vec<Handle>, slots: &mut Vec<Slot>) {
        match &node.data {
            NodeData::Element { name, .. } => {
                let tag = name.local.to_string();
                if self.is_skipped_element(node, &tag) {
                    return;
                }

                if self.translate_attributes {
                    self.collect_attributes(node, &tag, slots);
                }

                ancestors.push(node.clone());
                for child in node.children.borrow().iter() {
                    self.walk(child, ancestors, slots);
                }
                ancestors.pop();
            }
            NodeData::Text { contents } => {
                let raw = contents.borrow().to_string();
                if raw.trim().is_empty() {
                    return;
                }

                let mut unit = TextUnit::new(format!("node-{}", slots.len()), &raw, UNIT_HTML_TEXT)
                    .with_context(build_context(node, ancestors));
                if let Some(parent) = ancestors.last().and_then(get_node_name) {
                    unit = unit.with_attribute("parent_tag", parent);
                }

                slots.push(Slot {
                    node: node.clone(),
                    kind: SlotKind::Text,
                    raw,
                    unit,
                });
            }
            NodeData::Document => {
                for child in node.children.borrow().iter() {
                    self.walk(child, ancestors, slots);
                }
            }
            _ => {}
        }
    }

    fn collect_attributes(&self, node: &Handle, tag: &str, slots: &mut Vec<Slot>) {
        for attr_name in TRANSLATABLE_ATTRIBUTES {
            let Some(raw) = get_node_attr(node, attr_name) else {
                continue;
            };
            if raw.trim().is_empty() {
                continue;
            }

            let unit = TextUnit::new(format!("attr-{}", slots.len()), &raw, UNIT_HTML_ATTRIBUTE)
                .with_context(format!("{} attribute of <{}>", attr_name, tag))
                .with_attribute("attribute", *attr_name)
                .with_attribute("parent_tag", tag);

            slots.push(Slot {
                node: node.clone(),
                kind: SlotKind::Attribute(attr_name),
                raw,
                unit,
            });
        }
    }
}

impl Default for HtmlProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// 构建文本节点的上下文
///
/// 格式：`in <p class="x"> | with: 兄弟文本 | inside: nav > ul`
fn build_context(node: &Handle, ancestors: &[Handle]) -> String {
    let Some((parent, outer)) = ancestors.split_last() else {
        return String::new();
    };
    let Some(tag) = get_node_name(parent) else {
        return String::new();
    };

    let mut parts = Vec::new();

    let class = get_node_attr(parent, "class").filter(|v| !v.is_empty());
    let id = get_node_attr(parent, "id").filter(|v| !v.is_empty());
    parts.push(match (class, id) {
        (Some(class), _) => format!("in <{} class=\"{}\">", tag, class),
        (None, Some(id)) => format!("in <{} id=\"{}\">", tag, id),
        (None, None) => format!("in <{}>", tag),
    });

    let siblings: Vec<String> = parent
        .children
        .borrow()
        .iter()
        .filter(|sibling| !Rc::ptr_eq(*sibling, node))
        .filter_map(text_of)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty() && text.len() < MAX_SIBLING_CHARS)
        .take(MAX_SIBLINGS)
        .collect();
    if !siblings.is_empty() {
        parts.push(format!("with: {}", siblings.join(", ")));
    }

    let mut path: Vec<String> = outer
        .iter()
        .rev()
        .take(MAX_ANCESTORS)
        .filter_map(get_node_name)
        .filter(|name| name != "html" && name != "body")
        .collect();
    if !path.is_empty() {
        path.reverse();
        parts.push(format!("inside: {}", path.join(" > ")));
    }

    parts.join(" | ")
}

impl ContentProcessor for HtmlProcessor {
    fn extract(&self, content: &str) -> TranslationResult<(ParsedContent, Vec<TextUnit>)> {
        let dom = parse_html(content);
        let units: Vec<TextUnit> = self
            .collect_slots(&dom)
            .into_iter()
            .map(|slot| slot.unit)
            .collect();

        tracing::debug!("从HTML中提取到 {} 个文本单元", units.len());

        let parsed: ParsedContent = Box::new(ParsedHtml {
            source: content.to_string(),
        });
        Ok((parsed, units))
    }

    fn apply(
        &self,
        parsed: ParsedContent,
        units: &[TextUnit],
        translations: &HashMap<String, String>,
    ) -> TranslationResult<String> {
        let parsed = parsed
            .downcast::<ParsedHtml>()
            .map_err(|_| helpers::processor_error(CONTENT_TYPE, "解析结果类型不匹配"))?;

        let dom = parse_html(&parsed.source);
        let slots = self.collect_slots(&dom);
        if slots.len() != units.len() {
            tracing::warn!(
                "重新解析得到 {} 个位置，与提取时的 {} 个单元不一致",
                slots.len(),
                units.len()
            );
        }

        let mut applied = 0;
        for slot in &slots {
            let Some(translated) = translations.get(&slot.unit.fingerprint) else {
                continue;
            };
            let value = preserve_whitespace(&slot.raw, translated);

            match slot.kind {
                SlotKind::Text => {
                    if let NodeData::Text { contents } = &slot.node.data {
                        *contents.borrow_mut() = StrTendril::from(value);
                        applied += 1;
                    }
                }
                SlotKind::Attribute(name) => {
                    set_node_attr(&slot.node, name, Some(&value));
                    applied += 1;
                }
            }
        }

        tracing::debug!("已写回 {}/{} 处译文", applied, slots.len());
        serialize_dom(&dom)
    }

    fn content_type(&self) -> &str {
        CONTENT_TYPE
    }

    /// 在 `<html>` 上设置 `lang` 和 `dir`，裸语言代码扩展为完整区域（`es` → `es-ES`）
    fn finalize(&self, content: String, target_lang: &str) -> TranslationResult<String> {
        let dom = parse_html(&content);
        let Some(html) = get_child_node_by_name(&dom.document, "html") else {
            return Ok(content);
        };

        set_node_attr(&html, "lang", Some(&to_html_lang(&expand_short_code(target_lang))));
        set_node_attr(&html, "dir", Some(direction(target_lang)));
        serialize_dom(&dom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::core::fingerprint::fingerprint;

    fn extract(html: &str) -> Vec<TextUnit> {
        HtmlProcessor::new().extract(html).unwrap().1
    }

    #[test]
    fn test_extracts_text_in_document_order() {
        let units = extract("<html><body><h1>Hello</h1><p>World</p></body></html>");
        let texts: Vec<&str> = units.iter().map(|u| u.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello", "World"]);
        assert_eq!(units[0].id, "node-0");
        assert_eq!(units[0].attribute("parent_tag"), Some("h1"));
    }

    #[test]
    fn test_skips_ignored_and_marked_elements() {
        let units = extract(
            "<body><script>var x = 'Hi';</script><code>let y</code>\
             <div data-no-translate><p>Keep</p></div>\
             <p translate=\"no\">Brand</p><p>Translate me</p></body>",
        );
        let texts: Vec<&str> = units.iter().map(|u| u.text.as_str()).collect();
        assert_eq!(texts, vec!["Translate me"]);
    }

    #[test]
    fn test_duplicates_are_separate_units() {
        let units = extract("<body><p>Save</p><button>Save</button></body>");
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].fingerprint, units[1].fingerprint);
        assert_ne!(units[0].id, units[1].id);
    }

    #[test]
    fn test_context_format() {
        let units = extract(
            "<body><nav><ul><li class=\"item\">Home<b>x</b>About</li></ul></nav></body>",
        );
        let home = units.iter().find(|u| u.text == "Home").unwrap();
        assert_eq!(home.context, "in <li class=\"item\"> | with: About | inside: nav > ul");

        let units = extract("<body><p id=\"intro\">Hi</p></body>");
        assert_eq!(units[0].context, "in <p id=\"intro\">");
    }

    #[test]
    fn test_attributes_extracted() {
        let units = extract("<body><img alt=\"A cat\" src=\"cat.png\"><p title=\"Tip\">Text</p></body>");
        let alt = units.iter().find(|u| u.text == "A cat").unwrap();
        assert_eq!(alt.unit_type, UNIT_HTML_ATTRIBUTE);
        assert_eq!(alt.attribute("attribute"), Some("alt"));
        assert!(units.iter().any(|u| u.text == "Tip"));

        let units = HtmlProcessor::new()
            .with_attributes(false)
            .extract("<body><img alt=\"A cat\"></body>")
            .unwrap()
            .1;
        assert!(units.is_empty());
    }

    #[test]
    fn test_apply_broadcasts_and_preserves_whitespace() {
        let processor = HtmlProcessor::new();
        let html = "<body><p>  Save\n</p><button title=\"Save\">Save</button><p>Other</p></body>";
        let (parsed, units) = processor.extract(html).unwrap();

        let mut translations = HashMap::new();
        translations.insert(fingerprint("Save"), "Guardar".to_string());

        let output = processor.apply(parsed, &units, &translations).unwrap();
        assert!(output.contains("<p>  Guardar\n</p>"));
        assert!(output.contains("<button title=\"Guardar\">Guardar</button>"));
        assert!(output.contains("<p>Other</p>"));
    }

    #[test]
    fn test_apply_rejects_foreign_parsed_content() {
        let processor = HtmlProcessor::new();
        let err = processor
            .apply(Box::new(42u32), &[], &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, crate::translation::error::TranslationError::Processor { .. }));
    }

    #[test]
    fn test_finalize_sets_lang_and_dir() {
        let processor = HtmlProcessor::new();
        let output = processor
            .finalize("<html><body><p>x</p></body></html>".to_string(), "ar_SA")
            .unwrap();
        assert!(output.contains("lang=\"ar-SA\""));
        assert!(output.contains("dir=\"rtl\""));

        let output = processor
            .finalize("<html lang=\"en\"><body></body></html>".to_string(), "es_ES")
            .unwrap();
        assert!(output.contains("lang=\"es-ES\""));
        assert!(output.contains("dir=\"ltr\""));
        assert!(!output.contains("lang=\"en\""));
    }
}
