//! 内容版本差异比较
//!
//! 以指纹为身份比较两次提取的文本单元，用于增量翻译：只有新增和
//! 被修改的单元需要送去翻译。

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::types::TextUnit;

/// 被修改的单元（同一位置或同一上下文，文本不同）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifiedUnit {
    pub old: TextUnit,
    pub new: TextUnit,
}

/// 差异结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub added: Vec<TextUnit>,
    pub removed: Vec<TextUnit>,
    pub unchanged: Vec<TextUnit>,
    pub modified: Vec<ModifiedUnit>,
}

/// 差异统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStats {
    pub added: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub modified: usize,
}

impl DiffResult {
    pub fn stats(&self) -> DiffStats {
        DiffStats {
            added: self.added.len(),
            removed: self.removed.len(),
            unchanged: self.unchanged.len(),
            modified: self.modified.len(),
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty() || !self.modified.is_empty()
    }

    /// 需要翻译的单元：新增单元加上被修改单元的新版本
    pub fn needs_translation(&self) -> Vec<TextUnit> {
        let mut units = Vec::with_capacity(self.added.len() + self.modified.len());
        units.extend(self.added.iter().cloned());
        units.extend(self.modified.iter().map(|m| m.new.clone()));
        units
    }
}

/// 按指纹去重，保留每个指纹第一次出现的单元
fn first_by_fingerprint(units: &[TextUnit]) -> Vec<&TextUnit> {
    let mut seen = HashSet::new();
    units
        .iter()
        .filter(|unit| seen.insert(unit.fingerprint.as_str()))
        .collect()
}

/// 只按指纹比较，不识别修改
pub fn diff_by_fingerprint(old: &[TextUnit], new: &[TextUnit]) -> DiffResult {
    let old_units = first_by_fingerprint(old);
    let new_units = first_by_fingerprint(new);

    let old_index: HashMap<&str, &TextUnit> = old_units
        .iter()
        .map(|unit| (unit.fingerprint.as_str(), *unit))
        .collect();
    let new_index: HashMap<&str, &TextUnit> = new_units
        .iter()
        .map(|unit| (unit.fingerprint.as_str(), *unit))
        .collect();

    let mut result = DiffResult::default();

    for unit in &old_units {
        if new_index.contains_key(unit.fingerprint.as_str()) {
            result.unchanged.push((*unit).clone());
        } else {
            result.removed.push((*unit).clone());
        }
    }

    for unit in &new_units {
        if !old_index.contains_key(unit.fingerprint.as_str()) {
            result.added.push((*unit).clone());
        }
    }

    result
}

/// 比较两个版本并识别修改
///
/// 在指纹比较之后，每个被删除的单元按顺序扫描尚未配对的新增单元，
/// 第一个 `id` 相同或非空 `context` 相同的单元与之配对，成为修改。
pub fn diff(old: &[TextUnit], new: &[TextUnit]) -> DiffResult {
    let mut result = diff_by_fingerprint(old, new);

    if result.added.is_empty() || result.removed.is_empty() {
        return result;
    }

    let mut added_matched = vec![false; result.added.len()];
    let mut removed_matched = vec![false; result.removed.len()];

    for (ri, removed) in result.removed.iter().enumerate() {
        for (ai, added) in result.added.iter().enumerate() {
            if added_matched[ai] {
                continue;
            }

            let same_id = removed.id == added.id;
            let same_context = !removed.context.is_empty() && removed.context == added.context;

            if same_id || same_context {
                result.modified.push(ModifiedUnit {
                    old: removed.clone(),
                    new: added.clone(),
                });
                added_matched[ai] = true;
                removed_matched[ri] = true;
                break;
            }
        }
    }

    let mut flags = added_matched.into_iter();
    result.added.retain(|_| !flags.next().unwrap_or(false));
    let mut flags = removed_matched.into_iter();
    result.removed.retain(|_| !flags.next().unwrap_or(false));

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::core::types::UNIT_HTML_TEXT;

    fn unit(id: &str, text: &str, context: &str) -> TextUnit {
        TextUnit::new(id, text, UNIT_HTML_TEXT).with_context(context)
    }

    #[test]
    fn test_identical_inputs_are_unchanged() {
        let units = vec![unit("n1", "Hello", "in <h1>"), unit("n2", "World", "in <p>")];
        let result = diff(&units, &units);

        assert_eq!(result.unchanged.len(), 2);
        assert!(result.added.is_empty());
        assert!(result.removed.is_empty());
        assert!(result.modified.is_empty());
        assert!(!result.has_changes());
        assert!(result.needs_translation().is_empty());
    }

    #[test]
    fn test_same_id_is_modification() {
        let old = vec![unit("n1", "Hello", "")];
        let new = vec![unit("n1", "Hi", "")];
        let result = diff(&old, &new);

        assert_eq!(result.modified.len(), 1);
        assert_eq!(result.modified[0].old.text, "Hello");
        assert_eq!(result.modified[0].new.text, "Hi");
        assert!(result.added.is_empty());
        assert!(result.removed.is_empty());
        assert_eq!(result.needs_translation()[0].text, "Hi");
    }

    #[test]
    fn test_same_context_is_modification() {
        let old = vec![unit("n1", "Buy now", "in <button class=\"cta\">")];
        let new = vec![unit("n7", "Order today", "in <button class=\"cta\">")];
        let result = diff(&old, &new);

        assert_eq!(result.stats().modified, 1);
    }

    #[test]
    fn test_empty_context_never_matches() {
        let old = vec![unit("n1", "Alpha", "")];
        let new = vec![unit("n2", "Beta", "")];
        let result = diff(&old, &new);

        assert_eq!(
            result.stats(),
            DiffStats {
                added: 1,
                removed: 1,
                unchanged: 0,
                modified: 0
            }
        );
        assert!(result.has_changes());
    }

    #[test]
    fn test_first_match_wins() {
        // 两个新增单元都与被删除单元上下文相同，只有第一个配对
        let old = vec![unit("a", "One", "in <li>")];
        let new = vec![unit("b", "Uno", "in <li>"), unit("c", "Eins", "in <li>")];
        let result = diff(&old, &new);

        assert_eq!(result.modified.len(), 1);
        assert_eq!(result.modified[0].new.text, "Uno");
        assert_eq!(result.added.len(), 1);
        assert_eq!(result.added[0].text, "Eins");
    }

    #[test]
    fn test_duplicates_collapse_by_fingerprint() {
        let old = vec![unit("n1", "Save", ""), unit("n2", "Save", "")];
        let new = vec![unit("n1", "Save", "")];
        let result = diff(&old, &new);

        assert_eq!(result.unchanged.len(), 1);
        assert_eq!(result.unchanged[0].id, "n1");
        assert!(!result.has_changes());
    }

    #[test]
    fn test_fingerprint_only_diff_skips_pairing() {
        let old = vec![unit("n1", "Hello", "")];
        let new = vec![unit("n1", "Hi", "")];
        let result = diff_by_fingerprint(&old, &new);

        assert!(result.modified.is_empty());
        assert_eq!(result.added.len(), 1);
        assert_eq!(result.removed.len(), 1);
    }
}
