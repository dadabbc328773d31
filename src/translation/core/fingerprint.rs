//! 文本指纹与缓存键
//!
//! 指纹是去除首尾空白后文本的 SHA-256 十六进制摘要，去重、缓存和差异
//! 比较都以它为身份。上下文只影响翻译提示，不参与指纹计算。

use sha2::{Digest, Sha256};

/// 计算文本指纹（64 位小写十六进制）
pub fn fingerprint(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.trim().as_bytes()))
}

/// 组合缓存键：`指纹:目标语言`
pub fn cache_key(fingerprint: &str, target_lang: &str) -> String {
    format!("{}:{}", fingerprint, target_lang)
}

/// 扩展缓存键：`指纹:源语言:目标语言:模型`
///
/// 同一后端切换模型或源语言时不会读到旧译文
pub fn cache_key_extended(
    fingerprint: &str,
    source_lang: &str,
    target_lang: &str,
    model: &str,
) -> String {
    format!("{}:{}:{}:{}", fingerprint, source_lang, target_lang, model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_ignores_surrounding_whitespace() {
        let fp = fingerprint("Hello");
        assert_eq!(fp, fingerprint("  Hello\n\t"));
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(fp, fingerprint("hello"));
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            fingerprint("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_cache_keys() {
        assert_eq!(cache_key("abc", "es_ES"), "abc:es_ES");
        assert_eq!(
            cache_key_extended("abc", "en", "ja_JP", "gpt-4o-mini"),
            "abc:en:ja_JP:gpt-4o-mini"
        );
    }
}
