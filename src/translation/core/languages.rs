//! 语言代码与书写方向
//!
//! 语言代码统一使用 `ll_RR` 形式，同时接受 `ll-RR` 和裸语言代码。

/// 从右到左书写的语言（基础语言代码）
pub const RTL_LANGUAGES: &[&str] = &["ar", "he", "fa", "ur", "ps", "sd", "ug"];

/// 区域代码到提示词中可读名称的映射
const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("en_US", "English (United States)"),
    ("en_GB", "English (United Kingdom)"),
    ("de_DE", "German (Germany)"),
    ("es_ES", "Spanish (Spain)"),
    ("es_MX", "Spanish (Mexico)"),
    ("fr_FR", "French (France)"),
    ("it_IT", "Italian (Italy)"),
    ("ja_JP", "Japanese (Japan)"),
    ("pt_BR", "Portuguese (Brazil)"),
    ("pt_PT", "Portuguese (Portugal)"),
    ("zh_CN", "Chinese (Simplified)"),
    ("zh_TW", "Chinese (Traditional)"),
    ("ar_SA", "Arabic (Saudi Arabia)"),
    ("bn_BD", "Bengali (Bangladesh)"),
    ("cs_CZ", "Czech (Czech Republic)"),
    ("da_DK", "Danish (Denmark)"),
    ("el_GR", "Greek (Greece)"),
    ("fi_FI", "Finnish (Finland)"),
    ("he_IL", "Hebrew (Israel)"),
    ("hi_IN", "Hindi (India)"),
    ("hu_HU", "Hungarian (Hungary)"),
    ("id_ID", "Indonesian (Indonesia)"),
    ("ko_KR", "Korean (South Korea)"),
    ("nl_NL", "Dutch (Netherlands)"),
    ("nb_NO", "Norwegian Bokmål (Norway)"),
    ("pl_PL", "Polish (Poland)"),
    ("ro_RO", "Romanian (Romania)"),
    ("ru_RU", "Russian (Russia)"),
    ("sv_SE", "Swedish (Sweden)"),
    ("th_TH", "Thai (Thailand)"),
    ("tr_TR", "Turkish (Turkey)"),
    ("uk_UA", "Ukrainian (Ukraine)"),
    ("vi_VN", "Vietnamese (Vietnam)"),
    ("bg_BG", "Bulgarian (Bulgaria)"),
    ("ca_ES", "Catalan (Spain)"),
    ("fa_IR", "Persian (Iran)"),
    ("hr_HR", "Croatian (Croatia)"),
    ("lt_LT", "Lithuanian (Lithuania)"),
    ("lv_LV", "Latvian (Latvia)"),
    ("ms_MY", "Malay (Malaysia)"),
    ("sk_SK", "Slovak (Slovakia)"),
    ("sl_SI", "Slovenian (Slovenia)"),
    ("sr_RS", "Serbian (Serbia)"),
    ("sw_KE", "Swahili (Kenya)"),
    ("tl_PH", "Tagalog (Philippines)"),
    ("ur_PK", "Urdu (Pakistan)"),
];

/// 裸语言代码到默认区域的映射
const SHORT_CODE_LOCALES: &[(&str, &str)] = &[
    ("en", "en_US"),
    ("de", "de_DE"),
    ("es", "es_ES"),
    ("fr", "fr_FR"),
    ("it", "it_IT"),
    ("ja", "ja_JP"),
    ("pt", "pt_BR"),
    ("zh", "zh_CN"),
    ("ko", "ko_KR"),
    ("ru", "ru_RU"),
    ("ar", "ar_SA"),
    ("he", "he_IL"),
    ("hi", "hi_IN"),
    ("nl", "nl_NL"),
    ("pl", "pl_PL"),
    ("tr", "tr_TR"),
    ("vi", "vi_VN"),
];

fn lookup<'a>(table: &'a [(&str, &str)], key: &str) -> Option<&'a str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// `es-ES` → `es_ES`
pub fn normalize_locale(lang: &str) -> String {
    lang.trim().replace('-', "_")
}

/// `es_ES` → `es-ES`，用于 HTML `lang` 属性
pub fn to_html_lang(lang: &str) -> String {
    lang.trim().replace('_', "-")
}

/// 基础语言代码（小写，去掉区域部分）
pub fn base_language(lang: &str) -> String {
    normalize_locale(lang)
        .split('_')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// 两个语言代码是否属于同一基础语言，例如 `en` 与 `en_US`
pub fn same_base_language(a: &str, b: &str) -> bool {
    let a = base_language(a);
    !a.is_empty() && a == base_language(b)
}

/// 裸语言代码扩展为完整区域代码，已知区域或未知代码原样返回
pub fn expand_short_code(lang: &str) -> String {
    let normalized = normalize_locale(lang);
    lookup(SHORT_CODE_LOCALES, &normalized)
        .map(str::to_string)
        .unwrap_or(normalized)
}

/// 提示词中使用的语言名称，未知代码返回代码本身
pub fn language_name(lang: &str) -> String {
    let normalized = normalize_locale(lang);
    if let Some(name) = lookup(LANGUAGE_NAMES, &normalized) {
        return name.to_string();
    }
    lookup(SHORT_CODE_LOCALES, &normalized)
        .and_then(|locale| lookup(LANGUAGE_NAMES, locale))
        .map(str::to_string)
        .unwrap_or_else(|| lang.to_string())
}

pub fn is_rtl(lang: &str) -> bool {
    RTL_LANGUAGES.contains(&base_language(lang).as_str())
}

/// 书写方向：`rtl` 或 `ltr`
pub fn direction(lang: &str) -> &'static str {
    if is_rtl(lang) {
        "rtl"
    } else {
        "ltr"
    }
}

/// 区域变体的补充说明，没有需要特别说明的变体时返回 `None`
pub fn locale_clarification(lang: &str) -> Option<&'static str> {
    match normalize_locale(lang).as_str() {
        "zh_CN" | "zh" => Some("Use Simplified Chinese characters as used in mainland China."),
        "zh_TW" => Some("Use Traditional Chinese characters and vocabulary as used in Taiwan."),
        "pt_BR" | "pt" => Some("Use Brazilian Portuguese spelling and vocabulary, not European Portuguese."),
        "pt_PT" => Some("Use European Portuguese spelling and vocabulary, not Brazilian Portuguese."),
        "es_MX" => Some("Use Mexican Spanish vocabulary, not Castilian Spanish."),
        "es_ES" | "es" => Some("Use Castilian Spanish as spoken in Spain."),
        "en_GB" => Some("Use British English spelling."),
        "en_US" | "en" => Some("Use American English spelling."),
        "nb_NO" => Some("Use Norwegian Bokmål, not Nynorsk."),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_formats() {
        assert_eq!(normalize_locale("es-ES"), "es_ES");
        assert_eq!(to_html_lang("es_ES"), "es-ES");
        assert_eq!(base_language("EN_us"), "en");
        assert_eq!(base_language("pt-BR"), "pt");
    }

    #[test]
    fn test_same_base_language() {
        assert!(same_base_language("en", "en_US"));
        assert!(same_base_language("EN-gb", "en"));
        assert!(!same_base_language("en", "es_ES"));
        assert!(!same_base_language("", ""));
    }

    #[test]
    fn test_direction() {
        assert_eq!(direction("ar_SA"), "rtl");
        assert_eq!(direction("he"), "rtl");
        assert_eq!(direction("fa-IR"), "rtl");
        assert_eq!(direction("es_ES"), "ltr");
        assert!(!is_rtl("ja_JP"));
    }

    #[test]
    fn test_language_names() {
        assert_eq!(language_name("ja_JP"), "Japanese (Japan)");
        assert_eq!(language_name("de"), "German (Germany)");
        assert_eq!(language_name("fr-FR"), "French (France)");
        assert_eq!(language_name("xx_YY"), "xx_YY");
        assert_eq!(expand_short_code("ko"), "ko_KR");
        assert_eq!(expand_short_code("ko_KR"), "ko_KR");
    }

    #[test]
    fn test_locale_clarification() {
        assert!(locale_clarification("zh_TW").is_some());
        assert!(locale_clarification("pt-BR").is_some());
        assert!(locale_clarification("ja_JP").is_none());
    }
}
