use crate::config::DEFAULT_LANGUAGE;

/// Supported response languages as `(BCP 47 code, display name)`.
pub const LANGUAGES: &[(&str, &str)] = &[
    ("en-US", "English (US)"),
    ("en-GB", "English (UK)"),
    ("af-ZA", "Afrikaans"),
    ("sq-AL", "Shqip (Albanian)"),
    ("ar-SA", "العربية (Arabic)"),
    ("hy-AM", "Հայերեն (Armenian)"),
    ("az-AZ", "Azərbaycan (Azerbaijani)"),
    ("eu-ES", "Euskara (Basque)"),
    ("be-BY", "Беларуская (Belarusian)"),
    ("bn-BD", "বাংলা (Bengali)"),
    ("bs-BA", "Bosanski (Bosnian)"),
    ("bg-BG", "Български (Bulgarian)"),
    ("ca-ES", "Català (Catalan)"),
    ("zh-CN", "中文 (简体) (Chinese, Simplified)"),
    ("zh-TW", "中文 (繁體) (Chinese, Traditional)"),
    ("hr-HR", "Hrvatski (Croatian)"),
    ("cs-CZ", "Čeština (Czech)"),
    ("da-DK", "Dansk (Danish)"),
    ("nl-NL", "Nederlands (Dutch)"),
    ("et-EE", "Eesti (Estonian)"),
    ("fil-PH", "Filipino"),
    ("fi-FI", "Suomi (Finnish)"),
    ("fr-FR", "Français (French)"),
    ("gl-ES", "Galego (Galician)"),
    ("ka-GE", "ქართული (Georgian)"),
    ("de-DE", "Deutsch (German)"),
    ("el-GR", "Ελληνικά (Greek)"),
    ("gu-IN", "ગુજરાતી (Gujarati)"),
    ("he-IL", "עברית (Hebrew)"),
    ("hi-IN", "हिन्दी (Hindi)"),
    ("hu-HU", "Magyar (Hungarian)"),
    ("is-IS", "Íslenska (Icelandic)"),
    ("id-ID", "Bahasa Indonesia (Indonesian)"),
    ("ga-IE", "Gaeilge (Irish)"),
    ("it-IT", "Italiano (Italian)"),
    ("ja-JP", "日本語 (Japanese)"),
    ("kn-IN", "ಕನ್ನಡ (Kannada)"),
    ("kk-KZ", "Қазақ (Kazakh)"),
    ("km-KH", "ខ្មែរ (Khmer)"),
    ("ko-KR", "한국어 (Korean)"),
    ("lo-LA", "ລາວ (Lao)"),
    ("lv-LV", "Latviešu (Latvian)"),
    ("lt-LT", "Lietuvių (Lithuanian)"),
    ("mk-MK", "Македонски (Macedonian)"),
    ("ms-MY", "Bahasa Melayu (Malay)"),
    ("ml-IN", "മലയാളം (Malayalam)"),
    ("mr-IN", "मराठी (Marathi)"),
    ("mn-MN", "Монгол (Mongolian)"),
    ("ne-NP", "नेपाली (Nepali)"),
    ("no-NO", "Norsk (Norwegian)"),
    ("fa-IR", "فारसी (Persian)"),
    ("pl-PL", "Polski (Polish)"),
    ("pt-BR", "Português (Brasil)"),
    ("pt-PT", "Português (Portugal)"),
    ("pa-IN", "ਪੰਜਾਬी (Punjabi)"),
    ("ro-RO", "Română (Romanian)"),
    ("ru-RU", "Русский (Russian)"),
    ("sr-RS", "Српски (Serbian)"),
    ("si-LK", "සිංහල (Sinhala)"),
    ("sk-SK", "Slovenčina (Slovak)"),
    ("sl-SI", "Slovenščina (Slovenian)"),
    ("es-ES", "Español (España)"),
    ("es-MX", "Español (México)"),
    ("sw-KE", "Kiswahili (Swahili)"),
    ("sv-SE", "Svenska (Swedish)"),
    ("ta-IN", "தமிழ் (Tamil)"),
    ("te-IN", "తెలుగు (Telugu)"),
    ("th-TH", "ไทย (Thai)"),
    ("tr-TR", "Türkçe (Turkish)"),
    ("uk-UA", "Українська (Ukrainian)"),
    ("ur-PK", "اردو (Urdu)"),
    ("uz-UZ", "O‘zbek (Uzbek)"),
    ("vi-VN", "Tiếng Việt (Vietnamese)"),
    ("zu-ZA", "isiZulu (Zulu)"),
];

pub fn language_name(code: &str) -> Option<&'static str> {
    LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

pub fn is_supported(code: &str) -> bool {
    language_name(code).is_some()
}

/// Suffix appended to prompts so the model answers in the chosen language.
/// Empty for the default language.
pub fn language_instruction(code: &str) -> String {
    if code == DEFAULT_LANGUAGE {
        return String::new();
    }
    let name = language_name(code)
        .map(|n| n.split(" (").next().unwrap_or(n))
        .unwrap_or("English");
    format!(" Please provide the response in {}.", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_language_has_no_instruction() {
        assert_eq!(language_instruction("en-US"), "");
    }

    #[test]
    fn test_instruction_uses_native_name() {
        assert_eq!(
            language_instruction("fr-FR"),
            " Please provide the response in Français."
        );
        assert_eq!(
            language_instruction("fil-PH"),
            " Please provide the response in Filipino."
        );
    }

    #[test]
    fn test_unknown_code_falls_back_to_english() {
        assert_eq!(
            language_instruction("xx-XX"),
            " Please provide the response in English."
        );
        assert!(!is_supported("xx-XX"));
    }
}
