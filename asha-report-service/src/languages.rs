//! Supported languages and the code mappings the adapters need: the OCR
//! engine's 3-letter codes and the speech service's regional locales.

pub struct Language {
    /// ISO 639-1 code used throughout the API.
    pub code: &'static str,
    /// Native display name.
    pub name: &'static str,
    /// 3-letter code understood by the OCR engines.
    pub ocr_code: &'static str,
    /// Regional locale for speech synthesis.
    pub tts_locale: &'static str,
    /// Default synthesis speaker.
    pub speaker: &'static str,
}

pub const LANGUAGES: &[Language] = &[
    Language { code: "en", name: "English", ocr_code: "eng", tts_locale: "en-IN", speaker: "anushka" },
    Language { code: "hi", name: "हिंदी (Hindi)", ocr_code: "hin", tts_locale: "hi-IN", speaker: "anushka" },
    Language { code: "bn", name: "বাংলা (Bengali)", ocr_code: "ben", tts_locale: "bn-IN", speaker: "anushka" },
    Language { code: "te", name: "తెలుగు (Telugu)", ocr_code: "tel", tts_locale: "te-IN", speaker: "anushka" },
    Language { code: "ta", name: "தமிழ் (Tamil)", ocr_code: "tam", tts_locale: "ta-IN", speaker: "anushka" },
    Language { code: "mr", name: "मराठी (Marathi)", ocr_code: "mar", tts_locale: "mr-IN", speaker: "anushka" },
    Language { code: "gu", name: "ગુજરાતી (Gujarati)", ocr_code: "guj", tts_locale: "gu-IN", speaker: "anushka" },
    Language { code: "kn", name: "ಕನ್ನಡ (Kannada)", ocr_code: "kan", tts_locale: "kn-IN", speaker: "anushka" },
    Language { code: "ml", name: "മലയാളം (Malayalam)", ocr_code: "mal", tts_locale: "ml-IN", speaker: "anushka" },
    Language { code: "pa", name: "ਪੰਜਾਬੀ (Punjabi)", ocr_code: "pan", tts_locale: "pa-IN", speaker: "anushka" },
    Language { code: "or", name: "ଓଡ଼ିଆ (Odia)", ocr_code: "ori", tts_locale: "or-IN", speaker: "anushka" },
];

pub fn lookup(code: &str) -> Option<&'static Language> {
    LANGUAGES.iter().find(|l| l.code == code)
}

pub fn is_supported(code: &str) -> bool {
    lookup(code).is_some()
}

pub fn default_language() -> &'static str {
    "en"
}

/// Resolve an application language code to an OCR engine code.
///
/// Accepts either an ISO code (`"hi"` → `"hin"`) or an engine code passed
/// through verbatim (`"hin"` → `"hin"`, for callers that already speak the
/// engine's dialect). Anything unmapped falls back to the base engine
/// language, `"eng"`.
pub fn engine_code<'a>(code: &'a str) -> &'a str {
    if let Some(language) = lookup(code) {
        return language.ocr_code;
    }
    if LANGUAGES.iter().any(|l| l.ocr_code == code) {
        return code;
    }
    "eng"
}

pub fn tts_locale(code: &str) -> Option<&'static str> {
    lookup(code).map(|l| l.tts_locale)
}

/// `"hi-IN"` → `"hi"`.
pub fn base_language(locale: &str) -> &str {
    locale.split('-').next().unwrap_or(locale)
}

/// Whether a speech locale targets a supported language.
pub fn is_speakable_locale(locale: &str) -> bool {
    is_supported(base_language(locale))
}

/// Canned action items used when the model response yields none.
/// Deliberate UX fallback: the list is never left empty.
pub fn default_action_items(language: &str) -> Vec<String> {
    match language {
        "hi" => vec![
            "रिपोर्ट की समीक्षा करें".to_string(),
            "आवश्यकतानुसार फॉलो-अप करें".to_string(),
        ],
        _ => vec![
            "Review the report".to_string(),
            "Follow up as needed".to_string(),
        ],
    }
}

/// Section labels for the rendered report document.
pub struct ReportLabels {
    pub title: &'static str,
    pub patient: &'static str,
    pub extracted: &'static str,
    pub interpretation: &'static str,
    pub actions: &'static str,
}

pub fn report_labels(language: &str) -> ReportLabels {
    match language {
        "hi" => ReportLabels {
            title: "मेडिकल रिपोर्ट",
            patient: "रोगी की जानकारी",
            extracted: "निकाला गया टेक्स्ट",
            interpretation: "मेडिकल व्याख्या",
            actions: "अनुशंसित कार्रवाई",
        },
        _ => ReportLabels {
            title: "Medical Report",
            patient: "Patient Information",
            extracted: "Extracted Text",
            interpretation: "Medical Interpretation",
            actions: "Recommended Actions",
        },
    }
}
