//! Parsing boundary for model output.
//!
//! The summarization prompt asks for two labeled sections; this module owns
//! the grammar that pulls them back out of free text. It sits behind a trait
//! so a structured-output (JSON-mode) parser can replace it without touching
//! the stages or the service.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::languages;

/// Result of parsing a model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSummary {
    pub interpretation: String,
    pub action_items: Vec<String>,
}

pub trait SummaryParser: Send + Sync {
    fn parse(&self, analysis: &str, language: &str) -> ParsedSummary;
}

// The prompts request English labels, but the Hindi template asks for Hindi
// labels, so both spellings are recognized.
static INTERPRETATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:Interpretation|व्याख्या):\s*([^\n]*)").unwrap());
static ACTION_ITEMS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:Action Items|कार्य बिंदु):\s*([^\n]*)").unwrap());

/// Parses the `Interpretation:` / `Action Items:` grammar.
///
/// Free-text extraction is brittle against model phrasing drift, so the rules
/// are forgiving: a missing interpretation label keeps the whole response, and
/// zero recovered action items substitutes the localized two-item default.
pub struct LabeledSectionParser;

impl SummaryParser for LabeledSectionParser {
    fn parse(&self, analysis: &str, language: &str) -> ParsedSummary {
        let interpretation = INTERPRETATION
            .captures(analysis)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| analysis.trim().to_string());

        let items_text = ACTION_ITEMS
            .captures(analysis)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .unwrap_or("");

        let mut action_items: Vec<String> = items_text
            .split([',', ';', '\n'])
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(String::from)
            .collect();

        if action_items.is_empty() {
            action_items = languages::default_action_items(language);
        }

        ParsedSummary {
            interpretation,
            action_items,
        }
    }
}
