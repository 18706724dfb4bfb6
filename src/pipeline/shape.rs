//! Response shaping: turn the model's reply into [`AnalysisSections`].
//!
//! ## Why is shaping necessary?
//!
//! The prompt asks for a bare JSON object with four string keys. Models
//! mostly comply, but not always:
//!
//! - wrapping the object in ` ```json ... ``` ` fences
//! - renaming keys (`"Executive Summary"`, `"risks"`)
//! - returning arrays or nested objects instead of strings
//! - ignoring the format entirely and writing headed prose
//!
//! [`shape_reply`] accepts all of these and always produces four strings.
//! Only the reply *text* is ever looked at; provider response objects are
//! not serialised.
//!
//! ## Strategy Order
//!
//! 1. Strip outer fences, then parse a JSON object (or the first `{...}`
//!    span inside surrounding chatter).
//! 2. Otherwise split the text on section headings.
//! 3. Otherwise the whole reply becomes the executive summary.
//!
//! Every field is then run through the same cleanup rules.

use crate::output::AnalysisSections;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Placeholder for a section the model did not produce.
pub const MISSING_SECTION: &str = "Not provided in the model response.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    ExecutiveSummary,
    FinancialAnalysis,
    RiskAssessment,
    InvestmentRecommendations,
}

impl Section {
    /// Map a key or heading (already normalised by [`normalise_key`]) to a
    /// section.
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "executivesummary" | "summary" | "overview" => Some(Section::ExecutiveSummary),
            "financialanalysis" | "analysis" | "financials" | "financialperformance" => {
                Some(Section::FinancialAnalysis)
            }
            "riskassessment" | "risks" | "riskanalysis" | "riskfactors" => {
                Some(Section::RiskAssessment)
            }
            "investmentrecommendations" | "investmentrecommendation" | "recommendations"
            | "recommendation" | "investmentadvice" => Some(Section::InvestmentRecommendations),
            _ => None,
        }
    }
}

/// Lowercase and drop everything but ASCII letters.
fn normalise_key(key: &str) -> String {
    key.chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[derive(Debug, Default)]
struct Partial {
    executive_summary: Option<String>,
    financial_analysis: Option<String>,
    risk_assessment: Option<String>,
    investment_recommendations: Option<String>,
}

impl Partial {
    fn slot(&mut self, section: Section) -> &mut Option<String> {
        match section {
            Section::ExecutiveSummary => &mut self.executive_summary,
            Section::FinancialAnalysis => &mut self.financial_analysis,
            Section::RiskAssessment => &mut self.risk_assessment,
            Section::InvestmentRecommendations => &mut self.investment_recommendations,
        }
    }

    /// First non-empty value wins.
    fn set(&mut self, section: Section, text: String) {
        let slot = self.slot(section);
        if slot.is_none() && !text.trim().is_empty() {
            *slot = Some(text);
        }
    }

    fn is_empty(&self) -> bool {
        self.executive_summary.is_none()
            && self.financial_analysis.is_none()
            && self.risk_assessment.is_none()
            && self.investment_recommendations.is_none()
    }

    fn finish(self) -> AnalysisSections {
        let field = |v: Option<String>| {
            v.map(|s| clean_field(&s))
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| MISSING_SECTION.to_string())
        };
        AnalysisSections {
            executive_summary: field(self.executive_summary),
            financial_analysis: field(self.financial_analysis),
            risk_assessment: field(self.risk_assessment),
            investment_recommendations: field(self.investment_recommendations),
        }
    }
}

/// Shape a raw model reply into the four analysis sections.
pub fn shape_reply(raw: &str) -> AnalysisSections {
    let body = strip_outer_fences(&normalise_line_endings(raw));

    if let Some(partial) = parse_json_sections(&body) {
        return partial.finish();
    }

    let partial = split_on_headings(&body);
    if !partial.is_empty() {
        return partial.finish();
    }

    let mut whole = Partial::default();
    whole.set(Section::ExecutiveSummary, body);
    whole.finish()
}

// ── Step 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\r?\n(.*?)\r?\n?```\s*$").unwrap());

fn strip_outer_fences(input: &str) -> String {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    }
}

// ── Step 2: JSON object ──────────────────────────────────────────────────────

fn parse_json_sections(body: &str) -> Option<Partial> {
    let object = parse_object(body).or_else(|| {
        // Tolerate chatter around the object: take the outermost braces.
        let start = body.find('{')?;
        let end = body.rfind('}')?;
        (start < end).then(|| parse_object(&body[start..=end])).flatten()
    })?;

    // Some models nest everything under a single wrapper key.
    let object = match single_wrapped_object(&object) {
        Some(inner) => inner,
        None => object,
    };

    let mut partial = Partial::default();
    for (key, value) in &object {
        if let Some(section) = Section::from_key(&normalise_key(key)) {
            partial.set(section, flatten_value(value));
        }
    }
    (!partial.is_empty()).then_some(partial)
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn single_wrapped_object(object: &Map<String, Value>) -> Option<Map<String, Value>> {
    if object.len() != 1 {
        return None;
    }
    match object.values().next() {
        Some(Value::Object(inner))
            if inner
                .keys()
                .any(|k| Section::from_key(&normalise_key(k)).is_some()) =>
        {
            Some(inner.clone())
        }
        _ => None,
    }
}

/// Render any JSON value as plain text.
///
/// Arrays become one line per element; objects become `key: value` lines.
fn flatten_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(items) => items
            .iter()
            .map(flatten_value)
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}: {}", flatten_value(v)))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

// ── Step 3: Heading split ────────────────────────────────────────────────────

/// A section heading line, with optional `#`, numbering and bold markers.
/// Either the name stands alone on its line, or it is followed by a colon
/// and inline text (captured).
static RE_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(?:#{1,6}[ \t]*)?(?:\d+[.)][ \t]*)?(?:\*\*|__)?[ \t]*(executive[ \t]+summary|financial[ \t]+analysis|risk[ \t]+assessment|investment[ \t]+recommendations?)[ \t]*(?:\*\*|__)?[ \t]*(?::[ \t]*(?:\*\*|__)?(.*)|)$",
    )
    .unwrap()
});

fn split_on_headings(body: &str) -> Partial {
    let mut partial = Partial::default();
    let headings: Vec<_> = RE_HEADING.captures_iter(body).collect();

    for (i, caps) in headings.iter().enumerate() {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some(section) = Section::from_key(&normalise_key(name.as_str())) else {
            continue;
        };
        let section_end = headings
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(body.len());

        let inline = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
        let rest = body[whole.end()..section_end].trim();
        let text = match (inline.is_empty(), rest.is_empty()) {
            (true, _) => rest.to_string(),
            (false, true) => inline.to_string(),
            (false, false) => format!("{inline}\n{rest}"),
        };
        partial.set(section, text);
    }
    partial
}

// ── Field cleanup ────────────────────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Apply the per-field cleanup rules, in order:
/// 1. Normalise line endings (CRLF → LF)
/// 2. Trim trailing whitespace per line
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Collapse 3+ consecutive newlines to one blank line
/// 5. Trim the result
pub fn clean_field(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = trim_trailing_whitespace(&s);
    let s = remove_invisible_chars(&s);
    let s = RE_BLANK_LINES.replace_all(&s, "\n\n");
    s.trim().to_string()
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_JSON: &str = r#"{
        "executive_summary": "Solid quarter.",
        "financial_analysis": "Revenue up 12%.",
        "risk_assessment": "Debt is rising.",
        "investment_recommendations": "Hold."
    }"#;

    #[test]
    fn plain_json_object() {
        let s = shape_reply(FULL_JSON);
        assert_eq!(s.executive_summary, "Solid quarter.");
        assert_eq!(s.financial_analysis, "Revenue up 12%.");
        assert_eq!(s.risk_assessment, "Debt is rising.");
        assert_eq!(s.investment_recommendations, "Hold.");
    }

    #[test]
    fn fenced_json_object() {
        let s = shape_reply(&format!("```json\n{FULL_JSON}\n```"));
        assert_eq!(s.investment_recommendations, "Hold.");
    }

    #[test]
    fn json_with_surrounding_chatter() {
        let s = shape_reply(&format!("Here is the analysis:\n{FULL_JSON}\nHope this helps."));
        assert_eq!(s.executive_summary, "Solid quarter.");
    }

    #[test]
    fn aliased_keys_and_structured_values() {
        let raw = r#"{
            "Executive Summary": "Overview.",
            "Risks": ["Currency exposure", "Customer concentration"],
            "Financial Analysis": {"revenue": "4.2B", "margin": 0.31}
        }"#;
        let s = shape_reply(raw);
        assert_eq!(s.executive_summary, "Overview.");
        assert_eq!(s.risk_assessment, "Currency exposure\nCustomer concentration");
        assert!(s.financial_analysis.contains("revenue: 4.2B"));
        assert!(s.financial_analysis.contains("margin: 0.31"));
        assert_eq!(s.investment_recommendations, MISSING_SECTION);
    }

    #[test]
    fn wrapped_object_is_unwrapped() {
        let raw = r#"{"analysis": {"executive_summary": "Inner.", "risk_assessment": "Low."}}"#;
        let s = shape_reply(raw);
        assert_eq!(s.executive_summary, "Inner.");
        assert_eq!(s.risk_assessment, "Low.");
    }

    #[test]
    fn heading_sectioned_text() {
        let raw = "## Executive Summary\nThe company grew.\n\n\
                   **Financial Analysis:** Margins widened.\n\
                   3. Risk Assessment\nFX risk.\n\
                   Investment Recommendations: Buy on dips.";
        let s = shape_reply(raw);
        assert_eq!(s.executive_summary, "The company grew.");
        assert_eq!(s.financial_analysis, "Margins widened.");
        assert_eq!(s.risk_assessment, "FX risk.");
        assert_eq!(s.investment_recommendations, "Buy on dips.");
    }

    #[test]
    fn prose_mentioning_a_section_name_is_not_a_heading() {
        let s = shape_reply("Financial analysis shows a healthy balance sheet.");
        assert_eq!(
            s.executive_summary,
            "Financial analysis shows a healthy balance sheet."
        );
        assert_eq!(s.financial_analysis, MISSING_SECTION);
    }

    #[test]
    fn plain_text_becomes_summary() {
        let s = shape_reply("The document shows steady growth and modest leverage.");
        assert_eq!(
            s.executive_summary,
            "The document shows steady growth and modest leverage."
        );
        assert_eq!(s.financial_analysis, MISSING_SECTION);
        assert_eq!(s.risk_assessment, MISSING_SECTION);
    }

    #[test]
    fn empty_reply_fills_every_section() {
        let s = shape_reply("   ");
        assert_eq!(s.executive_summary, MISSING_SECTION);
        assert_eq!(s.investment_recommendations, MISSING_SECTION);
    }

    #[test]
    fn json_without_known_keys_falls_through() {
        let s = shape_reply(r#"{"foo": "bar"}"#);
        assert_eq!(s.executive_summary, r#"{"foo": "bar"}"#);
    }

    #[test]
    fn test_clean_field() {
        let input = "\u{FEFF}Line one   \r\n\r\n\r\n\r\nLine\u{200B} two  ";
        assert_eq!(clean_field(input), "Line one\n\nLine two");
    }

    #[test]
    fn test_strip_fences_no_lang() {
        assert_eq!(strip_outer_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_outer_fences("no fences"), "no fences");
    }
}
