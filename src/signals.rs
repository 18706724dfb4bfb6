//! Local financial signals: metric and risk hints computed before the model
//! call.
//!
//! These are cheap regex passes over the extracted text. They do not replace
//! the model's analysis; they give it anchors ("revenue: 4,200") and they make
//! the debug record useful when the model answer looks off.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Characters of context kept on each side of a risk keyword.
const RISK_CONTEXT_CHARS: usize = 50;

/// Headline figures found in the text, as written (commas kept).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialMetrics {
    pub revenue: Option<String>,
    pub profit: Option<String>,
    pub expenses: Option<String>,
    pub growth: Option<String>,
}

/// One risk keyword occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub category: String,
    pub factor: String,
    pub context: String,
}

/// Everything computed locally for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialSignals {
    pub metrics: FinancialMetrics,
    pub insights: Vec<String>,
    pub risks: Vec<RiskFactor>,
    pub risk_summary: BTreeMap<String, usize>,
    pub total_risks: usize,
}

// ── Metric patterns ──────────────────────────────────────────────────────────

static RE_REVENUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)revenues?\s*(?:of|:)?\s*[$£€]?([\d,]+(?:\.\d{2})?)\s*(?:million|billion)?")
        .unwrap()
});
static RE_PROFIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:net income|profit)s?\s*(?:of|:)?\s*[$£€]?([\d,]+(?:\.\d{2})?)\s*(?:million|billion)?",
    )
    .unwrap()
});
static RE_EXPENSES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:expenses|costs)s?\s*(?:of|:)?\s*[$£€]?([\d,]+(?:\.\d{2})?)\s*(?:million|billion)?",
    )
    .unwrap()
});
static RE_GROWTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:growth|increase)s?\s*(?:of|:)?\s*([\d,]+(?:\.\d{2})?)\s*%").unwrap()
});

static RE_MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

// ── Risk keyword families ────────────────────────────────────────────────────

static RISK_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("Litigation Risk", r"(?i)litigation|lawsuit|legal proceeding"),
        ("Financial Risk", r"(?i)debt|default|bankruptcy|loss"),
        ("Market Risk", r"(?i)competition|market decline|market share"),
        ("Operational Risk", r"(?i)disruption|supply chain|operational"),
        ("Regulatory Risk", r"(?i)regulation|compliance|regulatory"),
    ]
    .into_iter()
    .map(|(category, pattern)| (category, Regex::new(pattern).unwrap()))
    .collect()
});

/// Compute metrics, insights and risk factors for `text`.
pub fn analyze_text(text: &str) -> FinancialSignals {
    if text.trim().is_empty() {
        return FinancialSignals::default();
    }

    let normalised = RE_MULTI_SPACE.replace_all(text, " ");
    let metrics = extract_metrics(&normalised);
    let insights = insights_for(&metrics);

    let risks = identify_risks(text);
    let mut risk_summary = BTreeMap::new();
    for risk in &risks {
        *risk_summary.entry(risk.category.clone()).or_insert(0) += 1;
    }

    FinancialSignals {
        metrics,
        insights,
        total_risks: risks.len(),
        risks,
        risk_summary,
    }
}

/// First match of each metric pattern.
pub fn extract_metrics(text: &str) -> FinancialMetrics {
    let first = |re: &Regex| re.captures(text).map(|c| c[1].to_string());
    FinancialMetrics {
        revenue: first(&RE_REVENUE),
        profit: first(&RE_PROFIT),
        expenses: first(&RE_EXPENSES),
        growth: first(&RE_GROWTH),
    }
}

fn insights_for(metrics: &FinancialMetrics) -> Vec<String> {
    let mut insights = Vec::new();
    if let Some(ref revenue) = metrics.revenue {
        insights.push(format!("Detected revenue: ${revenue}"));
    }
    if let Some(ref profit) = metrics.profit {
        insights.push(format!("Detected profit / net income: ${profit}"));
    }
    if let Some(ref growth) = metrics.growth {
        insights.push(format!("Growth rate: {growth}%"));
    }
    insights
}

/// Every risk keyword occurrence, grouped by category in declaration order.
pub fn identify_risks(text: &str) -> Vec<RiskFactor> {
    let mut risks = Vec::new();
    for (category, re) in RISK_PATTERNS.iter() {
        for m in re.find_iter(text) {
            risks.push(RiskFactor {
                category: (*category).to_string(),
                factor: m.as_str().to_lowercase(),
                context: context_window(text, m.start(), m.end()),
            });
        }
    }
    risks
}

/// Up to [`RISK_CONTEXT_CHARS`] characters either side of `start..end`.
fn context_window(text: &str, start: usize, end: usize) -> String {
    let from = text[..start]
        .char_indices()
        .rev()
        .nth(RISK_CONTEXT_CHARS - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let to = text[end..]
        .char_indices()
        .nth(RISK_CONTEXT_CHARS)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    text[from..to].trim().to_string()
}

/// Render signals as a compact prompt block.
pub fn render_for_prompt(signals: &FinancialSignals) -> String {
    let mut out = String::new();
    let m = &signals.metrics;
    let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "not found".to_string());
    out.push_str(&format!(
        "Metrics detected by keyword scan: revenue={}, profit={}, expenses={}, growth={}\n",
        show(&m.revenue),
        show(&m.profit),
        show(&m.expenses),
        m.growth
            .as_ref()
            .map(|g| format!("{g}%"))
            .unwrap_or_else(|| "not found".to_string()),
    ));
    if signals.risk_summary.is_empty() {
        out.push_str("Risk keywords: none detected\n");
    } else {
        let summary: Vec<String> = signals
            .risk_summary
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect();
        out.push_str(&format!(
            "Risk keywords ({} total): {}\n",
            signals.total_risks,
            summary.join(", ")
        ));
    }
    out
}
