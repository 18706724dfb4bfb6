//! Prompts for LLM-based financial document analysis.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: changing the analyst framing or the output
//!    contract requires editing exactly one place.
//!
//! 2. **Testability**: unit tests can inspect the rendered prompt without a
//!    live model, so prompt regressions are caught early.
//!
//! Callers can override the persona message via
//! [`crate::config::AnalyzerConfig::system_prompt`]; the output contract is
//! always appended because response shaping depends on it.

use serde::{Deserialize, Serialize};

/// Query used when the client sends none (or an empty one).
pub const DEFAULT_QUERY: &str = "Analyze this financial document for investment insights. \
Return your answer as plain text only, without any formatting, bullet points, or markdown.";

/// Analyst persona framing the system message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Persona {
    /// Evidence-based investment insights. (default)
    #[default]
    FinancialAnalyst,
    /// Authenticity and completeness checks.
    DocumentVerifier,
    /// Compliant investment recommendations.
    InvestmentAdvisor,
    /// Quantitative risk analysis.
    RiskAssessor,
}

impl Persona {
    pub fn role(&self) -> &'static str {
        match self {
            Persona::FinancialAnalyst => "Senior Financial Analyst",
            Persona::DocumentVerifier => "Financial Document Verifier",
            Persona::InvestmentAdvisor => "Investment Advisor",
            Persona::RiskAssessor => "Risk Assessment Specialist",
        }
    }

    pub fn goal(&self) -> &'static str {
        match self {
            Persona::FinancialAnalyst => {
                "Analyze financial documents and provide evidence-based investment insights"
            }
            Persona::DocumentVerifier => {
                "Verify document authenticity and completeness per regulatory standards"
            }
            Persona::InvestmentAdvisor => {
                "Provide compliant, evidence-based investment recommendations"
            }
            Persona::RiskAssessor => "Conduct thorough risk analysis based on financial data",
        }
    }

    pub fn backstory(&self) -> &'static str {
        match self {
            Persona::FinancialAnalyst => {
                "Experienced financial analyst with expertise in document analysis, \
                 market research, and investment strategy."
            }
            Persona::DocumentVerifier => {
                "Certified financial document specialist with expertise in compliance \
                 and verification procedures."
            }
            Persona::InvestmentAdvisor => {
                "Certified financial advisor with expertise in portfolio management \
                 and risk assessment."
            }
            Persona::RiskAssessor => {
                "Expert in financial risk assessment with focus on quantitative \
                 analysis and regulatory compliance."
            }
        }
    }
}

impl std::str::FromStr for Persona {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "analyst" | "financialanalyst" => Ok(Persona::FinancialAnalyst),
            "verifier" | "documentverifier" => Ok(Persona::DocumentVerifier),
            "advisor" | "investmentadvisor" => Ok(Persona::InvestmentAdvisor),
            "risk" | "riskassessor" => Ok(Persona::RiskAssessor),
            other => Err(format!(
                "unknown persona '{other}' (expected analyst, verifier, advisor or risk)"
            )),
        }
    }
}

/// The JSON contract every reply must follow.
///
/// [`crate::pipeline::shape`] parses exactly these four keys.
pub const OUTPUT_CONTRACT: &str = r#"OUTPUT FORMAT
Respond with a single JSON object and nothing else, using exactly these keys:
{
  "executive_summary": "...",
  "financial_analysis": "...",
  "risk_assessment": "...",
  "investment_recommendations": "..."
}
Every value must be a plain-text string: no markdown, no bullet characters, no nested objects.
Base every statement on the document. If the document does not support a section, say so in that section."#;

/// Analysis requirements appended to every task.
pub const TASK_REQUIREMENTS: &str = r#"Requirements:
1. Extract and analyze key financial metrics
2. Identify revenue, profit, and growth trends
3. Evaluate market position and competitive landscape
4. Assess potential risks and compliance issues
5. Provide evidence-based investment recommendations"#;

/// Shape of the expected answer, mapped onto the four JSON keys.
pub const EXPECTED_OUTPUT: &str = r#"Structured analysis containing:
1. Executive Summary (executive_summary): document overview, key findings
2. Financial Analysis (financial_analysis): revenue and profit analysis, growth metrics, market position
3. Risk Assessment (risk_assessment): identified risks, mitigation strategies
4. Investment Recommendations (investment_recommendations): evidence-based suggestions, key considerations"#;

/// A rendered prompt: one system message and one user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisPrompt {
    pub system: String,
    pub user: String,
}

/// Build the system message for `persona`, or wrap an override.
pub fn system_message(persona: Persona, override_prompt: Option<&str>) -> String {
    let framing = match override_prompt {
        Some(custom) => custom.trim().to_string(),
        None => format!(
            "You are a {role}.\nGoal: {goal}\nBackground: {backstory}",
            role = persona.role(),
            goal = persona.goal(),
            backstory = persona.backstory(),
        ),
    };
    format!("{framing}\n\n{OUTPUT_CONTRACT}")
}

/// Build the task message carrying the query, document text and signals.
pub fn task_message(query: &str, document_text: &str, signals: Option<&str>) -> String {
    let mut msg = format!(
        "Analyze the provided financial document based on user query: {query}\n\n\
         Document Text:\n\"\"\"\n{document_text}\n\"\"\"\n\n"
    );
    if let Some(block) = signals {
        msg.push_str("Pre-computed signals (keyword scan, may be incomplete):\n");
        msg.push_str(block.trim_end());
        msg.push_str("\n\n");
    }
    msg.push_str(TASK_REQUIREMENTS);
    msg.push_str("\n\nExpected output:\n");
    msg.push_str(EXPECTED_OUTPUT);
    msg
}

/// Resolve the effective query: trimmed, or [`DEFAULT_QUERY`] when blank.
pub fn effective_query(query: Option<&str>) -> String {
    match query.map(str::trim) {
        Some(q) if !q.is_empty() => q.to_string(),
        _ => DEFAULT_QUERY.to_string(),
    }
}
