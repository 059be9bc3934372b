pub mod cache;
pub mod hash;
pub mod narrative;

pub use cache::CachedReport;
pub use hash::compute_data_hash;
pub use narrative::{
    classify_health, FixedVariant, HealthStatus, MinuteOfHour, Narrative, Priority,
    Recommendation, VariantSelector,
};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::date_util::strip_code_fences;
use crate::error::{Error, Result};
use crate::llm::SummaryWriter;
use crate::metrics::PlatformAnalysis;

const PROMPT_VERSION: &str = "daily-report-v1";

/// Body of `POST /api/ai/daily-report`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReportRequest {
    pub brand_id: String,
    #[serde(default)]
    pub force_regenerate: bool,
    #[serde(default)]
    pub user_timezone: Option<String>,
}

/// LLM-written executive summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSummary {
    pub executive_summary: String,
    #[serde(default)]
    pub key_actions: Vec<String>,
    #[serde(default)]
    pub risk_note: Option<String>,
    /// Provider and model that wrote it.
    #[serde(default)]
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    pub brand_id: String,
    pub date: NaiveDate,
    pub hour: u32,
    pub timezone: String,
    pub generated_at: DateTime<Utc>,
    pub health: HealthStatus,
    pub headline: String,
    pub summary: String,
    pub insights: Vec<String>,
    pub recommendations: Vec<Recommendation>,
    pub ai_summary: Option<AiSummary>,
    pub analysis: PlatformAnalysis,
    pub data_hash: String,
}

/// Result of one report request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReportOutcome {
    pub report: DailyReport,
    pub cached: bool,
    pub timestamp: DateTime<Utc>,
}

/// Inputs for a freshly generated report.
pub struct ReportContext<'a> {
    pub analysis: PlatformAnalysis,
    pub data_hash: String,
    pub hour: u32,
    pub timezone: &'a str,
    pub now: DateTime<Utc>,
    pub selector: &'a dyn VariantSelector,
    pub writer: Option<&'a dyn SummaryWriter>,
}

/// Synthesize the narrative and, when a writer is configured, the executive
/// summary. An LLM failure fails the whole report.
pub async fn build_report(ctx: ReportContext<'_>) -> Result<DailyReport> {
    let narrative = narrative::synthesize(&ctx.analysis, ctx.now, ctx.selector);

    let ai_summary = match ctx.writer {
        Some(writer) => Some(write_ai_summary(writer, &ctx.analysis, &narrative).await?),
        None => None,
    };

    Ok(DailyReport {
        brand_id: ctx.analysis.brand_id.clone(),
        date: ctx.analysis.date,
        hour: ctx.hour,
        timezone: ctx.timezone.to_string(),
        generated_at: ctx.now,
        health: narrative.health,
        headline: narrative.headline,
        summary: narrative.summary,
        insights: narrative.insights,
        recommendations: narrative.recommendations,
        ai_summary,
        analysis: ctx.analysis,
        data_hash: ctx.data_hash,
    })
}

// ── LLM summary ─────────────────────────────────────────────────────

pub fn summary_prompt(analysis: &PlatformAnalysis, narrative: &Narrative) -> Result<String> {
    let analysis_json = serde_json::to_string_pretty(analysis)?;
    let findings = narrative
        .insights
        .iter()
        .chain(analysis.issues.iter())
        .map(|line| format!("- {line}"))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!(
        r#"Write today's executive summary for brand {brand} ({date}). Overall health: {health}.

Findings:
{findings}

Aggregated metrics (currency amounts in the account currency, CTR in percent):
{analysis_json}

Respond with ONLY a JSON object (no markdown, no code fences):
{{
  "executiveSummary": "3-4 sentences for the client on how ads performed and why",
  "keyActions": ["2-4 concrete actions for the next 24 hours"],
  "riskNote": "One sentence on the biggest risk, or null"
}}"#,
        brand = analysis.brand_id,
        date = analysis.date,
        health = narrative.health,
    ))
}

pub fn parse_ai_summary(text: &str, model: String) -> Result<AiSummary> {
    let json_str = strip_code_fences(text);
    let mut summary: AiSummary = serde_json::from_str(json_str)
        .map_err(|e| Error::Llm(format!("Failed to parse LLM response: {e}\nResponse: {text}")))?;
    summary.model = model;
    Ok(summary)
}

async fn write_ai_summary(
    writer: &dyn SummaryWriter,
    analysis: &PlatformAnalysis,
    narrative: &Narrative,
) -> Result<AiSummary> {
    let prompt = summary_prompt(analysis, narrative)?;
    log::debug!(
        "Requesting {PROMPT_VERSION} summary for brand {} from {}",
        analysis.brand_id,
        writer.describe()
    );
    let text = writer.write_summary(&prompt).await?;
    parse_ai_summary(&text, writer.describe())
}
