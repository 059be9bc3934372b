//! Deterministic report text built from the numbers in a [`PlatformAnalysis`].

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::PlatformAnalysis;

// ── Health ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Excellent,
    Good,
    Fair,
    #[default]
    Poor,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Excellent => "excellent",
            HealthStatus::Good => "good",
            HealthStatus::Fair => "fair",
            HealthStatus::Poor => "poor",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Both the ROAS floor and the issue ceiling must hold for a tier.
pub fn classify_health(roas: f64, issue_count: usize) -> HealthStatus {
    if roas >= 4.0 && issue_count == 0 {
        HealthStatus::Excellent
    } else if roas >= 3.0 && issue_count <= 1 {
        HealthStatus::Good
    } else if roas >= 2.0 && issue_count <= 2 {
        HealthStatus::Fair
    } else {
        HealthStatus::Poor
    }
}

/// Today's ROAS when there was spend today, otherwise the 7-day ROAS.
pub fn headline_roas(analysis: &PlatformAnalysis) -> f64 {
    if analysis.today_stats.spend > 0.0 {
        analysis.today_stats.roas
    } else {
        analysis.last_7_days.roas
    }
}

// ── Variant selection ───────────────────────────────────────────────

/// Picks one of `variants` phrasings for a sentence.
pub trait VariantSelector: Send + Sync {
    fn pick(&self, now: DateTime<Utc>, variants: usize) -> usize;
}

/// Rotates phrasing with the minute of the hour.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinuteOfHour;

impl VariantSelector for MinuteOfHour {
    fn pick(&self, now: DateTime<Utc>, variants: usize) -> usize {
        if variants == 0 {
            return 0;
        }
        now.minute() as usize % variants
    }
}

/// Always the same variant (wrapped into range).
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedVariant(pub usize);

impl VariantSelector for FixedVariant {
    fn pick(&self, _now: DateTime<Utc>, variants: usize) -> usize {
        if variants == 0 {
            return 0;
        }
        self.0 % variants
    }
}

struct Phrasing<'a> {
    selector: &'a dyn VariantSelector,
    now: DateTime<Utc>,
}

impl Phrasing<'_> {
    fn choose<'v>(&self, variants: &[&'v str]) -> &'v str {
        variants
            .get(self.selector.pick(self.now, variants.len()))
            .or_else(|| variants.first())
            .copied()
            .unwrap_or_default()
    }
}

// ── Output types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub title: String,
    pub detail: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Narrative {
    pub health: HealthStatus,
    pub headline: String,
    pub summary: String,
    pub insights: Vec<String>,
    pub recommendations: Vec<Recommendation>,
}

// ── Sentences ───────────────────────────────────────────────────────

fn money(amount: f64) -> String {
    format!("${amount:.2}")
}

fn roas_sentence(p: &Phrasing<'_>, roas: f64) -> String {
    let template = if roas >= 4.0 {
        p.choose(&[
            "ROAS of {r} is exceptional; every dollar is returning well over four.",
            "At {r} ROAS, ads are performing at a top-tier level.",
            "Returns are outstanding with ROAS at {r}.",
        ])
    } else if roas >= 3.0 {
        p.choose(&[
            "ROAS of {r} is strong and comfortably profitable.",
            "Ads are returning {r} per dollar, a solid result.",
        ])
    } else if roas >= 2.0 {
        p.choose(&[
            "ROAS of {r} is healthy with room to improve.",
            "At {r} ROAS, campaigns are profitable but not yet efficient.",
        ])
    } else if roas >= 1.0 {
        p.choose(&[
            "ROAS of {r} is near break-even; margins are thin.",
            "Returns are barely covering spend at {r} ROAS.",
        ])
    } else {
        p.choose(&[
            "ROAS of {r} means spend is not being recovered.",
            "Campaigns are losing money with ROAS at {r}.",
        ])
    };
    template.replace("{r}", &format!("{roas:.2}x"))
}

fn ctr_sentence(p: &Phrasing<'_>, ctr: f64) -> String {
    let template = if ctr >= 2.0 {
        p.choose(&[
            "Click-through rate of {c} shows creatives are resonating.",
            "Audiences are engaging well with a {c} CTR.",
        ])
    } else if ctr >= 1.0 {
        p.choose(&[
            "CTR sits at {c}, in line with typical benchmarks.",
            "Engagement is steady at a {c} click-through rate.",
        ])
    } else {
        p.choose(&[
            "CTR of {c} suggests creatives are not catching attention.",
            "Only {c} of impressions turn into clicks.",
        ])
    };
    template.replace("{c}", &format!("{ctr:.2}%"))
}

/// Commentary on a percentage change; within ±5% reads as flat.
fn trend_sentence(p: &Phrasing<'_>, metric: &str, period: &str, pct: f64) -> String {
    let template = if pct > 5.0 {
        p.choose(&[
            "{m} is up {p} {t}.",
            "{m} grew {p} {t}.",
        ])
    } else if pct < -5.0 {
        p.choose(&[
            "{m} is down {p} {t}.",
            "{m} fell {p} {t}.",
        ])
    } else {
        p.choose(&[
            "{m} held steady {t}.",
            "{m} was roughly flat {t}.",
        ])
    };
    template
        .replace("{m}", metric)
        .replace("{p}", &format!("{:.1}%", pct.abs()))
        .replace("{t}", period)
}

fn headline(p: &Phrasing<'_>, health: HealthStatus) -> String {
    let text = match health {
        HealthStatus::Excellent => p.choose(&[
            "Campaigns are firing on all cylinders",
            "An excellent day for ad performance",
        ]),
        HealthStatus::Good => p.choose(&[
            "Performance is solid today",
            "A good day with a few things to watch",
        ]),
        HealthStatus::Fair => p.choose(&[
            "Performance is mixed today",
            "Results are fair, with clear room to improve",
        ]),
        HealthStatus::Poor => p.choose(&[
            "Campaigns need attention",
            "Today's numbers call for action",
        ]),
    };
    text.to_string()
}

// ── Recommendations ─────────────────────────────────────────────────

pub fn recommendations(analysis: &PlatformAnalysis) -> Vec<Recommendation> {
    let mut recs = Vec::new();
    let today = &analysis.today_stats;

    if today.spend > 0.0 && today.conversions == 0 {
        recs.push(Recommendation {
            title: "Check conversion tracking".into(),
            detail: format!(
                "{} was spent today without a recorded conversion. Confirm the pixel and conversion events are firing.",
                money(today.spend)
            ),
            priority: Priority::High,
        });
    }

    if !analysis.underperforming_campaigns.is_empty() {
        let names: Vec<&str> = analysis
            .underperforming_campaigns
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        recs.push(Recommendation {
            title: "Pause or rework losing campaigns".into(),
            detail: format!(
                "{} returned less than they spent over the last 7 days.",
                names.join(", ")
            ),
            priority: Priority::High,
        });
    }

    if analysis.last_7_days.impressions >= 1000 && analysis.last_7_days.ctr < 1.0 {
        recs.push(Recommendation {
            title: "Refresh ad creatives".into(),
            detail: format!(
                "A {:.2}% click-through rate points to creative fatigue. Test new hooks and visuals.",
                analysis.last_7_days.ctr
            ),
            priority: Priority::Medium,
        });
    }

    if analysis.week_over_week.roas_pct <= -20.0 {
        recs.push(Recommendation {
            title: "Review recent changes".into(),
            detail: format!(
                "ROAS dropped {:.1}% week over week. Look at budget, audience and creative changes made this week.",
                analysis.week_over_week.roas_pct.abs()
            ),
            priority: Priority::Medium,
        });
    }

    if let Some(top) = analysis.top_campaigns.first().filter(|c| c.roas >= 3.0) {
        recs.push(Recommendation {
            title: format!("Scale \"{}\"", top.name),
            detail: format!(
                "It is returning {:.2}x. Raise its budget by 15-20% and watch for diminishing returns.",
                top.roas
            ),
            priority: Priority::Medium,
        });
    }

    if let Some(demo) = analysis.top_demographic.as_ref().filter(|d| d.roas >= 2.0) {
        recs.push(Recommendation {
            title: format!("Lean into the {} audience", demo.key()),
            detail: format!(
                "This segment drives {:.0}% of revenue at {:.2}x ROAS.",
                demo.revenue_share, demo.roas
            ),
            priority: Priority::Low,
        });
    }

    if recs.is_empty() {
        recs.push(Recommendation {
            title: "Maintain current strategy".into(),
            detail: "No problems detected. Keep budgets steady and monitor tomorrow's numbers.".into(),
            priority: Priority::Low,
        });
    }

    recs.sort_by_key(|r| r.priority);
    recs
}

// ── Synthesis ───────────────────────────────────────────────────────

fn no_data_narrative(analysis: &PlatformAnalysis) -> Narrative {
    let connections = &analysis.connections;
    let (summary, rec) = if connections.meta {
        (
            "Meta Ads is connected but no spend has been recorded in the last 7 days.".to_string(),
            Recommendation {
                title: "Launch or resume campaigns".into(),
                detail: "There is no recent spend to analyze. Check that campaigns are active and funded.".into(),
                priority: Priority::High,
            },
        )
    } else if connections.any() {
        (
            format!(
                "Connected platforms ({}) are linked, but daily reports need Meta Ads data.",
                connections.names().join(", ")
            ),
            Recommendation {
                title: "Connect Meta Ads".into(),
                detail: "Daily reports are built from Meta campaign data.".into(),
                priority: Priority::High,
            },
        )
    } else {
        (
            "Connect Meta Ads to start receiving daily performance reports.".to_string(),
            Recommendation {
                title: "Connect Meta Ads".into(),
                detail: "Daily reports are built from Meta campaign data.".into(),
                priority: Priority::High,
            },
        )
    };
    Narrative {
        health: HealthStatus::Poor,
        headline: "No ad data to report yet".into(),
        summary,
        insights: Vec::new(),
        recommendations: vec![rec],
    }
}

/// Build the report text for `analysis`. Phrasing varies with `selector`.
pub fn synthesize(
    analysis: &PlatformAnalysis,
    now: DateTime<Utc>,
    selector: &dyn VariantSelector,
) -> Narrative {
    if !analysis.has_ad_data() {
        return no_data_narrative(analysis);
    }

    let p = Phrasing { selector, now };
    let roas = headline_roas(analysis);
    let health = classify_health(roas, analysis.issues.len());

    let mut summary = roas_sentence(&p, roas);
    if analysis.previous_7_days.has_activity() {
        summary.push(' ');
        summary.push_str(&trend_sentence(
            &p,
            "Revenue",
            "week over week",
            analysis.week_over_week.revenue_pct,
        ));
    }
    if !analysis.issues.is_empty() {
        summary.push_str(&format!(
            " {} issue{} flagged.",
            analysis.issues.len(),
            if analysis.issues.len() == 1 { "" } else { "s" }
        ));
    }

    let mut insights = Vec::new();
    let today = &analysis.today_stats;
    if today.has_activity() {
        insights.push(format!(
            "Today: {} spent, {} revenue, {} conversions.",
            money(today.spend),
            money(today.revenue),
            today.conversions
        ));
    }
    if analysis.last_7_days.impressions > 0 {
        insights.push(ctr_sentence(&p, analysis.last_7_days.ctr));
    }
    if analysis.yesterday_stats.has_activity() {
        insights.push(trend_sentence(
            &p,
            "Spend",
            "versus yesterday",
            analysis.day_over_day.spend_pct,
        ));
    }
    if let Some(top) = analysis.top_campaigns.first() {
        insights.push(format!(
            "Top campaign \"{}\" brought in {} at {:.2}x ROAS.",
            top.name,
            money(top.revenue),
            top.roas
        ));
    }
    if let Some(demo) = &analysis.top_demographic {
        insights.push(format!(
            "{} is the strongest audience with {:.0}% of revenue.",
            demo.key(),
            demo.revenue_share
        ));
    }
    if let Some(device) = analysis.devices.first() {
        insights.push(format!(
            "{} takes {:.0}% of spend at {:.2}x ROAS.",
            device.device, device.spend_share, device.roas
        ));
    }
    if let Some(region) = analysis
        .shopify
        .geographic
        .as_ref()
        .and_then(|g| g.top_region())
    {
        insights.push(format!(
            "Shopify sales are led by {} with {} across {} orders.",
            region.region,
            money(region.revenue),
            region.orders
        ));
    }
    if let Some(repeat) = &analysis.shopify.repeat_customers {
        insights.push(format!(
            "{:.1}% of Shopify customers have ordered more than once.",
            repeat.repeat_rate
        ));
    }
    if analysis.weekly.is_estimated() {
        insights.push("The weekly chart is estimated; daily history is not available yet.".into());
    }

    Narrative {
        health,
        headline: headline(&p, health),
        summary,
        insights,
        recommendations: recommendations(analysis),
    }
}
