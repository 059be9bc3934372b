pub mod types;

pub use types::*;

use std::cmp::Ordering;

use chrono::{Datelike, Duration, NaiveDate};

use crate::connections::{self, ConnectedPlatforms};
use crate::date_util::{trailing_window, weekday_label};
use crate::error::Result;
use crate::models::{MetaCampaign, MetricCounts};
use crate::storage::repository;
use crate::storage::Database;

/// Campaigns below this 7-day spend are too small to call out as losing money.
const UNDERPERFORMING_MIN_SPEND: f64 = 50.0;
const TOP_CAMPAIGN_LIMIT: usize = 5;
const LOW_CTR_PCT: f64 = 1.0;
const MIN_IMPRESSIONS_FOR_CTR: u64 = 1000;
const SPEND_DROP_PCT: f64 = -30.0;
const ROAS_DROP_PCT: f64 = -20.0;

/// Relative weight of each weekday (Mon..Sun) used when spreading an average
/// over an estimated week. Sums to 7 so a week keeps the same total.
const WEEKDAY_WEIGHTS: [f64; 7] = [0.95, 1.0, 1.0, 1.05, 1.1, 0.95, 0.95];

/// Percentage change from `previous` to `current`; 0 when `previous` is 0.
pub fn trend_pct(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    let pct = (current - previous) / previous * 100.0;
    if pct.is_finite() {
        pct
    } else {
        0.0
    }
}

pub fn compute_trends(current: &PeriodStats, previous: &PeriodStats) -> Trends {
    Trends {
        spend_pct: trend_pct(current.spend, previous.spend),
        revenue_pct: trend_pct(current.revenue, previous.revenue),
        roas_pct: trend_pct(current.roas, previous.roas),
        conversions_pct: trend_pct(current.conversions as f64, previous.conversions as f64),
        ctr_pct: trend_pct(current.ctr, previous.ctr),
    }
}

/// Raw rows fetched for one analysis, before any reduction.
struct RawMetrics {
    today: MetricCounts,
    yesterday: MetricCounts,
    last_7: MetricCounts,
    previous_7: MetricCounts,
    series: Vec<(NaiveDate, MetricCounts)>,
    campaigns: Vec<MetaCampaign>,
    campaign_totals: Vec<(String, String, MetricCounts)>,
    demographics: Vec<(String, String, MetricCounts)>,
    devices: Vec<(String, MetricCounts)>,
}

/// Aggregate a brand's Meta data into a [`PlatformAnalysis`] for `today`.
///
/// Read-only. Shopify insights are left empty; the report pipeline fills
/// them in when it regenerates.
pub async fn aggregate_platform_analysis(
    db: &Database,
    brand_id: &str,
    today: NaiveDate,
) -> Result<PlatformAnalysis> {
    let connections = connections::resolve_connections(db, brand_id).await?;

    let brand = brand_id.to_string();
    let yesterday = today - Duration::days(1);
    let (week_start, week_end) = trailing_window(today, 7);
    let (prev_start, prev_end) = trailing_window(week_start - Duration::days(1), 7);

    let raw = db
        .reader()
        .call(move |conn| {
            Ok::<RawMetrics, rusqlite::Error>(RawMetrics {
                today: repository::insight_totals_for_date(conn, &brand, today)?,
                yesterday: repository::insight_totals_for_date(conn, &brand, yesterday)?,
                last_7: repository::daily_stat_totals(conn, &brand, week_start, week_end)?,
                previous_7: repository::daily_stat_totals(conn, &brand, prev_start, prev_end)?,
                series: repository::daily_stat_series(conn, &brand, week_start, week_end)?,
                campaigns: repository::list_campaigns(conn, &brand)?,
                campaign_totals: repository::campaign_totals(conn, &brand, week_start, week_end)?,
                demographics: repository::demographic_totals(conn, &brand, week_start, week_end)?,
                devices: repository::device_totals(conn, &brand, week_start, week_end)?,
            })
        })
        .await?;

    Ok(reduce(brand_id, today, connections, raw))
}

fn reduce(
    brand_id: &str,
    today: NaiveDate,
    connections: ConnectedPlatforms,
    raw: RawMetrics,
) -> PlatformAnalysis {
    let mut analysis = PlatformAnalysis::empty(brand_id, today);
    analysis.connections = connections;

    analysis.today_stats = PeriodStats::from_counts(raw.today);
    analysis.yesterday_stats = PeriodStats::from_counts(raw.yesterday);
    analysis.last_7_days = PeriodStats::from_counts(raw.last_7);
    analysis.previous_7_days = PeriodStats::from_counts(raw.previous_7);
    analysis.day_over_day = compute_trends(&analysis.today_stats, &analysis.yesterday_stats);
    analysis.week_over_week = compute_trends(&analysis.last_7_days, &analysis.previous_7_days);

    analysis.campaigns = count_campaigns(&raw.campaigns);
    let summaries = summarize_campaigns(&raw.campaign_totals);
    analysis.top_campaigns = top_campaigns(&summaries);
    analysis.underperforming_campaigns = underperforming_campaigns(&summaries);

    analysis.demographics = rank_demographics(&raw.demographics);
    analysis.top_demographic = analysis.demographics.first().cloned();
    analysis.devices = rank_devices(&raw.devices);

    let days: Vec<NaiveDate> = (0..7).rev().map(|i| today - Duration::days(i)).collect();
    analysis.weekly = build_weekly_series(&days, &raw.series, &raw.campaigns, &raw.today);

    analysis.issues = detect_issues(&analysis);
    analysis
}

pub fn count_campaigns(campaigns: &[MetaCampaign]) -> CampaignCounts {
    CampaignCounts {
        total: campaigns.len() as u64,
        active: campaigns.iter().filter(|c| c.is_active()).count() as u64,
        paused: campaigns
            .iter()
            .filter(|c| c.status.eq_ignore_ascii_case("paused"))
            .count() as u64,
    }
}

fn summarize_campaigns(totals: &[(String, String, MetricCounts)]) -> Vec<CampaignSummary> {
    totals
        .iter()
        .map(|(id, name, counts)| {
            let stats = PeriodStats::from_counts(*counts);
            CampaignSummary {
                campaign_id: id.clone(),
                name: name.clone(),
                spend: stats.spend,
                revenue: stats.revenue,
                conversions: stats.conversions,
                roas: stats.roas,
                ctr: stats.ctr,
            }
        })
        .collect()
}

fn desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Up to five campaigns with spend, best ROAS first.
pub fn top_campaigns(summaries: &[CampaignSummary]) -> Vec<CampaignSummary> {
    let mut top: Vec<CampaignSummary> =
        summaries.iter().filter(|c| c.spend > 0.0).cloned().collect();
    top.sort_by(|a, b| {
        desc(a.roas, b.roas)
            .then_with(|| desc(a.spend, b.spend))
            .then_with(|| a.name.cmp(&b.name))
    });
    top.truncate(TOP_CAMPAIGN_LIMIT);
    top
}

/// Campaigns with meaningful spend that return less than they cost.
pub fn underperforming_campaigns(summaries: &[CampaignSummary]) -> Vec<CampaignSummary> {
    let mut losing: Vec<CampaignSummary> = summaries
        .iter()
        .filter(|c| c.spend >= UNDERPERFORMING_MIN_SPEND && c.roas < 1.0)
        .cloned()
        .collect();
    losing.sort_by(|a, b| desc(a.spend, b.spend).then_with(|| a.name.cmp(&b.name)));
    losing
}

pub fn rank_demographics(rows: &[(String, String, MetricCounts)]) -> Vec<DemographicSegment> {
    let total_revenue: f64 = rows.iter().map(|(_, _, c)| c.revenue).sum();
    let mut segments: Vec<DemographicSegment> = rows
        .iter()
        .filter(|(_, _, c)| c.spend > 0.0 || c.revenue > 0.0)
        .map(|(age_range, gender, counts)| {
            let stats = PeriodStats::from_counts(*counts);
            DemographicSegment {
                age_range: age_range.clone(),
                gender: gender.clone(),
                spend: stats.spend,
                revenue: stats.revenue,
                conversions: stats.conversions,
                roas: stats.roas,
                revenue_share: ratio(stats.revenue, total_revenue) * 100.0,
            }
        })
        .collect();
    segments.sort_by(|a, b| {
        desc(a.revenue, b.revenue)
            .then_with(|| b.conversions.cmp(&a.conversions))
            .then_with(|| a.key().cmp(&b.key()))
    });
    segments
}

pub fn rank_devices(rows: &[(String, MetricCounts)]) -> Vec<DevicePerformance> {
    let total_spend: f64 = rows.iter().map(|(_, c)| c.spend).sum();
    let mut devices: Vec<DevicePerformance> = rows
        .iter()
        .map(|(device, counts)| {
            let stats = PeriodStats::from_counts(*counts);
            DevicePerformance {
                device: device.clone(),
                spend: stats.spend,
                revenue: stats.revenue,
                conversions: stats.conversions,
                roas: stats.roas,
                spend_share: ratio(stats.spend, total_spend) * 100.0,
            }
        })
        .collect();
    devices.sort_by(|a, b| desc(a.spend, b.spend).then_with(|| a.device.cmp(&b.device)));
    devices
}

fn weekday_weight(d: NaiveDate) -> f64 {
    WEEKDAY_WEIGHTS[d.weekday().num_days_from_monday() as usize]
}

fn point(date: NaiveDate, spend: f64, revenue: f64, conversions: f64) -> WeeklyPoint {
    WeeklyPoint {
        date,
        label: weekday_label(date).to_string(),
        spend,
        revenue,
        conversions,
        roas: ratio(revenue, spend),
    }
}

fn projected(days: &[NaiveDate], daily: MetricCounts, source: SeriesSource) -> WeeklySeries {
    let points = days
        .iter()
        .map(|&d| {
            let w = weekday_weight(d);
            point(
                d,
                daily.spend * w,
                daily.revenue * w,
                daily.conversions as f64 * w,
            )
        })
        .collect();
    WeeklySeries { source, points }
}

/// Build the 7-day chart series for `days`.
///
/// Prefers real per-day rows, even when they record zero spend. Without them, the 14-day campaign average is
/// projected across the week, then today's totals, and finally nothing. Any
/// projected series is marked by its `source`.
pub fn build_weekly_series(
    days: &[NaiveDate],
    real: &[(NaiveDate, MetricCounts)],
    campaigns: &[MetaCampaign],
    today: &MetricCounts,
) -> WeeklySeries {
    if !real.is_empty() {
        let points = days
            .iter()
            .map(|&d| {
                let c = real
                    .iter()
                    .find(|(date, _)| *date == d)
                    .map(|(_, c)| *c)
                    .unwrap_or_default();
                point(d, c.spend, c.revenue, c.conversions as f64)
            })
            .collect();
        return WeeklySeries {
            source: SeriesSource::Real,
            points,
        };
    }

    let spend_14d: f64 = campaigns.iter().map(|c| c.spend_14d).sum();
    if spend_14d > 0.0 {
        // Fractional conversions are kept through the projection so the
        // weekly total matches the 14-day average.
        let daily_spend = spend_14d / 14.0;
        let daily_revenue = campaigns.iter().map(|c| c.revenue_14d).sum::<f64>() / 14.0;
        let daily_conversions = campaigns.iter().map(|c| c.conversions_14d).sum::<i64>() as f64 / 14.0;
        let points = days
            .iter()
            .map(|&d| {
                let w = weekday_weight(d);
                point(d, daily_spend * w, daily_revenue * w, daily_conversions * w)
            })
            .collect();
        return WeeklySeries {
            source: SeriesSource::CampaignAverage,
            points,
        };
    }

    if today.spend > 0.0 {
        return projected(days, *today, SeriesSource::TodayProjection);
    }

    WeeklySeries::default()
}

/// Human-readable problems worth surfacing, in detection order.
pub fn detect_issues(analysis: &PlatformAnalysis) -> Vec<String> {
    let mut issues = Vec::new();
    let today = &analysis.today_stats;
    let week = &analysis.last_7_days;
    let previous_week = &analysis.previous_7_days;

    if today.spend > 0.0 && today.roas < 1.0 {
        issues.push(format!(
            "ROAS is below break-even today ({:.2}x on ${:.2} spend)",
            today.roas, today.spend
        ));
    }
    if today.spend > 0.0 && today.conversions == 0 {
        issues.push("No conversions recorded today despite active spend".to_string());
    }
    if today.impressions >= MIN_IMPRESSIONS_FOR_CTR && today.ctr < LOW_CTR_PCT {
        issues.push(format!("Click-through rate is low at {:.2}%", today.ctr));
    }
    if previous_week.spend > 0.0 && analysis.week_over_week.spend_pct <= SPEND_DROP_PCT {
        issues.push(format!(
            "Spend dropped {:.0}% week over week",
            analysis.week_over_week.spend_pct.abs()
        ));
    }
    if week.spend > 0.0 && analysis.week_over_week.roas_pct <= ROAS_DROP_PCT {
        issues.push(format!(
            "ROAS declined {:.0}% week over week",
            analysis.week_over_week.roas_pct.abs()
        ));
    }
    for campaign in &analysis.underperforming_campaigns {
        issues.push(format!(
            "Campaign \"{}\" is losing money ({:.2}x ROAS on ${:.2})",
            campaign.name, campaign.roas, campaign.spend
        ));
    }
    issues
}
