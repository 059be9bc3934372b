use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::connections::ConnectedPlatforms;
use crate::models::MetricCounts;
use crate::shopify::ShopifyInsights;

/// Summed counters plus the ratios derived from them over one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodStats {
    pub spend: f64,
    pub impressions: u64,
    pub clicks: u64,
    pub conversions: u64,
    pub revenue: f64,
    /// revenue / spend
    pub roas: f64,
    /// clicks / impressions, as a percentage.
    pub ctr: f64,
    pub cpc: f64,
    pub cpa: f64,
}

impl PeriodStats {
    pub fn from_counts(c: MetricCounts) -> Self {
        let impressions = c.impressions.max(0) as u64;
        let clicks = c.clicks.max(0) as u64;
        let conversions = c.conversions.max(0) as u64;
        Self {
            spend: c.spend,
            impressions,
            clicks,
            conversions,
            revenue: c.revenue,
            roas: ratio(c.revenue, c.spend),
            ctr: ratio(clicks as f64, impressions as f64) * 100.0,
            cpc: ratio(c.spend, clicks as f64),
            cpa: ratio(c.spend, conversions as f64),
        }
    }

    pub fn has_activity(&self) -> bool {
        self.spend > 0.0 || self.impressions > 0 || self.revenue > 0.0
    }
}

/// `numerator / denominator`, or 0 when the denominator is not positive.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Percentage changes between two windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trends {
    pub spend_pct: f64,
    pub revenue_pct: f64,
    pub roas_pct: f64,
    pub conversions_pct: f64,
    pub ctr_pct: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignCounts {
    pub total: u64,
    pub active: u64,
    pub paused: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSummary {
    pub campaign_id: String,
    pub name: String,
    pub spend: f64,
    pub revenue: f64,
    pub conversions: u64,
    pub roas: f64,
    pub ctr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemographicSegment {
    pub age_range: String,
    pub gender: String,
    pub spend: f64,
    pub revenue: f64,
    pub conversions: u64,
    pub roas: f64,
    /// Share of the brand's 7-day revenue, as a percentage.
    pub revenue_share: f64,
}

impl DemographicSegment {
    /// Stable identifier, e.g. `25-34/female`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.age_range, self.gender)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePerformance {
    pub device: String,
    pub spend: f64,
    pub revenue: f64,
    pub conversions: u64,
    pub roas: f64,
    /// Share of the brand's 7-day spend, as a percentage.
    pub spend_share: f64,
}

/// Where the weekly chart data came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesSource {
    /// Per-day rows from the campaign daily stats.
    Real,
    /// 14-day campaign averages spread over the week.
    CampaignAverage,
    /// Today's totals spread over the week.
    TodayProjection,
    #[default]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyPoint {
    pub date: NaiveDate,
    pub label: String,
    pub spend: f64,
    pub revenue: f64,
    pub conversions: f64,
    pub roas: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySeries {
    pub source: SeriesSource,
    pub points: Vec<WeeklyPoint>,
}

impl WeeklySeries {
    pub fn is_estimated(&self) -> bool {
        matches!(
            self.source,
            SeriesSource::CampaignAverage | SeriesSource::TodayProjection
        )
    }
}

/// Everything the report is built from for one brand on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformAnalysis {
    pub brand_id: String,
    pub date: NaiveDate,
    pub connections: ConnectedPlatforms,
    pub today_stats: PeriodStats,
    pub yesterday_stats: PeriodStats,
    pub last_7_days: PeriodStats,
    pub previous_7_days: PeriodStats,
    pub day_over_day: Trends,
    pub week_over_week: Trends,
    pub campaigns: CampaignCounts,
    pub top_campaigns: Vec<CampaignSummary>,
    pub underperforming_campaigns: Vec<CampaignSummary>,
    pub demographics: Vec<DemographicSegment>,
    pub top_demographic: Option<DemographicSegment>,
    pub devices: Vec<DevicePerformance>,
    pub weekly: WeeklySeries,
    pub issues: Vec<String>,
    #[serde(default)]
    pub shopify: ShopifyInsights,
}

impl PlatformAnalysis {
    /// An analysis with no data for the given brand and date.
    pub fn empty(brand_id: &str, date: NaiveDate) -> Self {
        Self {
            brand_id: brand_id.to_string(),
            date,
            connections: ConnectedPlatforms::default(),
            today_stats: PeriodStats::default(),
            yesterday_stats: PeriodStats::default(),
            last_7_days: PeriodStats::default(),
            previous_7_days: PeriodStats::default(),
            day_over_day: Trends::default(),
            week_over_week: Trends::default(),
            campaigns: CampaignCounts::default(),
            top_campaigns: Vec::new(),
            underperforming_campaigns: Vec::new(),
            demographics: Vec::new(),
            top_demographic: None,
            devices: Vec::new(),
            weekly: WeeklySeries::default(),
            issues: Vec::new(),
            shopify: ShopifyInsights::default(),
        }
    }

    /// True when there is Meta spend to report on.
    pub fn has_ad_data(&self) -> bool {
        self.connections.meta
            && (self.today_stats.has_activity() || self.last_7_days.has_activity())
    }
}
