//! Row types for the brand, connection and Meta advertising tables.
//!
//! These mirror what the platform sync job writes. They deserialize from the
//! snapshot files accepted by `adpulse import`.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformType {
    Meta,
    Shopify,
    Tiktok,
    Google,
}

impl PlatformType {
    pub const ALL: [PlatformType; 4] = [
        PlatformType::Meta,
        PlatformType::Shopify,
        PlatformType::Tiktok,
        PlatformType::Google,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformType::Meta => "meta",
            PlatformType::Shopify => "shopify",
            PlatformType::Tiktok => "tiktok",
            PlatformType::Google => "google",
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "meta" => Ok(PlatformType::Meta),
            "shopify" => Ok(PlatformType::Shopify),
            "tiktok" => Ok(PlatformType::Tiktok),
            "google" => Ok(PlatformType::Google),
            other => Err(Error::Validation(format!("unknown platform type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Active,
    Inactive,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Active => "active",
            ConnectionStatus::Inactive => "inactive",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brand {
    pub brand_id: String,
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConnection {
    pub brand_id: String,
    pub platform_type: PlatformType,
    pub status: ConnectionStatus,
    #[serde(default)]
    pub account_id: Option<String>,
}

/// A campaign with its trailing 14-day totals as reported by Meta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaCampaign {
    pub campaign_id: String,
    pub brand_id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub daily_budget: Option<f64>,
    #[serde(default)]
    pub spend_14d: f64,
    #[serde(default)]
    pub impressions_14d: i64,
    #[serde(default)]
    pub clicks_14d: i64,
    #[serde(default)]
    pub conversions_14d: i64,
    #[serde(default)]
    pub revenue_14d: f64,
}

impl MetaCampaign {
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }
}

/// The additive counters shared by every daily metric row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricCounts {
    #[serde(default)]
    pub spend: f64,
    #[serde(default)]
    pub impressions: i64,
    #[serde(default)]
    pub clicks: i64,
    #[serde(default)]
    pub conversions: i64,
    #[serde(default)]
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdInsightRow {
    pub brand_id: String,
    pub campaign_id: String,
    pub ad_id: String,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub counts: MetricCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignDailyStat {
    pub brand_id: String,
    pub campaign_id: String,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub counts: MetricCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemographicRow {
    pub brand_id: String,
    pub date: NaiveDate,
    pub age_range: String,
    pub gender: String,
    #[serde(flatten)]
    pub counts: MetricCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRow {
    pub brand_id: String,
    pub date: NaiveDate,
    pub device: String,
    #[serde(flatten)]
    pub counts: MetricCounts,
}

/// A bulk snapshot of brand data, as produced by the sync job's export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub brands: Vec<Brand>,
    #[serde(default)]
    pub connections: Vec<PlatformConnection>,
    #[serde(default)]
    pub campaigns: Vec<MetaCampaign>,
    #[serde(default)]
    pub ad_insights: Vec<AdInsightRow>,
    #[serde(default)]
    pub daily_stats: Vec<CampaignDailyStat>,
    #[serde(default)]
    pub demographics: Vec<DemographicRow>,
    #[serde(default)]
    pub devices: Vec<DeviceRow>,
}
