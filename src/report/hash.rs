//! Content hash that decides whether a cached report is still current.

use chrono::NaiveDate;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::metrics::PlatformAnalysis;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HashPayload<'a> {
    date: NaiveDate,
    hour: u32,
    connections: Vec<&'static str>,
    today_spend_cents: i64,
    yesterday_spend_cents: i64,
    last_7_days_spend_cents: i64,
    today_roas_milli: i64,
    last_7_days_roas_milli: i64,
    total_campaigns: u64,
    active_campaigns: u64,
    paused_campaigns: u64,
    issues: Vec<&'a str>,
    top_demographic: Option<String>,
}

fn cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

fn thousandths(value: f64) -> i64 {
    (value * 1000.0).round() as i64
}

/// SHA-256 (lowercase hex) over the fields that matter for the report.
///
/// `date` and `hour` are part of the payload, so a cached report is valid for
/// at most one hour even when the numbers do not move.
pub fn compute_data_hash(analysis: &PlatformAnalysis, date: NaiveDate, hour: u32) -> Result<String> {
    let mut issues: Vec<&str> = analysis.issues.iter().map(String::as_str).collect();
    issues.sort_unstable();

    let payload = HashPayload {
        date,
        hour,
        connections: analysis.connections.names(),
        today_spend_cents: cents(analysis.today_stats.spend),
        yesterday_spend_cents: cents(analysis.yesterday_stats.spend),
        last_7_days_spend_cents: cents(analysis.last_7_days.spend),
        today_roas_milli: thousandths(analysis.today_stats.roas),
        last_7_days_roas_milli: thousandths(analysis.last_7_days.roas),
        total_campaigns: analysis.campaigns.total,
        active_campaigns: analysis.campaigns.active,
        paused_campaigns: analysis.campaigns.paused,
        issues,
        top_demographic: analysis.top_demographic.as_ref().map(|d| d.key()),
    };

    let canonical = serde_json::to_vec(&payload)?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{CampaignCounts, DemographicSegment};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn sample() -> PlatformAnalysis {
        let mut analysis = PlatformAnalysis::empty("b1", date());
        analysis.connections.meta = true;
        analysis.today_stats.spend = 125.40;
        analysis.today_stats.roas = 3.2;
        analysis.last_7_days.spend = 910.0;
        analysis.campaigns = CampaignCounts {
            total: 4,
            active: 3,
            paused: 1,
        };
        analysis.issues = vec!["b issue".into(), "a issue".into()];
        analysis
    }

    #[test]
    fn test_hash_is_deterministic_hex() {
        let a = compute_data_hash(&sample(), date(), 9).unwrap();
        let b = compute_data_hash(&sample(), date(), 9).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_one_cent_changes_hash() {
        let base = compute_data_hash(&sample(), date(), 9).unwrap();
        let mut changed = sample();
        changed.today_stats.spend += 0.01;
        assert_ne!(base, compute_data_hash(&changed, date(), 9).unwrap());
    }

    #[test]
    fn test_float_noise_below_a_cent_is_ignored() {
        let base = compute_data_hash(&sample(), date(), 9).unwrap();
        let mut noisy = sample();
        noisy.today_stats.spend += 0.000_001;
        noisy.today_stats.roas += 0.000_01;
        assert_eq!(base, compute_data_hash(&noisy, date(), 9).unwrap());
    }

    #[test]
    fn test_issue_order_does_not_matter() {
        let base = compute_data_hash(&sample(), date(), 9).unwrap();
        let mut reordered = sample();
        reordered.issues.reverse();
        assert_eq!(base, compute_data_hash(&reordered, date(), 9).unwrap());
    }

    #[test]
    fn test_hour_and_date_change_hash() {
        let base = compute_data_hash(&sample(), date(), 9).unwrap();
        assert_ne!(base, compute_data_hash(&sample(), date(), 10).unwrap());
        let tomorrow = date().succ_opt().unwrap();
        assert_ne!(base, compute_data_hash(&sample(), tomorrow, 9).unwrap());
    }

    #[test]
    fn test_campaign_counts_and_top_demographic_change_hash() {
        let base = compute_data_hash(&sample(), date(), 9).unwrap();

        let mut paused = sample();
        paused.campaigns.active = 2;
        paused.campaigns.paused = 2;
        assert_ne!(base, compute_data_hash(&paused, date(), 9).unwrap());

        let mut demo = sample();
        demo.top_demographic = Some(DemographicSegment {
            age_range: "25-34".into(),
            gender: "female".into(),
            spend: 10.0,
            revenue: 40.0,
            conversions: 2,
            roas: 4.0,
            revenue_share: 60.0,
        });
        assert_ne!(base, compute_data_hash(&demo, date(), 9).unwrap());
    }

    #[test]
    fn test_shopify_data_is_not_hashed() {
        let base = compute_data_hash(&sample(), date(), 9).unwrap();
        let mut with_shopify = sample();
        with_shopify.shopify.repeat_customers = Some(Default::default());
        assert_eq!(base, compute_data_hash(&with_shopify, date(), 9).unwrap());
    }
}
