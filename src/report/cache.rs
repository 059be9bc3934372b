//! One cached report per (brand, user), replaced on every write.

use chrono::{DateTime, Utc};

use super::DailyReport;
use crate::error::Result;
use crate::storage::repository;
use crate::storage::Database;

#[derive(Debug, Clone, PartialEq)]
pub struct CachedReport {
    pub report: DailyReport,
    pub hash: String,
    pub created_at: DateTime<Utc>,
}

/// The stored report, or `None` when absent or no longer readable.
pub async fn get(db: &Database, brand_id: &str, user_id: &str) -> Result<Option<CachedReport>> {
    let (brand, user) = (brand_id.to_string(), user_id.to_string());
    let row = db
        .reader()
        .call(move |conn| repository::get_cached_report(conn, &brand, &user))
        .await?;

    let Some((report_data, hash, created_at)) = row else {
        return Ok(None);
    };

    let report = match serde_json::from_str::<DailyReport>(&report_data) {
        Ok(report) => report,
        Err(e) => {
            log::warn!("Ignoring unreadable cached report for brand {brand_id}: {e}");
            return Ok(None);
        }
    };
    let created_at = match DateTime::parse_from_rfc3339(&created_at) {
        Ok(ts) => ts.with_timezone(&Utc),
        Err(e) => {
            log::warn!("Ignoring cached report for brand {brand_id} with bad timestamp: {e}");
            return Ok(None);
        }
    };

    Ok(Some(CachedReport {
        report,
        hash,
        created_at,
    }))
}

/// Upsert the report for (brand, user), replacing any previous row.
pub async fn put(
    db: &Database,
    brand_id: &str,
    user_id: &str,
    report: &DailyReport,
    hash: &str,
    created_at: DateTime<Utc>,
) -> Result<()> {
    let report_data = serde_json::to_string(report)?;
    let (brand, user, hash) = (brand_id.to_string(), user_id.to_string(), hash.to_string());
    db.writer()
        .call(move |conn| {
            repository::upsert_cached_report(conn, &brand, &user, &report_data, &hash, created_at)
        })
        .await?;
    Ok(())
}
