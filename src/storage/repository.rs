use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    AdInsightRow, Brand, CampaignDailyStat, DemographicRow, DeviceRow, MetaCampaign,
    MetricCounts, PlatformConnection, PlatformType,
};

fn date_key(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

// ── Brands ─────────────────────────────────────────────────────────

pub fn upsert_brand(conn: &Connection, brand: &Brand) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO brands (brand_id, name, created_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(brand_id) DO UPDATE SET name = excluded.name",
        params![brand.brand_id, brand.name],
    )?;
    for user_id in &brand.members {
        add_brand_member(conn, &brand.brand_id, user_id, "member")?;
    }
    Ok(())
}

pub fn add_brand_member(
    conn: &Connection,
    brand_id: &str,
    user_id: &str,
    role: &str,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO brand_members (brand_id, user_id, role) VALUES (?1, ?2, ?3)
         ON CONFLICT(brand_id, user_id) DO UPDATE SET role = excluded.role",
        params![brand_id, user_id, role],
    )?;
    Ok(())
}

pub fn brand_exists(conn: &Connection, brand_id: &str) -> Result<bool, rusqlite::Error> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM brands WHERE brand_id = ?1",
            params![brand_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn is_brand_member(
    conn: &Connection,
    brand_id: &str,
    user_id: &str,
) -> Result<bool, rusqlite::Error> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM brand_members WHERE brand_id = ?1 AND user_id = ?2",
            params![brand_id, user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

// ── Sessions ───────────────────────────────────────────────────────

pub fn insert_session(
    conn: &Connection,
    token: &str,
    user_id: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO user_sessions (token, user_id, created_at, expires_at)
         VALUES (?1, ?2, datetime('now'), ?3)",
        params![token, user_id, expires_at.to_rfc3339()],
    )?;
    Ok(())
}

/// Look up the user behind a session token, ignoring sessions that expired
/// before `now`.
pub fn session_user(
    conn: &Connection,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<String>, rusqlite::Error> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT user_id, expires_at FROM user_sessions WHERE token = ?1",
            params![token],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    Ok(row.and_then(|(user_id, expires_at)| {
        let expires = DateTime::parse_from_rfc3339(&expires_at).ok()?;
        (expires.with_timezone(&Utc) > now).then_some(user_id)
    }))
}

// ── Platform connections ───────────────────────────────────────────

pub fn upsert_connection(
    conn: &Connection,
    connection: &PlatformConnection,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO platform_connections (brand_id, platform_type, status, account_id, connected_at)
         VALUES (?1, ?2, ?3, ?4, datetime('now'))
         ON CONFLICT(brand_id, platform_type) DO UPDATE SET
            status = excluded.status,
            account_id = COALESCE(excluded.account_id, platform_connections.account_id)",
        params![
            connection.brand_id,
            connection.platform_type.as_str(),
            connection.status.as_str(),
            connection.account_id,
        ],
    )?;
    Ok(())
}

pub fn active_platforms(
    conn: &Connection,
    brand_id: &str,
) -> Result<Vec<PlatformType>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT platform_type FROM platform_connections
         WHERE brand_id = ?1 AND status = 'active'
         ORDER BY platform_type",
    )?;
    let rows = stmt.query_map(params![brand_id], |row| row.get::<_, String>(0))?;
    let mut platforms = Vec::new();
    for row in rows {
        match row?.parse::<PlatformType>() {
            Ok(p) => platforms.push(p),
            Err(e) => log::warn!("Skipping connection row: {e}"),
        }
    }
    Ok(platforms)
}

// ── Meta campaigns ─────────────────────────────────────────────────

pub fn upsert_campaign(conn: &Connection, campaign: &MetaCampaign) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO meta_campaigns (
            campaign_id, brand_id, name, status, objective, daily_budget,
            spend_14d, impressions_14d, clicks_14d, conversions_14d, revenue_14d, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, datetime('now'))
        ON CONFLICT(campaign_id) DO UPDATE SET
            brand_id=excluded.brand_id, name=excluded.name, status=excluded.status,
            objective=excluded.objective, daily_budget=excluded.daily_budget,
            spend_14d=excluded.spend_14d, impressions_14d=excluded.impressions_14d,
            clicks_14d=excluded.clicks_14d, conversions_14d=excluded.conversions_14d,
            revenue_14d=excluded.revenue_14d, updated_at=excluded.updated_at",
        params![
            campaign.campaign_id,
            campaign.brand_id,
            campaign.name,
            campaign.status,
            campaign.objective,
            campaign.daily_budget,
            campaign.spend_14d,
            campaign.impressions_14d,
            campaign.clicks_14d,
            campaign.conversions_14d,
            campaign.revenue_14d,
        ],
    )?;
    Ok(())
}

pub fn list_campaigns(conn: &Connection, brand_id: &str) -> Result<Vec<MetaCampaign>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT campaign_id, brand_id, name, status, objective, daily_budget,
                spend_14d, impressions_14d, clicks_14d, conversions_14d, revenue_14d
         FROM meta_campaigns WHERE brand_id = ?1 ORDER BY name",
    )?;
    let rows = stmt.query_map(params![brand_id], |row| {
        Ok(MetaCampaign {
            campaign_id: row.get(0)?,
            brand_id: row.get(1)?,
            name: row.get(2)?,
            status: row.get(3)?,
            objective: row.get(4)?,
            daily_budget: row.get(5)?,
            spend_14d: row.get(6)?,
            impressions_14d: row.get(7)?,
            clicks_14d: row.get(8)?,
            conversions_14d: row.get(9)?,
            revenue_14d: row.get(10)?,
        })
    })?;
    rows.collect()
}

// ── Meta daily facts ───────────────────────────────────────────────

pub fn upsert_ad_insight(conn: &Connection, row: &AdInsightRow) -> Result<(), rusqlite::Error> {
    let c = &row.counts;
    conn.execute(
        "INSERT OR REPLACE INTO meta_ad_insights
            (brand_id, campaign_id, ad_id, date, spend, impressions, clicks, conversions, revenue)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            row.brand_id,
            row.campaign_id,
            row.ad_id,
            date_key(row.date),
            c.spend,
            c.impressions,
            c.clicks,
            c.conversions,
            c.revenue,
        ],
    )?;
    Ok(())
}

pub fn upsert_daily_stat(conn: &Connection, row: &CampaignDailyStat) -> Result<(), rusqlite::Error> {
    let c = &row.counts;
    conn.execute(
        "INSERT OR REPLACE INTO meta_campaign_daily_stats
            (brand_id, campaign_id, date, spend, impressions, clicks, conversions, revenue)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            row.brand_id,
            row.campaign_id,
            date_key(row.date),
            c.spend,
            c.impressions,
            c.clicks,
            c.conversions,
            c.revenue,
        ],
    )?;
    Ok(())
}

pub fn upsert_demographic(conn: &Connection, row: &DemographicRow) -> Result<(), rusqlite::Error> {
    let c = &row.counts;
    conn.execute(
        "INSERT OR REPLACE INTO meta_demographics
            (brand_id, date, age_range, gender, spend, impressions, clicks, conversions, revenue)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            row.brand_id,
            date_key(row.date),
            row.age_range,
            row.gender,
            c.spend,
            c.impressions,
            c.clicks,
            c.conversions,
            c.revenue,
        ],
    )?;
    Ok(())
}

pub fn upsert_device(conn: &Connection, row: &DeviceRow) -> Result<(), rusqlite::Error> {
    let c = &row.counts;
    conn.execute(
        "INSERT OR REPLACE INTO meta_device_performance
            (brand_id, date, device, spend, impressions, clicks, conversions, revenue)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            row.brand_id,
            date_key(row.date),
            row.device,
            c.spend,
            c.impressions,
            c.clicks,
            c.conversions,
            c.revenue,
        ],
    )?;
    Ok(())
}

fn counts_from_row(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<MetricCounts> {
    Ok(MetricCounts {
        spend: row.get::<_, Option<f64>>(offset)?.unwrap_or(0.0),
        impressions: row.get::<_, Option<i64>>(offset + 1)?.unwrap_or(0),
        clicks: row.get::<_, Option<i64>>(offset + 2)?.unwrap_or(0),
        conversions: row.get::<_, Option<i64>>(offset + 3)?.unwrap_or(0),
        revenue: row.get::<_, Option<f64>>(offset + 4)?.unwrap_or(0.0),
    })
}

const COUNT_SUMS: &str =
    "SUM(spend), SUM(impressions), SUM(clicks), SUM(conversions), SUM(revenue)";

/// Ad-level insight totals for a single date.
pub fn insight_totals_for_date(
    conn: &Connection,
    brand_id: &str,
    date: NaiveDate,
) -> Result<MetricCounts, rusqlite::Error> {
    let sql = format!(
        "SELECT {COUNT_SUMS} FROM meta_ad_insights WHERE brand_id = ?1 AND date = ?2"
    );
    conn.query_row(&sql, params![brand_id, date_key(date)], |row| {
        counts_from_row(row, 0)
    })
}

/// Campaign daily-stat totals over an inclusive date range.
pub fn daily_stat_totals(
    conn: &Connection,
    brand_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<MetricCounts, rusqlite::Error> {
    let sql = format!(
        "SELECT {COUNT_SUMS} FROM meta_campaign_daily_stats
         WHERE brand_id = ?1 AND date >= ?2 AND date <= ?3"
    );
    conn.query_row(
        &sql,
        params![brand_id, date_key(start), date_key(end)],
        |row| counts_from_row(row, 0),
    )
}

/// Per-day totals over an inclusive range. Days without rows are absent.
pub fn daily_stat_series(
    conn: &Connection,
    brand_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<(NaiveDate, MetricCounts)>, rusqlite::Error> {
    let sql = format!(
        "SELECT date, {COUNT_SUMS} FROM meta_campaign_daily_stats
         WHERE brand_id = ?1 AND date >= ?2 AND date <= ?3
         GROUP BY date ORDER BY date"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![brand_id, date_key(start), date_key(end)], |row| {
        let date: String = row.get(0)?;
        Ok((date, counts_from_row(row, 1)?))
    })?;

    let mut series = Vec::new();
    for row in rows {
        let (date, counts) = row?;
        match NaiveDate::parse_from_str(&date, "%Y-%m-%d") {
            Ok(d) => series.push((d, counts)),
            Err(e) => log::warn!("Skipping daily stat with bad date {date}: {e}"),
        }
    }
    Ok(series)
}

/// Per-campaign totals over an inclusive range, joined to campaign names.
pub fn campaign_totals(
    conn: &Connection,
    brand_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<(String, String, MetricCounts)>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT s.campaign_id, COALESCE(c.name, s.campaign_id),
                SUM(s.spend), SUM(s.impressions), SUM(s.clicks), SUM(s.conversions), SUM(s.revenue)
         FROM meta_campaign_daily_stats s
         LEFT JOIN meta_campaigns c ON c.campaign_id = s.campaign_id
         WHERE s.brand_id = ?1 AND s.date >= ?2 AND s.date <= ?3
         GROUP BY s.campaign_id
         ORDER BY s.campaign_id",
    )?;
    let rows = stmt.query_map(params![brand_id, date_key(start), date_key(end)], |row| {
        Ok((row.get(0)?, row.get(1)?, counts_from_row(row, 2)?))
    })?;
    rows.collect()
}

/// Demographic totals over an inclusive range, grouped by (age range, gender).
pub fn demographic_totals(
    conn: &Connection,
    brand_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<(String, String, MetricCounts)>, rusqlite::Error> {
    let sql = format!(
        "SELECT age_range, gender, {COUNT_SUMS} FROM meta_demographics
         WHERE brand_id = ?1 AND date >= ?2 AND date <= ?3
         GROUP BY age_range, gender
         ORDER BY age_range, gender"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![brand_id, date_key(start), date_key(end)], |row| {
        Ok((row.get(0)?, row.get(1)?, counts_from_row(row, 2)?))
    })?;
    rows.collect()
}

/// Device totals over an inclusive range.
pub fn device_totals(
    conn: &Connection,
    brand_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<(String, MetricCounts)>, rusqlite::Error> {
    let sql = format!(
        "SELECT device, {COUNT_SUMS} FROM meta_device_performance
         WHERE brand_id = ?1 AND date >= ?2 AND date <= ?3
         GROUP BY device
         ORDER BY device"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![brand_id, date_key(start), date_key(end)], |row| {
        Ok((row.get(0)?, counts_from_row(row, 1)?))
    })?;
    rows.collect()
}

// ── Report cache ───────────────────────────────────────────────────

/// Raw cache row: (report_data JSON, data_hash, created_at).
pub fn get_cached_report(
    conn: &Connection,
    brand_id: &str,
    user_id: &str,
) -> Result<Option<(String, String, String)>, rusqlite::Error> {
    conn.query_row(
        "SELECT report_data, data_hash, created_at FROM ai_daily_reports_cache
         WHERE brand_id = ?1 AND user_id = ?2",
        params![brand_id, user_id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )
    .optional()
}

pub fn upsert_cached_report(
    conn: &Connection,
    brand_id: &str,
    user_id: &str,
    report_data: &str,
    data_hash: &str,
    created_at: DateTime<Utc>,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO ai_daily_reports_cache (brand_id, user_id, report_data, data_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(brand_id, user_id) DO UPDATE SET
            report_data = excluded.report_data,
            data_hash = excluded.data_hash,
            created_at = excluded.created_at",
        params![brand_id, user_id, report_data, data_hash, created_at.to_rfc3339()],
    )?;
    Ok(())
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

// ── Status ─────────────────────────────────────────────────────────

/// Row counts for the tables shown by `adpulse status`.
pub fn table_counts(conn: &Connection) -> Result<Vec<(&'static str, i64)>, rusqlite::Error> {
    const TABLES: &[&str] = &[
        "brands",
        "platform_connections",
        "meta_campaigns",
        "meta_ad_insights",
        "meta_campaign_daily_stats",
        "meta_demographics",
        "meta_device_performance",
        "ai_daily_reports_cache",
        "user_sessions",
    ];
    let mut counts = Vec::with_capacity(TABLES.len());
    for table in TABLES {
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })?;
        counts.push((*table, n));
    }
    Ok(counts)
}
