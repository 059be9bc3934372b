pub mod auth;
pub mod config;
pub mod connections;
pub mod date_util;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod report;
pub mod server;
pub mod shopify;
pub mod storage;

pub use config::Config;
pub use connections::ConnectedPlatforms;
pub use date_util::{Clock, FixedClock, SystemClock};
pub use error::{Error, Result};
pub use metrics::PlatformAnalysis;
pub use rate_limit::RateLimiter;
pub use report::{DailyReport, DailyReportOutcome, DailyReportRequest, VariantSelector};
pub use storage::Database;

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use llm::SummaryWriter;
use models::Snapshot;
use rate_limit::REPORT_BUCKET;
use report::{cache, MinuteOfHour, ReportContext};
use shopify::{HttpShopifyAnalytics, ShopifyAnalytics};
use storage::repository;

/// Row counts written by [`AdPulse::import_snapshot`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub brands: usize,
    pub connections: usize,
    pub campaigns: usize,
    pub ad_insights: usize,
    pub daily_stats: usize,
    pub demographics: usize,
    pub devices: usize,
}

/// Main entry point: the daily report pipeline and its collaborators.
pub struct AdPulse {
    db: Database,
    config: Config,
    shopify: Arc<dyn ShopifyAnalytics>,
    writer: Option<Arc<dyn SummaryWriter>>,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    selector: Arc<dyn VariantSelector>,
}

impl AdPulse {
    /// Wire up the HTTP Shopify client and the report rate limit from
    /// `config`. No LLM writer is attached; see [`AdPulse::with_writer`].
    pub fn new(db: Database, config: Config) -> Result<Self> {
        let shopify = HttpShopifyAnalytics::new(&config.base_url, config.upstream_timeout)?;
        let limiter = RateLimiter::new(config.report_rate_limit, config.report_rate_window);
        Ok(Self {
            db,
            config,
            shopify: Arc::new(shopify),
            writer: None,
            limiter: Arc::new(limiter),
            clock: Arc::new(SystemClock),
            selector: Arc::new(MinuteOfHour),
        })
    }

    pub fn with_writer(mut self, writer: Option<Arc<dyn SummaryWriter>>) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_shopify(mut self, shopify: Arc<dyn ShopifyAnalytics>) -> Self {
        self.shopify = shopify;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_selector(mut self, selector: Arc<dyn VariantSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ── Daily report ─────────────────────────────────────────────

    /// Return the cached report for (brand, user) when its data hash is still
    /// current, otherwise generate, cache and return a new one.
    pub async fn daily_report(
        &self,
        user_id: &str,
        request: DailyReportRequest,
    ) -> Result<DailyReportOutcome> {
        self.limiter.check(REPORT_BUCKET, user_id)?;

        let brand_id = request.brand_id.trim().to_string();
        if brand_id.is_empty() {
            return Err(Error::Validation("brandId is required".into()));
        }
        let tz = date_util::parse_timezone(request.user_timezone.as_deref())?;

        self.ensure_brand_member(&brand_id, user_id).await?;

        let now = self.clock.now();
        let (today, hour) = date_util::local_date_hour(now, tz);

        let mut analysis = metrics::aggregate_platform_analysis(&self.db, &brand_id, today).await?;
        let data_hash = report::compute_data_hash(&analysis, today, hour)?;

        if !request.force_regenerate {
            match cache::get(&self.db, &brand_id, user_id).await {
                Ok(Some(cached)) if cached.hash == data_hash => {
                    log::debug!("Serving cached report for brand {brand_id}");
                    return Ok(DailyReportOutcome {
                        report: cached.report,
                        cached: true,
                        timestamp: now,
                    });
                }
                Ok(_) => {}
                Err(e) => log::warn!("Failed to read cached report for brand {brand_id}: {e}"),
            }
        }

        if analysis.connections.shopify {
            analysis.shopify =
                shopify::fetch_insights(self.shopify.as_ref(), &brand_id, self.config.upstream_timeout)
                    .await;
        }

        let report = report::build_report(ReportContext {
            analysis,
            data_hash: data_hash.clone(),
            hour,
            timezone: tz.name(),
            now,
            selector: self.selector.as_ref(),
            writer: self.writer.as_deref(),
        })
        .await?;

        if let Err(e) = cache::put(&self.db, &brand_id, user_id, &report, &data_hash, now).await {
            log::warn!("Failed to cache report for brand {brand_id}: {e}");
        }
        log::info!(
            "Generated report for brand {brand_id} ({}, {} recommendations)",
            report.health,
            report.recommendations.len()
        );

        Ok(DailyReportOutcome {
            report,
            cached: false,
            timestamp: now,
        })
    }

    /// Unknown brands and brands the user does not belong to look the same.
    async fn ensure_brand_member(&self, brand_id: &str, user_id: &str) -> Result<()> {
        let (brand, user) = (brand_id.to_string(), user_id.to_string());
        let member = self
            .db
            .reader()
            .call(move |conn| repository::is_brand_member(conn, &brand, &user))
            .await?;
        if member {
            Ok(())
        } else {
            Err(Error::NotFound(format!("brand {brand_id}")))
        }
    }

    /// The raw aggregate for a brand and local date, without narrative.
    pub async fn analyze(&self, brand_id: &str, date: NaiveDate) -> Result<PlatformAnalysis> {
        let exists = {
            let brand = brand_id.to_string();
            self.db
                .reader()
                .call(move |conn| repository::brand_exists(conn, &brand))
                .await?
        };
        if !exists {
            return Err(Error::NotFound(format!("brand {brand_id}")));
        }
        let mut analysis = metrics::aggregate_platform_analysis(&self.db, brand_id, date).await?;
        if analysis.connections.shopify {
            analysis.shopify =
                shopify::fetch_insights(self.shopify.as_ref(), brand_id, self.config.upstream_timeout)
                    .await;
        }
        Ok(analysis)
    }

    // ── Import ───────────────────────────────────────────────────

    /// Upsert every row of a snapshot in one transaction.
    pub async fn import_snapshot(&self, snapshot: Snapshot) -> Result<ImportSummary> {
        self.db
            .writer()
            .call(move |conn| {
                let tx = conn.transaction()?;
                for brand in &snapshot.brands {
                    repository::upsert_brand(&tx, brand)?;
                }
                for connection in &snapshot.connections {
                    repository::upsert_connection(&tx, connection)?;
                }
                for campaign in &snapshot.campaigns {
                    repository::upsert_campaign(&tx, campaign)?;
                }
                for row in &snapshot.ad_insights {
                    repository::upsert_ad_insight(&tx, row)?;
                }
                for row in &snapshot.daily_stats {
                    repository::upsert_daily_stat(&tx, row)?;
                }
                for row in &snapshot.demographics {
                    repository::upsert_demographic(&tx, row)?;
                }
                for row in &snapshot.devices {
                    repository::upsert_device(&tx, row)?;
                }
                tx.commit()?;
                Ok::<ImportSummary, rusqlite::Error>(ImportSummary {
                    brands: snapshot.brands.len(),
                    connections: snapshot.connections.len(),
                    campaigns: snapshot.campaigns.len(),
                    ad_insights: snapshot.ad_insights.len(),
                    daily_stats: snapshot.daily_stats.len(),
                    demographics: snapshot.demographics.len(),
                    devices: snapshot.devices.len(),
                })
            })
            .await
            .map_err(Error::from)
    }

    // ── Config commands ──────────────────────────────────────────

    pub async fn config_get(&self, key: &str) -> Result<Option<String>> {
        self.db
            .reader()
            .call({
                let key = key.to_string();
                move |conn| repository::get_config(conn, &key)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn config_set(&self, key: &str, value: &str) -> Result<()> {
        self.db
            .writer()
            .call({
                let key = key.to_string();
                let value = value.to_string();
                move |conn| repository::set_config(conn, &key, &value)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn config_list(&self) -> Result<Vec<(String, String)>> {
        self.db
            .reader()
            .call(|conn| repository::list_config(conn))
            .await
            .map_err(Error::from)
    }

    pub async fn status(&self) -> Result<Vec<(&'static str, i64)>> {
        self.db
            .reader()
            .call(|conn| repository::table_counts(conn))
            .await
            .map_err(Error::from)
    }
}
