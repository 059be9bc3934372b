//! Client for the brand's Shopify analytics endpoints.
//!
//! Shopify data is a nice-to-have section of the report: every failure here
//! degrades its section to `None` instead of failing the report.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

pub const GEOGRAPHIC_PATH: &str = "/api/shopify/geographic";
pub const REPEAT_CUSTOMERS_PATH: &str = "/api/shopify/repeat-customers";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSales {
    pub region: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub orders: u64,
    #[serde(default)]
    pub revenue: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeographicBreakdown {
    #[serde(default)]
    pub regions: Vec<RegionSales>,
    #[serde(default)]
    pub total_orders: u64,
    #[serde(default)]
    pub total_revenue: f64,
}

impl GeographicBreakdown {
    pub fn top_region(&self) -> Option<&RegionSales> {
        self.regions.iter().max_by(|a, b| {
            a.revenue
                .partial_cmp(&b.revenue)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatCustomerStats {
    #[serde(default)]
    pub total_customers: u64,
    #[serde(default)]
    pub repeat_customers: u64,
    /// Percentage of customers with more than one order.
    #[serde(default)]
    pub repeat_rate: f64,
}

/// The Shopify sections of a report. `None` means unavailable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopifyInsights {
    pub geographic: Option<GeographicBreakdown>,
    pub repeat_customers: Option<RepeatCustomerStats>,
}

#[async_trait]
pub trait ShopifyAnalytics: Send + Sync {
    async fn geographic(&self, brand_id: &str) -> Result<GeographicBreakdown>;
    async fn repeat_customers(&self, brand_id: &str) -> Result<RepeatCustomerStats>;
}

/// Calls the analytics endpoints served alongside the dashboard.
#[derive(Debug, Clone)]
pub struct HttpShopifyAnalytics {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpShopifyAnalytics {
    /// `base_url` is the dashboard origin, e.g. `https://app.example.com`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid base URL {base_url}: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, base_url })
    }

    async fn fetch_json<T: DeserializeOwned>(&self, path: &str, brand_id: &str) -> Result<T> {
        let upstream = |message: String| Error::Upstream {
            endpoint: path.to_string(),
            message,
        };

        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| upstream(e.to_string()))?;
        url.query_pairs_mut().append_pair("brandId", brand_id);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| upstream(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upstream(format!("returned {status}: {body}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| upstream(format!("invalid response body: {e}")))
    }
}

#[async_trait]
impl ShopifyAnalytics for HttpShopifyAnalytics {
    async fn geographic(&self, brand_id: &str) -> Result<GeographicBreakdown> {
        self.fetch_json(GEOGRAPHIC_PATH, brand_id).await
    }

    async fn repeat_customers(&self, brand_id: &str) -> Result<RepeatCustomerStats> {
        self.fetch_json(REPEAT_CUSTOMERS_PATH, brand_id).await
    }
}

async fn settle<T>(
    section: &str,
    brand_id: &str,
    timeout: Duration,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Option<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            log::warn!("Shopify {section} unavailable for brand {brand_id}: {e}");
            None
        }
        Err(_) => {
            log::warn!(
                "Shopify {section} timed out after {}s for brand {brand_id}",
                timeout.as_secs()
            );
            None
        }
    }
}

/// Fetch both Shopify sections concurrently, each bounded by `timeout`.
pub async fn fetch_insights(
    analytics: &dyn ShopifyAnalytics,
    brand_id: &str,
    timeout: Duration,
) -> ShopifyInsights {
    let (geographic, repeat_customers) = tokio::join!(
        settle("geographic", brand_id, timeout, analytics.geographic(brand_id)),
        settle(
            "repeat customers",
            brand_id,
            timeout,
            analytics.repeat_customers(brand_id)
        ),
    );
    ShopifyInsights {
        geographic,
        repeat_customers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HttpShopifyAnalytics {
        HttpShopifyAnalytics::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn geographic_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(GEOGRAPHIC_PATH))
            .and(query_param("brandId", "b1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "regions": [
                    {"region": "California", "country": "US", "orders": 12, "revenue": 980.5},
                    {"region": "Ontario", "orders": 3, "revenue": 120.0}
                ],
                "totalOrders": 15
            })))
            .mount(&server)
            .await;

        let geo = client(&server).geographic("b1").await.unwrap();
        assert_eq!(geo.regions.len(), 2);
        assert_eq!(geo.total_orders, 15);
        assert_eq!(geo.top_region().unwrap().region, "California");
    }

    #[tokio::test]
    async fn server_error_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(REPEAT_CUSTOMERS_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client(&server).repeat_customers("b1").await.unwrap_err();
        match err {
            Error::Upstream { endpoint, message } => {
                assert_eq!(endpoint, REPEAT_CUSTOMERS_PATH);
                assert!(message.contains("500"), "message was {message}");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_insights_degrades_per_section() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(GEOGRAPHIC_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(REPEAT_CUSTOMERS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "totalCustomers": 200,
                "repeatCustomers": 50,
                "repeatRate": 25.0
            })))
            .mount(&server)
            .await;

        let insights = fetch_insights(&client(&server), "b1", Duration::from_secs(5)).await;
        assert!(insights.geographic.is_none());
        assert_eq!(insights.repeat_customers.unwrap().repeat_rate, 25.0);
    }

    #[tokio::test]
    async fn fetch_insights_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let insights = fetch_insights(&client(&server), "b1", Duration::from_millis(100)).await;
        assert_eq!(insights, ShopifyInsights::default());
    }
}
