use std::sync::Arc;
use std::time::Duration;

use adpulse::llm::SummaryWriter;
use adpulse::report::FixedVariant;
use adpulse::shopify::HttpShopifyAnalytics;
use adpulse::{AdPulse, Config, Database, FixedClock, RateLimiter};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BRAND: &str = "brand-1";
const USER: &str = "user-1";

fn snapshot(shopify: bool) -> adpulse::models::Snapshot {
    let mut connections = vec![json!({
        "brand_id": BRAND, "platform_type": "meta", "status": "active", "account_id": "act_1"
    })];
    if shopify {
        connections.push(json!({
            "brand_id": BRAND, "platform_type": "shopify", "status": "active"
        }));
    }

    let daily_stats: Vec<Value> = (4..=10)
        .map(|day| {
            json!({
                "brand_id": BRAND, "campaign_id": "c1", "date": format!("2025-03-{day:02}"),
                "spend": 100.0, "impressions": 10000, "clicks": 200, "conversions": 8, "revenue": 400.0
            })
        })
        .collect();

    serde_json::from_value(json!({
        "brands": [
            {"brand_id": BRAND, "name": "Acme", "members": [USER]},
            {"brand_id": "brand-2", "name": "Other", "members": ["user-2"]}
        ],
        "connections": connections,
        "campaigns": [
            {"campaign_id": "c1", "brand_id": BRAND, "name": "Evergreen", "status": "ACTIVE",
             "spend_14d": 1400.0, "impressions_14d": 140000, "clicks_14d": 2800,
             "conversions_14d": 112, "revenue_14d": 5600.0},
            {"campaign_id": "c2", "brand_id": BRAND, "name": "Spring Sale", "status": "PAUSED"}
        ],
        "ad_insights": [
            {"brand_id": BRAND, "campaign_id": "c1", "ad_id": "ad-1", "date": "2025-03-10",
             "spend": 100.0, "impressions": 10000, "clicks": 200, "conversions": 8, "revenue": 400.0}
        ],
        "daily_stats": daily_stats
    }))
    .unwrap()
}

struct Harness {
    app: Arc<AdPulse>,
    router: Router,
    token: String,
}

async fn harness_with(shopify: bool, configure: impl FnOnce(AdPulse) -> AdPulse) -> Harness {
    let db = Database::open_memory().await.unwrap();
    let app = AdPulse::new(db, Config::default())
        .unwrap()
        .with_clock(Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2025, 3, 10, 14, 5, 0).unwrap(),
        )))
        .with_selector(Arc::new(FixedVariant(0)));
    let app = configure(app);
    app.import_snapshot(snapshot(shopify)).await.unwrap();

    let token = adpulse::auth::create_session(app.db(), USER, chrono::Duration::hours(1))
        .await
        .unwrap();
    let app = Arc::new(app);
    Harness {
        router: adpulse::server::router(app.clone()),
        app,
        token,
    }
}

async fn harness() -> Harness {
    harness_with(false, |app| app).await
}

impl Harness {
    async fn post(&self, body: Value) -> (StatusCode, axum::http::HeaderMap, Value) {
        self.post_raw(Some(&self.token), body.to_string()).await
    }

    async fn post_raw(
        &self,
        token: Option<&str>,
        body: String,
    ) -> (StatusCode, axum::http::HeaderMap, Value) {
        let mut request = Request::builder()
            .method("POST")
            .uri("/api/ai/daily-report")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = self
            .router
            .clone()
            .oneshot(request.body(Body::from(body)).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, value)
    }
}

#[tokio::test]
async fn test_health() {
    let h = harness().await;
    let response = h
        .router
        .clone()
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_generates_report() {
    let h = harness().await;
    let (status, _, body) = h.post(json!({"brandId": BRAND})).await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["cached"], false);
    assert_eq!(body["timestamp"], "2025-03-10T14:05:00Z");

    let report = &body["report"];
    assert_eq!(report["brandId"], BRAND);
    assert_eq!(report["date"], "2025-03-10");
    assert_eq!(report["hour"], 14);
    assert_eq!(report["health"], "excellent");
    assert_eq!(report["analysis"]["todayStats"]["spend"], 100.0);
    assert_eq!(report["analysis"]["weekly"]["source"], "real");
    assert_eq!(report["analysis"]["weekly"]["points"].as_array().unwrap().len(), 7);
    assert!(report["aiSummary"].is_null());
    assert_eq!(report["dataHash"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn test_second_call_in_same_hour_is_cached() {
    let h = harness().await;
    let (_, _, first) = h.post(json!({"brandId": BRAND})).await;
    let (status, _, second) = h.post(json!({"brandId": BRAND})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["cached"], false);
    assert_eq!(second["cached"], true);
    assert_eq!(first["report"], second["report"]);
}

#[tokio::test]
async fn test_cache_write_failure_still_returns_report() {
    let h = harness().await;
    h.app
        .db()
        .writer()
        .call(|conn| conn.execute_batch("DROP TABLE ai_daily_reports_cache"))
        .await
        .unwrap();

    let (status, _, first) = h.post(json!({"brandId": BRAND})).await;
    assert_eq!(status, StatusCode::OK, "body: {first}");
    assert_eq!(first["success"], true);
    assert_eq!(first["cached"], false);
    assert_eq!(first["report"]["brandId"], BRAND);

    let (status, _, second) = h.post(json!({"brandId": BRAND})).await;
    assert_eq!(status, StatusCode::OK, "body: {second}");
    assert_eq!(second["cached"], false);
    assert_eq!(first["report"]["dataHash"], second["report"]["dataHash"]);
}

#[tokio::test]
async fn test_force_regenerate_bypasses_cache() {
    let h = harness().await;
    let (_, _, first) = h.post(json!({"brandId": BRAND})).await;
    let (_, _, forced) = h
        .post(json!({"brandId": BRAND, "forceRegenerate": true}))
        .await;
    let (_, _, after) = h.post(json!({"brandId": BRAND})).await;

    assert_eq!(first["cached"], false);
    assert_eq!(forced["cached"], false);
    assert_eq!(after["cached"], true);
}

#[tokio::test]
async fn test_data_change_invalidates_cache() {
    let h = harness().await;
    let (_, _, first) = h.post(json!({"brandId": BRAND})).await;

    let more: adpulse::models::Snapshot = serde_json::from_value(json!({
        "ad_insights": [
            {"brand_id": BRAND, "campaign_id": "c1", "ad_id": "ad-2", "date": "2025-03-10",
             "spend": 0.01, "impressions": 0, "clicks": 0, "conversions": 0, "revenue": 0.0}
        ]
    }))
    .unwrap();
    h.app.import_snapshot(more).await.unwrap();

    let (_, _, second) = h.post(json!({"brandId": BRAND})).await;
    assert_eq!(second["cached"], false);
    assert_ne!(first["report"]["dataHash"], second["report"]["dataHash"]);
}

#[tokio::test]
async fn test_timezone_changes_local_date() {
    let h = harness().await;
    let (status, _, body) = h
        .post(json!({"brandId": BRAND, "userTimezone": "Asia/Tokyo"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    // 14:05 UTC is 23:05 in Tokyo.
    assert_eq!(body["report"]["hour"], 23);
    assert_eq!(body["report"]["timezone"], "Asia/Tokyo");
}

#[tokio::test]
async fn test_shopify_failure_degrades_section() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(adpulse::shopify::GEOGRAPHIC_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(adpulse::shopify::REPEAT_CUSTOMERS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalCustomers": 40, "repeatCustomers": 10, "repeatRate": 25.0
        })))
        .mount(&server)
        .await;

    let shopify = HttpShopifyAnalytics::new(&server.uri(), Duration::from_secs(5)).unwrap();
    let h = harness_with(true, |app| app.with_shopify(Arc::new(shopify))).await;

    let (status, _, body) = h.post(json!({"brandId": BRAND})).await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    let shopify = &body["report"]["analysis"]["shopify"];
    assert!(shopify["geographic"].is_null());
    assert_eq!(shopify["repeatCustomers"]["repeatRate"], 25.0);
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let h = harness().await;
    let (status, _, body) = h
        .post_raw(None, json!({"brandId": BRAND}).to_string())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
    assert!(body["details"].is_string());

    let (status, _, _) = h
        .post_raw(Some("not-a-session"), json!({"brandId": BRAND}).to_string())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_requests_are_bad_request() {
    let h = harness().await;

    let (status, _, body) = h.post(json!({"brandId": "  "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request");

    let (status, _, _) = h
        .post(json!({"brandId": BRAND, "userTimezone": "Mars/Olympus"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = h.post_raw(Some(&h.token), "{not json".into()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_other_brand_is_not_found() {
    let h = harness().await;
    let (status, _, _) = h.post(json!({"brandId": "brand-2"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = h.post(json!({"brandId": "missing"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rate_limit() {
    let h = harness_with(false, |app| {
        app.with_rate_limiter(Arc::new(RateLimiter::new(2, Duration::from_secs(60))))
    })
    .await;

    for _ in 0..2 {
        let (status, _, _) = h.post(json!({"brandId": BRAND})).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, headers, body) = h.post(json!({"brandId": BRAND})).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "Too many requests");
    let retry_after: u64 = headers[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
    assert!((1..=60).contains(&retry_after));
}

struct FailingWriter;

#[async_trait]
impl SummaryWriter for FailingWriter {
    fn describe(&self) -> String {
        "test/failing".into()
    }

    async fn write_summary(&self, _prompt: &str) -> adpulse::Result<String> {
        Err(adpulse::Error::Llm("provider unavailable".into()))
    }
}

#[tokio::test]
async fn test_llm_failure_is_server_error_and_not_cached() {
    let h = harness_with(false, |app| app.with_writer(Some(Arc::new(FailingWriter)))).await;
    let (status, _, body) = h.post(json!({"brandId": BRAND})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["details"].as_str().unwrap().contains("provider unavailable"));

    let cached = adpulse::report::cache::get(h.app.db(), BRAND, USER).await.unwrap();
    assert!(cached.is_none());
}

struct CannedWriter;

#[async_trait]
impl SummaryWriter for CannedWriter {
    fn describe(&self) -> String {
        "test/canned".into()
    }

    async fn write_summary(&self, prompt: &str) -> adpulse::Result<String> {
        assert!(prompt.contains(BRAND));
        Ok("```json\n{\"executiveSummary\":\"Strong day.\",\"keyActions\":[\"Scale Evergreen\"]}\n```".into())
    }
}

#[tokio::test]
async fn test_llm_summary_included() {
    let h = harness_with(false, |app| app.with_writer(Some(Arc::new(CannedWriter)))).await;
    let (status, _, body) = h.post(json!({"brandId": BRAND})).await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    let ai = &body["report"]["aiSummary"];
    assert_eq!(ai["executiveSummary"], "Strong day.");
    assert_eq!(ai["keyActions"][0], "Scale Evergreen");
    assert_eq!(ai["model"], "test/canned");
}
