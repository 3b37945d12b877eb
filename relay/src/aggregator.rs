//! Stock aggregation.
//!
//! [`StockAggregator`] fans out to the six upstream feeds and folds the
//! results into a [`StockReport`]. It never fails: any feed error is logged
//! and turned into the error report, so callers always get something to
//! deliver.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error};

use crate::feeds::StockApiClient;
use crate::report::StockReport;

/// Something that can produce a fresh stock report on demand.
///
/// Tracking sessions depend on this trait rather than on the HTTP client so
/// they can be driven by any report producer.
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Produces a report. Never fails; errors become the error report.
    async fn produce_report(&self) -> StockReport;
}

/// Aggregates the upstream feeds into a single report.
#[derive(Debug, Clone)]
pub struct StockAggregator {
    client: StockApiClient,
}

impl StockAggregator {
    /// Creates an aggregator over the given feed client.
    pub fn new(client: StockApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReportSource for StockAggregator {
    async fn produce_report(&self) -> StockReport {
        match self.client.fetch_all().await {
            Ok(feeds) => {
                debug!("All feeds fetched, building stock report");
                StockReport::from_feeds(&feeds, Utc::now())
            }
            Err(err) => {
                error!(error = %err, "Error fetching stock data");
                StockReport::unavailable(Utc::now())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::FeedEndpoints;
    use crate::report::StockSections;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_json(
        server: &MockServer,
        route: &str,
        kind: Option<&str>,
        body: serde_json::Value,
    ) {
        let mut mock = Mock::given(method("GET")).and(path(route));
        if let Some(kind) = kind {
            mock = mock.and(query_param("type", kind));
        }
        mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_all_feeds(server: &MockServer) {
        let updated_at = Utc::now().timestamp_millis();
        mount_json(
            server,
            "/api/stock",
            Some("gear-seeds"),
            json!({"gear": ["Trowel"], "seeds": ["Carrot **x3**"], "updatedAt": updated_at}),
        )
        .await;
        mount_json(
            server,
            "/api/stock",
            Some("egg"),
            json!({"egg": ["Bug Egg"], "updatedAt": updated_at}),
        )
        .await;
        mount_json(
            server,
            "/api/stock/weather",
            None,
            json!({"icon": "☀️", "currentWeather": "Sunny", "cropBonuses": "Shocked"}),
        )
        .await;
        mount_json(
            server,
            "/api/stocks",
            Some("honeyStock"),
            json!({"honeyStock": [{"name": "Bee Crate", "value": 1}]}),
        )
        .await;
        mount_json(
            server,
            "/api/special-stock",
            Some("cosmetics"),
            json!({"cosmetics": ["Lamp"], "updatedAt": updated_at}),
        )
        .await;
        mount_json(
            server,
            "/api/stocks",
            Some("seedsStock"),
            json!({"seedsStock": [{"name": "carrot", "emoji": "🥕"}]}),
        )
        .await;
    }

    fn aggregator(server: &MockServer) -> StockAggregator {
        let client = StockApiClient::new(FeedEndpoints::single(server.uri()), None)
            .expect("failed to create client");
        StockAggregator::new(client)
    }

    fn sections(report: &StockReport) -> &StockSections {
        match report {
            StockReport::Stock { sections, .. } => sections,
            StockReport::Unavailable { .. } => panic!("expected stock report, got {report:?}"),
        }
    }

    #[tokio::test]
    async fn produces_stock_report_when_all_feeds_answer() {
        let server = MockServer::start().await;
        mount_all_feeds(&server).await;

        let report = aggregator(&server).produce_report().await;
        let sections = sections(&report);

        assert_eq!(sections.gear, "• Trowel");
        assert_eq!(sections.seeds, "• 🥕 Carrot **x3**");
        assert_eq!(sections.eggs, "• Bug Egg");
        assert_eq!(sections.honey, "• Bee Crate: 1");
        assert_eq!(sections.cosmetics, "• Lamp");
        assert_eq!(sections.weather, "☀️ Sunny");
        assert_eq!(sections.crop_bonus, "Shocked");
    }

    #[tokio::test]
    async fn issues_one_request_per_feed() {
        let server = MockServer::start().await;
        mount_all_feeds(&server).await;

        aggregator(&server).produce_report().await;

        let requests = server.received_requests().await.expect("recording enabled");
        assert_eq!(requests.len(), 6);
    }

    #[tokio::test]
    async fn single_failing_feed_yields_error_report() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/stocks"))
            .and(query_param("type", "honeyStock"))
            .respond_with(ResponseTemplate::new(500))
            .with_priority(1)
            .mount(&server)
            .await;
        mount_all_feeds(&server).await;

        let report = aggregator(&server).produce_report().await;

        assert!(report.is_unavailable());
        let text = report.to_string();
        assert!(!text.contains("Trowel"));
        assert!(!text.contains("Bug Egg"));
    }

    #[tokio::test]
    async fn malformed_body_yields_error_report() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/stock/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .with_priority(1)
            .mount(&server)
            .await;
        mount_all_feeds(&server).await;

        let report = aggregator(&server).produce_report().await;
        assert!(report.is_unavailable());
    }

    #[tokio::test]
    async fn unreachable_host_yields_error_report() {
        let client = StockApiClient::new(FeedEndpoints::single("http://127.0.0.1:1"), None)
            .expect("failed to create client");

        let report = StockAggregator::new(client).produce_report().await;
        assert!(report.is_unavailable());
    }
}
