//! Webhook notification: POST a score summary after a run.

use crate::audit::report::AuditReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPillars {
    pub bot_access: f64,
    pub llms_file: f64,
    pub content: f64,
    pub structured_data: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub url: String,
    pub overall_score: f64,
    pub pillars: WebhookPillars,
    pub context_waste_pct: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub regression: bool,
}

pub fn build_webhook_payload(report: &AuditReport, regression: bool) -> WebhookPayload {
    WebhookPayload {
        url: report.url.clone(),
        overall_score: report.overall_score,
        pillars: WebhookPillars {
            bot_access: report.bot_access.pillar.score,
            llms_file: report.llms_file.pillar.score,
            content: report.content.score,
            structured_data: report.structured_data.score,
        },
        context_waste_pct: report.context_waste_pct,
        timestamp: report.started_at,
        regression,
    }
}

/// Best-effort POST. Returns whether the endpoint accepted the payload;
/// failures are logged and never propagated.
pub async fn send_webhook(url: &str, payload: &WebhookPayload) -> bool {
    let client = reqwest::Client::new();
    let result = client
        .post(url)
        .json(payload)
        .timeout(WEBHOOK_TIMEOUT)
        .send()
        .await;
    match result {
        Ok(resp) if resp.status().is_success() => {
            debug!(url, status = resp.status().as_u16(), "webhook delivered");
            true
        }
        Ok(resp) => {
            warn!(url, status = resp.status().as_u16(), "webhook rejected");
            false
        }
        Err(e) => {
            warn!(url, error = %e, "webhook delivery failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::report::tests::sample_report;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_payload_shape() {
        let report = sample_report();
        let payload = build_webhook_payload(&report, true);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["url"], "https://example.com/");
        assert_eq!(json["overall_score"], 55.5);
        assert_eq!(json["pillars"]["bot_access"], 12.5);
        assert_eq!(json["context_waste_pct"], 75.0);
        assert_eq!(json["regression"], true);
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_send_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(serde_json::json!({"regression": false})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let payload = build_webhook_payload(&sample_report(), false);
        assert!(send_webhook(&format!("{}/hook", server.uri()), &payload).await);
    }

    #[tokio::test]
    async fn test_send_webhook_failure_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let payload = build_webhook_payload(&sample_report(), false);
        assert!(!send_webhook(&server.uri(), &payload).await);
        assert!(!send_webhook("http://127.0.0.1:1/hook", &payload).await);
    }
}
