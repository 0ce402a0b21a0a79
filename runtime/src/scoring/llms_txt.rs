//! LLM-instructions file pillar: `/llms.txt`, `/.well-known/llms.txt`, `/llms-full.txt`.

use super::{PillarScore, LLMS_FILE_MAX};
use crate::acquisition::http_client::HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Probed in order; the first non-empty 200 wins.
pub const LLMS_PATHS: &[&str] = &["/llms.txt", "/.well-known/llms.txt"];
pub const LLMS_FULL_PATH: &str = "/llms-full.txt";

/// Outcome of probing a site for instruction files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmsFileReport {
    /// URL of the `llms.txt` that was found.
    pub found_url: Option<String>,
    pub llms_full_url: Option<String>,
}

impl LlmsFileReport {
    pub fn present(&self) -> bool {
        self.found_url.is_some() || self.llms_full_url.is_some()
    }
}

/// Probe `origin` (`scheme://host[:port]`) for instruction files.
pub async fn probe_llms_files(client: &HttpClient, origin: &str, timeout: Duration) -> LlmsFileReport {
    let origin = origin.trim_end_matches('/');
    let primary = async {
        for path in LLMS_PATHS {
            let url = format!("{origin}{path}");
            if probe(client, &url, timeout).await {
                return Some(url);
            }
        }
        None
    };
    let full_url = format!("{origin}{LLMS_FULL_PATH}");
    let full = async {
        probe(client, &full_url, timeout)
            .await
            .then(|| full_url.clone())
    };

    let (found_url, llms_full_url) = futures::join!(primary, full);
    LlmsFileReport {
        found_url,
        llms_full_url,
    }
}

/// A 200 with a non-blank body.
async fn probe(client: &HttpClient, url: &str, timeout: Duration) -> bool {
    match client.get(url, timeout).await {
        Ok(resp) => resp.status == 200 && !resp.body.trim().is_empty(),
        Err(e) => {
            debug!(url, error = %e, "llms file probe failed");
            false
        }
    }
}

pub fn score_llms_file(report: &LlmsFileReport) -> PillarScore {
    let detail = match (&report.found_url, &report.llms_full_url) {
        (Some(url), Some(_)) => format!("found at {url} (llms-full.txt also present)"),
        (Some(url), None) => format!("found at {url}"),
        (None, Some(full)) => format!("llms-full.txt found at {full}"),
        (None, None) => "llms.txt not found".to_string(),
    };
    let points = if report.present() { LLMS_FILE_MAX } else { 0.0 };
    PillarScore::new("llms_file", points, LLMS_FILE_MAX, detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::http_client::RetryPolicy;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> HttpClient {
        HttpClient::new(
            "ctxlint-test",
            RetryPolicy {
                max_attempts: 1,
                ..RetryPolicy::default()
            },
        )
        .unwrap()
    }

    async fn serve(server: &MockServer, at: &str, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_well_known_fallback() {
        let server = MockServer::start().await;
        serve(&server, "/llms.txt", 404, "").await;
        serve(&server, "/.well-known/llms.txt", 200, "# Site\n> summary\n").await;
        serve(&server, "/llms-full.txt", 404, "").await;

        let report = probe_llms_files(&client(), &server.uri(), Duration::from_secs(5)).await;
        assert_eq!(
            report.found_url,
            Some(format!("{}/.well-known/llms.txt", server.uri()))
        );
        assert_eq!(score_llms_file(&report).score, 10.0);
    }

    #[tokio::test]
    async fn test_blank_body_does_not_count() {
        let server = MockServer::start().await;
        serve(&server, "/llms.txt", 200, "   \n").await;
        serve(&server, "/.well-known/llms.txt", 404, "").await;
        serve(&server, "/llms-full.txt", 404, "").await;

        let report = probe_llms_files(&client(), &server.uri(), Duration::from_secs(5)).await;
        assert!(!report.present());
        assert_eq!(score_llms_file(&report).score, 0.0);
    }

    #[tokio::test]
    async fn test_llms_full_alone_qualifies() {
        let server = MockServer::start().await;
        serve(&server, "/llms-full.txt", 200, "full docs").await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let report = probe_llms_files(&client(), &server.uri(), Duration::from_secs(5)).await;
        assert!(report.found_url.is_none());
        assert!(report.present());
        assert_eq!(score_llms_file(&report).score, 10.0);
    }
}
