use std::time::{Duration, Instant};

use anyhow::Result;

use crate::source::{Method, SourceSpec};

// Rotated per request so repeated cycles do not present one fingerprint.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:124.0) Gecko/20100101 Firefox/124.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
];

pub fn pick_user_agent() -> &'static str {
    USER_AGENTS[fastrand::usize(..USER_AGENTS.len())]
}

/// Outcome of one transport call. Failures travel in-band (error string,
/// non-200 status) so the orchestrator advances instead of unwinding.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub url: String,
    pub status: Option<u16>,
    pub body: String,
    pub error: Option<String>,
    pub latency_ms: u128,
}

impl FetchOutcome {
    /// Usable only when the call connected and came back 200.
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.status == Some(200)
    }
}

/// The single asynchronous boundary of the pipeline. One call is in flight
/// at any time; a timeout is surfaced like any other transport error.
pub trait Transport {
    async fn fetch(&self, spec: &SourceSpec, url: &str) -> FetchOutcome;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn fetch(&self, spec: &SourceSpec, url: &str) -> FetchOutcome {
        let request = match spec.method {
            Method::Get => self.client.get(url),
            // POST sources send their static form body against the bare path
            Method::Post => {
                let base = url.split('?').next().unwrap_or(url);
                self.client.post(base).form(&spec.form)
            }
        };

        let start = Instant::now();
        let response = request
            .header(reqwest::header::USER_AGENT, pick_user_agent())
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status().as_u16();
                match resp.text().await {
                    Ok(body) => FetchOutcome {
                        url: url.to_string(),
                        status: Some(status),
                        body,
                        error: None,
                        latency_ms: start.elapsed().as_millis(),
                    },
                    Err(e) => FetchOutcome {
                        url: url.to_string(),
                        status: Some(status),
                        body: String::new(),
                        error: Some(e.to_string()),
                        latency_ms: start.elapsed().as_millis(),
                    },
                }
            }
            Err(e) => FetchOutcome {
                url: url.to_string(),
                status: None,
                body: String::new(),
                error: Some(e.to_string()),
                latency_ms: start.elapsed().as_millis(),
            },
        }
    }
}
