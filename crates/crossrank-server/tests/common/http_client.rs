//! Typed `reqwest` client for the crossrank HTTP API.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);
const CACHE_HEADER: &str = "x-crossrank-cache";

#[derive(Clone)]
pub struct TestClient {
    http: reqwest::Client,
    base_url: String,
}

impl TestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(CLIENT_TIMEOUT)
            .build()
            .expect("reqwest client");

        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// `POST /rerank`. Returns the ranking and the `X-Crossrank-Cache` value.
    pub async fn rerank(
        &self,
        body: &serde_json::Value,
    ) -> Result<(RerankResponse, String), TestClientError> {
        let resp = self
            .http
            .post(self.endpoint("/rerank"))
            .json(body)
            .send()
            .await?;

        let cache = resp
            .headers()
            .get(CACHE_HEADER)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("missing")
            .to_owned();

        match resp.status().as_u16() {
            200 => Ok((resp.json().await?, cache)),
            400 => Err(TestClientError::BadRequest(resp.json().await?)),
            code => Err(TestClientError::Status {
                code,
                body: resp.text().await.unwrap_or_default(),
            }),
        }
    }

    pub async fn health(&self) -> Result<HealthResponse, TestClientError> {
        self.get_json("/health").await
    }

    /// `GET /ready` with its status code; a 503 still carries a report.
    pub async fn ready(&self) -> Result<(u16, ReadyResponse), TestClientError> {
        let resp = self.http.get(self.endpoint("/ready")).send().await?;
        let code = resp.status().as_u16();
        Ok((code, resp.json().await?))
    }

    pub async fn metrics(&self) -> Result<serde_json::Value, TestClientError> {
        self.get_json("/metrics").await
    }

    pub async fn prometheus(&self) -> Result<String, TestClientError> {
        let resp = self
            .http
            .get(self.endpoint("/metrics/prometheus"))
            .send()
            .await?;
        Ok(resp.text().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, TestClientError> {
        let resp = self.http.get(self.endpoint(path)).send().await?;
        if !resp.status().is_success() {
            return Err(TestClientError::Status {
                code: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(resp.json().await?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankedDocument {
    pub index: usize,
    pub score: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RerankResponse {
    pub rankings: Vec<RankedDocument>,
    pub top_k_applied: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: u16,
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadyResponse {
    pub status: String,
    pub ready: bool,
    pub model_state: String,
    pub preload: bool,
    pub model: String,
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
}

impl ReadyResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TestClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("400: {0:?}")]
    BadRequest(ErrorBody),

    #[error("unexpected status {code}: {body}")]
    Status { code: u16, body: String },
}
