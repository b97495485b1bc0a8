use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::histogram;
use reqwest::{Client, Url};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use super::{FetchError, FetchRequest, Fetcher};

const METRIC_FETCH_MS: &str = "letterbox_fetch_ms";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct FetcherOptions {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetcherOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: HttpFetcher::default_user_agent().to_string(),
        }
    }
}

/// reqwest-backed [`Fetcher`] rooted at the API base URL.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: Client,
    base: Url,
}

impl HttpFetcher {
    pub fn new(base_url: &str, options: FetcherOptions) -> Result<Self, FetchError> {
        let mut base =
            Url::parse(base_url).map_err(|err| FetchError::invalid_request(err.to_string()))?;
        // Targets are joined relative to the base, so a path prefix must end in '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder()
            .user_agent(options.user_agent)
            .timeout(options.timeout)
            .build()?;
        Ok(Self { client, base })
    }

    pub fn default_user_agent() -> &'static str {
        concat!("letterbox/", env!("CARGO_PKG_VERSION"))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn url(&self, target: &str) -> Result<Url, FetchError> {
        self.base
            .join(target.trim_start_matches('/'))
            .map_err(|err| FetchError::invalid_request(format!("{target}: {err}")))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self, request), fields(method = %request.method, target = %request.target))]
    async fn request(&self, request: FetchRequest) -> Result<Value, FetchError> {
        let url = self.url(&request.target)?;
        let method_label = request.method.to_string();

        let mut builder = self.client.request(request.method, url);
        if let Some(token) = request.token.as_deref() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = request.body.as_ref() {
            builder = builder.json(body);
        }

        let started_at = Instant::now();
        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_FETCH_MS, "method" => method_label).record(elapsed_ms);

        debug!(status = status.as_u16(), elapsed_ms, "API request settled");

        if !status.is_success() {
            return Err(FetchError::from_response(status.as_u16(), &bytes));
        }
        decode_body(&bytes)
    }
}

fn decode_body(bytes: &[u8]) -> Result<Value, FetchError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(bytes).map_err(|err| FetchError::parse(err.to_string()))
}
