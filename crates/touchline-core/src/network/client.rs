//! Authenticated client for the football-data API.
//!
//! Provides a wrapper around reqwest with:
//! - Proactive throttling through the shared [`RateLimiter`]
//! - Quota tracking from the upstream's response headers
//! - Typed error classification (transport, timeout, status, decode)
//! - Cancellation of both the rate-limit wait and the in-flight request
//!
//! No retries happen here; retrying immediately would spend the same budget
//! the limiter is protecting.

use crate::cancel::CancellationToken;
use crate::config::{RateLimit, UpstreamConfig};
use crate::error::{Result, SyncError};
use crate::models::{
    Competition, CompetitionsResponse, EntityType, Match, MatchesResponse, Standing, Team,
};
use crate::network::rate_limiter::RateLimiter;
use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Anything that can fetch raw upstream resources.
///
/// The scheduler depends on this seam rather than on [`UpstreamClient`]
/// directly.
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    /// Fetch the raw payload at `resource_path` (e.g. `/competitions/PL`).
    async fn fetch(&self, cancel: &CancellationToken, resource_path: &str) -> Result<Vec<u8>>;
}

/// Shared handle to an upstream source.
pub type DynUpstreamSource = Arc<dyn UpstreamSource>;

/// Quota state reported by the upstream's response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaState {
    /// Requests still available in the current minute.
    pub remaining: Option<u64>,
    /// Seconds until the upstream request counter resets.
    pub reset_in_secs: Option<u64>,
}

impl QuotaState {
    /// Whether the remaining budget is at or below the warning threshold.
    pub fn is_low(&self) -> bool {
        self.remaining
            .map(|r| r <= UpstreamConfig::LOW_QUOTA_THRESHOLD)
            .unwrap_or(false)
    }
}

/// Options for building an [`UpstreamClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub rate_limit: RateLimit,
}

impl ClientOptions {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: UpstreamConfig::BASE_URL.to_string(),
            timeout: UpstreamConfig::REQUEST_TIMEOUT,
            rate_limit: RateLimit::default(),
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = rate_limit;
        self
    }
}

/// Rate-limited, authenticated upstream client.
pub struct UpstreamClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
    limiter: Arc<RateLimiter>,
    quota_remaining: AtomicI64,
    quota_reset: AtomicI64,
}

impl UpstreamClient {
    /// Create a client with its own rate limiter.
    pub fn new(options: ClientOptions) -> Result<Self> {
        let limiter = Arc::new(RateLimiter::new(options.rate_limit));
        Self::with_limiter(options, limiter)
    }

    /// Create a client sharing an existing rate limiter.
    pub fn with_limiter(options: ClientOptions, limiter: Arc<RateLimiter>) -> Result<Self> {
        if options.api_key.trim().is_empty() {
            return Err(SyncError::Config {
                message: "upstream API key is empty".to_string(),
            });
        }
        url::Url::parse(&options.base_url).map_err(|e| SyncError::Config {
            message: format!("invalid upstream base URL {}: {}", options.base_url, e),
        })?;

        let client = Client::builder()
            .timeout(options.timeout)
            .user_agent(UpstreamConfig::USER_AGENT)
            .build()
            .map_err(|e| SyncError::Transport {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;

        Ok(Self {
            client,
            api_key: options.api_key,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            timeout: options.timeout,
            limiter,
            quota_remaining: AtomicI64::new(-1),
            quota_reset: AtomicI64::new(-1),
        })
    }

    /// The rate limiter gating this client.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Latest quota state seen in response headers.
    pub fn quota_state(&self) -> QuotaState {
        let load = |v: &AtomicI64| {
            let value = v.load(Ordering::SeqCst);
            if value >= 0 {
                Some(value as u64)
            } else {
                None
            }
        };
        QuotaState {
            remaining: load(&self.quota_remaining),
            reset_in_secs: load(&self.quota_reset),
        }
    }

    /// Fetch all competitions visible to the API key.
    pub async fn get_competitions(&self, cancel: &CancellationToken) -> Result<Vec<Competition>> {
        let response: CompetitionsResponse =
            self.fetch_json(cancel, "/competitions", "competitions").await?;
        Ok(response.competitions)
    }

    /// Fetch one competition by code (e.g. `PL`).
    pub async fn get_competition(
        &self,
        cancel: &CancellationToken,
        code: &str,
    ) -> Result<Competition> {
        let path = EntityType::Competition.resource_path(code);
        self.fetch_json(cancel, &path, "competition").await
    }

    /// Fetch one team by id.
    pub async fn get_team(&self, cancel: &CancellationToken, team_id: u64) -> Result<Team> {
        let path = EntityType::Team.resource_path(&team_id.to_string());
        self.fetch_json(cancel, &path, "team").await
    }

    /// Fetch all matches of a competition.
    pub async fn get_matches(&self, cancel: &CancellationToken, code: &str) -> Result<Vec<Match>> {
        let path = EntityType::Matches.resource_path(code);
        let response: MatchesResponse = self.fetch_json(cancel, &path, "matches").await?;
        Ok(response.matches)
    }

    /// Fetch the current standings of a competition.
    pub async fn get_standings(&self, cancel: &CancellationToken, code: &str) -> Result<Standing> {
        let path = EntityType::Standings.resource_path(code);
        self.fetch_json(cancel, &path, "standings").await
    }

    /// Fetch head-to-head statistics for a match.
    pub async fn get_head_to_head(
        &self,
        cancel: &CancellationToken,
        match_id: u64,
    ) -> Result<serde_json::Value> {
        let path = EntityType::HeadToHead.resource_path(&match_id.to_string());
        self.fetch_json(cancel, &path, "head2head").await
    }

    /// Check if an HTTP status code indicates a transient failure.
    pub fn is_retryable_status(status: StatusCode) -> bool {
        matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
    }

    /// Check if an HTTP status code indicates a permanent failure.
    pub fn is_permanent_failure(status: StatusCode) -> bool {
        matches!(status.as_u16(), 400 | 401 | 403 | 404)
    }

    // Internal methods

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        path: &str,
        what: &str,
    ) -> Result<T> {
        let body = self.fetch(cancel, path).await?;
        serde_json::from_slice(&body).map_err(|e| SyncError::decode(what, e))
    }

    fn url_for(&self, resource_path: &str) -> String {
        if resource_path.starts_with('/') {
            format!("{}{}", self.base_url, resource_path)
        } else {
            format!("{}/{}", self.base_url, resource_path)
        }
    }

    async fn send(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .header(UpstreamConfig::AUTH_HEADER, &self.api_key)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        self.update_quota(&response);
        self.check_response_status(response, url).await
    }

    fn transport_error(&self, url: &str, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::Timeout(self.timeout)
        } else {
            SyncError::Transport {
                message: format!("GET {} failed: {}", url, err),
                source: Some(err),
            }
        }
    }

    fn update_quota(&self, response: &Response) {
        let headers = response.headers();
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<i64>().ok())
        };

        if let Some(remaining) = read("X-Requests-Available-Minute") {
            self.quota_remaining.store(remaining, Ordering::SeqCst);
        }
        if let Some(reset) = read("X-RequestCounter-Reset") {
            self.quota_reset.store(reset, Ordering::SeqCst);
        }

        let state = self.quota_state();
        if state.is_low() {
            warn!(
                "Upstream quota nearly exhausted (remaining: {:?}, resets in {:?}s)",
                state.remaining, state.reset_in_secs
            );
        } else if let Some(remaining) = state.remaining {
            debug!("Upstream quota remaining: {}", remaining);
        }
    }

    async fn check_response_status(&self, response: Response, url: &str) -> Result<Vec<u8>> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        if status.is_success() {
            return Ok(body.to_vec());
        }

        let body = String::from_utf8_lossy(&body).into_owned();
        warn!("GET {} returned {}", url, status);
        Err(SyncError::UpstreamStatus {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl UpstreamSource for UpstreamClient {
    async fn fetch(&self, cancel: &CancellationToken, resource_path: &str) -> Result<Vec<u8>> {
        cancel.check()?;
        self.limiter.acquire_cancellable(cancel).await?;

        let url = self.url_for(resource_path);
        debug!("GET {}", url);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SyncError::Cancelled),
            result = self.send(&url) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_client(server: &MockServer) -> UpstreamClient {
        let options = ClientOptions::new("test-key")
            .base_url(server.uri())
            .timeout(Duration::from_secs(5))
            .rate_limit(RateLimit::new(1000, Duration::from_secs(1)));
        UpstreamClient::new(options).unwrap()
    }

    #[test]
    fn test_quota_state_low() {
        let state = QuotaState {
            remaining: Some(1),
            reset_in_secs: Some(30),
        };
        assert!(state.is_low());
        assert!(!QuotaState::default().is_low());
    }

    #[test]
    fn test_rejects_empty_api_key() {
        let result = UpstreamClient::new(ClientOptions::new("  "));
        assert!(matches!(result, Err(SyncError::Config { .. })));
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let result = UpstreamClient::new(ClientOptions::new("key").base_url("not a url"));
        assert!(matches!(result, Err(SyncError::Config { .. })));
    }

    #[test]
    fn test_retryable_status_codes() {
        assert!(UpstreamClient::is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(UpstreamClient::is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!UpstreamClient::is_retryable_status(StatusCode::NOT_FOUND));
        assert!(UpstreamClient::is_permanent_failure(StatusCode::FORBIDDEN));
        assert!(!UpstreamClient::is_permanent_failure(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[tokio::test]
    async fn test_fetch_sends_auth_header_and_records_quota() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/competitions/PL"))
            .and(header_eq("X-Auth-Token", "test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Requests-Available-Minute", "7")
                    .insert_header("X-RequestCounter-Reset", "42")
                    .set_body_string(r#"{"id": 2021, "name": "Premier League", "code": "PL"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let cancel = CancellationToken::new();
        let comp = client.get_competition(&cancel, "PL").await.unwrap();

        assert_eq!(comp.id, 2021);
        assert_eq!(
            client.quota_state(),
            QuotaState {
                remaining: Some(7),
                reset_in_secs: Some(42)
            }
        );
    }

    #[tokio::test]
    async fn test_non_success_status_carries_code_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/teams/1"))
            .respond_with(ResponseTemplate::new(403).set_body_string("restricted resource"))
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let err = client
            .fetch(&CancellationToken::new(), "/teams/1")
            .await
            .unwrap_err();

        match err {
            SyncError::UpstreamStatus { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "restricted resource");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_payload_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/competitions/PL/standings"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"standings\": 3"))
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let err = client
            .get_standings(&CancellationToken::new(), "PL")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let client = UpstreamClient::new(
            ClientOptions::new("key")
                .base_url("http://127.0.0.1:1")
                .timeout(Duration::from_secs(2)),
        )
        .unwrap();

        let err = client
            .fetch(&CancellationToken::new(), "/competitions")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Transport { .. } | SyncError::Timeout(_)
        ));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_request_timeout_reports_configured_duration() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{}")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = UpstreamClient::new(
            ClientOptions::new("key")
                .base_url(server.uri())
                .timeout(Duration::from_millis(200)),
        )
        .unwrap();

        let err = client
            .fetch(&CancellationToken::new(), "/competitions")
            .await
            .unwrap_err();
        match err {
            SyncError::Timeout(after) => assert_eq!(after, Duration::from_millis(200)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(0)
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client.fetch(&cancel, "/competitions").await.unwrap_err();
        assert!(matches!(err, SyncError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_aborts_slow_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{}")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let cancel = CancellationToken::new();
        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                cancel.cancel();
            })
        };

        let err = client.fetch(&cancel, "/competitions").await.unwrap_err();
        assert!(matches!(err, SyncError::Cancelled));
        canceller.await.unwrap();
    }
}
