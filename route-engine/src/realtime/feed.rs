//! Realtime overlay feeds.
//!
//! An `OverlayFeed` produces a fresh [`RealtimeOverlay`] for an agency.
//! [`HttpOverlayFeed`] polls a JSON endpoint; [`StaticOverlayFeed`] serves
//! overlays held in memory, for tests and offline runs.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::RwLock;

use crate::domain::{AgencyId, Timestamp, TripId};

use super::{RealtimeOverlay, TripStatus};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Errors from fetching an overlay.
#[derive(Debug)]
pub enum FeedError {
    /// HTTP request failed (network error, timeout, etc.)
    Http(reqwest::Error),

    /// Payload could not be parsed
    Json {
        message: String,
        body: Option<String>,
    },

    /// Feed returned an error status code
    ApiError { status: u16, message: String },

    /// Invalid API key or unauthorized
    Unauthorized,

    /// No feed for this agency
    UnknownAgency(AgencyId),
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::Http(e) => write!(f, "HTTP error: {e}"),
            FeedError::Json { message, body } => {
                write!(f, "JSON parse error: {message}")?;
                if let Some(body) = body {
                    write!(f, " (body: {body})")?;
                }
                Ok(())
            }
            FeedError::ApiError { status, message } => {
                write!(f, "feed error {status}: {message}")
            }
            FeedError::Unauthorized => write!(f, "unauthorized (invalid API key)"),
            FeedError::UnknownAgency(agency) => write!(f, "no realtime feed for agency {agency}"),
        }
    }
}

impl std::error::Error for FeedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FeedError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        FeedError::Http(err)
    }
}

/// Source of realtime overlays.
pub trait OverlayFeed: Send + Sync {
    /// Fetch the current overlay for `agency`.
    fn fetch_overlay(
        &self,
        agency: &AgencyId,
    ) -> impl Future<Output = Result<RealtimeOverlay, FeedError>> + Send;
}

/// Wire format of a feed response.
#[derive(Debug, Deserialize)]
pub struct OverlayDto {
    /// `YYYY-MM-DDTHH:MM:SS`
    pub generated_at: String,
    #[serde(default)]
    pub trips: Vec<TripUpdateDto>,
}

#[derive(Debug, Deserialize)]
pub struct TripUpdateDto {
    pub trip_id: String,
    #[serde(default)]
    pub delay_secs: i64,
    #[serde(default)]
    pub cancelled: bool,
}

impl OverlayDto {
    pub fn into_overlay(self, agency: &AgencyId) -> Result<RealtimeOverlay, FeedError> {
        let fetched_at = Timestamp::parse(&self.generated_at).map_err(|e| FeedError::Json {
            message: e.to_string(),
            body: None,
        })?;
        let trips = self
            .trips
            .into_iter()
            .map(|t| {
                (
                    TripId::new(t.trip_id),
                    TripStatus {
                        delay_secs: t.delay_secs,
                        cancelled: t.cancelled,
                    },
                )
            })
            .collect();
        Ok(RealtimeOverlay {
            agency: agency.clone(),
            fetched_at,
            trips,
        })
    }
}

/// Configuration for the HTTP feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Base URL; the overlay lives at `{base_url}/agencies/{agency}/overlay`
    pub base_url: String,
    /// Sent as `x-apikey` when set
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl FeedConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Overlay feed backed by an HTTP JSON endpoint.
#[derive(Debug, Clone)]
pub struct HttpOverlayFeed {
    http: reqwest::Client,
    base_url: String,
}

impl HttpOverlayFeed {
    pub fn new(config: FeedConfig) -> Result<Self, FeedError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(key) = &config.api_key {
            let value = reqwest::header::HeaderValue::from_str(key).map_err(|_| {
                FeedError::ApiError {
                    status: 0,
                    message: "Invalid API key format".to_string(),
                }
            })?;
            headers.insert("x-apikey", value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, agency: &AgencyId) -> String {
        format!("{}/agencies/{}/overlay", self.base_url, agency)
    }
}

impl OverlayFeed for HttpOverlayFeed {
    async fn fetch_overlay(&self, agency: &AgencyId) -> Result<RealtimeOverlay, FeedError> {
        let response = self.http.get(self.url(agency)).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(FeedError::Unauthorized);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FeedError::UnknownAgency(agency.clone()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        let dto: OverlayDto = serde_json::from_str(&body).map_err(|e| FeedError::Json {
            message: e.to_string(),
            body: Some(body.chars().take(500).collect()),
        })?;

        dto.into_overlay(agency)
    }
}

/// Overlay feed serving overlays held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticOverlayFeed {
    overlays: Arc<RwLock<HashMap<AgencyId, RealtimeOverlay>>>,
}

impl StaticOverlayFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the overlay served for its agency.
    pub async fn set(&self, overlay: RealtimeOverlay) {
        let mut guard = self.overlays.write().await;
        guard.insert(overlay.agency.clone(), overlay);
    }
}

impl OverlayFeed for StaticOverlayFeed {
    async fn fetch_overlay(&self, agency: &AgencyId) -> Result<RealtimeOverlay, FeedError> {
        let guard = self.overlays.read().await;
        guard
            .get(agency)
            .cloned()
            .ok_or_else(|| FeedError::UnknownAgency(agency.clone()))
    }
}
