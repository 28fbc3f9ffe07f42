//! Plex Media Server client.
//!
//! Uses the JSON form of the Plex HTTP API (`Accept: application/json`):
//! - `/status/sessions` lists active sessions; every media part carries a
//!   transcode `decision`.
//! - `/statistics/resources` returns recent host/process utilization samples.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::MediaServerClient;
use crate::domain::{
    PlexSettings, ResourceUsage, ServerKind, ServerSettings, StreamDecision, StreamSession,
};
use crate::{Error, Result};

/// Seconds of history requested from `/statistics/resources`.
const RESOURCES_TIMESPAN: &str = "6";

/// Plex client over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct PlexClient {
    http: reqwest::Client,
}

impl PlexClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn plex_settings(settings: &ServerSettings) -> Result<&PlexSettings> {
        settings.as_plex().ok_or_else(|| {
            Error::validation(format!(
                "Plex client cannot refresh a {} server",
                settings.kind()
            ))
        })
    }

    /// Build an endpoint URL; the token is added as a query parameter.
    fn endpoint(settings: &PlexSettings, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let base = settings.common.address.trim_end_matches('/');
        let mut url = Url::parse(&format!("{}{}", base, path))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("X-Plex-Token", &settings.token);
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, cancel: &CancellationToken) -> Result<T> {
        // Never log or report the token-bearing query string.
        let display_url = format!("{}{}", url.origin().ascii_serialization(), url.path());
        debug!(url = %display_url, "Requesting Plex endpoint");

        let request = self.http.get(url).header(ACCEPT, "application/json").send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = request => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: display_url,
            });
        }

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            body = response.text() => body?,
        };

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl MediaServerClient for PlexClient {
    fn kind(&self) -> ServerKind {
        ServerKind::Plex
    }

    async fn fetch_stream_sessions(
        &self,
        settings: &ServerSettings,
        cancel: &CancellationToken,
    ) -> Result<Vec<StreamSession>> {
        let plex = Self::plex_settings(settings)?;
        let url = Self::endpoint(plex, "/status/sessions", &[])?;
        let envelope: Envelope<SessionsContainer> = self.get_json(url, cancel).await?;
        Ok(envelope.container.stream_sessions())
    }

    async fn fetch_resource_usage(
        &self,
        settings: &ServerSettings,
        cancel: &CancellationToken,
    ) -> Result<ResourceUsage> {
        let plex = Self::plex_settings(settings)?;
        let url = Self::endpoint(
            plex,
            "/statistics/resources",
            &[("timespan", RESOURCES_TIMESPAN)],
        )?;
        let envelope: Envelope<ResourcesContainer> = self.get_json(url, cancel).await?;
        Ok(envelope.container.average())
    }
}

// ========== Wire types ==========

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "MediaContainer")]
    container: T,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SessionsContainer {
    #[serde(rename = "Metadata")]
    metadata: Vec<SessionMetadata>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SessionMetadata {
    #[serde(rename = "Media")]
    media: Vec<SessionMedia>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SessionMedia {
    #[serde(rename = "Part")]
    parts: Vec<SessionPart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SessionPart {
    decision: Option<String>,
}

impl SessionsContainer {
    /// One session per media part, as Plex reports a decision per part.
    fn stream_sessions(&self) -> Vec<StreamSession> {
        self.metadata
            .iter()
            .flat_map(|m| &m.media)
            .flat_map(|m| &m.parts)
            .map(|part| StreamSession::new(StreamDecision::parse_or_fallback(part.decision.as_deref())))
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResourcesContainer {
    #[serde(rename = "StatisticsResources")]
    samples: Vec<ResourceSample>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ResourceSample {
    host_cpu_utilization: Option<f64>,
    process_cpu_utilization: Option<f64>,
    host_memory_utilization: Option<f64>,
    process_memory_utilization: Option<f64>,
}

impl ResourcesContainer {
    /// Average each metric over the samples that report it; zero when none do.
    fn average(&self) -> ResourceUsage {
        fn mean(values: impl Iterator<Item = f64>) -> f64 {
            let (sum, count) = values.fold((0.0, 0u32), |(sum, count), v| (sum + v, count + 1));
            if count == 0 { 0.0 } else { sum / f64::from(count) }
        }

        let samples = &self.samples;
        ResourceUsage {
            host_cpu_percent: mean(samples.iter().filter_map(|s| s.host_cpu_utilization)),
            process_cpu_percent: mean(samples.iter().filter_map(|s| s.process_cpu_utilization)),
            host_memory_percent: mean(samples.iter().filter_map(|s| s.host_memory_utilization)),
            process_memory_percent: mean(
                samples.iter().filter_map(|s| s.process_memory_utilization),
            ),
        }
    }
}
