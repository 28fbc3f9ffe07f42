//! Observed live status of a media server.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a media server is delivering a stream to its client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamDecision {
    DirectPlay,
    DirectStream,
    Transcode,
}

impl StreamDecision {
    /// Decision assumed when upstream reports no parseable decision value.
    ///
    /// Plex omits the decision for some direct-play sessions, so the cheapest
    /// delivery mode is assumed rather than failing the whole refresh.
    pub const FALLBACK: StreamDecision = StreamDecision::DirectPlay;

    pub const ALL: [StreamDecision; 3] = [
        StreamDecision::DirectPlay,
        StreamDecision::DirectStream,
        StreamDecision::Transcode,
    ];

    /// Human readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::DirectPlay => "Direct Play",
            Self::DirectStream => "Direct Stream",
            Self::Transcode => "Transcode",
        }
    }

    /// Parse an upstream decision string, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "directplay" => Some(Self::DirectPlay),
            "directstream" => Some(Self::DirectStream),
            "transcode" => Some(Self::Transcode),
            _ => None,
        }
    }

    /// Parse an optional upstream value, using [`Self::FALLBACK`] when absent or unknown.
    pub fn parse_or_fallback(s: Option<&str>) -> Self {
        s.and_then(Self::parse).unwrap_or(Self::FALLBACK)
    }
}

impl fmt::Display for StreamDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single active playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSession {
    pub decision: StreamDecision,
}

impl StreamSession {
    pub fn new(decision: StreamDecision) -> Self {
        Self { decision }
    }
}

/// Host and server-process resource usage, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceUsage {
    pub host_cpu_percent: f64,
    pub process_cpu_percent: f64,
    pub host_memory_percent: f64,
    pub process_memory_percent: f64,
}

/// Most recently observed status of a server.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerStats {
    pub resources: ResourceUsage,
    pub streams: Vec<StreamSession>,
}

impl ServerStats {
    pub fn new(streams: Vec<StreamSession>, resources: ResourceUsage) -> Self {
        Self { resources, streams }
    }

    /// Total number of active streams.
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Number of active streams with the given decision.
    pub fn count(&self, decision: StreamDecision) -> usize {
        self.streams
            .iter()
            .filter(|s| s.decision == decision)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_parse() {
        assert_eq!(StreamDecision::parse("directplay"), Some(StreamDecision::DirectPlay));
        assert_eq!(StreamDecision::parse("DirectStream"), Some(StreamDecision::DirectStream));
        assert_eq!(StreamDecision::parse(" transcode "), Some(StreamDecision::Transcode));
        assert_eq!(StreamDecision::parse("copy"), None);
    }

    #[test]
    fn test_decision_fallback() {
        assert_eq!(StreamDecision::FALLBACK, StreamDecision::DirectPlay);
        assert_eq!(StreamDecision::parse_or_fallback(None), StreamDecision::FALLBACK);
        assert_eq!(StreamDecision::parse_or_fallback(Some("")), StreamDecision::FALLBACK);
        assert_eq!(
            StreamDecision::parse_or_fallback(Some("transcode")),
            StreamDecision::Transcode
        );
    }

    #[test]
    fn test_stats_counts() {
        let stats = ServerStats::new(
            vec![
                StreamSession::new(StreamDecision::DirectPlay),
                StreamSession::new(StreamDecision::Transcode),
                StreamSession::new(StreamDecision::Transcode),
            ],
            ResourceUsage::default(),
        );

        assert_eq!(stats.stream_count(), 3);
        assert_eq!(stats.count(StreamDecision::DirectPlay), 1);
        assert_eq!(stats.count(StreamDecision::DirectStream), 0);
        assert_eq!(stats.count(StreamDecision::Transcode), 2);
    }

    #[test]
    fn test_labels() {
        assert_eq!(StreamDecision::DirectStream.to_string(), "Direct Stream");
    }
}
