// File-backed collaborators used by the service binary

use super::{AdEventSource, BrowsingHistorySource, CandidateSource, ExclusionRules};
use crate::error::Result;
use crate::models::{AdEvent, BrowsingHistoryEntry, CandidateAd, Segment, SegmentCandidates};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Catalog loaded once from a JSON array of [`CandidateAd`].
pub struct JsonCandidateCatalog {
    ads: Vec<CandidateAd>,
}

impl JsonCandidateCatalog {
    pub fn new(ads: Vec<CandidateAd>) -> Self {
        Self { ads }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let ads: Vec<CandidateAd> = serde_json::from_str(&raw)?;

        info!(path = %path.display(), ads = ads.len(), "Loaded creative catalog");

        Ok(Self::new(ads))
    }
}

#[async_trait]
impl CandidateSource for JsonCandidateCatalog {
    async fn get_all(&self) -> anyhow::Result<Vec<CandidateAd>> {
        Ok(self.ads.clone())
    }

    async fn get_for_segments(&self, segments: &[Segment]) -> anyhow::Result<SegmentCandidates> {
        let ads: Vec<CandidateAd> = self
            .ads
            .iter()
            .filter(|ad| segments.contains(&ad.segment))
            .cloned()
            .collect();

        debug!(segments = ?segments, matched = ads.len(), "Catalog segment query");

        Ok(SegmentCandidates {
            segments: segments.to_vec(),
            ads,
        })
    }
}

/// Ad event log loaded from a JSON array of [`AdEvent`].
pub struct JsonAdEventLog {
    events: Vec<AdEvent>,
}

impl JsonAdEventLog {
    /// Events are stored newest first, whatever order they arrive in.
    pub fn new(mut events: Vec<AdEvent>) -> Self {
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Self { events }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let events: Vec<AdEvent> = serde_json::from_str(&raw)?;

        info!(path = %path.display(), events = events.len(), "Loaded ad event log");

        Ok(Self::new(events))
    }
}

#[async_trait]
impl AdEventSource for JsonAdEventLog {
    async fn get_all(&self) -> anyhow::Result<Vec<AdEvent>> {
        Ok(self.events.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct HistoryRecord {
    url: String,
    visited_at: DateTime<Utc>,
}

/// Browsing history loaded from `[{"url": ..., "visited_at": ...}]`.
pub struct JsonBrowsingHistory {
    records: Vec<HistoryRecord>,
}

impl JsonBrowsingHistory {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let mut records: Vec<HistoryRecord> = serde_json::from_str(&raw)?;
        records.sort_by(|a, b| b.visited_at.cmp(&a.visited_at));

        info!(path = %path.display(), entries = records.len(), "Loaded browsing history");

        Ok(Self { records })
    }
}

#[async_trait]
impl BrowsingHistorySource for JsonBrowsingHistory {
    async fn get_recent(&self, max_count: usize, days_ago: u32) -> Vec<BrowsingHistoryEntry> {
        let cutoff = Utc::now() - Duration::days(i64::from(days_ago));

        self.records
            .iter()
            .filter(|record| record.visited_at >= cutoff)
            .take(max_count)
            .map(|record| BrowsingHistoryEntry {
                url: record.url.clone(),
            })
            .collect()
    }
}

/// Rule engine that never excludes; placeholder for the external capping rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoExclusionRules;

impl ExclusionRules for NoExclusionRules {
    fn should_exclude(
        &self,
        _ad: &CandidateAd,
        _ad_events: &[AdEvent],
        _browsing_history: &[BrowsingHistoryEntry],
    ) -> bool {
        false
    }
}
