mod json;

use crate::models::{AdEvent, BrowsingHistoryEntry, CandidateAd, Segment, SegmentCandidates};
use anyhow::Result;
use async_trait::async_trait;

pub use json::{JsonAdEventLog, JsonBrowsingHistory, JsonCandidateCatalog, NoExclusionRules};

/// Creative catalog 查詢
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Every active creative, regardless of segment.
    async fn get_all(&self) -> Result<Vec<CandidateAd>>;

    /// Creatives targeting any of `segments`, one row per (creative, segment) match.
    async fn get_for_segments(&self, segments: &[Segment]) -> Result<SegmentCandidates>;
}

/// Ad event log, newest first.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdEventSource: Send + Sync {
    async fn get_all(&self) -> Result<Vec<AdEvent>>;
}

/// Best-effort browsing history lookup; never fails.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrowsingHistorySource: Send + Sync {
    async fn get_recent(&self, max_count: usize, days_ago: u32) -> Vec<BrowsingHistoryEntry>;
}

/// Frequency capping and targeting rules applied per candidate.
#[cfg_attr(test, mockall::automock)]
pub trait ExclusionRules: Send + Sync {
    fn should_exclude(
        &self,
        ad: &CandidateAd,
        ad_events: &[AdEvent],
        browsing_history: &[BrowsingHistoryEntry],
    ) -> bool;
}
