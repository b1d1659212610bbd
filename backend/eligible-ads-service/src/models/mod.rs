use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Topical category tag, optionally hierarchical as `parent-child`.
pub type Segment = String;

/// Segment served when no interest or intent targeting matched.
pub const UNTARGETED_SEGMENT: &str = "untargeted";

/// One catalog row: a creative matched to a single segment.
///
/// The same `creative_id` may appear several times with different segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateAd {
    pub creative_id: String,
    pub creative_set_id: String,
    pub campaign_id: String,
    pub advertiser_id: String,
    pub segment: Segment,
    /// Lower value wins; must be at least 1.
    pub priority: u32,
    /// Keep probability used for pacing, in (0, 1].
    pub pacing_ratio: f64,
    #[serde(default)]
    pub per_day: u32,
    #[serde(default)]
    pub total_max: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdEventKind {
    Served,
    Viewed,
    Clicked,
    Dismissed,
}

impl AdEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdEventKind::Served => "served",
            AdEventKind::Viewed => "viewed",
            AdEventKind::Clicked => "clicked",
            AdEventKind::Dismissed => "dismissed",
        }
    }
}

/// Historic ad interaction. Event logs are ordered newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdEvent {
    pub creative_id: String,
    pub advertiser_id: String,
    pub kind: AdEventKind,
    pub timestamp: DateTime<Utc>,
}

/// Visited page, forwarded untouched to the exclusion rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowsingHistoryEntry {
    pub url: String,
}

/// Targeting context for one selection request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRequest {
    pub interest_segments: Vec<Segment>,
    pub intent_segments: Vec<Segment>,
}

impl SelectionRequest {
    pub fn new(interest_segments: Vec<Segment>, intent_segments: Vec<Segment>) -> Self {
        Self {
            interest_segments,
            intent_segments,
        }
    }

    /// Interest then intent segments, first occurrence kept.
    pub fn segments(&self) -> Vec<Segment> {
        let mut segments: Vec<Segment> = Vec::new();
        for segment in self
            .interest_segments
            .iter()
            .chain(self.intent_segments.iter())
        {
            if !segments.contains(segment) {
                segments.push(segment.clone());
            }
        }
        segments
    }
}

/// Completion of a selection request.
///
/// `was_allowed == false` only ever means an upstream fetch failed; an empty
/// result with `was_allowed == true` means nothing was eligible.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionResult<T> {
    pub was_allowed: bool,
    pub result: T,
}

impl<T: Default> SelectionResult<T> {
    pub fn allowed(result: T) -> Self {
        Self {
            was_allowed: true,
            result,
        }
    }

    pub fn empty() -> Self {
        Self::allowed(T::default())
    }

    pub fn not_allowed() -> Self {
        Self {
            was_allowed: false,
            result: T::default(),
        }
    }
}

/// Candidates returned by a segment query together with the segments asked for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentCandidates {
    pub segments: Vec<Segment>,
    pub ads: Vec<CandidateAd>,
}
