/// Ad Feature Scoring
///
/// Merges eligible rows per creative, derives the seven scoring features and
/// computes a non-negative score for weighted sampling.
///
/// # Features
/// - intent / interest segment match (child, falling back to parent)
/// - hours since the creative was last viewed
/// - hours since the advertiser was last viewed
/// - priority, scaled by the pacing ratio
use crate::error::{Result, SelectionError};
use crate::models::{AdEvent, AdEventKind, CandidateAd, Segment, SelectionRequest};
use crate::services::weights::FeatureWeights;
use crate::utils::{hours_since, matches_any, parents_of};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

pub const HOURS_PER_DAY: u32 = 24;

/// Scoring features for one distinct creative.
#[derive(Debug, Clone, PartialEq)]
pub struct AdFeatures {
    pub ad: CandidateAd,
    /// Segments of every merged row, duplicates kept.
    pub segments: Vec<Segment>,
    pub matches_intent_child_segment: bool,
    pub matches_intent_parent_segment: bool,
    pub matches_interest_child_segment: bool,
    pub matches_interest_parent_segment: bool,
    pub ad_last_seen_hours: u32,
    pub advertiser_last_seen_hours: u32,
    pub score: f64,
}

impl AdFeatures {
    fn new(ad: CandidateAd) -> Self {
        Self {
            segments: vec![ad.segment.clone()],
            ad,
            matches_intent_child_segment: false,
            matches_intent_parent_segment: false,
            matches_interest_child_segment: false,
            matches_interest_parent_segment: false,
            ad_last_seen_hours: 0,
            advertiser_last_seen_hours: 0,
            score: 0.0,
        }
    }
}

/// Merge rows sharing a creative id. The first row is kept as the creative's record.
///
/// Keyed by creative id; iteration order is ascending id.
pub fn group_by_creative(ads: &[CandidateAd]) -> BTreeMap<String, AdFeatures> {
    let mut grouped: BTreeMap<String, AdFeatures> = BTreeMap::new();

    for ad in ads {
        match grouped.get_mut(&ad.creative_id) {
            Some(features) => features.segments.push(ad.segment.clone()),
            None => {
                grouped.insert(ad.creative_id.clone(), AdFeatures::new(ad.clone()));
            }
        }
    }

    grouped
}

/// Hours since the newest viewed event matching `predicate`, 0 when never viewed.
///
/// Events are newest first, so the first match wins.
fn last_seen_hours<F>(ad_events: &[AdEvent], now: DateTime<Utc>, predicate: F) -> u32
where
    F: Fn(&AdEvent) -> bool,
{
    ad_events
        .iter()
        .find(|event| event.kind == AdEventKind::Viewed && predicate(event))
        .map(|event| hours_since(event.timestamp, now))
        .unwrap_or(0)
}

pub struct FeatureScorer {
    weights: FeatureWeights,
}

impl FeatureScorer {
    pub fn new(weights: FeatureWeights) -> Self {
        Self { weights }
    }

    /// Build and score features for every distinct creative in `eligible_ads`.
    pub fn score_ads(
        &self,
        eligible_ads: &[CandidateAd],
        ad_events: &[AdEvent],
        request: &SelectionRequest,
        now: DateTime<Utc>,
    ) -> Result<BTreeMap<String, AdFeatures>> {
        let mut ads = group_by_creative(eligible_ads);

        let intent_parents = parents_of(&request.intent_segments);
        let interest_parents = parents_of(&request.interest_segments);

        for features in ads.values_mut() {
            features.matches_intent_child_segment =
                matches_any(&request.intent_segments, &features.segments);
            features.matches_intent_parent_segment =
                matches_any(&intent_parents, &features.segments);
            features.matches_interest_child_segment =
                matches_any(&request.interest_segments, &features.segments);
            features.matches_interest_parent_segment =
                matches_any(&interest_parents, &features.segments);

            let creative_id = features.ad.creative_id.as_str();
            features.ad_last_seen_hours =
                last_seen_hours(ad_events, now, |e| e.creative_id == creative_id);

            let advertiser_id = features.ad.advertiser_id.as_str();
            features.advertiser_last_seen_hours =
                last_seen_hours(ad_events, now, |e| e.advertiser_id == advertiser_id);

            features.score = self.compute_score(features)?;

            debug!(
                creative_id = %features.ad.creative_id,
                segments = ?features.segments,
                ad_last_seen_hours = features.ad_last_seen_hours,
                advertiser_last_seen_hours = features.advertiser_last_seen_hours,
                score = features.score,
                "Ad features computed"
            );
        }

        Ok(ads)
    }

    /// Weighted sum of the features, scaled by the pacing ratio.
    pub fn compute_score(&self, features: &AdFeatures) -> Result<f64> {
        let w = &self.weights;
        let hours_per_day = f64::from(HOURS_PER_DAY);

        if features.ad.priority == 0 {
            return Err(SelectionError::InvalidPriority {
                creative_id: features.ad.creative_id.clone(),
            });
        }

        let mut score = 0.0;

        if features.matches_intent_child_segment {
            score += w.intent_child();
        } else if features.matches_intent_parent_segment {
            score += w.intent_parent();
        }

        if features.matches_interest_child_segment {
            score += w.interest_child();
        } else if features.matches_interest_parent_segment {
            score += w.interest_parent();
        }

        if features.ad_last_seen_hours <= HOURS_PER_DAY {
            score += w.ad_last_seen() * f64::from(features.ad_last_seen_hours) / hours_per_day;
        }

        if features.advertiser_last_seen_hours <= HOURS_PER_DAY {
            score += w.advertiser_last_seen() * f64::from(features.advertiser_last_seen_hours)
                / hours_per_day;
        }

        score += w.priority() / f64::from(features.ad.priority);

        score *= features.ad.pacing_ratio;

        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn weights(values: [f64; 7]) -> FeatureWeights {
        FeatureWeights::try_from(values.to_vec()).unwrap()
    }

    fn ad(creative_id: &str, segment: &str) -> CandidateAd {
        CandidateAd {
            creative_id: creative_id.to_string(),
            creative_set_id: "set".to_string(),
            campaign_id: "campaign".to_string(),
            advertiser_id: format!("advertiser-{}", creative_id),
            segment: segment.to_string(),
            priority: 1,
            pacing_ratio: 1.0,
            per_day: 0,
            total_max: 0,
        }
    }

    fn viewed(creative_id: &str, advertiser_id: &str, at: DateTime<Utc>) -> AdEvent {
        AdEvent {
            creative_id: creative_id.to_string(),
            advertiser_id: advertiser_id.to_string(),
            kind: AdEventKind::Viewed,
            timestamp: at,
        }
    }

    fn request(interest: &[&str], intent: &[&str]) -> SelectionRequest {
        SelectionRequest::new(
            interest.iter().map(|s| s.to_string()).collect(),
            intent.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_group_by_creative_merges_segments() {
        let ads = vec![ad("b", "finance"), ad("a", "tech-ai"), ad("a", "tech")];

        let grouped = group_by_creative(&ads);

        let ids: Vec<_> = grouped.keys().cloned().collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(grouped["a"].segments, vec!["tech-ai", "tech"]);
        assert_eq!(grouped["b"].segments, vec!["finance"]);
    }

    #[test]
    fn test_intent_child_beats_other_segment() {
        let scorer = FeatureScorer::new(weights([1.0; 7]));
        let ads = vec![ad("A", "tech-ai"), ad("B", "finance")];

        let scored = scorer
            .score_ads(&ads, &[], &request(&[], &["tech-ai"]), Utc::now())
            .unwrap();

        assert!(scored["A"].matches_intent_child_segment);
        assert!(!scored["B"].matches_intent_child_segment);
        assert!(scored["A"].score > scored["B"].score);
        assert!((scored["A"].score - 2.0).abs() < 1e-9);
        assert!((scored["B"].score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_parent_match_used_when_child_misses() {
        let scorer = FeatureScorer::new(weights([4.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0]));
        let ads = vec![ad("A", "tech")];

        let scored = scorer
            .score_ads(&ads, &[], &request(&[], &["tech-ai"]), Utc::now())
            .unwrap();

        assert!(!scored["A"].matches_intent_child_segment);
        assert!(scored["A"].matches_intent_parent_segment);
        assert!((scored["A"].score - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_child_match_does_not_add_parent_weight() {
        let scorer = FeatureScorer::new(weights([0.0, 0.0, 3.0, 5.0, 0.0, 0.0, 0.0]));
        let ads = vec![ad("A", "tech-ai"), ad("A", "tech")];

        let scored = scorer
            .score_ads(&ads, &[], &request(&["tech-ai"], &[]), Utc::now())
            .unwrap();

        assert!(scored["A"].matches_interest_child_segment);
        assert!(scored["A"].matches_interest_parent_segment);
        assert!((scored["A"].score - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_recency_uses_newest_viewed_event() {
        let now = Utc::now();
        let scorer = FeatureScorer::new(weights([0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0]));
        let events = vec![
            viewed("A", "advertiser-A", now - Duration::hours(12)),
            viewed("A", "advertiser-A", now - Duration::hours(20)),
        ];

        let scored = scorer
            .score_ads(&[ad("A", "tech")], &events, &request(&[], &[]), now)
            .unwrap();

        assert_eq!(scored["A"].ad_last_seen_hours, 12);
        assert_eq!(scored["A"].advertiser_last_seen_hours, 12);
        assert!((scored["A"].score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_recency_older_than_a_day_scores_nothing() {
        let now = Utc::now();
        let scorer = FeatureScorer::new(weights([0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0]));
        let events = vec![viewed("A", "advertiser-A", now - Duration::hours(48))];

        let scored = scorer
            .score_ads(&[ad("A", "tech")], &events, &request(&[], &[]), now)
            .unwrap();

        assert_eq!(scored["A"].ad_last_seen_hours, 48);
        assert_eq!(scored["A"].score, 0.0);
    }

    #[test]
    fn test_never_seen_defaults_to_zero_hours() {
        // Unseen creatives score like ones viewed this hour
        let scorer = FeatureScorer::new(weights([0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0]));
        let mut events = vec![viewed("A", "advertiser-A", Utc::now())];
        events[0].kind = AdEventKind::Clicked;

        let scored = scorer
            .score_ads(&[ad("A", "tech")], &events, &request(&[], &[]), Utc::now())
            .unwrap();

        assert_eq!(scored["A"].ad_last_seen_hours, 0);
        assert_eq!(scored["A"].advertiser_last_seen_hours, 0);
        assert!((scored["A"].score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_priority_and_pacing() {
        let scorer = FeatureScorer::new(weights([0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]));
        let low = CandidateAd {
            priority: 4,
            pacing_ratio: 0.5,
            ..ad("A", "tech")
        };

        let scored = scorer
            .score_ads(&[low], &[], &request(&[], &[]), Utc::now())
            .unwrap();

        assert!((scored["A"].score - 0.125).abs() < 1e-9);
    }

    #[test]
    fn test_zero_priority_is_rejected() {
        let scorer = FeatureScorer::new(weights([1.0; 7]));
        let broken = CandidateAd {
            priority: 0,
            ..ad("A", "tech")
        };

        let result = scorer.score_ads(&[broken], &[], &request(&[], &[]), Utc::now());

        assert!(matches!(
            result,
            Err(SelectionError::InvalidPriority { creative_id }) if creative_id == "A"
        ));
    }
}
