/// Eligible Ads Selector
///
/// Orchestrates a selection request end to end.
///
/// # Workflow
/// 1. Fetch the ad event log
/// 2. Fetch recent browsing history
/// 3. Fetch candidates (per segment tier, or the whole catalog)
/// 4. Apply eligibility filters, broadening the tier while nothing is eligible
/// 5. Score and sample one creative (feature based selection only)
///
/// Fetches are awaited one after another, never concurrently. The selector
/// state is locked for the whole request, so at most one request runs per
/// selector at a time.
use crate::config::SelectionConfig;
use crate::error::Result;
use crate::models::{
    AdEvent, BrowsingHistoryEntry, CandidateAd, Segment, SelectionRequest, SelectionResult,
    UNTARGETED_SEGMENT,
};
use crate::services::filters::{should_cap_last_served, EligibilityFilter, FilterContext};
use crate::services::sampling::WeightedSampler;
use crate::services::scoring::FeatureScorer;
use crate::services::weights::FeatureWeights;
use crate::sources::{AdEventSource, BrowsingHistorySource, CandidateSource, ExclusionRules};
use crate::utils::parents_of;
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Segment tiers visited by [`EligibleAdsSelector::get_for_segments`], narrowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentTier {
    ParentChild,
    Parent,
    Untargeted,
}

impl SegmentTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentTier::ParentChild => "parent_child",
            SegmentTier::Parent => "parent",
            SegmentTier::Untargeted => "untargeted",
        }
    }
}

/// Segment tiers for a request. Empty segments go straight to untargeted, and
/// the parent tier is skipped when it would repeat the first tier.
pub fn segment_tiers(segments: &[Segment]) -> Vec<(SegmentTier, Vec<Segment>)> {
    let mut tiers = Vec::with_capacity(3);

    if !segments.is_empty() {
        tiers.push((SegmentTier::ParentChild, segments.to_vec()));

        let parents = parents_of(segments);
        if parents != segments {
            tiers.push((SegmentTier::Parent, parents));
        }
    }

    tiers.push((SegmentTier::Untargeted, vec![UNTARGETED_SEGMENT.to_string()]));
    tiers
}

struct SelectorState {
    last_served: Option<CandidateAd>,
    rng: StdRng,
}

pub struct EligibleAdsSelector {
    candidates: Arc<dyn CandidateSource>,
    ad_events: Arc<dyn AdEventSource>,
    browsing_history: Arc<dyn BrowsingHistorySource>,
    filter: EligibilityFilter,
    scorer: Option<FeatureScorer>,
    sampler: WeightedSampler,
    config: SelectionConfig,
    state: Mutex<SelectorState>,
}

impl EligibleAdsSelector {
    pub fn new(
        candidates: Arc<dyn CandidateSource>,
        ad_events: Arc<dyn AdEventSource>,
        browsing_history: Arc<dyn BrowsingHistorySource>,
        exclusion_rules: Arc<dyn ExclusionRules>,
        config: SelectionConfig,
    ) -> Self {
        let scorer = FeatureWeights::from_config(&config.ad_feature_weights).map(FeatureScorer::new);
        let seen_window = Duration::hours(i64::from(config.seen_ads_window_hours));

        Self {
            candidates,
            ad_events,
            browsing_history,
            filter: EligibilityFilter::new(exclusion_rules, seen_window),
            scorer,
            sampler: WeightedSampler::new(),
            config,
            state: Mutex::new(SelectorState {
                last_served: None,
                rng: StdRng::from_entropy(),
            }),
        }
    }

    /// Replace the random source used for pacing and sampling.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.state.get_mut().rng = rng;
        self
    }

    pub fn has_feature_weights(&self) -> bool {
        self.scorer.is_some()
    }

    /// Remember the creative just shown, so it is not repeated next time.
    pub async fn set_last_served_ad(&self, ad: CandidateAd) {
        debug!(creative_id = %ad.creative_id, "Set last served ad");
        self.state.lock().await.last_served = Some(ad);
    }

    pub async fn last_served_ad(&self) -> Option<CandidateAd> {
        self.state.lock().await.last_served.clone()
    }

    /// Eligible ads for `segments`, broadening to parent segments and then to
    /// the untargeted segment while no ad is eligible.
    pub async fn get_for_segments(&self, segments: &[Segment]) -> SelectionResult<Vec<CandidateAd>> {
        let mut guard = self.state.lock().await;
        let SelectorState { last_served, rng } = &mut *guard;

        let Some((ad_events, browsing_history)) = self.fetch_request_context().await else {
            return SelectionResult::not_allowed();
        };

        let ctx = FilterContext {
            ad_events: &ad_events,
            browsing_history: &browsing_history,
            last_served: last_served.as_ref(),
            now: Utc::now(),
        };

        for (tier, tier_segments) in segment_tiers(segments) {
            info!(
                tier = tier.as_str(),
                segments = ?tier_segments,
                "Get eligible ads for segments"
            );

            let candidates = match self.candidates.get_for_segments(&tier_segments).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(tier = tier.as_str(), error = %e, "Failed to get ads for segments");
                    return SelectionResult::not_allowed();
                }
            };

            let candidate_count = candidates.ads.len();
            let eligible_ads = self.filter.apply(candidates.ads, &ctx, rng);

            if !eligible_ads.is_empty() {
                info!(
                    tier = tier.as_str(),
                    segments = ?candidates.segments,
                    candidate_count = candidate_count,
                    eligible_count = eligible_ads.len(),
                    "Found eligible ads"
                );
                return SelectionResult::allowed(eligible_ads);
            }

            info!(
                tier = tier.as_str(),
                candidate_count = candidate_count,
                "No eligible ads for tier"
            );
        }

        SelectionResult::empty()
    }

    /// Select one creative from the whole catalog by feature-weighted sampling.
    ///
    /// # Errors
    /// `SelectionError::InvalidPriority` when an eligible ad has priority 0.
    pub async fn get_for_features(
        &self,
        request: &SelectionRequest,
    ) -> Result<SelectionResult<Option<CandidateAd>>> {
        let mut guard = self.state.lock().await;
        let SelectorState { last_served, rng } = &mut *guard;

        let Some((ad_events, browsing_history)) = self.fetch_request_context().await else {
            return Ok(SelectionResult::not_allowed());
        };

        info!("Get eligible ads for features");

        let ads = match self.candidates.get_all().await {
            Ok(ads) => ads,
            Err(e) => {
                warn!(error = %e, "Failed to get ads");
                return Ok(SelectionResult::not_allowed());
            }
        };

        if ads.is_empty() {
            info!("No ads");
            return Ok(SelectionResult::empty());
        }

        let Some(scorer) = &self.scorer else {
            warn!("Ad feature weights are not configured, skipping selection");
            return Ok(SelectionResult::empty());
        };

        let ctx = FilterContext {
            ad_events: &ad_events,
            browsing_history: &browsing_history,
            last_served: last_served.as_ref(),
            now: Utc::now(),
        };

        let cap = if should_cap_last_served(&ads) {
            ctx.last_served
        } else {
            None
        };
        let eligible_ads = self.filter.apply_frequency_capping(ads, cap, &ctx);

        if eligible_ads.is_empty() {
            info!("No eligible ads");
            return Ok(SelectionResult::empty());
        }

        let scored = scorer.score_ads(&eligible_ads, &ad_events, request, Utc::now())?;
        let selected = self.sampler.sample(&scored, rng);

        match &selected {
            Some(ad) => info!(
                creative_id = %ad.creative_id,
                eligible_count = scored.len(),
                "Selected ad"
            ),
            None => info!(eligible_count = scored.len(), "No ad selected"),
        }

        Ok(SelectionResult::allowed(selected))
    }

    /// Ad events then browsing history. `None` when the event log is unavailable.
    async fn fetch_request_context(&self) -> Option<(Vec<AdEvent>, Vec<BrowsingHistoryEntry>)> {
        let ad_events = match self.ad_events.get_all().await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "Failed to get ad events");
                return None;
            }
        };

        let browsing_history = self
            .browsing_history
            .get_recent(
                self.config.browsing_history_max_count,
                self.config.browsing_history_days_ago,
            )
            .await;

        debug!(
            ad_events = ad_events.len(),
            browsing_history = browsing_history.len(),
            "Fetched request context"
        );

        Some((ad_events, browsing_history))
    }
}
