/// Eligibility Filters
///
/// Narrows one tier's candidates down to the ads that may be shown.
///
/// # Order
/// 1. Seen advertisers (round robin when everything was seen within the window)
/// 2. Seen creatives (round robin when everything was seen within the window)
/// 3. Frequency capping rules plus the last served creative
/// 4. Pacing
/// 5. Priority
mod seen;

pub use seen::{filter_seen_advertisers, filter_seen_creatives, SeenAds};

use crate::models::{AdEvent, BrowsingHistoryEntry, CandidateAd};
use crate::sources::ExclusionRules;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-request inputs shared by every filter stage.
#[derive(Debug, Clone, Copy)]
pub struct FilterContext<'a> {
    pub ad_events: &'a [AdEvent],
    pub browsing_history: &'a [BrowsingHistoryEntry],
    pub last_served: Option<&'a CandidateAd>,
    pub now: DateTime<Utc>,
}

pub struct EligibilityFilter {
    exclusion_rules: Arc<dyn ExclusionRules>,
    seen_window: Duration,
}

impl EligibilityFilter {
    /// `seen_window` bounds how far back a view counts as seen.
    pub fn new(exclusion_rules: Arc<dyn ExclusionRules>, seen_window: Duration) -> Self {
        Self {
            exclusion_rules,
            seen_window,
        }
    }

    /// Run the full chain. Every stage only sees the previous stage's output.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        ads: Vec<CandidateAd>,
        ctx: &FilterContext<'_>,
        rng: &mut R,
    ) -> Vec<CandidateAd> {
        if ads.is_empty() {
            return ads;
        }

        let input_count = ads.len();
        let cap_last_served = should_cap_last_served(&ads);
        let seen = SeenAds::from_events(ctx.ad_events, ctx.now - self.seen_window);

        let ads = filter_seen_advertisers(ads, &seen);
        let ads = filter_seen_creatives(ads, &seen);
        let ads = self.apply_frequency_capping(
            ads,
            if cap_last_served { ctx.last_served } else { None },
            ctx,
        );
        let ads = pace_ads(ads, rng);
        let ads = prioritize_ads(ads);

        debug!(
            input_count = input_count,
            eligible_count = ads.len(),
            "Eligibility filters applied"
        );

        ads
    }

    /// Drop ads excluded by the capping rules, and the last served creative if given.
    pub fn apply_frequency_capping(
        &self,
        ads: Vec<CandidateAd>,
        last_served: Option<&CandidateAd>,
        ctx: &FilterContext<'_>,
    ) -> Vec<CandidateAd> {
        ads.into_iter()
            .filter(|ad| {
                let excluded = self.exclusion_rules.should_exclude(
                    ad,
                    ctx.ad_events,
                    ctx.browsing_history,
                ) || last_served.is_some_and(|last| last.creative_id == ad.creative_id);

                if excluded {
                    debug!(creative_id = %ad.creative_id, "Ad excluded by frequency capping");
                }

                !excluded
            })
            .collect()
    }
}

/// Repeating the last ad beats showing nothing, so a lone candidate is never capped.
pub fn should_cap_last_served(ads: &[CandidateAd]) -> bool {
    ads.len() > 1
}

/// Keep each ad with probability `pacing_ratio`.
pub fn pace_ads<R: Rng + ?Sized>(ads: Vec<CandidateAd>, rng: &mut R) -> Vec<CandidateAd> {
    ads.into_iter()
        .filter(|ad| {
            let draw: f64 = rng.gen();
            let keep = draw <= ad.pacing_ratio;
            if !keep {
                debug!(
                    creative_id = %ad.creative_id,
                    pacing_ratio = ad.pacing_ratio,
                    "Ad paced"
                );
            }
            keep
        })
        .collect()
}

/// Keep only the ads sharing the lowest priority value. Priority 0 is invalid
/// catalog data and never eligible.
pub fn prioritize_ads(ads: Vec<CandidateAd>) -> Vec<CandidateAd> {
    let ads: Vec<CandidateAd> = ads
        .into_iter()
        .filter(|ad| {
            if ad.priority == 0 {
                warn!(creative_id = %ad.creative_id, "Dropping ad with invalid priority 0");
                return false;
            }
            true
        })
        .collect();

    let Some(top_priority) = ads.iter().map(|ad| ad.priority).min() else {
        return ads;
    };

    ads.into_iter()
        .filter(|ad| ad.priority == top_priority)
        .collect()
}
