use crate::models::{AdEvent, AdEventKind, CandidateAd};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

/// Creatives and advertisers the user has viewed recently.
#[derive(Debug, Clone, Default)]
pub struct SeenAds {
    creatives: HashSet<String>,
    advertisers: HashSet<String>,
}

impl SeenAds {
    /// Views at or after `since`. Older views are forgotten, so a fully seen
    /// catalog starts a new round once its views age out.
    pub fn from_events(ad_events: &[AdEvent], since: DateTime<Utc>) -> Self {
        let mut seen = Self::default();
        for event in ad_events
            .iter()
            .filter(|e| e.kind == AdEventKind::Viewed && e.timestamp >= since)
        {
            seen.creatives.insert(event.creative_id.clone());
            seen.advertisers.insert(event.advertiser_id.clone());
        }
        seen
    }

    pub fn has_seen_creative(&self, creative_id: &str) -> bool {
        self.creatives.contains(creative_id)
    }

    pub fn has_seen_advertiser(&self, advertiser_id: &str) -> bool {
        self.advertisers.contains(advertiser_id)
    }
}

/// Drop ads from advertisers already seen, unless that would drop every ad.
pub fn filter_seen_advertisers(ads: Vec<CandidateAd>, seen: &SeenAds) -> Vec<CandidateAd> {
    round_robin(ads, "advertiser", |ad| seen.has_seen_advertiser(&ad.advertiser_id))
}

/// Drop creatives already seen, unless that would drop every ad.
pub fn filter_seen_creatives(ads: Vec<CandidateAd>, seen: &SeenAds) -> Vec<CandidateAd> {
    round_robin(ads, "creative", |ad| seen.has_seen_creative(&ad.creative_id))
}

fn round_robin<F>(ads: Vec<CandidateAd>, kind: &str, is_seen: F) -> Vec<CandidateAd>
where
    F: Fn(&CandidateAd) -> bool,
{
    if ads.iter().all(&is_seen) {
        if !ads.is_empty() {
            debug!(kind = kind, count = ads.len(), "All ads seen, round robin");
        }
        return ads;
    }

    ads.into_iter().filter(|ad| !is_seen(ad)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::filters::tests::{ad, viewed};
    use chrono::Duration;

    fn last_day() -> DateTime<Utc> {
        Utc::now() - Duration::hours(24)
    }

    #[test]
    fn test_filter_seen_advertisers() {
        let seen = SeenAds::from_events(&[viewed("c1", "a1", 2)], last_day());
        let ads = vec![ad("c1", "a1", 1), ad("c2", "a1", 1), ad("c3", "a2", 1)];

        let filtered = filter_seen_advertisers(ads, &seen);

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].creative_id, "c3");
    }

    #[test]
    fn test_filter_seen_advertisers_round_robin() {
        let seen = SeenAds::from_events(&[viewed("c1", "a1", 2)], last_day());
        let ads = vec![ad("c1", "a1", 1), ad("c2", "a1", 1)];

        let filtered = filter_seen_advertisers(ads.clone(), &seen);

        assert_eq!(filtered, ads);
    }

    #[test]
    fn test_filter_seen_creatives() {
        let seen = SeenAds::from_events(&[viewed("c1", "a1", 2)], last_day());
        let ads = vec![ad("c1", "a1", 1), ad("c2", "a1", 1)];

        let filtered = filter_seen_creatives(ads, &seen);

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].creative_id, "c2");
    }

    #[test]
    fn test_only_viewed_events_count_as_seen() {
        let mut served = viewed("c1", "a1", 1);
        served.kind = AdEventKind::Served;

        let seen = SeenAds::from_events(&[served], last_day());

        assert!(!seen.has_seen_creative("c1"));
        assert!(!seen.has_seen_advertiser("a1"));
    }

    #[test]
    fn test_old_views_are_forgotten() {
        let seen = SeenAds::from_events(
            &[viewed("c1", "a1", 30), viewed("c2", "a2", 3)],
            last_day(),
        );

        assert!(!seen.has_seen_creative("c1"));
        assert!(!seen.has_seen_advertiser("a1"));
        assert!(seen.has_seen_creative("c2"));
        assert!(seen.has_seen_advertiser("a2"));
    }
}
