use crate::models::CandidateAd;
use crate::services::scoring::AdFeatures;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::debug;

/// Weighted random selection over scored ads.
///
/// Candidates are visited in ascending creative id order, so a given draw
/// always maps to the same creative.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightedSampler;

impl WeightedSampler {
    pub fn new() -> Self {
        Self
    }

    /// Draw `r` in [0, 1) and select with probability proportional to score.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        ads: &BTreeMap<String, AdFeatures>,
        rng: &mut R,
    ) -> Option<CandidateAd> {
        let draw: f64 = rng.gen();
        self.select(ads, draw)
    }

    /// Select the first ad whose cumulative normalized score exceeds `draw`.
    ///
    /// Returns `None` for an empty map, a zero total, or when rounding leaves
    /// the cumulative sum short of `draw`.
    pub fn select(&self, ads: &BTreeMap<String, AdFeatures>, draw: f64) -> Option<CandidateAd> {
        let normalizing_constant: f64 = ads.values().map(|features| features.score).sum();

        if normalizing_constant <= 0.0 || !normalizing_constant.is_finite() {
            debug!(
                candidates = ads.len(),
                normalizing_constant = normalizing_constant,
                "Nothing to sample"
            );
            return None;
        }

        let mut cumulative = 0.0;
        for (creative_id, features) in ads {
            cumulative += features.score / normalizing_constant;
            if draw < cumulative {
                debug!(
                    creative_id = %creative_id,
                    score = features.score,
                    draw = draw,
                    "Ad sampled"
                );
                return Some(features.ad.clone());
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::scoring::group_by_creative;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scored(scores: &[(&str, f64)]) -> BTreeMap<String, AdFeatures> {
        let ads: Vec<CandidateAd> = scores
            .iter()
            .map(|(id, _)| CandidateAd {
                creative_id: id.to_string(),
                creative_set_id: "set".to_string(),
                campaign_id: "campaign".to_string(),
                advertiser_id: "advertiser".to_string(),
                segment: "untargeted".to_string(),
                priority: 1,
                pacing_ratio: 1.0,
                per_day: 0,
                total_max: 0,
            })
            .collect();

        let mut grouped = group_by_creative(&ads);
        for (id, score) in scores {
            if let Some(features) = grouped.get_mut(*id) {
                features.score = *score;
            }
        }
        grouped
    }

    #[test]
    fn test_select_walks_cumulative_distribution() {
        let sampler = WeightedSampler::new();
        let ads = scored(&[("a", 1.0), ("b", 3.0)]);

        assert_eq!(sampler.select(&ads, 0.0).unwrap().creative_id, "a");
        assert_eq!(sampler.select(&ads, 0.24).unwrap().creative_id, "a");
        assert_eq!(sampler.select(&ads, 0.25).unwrap().creative_id, "b");
        assert_eq!(sampler.select(&ads, 0.99).unwrap().creative_id, "b");
    }

    #[test]
    fn test_select_skips_zero_scores() {
        let sampler = WeightedSampler::new();
        let ads = scored(&[("a", 0.0), ("b", 2.0), ("c", 0.0)]);

        for draw in [0.0, 0.5, 0.999] {
            assert_eq!(sampler.select(&ads, draw).unwrap().creative_id, "b");
        }
    }

    #[test]
    fn test_all_zero_scores_select_nothing() {
        let sampler = WeightedSampler::new();
        let ads = scored(&[("a", 0.0), ("b", 0.0)]);

        assert!(sampler.select(&ads, 0.0).is_none());
        assert!(sampler.select(&BTreeMap::new(), 0.0).is_none());
    }

    #[test]
    fn test_rounding_shortfall_selects_nothing() {
        let sampler = WeightedSampler::new();
        let ads = scored(&[("a", 1.0)]);

        assert!(sampler.select(&ads, 1.0).is_none());
    }

    #[test]
    fn test_sample_reproducible_with_seed() {
        let sampler = WeightedSampler::new();
        let ads = scored(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);

        let run = |seed: u64| -> Vec<String> {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..20)
                .filter_map(|_| sampler.sample(&ads, &mut rng))
                .map(|ad| ad.creative_id)
                .collect()
        };

        let first = run(42);
        assert_eq!(first.len(), 20);
        assert_eq!(first, run(42));
    }

    #[test]
    fn test_sampled_ad_always_has_positive_score() {
        let sampler = WeightedSampler::new();
        let ads = scored(&[("a", 0.0), ("b", 0.5), ("c", 0.0), ("d", 1.5)]);
        let mut rng = StdRng::seed_from_u64(9);

        for _ in 0..200 {
            let ad = sampler.sample(&ads, &mut rng).unwrap();
            assert!(ads[&ad.creative_id].score > 0.0);
        }
    }
}
