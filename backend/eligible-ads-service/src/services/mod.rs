pub mod eligible_ads;
pub mod filters;
pub mod sampling;
pub mod scoring;
pub mod weights;

pub use eligible_ads::EligibleAdsSelector;
pub use filters::EligibilityFilter;
pub use sampling::WeightedSampler;
pub use scoring::FeatureScorer;
