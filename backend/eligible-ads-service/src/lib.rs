pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod sources;
pub mod utils;

pub use config::{Config, SelectionConfig};
pub use error::{Result, SelectionError};
pub use services::{EligibilityFilter, EligibleAdsSelector, FeatureScorer, WeightedSampler};
