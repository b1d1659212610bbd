use anyhow::{anyhow, Result};
use serde::Deserialize;

pub const DEFAULT_AD_FEATURE_WEIGHTS: &str = "1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0";
pub const DEFAULT_BROWSING_HISTORY_MAX_COUNT: usize = 5000;
pub const DEFAULT_BROWSING_HISTORY_DAYS_AGO: u32 = 180;
pub const DEFAULT_SEEN_ADS_WINDOW_HOURS: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Score and sample a single creative from the full catalog
    Features,
    /// Return the filtered list for the best matching segment tier
    Segments,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service_name: String,

    // Scoring
    pub ad_feature_weights: String,

    // Browsing history lookback
    pub browsing_history_max_count: usize,
    pub browsing_history_days_ago: u32,

    // How long a view keeps an ad out of the seen round robin
    pub seen_ads_window_hours: u32,

    // File-backed sources
    pub catalog_path: String,
    pub ad_events_path: String,
    pub browsing_history_path: Option<String>,

    // Request
    pub interest_segments: String,
    pub intent_segments: String,
    pub selection_mode: SelectionMode,
    pub rng_seed: Option<u64>,
}

/// Settings consumed by the selector itself.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionConfig {
    pub ad_feature_weights: String,
    pub browsing_history_max_count: usize,
    pub browsing_history_days_ago: u32,
    pub seen_ads_window_hours: u32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            ad_feature_weights: DEFAULT_AD_FEATURE_WEIGHTS.to_string(),
            browsing_history_max_count: DEFAULT_BROWSING_HISTORY_MAX_COUNT,
            browsing_history_days_ago: DEFAULT_BROWSING_HISTORY_DAYS_AGO,
            seen_ads_window_hours: DEFAULT_SEEN_ADS_WINDOW_HOURS,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .set_default("service_name", "eligible-ads-service")?
            .set_default("ad_feature_weights", DEFAULT_AD_FEATURE_WEIGHTS)?
            .set_default(
                "browsing_history_max_count",
                DEFAULT_BROWSING_HISTORY_MAX_COUNT as u64,
            )?
            .set_default(
                "browsing_history_days_ago",
                u64::from(DEFAULT_BROWSING_HISTORY_DAYS_AGO),
            )?
            .set_default(
                "seen_ads_window_hours",
                u64::from(DEFAULT_SEEN_ADS_WINDOW_HOURS),
            )?
            .set_default("catalog_path", "data/catalog.json")?
            .set_default("ad_events_path", "data/ad_events.json")?
            .set_default("interest_segments", "")?
            .set_default("intent_segments", "")?
            .set_default("selection_mode", "features")?
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        config.try_deserialize()
    }

    pub fn validate(&self) -> Result<()> {
        if self.browsing_history_max_count == 0 {
            return Err(anyhow!("Browsing history max count must be greater than 0"));
        }

        if self.browsing_history_days_ago == 0 {
            return Err(anyhow!("Browsing history days ago must be greater than 0"));
        }

        if self.seen_ads_window_hours == 0 {
            return Err(anyhow!("Seen ads window must be greater than 0 hours"));
        }

        if self.catalog_path.is_empty() {
            return Err(anyhow!("Catalog path is required"));
        }

        if self.ad_events_path.is_empty() {
            return Err(anyhow!("Ad events path is required"));
        }

        Ok(())
    }

    pub fn selection(&self) -> SelectionConfig {
        SelectionConfig {
            ad_feature_weights: self.ad_feature_weights.clone(),
            browsing_history_max_count: self.browsing_history_max_count,
            browsing_history_days_ago: self.browsing_history_days_ago,
            seen_ads_window_hours: self.seen_ads_window_hours,
        }
    }
}

/// Split a comma-separated segment list, trimming blanks.
pub fn parse_segments(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
