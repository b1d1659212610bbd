/// Feature Weights
///
/// Parses the comma-separated weight string that drives ad scoring.
///
/// Positional layout:
/// `[intent_child, intent_parent, interest_child, interest_parent,
///   ad_last_seen, advertiser_last_seen, priority]`
use crate::error::{Result, SelectionError};
use tracing::warn;

pub const FEATURE_WEIGHT_COUNT: usize = 7;

/// Parse a weight list such as `"1.0, 0.5, 0, 2"`.
///
/// Returns an empty list when any token is not a number, any value is
/// negative, or the values do not sum to a positive total. Arity is not
/// checked here.
pub fn parse_feature_weights(value: &str) -> Vec<f64> {
    let mut weights = Vec::new();

    for token in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let weight = match token.parse::<f64>() {
            Ok(weight) if weight.is_finite() => weight,
            _ => return Vec::new(),
        };

        if weight < 0.0 {
            return Vec::new();
        }

        weights.push(weight);
    }

    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        return Vec::new();
    }

    weights
}

/// Validated set of exactly seven scoring weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureWeights([f64; FEATURE_WEIGHT_COUNT]);

impl FeatureWeights {
    pub fn intent_child(&self) -> f64 {
        self.0[0]
    }

    pub fn intent_parent(&self) -> f64 {
        self.0[1]
    }

    pub fn interest_child(&self) -> f64 {
        self.0[2]
    }

    pub fn interest_parent(&self) -> f64 {
        self.0[3]
    }

    pub fn ad_last_seen(&self) -> f64 {
        self.0[4]
    }

    pub fn advertiser_last_seen(&self) -> f64 {
        self.0[5]
    }

    pub fn priority(&self) -> f64 {
        self.0[6]
    }

    /// Parse and validate a configuration value, logging why it was rejected.
    pub fn from_config(value: &str) -> Option<Self> {
        match Self::try_from(parse_feature_weights(value)) {
            Ok(weights) => Some(weights),
            Err(e) => {
                warn!(value = %value, error = %e, "Ignoring ad feature weights");
                None
            }
        }
    }
}

impl TryFrom<Vec<f64>> for FeatureWeights {
    type Error = SelectionError;

    fn try_from(weights: Vec<f64>) -> Result<Self> {
        if weights.is_empty() {
            return Err(SelectionError::Configuration(
                "feature weights must be non-negative numbers with a positive sum".to_string(),
            ));
        }

        let weights: [f64; FEATURE_WEIGHT_COUNT] = weights.try_into().map_err(|w: Vec<f64>| {
            SelectionError::Configuration(format!(
                "expected {} feature weights, got {}",
                FEATURE_WEIGHT_COUNT,
                w.len()
            ))
        })?;

        Ok(Self(weights))
    }
}
