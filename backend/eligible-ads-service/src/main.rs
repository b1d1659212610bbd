use eligible_ads_service::{
    config::{parse_segments, SelectionMode},
    models::SelectionRequest,
    sources::{
        BrowsingHistorySource, JsonAdEventLog, JsonBrowsingHistory, JsonCandidateCatalog,
        NoExclusionRules,
    },
    Config, EligibleAdsSelector,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    // Load config
    let config = Config::from_env()?;
    config.validate()?;

    info!(
        "Starting {} in {:?} mode",
        config.service_name, config.selection_mode
    );

    // Initialize sources
    let catalog = JsonCandidateCatalog::load(&config.catalog_path).await?;
    let ad_events = JsonAdEventLog::load(&config.ad_events_path).await?;
    let browsing_history: Arc<dyn BrowsingHistorySource> = match &config.browsing_history_path {
        Some(path) => Arc::new(JsonBrowsingHistory::load(path).await?),
        None => Arc::new(JsonBrowsingHistory::empty()),
    };

    let mut selector = EligibleAdsSelector::new(
        Arc::new(catalog),
        Arc::new(ad_events),
        browsing_history,
        Arc::new(NoExclusionRules),
        config.selection(),
    );
    if let Some(seed) = config.rng_seed {
        selector = selector.with_rng(StdRng::seed_from_u64(seed));
    }

    let request = SelectionRequest::new(
        parse_segments(&config.interest_segments),
        parse_segments(&config.intent_segments),
    );

    let span = info_span!("selection", request_id = %Uuid::new_v4());
    let output = run_selection(&selector, config.selection_mode, &request)
        .instrument(span)
        .await?;

    println!("{}", output);

    Ok(())
}

/// Run one request and render its result as JSON.
async fn run_selection(
    selector: &EligibleAdsSelector,
    mode: SelectionMode,
    request: &SelectionRequest,
) -> Result<String, Box<dyn std::error::Error>> {
    let output = match mode {
        SelectionMode::Features => {
            let selection = selector.get_for_features(request).await?;
            if let Some(ad) = &selection.result {
                selector.set_last_served_ad(ad.clone()).await;
            }
            serde_json::to_string_pretty(&selection)?
        }
        SelectionMode::Segments => {
            let eligible = selector.get_for_segments(&request.segments()).await;
            serde_json::to_string_pretty(&eligible)?
        }
    };

    Ok(output)
}
