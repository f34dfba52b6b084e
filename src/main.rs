use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use commutesense::{
    AppState, CommuteSenseConfig, DailyForecastService, PersistentCache, Providers, RoutePipeline,
    api, telemetry, web,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    aide::generate::on_error(|error| tracing::error!("{}", error));
    aide::generate::extract_schemas(true);

    if std::env::args().any(|a| a == "--generate-openapi") {
        let spec = serde_json::to_string_pretty(&api::openapi_document())?;
        println!("{spec}");
        return Ok(());
    }

    let config = CommuteSenseConfig::load().context("Failed to load configuration")?;
    let _telemetry = telemetry::init(&config.logging)?;

    let cache = if config.cache.enabled {
        let path = config.resolved_cache_path();
        match PersistentCache::open(&path) {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::warn!(path = %path.display(), "Weather cache disabled: {e}");
                None
            }
        }
    } else {
        None
    };

    let providers = Providers::from_config(&config, cache)?;
    let request_timeout = Duration::from_secs(u64::from(config.pipeline.request_timeout_seconds));
    let state = Arc::new(AppState {
        pipeline: Arc::new(RoutePipeline::new(providers.clone(), request_timeout)),
        forecasts: Arc::new(DailyForecastService::new(providers, request_timeout)),
    });

    web::run(&config.server, state).await
}
