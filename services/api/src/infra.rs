use ci_ranker::config::AppConfig;
use ci_ranker::error::AppError;
use ci_ranker::grants::{
    AggregationEngine, DatasetLoader, DefaultQueryService, LruRankingCache, QueryService,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Load the configured CSV once and wrap it in the ranking façade.
pub(crate) fn load_query_service(config: &AppConfig) -> Result<Arc<DefaultQueryService>, AppError> {
    let dataset = DatasetLoader::from_path(&config.dataset.path)?;
    let cache = LruRankingCache::new(config.query.cache_capacity);

    info!(
        cache_capacity = cache.capacity(),
        broad_code_policy = config.query.broad_code_policy.as_str(),
        "ranking service configured"
    );

    Ok(Arc::new(QueryService::new(
        Arc::new(dataset),
        Arc::new(AggregationEngine),
        Arc::new(cache),
        config.query.settings(),
    )))
}
