use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::grants::cache::LruRankingCache;
use crate::grants::domain::{BroadCodePolicy, FilterSpec, ProjectRecord, RankedEntry};
use crate::grants::loader::Dataset;
use crate::grants::query::{QueryService, QuerySettings, RawFilterParams};
use crate::grants::ranking::{AggregationEngine, RankingEngine};

/// Wraps the aggregation engine and counts how often it is invoked.
#[derive(Debug, Default)]
pub(super) struct CountingEngine {
    calls: AtomicUsize,
}

impl CountingEngine {
    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RankingEngine for CountingEngine {
    fn rank(&self, dataset: &Dataset, filter: &FilterSpec, top_k: usize) -> Vec<RankedEntry> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        AggregationEngine.rank(dataset, filter, top_k)
    }
}

pub(super) type TestService = QueryService<CountingEngine, LruRankingCache>;

pub(super) fn record(ci: &str, project: &str, code: &str, year: i32) -> ProjectRecord {
    ProjectRecord {
        code: project.to_string(),
        ci_name: ci.to_string(),
        organisation: "University of Sydney".to_string(),
        year,
        for_primary: code.to_string(),
        for_primary_name: Some(format!("Field {code}")),
    }
}

/// Three records: A (010101, 2015), B (010101, 2020), B (020202, 2020).
pub(super) fn three_record_dataset() -> Dataset {
    Dataset::from_records(vec![
        record("A", "DP150100001", "010101", 2015),
        record("B", "DP200100002", "010101", 2020),
        record("B", "DP200100003", "020202", 2020),
    ])
    .expect("valid dataset")
}

pub(super) fn build_service_with(
    dataset: Dataset,
    policy: BroadCodePolicy,
    capacity: usize,
) -> (Arc<TestService>, Arc<CountingEngine>) {
    let engine = Arc::new(CountingEngine::default());
    let cache = Arc::new(LruRankingCache::new(
        NonZeroUsize::new(capacity).expect("non-zero capacity"),
    ));
    let settings = QuerySettings {
        broad_code_policy: policy,
        ..QuerySettings::default()
    };
    let service = QueryService::new(Arc::new(dataset), engine.clone(), cache, settings);
    (Arc::new(service), engine)
}

pub(super) fn build_service() -> (Arc<TestService>, Arc<CountingEngine>) {
    build_service_with(three_record_dataset(), BroadCodePolicy::Precedence, 16)
}

pub(super) fn params(specific: &[&str], broad: &[&str], min_year: Option<&str>) -> RawFilterParams {
    RawFilterParams {
        selected_codes: specific.iter().map(|code| code.to_string()).collect(),
        selected_2digit_codes: broad.iter().map(|code| code.to_string()).collect(),
        min_year: min_year.map(str::to_string),
    }
}

pub(super) fn entry(name: &str, count: usize) -> RankedEntry {
    RankedEntry {
        ci_name: name.to_string(),
        num_projects: count,
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
