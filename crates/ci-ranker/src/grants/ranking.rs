use super::domain::{FilterSpec, ProjectRecord, RankedEntry};
use super::loader::Dataset;
use std::collections::{BTreeSet, HashMap};

/// Seam for the top-K aggregation so callers can be exercised with instrumented engines.
pub trait RankingEngine: Send + Sync {
    fn rank(&self, dataset: &Dataset, filter: &FilterSpec, top_k: usize) -> Vec<RankedEntry>;
}

/// Counts matching projects per Chief Investigator and keeps the best `top_k`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AggregationEngine;

impl RankingEngine for AggregationEngine {
    fn rank(&self, dataset: &Dataset, filter: &FilterSpec, top_k: usize) -> Vec<RankedEntry> {
        rank(dataset, filter, top_k)
    }
}

pub fn rank(dataset: &Dataset, filter: &FilterSpec, top_k: usize) -> Vec<RankedEntry> {
    if top_k == 0 {
        return Vec::new();
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in candidate_records(dataset, filter) {
        *counts.entry(record.ci_name.as_str()).or_default() += 1;
    }

    let mut entries: Vec<RankedEntry> = counts
        .into_iter()
        .map(|(ci_name, num_projects)| RankedEntry {
            ci_name: ci_name.to_string(),
            num_projects,
        })
        .collect();

    if entries.len() > top_k {
        entries.select_nth_unstable_by(top_k - 1, RankedEntry::rank_order);
        entries.truncate(top_k);
    }
    entries.sort_unstable_by(RankedEntry::rank_order);
    entries
}

/// Records surviving the code and year predicates, in load order.
///
/// Code selections are resolved through the primary-code index so only the
/// matching slice of the dataset is visited.
pub(crate) fn candidate_records<'a>(
    dataset: &'a Dataset,
    filter: &'a FilterSpec,
) -> Box<dyn Iterator<Item = &'a ProjectRecord> + 'a> {
    let prefixes = if !filter.specific_codes().is_empty() {
        filter.specific_codes()
    } else if !filter.broad_codes().is_empty() {
        filter.broad_codes()
    } else {
        return Box::new(
            dataset
                .records()
                .iter()
                .filter(move |record| filter.admits(record)),
        );
    };

    let positions: BTreeSet<usize> = prefixes
        .iter()
        .flat_map(|prefix| dataset.positions_with_prefix(prefix))
        .collect();

    Box::new(
        positions
            .into_iter()
            .map(move |position| dataset.record_at(position))
            .filter(move |record| filter.admits(record)),
    )
}
