//! Chief Investigator rankings over a research-grants dataset.
//!
//! Records are loaded once into an immutable [`Dataset`]; every query receives its
//! full filter explicitly and the only shared mutable state is the ranking cache.

pub mod cache;
pub mod detail;
pub mod domain;
pub mod hierarchy;
pub mod loader;
pub mod query;
pub mod ranking;
pub mod router;
pub mod views;

#[cfg(test)]
mod tests;

pub use cache::{LruRankingCache, RankingCache, SharedRanking};
pub use detail::detail;
pub use domain::{
    parse_code, BroadCodePolicy, CacheKey, CodeDepth, FilterSpec, ForCode, MalformedCodeError,
    MalformedReason, ProjectRecord, RankedEntry,
};
pub use hierarchy::{HierarchyBuilder, HierarchyIndex, UnknownCodeError};
pub use loader::{Dataset, DatasetLoader, DatasetStats, LoadError, SchemaError};
pub use query::{
    DefaultQueryService, DetailPage, InvalidFilterError, QueryService, QuerySettings,
    RankedView, RankingTier, RawFilterParams, DEFAULT_GRANT_URL_TEMPLATE,
};
pub use ranking::{rank, AggregationEngine, RankingEngine};
pub use router::ranking_router;
pub use views::{
    CiDetailResponse, CodeCatalog, CodeOption, DatasetView, ProjectView, RankedCisResponse,
    YearOption,
};
