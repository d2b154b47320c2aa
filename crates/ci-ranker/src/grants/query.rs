use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cache::{LruRankingCache, RankingCache, SharedRanking};
use super::detail::detail;
use super::domain::{parse_code, BroadCodePolicy, CodeDepth, FilterSpec, ForCode};
use super::loader::{normalize_name, Dataset};
use super::ranking::{AggregationEngine, RankingEngine};
use super::views::{
    CiDetailResponse, CodeCatalog, CodeOption, DatasetView, ProjectView, RankedCisResponse,
    YearOption,
};

pub const DEFAULT_GRANT_URL_TEMPLATE: &str =
    "https://dataportal.arc.gov.au/NCGP/Web/Grant/Grant/{code}";

/// Filter parameters exactly as a caller supplied them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawFilterParams {
    #[serde(default)]
    pub selected_codes: Vec<String>,
    #[serde(default)]
    pub selected_2digit_codes: Vec<String>,
    #[serde(default)]
    pub min_year: Option<String>,
}

/// Caller-supplied filter that cannot be applied to the dataset.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidFilterError {
    #[error("unknown FoR code '{0}'")]
    UnknownCode(String),
    #[error("'{0}' is not a 2-digit FoR division")]
    NotBroadCode(String),
    #[error("minimum year '{0}' is not a number")]
    InvalidYear(String),
}

/// Ranking depth policy keyed on the scope of the active filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingTier {
    Overall,
    Division,
    Group,
    Field,
}

impl RankingTier {
    pub fn for_filter(filter: &FilterSpec) -> Self {
        match filter.scope_depth() {
            None => Self::Overall,
            Some(CodeDepth::Division) => Self::Division,
            Some(CodeDepth::Group) => Self::Group,
            Some(CodeDepth::Field) => Self::Field,
        }
    }

    pub const fn top_k(self) -> usize {
        match self {
            Self::Overall => 30,
            Self::Division => 50,
            Self::Group => 30,
            Self::Field => 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuerySettings {
    pub broad_code_policy: BroadCodePolicy,
    pub grant_url_template: String,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            broad_code_policy: BroadCodePolicy::default(),
            grant_url_template: DEFAULT_GRANT_URL_TEMPLATE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RankedView {
    pub entries: SharedRanking,
    pub is_overall: bool,
    pub tier: RankingTier,
}

/// Optional window over a CI's project list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct DetailPage {
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

pub type DefaultQueryService = QueryService<AggregationEngine, LruRankingCache>;

/// Stateless entry point composing filter validation, tiering, caching, and aggregation.
pub struct QueryService<E, C> {
    dataset: Arc<Dataset>,
    engine: Arc<E>,
    cache: Arc<C>,
    settings: QuerySettings,
}

impl<E, C> QueryService<E, C>
where
    E: RankingEngine + 'static,
    C: RankingCache + 'static,
{
    pub fn new(
        dataset: Arc<Dataset>,
        engine: Arc<E>,
        cache: Arc<C>,
        settings: QuerySettings,
    ) -> Self {
        Self {
            dataset,
            engine,
            cache,
            settings,
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn settings(&self) -> &QuerySettings {
        &self.settings
    }

    /// Validate raw parameters against the hierarchy and normalize them.
    pub fn resolve_filter(&self, raw: &RawFilterParams) -> Result<FilterSpec, InvalidFilterError> {
        let hierarchy = self.dataset.hierarchy();

        let specific = cleaned(&raw.selected_codes)
            .map(|code| {
                if hierarchy.contains(code) {
                    Ok(code.to_string())
                } else {
                    Err(InvalidFilterError::UnknownCode(code.to_string()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let broad = cleaned(&raw.selected_2digit_codes)
            .map(|code| match parse_code(code) {
                Ok((code, CodeDepth::Division)) if hierarchy.contains(&code) => Ok(code),
                Ok((code, CodeDepth::Division)) => Err(InvalidFilterError::UnknownCode(code)),
                _ => Err(InvalidFilterError::NotBroadCode(code.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let min_year = match raw.min_year.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(value) => Some(
                value
                    .parse::<i32>()
                    .map_err(|_| InvalidFilterError::InvalidYear(value.to_string()))?,
            ),
        };

        Ok(FilterSpec::with_policy(
            specific,
            broad,
            min_year,
            self.settings.broad_code_policy,
        ))
    }

    /// Resolve, tier, and serve a ranking, computing it only on a cache miss.
    pub fn ranked_view(&self, raw: &RawFilterParams) -> Result<RankedView, InvalidFilterError> {
        let filter = self.resolve_filter(raw)?;
        let tier = RankingTier::for_filter(&filter);
        let key = filter.cache_key(tier.top_k());
        let is_overall = filter.is_overall();

        if let Some(entries) = self.cache.get(&key) {
            debug!(%key, "ranking cache hit");
            return Ok(RankedView {
                entries,
                is_overall,
                tier,
            });
        }

        debug!(%key, "ranking cache miss");
        let entries: SharedRanking = self
            .engine
            .rank(&self.dataset, &filter, tier.top_k())
            .into();
        self.cache.put(key, entries.clone());

        Ok(RankedView {
            entries,
            is_overall,
            tier,
        })
    }

    pub fn list_codes(&self) -> CodeCatalog {
        let hierarchy = self.dataset.hierarchy();
        let option = |node: &ForCode| CodeOption {
            value: node.code.clone(),
            label: node.label(),
        };

        CodeCatalog {
            specific_codes: hierarchy.iter().map(option).collect(),
            two_digit_codes: hierarchy.at_depth(CodeDepth::Division).map(option).collect(),
            years: self
                .dataset
                .years()
                .into_iter()
                .map(YearOption::from_year)
                .collect(),
        }
    }

    pub fn ranked_cis(
        &self,
        raw: &RawFilterParams,
    ) -> Result<RankedCisResponse, InvalidFilterError> {
        let view = self.ranked_view(raw)?;
        Ok(RankedCisResponse {
            ranked_cis: view.entries.to_vec(),
            is_overall: view.is_overall,
            top_k: view.tier.top_k(),
        })
    }

    pub fn ci_detail(
        &self,
        ci_name: &str,
        raw: &RawFilterParams,
        page: DetailPage,
    ) -> Result<CiDetailResponse, InvalidFilterError> {
        let filter = self.resolve_filter(raw)?;
        let ci_name = normalize_name(ci_name);
        let projects = detail(&self.dataset, &filter, &ci_name);
        let total_projects = projects.len();

        let projects = projects
            .into_iter()
            .skip(page.offset.unwrap_or(0))
            .take(page.limit.unwrap_or(usize::MAX))
            .map(|record| ProjectView::from_record(record, &self.settings.grant_url_template))
            .collect();

        Ok(CiDetailResponse {
            ci_name,
            total_projects,
            projects,
        })
    }

    pub fn dataset_view(&self) -> DatasetView {
        DatasetView {
            stats: self.dataset.stats(),
            two_digit_codes: self.dataset.code_count(CodeDepth::Division),
            four_digit_codes: self.dataset.code_count(CodeDepth::Group),
            six_digit_codes: self.dataset.code_count(CodeDepth::Field),
        }
    }

    pub fn cached_rankings(&self) -> usize {
        self.cache.len()
    }
}

fn cleaned(codes: &[String]) -> impl Iterator<Item = &str> {
    codes
        .iter()
        .map(|code| code.trim())
        .filter(|code| !code.is_empty())
}
