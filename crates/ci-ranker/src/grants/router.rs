use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::get,
    Json, Router,
};

use super::cache::RankingCache;
use super::query::{DetailPage, QueryService, RawFilterParams};
use super::ranking::RankingEngine;
use super::views::{CiDetailResponse, CodeCatalog, DatasetView, RankedCisResponse};
use crate::error::AppError;

type QueryPairs = Result<Query<Vec<(String, String)>>, QueryRejection>;

/// Query-string form of the filter.
///
/// Code lists may be repeated keys, comma-separated values, or both.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct FilterQuery {
    selected_codes: Vec<String>,
    selected_2digit_codes: Vec<String>,
    min_year: Option<String>,
    offset: Option<usize>,
    limit: Option<usize>,
}

impl FilterQuery {
    fn from_pairs<I>(pairs: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "selected_codes" => query.selected_codes.extend(split_codes(&value)),
                "selected_2digit_codes" => {
                    query.selected_2digit_codes.extend(split_codes(&value))
                }
                "min_year" => query.min_year = Some(value),
                "offset" => query.offset = parse_count("offset", &value)?,
                "limit" => query.limit = parse_count("limit", &value)?,
                _ => {}
            }
        }
        Ok(query)
    }

    fn extract(pairs: QueryPairs) -> Result<Self, AppError> {
        let Query(pairs) = pairs?;
        Self::from_pairs(pairs)
    }

    fn raw(&self) -> RawFilterParams {
        RawFilterParams {
            selected_codes: self.selected_codes.clone(),
            selected_2digit_codes: self.selected_2digit_codes.clone(),
            min_year: self.min_year.clone(),
        }
    }

    fn page(&self) -> DetailPage {
        DetailPage {
            offset: self.offset,
            limit: self.limit,
        }
    }
}

fn split_codes(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
}

fn parse_count(name: &str, value: &str) -> Result<Option<usize>, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value.parse().map(Some).map_err(|_| {
        AppError::BadRequest(format!("{name} '{value}' must be a non-negative integer"))
    })
}

/// Router builder exposing the catalog, ranking, and detail endpoints.
pub fn ranking_router<E, C>(service: Arc<QueryService<E, C>>) -> Router
where
    E: RankingEngine + 'static,
    C: RankingCache + 'static,
{
    Router::new()
        .route("/api/for_codes", get(codes_handler::<E, C>))
        .route("/api/ranked_cis", get(ranked_handler::<E, C>))
        .route("/api/ci_detail/:ci_name", get(detail_handler::<E, C>))
        .route("/api/dataset", get(dataset_handler::<E, C>))
        .with_state(service)
}

pub(crate) async fn codes_handler<E, C>(
    State(service): State<Arc<QueryService<E, C>>>,
) -> Json<CodeCatalog>
where
    E: RankingEngine + 'static,
    C: RankingCache + 'static,
{
    Json(service.list_codes())
}

pub(crate) async fn ranked_handler<E, C>(
    State(service): State<Arc<QueryService<E, C>>>,
    pairs: QueryPairs,
) -> Result<Json<RankedCisResponse>, AppError>
where
    E: RankingEngine + 'static,
    C: RankingCache + 'static,
{
    let query = FilterQuery::extract(pairs)?;
    let response = service.ranked_cis(&query.raw())?;
    Ok(Json(response))
}

pub(crate) async fn detail_handler<E, C>(
    State(service): State<Arc<QueryService<E, C>>>,
    Path(ci_name): Path<String>,
    pairs: QueryPairs,
) -> Result<Json<CiDetailResponse>, AppError>
where
    E: RankingEngine + 'static,
    C: RankingCache + 'static,
{
    let query = FilterQuery::extract(pairs)?;
    let response = service.ci_detail(&ci_name, &query.raw(), query.page())?;
    Ok(Json(response))
}

pub(crate) async fn dataset_handler<E, C>(
    State(service): State<Arc<QueryService<E, C>>>,
) -> Json<DatasetView>
where
    E: RankingEngine + 'static,
    C: RankingCache + 'static,
{
    Json(service.dataset_view())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn split_codes_ignores_blank_items() {
        assert_eq!(
            split_codes(" 0101, ,010101,").collect::<Vec<_>>(),
            vec!["0101".to_string(), "010101".to_string()]
        );
        assert_eq!(split_codes("").count(), 0);
    }

    #[test]
    fn repeated_and_comma_separated_codes_combine() {
        let query = FilterQuery::from_pairs(pairs(&[
            ("selected_codes", "010101"),
            ("selected_codes", "020202,0301"),
            ("selected_2digit_codes", "01"),
            ("selected_2digit_codes", "02"),
        ]))
        .expect("valid query");

        assert_eq!(query.raw().selected_codes, vec!["010101", "020202", "0301"]);
        assert_eq!(query.raw().selected_2digit_codes, vec!["01", "02"]);
    }

    #[test]
    fn filter_query_maps_paging() {
        let query = FilterQuery::from_pairs(pairs(&[
            ("min_year", "2018"),
            ("offset", "5"),
            ("limit", "10"),
            ("utm_source", "newsletter"),
        ]))
        .expect("valid query");

        assert_eq!(query.raw().min_year.as_deref(), Some("2018"));
        assert_eq!(
            query.page(),
            DetailPage {
                offset: Some(5),
                limit: Some(10)
            }
        );
    }

    #[test]
    fn paging_values_must_be_counts() {
        let err = FilterQuery::from_pairs(pairs(&[("offset", "abc")])).expect_err("bad offset");
        assert!(matches!(err, AppError::BadRequest(message) if message.contains("offset 'abc'")));

        let blank = FilterQuery::from_pairs(pairs(&[("limit", "")])).expect("blank limit");
        assert_eq!(blank.page(), DetailPage::default());
    }
}
