use super::domain::{ProjectRecord, RankedEntry};
use super::loader::DatasetStats;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearOption {
    pub value: String,
    pub label: String,
}

impl YearOption {
    pub fn from_year(year: i32) -> Self {
        Self {
            value: year.to_string(),
            label: format!("From {year} onwards"),
        }
    }
}

/// Full selection catalog for populating filter controls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeCatalog {
    pub specific_codes: Vec<CodeOption>,
    pub two_digit_codes: Vec<CodeOption>,
    pub years: Vec<YearOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCisResponse {
    pub ranked_cis: Vec<RankedEntry>,
    pub is_overall: bool,
    pub top_k: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectView {
    pub code: String,
    pub url: String,
    pub year: i32,
    pub org: String,
    pub for_primary: String,
}

impl ProjectView {
    pub fn from_record(record: &ProjectRecord, url_template: &str) -> Self {
        Self {
            code: record.code.clone(),
            url: url_template.replace("{code}", &record.code),
            year: record.year,
            org: record.organisation.clone(),
            for_primary: record
                .for_primary_name
                .clone()
                .unwrap_or_else(|| record.for_primary.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiDetailResponse {
    pub ci_name: String,
    pub total_projects: usize,
    pub projects: Vec<ProjectView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetView {
    #[serde(flatten)]
    pub stats: DatasetStats,
    pub two_digit_codes: usize,
    pub four_digit_codes: usize,
    pub six_digit_codes: usize,
}
