use crate::infra::load_query_service;
use ci_ranker::config::AppConfig;
use ci_ranker::error::AppError;
use ci_ranker::telemetry::{self, LogOutput};
use ci_ranker::grants::{
    CiDetailResponse, CodeCatalog, DefaultQueryService, DetailPage, RankedCisResponse,
    RawFilterParams,
};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct SourceArgs {
    /// Grants CSV to load instead of APP_DATASET_PATH
    #[arg(long)]
    pub(crate) dataset: Option<PathBuf>,
    /// Print the response as JSON instead of a text table
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct FilterArgs {
    /// FoR codes of any depth, comma-separated
    #[arg(long, value_delimiter = ',')]
    pub(crate) codes: Vec<String>,
    /// 2-digit FoR divisions, comma-separated
    #[arg(long, value_delimiter = ',')]
    pub(crate) divisions: Vec<String>,
    /// Only count projects commencing in or after this year
    #[arg(long)]
    pub(crate) min_year: Option<String>,
}

impl FilterArgs {
    fn raw(&self) -> RawFilterParams {
        RawFilterParams {
            selected_codes: self.codes.clone(),
            selected_2digit_codes: self.divisions.clone(),
            min_year: self.min_year.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct RankArgs {
    #[command(flatten)]
    pub(crate) source: SourceArgs,
    #[command(flatten)]
    pub(crate) filter: FilterArgs,
}

#[derive(Args, Debug)]
pub(crate) struct DetailArgs {
    /// Chief Investigator name as it appears in the ranking
    pub(crate) ci_name: String,
    #[command(flatten)]
    pub(crate) source: SourceArgs,
    #[command(flatten)]
    pub(crate) filter: FilterArgs,
    /// Skip this many projects
    #[arg(long)]
    pub(crate) offset: Option<usize>,
    /// Show at most this many projects
    #[arg(long)]
    pub(crate) limit: Option<usize>,
}

#[derive(Args, Debug)]
pub(crate) struct CodesArgs {
    #[command(flatten)]
    pub(crate) source: SourceArgs,
    /// Only list 2-digit divisions
    #[arg(long)]
    pub(crate) divisions_only: bool,
}

pub(crate) fn run_rank(args: RankArgs) -> Result<(), AppError> {
    let service = open_service(&args.source)?;
    let response = service.ranked_cis(&args.filter.raw())?;
    emit(&response, args.source.json, render_ranking)
}

pub(crate) fn run_detail(args: DetailArgs) -> Result<(), AppError> {
    let service = open_service(&args.source)?;
    let page = DetailPage {
        offset: args.offset,
        limit: args.limit,
    };
    let response = service.ci_detail(&args.ci_name, &args.filter.raw(), page)?;
    emit(&response, args.source.json, render_detail)
}

pub(crate) fn run_codes(args: CodesArgs) -> Result<(), AppError> {
    let service = open_service(&args.source)?;
    let catalog = service.list_codes();
    let divisions_only = args.divisions_only;
    emit(&catalog, args.source.json, |catalog| {
        render_catalog(catalog, divisions_only)
    })
}

fn open_service(source: &SourceArgs) -> Result<Arc<DefaultQueryService>, AppError> {
    let mut config = AppConfig::load()?;
    if let Some(path) = source.dataset.clone() {
        config.dataset.path = path;
    }

    telemetry::init(&config.telemetry, LogOutput::Stderr)?;
    load_query_service(&config)
}

fn emit<T, F>(value: &T, json: bool, render: F) -> Result<(), AppError>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    if json {
        let payload = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
        println!("{payload}");
    } else {
        print!("{}", render(value));
    }
    Ok(())
}

pub(crate) fn render_ranking(response: &RankedCisResponse) -> String {
    let scope = if response.is_overall {
        "all projects"
    } else {
        "filtered projects"
    };
    let mut out = format!("Top {} Chief Investigators ({scope})\n", response.top_k);

    if response.ranked_cis.is_empty() {
        out.push_str("No Chief Investigators match the selected filters.\n");
        return out;
    }

    let width = response
        .ranked_cis
        .iter()
        .map(|entry| entry.ci_name.chars().count())
        .max()
        .unwrap_or_default();
    for (position, entry) in response.ranked_cis.iter().enumerate() {
        out.push_str(&format!(
            "{:>3}. {:<width$}  {}\n",
            position + 1,
            entry.ci_name,
            entry.num_projects,
        ));
    }
    out
}

pub(crate) fn render_detail(response: &CiDetailResponse) -> String {
    let mut out = format!(
        "{} ({} matching projects)\n",
        response.ci_name, response.total_projects
    );
    for project in &response.projects {
        out.push_str(&format!(
            "- {} {} | {} | {}\n  {}\n",
            project.year, project.code, project.org, project.for_primary, project.url
        ));
    }
    if response.projects.len() < response.total_projects {
        out.push_str(&format!(
            "Showing {} of {} projects\n",
            response.projects.len(),
            response.total_projects
        ));
    }
    out
}

pub(crate) fn render_catalog(catalog: &CodeCatalog, divisions_only: bool) -> String {
    let codes = if divisions_only {
        &catalog.two_digit_codes
    } else {
        &catalog.specific_codes
    };

    let mut out = String::from("FoR codes\n");
    for option in codes {
        out.push_str(&format!("- {}\n", option.label));
    }
    if !divisions_only {
        out.push_str("Years\n");
        for option in &catalog.years {
            out.push_str(&format!("- {}\n", option.label));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ci_ranker::grants::{CodeOption, LoadError, ProjectView, RankedEntry, YearOption};

    fn option(value: &str, label: &str) -> CodeOption {
        CodeOption {
            value: value.to_string(),
            label: label.to_string(),
        }
    }

    #[test]
    fn missing_dataset_is_a_load_error() {
        let source = SourceArgs {
            dataset: Some(PathBuf::from("./does-not-exist/grants.csv")),
            json: false,
        };

        match open_service(&source) {
            Err(AppError::Load(LoadError::Io(_))) => {}
            Err(other) => panic!("expected dataset io error, got {other}"),
            Ok(_) => panic!("expected dataset io error"),
        }
    }

    #[test]
    fn ranking_table_numbers_entries() {
        let response = RankedCisResponse {
            ranked_cis: vec![
                RankedEntry {
                    ci_name: "Prof A Smith".to_string(),
                    num_projects: 4,
                },
                RankedEntry {
                    ci_name: "Dr B Jones".to_string(),
                    num_projects: 2,
                },
            ],
            is_overall: true,
            top_k: 30,
        };

        let text = render_ranking(&response);
        assert!(text.starts_with("Top 30 Chief Investigators (all projects)"));
        assert!(text.contains("  1. Prof A Smith  4"));
        assert!(text.contains("  2. Dr B Jones    2"));
    }

    #[test]
    fn empty_ranking_says_so() {
        let response = RankedCisResponse {
            ranked_cis: Vec::new(),
            is_overall: false,
            top_k: 10,
        };

        assert!(render_ranking(&response).contains("No Chief Investigators match"));
    }

    #[test]
    fn detail_notes_paging() {
        let response = CiDetailResponse {
            ci_name: "Prof A Smith".to_string(),
            total_projects: 3,
            projects: vec![ProjectView {
                code: "DP210100001".to_string(),
                url: "https://dataportal.arc.gov.au/NCGP/Web/Grant/Grant/DP210100001"
                    .to_string(),
                year: 2021,
                org: "Monash University".to_string(),
                for_primary: "Artificial life".to_string(),
            }],
        };

        let text = render_detail(&response);
        assert!(text.contains("- 2021 DP210100001 | Monash University | Artificial life"));
        assert!(text.ends_with("Showing 1 of 3 projects\n"));
    }

    #[test]
    fn catalog_can_list_divisions_only() {
        let catalog = CodeCatalog {
            specific_codes: vec![
                option("46", "46 \u{2014} Information and Computing Sciences"),
                option("4602", "4602 \u{2014} Artificial intelligence"),
            ],
            two_digit_codes: vec![option(
                "46",
                "46 \u{2014} Information and Computing Sciences",
            )],
            years: vec![YearOption::from_year(2020)],
        };

        let full = render_catalog(&catalog, false);
        assert!(full.contains("- 4602 \u{2014} Artificial intelligence"));
        assert!(full.contains("- From 2020 onwards"));

        let divisions = render_catalog(&catalog, true);
        assert!(!divisions.contains("4602"));
        assert!(!divisions.contains("Years"));
    }
}
