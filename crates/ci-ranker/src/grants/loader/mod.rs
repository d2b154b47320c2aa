mod normalizer;
mod parser;

use super::domain::{CodeDepth, MalformedCodeError, ProjectRecord};
use super::hierarchy::{HierarchyBuilder, HierarchyIndex};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

pub(crate) use normalizer::normalize_name;
use parser::GrantRow;

/// The source is missing columns every row depends on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("dataset is missing required columns: {}", .missing.join(", "))]
pub struct SchemaError {
    pub missing: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read grants dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid grants CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Diagnostics describing how the dataset was loaded.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetStats {
    pub records: usize,
    pub distinct_cis: usize,
    pub codes: usize,
    pub skipped_records: usize,
    pub malformed_codes: usize,
    pub loaded_at: DateTime<Utc>,
}

/// Immutable in-memory grants dataset with lookup indices.
#[derive(Debug)]
pub struct Dataset {
    records: Vec<ProjectRecord>,
    hierarchy: HierarchyIndex,
    by_code: BTreeMap<String, Vec<usize>>,
    by_ci: HashMap<String, Vec<usize>>,
    skipped_records: usize,
    malformed_codes: usize,
    loaded_at: DateTime<Utc>,
}

impl Dataset {
    /// Build a dataset from already-validated records.
    pub fn from_records(records: Vec<ProjectRecord>) -> Result<Self, MalformedCodeError> {
        let hierarchy = HierarchyIndex::load_codes(&records)?;
        Ok(Self::assemble(records, hierarchy, 0, 0))
    }

    fn assemble(
        records: Vec<ProjectRecord>,
        hierarchy: HierarchyIndex,
        skipped_records: usize,
        malformed_codes: usize,
    ) -> Self {
        let mut by_code: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut by_ci: HashMap<String, Vec<usize>> = HashMap::new();

        for (position, record) in records.iter().enumerate() {
            by_code
                .entry(record.for_primary.clone())
                .or_default()
                .push(position);
            by_ci
                .entry(record.ci_name.clone())
                .or_default()
                .push(position);
        }

        Self {
            records,
            hierarchy,
            by_code,
            by_ci,
            skipped_records,
            malformed_codes,
            loaded_at: Utc::now(),
        }
    }

    pub fn records(&self) -> &[ProjectRecord] {
        &self.records
    }

    pub fn hierarchy(&self) -> &HierarchyIndex {
        &self.hierarchy
    }

    /// Number of distinct codes present at the given depth.
    pub fn code_count(&self, depth: CodeDepth) -> usize {
        self.hierarchy.at_depth(depth).count()
    }

    pub fn skipped_records(&self) -> usize {
        self.skipped_records
    }

    pub fn malformed_codes(&self) -> usize {
        self.malformed_codes
    }

    /// Positions of records whose primary code starts with `prefix`, in load order.
    pub(crate) fn positions_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = usize> + 'a {
        self.by_code
            .range(prefix.to_string()..)
            .take_while(move |(code, _)| code.starts_with(prefix))
            .flat_map(|(_, positions)| positions.iter().copied())
    }

    pub(crate) fn record_at(&self, position: usize) -> &ProjectRecord {
        &self.records[position]
    }

    pub fn records_for_ci(&self, ci_name: &str) -> impl Iterator<Item = &ProjectRecord> + '_ {
        self.by_ci
            .get(ci_name)
            .into_iter()
            .flatten()
            .map(|position| &self.records[*position])
    }

    /// Distinct commencement years, ascending.
    pub fn years(&self) -> Vec<i32> {
        self.records
            .iter()
            .map(|record| record.year)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn stats(&self) -> DatasetStats {
        DatasetStats {
            records: self.records.len(),
            distinct_cis: self.by_ci.len(),
            codes: self.hierarchy.len(),
            skipped_records: self.skipped_records,
            malformed_codes: self.malformed_codes,
            loaded_at: self.loaded_at,
        }
    }
}

pub struct DatasetLoader;

impl DatasetLoader {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Dataset, LoadError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading grants dataset");
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Dataset, LoadError> {
        let mut rows = parser::open(reader)?;
        let mut state = LoadState::default();

        for (line, row) in rows.rows().enumerate() {
            state.apply(line + 2, row?);
        }

        let LoadState {
            records,
            hierarchy,
            skipped_records,
            malformed_codes,
        } = state;
        let dataset = Dataset::assemble(records, hierarchy.build(), skipped_records, malformed_codes);

        info!(
            records = dataset.records.len(),
            codes = dataset.hierarchy.len(),
            skipped = dataset.skipped_records,
            malformed_codes = dataset.malformed_codes,
            "grants dataset loaded"
        );

        Ok(dataset)
    }
}

#[derive(Default)]
struct LoadState {
    records: Vec<ProjectRecord>,
    hierarchy: HierarchyBuilder,
    skipped_records: usize,
    malformed_codes: usize,
}

impl LoadState {
    fn apply(&mut self, line: usize, row: GrantRow) {
        let Some(code) = row.code.as_deref().map(str::trim) else {
            return self.skip(line, "missing project code");
        };
        let ci_names = row
            .chief_investigators
            .as_deref()
            .map(normalizer::split_list)
            .unwrap_or_default();
        if ci_names.is_empty() {
            return self.skip(line, "empty chief investigator");
        }
        let Some(year) = row
            .funding_commencement_year
            .as_deref()
            .and_then(normalizer::parse_year)
        else {
            return self.skip(line, "unparsable commencement year");
        };

        let primary_codes = row
            .for_primary_codes
            .as_deref()
            .map(normalizer::split_list)
            .unwrap_or_default();
        let primary_name = row
            .for_primary_names
            .as_deref()
            .map(normalizer::split_list)
            .and_then(|names| names.into_iter().next());
        let raw_primary = primary_codes.first().map(String::as_str).unwrap_or_default();

        let for_primary = match self.hierarchy.observe(raw_primary, primary_name.as_deref()) {
            Ok(_) => raw_primary.to_string(),
            Err(err) => {
                self.malformed_codes += 1;
                warn!(line, error = %err, "skipping record with malformed primary FoR code");
                return self.skip(line, "malformed primary FoR code");
            }
        };

        self.observe_secondary_codes(line, &row);

        let organisation = row
            .administering_organisation
            .as_deref()
            .map(normalizer::normalize_name)
            .unwrap_or_default();

        let mut seen = BTreeSet::new();
        for ci_name in ci_names {
            if !seen.insert(ci_name.clone()) {
                continue;
            }
            self.records.push(ProjectRecord {
                code: code.to_string(),
                ci_name,
                organisation: organisation.clone(),
                year,
                for_primary: for_primary.clone(),
                for_primary_name: primary_name.clone(),
            });
        }
    }

    fn observe_secondary_codes(&mut self, line: usize, row: &GrantRow) {
        let Some(codes) = row.for_all_codes.as_deref().map(normalizer::split_list) else {
            return;
        };
        let names = row
            .for_all_names
            .as_deref()
            .map(normalizer::split_list)
            .unwrap_or_default();

        for (position, code) in codes.iter().enumerate() {
            let name = names.get(position).map(String::as_str);
            if let Err(err) = self.hierarchy.observe(code, name) {
                self.malformed_codes += 1;
                debug!(line, error = %err, "ignoring malformed secondary FoR code");
            }
        }
    }

    fn skip(&mut self, line: usize, reason: &'static str) {
        self.skipped_records += 1;
        debug!(line, reason, "skipping grants row");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str = "code,chief_investigators,funding_commencement_year,administering_organisation,for_primary_codes,for_primary_names,for_all_codes,for_all_names\n";

    fn load(body: &str) -> Dataset {
        DatasetLoader::from_reader(Cursor::new(format!("{HEADER}{body}"))).expect("dataset loads")
    }

    #[test]
    fn schema_error_lists_every_missing_column() {
        let err = DatasetLoader::from_reader(Cursor::new("code,chief_investigators\nDP1,A\n"))
            .expect_err("schema error");

        match err {
            LoadError::Schema(SchemaError { missing }) => assert_eq!(
                missing,
                vec![
                    "funding_commencement_year".to_string(),
                    "administering_organisation".to_string(),
                    "for_primary_codes".to_string(),
                ]
            ),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn loader_explodes_investigator_lists() {
        let dataset = load(
            "DP150100001,Prof A Smith; Dr B Jones; Prof A Smith,2015,University of Sydney,010101,Algebra,,\n",
        );

        assert_eq!(dataset.records().len(), 2);
        assert!(dataset
            .records()
            .iter()
            .all(|record| record.code == "DP150100001" && record.year == 2015));
        assert_eq!(dataset.records_for_ci("Prof A Smith").count(), 1);
        assert_eq!(dataset.records_for_ci("Dr B Jones").count(), 1);
    }

    #[test]
    fn loader_counts_skipped_rows() {
        let dataset = load(
            "DP1,,2015,Monash University,010101,,,\n\
DP2,Prof A Smith,unknown,Monash University,010101,,,\n\
DP3,Prof A Smith,2016,Monash University,01x101,,,\n\
DP4,Prof A Smith,2017.0,Monash University,010101; 020202,Algebra; Physics,,\n",
        );

        assert_eq!(dataset.records().len(), 1);
        assert_eq!(dataset.skipped_records(), 3);
        assert_eq!(dataset.malformed_codes(), 1);

        let record = &dataset.records()[0];
        assert_eq!(record.year, 2017);
        assert_eq!(record.for_primary, "010101");
        assert_eq!(record.for_primary_name.as_deref(), Some("Algebra"));
    }

    #[test]
    fn secondary_codes_extend_the_catalog() {
        let dataset = load(
            "DP1,Prof A Smith,2015,Monash University,010101,Algebra,0101; 010101; 0x,Pure Mathematics; Algebra; Broken\n",
        );

        let hierarchy = dataset.hierarchy();
        assert_eq!(
            hierarchy.label_of("0101").expect("group known"),
            "0101 \u{2014} Pure Mathematics"
        );
        assert_eq!(dataset.malformed_codes(), 1);
        assert_eq!(dataset.skipped_records(), 0);
        assert_eq!(dataset.code_count(CodeDepth::Field), 1);
    }

    #[test]
    fn loader_tolerates_extra_columns_and_bom() {
        let csv = "\u{feff}code,chief_investigators,funding_commencement_year,administering_organisation,for_primary_codes,grant_status\nDP1,Prof A Smith,2020,UNSW,080101,Active\n";
        let dataset = DatasetLoader::from_reader(Cursor::new(csv)).expect("dataset loads");

        assert_eq!(dataset.records().len(), 1);
        assert_eq!(dataset.years(), vec![2020]);
        assert!(dataset.hierarchy().contains("08"));
    }

    #[test]
    fn from_path_propagates_io_errors() {
        let err = DatasetLoader::from_path("./does-not-exist.csv").expect_err("io error");
        assert!(matches!(err, LoadError::Io(_)));
    }
}
