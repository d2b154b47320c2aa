use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// Granularity of a Field-of-Research code, coarse to fine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeDepth {
    Division,
    Group,
    Field,
}

impl CodeDepth {
    pub const fn digits(self) -> usize {
        match self {
            Self::Division => 2,
            Self::Group => 4,
            Self::Field => 6,
        }
    }

    pub const fn from_digits(digits: usize) -> Option<Self> {
        match digits {
            2 => Some(Self::Division),
            4 => Some(Self::Group),
            6 => Some(Self::Field),
            _ => None,
        }
    }

    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::Division => None,
            Self::Group => Some(Self::Division),
            Self::Field => Some(Self::Group),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    Empty,
    NonNumeric,
    Length(usize),
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::Empty => write!(f, "code is empty"),
            MalformedReason::NonNumeric => write!(f, "code must contain digits only"),
            MalformedReason::Length(len) => {
                write!(f, "code has {len} digits, expected 2, 4, or 6")
            }
        }
    }
}

/// A FoR code string that does not follow the 2/4/6 digit structure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed FoR code '{code}': {reason}")]
pub struct MalformedCodeError {
    pub code: String,
    pub reason: MalformedReason,
}

/// Validate a raw code string, returning the trimmed code and its depth.
pub fn parse_code(raw: &str) -> Result<(String, CodeDepth), MalformedCodeError> {
    let code = raw.trim();
    let malformed = |reason| MalformedCodeError {
        code: code.to_string(),
        reason,
    };

    if code.is_empty() {
        return Err(malformed(MalformedReason::Empty));
    }
    if !code.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(malformed(MalformedReason::NonNumeric));
    }

    let depth =
        CodeDepth::from_digits(code.len()).ok_or(malformed(MalformedReason::Length(code.len())))?;
    Ok((code.to_string(), depth))
}

/// A node in the FoR hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForCode {
    pub code: String,
    pub depth: CodeDepth,
    pub name: Option<String>,
    pub parent: Option<String>,
}

impl ForCode {
    /// Display label in the `"<code> — <name>"` form, or the bare code when unnamed.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{} \u{2014} {}", self.code, name),
            None => self.code.clone(),
        }
    }
}

/// One funded grant as seen from a single Chief Investigator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectRecord {
    pub code: String,
    pub ci_name: String,
    pub organisation: String,
    pub year: i32,
    pub for_primary: String,
    pub for_primary_name: Option<String>,
}

impl ProjectRecord {
    pub fn division(&self) -> &str {
        &self.for_primary[..CodeDepth::Division.digits().min(self.for_primary.len())]
    }
}

/// How broad (2-digit) selections interact with specific code selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadCodePolicy {
    /// Specific codes win; broad selections are dropped once any specific code is active.
    #[default]
    Precedence,
    /// Both selections narrow the candidate set.
    Intersect,
}

impl BroadCodePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "precedence" | "specific" => Some(Self::Precedence),
            "intersect" | "both" => Some(Self::Intersect),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Precedence => "precedence",
            Self::Intersect => "intersect",
        }
    }
}

/// Normalized query over the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterSpec {
    specific: BTreeSet<String>,
    broad: BTreeSet<String>,
    min_year: Option<i32>,
    policy: BroadCodePolicy,
}

impl FilterSpec {
    pub fn overall() -> Self {
        Self::default()
    }

    pub fn new<S, B>(specific: S, broad: B, min_year: Option<i32>) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        B: IntoIterator,
        B::Item: Into<String>,
    {
        Self::with_policy(specific, broad, min_year, BroadCodePolicy::default())
    }

    pub fn with_policy<S, B>(
        specific: S,
        broad: B,
        min_year: Option<i32>,
        policy: BroadCodePolicy,
    ) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        B: IntoIterator,
        B::Item: Into<String>,
    {
        let specific: BTreeSet<String> = specific.into_iter().map(Into::into).collect();
        let mut broad: BTreeSet<String> = broad.into_iter().map(Into::into).collect();

        if policy == BroadCodePolicy::Precedence && !specific.is_empty() {
            broad.clear();
        }

        Self {
            specific,
            broad,
            min_year,
            policy,
        }
    }

    pub fn specific_codes(&self) -> &BTreeSet<String> {
        &self.specific
    }

    pub fn broad_codes(&self) -> &BTreeSet<String> {
        &self.broad
    }

    pub fn min_year(&self) -> Option<i32> {
        self.min_year
    }

    pub fn policy(&self) -> BroadCodePolicy {
        self.policy
    }

    pub fn is_overall(&self) -> bool {
        self.specific.is_empty() && self.broad.is_empty() && self.min_year.is_none()
    }

    /// Shallowest depth among the active code selections, if any code is selected.
    pub fn scope_depth(&self) -> Option<CodeDepth> {
        if !self.specific.is_empty() {
            return self
                .specific
                .iter()
                .filter_map(|code| CodeDepth::from_digits(code.len()))
                .min();
        }
        if !self.broad.is_empty() {
            return Some(CodeDepth::Division);
        }
        None
    }

    /// Whether a record survives the code and year predicates.
    pub fn admits(&self, record: &ProjectRecord) -> bool {
        let codes_match = if !self.specific.is_empty() {
            let specific = self
                .specific
                .iter()
                .any(|code| record.for_primary.starts_with(code.as_str()));
            specific && (self.broad.is_empty() || self.broad.contains(record.division()))
        } else if !self.broad.is_empty() {
            self.broad.contains(record.division())
        } else {
            true
        };

        codes_match && self.min_year.map_or(true, |bound| record.year >= bound)
    }

    pub fn cache_key(&self, top_k: usize) -> CacheKey {
        let join = |codes: &BTreeSet<String>| codes.iter().cloned().collect::<Vec<_>>().join(",");
        let min_year = self
            .min_year
            .map(|year| year.to_string())
            .unwrap_or_else(|| "none".to_string());

        CacheKey(format!(
            "specific={};broad={};min_year={};policy={};top_k={}",
            join(&self.specific),
            join(&self.broad),
            min_year,
            self.policy.as_str(),
            top_k
        ))
    }
}

/// Canonical serialization of a [`FilterSpec`] plus the requested depth of the ranking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RankedEntry {
    pub ci_name: String,
    pub num_projects: usize,
}

impl RankedEntry {
    /// Descending by count, then ascending by name.
    pub fn rank_order(&self, other: &Self) -> Ordering {
        other
            .num_projects
            .cmp(&self.num_projects)
            .then_with(|| self.ci_name.cmp(&other.ci_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ci: &str, code: &str, year: i32) -> ProjectRecord {
        ProjectRecord {
            code: format!("DP{year}{code}"),
            ci_name: ci.to_string(),
            organisation: "University of Sydney".to_string(),
            year,
            for_primary: code.to_string(),
            for_primary_name: None,
        }
    }

    #[test]
    fn parse_code_accepts_each_depth() {
        assert_eq!(
            parse_code("01").expect("division"),
            ("01".to_string(), CodeDepth::Division)
        );
        assert_eq!(
            parse_code(" 0101 ").expect("group").1,
            CodeDepth::Group
        );
        assert_eq!(parse_code("010101").expect("field").1, CodeDepth::Field);
    }

    #[test]
    fn parse_code_rejects_structural_violations() {
        let err = parse_code("01a1").expect_err("non numeric");
        assert_eq!(err.reason, MalformedReason::NonNumeric);

        let err = parse_code("010").expect_err("odd length");
        assert_eq!(err.reason, MalformedReason::Length(3));

        let err = parse_code("   ").expect_err("blank");
        assert_eq!(err.reason, MalformedReason::Empty);
    }

    #[test]
    fn specific_codes_take_precedence_over_broad_codes() {
        let filter = FilterSpec::new(["010101"], ["02"], None);
        assert!(filter.broad_codes().is_empty());
        assert!(filter.admits(&record("A", "010101", 2015)));
        assert!(!filter.admits(&record("A", "020202", 2015)));
    }

    #[test]
    fn intersect_policy_applies_both_selections() {
        let filter =
            FilterSpec::with_policy(["0101", "0202"], ["01"], None, BroadCodePolicy::Intersect);
        assert!(filter.admits(&record("A", "010101", 2015)));
        assert!(!filter.admits(&record("A", "020202", 2015)));
    }

    #[test]
    fn coarse_specific_codes_match_descendants() {
        let filter = FilterSpec::new(["0101"], Vec::<String>::new(), Some(2016));
        assert!(filter.admits(&record("A", "010105", 2016)));
        assert!(!filter.admits(&record("A", "010105", 2015)));
        assert!(!filter.admits(&record("A", "010201", 2020)));
    }

    #[test]
    fn overall_mode_requires_no_codes_and_no_year() {
        assert!(FilterSpec::overall().is_overall());
        assert!(!FilterSpec::new(Vec::<String>::new(), Vec::<String>::new(), Some(2018))
            .is_overall());
    }

    #[test]
    fn cache_key_is_order_independent() {
        let first = FilterSpec::new(["0202", "010101"], Vec::<String>::new(), Some(2018));
        let second = FilterSpec::new(["010101", "0202"], Vec::<String>::new(), Some(2018));
        assert_eq!(first.cache_key(10), second.cache_key(10));
        assert_eq!(
            first.cache_key(10).as_str(),
            "specific=010101,0202;broad=;min_year=2018;policy=precedence;top_k=10"
        );
        assert_ne!(first.cache_key(10), first.cache_key(30));
    }

    #[test]
    fn scope_depth_uses_shallowest_specific_code() {
        let filter = FilterSpec::new(["010101", "0202"], Vec::<String>::new(), None);
        assert_eq!(filter.scope_depth(), Some(CodeDepth::Group));

        let broad = FilterSpec::new(Vec::<String>::new(), ["01"], None);
        assert_eq!(broad.scope_depth(), Some(CodeDepth::Division));
        assert_eq!(FilterSpec::overall().scope_depth(), None);
    }

    #[test]
    fn rank_order_breaks_ties_by_name() {
        let mut entries = vec![
            RankedEntry {
                ci_name: "B".to_string(),
                num_projects: 1,
            },
            RankedEntry {
                ci_name: "C".to_string(),
                num_projects: 3,
            },
            RankedEntry {
                ci_name: "A".to_string(),
                num_projects: 1,
            },
        ];
        entries.sort_by(RankedEntry::rank_order);
        let names: Vec<_> = entries.iter().map(|entry| entry.ci_name.as_str()).collect();
        assert_eq!(names, ["C", "A", "B"]);
    }
}
