use super::domain::{FilterSpec, ProjectRecord};
use super::loader::Dataset;

/// Projects led by `ci_name` that survive `filter`, newest first then by project code.
///
/// An empty result is a legitimate state: the CI may have no projects under the
/// current filters.
pub fn detail<'a>(
    dataset: &'a Dataset,
    filter: &FilterSpec,
    ci_name: &str,
) -> Vec<&'a ProjectRecord> {
    let mut projects: Vec<&ProjectRecord> = dataset
        .records_for_ci(ci_name)
        .filter(|record| filter.admits(record))
        .collect();

    projects.sort_by(|left, right| {
        right
            .year
            .cmp(&left.year)
            .then_with(|| left.code.cmp(&right.code))
    });
    projects
}
