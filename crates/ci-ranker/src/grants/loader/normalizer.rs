/// Strip invisible characters and collapse internal whitespace, preserving case.
pub(crate) fn normalize_name(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a `;`-separated cell into its non-empty, normalized entries.
pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(normalize_name)
        .filter(|item| !item.is_empty())
        .collect()
}

pub(crate) fn parse_year(value: &str) -> Option<i32> {
    let trimmed = value.trim();
    if let Ok(year) = trimmed.parse::<i32>() {
        return Some(year);
    }

    let float = trimmed.parse::<f64>().ok()?;
    let in_range = float.is_finite() && float.fract() == 0.0 && float.abs() <= i32::MAX as f64;
    in_range.then_some(float as i32)
}
