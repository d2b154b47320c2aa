use super::SchemaError;
use serde::{Deserialize, Deserializer};
use std::io::Read;

pub(crate) const REQUIRED_COLUMNS: [&str; 5] = [
    "code",
    "chief_investigators",
    "funding_commencement_year",
    "administering_organisation",
    "for_primary_codes",
];

/// One raw CSV row before validation.
#[derive(Debug, Deserialize)]
pub(crate) struct GrantRow {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub(crate) code: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub(crate) chief_investigators: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub(crate) funding_commencement_year: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub(crate) administering_organisation: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub(crate) for_primary_codes: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub(crate) for_primary_names: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub(crate) for_all_codes: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub(crate) for_all_names: Option<String>,
}

pub(crate) struct GrantRows<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> GrantRows<R> {
    pub(crate) fn rows(&mut self) -> impl Iterator<Item = Result<GrantRow, csv::Error>> + '_ {
        self.reader.deserialize::<GrantRow>()
    }
}

/// Open a CSV source and verify the header carries every required column.
pub(crate) fn open<R: Read>(reader: R) -> Result<GrantRows<R>, super::LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|header| header.trim_start_matches('\u{feff}').to_string())
        .collect();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|column| !headers.iter().any(|header| header == *column))
        .map(|column| column.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(SchemaError { missing }.into());
    }

    reader.set_headers(csv::StringRecord::from(headers));
    Ok(GrantRows { reader })
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
