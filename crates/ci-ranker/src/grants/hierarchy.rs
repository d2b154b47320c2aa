use super::domain::{parse_code, CodeDepth, ForCode, MalformedCodeError, ProjectRecord};
use std::collections::BTreeMap;

const LABEL_SEPARATOR: &str = " \u{2014} ";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown FoR code '{0}'")]
pub struct UnknownCodeError(pub String);

/// Read-only 2/4/6 digit FoR tree keyed by code string.
///
/// Codes are stored in lexical order, so every descendant of a code forms a
/// contiguous run starting at that code.
#[derive(Debug, Clone, Default)]
pub struct HierarchyIndex {
    codes: BTreeMap<String, ForCode>,
}

impl HierarchyIndex {
    /// Derive the hierarchy from the primary codes of already-loaded records.
    pub fn load_codes<'a, I>(records: I) -> Result<Self, MalformedCodeError>
    where
        I: IntoIterator<Item = &'a ProjectRecord>,
    {
        let mut builder = HierarchyBuilder::default();
        for record in records {
            builder.observe(&record.for_primary, record.for_primary_name.as_deref())?;
        }
        Ok(builder.build())
    }

    pub fn get(&self, code: &str) -> Option<&ForCode> {
        self.codes.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// The code itself plus every finer code sharing it as a prefix.
    pub fn descendants_of(&self, code: &str) -> Result<Vec<&ForCode>, UnknownCodeError> {
        if !self.codes.contains_key(code) {
            return Err(UnknownCodeError(code.to_string()));
        }

        Ok(self
            .codes
            .range(code.to_string()..)
            .take_while(|(candidate, _)| candidate.starts_with(code))
            .map(|(_, node)| node)
            .collect())
    }

    pub fn label_of(&self, code: &str) -> Result<String, UnknownCodeError> {
        self.codes
            .get(code)
            .map(ForCode::label)
            .ok_or_else(|| UnknownCodeError(code.to_string()))
    }

    pub fn at_depth(&self, depth: CodeDepth) -> impl Iterator<Item = &ForCode> + '_ {
        self.codes.values().filter(move |node| node.depth == depth)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ForCode> + '_ {
        self.codes.values()
    }
}

/// Accumulates observed codes, synthesizing missing ancestors.
#[derive(Debug, Default)]
pub struct HierarchyBuilder {
    codes: BTreeMap<String, ForCode>,
}

impl HierarchyBuilder {
    pub fn observe(
        &mut self,
        raw_code: &str,
        name: Option<&str>,
    ) -> Result<CodeDepth, MalformedCodeError> {
        let (code, depth) = parse_code(raw_code)?;
        let name = name.map(str::trim).filter(|name| !name.is_empty());

        self.upsert(&code, depth, name);

        let mut current = depth;
        while let Some(parent) = current.parent() {
            self.upsert(&code[..parent.digits()], parent, None);
            current = parent;
        }

        Ok(depth)
    }

    fn upsert(&mut self, code: &str, depth: CodeDepth, name: Option<&str>) {
        let node = self.codes.entry(code.to_string()).or_insert_with(|| ForCode {
            code: code.to_string(),
            depth,
            name: None,
            parent: depth.parent().map(|parent| code[..parent.digits()].to_string()),
        });

        if let Some(name) = name {
            let more_complete = node
                .name
                .as_ref()
                .map_or(true, |existing| name.chars().count() > existing.chars().count());
            if more_complete {
                node.name = Some(name.to_string());
            }
        }
    }

    pub fn build(mut self) -> HierarchyIndex {
        let fallbacks: Vec<(String, String)> = self
            .codes
            .values()
            .filter(|node| node.depth == CodeDepth::Division && node.name.is_none())
            .filter_map(|division| {
                self.codes
                    .range(division.code.clone()..)
                    .take_while(|(code, _)| code.starts_with(division.code.as_str()))
                    .find_map(|(_, node)| node.name.as_deref())
                    .map(|name| {
                        let head = name.split(LABEL_SEPARATOR).next().unwrap_or(name);
                        (division.code.clone(), head.to_string())
                    })
            })
            .collect();

        for (code, name) in fallbacks {
            if let Some(node) = self.codes.get_mut(&code) {
                node.name = Some(name);
            }
        }

        HierarchyIndex { codes: self.codes }
    }
}
