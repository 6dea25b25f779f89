use crate::error::{AutocompleteError, Result};
use crate::graph::{EntityId, Iri};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Language token that matches literals without a language tag.
pub const UNTAGGED_LANGUAGE: &str = "empty";

/// Default label predicate.
pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";

/// Which predicate to index as labels and in which languages.
///
/// Equality ignores `predicate_id`, which only caches the host's id for `predicate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    pub predicate: Iri,
    #[serde(skip)]
    pub predicate_id: EntityId,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub languages: BTreeSet<String>,
}

impl LabelConfig {
    /// `languages` is a comma separated list, empty for any language.
    #[must_use]
    pub fn new(predicate: impl Into<Iri>, languages: &str) -> Self {
        Self {
            predicate: predicate.into(),
            predicate_id: 0,
            languages: split_languages(languages),
        }
    }

    #[must_use]
    pub fn rdfs_label() -> Self {
        Self::new(RDFS_LABEL, "")
    }

    /// Parse `"<iri>@<lang>,<lang>"`. The languages part is optional.
    pub fn parse(entry: &str) -> Result<Self> {
        let entry = entry.trim();
        let (iri, languages) = match entry.rsplit_once('@') {
            Some((iri, langs)) if is_language_list(langs) => (iri, langs),
            _ => (entry, ""),
        };
        let iri = iri.trim().trim_start_matches('<').trim_end_matches('>');
        if iri.is_empty() {
            return Err(AutocompleteError::InvalidLabelConfig(format!(
                "missing predicate IRI in {entry:?}"
            )));
        }
        if iri.chars().any(char::is_whitespace) {
            return Err(AutocompleteError::InvalidLabelConfig(format!(
                "predicate IRI contains whitespace: {iri:?}"
            )));
        }
        Ok(Self::new(iri, languages))
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.predicate_id > 0
    }

    /// An empty language set accepts everything; otherwise untagged literals need
    /// [`UNTAGGED_LANGUAGE`] in the set.
    #[must_use]
    pub fn language_matches(&self, language: Option<&str>) -> bool {
        if self.languages.is_empty() {
            return true;
        }
        self.languages
            .contains(language.unwrap_or(UNTAGGED_LANGUAGE))
    }
}

impl PartialEq for LabelConfig {
    fn eq(&self, other: &Self) -> bool {
        self.predicate == other.predicate && self.languages == other.languages
    }
}

impl Eq for LabelConfig {}

impl fmt::Display for LabelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.predicate)?;
        if !self.languages.is_empty() {
            let langs: Vec<&str> = self.languages.iter().map(String::as_str).collect();
            write!(f, "@{}", langs.join(","))?;
        }
        Ok(())
    }
}

fn split_languages(languages: &str) -> BTreeSet<String> {
    languages
        .split(',')
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_language_list(languages: &str) -> bool {
    languages
        .split(',')
        .map(str::trim)
        .all(|lang| lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
}
