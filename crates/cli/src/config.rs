use anyhow::{Context as AnyhowContext, Result};
use autocomplete_index::LabelConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Optional TOML file for the `query` command.
///
/// ```toml
/// index_iris = true
/// labels = ["http://www.w3.org/2000/01/rdf-schema#label@en,empty"]
///
/// [ranks]
/// "urn:Sofia" = 0.8
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub index_iris: Option<bool>,
    /// `iri@lang,lang` entries; replace the configured label predicates when non-empty.
    pub labels: Vec<String>,
    /// Normalized ranks by entity IRI.
    pub ranks: BTreeMap<String, f64>,
}

impl CliConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Label configs from the file followed by `extra`, parsed.
    pub fn label_configs(&self, extra: &[String]) -> Result<Vec<LabelConfig>> {
        self.labels
            .iter()
            .chain(extra)
            .map(|entry| {
                LabelConfig::parse(entry).with_context(|| format!("Invalid label config {entry:?}"))
            })
            .collect()
    }
}
