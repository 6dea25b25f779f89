use crate::error::Result;
use crate::label::LabelConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const SETTINGS_SCHEMA_VERSION: u32 = 1;

/// What a build indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSettings {
    #[serde(default = "default_index_iris")]
    pub index_iris: bool,
    /// Keyed by predicate IRI.
    #[serde(default = "default_labels", with = "label_list")]
    pub labels: BTreeMap<String, LabelConfig>,
}

fn default_index_iris() -> bool {
    true
}

fn default_labels() -> BTreeMap<String, LabelConfig> {
    let label = LabelConfig::rdfs_label();
    BTreeMap::from([(label.predicate.to_string(), label)])
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            index_iris: default_index_iris(),
            labels: default_labels(),
        }
    }
}

impl IndexSettings {
    /// Insert or replace the config for its predicate. Returns `false` when nothing changed.
    pub fn upsert_label(&mut self, config: LabelConfig) -> bool {
        let key = config.predicate.to_string();
        match self.labels.get(&key) {
            Some(existing) if *existing == config => false,
            _ => {
                self.labels.insert(key, config);
                true
            }
        }
    }

    pub fn remove_label(&mut self, predicate: &str) -> Option<LabelConfig> {
        self.labels.remove(predicate)
    }

    pub fn label_configs(&self) -> impl Iterator<Item = &LabelConfig> {
        self.labels.values()
    }

    /// Validate the configuration before it is used for a build.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (key, config) in &self.labels {
            if key != config.predicate.as_str() {
                return Err(format!(
                    "label config key {key} does not match predicate {}",
                    config.predicate
                ));
            }
        }
        Ok(())
    }
}

/// Persisted autocomplete settings: requested configuration and the one the current
/// index was built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutocompleteSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub configured: IndexSettings,
    #[serde(default)]
    pub actual: IndexSettings,
}

impl Default for AutocompleteSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            configured: IndexSettings::default(),
            actual: IndexSettings::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSettings {
    schema_version: u32,
    #[serde(flatten)]
    settings: AutocompleteSettings,
}

impl AutocompleteSettings {
    /// Load settings, or defaults when the file does not exist yet.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = std::fs::read(path)?;
        let persisted: PersistedSettings = serde_json::from_slice(&bytes)?;
        if persisted.schema_version != SETTINGS_SCHEMA_VERSION {
            log::warn!(
                "Settings schema_version {} differs from {SETTINGS_SCHEMA_VERSION}; fields are read best effort",
                persisted.schema_version
            );
        }
        Ok(persisted.settings)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let persisted = PersistedSettings {
            schema_version: SETTINGS_SCHEMA_VERSION,
            settings: self.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&persisted)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Configured and built settings differ.
    #[must_use]
    pub fn has_drift(&self) -> bool {
        self.configured != self.actual
    }

    /// Copy configured into actual and return the snapshot a build should use.
    pub fn promote_configured(&mut self) -> IndexSettings {
        self.actual = self.configured.clone();
        self.actual.clone()
    }
}

/// Labels are stored as a list; the map key is always the predicate.
mod label_list {
    use super::LabelConfig;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        labels: &BTreeMap<String, LabelConfig>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let list: Vec<&LabelConfig> = labels.values().collect();
        list.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, LabelConfig>, D::Error> {
        let list = Vec::<LabelConfig>::deserialize(deserializer)?;
        Ok(list
            .into_iter()
            .map(|config| (config.predicate.to_string(), config))
            .collect())
    }
}
