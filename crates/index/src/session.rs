use crate::build::BuildHandle;
use crate::error::{AutocompleteError, Result};
use crate::graph::{EntityId, GraphListener, GraphSource, Iri, Statement, Value};
use crate::label::LabelConfig;
use crate::maintainer::UpdateMaintainer;
use crate::merge::Suggestion;
use crate::orchestrator::{IndexOrchestrator, OrchestratorParts};
use crate::settings::AutocompleteSettings;
use crate::status::{BuildState, IndexStatus};
use crate::weight::Weighting;
use autocomplete_store::{InfixSuggester, SuggestionStore};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Result cap of [`Session::query_string`].
pub const DEFAULT_RESULT_COUNT: usize = 100;

pub const SETTINGS_FILE: &str = "settings.json";
pub const INDEX_DIR: &str = "index";
pub const SNAPSHOT_FILE: &str = "suggestions.json";

/// Split `"namespace;text"`.
///
/// Without `;` the whole input is text. A trailing `;` selects a namespace with empty
/// text. Otherwise the input is split at the first `;`.
#[must_use]
pub fn parse_query_string(query: &str) -> (Option<&str>, &str) {
    match query.split_once(';') {
        None => (None, query),
        Some((namespace, text)) => (Some(namespace), text),
    }
}

/// One autocomplete index bound to one graph.
///
/// Owns the orchestrator and the update maintainer, persists settings under the data
/// directory and receives graph events as a [`GraphListener`]. Events are ignored while
/// the session is disabled.
pub struct Session {
    orchestrator: IndexOrchestrator,
    maintainer: UpdateMaintainer,
    enabled: AtomicBool,
    data_dir: Option<PathBuf>,
}

impl Session {
    /// Open a session. With a data directory, settings and the committed index are
    /// loaded from it and written back on change; without one everything stays in memory.
    pub fn open(
        data_dir: Option<&Path>,
        graph: Arc<dyn GraphSource>,
        weighting: Weighting,
    ) -> Result<Self> {
        let settings_path = data_dir.map(|dir| dir.join(SETTINGS_FILE));
        let settings = match &settings_path {
            Some(path) => AutocompleteSettings::load(path)?,
            None => AutocompleteSettings::default(),
        };
        let store: Arc<dyn SuggestionStore> = match data_dir {
            Some(dir) => Arc::new(InfixSuggester::open(dir.join(INDEX_DIR).join(SNAPSHOT_FILE))?),
            None => Arc::new(InfixSuggester::in_memory()),
        };
        let has_built = store.count()? > 0;
        let enabled = settings.enabled;

        let orchestrator = IndexOrchestrator::new(OrchestratorParts {
            store,
            graph,
            weighting: Arc::new(weighting),
            settings,
            settings_path,
            has_built,
        })?;
        let maintainer = UpdateMaintainer::new(orchestrator.clone());
        let session = Self {
            orchestrator,
            maintainer,
            enabled: AtomicBool::new(enabled),
            data_dir: data_dir.map(Path::to_path_buf),
        };
        info!(
            "Autocomplete session opened (enabled: {enabled}, status: {})",
            session.orchestrator.status()
        );
        if enabled && !has_built {
            session.maintainer.request_build()?;
        }
        Ok(session)
    }

    #[must_use]
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn ensure_enabled(&self) -> Result<()> {
        if self.is_enabled() {
            Ok(())
        } else {
            Err(AutocompleteError::Disabled)
        }
    }

    /// Turn the index on or off. Enabling an index that was never built starts a build,
    /// whose handle is returned. Disabling cancels a running build and keeps the data.
    pub fn set_enabled(&self, enabled: bool) -> Result<Option<BuildHandle>> {
        if self.enabled.swap(enabled, Ordering::AcqRel) == enabled {
            return Ok(None);
        }
        self.orchestrator.update_settings(|settings| settings.enabled = enabled);
        if !enabled {
            info!("Autocomplete disabled");
            self.orchestrator.request_cancel();
            return Ok(None);
        }
        info!("Autocomplete enabled");
        if self.orchestrator.status().state == BuildState::None {
            return self.maintainer.request_build();
        }
        Ok(None)
    }

    /// Configured value; takes effect at the next build.
    #[must_use]
    pub fn index_iris(&self) -> bool {
        self.orchestrator.settings().configured.index_iris
    }

    pub fn set_index_iris(&self, index_iris: bool) {
        self.orchestrator
            .update_settings(|settings| settings.configured.index_iris = index_iris);
    }

    /// Add or replace a label config. Returns `false` when it was already configured.
    pub fn add_label_config(&self, mut config: LabelConfig) -> bool {
        config.predicate_id = self
            .orchestrator
            .resolve_predicate(config.predicate.as_str())
            .unwrap_or(0);
        let changed = self
            .orchestrator
            .update_settings(|settings| settings.configured.upsert_label(config.clone()));
        if changed {
            debug!("Label config {config} added");
            self.maintainer.notify_label_config(config);
        }
        changed
    }

    pub fn remove_label_config(&self, predicate: &str) -> bool {
        let predicate = predicate.trim_start_matches('<').trim_end_matches('>');
        self.orchestrator
            .update_settings(|settings| settings.configured.remove_label(predicate))
            .is_some()
    }

    /// Configured label configs.
    #[must_use]
    pub fn label_configs(&self) -> Vec<LabelConfig> {
        self.orchestrator
            .settings()
            .configured
            .label_configs()
            .cloned()
            .collect()
    }

    /// Rebuild from the configured settings. `None` when a build is already running.
    pub fn build_index(&self) -> Result<Option<BuildHandle>> {
        self.ensure_enabled()?;
        self.maintainer.request_build()
    }

    /// Returns `false` when nothing was building.
    pub fn cancel_build(&self) -> Result<bool> {
        self.ensure_enabled()?;
        Ok(self.orchestrator.request_cancel())
    }

    /// `NONE` while disabled.
    #[must_use]
    pub fn status(&self) -> IndexStatus {
        if !self.is_enabled() {
            return IndexStatus::new(BuildState::None);
        }
        self.orchestrator.status()
    }

    #[must_use]
    pub fn status_string(&self) -> String {
        self.status().to_string()
    }

    /// Status changes as they are published. Not filtered by the enabled flag.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<IndexStatus> {
        self.orchestrator.subscribe_status()
    }

    /// Stage an IRI suggestion. Visible after [`Session::commit`].
    pub fn index_iri(&self, id: EntityId, iri: &Iri) -> Result<()> {
        self.ensure_enabled()?;
        self.orchestrator.index_iri(id, iri)
    }

    /// Stage a label suggestion; `id == 0` retracts `text`.
    pub fn index_label(&self, id: EntityId, text: &str) -> Result<()> {
        self.ensure_enabled()?;
        self.orchestrator.index_label(id, text)
    }

    pub fn commit(&self) -> Result<()> {
        self.ensure_enabled()?;
        self.orchestrator.commit()
    }

    pub fn rollback(&self) -> Result<()> {
        self.ensure_enabled()?;
        self.orchestrator.rollback();
        Ok(())
    }

    pub fn query(&self, namespace: Option<&str>, text: &str, max: usize) -> Result<Vec<Suggestion>> {
        self.ensure_enabled()?;
        self.orchestrator.query(namespace, text, max)
    }

    /// Query in `"namespace;text"` form, see [`parse_query_string`].
    pub fn query_string(&self, query: &str) -> Result<Vec<Suggestion>> {
        let (namespace, text) = parse_query_string(query);
        self.query(namespace, text, DEFAULT_RESULT_COUNT)
    }

    pub fn suggestion_count(&self) -> Result<usize> {
        self.orchestrator.suggestion_count()
    }

    #[must_use]
    pub fn maintainer(&self) -> &UpdateMaintainer {
        &self.maintainer
    }

    pub fn shutdown(&self) {
        self.maintainer.before_shutdown();
        self.orchestrator.shutdown();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl GraphListener for Session {
    fn entity_added(&self, id: EntityId, value: &Value) {
        if self.is_enabled() {
            self.maintainer.entity_added(id, value);
        }
    }

    fn statement_added(&self, statement: Statement) {
        if self.is_enabled() {
            self.maintainer.statement_added(statement);
        }
    }

    fn statement_removed(&self, statement: Statement) {
        if self.is_enabled() {
            self.maintainer.statement_removed(statement);
        }
    }

    fn transaction_commit(&self) {
        if self.is_enabled() {
            self.maintainer.transaction_commit();
        }
    }

    fn transaction_aborted(&self) {
        if self.is_enabled() {
            self.maintainer.transaction_aborted();
        }
    }
}
