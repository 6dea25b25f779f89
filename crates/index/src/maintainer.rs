use crate::build::{BuildHandle, BuildOutcome};
use crate::error::Result;
use crate::graph::{EntityId, GraphListener, Iri, Statement, Value};
use crate::label::LabelConfig;
use crate::orchestrator::IndexOrchestrator;
use crate::sources::is_special_entity;
use log::{debug, error, info};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A change observed while a build was running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingUpdate {
    Entity { id: EntityId, iri: Iri },
    /// `subject == 0` retracts the text.
    Label { subject: EntityId, text: String },
}

/// Updates received during a build, split by whether their transaction already
/// committed. Arrival order is kept.
#[derive(Debug, Default)]
pub struct PendingUpdateBuffer {
    committed: Vec<PendingUpdate>,
    open: Vec<PendingUpdate>,
}

impl PendingUpdateBuffer {
    pub fn push(&mut self, update: PendingUpdate) {
        self.open.push(update);
    }

    /// The running transaction committed: keep its updates.
    pub fn commit_open(&mut self) {
        self.committed.append(&mut self.open);
    }

    /// The running transaction aborted: forget its updates.
    pub fn discard_open(&mut self) {
        self.open.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.committed.len() + self.open.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take(&mut self) -> (Vec<PendingUpdate>, Vec<PendingUpdate>) {
        (
            std::mem::take(&mut self.committed),
            std::mem::take(&mut self.open),
        )
    }
}

#[derive(Debug, Default)]
struct MaintainerState {
    building: bool,
    dirty: bool,
    buffer: PendingUpdateBuffer,
    unresolved: HashMap<String, LabelConfig>,
    shutting_down: bool,
}

fn lock(state: &Mutex<MaintainerState>) -> MutexGuard<'_, MaintainerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keeps the index in step with graph transactions.
///
/// Outside builds every event goes straight to the store and marks the maintainer dirty;
/// the transaction's commit or abort then commits or rolls back the store. While a build
/// runs, events are buffered and replayed as soon as the build has committed or rolled
/// back. Lock order is always maintainer state, then orchestrator.
#[derive(Clone)]
pub struct UpdateMaintainer {
    orchestrator: IndexOrchestrator,
    state: Arc<Mutex<MaintainerState>>,
}

impl UpdateMaintainer {
    #[must_use]
    pub fn new(orchestrator: IndexOrchestrator) -> Self {
        let maintainer = Self {
            orchestrator,
            state: Arc::new(Mutex::new(MaintainerState::default())),
        };
        for config in maintainer.orchestrator.unresolved_labels() {
            maintainer.notify_label_config(config);
        }
        maintainer
    }

    /// Start a full build and buffer updates until it ends.
    pub fn request_build(&self) -> Result<Option<BuildHandle>> {
        let mut state = lock(&self.state);
        if state.shutting_down {
            return Ok(None);
        }
        let hook_state = self.state.clone();
        let hook_orchestrator = self.orchestrator.clone();
        let handle = self
            .orchestrator
            .request_build(Some(Box::new(move |outcome: &BuildOutcome| {
                flush_after_build(&hook_state, &hook_orchestrator, outcome);
            })))?;
        if handle.is_some() {
            state.building = true;
            // the build replaces whatever was staged
            state.dirty = false;
            for config in self.orchestrator.unresolved_labels() {
                if !config.is_resolved() {
                    state.unresolved.insert(config.predicate.to_string(), config);
                }
            }
        }
        Ok(handle)
    }

    /// Remember a label config whose predicate has no id yet.
    pub fn notify_label_config(&self, config: LabelConfig) {
        if config.is_resolved() {
            return;
        }
        debug!("Waiting for label predicate {} to appear", config.predicate);
        lock(&self.state)
            .unresolved
            .insert(config.predicate.to_string(), config);
    }

    pub fn before_shutdown(&self) {
        lock(&self.state).shutting_down = true;
    }

    #[must_use]
    pub fn is_building(&self) -> bool {
        lock(&self.state).building
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        lock(&self.state).dirty
    }

    #[must_use]
    pub fn pending_updates(&self) -> usize {
        lock(&self.state).buffer.len()
    }

    #[must_use]
    pub fn unresolved_predicates(&self) -> Vec<String> {
        let mut predicates: Vec<String> = lock(&self.state).unresolved.keys().cloned().collect();
        predicates.sort();
        predicates
    }

    fn apply_or_buffer(&self, state: &mut MaintainerState, update: PendingUpdate) {
        if state.building {
            state.buffer.push(update);
            return;
        }
        if apply(&self.orchestrator, &update) {
            state.dirty = true;
        }
    }

    fn label_update(&self, statement: Statement, subject: EntityId) {
        let Some(config) = self.orchestrator.label_config_for(statement.predicate) else {
            return;
        };
        let mut state = lock(&self.state);
        if state.shutting_down {
            return;
        }
        let Some(object) = self.orchestrator.graph().value(statement.object) else {
            return;
        };
        if !config.language_matches(object.language()) {
            return;
        }
        let update = PendingUpdate::Label {
            subject,
            text: object.string_value().to_string(),
        };
        self.apply_or_buffer(&mut state, update);
    }
}

fn apply(orchestrator: &IndexOrchestrator, update: &PendingUpdate) -> bool {
    let result = match update {
        PendingUpdate::Entity { id, iri } => orchestrator.index_iri(*id, iri),
        PendingUpdate::Label { subject, text } => orchestrator.index_label(*subject, text),
    };
    match result {
        Ok(()) => true,
        Err(err) => {
            error!("Could not index {update:?}: {err}");
            false
        }
    }
}

fn flush_after_build(
    state: &Mutex<MaintainerState>,
    orchestrator: &IndexOrchestrator,
    outcome: &BuildOutcome,
) {
    let mut state = lock(state);
    let (committed, open) = state.buffer.take();
    if !committed.is_empty() || !open.is_empty() {
        info!(
            "Replaying {} updates received while building ({outcome:?})",
            committed.len() + open.len()
        );
    }
    if !committed.is_empty() {
        for update in &committed {
            apply(orchestrator, update);
        }
        if let Err(err) = orchestrator.commit() {
            error!("Could not commit updates received while building: {err}");
        }
    }
    if !open.is_empty() {
        for update in &open {
            apply(orchestrator, update);
        }
        // the still running transaction decides
        state.dirty = true;
    }
    state.building = false;
}

impl GraphListener for UpdateMaintainer {
    fn entity_added(&self, id: EntityId, value: &Value) {
        let Some(iri) = value.as_iri() else {
            return;
        };
        let mut state = lock(&self.state);
        if state.shutting_down {
            return;
        }
        if state.unresolved.remove(iri.as_str()).is_some()
            && self.orchestrator.assign_label_id(iri.as_str(), id)
        {
            debug!("Label predicate {iri} resolved to {id}");
        }
        if !self.orchestrator.indexes_iris() || is_special_entity(iri.as_str()) {
            return;
        }
        let update = PendingUpdate::Entity {
            id,
            iri: iri.clone(),
        };
        self.apply_or_buffer(&mut state, update);
    }

    fn statement_added(&self, statement: Statement) {
        self.label_update(statement, statement.subject);
    }

    fn statement_removed(&self, statement: Statement) {
        self.label_update(statement, 0);
    }

    fn transaction_commit(&self) {
        let mut state = lock(&self.state);
        if state.building {
            state.buffer.commit_open();
            return;
        }
        if !state.dirty {
            return;
        }
        state.dirty = false;
        if let Err(err) = self.orchestrator.commit() {
            error!("Could not commit autocomplete index: {err}");
        }
    }

    fn transaction_aborted(&self) {
        let mut state = lock(&self.state);
        if state.building {
            state.buffer.discard_open();
            return;
        }
        if !state.dirty {
            return;
        }
        state.dirty = false;
        self.orchestrator.rollback();
    }
}
