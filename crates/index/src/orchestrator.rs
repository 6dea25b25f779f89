use crate::build::{BuildHandle, BuildOutcome, BuildTask};
use crate::error::{AutocompleteError, Result};
use crate::graph::{EntityId, GraphSource, Iri};
use crate::label::LabelConfig;
use crate::merge::{acronym_alternate, interleave, resolve, Suggestion};
use crate::settings::{AutocompleteSettings, IndexSettings};
use crate::sources::ItemStream;
use crate::status::{derive_state, BuildState, IndexStatus, StatusInputs};
use crate::weight::Weighting;
use autocomplete_store::{IndexableItem, StoreError, SuggestionStore};
use log::{debug, error, info, warn};
use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Instant;
use tokio::sync::watch;

/// Called on the build thread once the build committed or rolled back and the index
/// mutation lock has been released, before the build is reported as finished.
pub type BuildHook = Box<dyn FnOnce(&BuildOutcome) + Send>;

/// Everything the orchestrator needs from its owner.
pub struct OrchestratorParts {
    pub store: Arc<dyn SuggestionStore>,
    pub graph: Arc<dyn GraphSource>,
    pub weighting: Arc<Weighting>,
    pub settings: AutocompleteSettings,
    /// Settings are written here after every change when set.
    pub settings_path: Option<PathBuf>,
    /// The store already holds a built index, e.g. loaded from a snapshot.
    pub has_built: bool,
}

#[derive(Default)]
struct BuildSlot {
    task: Option<Arc<BuildTask>>,
    has_built: bool,
    error: Option<String>,
}

struct BuildJob {
    inner: Arc<Inner>,
    task: Arc<BuildTask>,
    stream: ItemStream,
    hook: Option<BuildHook>,
}

impl BuildJob {
    fn run(self) {
        let BuildJob {
            inner,
            task,
            stream,
            hook,
        } = self;
        let result = catch_unwind(AssertUnwindSafe(|| inner.execute(&task, stream)))
            .unwrap_or_else(|_| {
                error!("Autocomplete build {} panicked", task.id());
                let _guard = inner.mutation();
                inner.rollback_locked();
                Err(AutocompleteError::BuildFailure(
                    "build thread panicked".to_string(),
                ))
            });
        inner.finish(&task, result, hook);
    }
}

struct Inner {
    store: Arc<dyn SuggestionStore>,
    graph: Arc<dyn GraphSource>,
    weighting: Arc<Weighting>,
    settings: Mutex<AutocompleteSettings>,
    settings_path: Option<PathBuf>,
    /// Serializes every write to the store, including whole builds.
    mutation: Mutex<()>,
    slot: Mutex<BuildSlot>,
    status_tx: watch::Sender<IndexStatus>,
    jobs: Mutex<Option<mpsc::Sender<BuildJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn store_error(err: StoreError) -> AutocompleteError {
    match err {
        StoreError::Closed => AutocompleteError::StoreUnavailable,
        other => AutocompleteError::StoreError(other),
    }
}

fn build_error(err: StoreError) -> AutocompleteError {
    match err {
        StoreError::Closed => AutocompleteError::Interrupted,
        other => AutocompleteError::BuildFailure(other.to_string()),
    }
}

impl Inner {
    fn slot(&self) -> MutexGuard<'_, BuildSlot> {
        lock(&self.slot)
    }

    fn mutation(&self) -> MutexGuard<'_, ()> {
        lock(&self.mutation)
    }

    fn status(&self) -> IndexStatus {
        let slot = self.slot();
        let drift = lock(&self.settings).has_drift();
        let task = slot.task.as_ref();
        let state = derive_state(StatusInputs {
            has_error: slot.error.is_some(),
            has_task: task.is_some(),
            has_built: slot.has_built,
            cancel_requested: task.is_some_and(|t| t.is_cancelled()),
            task_finished: task.is_some_and(|t| t.is_finished()),
            config_drift: drift,
        });
        IndexStatus {
            state,
            error: slot.error.clone().filter(|_| state == BuildState::Error),
        }
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(self.status());
    }

    fn persist_settings(&self, settings: &AutocompleteSettings) {
        let Some(path) = &self.settings_path else {
            return;
        };
        if let Err(err) = settings.save(path) {
            warn!("Failed to persist autocomplete settings to {}: {err}", path.display());
        }
    }

    fn resolve_labels(&self, settings: &mut IndexSettings) {
        for config in settings.labels.values_mut() {
            config.predicate_id = self.graph.resolve(config.predicate.as_str()).unwrap_or(0);
        }
    }

    /// Runs with the mutation lock held for the whole build.
    fn execute(&self, task: &BuildTask, mut stream: ItemStream) -> Result<BuildOutcome> {
        let _guard = self.mutation();
        let started = Instant::now();
        info!("Start building autocomplete index (build {})", task.id());

        let outcome = (|| -> Result<BuildOutcome> {
            let items = self.store.build(&mut stream).map_err(build_error)?;
            if !task.begin_commit() {
                self.rollback_locked();
                info!("Building index was interrupted.");
                return Ok(BuildOutcome::RolledBack { items });
            }
            self.store.commit().map_err(build_error)?;
            let duration_ms = started.elapsed().as_millis() as u64;
            info!("Index built. Ready to use! ({items} suggestions in {duration_ms} ms)");
            Ok(BuildOutcome::Committed { items, duration_ms })
        })();

        if let Err(err) = &outcome {
            error!("Index was not built: {err}");
            self.rollback_locked();
        }
        outcome
    }

    fn finish(&self, task: &BuildTask, result: Result<BuildOutcome>, hook: Option<BuildHook>) {
        let outcome = match &result {
            Ok(outcome) => outcome.clone(),
            Err(err) => BuildOutcome::Failed {
                error: err.to_string(),
            },
        };
        if let Some(hook) = hook {
            if catch_unwind(AssertUnwindSafe(|| hook(&outcome))).is_err() {
                error!("Autocomplete build hook panicked");
            }
        }
        {
            let mut slot = self.slot();
            match result {
                Ok(BuildOutcome::Committed { .. }) => slot.has_built = true,
                Ok(_) => {}
                Err(err) => slot.error = Some(err.to_string()),
            }
            task.mark_finished();
        }
        task.publish(outcome);
        self.publish_status();
    }

    /// Caller holds the mutation lock.
    fn rollback_locked(&self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if let Err(err) = self.store.rollback() {
            error!("Something went wrong when rolling back the autocomplete index: {err}");
            if let Err(err) = self.store.reopen() {
                error!("Could not reopen the autocomplete index: {err}");
            }
        }
    }
}

/// Owns the suggestion store and its build lifecycle.
///
/// At most one build runs at a time, on a dedicated thread. Single-item writes, commits,
/// rollbacks and the build body are serialized by one mutation lock; queries only read
/// the store's committed generation.
#[derive(Clone)]
pub struct IndexOrchestrator {
    inner: Arc<Inner>,
}

impl IndexOrchestrator {
    pub fn new(parts: OrchestratorParts) -> Result<Self> {
        let OrchestratorParts {
            store,
            graph,
            weighting,
            settings,
            settings_path,
            has_built,
        } = parts;
        let (jobs_tx, jobs_rx) = mpsc::channel::<BuildJob>();
        let worker = std::thread::Builder::new()
            .name("autocomplete-build".to_string())
            .spawn(move || {
                for job in jobs_rx {
                    job.run();
                }
                debug!("Autocomplete build executor stopped");
            })?;

        let (status_tx, _) = watch::channel(IndexStatus::new(BuildState::None));
        let inner = Arc::new(Inner {
            store,
            graph,
            weighting,
            settings: Mutex::new(settings),
            settings_path,
            mutation: Mutex::new(()),
            slot: Mutex::new(BuildSlot {
                has_built,
                ..BuildSlot::default()
            }),
            status_tx,
            jobs: Mutex::new(Some(jobs_tx)),
            worker: Mutex::new(Some(worker)),
            closed: AtomicBool::new(false),
        });
        {
            let mut settings = lock(&inner.settings);
            inner.resolve_labels(&mut settings.actual);
        }
        inner.publish_status();
        Ok(Self { inner })
    }

    #[must_use]
    pub fn status(&self) -> IndexStatus {
        self.inner.status()
    }

    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<IndexStatus> {
        self.inner.status_tx.subscribe()
    }

    #[must_use]
    pub fn is_building(&self) -> bool {
        self.status().state == BuildState::Building
    }

    /// Start a full rebuild from the configured settings.
    ///
    /// Returns `None` without doing anything while a build is running. Build failures are
    /// reported through [`IndexOrchestrator::status`], never to the caller.
    pub fn request_build(&self, hook: Option<BuildHook>) -> Result<Option<BuildHandle>> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(AutocompleteError::StoreUnavailable);
        }
        let mut slot = self.inner.slot();
        if let Some(task) = slot.task.as_ref().filter(|t| !t.is_finished()) {
            if task.is_cancelled() {
                info!("Previous build is still stopping.");
            } else {
                info!("Index is already building.");
            }
            return Ok(None);
        }

        let snapshot = {
            let mut settings = lock(&self.inner.settings);
            let mut snapshot = settings.promote_configured();
            self.inner.resolve_labels(&mut snapshot);
            settings.actual = snapshot.clone();
            self.inner.persist_settings(&settings);
            snapshot
        };

        let task = BuildTask::new();
        let stream = ItemStream::compose(
            &snapshot,
            &self.inner.graph,
            &self.inner.weighting,
            task.cancel_flag(),
        );
        let job = BuildJob {
            inner: self.inner.clone(),
            task: task.clone(),
            stream,
            hook,
        };

        slot.error = None;
        slot.has_built = false;
        slot.task = Some(task.clone());
        let sent = lock(&self.inner.jobs)
            .as_ref()
            .is_some_and(|jobs| jobs.send(job).is_ok());
        if !sent {
            slot.task = None;
            slot.error = Some(AutocompleteError::StoreUnavailable.to_string());
        }
        drop(slot);
        self.inner.publish_status();

        if !sent {
            return Err(AutocompleteError::StoreUnavailable);
        }
        Ok(Some(BuildHandle::new(task)))
    }

    /// Ask the running build to stop. Returns `false` when nothing is building.
    pub fn request_cancel(&self) -> bool {
        let status = self.status();
        if status.state != BuildState::Building {
            info!("Index status is {status}");
            return false;
        }
        let slot = self.inner.slot();
        let Some(task) = slot.task.as_ref() else {
            return false;
        };
        if !task.cancel() {
            info!("Build {} is already committing", task.id());
            return false;
        }
        info!("Interrupting building index (build {})", task.id());
        drop(slot);
        self.inner.publish_status();
        true
    }

    /// Stage one item. Tombstones replace every entry with the same text.
    pub fn add_or_update(&self, item: IndexableItem) -> Result<()> {
        let _guard = self.inner.mutation();
        if item.is_tombstone() {
            self.inner.store.update(item).map_err(store_error)
        } else {
            self.inner.store.add(item).map_err(store_error)
        }
    }

    pub fn index_iri(&self, id: EntityId, iri: &Iri) -> Result<()> {
        let local_name = iri.local_name();
        let weight = self.inner.weighting.weight(id, local_name);
        self.add_or_update(IndexableItem::iri(id, local_name, iri.namespace(), weight))
    }

    /// `id == 0` retracts every label entry with this text.
    pub fn index_label(&self, id: EntityId, text: &str) -> Result<()> {
        if id == 0 {
            return self.add_or_update(IndexableItem::tombstone(text));
        }
        let weight = self.inner.weighting.weight(id, text);
        self.add_or_update(IndexableItem::label(id, text, weight))
    }

    pub fn commit(&self) -> Result<()> {
        let _guard = self.inner.mutation();
        self.inner.store.commit().map_err(store_error)
    }

    /// Best effort: failures are logged and the store is reopened at its last commit.
    pub fn rollback(&self) {
        let _guard = self.inner.mutation();
        self.inner.rollback_locked();
    }

    /// Ranked suggestions for `text`, optionally limited to one IRI namespace.
    pub fn query(&self, namespace: Option<&str>, text: &str, max: usize) -> Result<Vec<Suggestion>> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(AutocompleteError::StoreUnavailable);
        }
        let status = self.status();
        if !status.is_ok() {
            info!("Index is not ready. Status: {status}");
            if let Some(err) = &status.error {
                error!("Error is: {err}");
            }
            return Ok(Vec::new());
        }
        if max == 0 || self.inner.store.count().map_err(store_error)? == 0 {
            return Ok(Vec::new());
        }

        let contexts = namespace
            .filter(|ns| !ns.is_empty())
            .map(|ns| BTreeSet::from([ns.to_string()]));
        let store = &self.inner.store;
        let primary = store
            .lookup(text, contexts.as_ref(), max)
            .map_err(store_error)?;
        let results = match acronym_alternate(text) {
            Some(alternate) => {
                let alternate = store
                    .lookup(&alternate, contexts.as_ref(), max)
                    .map_err(store_error)?;
                interleave(alternate, primary, max)
            }
            None => primary,
        };
        Ok(resolve(results, self.inner.graph.as_ref()))
    }

    /// Number of committed suggestions.
    pub fn suggestion_count(&self) -> Result<usize> {
        self.inner.store.count().map_err(store_error)
    }

    #[must_use]
    pub fn settings(&self) -> AutocompleteSettings {
        lock(&self.inner.settings).clone()
    }

    /// Change settings, persist them and refresh the published status.
    pub fn update_settings<R>(&self, f: impl FnOnce(&mut AutocompleteSettings) -> R) -> R {
        let result = {
            let mut settings = lock(&self.inner.settings);
            let result = f(&mut settings);
            if let Err(err) = settings.configured.validate() {
                warn!("Autocomplete settings look inconsistent: {err}");
            }
            self.inner.persist_settings(&settings);
            result
        };
        self.inner.publish_status();
        result
    }

    /// Resolve a configured predicate id against the graph, if the predicate exists.
    #[must_use]
    pub fn resolve_predicate(&self, iri: &str) -> Option<EntityId> {
        self.inner.graph.resolve(iri)
    }

    /// Actual label config for a predicate id.
    #[must_use]
    pub fn label_config_for(&self, predicate: EntityId) -> Option<LabelConfig> {
        if predicate == 0 {
            return None;
        }
        lock(&self.inner.settings)
            .actual
            .label_configs()
            .find(|config| config.predicate_id == predicate)
            .cloned()
    }

    /// Record the id of a label predicate that did not exist when the config was resolved.
    pub fn assign_label_id(&self, predicate: &str, id: EntityId) -> bool {
        let mut guard = lock(&self.inner.settings);
        let settings = &mut *guard;
        let mut assigned = false;
        for side in [&mut settings.actual, &mut settings.configured] {
            if let Some(config) = side.labels.get_mut(predicate) {
                if !config.is_resolved() {
                    config.predicate_id = id;
                    assigned = true;
                }
            }
        }
        assigned
    }

    /// Actual label configs whose predicate is not known to the graph yet.
    #[must_use]
    pub fn unresolved_labels(&self) -> Vec<LabelConfig> {
        lock(&self.inner.settings)
            .actual
            .label_configs()
            .filter(|config| !config.is_resolved())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn indexes_iris(&self) -> bool {
        lock(&self.inner.settings).actual.index_iris
    }

    #[must_use]
    pub fn graph(&self) -> &Arc<dyn GraphSource> {
        &self.inner.graph
    }

    /// Close the store and stop the build thread. A running build is cancelled.
    pub fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = self.inner.slot().task.as_ref() {
            if !task.is_finished() {
                task.cancel();
            }
        }
        if let Err(err) = self.inner.store.close() {
            error!("Could not shut down the autocomplete store: {err}");
        }
        lock(&self.inner.jobs).take();
        let worker = lock(&self.inner.worker).take();
        if let Some(worker) = worker {
            if worker.thread().id() != std::thread::current().id() && worker.join().is_err() {
                warn!("Autocomplete build thread panicked during shutdown");
            }
        }
        info!("Autocomplete index shut down");
    }
}
