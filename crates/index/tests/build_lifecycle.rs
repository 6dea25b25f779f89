use autocomplete_index::{
    AutocompleteSettings, BuildOutcome, BuildState, EntityId, GraphSource, IndexOrchestrator,
    IndexableItem, InfixSuggester, LookupResult, MemoryGraph, OrchestratorParts, Session,
    Statement, Suggestion, SuggestionStore, Value, Weighting, RDFS_LABEL,
};
use autocomplete_store::StoreError;
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(10);

/// Blocks label statement iteration until released, which parks a build mid-way.
#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    opened: Condvar,
}

impl Gate {
    fn wait(&self) {
        let mut open = self.open.lock().expect("gate lock");
        while !*open {
            open = self.opened.wait(open).expect("gate wait");
        }
    }

    fn release(&self) {
        *self.open.lock().expect("gate lock") = true;
        self.opened.notify_all();
    }
}

struct GatedGraph {
    graph: Arc<MemoryGraph>,
    gate: Arc<Gate>,
}

impl GraphSource for GatedGraph {
    fn value(&self, id: EntityId) -> Option<Value> {
        self.graph.value(id)
    }

    fn resolve(&self, iri: &str) -> Option<EntityId> {
        self.graph.resolve(iri)
    }

    fn entity_count(&self) -> u64 {
        self.graph.entity_count()
    }

    fn statements_with_predicate(
        &self,
        predicate: EntityId,
    ) -> Box<dyn Iterator<Item = Statement> + Send> {
        let gate = self.gate.clone();
        let mut statements = self.graph.statements_with_predicate(predicate);
        Box::new(std::iter::from_fn(move || {
            gate.wait();
            statements.next()
        }))
    }
}

fn cities() -> Arc<MemoryGraph> {
    let graph = Arc::new(MemoryGraph::new());
    graph.load(
        Value::iri("urn:Sofia"),
        Value::iri(RDFS_LABEL),
        Value::literal("Sofia city"),
    );
    graph.load(
        Value::iri("urn:Plovdiv"),
        Value::iri(RDFS_LABEL),
        Value::lang_literal("Пловдив", "bg"),
    );
    graph.load(
        Value::iri("urn:Plovdiv"),
        Value::iri("urn:near"),
        Value::iri("urn:Sofia"),
    );
    graph
}

fn gated_session() -> (Session, Arc<MemoryGraph>, Arc<Gate>) {
    let graph = cities();
    let gate = Arc::new(Gate::default());
    let source = Arc::new(GatedGraph {
        graph: graph.clone(),
        gate: gate.clone(),
    });
    let session = Session::open(None, source, Weighting::unranked()).expect("session");
    (session, graph, gate)
}

fn displays(suggestions: &[Suggestion]) -> Vec<String> {
    suggestions.iter().map(|s| s.display.clone()).collect()
}

#[tokio::test]
async fn second_build_request_is_ignored_while_building() {
    let (session, _graph, gate) = gated_session();
    let first = session
        .set_enabled(true)
        .expect("enable")
        .expect("enabling an unbuilt index starts a build");
    assert_eq!(session.status().state, BuildState::Building);
    assert!(session.build_index().expect("second request").is_none());

    gate.release();
    assert!(first.join().await.is_committed());
    assert_eq!(session.status_string(), "READY");

    let again = session
        .build_index()
        .expect("rebuild")
        .expect("a finished build does not block the next one");
    assert_ne!(again.id(), first.id());
    assert!(again.join().await.is_committed());
}

#[tokio::test]
async fn cancelled_build_reports_canceled_and_serves_nothing() {
    let (session, _graph, gate) = gated_session();
    let build = session.set_enabled(true).expect("enable").expect("build");
    assert!(session.cancel_build().expect("cancel"));
    assert!(build.is_cancelled());
    gate.release();

    assert!(matches!(build.join().await, BuildOutcome::RolledBack { .. }));
    assert_eq!(session.status_string(), "CANCELED");
    assert!(session.query_string("sofia").expect("query").is_empty());
    assert!(!session.cancel_build().expect("nothing to cancel"));

    let rebuild = session.build_index().expect("rebuild").expect("build");
    assert!(rebuild.join().await.is_committed());
    assert_eq!(
        displays(&session.query_string("sofia").expect("query")),
        ["<b>Sofia</b> city &lt;urn:Sofia&gt;"]
    );
}

#[tokio::test]
async fn updates_during_build_are_replayed_once() {
    let (session, graph, gate) = gated_session();
    let build = session.set_enabled(true).expect("enable").expect("build");

    {
        let mut tx = graph.begin(&session);
        tx.add(
            Value::iri("urn:Varna"),
            Value::iri(RDFS_LABEL),
            Value::literal("Varna sea"),
        );
        tx.commit();
    }
    {
        let mut tx = graph.begin(&session);
        tx.add(
            Value::iri("urn:Burgas"),
            Value::iri("urn:near"),
            Value::iri("urn:Varna"),
        );
        tx.abort();
    }
    assert!(session.maintainer().is_building());
    assert_eq!(session.maintainer().pending_updates(), 2);

    gate.release();
    assert!(build.join().await.is_committed());
    assert!(!session.maintainer().is_building());
    assert_eq!(session.maintainer().pending_updates(), 0);

    let varna = session.query_string("varna").expect("query");
    assert_eq!(varna.len(), 1);
    assert_eq!(varna[0].iri.as_str(), "urn:Varna");
    assert!(varna[0].is_label);
    assert!(session.query_string("burgas").expect("query").is_empty());
}

#[test]
fn rebuild_with_same_data_gives_same_answers() {
    let session = Session::open(None, cities(), Weighting::unranked()).expect("session");
    let build = session.set_enabled(true).expect("enable").expect("build");
    assert!(build.wait_timeout(WAIT).expect("built").is_committed());

    let queries = ["sofia", "urn:;", "urn:;pl", "пл", ";NEAR"];
    let before: Vec<Vec<String>> = queries
        .iter()
        .map(|q| displays(&session.query_string(q).expect("query")))
        .collect();

    let rebuild = session.build_index().expect("rebuild").expect("build");
    assert!(rebuild.wait_timeout(WAIT).expect("rebuilt").is_committed());
    let after: Vec<Vec<String>> = queries
        .iter()
        .map(|q| displays(&session.query_string(q).expect("query")))
        .collect();
    assert_eq!(before, after);
    assert_eq!(before[1].len(), 3);
}

#[test]
fn config_changes_show_as_ready_config_until_rebuilt() {
    let session = Session::open(None, cities(), Weighting::unranked()).expect("session");
    let build = session.set_enabled(true).expect("enable").expect("build");
    build.wait_timeout(WAIT).expect("built");
    assert_eq!(session.status().state, BuildState::Ready);

    session.set_index_iris(false);
    assert_eq!(session.status_string(), "READY_CONFIG");
    // still served from the previous build
    assert_eq!(session.query_string("urn:;").expect("query").len(), 3);

    let rebuild = session.build_index().expect("rebuild").expect("build");
    rebuild.wait_timeout(WAIT).expect("rebuilt");
    assert_eq!(session.status_string(), "READY");
    assert!(session.query_string("urn:;").expect("query").is_empty());
    assert_eq!(
        displays(&session.query_string("пло").expect("query")),
        ["<b>Пло</b>вдив &lt;urn:Plovdiv&gt;"]
    );
}

#[test]
fn built_index_survives_reopen() {
    let temp = TempDir::new().expect("tempdir");
    let graph = cities();
    {
        let session =
            Session::open(Some(temp.path()), graph.clone(), Weighting::unranked()).expect("session");
        let build = session.set_enabled(true).expect("enable").expect("build");
        assert!(build.wait_timeout(WAIT).expect("built").is_committed());
        session.shutdown();
    }

    let session =
        Session::open(Some(temp.path()), graph, Weighting::unranked()).expect("reopen");
    assert!(session.is_enabled());
    assert_eq!(session.status().state, BuildState::Ready);
    assert_eq!(
        displays(&session.query_string("urn:;sof").expect("query")),
        ["urn:<b>Sof</b>ia"]
    );
    assert_eq!(
        displays(&session.query_string("sof").expect("query")),
        ["<b>Sof</b>ia city &lt;urn:Sofia&gt;"]
    );
}

#[test]
fn disabled_session_ignores_graph_events() {
    let graph = cities();
    let session = Session::open(None, graph.clone(), Weighting::unranked()).expect("session");
    let build = session.set_enabled(true).expect("enable").expect("build");
    build.wait_timeout(WAIT).expect("built");

    assert!(session.set_enabled(false).expect("disable").is_none());
    assert_eq!(session.status_string(), "NONE");
    {
        let mut tx = graph.begin(&session);
        tx.add(
            Value::iri("urn:Quiet"),
            Value::iri("urn:near"),
            Value::iri("urn:Sofia"),
        );
        tx.commit();
    }

    assert!(session.set_enabled(true).expect("enable").is_none());
    assert_eq!(session.status().state, BuildState::Ready);
    assert!(session.query_string("quiet").expect("query").is_empty());
}

/// Store whose next `build` fails with a queued error and whose `rollback` can be made to fail.
#[derive(Default)]
struct Faults {
    next_build_error: Mutex<Option<StoreError>>,
    fail_rollback: AtomicBool,
    reopened: AtomicUsize,
}

impl Faults {
    fn fail_next_build(&self, err: StoreError) {
        *self.next_build_error.lock().expect("faults lock") = Some(err);
    }
}

struct FaultyStore {
    inner: InfixSuggester,
    faults: Arc<Faults>,
}

impl SuggestionStore for FaultyStore {
    fn add(&self, item: IndexableItem) -> autocomplete_store::Result<()> {
        self.inner.add(item)
    }

    fn update(&self, item: IndexableItem) -> autocomplete_store::Result<()> {
        self.inner.update(item)
    }

    fn build(
        &self,
        items: &mut dyn Iterator<Item = IndexableItem>,
    ) -> autocomplete_store::Result<usize> {
        if let Some(err) = self.faults.next_build_error.lock().expect("faults lock").take() {
            return Err(err);
        }
        self.inner.build(items)
    }

    fn commit(&self) -> autocomplete_store::Result<()> {
        self.inner.commit()
    }

    fn rollback(&self) -> autocomplete_store::Result<()> {
        if self.faults.fail_rollback.load(Ordering::SeqCst) {
            return Err(StoreError::Other("rollback refused".to_string()));
        }
        self.inner.rollback()
    }

    fn lookup(
        &self,
        query: &str,
        contexts: Option<&BTreeSet<String>>,
        max: usize,
    ) -> autocomplete_store::Result<Vec<LookupResult>> {
        self.inner.lookup(query, contexts, max)
    }

    fn count(&self) -> autocomplete_store::Result<usize> {
        self.inner.count()
    }

    fn close(&self) -> autocomplete_store::Result<()> {
        self.inner.close()
    }

    fn reopen(&self) -> autocomplete_store::Result<()> {
        self.faults.reopened.fetch_add(1, Ordering::SeqCst);
        self.inner.reopen()
    }
}

/// Label iteration panics on the first build only.
struct PanickyGraph {
    graph: Arc<MemoryGraph>,
    armed: Arc<AtomicBool>,
}

impl GraphSource for PanickyGraph {
    fn value(&self, id: EntityId) -> Option<Value> {
        self.graph.value(id)
    }

    fn resolve(&self, iri: &str) -> Option<EntityId> {
        self.graph.resolve(iri)
    }

    fn entity_count(&self) -> u64 {
        self.graph.entity_count()
    }

    fn statements_with_predicate(
        &self,
        predicate: EntityId,
    ) -> Box<dyn Iterator<Item = Statement> + Send> {
        let armed = self.armed.clone();
        let mut statements = self.graph.statements_with_predicate(predicate);
        Box::new(std::iter::from_fn(move || {
            if armed.swap(false, Ordering::SeqCst) {
                panic!("label statements are unreadable");
            }
            statements.next()
        }))
    }
}

fn orchestrator_over(graph: Arc<dyn GraphSource>, faults: Arc<Faults>) -> IndexOrchestrator {
    IndexOrchestrator::new(OrchestratorParts {
        store: Arc::new(FaultyStore {
            inner: InfixSuggester::in_memory(),
            faults,
        }),
        graph,
        weighting: Arc::new(Weighting::unranked()),
        settings: AutocompleteSettings::default(),
        settings_path: None,
        has_built: false,
    })
    .expect("orchestrator")
}

fn run_build(orchestrator: &IndexOrchestrator) -> BuildOutcome {
    orchestrator
        .request_build(None)
        .expect("request")
        .expect("no build is running")
        .wait_timeout(WAIT)
        .expect("build finished")
}

#[test]
fn failing_store_build_reports_error_detail() {
    let faults = Arc::new(Faults::default());
    let orchestrator = orchestrator_over(cities(), faults.clone());
    faults.fail_next_build(StoreError::Other("disk full".to_string()));

    let outcome = run_build(&orchestrator);
    assert_eq!(
        outcome,
        BuildOutcome::Failed {
            error: "Index was not built: disk full".to_string()
        }
    );
    assert_eq!(
        orchestrator.status().to_string(),
        "ERROR: Index was not built: disk full"
    );
    assert!(orchestrator.query(None, "sofia", 10).expect("query").is_empty());
    assert_eq!(faults.reopened.load(Ordering::SeqCst), 0);

    assert!(run_build(&orchestrator).is_committed());
    assert_eq!(orchestrator.status().state, BuildState::Ready);
}

#[test]
fn closed_store_during_build_reads_as_interrupted() {
    let faults = Arc::new(Faults::default());
    let orchestrator = orchestrator_over(cities(), faults.clone());
    faults.fail_next_build(StoreError::Closed);

    assert!(matches!(run_build(&orchestrator), BuildOutcome::Failed { .. }));
    assert_eq!(
        orchestrator.status().to_string(),
        "ERROR: Indexing was interrupted."
    );
}

#[test]
fn panicking_source_is_contained_on_the_build_thread() {
    let armed = Arc::new(AtomicBool::new(true));
    let graph = Arc::new(PanickyGraph {
        graph: cities(),
        armed: armed.clone(),
    });
    let orchestrator = orchestrator_over(graph, Arc::new(Faults::default()));

    assert!(matches!(run_build(&orchestrator), BuildOutcome::Failed { .. }));
    assert!(!armed.load(Ordering::SeqCst));
    assert_eq!(
        orchestrator.status().to_string(),
        "ERROR: Index was not built: build thread panicked"
    );

    // the build thread is still there to take the next job
    assert!(run_build(&orchestrator).is_committed());
    assert_eq!(
        displays(&orchestrator.query(None, "sofia", 10).expect("query")),
        ["<b>Sofia</b> city &lt;urn:Sofia&gt;"]
    );
}

#[test]
fn failed_rollback_reopens_at_last_commit() {
    let faults = Arc::new(Faults::default());
    let orchestrator = orchestrator_over(cities(), faults.clone());
    assert!(run_build(&orchestrator).is_committed());
    let committed = orchestrator.suggestion_count().expect("count");
    assert!(committed > 0);

    faults.fail_rollback.store(true, Ordering::SeqCst);
    faults.fail_next_build(StoreError::Other("disk full".to_string()));
    assert!(matches!(run_build(&orchestrator), BuildOutcome::Failed { .. }));
    assert_eq!(faults.reopened.load(Ordering::SeqCst), 1);
    assert_eq!(orchestrator.status().state, BuildState::Error);
    assert_eq!(orchestrator.suggestion_count().expect("count"), committed);

    assert!(run_build(&orchestrator).is_committed());
    assert_eq!(orchestrator.status().to_string(), "READY");
}
