use autocomplete_index::{
    Iri, LabelConfig, MemoryGraph, Session, Suggestion, Value, Weighting, RDFS_LABEL,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn ready_session(graph: Arc<MemoryGraph>) -> Session {
    let session = Session::open(None, graph, Weighting::unranked()).expect("session");
    let build = session
        .set_enabled(true)
        .expect("enable")
        .expect("initial build");
    assert!(build
        .wait_timeout(Duration::from_secs(10))
        .expect("build finished")
        .is_committed());
    session
}

fn seeded() -> Arc<MemoryGraph> {
    let graph = Arc::new(MemoryGraph::new());
    graph.load(
        Value::iri("urn:Sofia"),
        Value::iri(RDFS_LABEL),
        Value::literal("Sofia city"),
    );
    graph
}

fn displays(suggestions: &[Suggestion]) -> Vec<String> {
    suggestions.iter().map(|s| s.display.clone()).collect()
}

#[test]
fn aborted_transaction_leaves_no_trace() {
    let graph = seeded();
    let session = ready_session(graph.clone());

    let mut tx = graph.begin(&session);
    tx.add(
        Value::iri("urn:Ghost"),
        Value::iri(RDFS_LABEL),
        Value::literal("Ghost town"),
    );
    assert!(session.maintainer().is_dirty());
    tx.abort();

    assert!(!session.maintainer().is_dirty());
    assert!(session.query_string("ghost").expect("query").is_empty());
}

#[test]
fn dropped_transaction_is_aborted() {
    let graph = seeded();
    let session = ready_session(graph.clone());
    {
        let mut tx = graph.begin(&session);
        tx.add(
            Value::iri("urn:Ghost"),
            Value::iri("urn:near"),
            Value::iri("urn:Sofia"),
        );
    }
    assert!(session.query_string("ghost").expect("query").is_empty());
}

#[test]
fn committed_transaction_is_queryable() {
    let graph = seeded();
    let session = ready_session(graph.clone());

    let mut tx = graph.begin(&session);
    tx.add(
        Value::iri("urn:Ruse"),
        Value::iri(RDFS_LABEL),
        Value::lang_literal("Ruse on the Danube", "en"),
    );
    // staged but not committed
    assert!(session.query_string("ruse").expect("query").is_empty());
    tx.commit();

    assert_eq!(
        displays(&session.query_string("dan").expect("query")),
        ["Ruse on the <b>Dan</b>ube &lt;urn:Ruse&gt;"]
    );
    assert_eq!(
        displays(&session.query_string("urn:;ru").expect("query")),
        ["urn:<b>Ru</b>se"]
    );
}

#[test]
fn removed_label_is_retracted() {
    let graph = seeded();
    let session = ready_session(graph.clone());

    let mut tx = graph.begin(&session);
    assert!(tx.remove(
        &Value::iri("urn:Sofia"),
        &Value::iri(RDFS_LABEL),
        &Value::literal("Sofia city"),
    ));
    tx.commit();

    assert_eq!(
        displays(&session.query_string("sofia").expect("query")),
        ["urn:<b>Sofia</b>"]
    );
    assert!(session.query_string("city").expect("query").is_empty());
}

#[test]
fn label_predicate_added_later_is_picked_up() {
    let graph = seeded();
    let session = ready_session(graph.clone());
    assert!(session.add_label_config(LabelConfig::new("urn:name", "en")));
    assert_eq!(
        session.maintainer().unresolved_predicates(),
        vec!["urn:name".to_string()]
    );

    let build = session.build_index().expect("rebuild").expect("build");
    build
        .wait_timeout(Duration::from_secs(10))
        .expect("rebuilt");

    let mut tx = graph.begin(&session);
    tx.add(
        Value::iri("urn:Ivan"),
        Value::iri("urn:name"),
        Value::lang_literal("Ivan Petrov", "en"),
    );
    tx.add(
        Value::iri("urn:Ivan"),
        Value::iri("urn:name"),
        Value::lang_literal("Иван Петров", "bg"),
    );
    tx.commit();

    assert!(session.maintainer().unresolved_predicates().is_empty());
    assert_eq!(
        displays(&session.query_string("petrov").expect("query")),
        ["Ivan <b>Petrov</b> &lt;urn:Ivan&gt;"]
    );
    assert!(session.query_string("петров").expect("query").is_empty());
}

#[test]
fn direct_writes_wait_for_commit() {
    let graph = seeded();
    let session = ready_session(graph.clone());
    let (id, _) = graph.intern(Value::iri("urn:Pleven"));

    session
        .index_iri(id, &Iri::new("urn:Pleven"))
        .expect("index iri");
    assert!(session.query_string("pleven").expect("query").is_empty());
    session.rollback().expect("rollback");
    session.commit().expect("nothing to commit");
    assert!(session.query_string("pleven").expect("query").is_empty());

    session.index_label(id, "Pleven town").expect("index label");
    session.commit().expect("commit");
    assert_eq!(
        displays(&session.query_string("town").expect("query")),
        ["Pleven <b>town</b> &lt;urn:Pleven&gt;"]
    );
}
