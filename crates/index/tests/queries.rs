use autocomplete_index::{
    GraphSource, MemoryGraph, RankProvider, Session, StaticRanks, Suggestion, Value, Weighting,
    RDFS_LABEL,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn ready_session(graph: Arc<MemoryGraph>, weighting: Weighting) -> Session {
    let session = Session::open(None, graph, weighting).expect("session");
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

fn graph_of(triples: &[(&str, &str, &str)]) -> Arc<MemoryGraph> {
    let graph = Arc::new(MemoryGraph::new());
    for (s, p, o) in triples {
        graph.load(Value::iri(s), Value::iri(p), Value::iri(o));
    }
    graph
}

fn count(session: &Session, query: &str) -> usize {
    session.query_string(query).expect("query").len()
}

fn pairs(suggestions: &[Suggestion]) -> Vec<(String, String)> {
    suggestions
        .iter()
        .map(|s| (s.iri.to_string(), s.display.clone()))
        .collect()
}

#[test]
fn local_names_with_and_without_namespace() {
    let session = ready_session(
        graph_of(&[
            ("s:1", "p:1", "a:abcde"),
            ("s:1", "p:2", "b:abcab"),
            ("prefix:hijk", "prefix:2", "http://ontotext.com/ffff"),
        ]),
        Weighting::unranked(),
    );
    assert_eq!(count(&session, "ab"), 2);
    assert_eq!(count(&session, "prefix:;h"), 1);
    assert_eq!(count(&session, "prefix:;hi"), 1);
    assert_eq!(count(&session, "http://ontotext.com/;ff"), 1);
    assert_eq!(count(&session, "prefix:;"), 2);
    assert_eq!(count(&session, ""), 0);
}

#[test]
fn camel_case_numbers_and_underscores_split_into_words() {
    let session = ready_session(
        graph_of(&[
            ("wine:WhiteBurgundy", "wine:madeFromGrape", "wine:ChardonnayGrape"),
            ("wine:SomeThing", "wine:OtherThing", "wine:boo"),
            ("wine:hasMoo", "wine:CorbansPrivateBinSauvignonBlanc", "wine:Moo"),
            ("wine1:white_burgundy", "wine1:made_from_drape", "wine1:chardonnay_drape"),
            ("wine1:SaucelitoCanyonZinfandel1998", "wine1:madeFromGrape", "wine1:ChardonnayGrape"),
            ("wine1:WhiteBURgundy", "wine1:madeFromGrape", "wine1:ChardonnayGrape"),
        ]),
        Weighting::unranked(),
    );
    assert_eq!(count(&session, "wine:;Gr"), 2);
    assert_eq!(count(&session, "wine:;TH"), 2);
    assert_eq!(count(&session, "wine:;hasMo"), 1);
    assert_eq!(count(&session, "wine1:;dr"), 2);
    assert_eq!(count(&session, "wine1:;19"), 1);
    assert_eq!(count(&session, "wine1:;bu"), 2);
    assert_eq!(count(&session, "wine1:;rg"), 1);
}

#[test]
fn reasoner_internals_are_never_suggested() {
    let session = ready_session(
        graph_of(&[
            (
                "http://www.ontotext.com/_allTypes",
                "http://www.ontotext.com/isInconsistentWith",
                "http://www.ontotext.com/check_cax_dw",
            ),
            ("urn:a", "urn:b", "urn:c"),
        ]),
        Weighting::unranked(),
    );
    assert_eq!(count(&session, "http://www.ontotext.com/;"), 0);
    assert_eq!(count(&session, "urn:;"), 3);
}

fn capitals() -> Arc<MemoryGraph> {
    let graph = Arc::new(MemoryGraph::new());
    for (subject, label) in [
        ("urn:USRegion", "САЩ"),
        ("urn:USRR", "union of socialist russian republics"),
        ("urn:NATO", "OTAN"),
    ] {
        graph.load(Value::iri(subject), Value::iri(RDFS_LABEL), Value::literal(label));
    }
    graph
}

fn assert_capital_suggestions(session: &Session) {
    let us = pairs(&session.query_string(";US").expect("query"));
    assert!(us.contains(&("urn:USRegion".into(), "urn:<b>US</b>Region".into())));
    assert!(us.contains(&("urn:USRR".into(), "urn:<b>US</b>RR".into())));

    let usr = pairs(&session.query_string(";USR").expect("query"));
    assert_eq!(
        usr,
        [
            ("urn:USRegion".to_string(), "urn:<b>US</b><b>R</b>egion".to_string()),
            ("urn:USRR".to_string(), "urn:<b>USR</b>R".to_string()),
        ]
    );

    let nato = pairs(&session.query_string(";NATO").expect("query"));
    assert!(nato.contains(&("urn:NATO".into(), "urn:<b>NATO</b>".into())));
}

#[test]
fn capitals_match_after_loading_first() {
    let session = ready_session(capitals(), Weighting::unranked());
    assert_capital_suggestions(&session);
}

#[test]
fn capitals_match_when_indexed_incrementally() {
    let graph = Arc::new(MemoryGraph::new());
    graph.load(Value::iri("urn:seed"), Value::iri(RDFS_LABEL), Value::literal("seed"));
    let session = ready_session(graph.clone(), Weighting::unranked());

    let mut tx = graph.begin(&session);
    for (subject, label) in [
        ("urn:USRegion", "САЩ"),
        ("urn:USRR", "union of socialist russian republics"),
        ("urn:NATO", "OTAN"),
    ] {
        tx.add(Value::iri(subject), Value::iri(RDFS_LABEL), Value::literal(label));
    }
    tx.commit();
    assert_capital_suggestions(&session);
}

#[test]
fn ranked_entity_beats_unranked_one_of_equal_length() {
    let graph = graph_of(&[("urn:Lima", "urn:p", "urn:Lime")]);
    let unranked = ready_session(graph.clone(), Weighting::unranked());
    assert_eq!(
        pairs(&unranked.query_string("li").expect("query"))
            .into_iter()
            .map(|(iri, _)| iri)
            .collect::<Vec<_>>(),
        ["urn:Lima", "urn:Lime"]
    );
    unranked.shutdown();

    let lime = graph.resolve("urn:Lime").expect("lime id");
    let ranks: Arc<dyn RankProvider> = Arc::new(StaticRanks::from_iter([(lime, 0.9)]));
    let ranked = ready_session(graph, Weighting::with_provider(Some(ranks)));
    assert_eq!(
        pairs(&ranked.query_string("li").expect("query"))
            .into_iter()
            .map(|(iri, _)| iri)
            .collect::<Vec<_>>(),
        ["urn:Lime", "urn:Lima"]
    );
}

#[test]
fn label_and_identifier_of_one_entity_collapse_to_the_label() {
    let graph = Arc::new(MemoryGraph::new());
    graph.load(
        Value::iri("urn:Sofia"),
        Value::iri(RDFS_LABEL),
        Value::literal("Sofia & \"Serdika\""),
    );
    let session = ready_session(graph, Weighting::unranked());
    assert_eq!(
        pairs(&session.query_string("sof").expect("query")),
        [(
            "urn:Sofia".to_string(),
            "<b>Sof</b>ia &amp; &quot;Serdika&quot; &lt;urn:Sofia&gt;".to_string()
        )]
    );
}
