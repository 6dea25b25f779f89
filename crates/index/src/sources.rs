//! Item streams feeding a full build.

use crate::build::CancelFlag;
use crate::graph::{EntityId, GraphSource, Statement};
use crate::label::LabelConfig;
use crate::settings::IndexSettings;
use crate::weight::Weighting;
use autocomplete_store::IndexableItem;
use log::{debug, warn};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::Arc;

const ONTOTEXT_NAMESPACE: &str = "http://www.ontotext.com/";

/// Reasoner-internal identifiers that must never show up as suggestions.
static SPECIAL_ENTITIES: Lazy<HashSet<String>> = Lazy::new(|| {
    [
        "check_prp_irp",
        "check_prp_npa1",
        "check_prp_npa2",
        "scm_int",
        "_owl_allDisjProp",
        "check_prp_asyp",
        "check_cls_nothing2",
        "check_cls_com",
        "check_prp_pdw",
        "_cls-oo",
        "_interOf",
        "_AllDisjointClasses",
        "_oneOf",
        "_owl_allDisjClasses",
        "_AllDisjointProperties",
        "_allTypes",
        "isInconsistentWith",
        "check_cax_dw",
        "_typeByInt",
        "_unionOf",
        "_union",
    ]
    .iter()
    .map(|local| format!("{ONTOTEXT_NAMESPACE}{local}"))
    .collect()
});

#[must_use]
pub fn is_special_entity(iri: &str) -> bool {
    SPECIAL_ENTITIES.contains(iri)
}

/// Every IRI entity with id in `1..=last_id`, as identifier-derived items.
pub struct EntitiesSource {
    graph: Arc<dyn GraphSource>,
    weighting: Arc<Weighting>,
    next_id: EntityId,
    last_id: EntityId,
    cancel: CancelFlag,
}

impl EntitiesSource {
    #[must_use]
    pub fn new(graph: Arc<dyn GraphSource>, weighting: Arc<Weighting>, cancel: CancelFlag) -> Self {
        let last_id = graph.entity_count();
        Self {
            graph,
            weighting,
            next_id: 1,
            last_id,
            cancel,
        }
    }
}

impl Iterator for EntitiesSource {
    type Item = IndexableItem;

    fn next(&mut self) -> Option<IndexableItem> {
        while self.next_id <= self.last_id {
            if self.cancel.is_cancelled() {
                return None;
            }
            let id = self.next_id;
            self.next_id += 1;
            let Some(value) = self.graph.value(id) else {
                continue;
            };
            let Some(iri) = value.as_iri() else {
                continue;
            };
            if is_special_entity(iri.as_str()) {
                continue;
            }
            let local_name = iri.local_name();
            let weight = self.weighting.weight(id, local_name);
            return Some(IndexableItem::iri(id, local_name, iri.namespace(), weight));
        }
        None
    }
}

/// Labels of IRI subjects for one label predicate, filtered by language.
pub struct LabelsSource {
    graph: Arc<dyn GraphSource>,
    weighting: Arc<Weighting>,
    config: LabelConfig,
    statements: Box<dyn Iterator<Item = Statement> + Send>,
    cancel: CancelFlag,
}

impl LabelsSource {
    #[must_use]
    pub fn new(
        graph: Arc<dyn GraphSource>,
        weighting: Arc<Weighting>,
        config: LabelConfig,
        cancel: CancelFlag,
    ) -> Self {
        let statements = graph.statements_with_predicate(config.predicate_id);
        Self {
            graph,
            weighting,
            config,
            statements,
            cancel,
        }
    }
}

impl Iterator for LabelsSource {
    type Item = IndexableItem;

    fn next(&mut self) -> Option<IndexableItem> {
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }
            let statement = self.statements.next()?;
            let subject_is_iri = self
                .graph
                .value(statement.subject)
                .is_some_and(|v| v.as_iri().is_some());
            if !subject_is_iri {
                continue;
            }
            let Some(object) = self.graph.value(statement.object) else {
                continue;
            };
            if !self.config.language_matches(object.language()) {
                continue;
            }
            let label = object.string_value();
            let weight = self.weighting.weight(statement.subject, label);
            return Some(IndexableItem::label(statement.subject, label, weight));
        }
    }
}

/// Concatenation of all enabled sources, in order.
pub struct ItemStream {
    sources: Vec<Box<dyn Iterator<Item = IndexableItem> + Send>>,
    current: usize,
    produced: usize,
}

impl ItemStream {
    /// Sources for `settings`: entities first when IRIs are indexed, then one source per
    /// resolved label config. Statement iterators are opened here, so the stream reflects
    /// the graph as of this call.
    #[must_use]
    pub fn compose(
        settings: &IndexSettings,
        graph: &Arc<dyn GraphSource>,
        weighting: &Arc<Weighting>,
        cancel: &CancelFlag,
    ) -> Self {
        let mut sources: Vec<Box<dyn Iterator<Item = IndexableItem> + Send>> = Vec::new();
        if settings.index_iris {
            sources.push(Box::new(EntitiesSource::new(
                graph.clone(),
                weighting.clone(),
                cancel.clone(),
            )));
        }
        for config in settings.label_configs() {
            if !config.is_resolved() {
                debug!("Skipping unresolved label predicate {}", config.predicate);
                continue;
            }
            sources.push(Box::new(LabelsSource::new(
                graph.clone(),
                weighting.clone(),
                config.clone(),
                cancel.clone(),
            )));
        }
        if sources.is_empty() {
            warn!(
                "Neither IRIs nor labels are configured for autocomplete indexing. The index will be empty."
            );
        }
        Self::new(sources)
    }

    #[must_use]
    pub fn new(sources: Vec<Box<dyn Iterator<Item = IndexableItem> + Send>>) -> Self {
        Self {
            sources,
            current: 0,
            produced: 0,
        }
    }

    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Items handed out so far.
    #[must_use]
    pub fn produced(&self) -> usize {
        self.produced
    }
}

impl Iterator for ItemStream {
    type Item = IndexableItem;

    fn next(&mut self) -> Option<IndexableItem> {
        while let Some(source) = self.sources.get_mut(self.current) {
            if let Some(item) = source.next() {
                self.produced += 1;
                return Some(item);
            }
            self.current += 1;
        }
        None
    }
}
