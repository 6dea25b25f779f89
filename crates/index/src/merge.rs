//! Query-time result merging: acronym fallback, interleaving, per-entity dedup and
//! rendering.

use crate::graph::{EntityId, GraphSource, Iri};
use autocomplete_store::{LookupResult, SourceKind, HIGHLIGHT_END, HIGHLIGHT_START};
use log::error;
use serde::Serialize;
use std::collections::HashMap;

/// A rendered suggestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub entity_id: EntityId,
    pub iri: Iri,
    /// HTML: escaped text with matches in `<b>..</b>`.
    pub display: String,
    pub is_label: bool,
}

impl Suggestion {
    fn new(entity_id: EntityId, iri: Iri, highlight: &str, is_label: bool) -> Self {
        let raw = if is_label {
            format!("{highlight} <{iri}>")
        } else {
            format!("{}{highlight}", iri.namespace())
        };
        Self {
            entity_id,
            iri,
            display: htmlify(&raw),
            is_label,
        }
    }

    /// Labels beat identifiers; within a kind the shorter rendering wins.
    fn is_better_than(&self, other: &Self) -> bool {
        (self.is_label && !other.is_label)
            || (self.is_label == other.is_label
                && self.display.chars().count() < other.display.chars().count())
    }
}

/// Three or more uppercase letters and nothing else, e.g. `USR`.
#[must_use]
pub fn is_acronym(query: &str) -> bool {
    query.chars().count() >= 3 && query.chars().all(char::is_uppercase)
}

/// `USR` → `US R`, so that a query typed in capitals also matches `USRegion`.
#[must_use]
pub fn acronym_alternate(query: &str) -> Option<String> {
    if !is_acronym(query) {
        return None;
    }
    let (split, last) = query.char_indices().last()?;
    Some(format!("{} {last}", &query[..split]))
}

/// Alternate and primary results taken in pairs, alternate first, until either list runs
/// out or `max` is reached. An empty list leaves the other one as it is.
#[must_use]
pub fn interleave(
    alternate: Vec<LookupResult>,
    primary: Vec<LookupResult>,
    max: usize,
) -> Vec<LookupResult> {
    if alternate.is_empty() {
        return primary;
    }
    if primary.is_empty() {
        return alternate;
    }
    let mut merged = Vec::with_capacity((2 * alternate.len().min(primary.len())).min(max));
    for (a, p) in alternate.into_iter().zip(primary) {
        for result in [a, p] {
            if merged.len() == max {
                return merged;
            }
            merged.push(result);
        }
    }
    merged
}

/// Resolve payloads to entities and keep the best result per entity, in first-seen order.
pub fn resolve(results: Vec<LookupResult>, graph: &dyn GraphSource) -> Vec<Suggestion> {
    let mut suggestions: Vec<Suggestion> = Vec::new();
    let mut by_entity: HashMap<EntityId, usize> = HashMap::new();

    for result in results {
        // Tombstones and malformed payloads are skipped.
        let Some(payload) = result.decoded_payload() else {
            continue;
        };
        // Dangling ids come from rolled back entities.
        let Some(value) = graph.value(payload.entity_id) else {
            continue;
        };
        let Some(iri) = value.as_iri() else {
            error!(
                "Found a non-IRI entity in autocomplete results: {} => {value}",
                payload.entity_id
            );
            continue;
        };
        let candidate = Suggestion::new(
            payload.entity_id,
            iri.clone(),
            &result.highlight,
            payload.kind == SourceKind::Label,
        );
        match by_entity.get(&payload.entity_id) {
            Some(&idx) => {
                if candidate.is_better_than(&suggestions[idx]) {
                    suggestions[idx] = candidate;
                }
            }
            None => {
                by_entity.insert(payload.entity_id, suggestions.len());
                suggestions.push(candidate);
            }
        }
    }
    suggestions
}

/// HTML-escape and turn highlight markers into `<b>` tags.
#[must_use]
pub fn htmlify(highlight: &str) -> String {
    let mut out = String::with_capacity(highlight.len() + 16);
    for c in highlight.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            HIGHLIGHT_START => out.push_str("<b>"),
            HIGHLIGHT_END => out.push_str("</b>"),
            c => out.push(c),
        }
    }
    out
}
