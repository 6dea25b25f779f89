//! Capabilities the autocomplete index needs from the host graph database.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable entity identifier assigned by the host. `0` never names an entity.
pub type EntityId = u64;

/// An IRI with its namespace / local name split.
///
/// The local name starts after the last `#`, or the last `/` when there is no `#`, or the
/// last `:` when there is neither.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Iri {
    value: String,
    local_start: usize,
}

impl Iri {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let local_start = value
            .rfind('#')
            .or_else(|| value.rfind('/'))
            .or_else(|| value.rfind(':'))
            .map_or(0, |idx| idx + 1);
        Self { value, local_start }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.value[..self.local_start]
    }

    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.value[self.local_start..]
    }
}

impl From<String> for Iri {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<Iri> for String {
    fn from(iri: Iri) -> Self {
        iri.value
    }
}

impl From<&str> for Iri {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// A resolved entity value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Iri(Iri),
    Literal {
        label: String,
        language: Option<String>,
    },
    BlankNode(String),
}

impl Value {
    #[must_use]
    pub fn iri(value: &str) -> Self {
        Self::Iri(Iri::new(value))
    }

    #[must_use]
    pub fn literal(label: &str) -> Self {
        Self::Literal {
            label: label.to_string(),
            language: None,
        }
    }

    #[must_use]
    pub fn lang_literal(label: &str, language: &str) -> Self {
        Self::Literal {
            label: label.to_string(),
            language: Some(language.to_string()),
        }
    }

    #[must_use]
    pub fn as_iri(&self) -> Option<&Iri> {
        match self {
            Self::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    /// Language tag of a literal, `None` for untagged literals and non-literals.
    #[must_use]
    pub fn language(&self) -> Option<&str> {
        match self {
            Self::Literal { language, .. } => language.as_deref(),
            _ => None,
        }
    }

    /// Lexical form of a literal, the IRI string or the blank node label.
    #[must_use]
    pub fn string_value(&self) -> &str {
        match self {
            Self::Iri(iri) => iri.as_str(),
            Self::Literal { label, .. } => label,
            Self::BlankNode(id) => id,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iri(iri) => write!(f, "<{iri}>"),
            Self::Literal {
                label,
                language: Some(lang),
            } => write!(f, "\"{label}\"@{lang}"),
            Self::Literal { label, .. } => write!(f, "\"{label}\""),
            Self::BlankNode(id) => write!(f, "_:{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Statement {
    pub subject: EntityId,
    pub predicate: EntityId,
    pub object: EntityId,
}

impl Statement {
    #[must_use]
    pub fn new(subject: EntityId, predicate: EntityId, object: EntityId) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

/// Read access to entities and statements.
///
/// Implementations must be safe to read from the build thread while writers keep adding
/// entities; ids handed out are never reused.
pub trait GraphSource: Send + Sync {
    fn value(&self, id: EntityId) -> Option<Value>;

    fn resolve(&self, iri: &str) -> Option<EntityId>;

    /// Highest assigned entity id.
    fn entity_count(&self) -> u64;

    /// Point-in-time iterator over every statement with `predicate`.
    fn statements_with_predicate(
        &self,
        predicate: EntityId,
    ) -> Box<dyn Iterator<Item = Statement> + Send>;
}

/// Normalized importance of an entity in `[0, 1]`.
pub trait RankProvider: Send + Sync {
    fn normalized_rank(&self, id: EntityId) -> f64;
}

/// Mutation events delivered by the host, in transaction order.
pub trait GraphListener: Send + Sync {
    fn entity_added(&self, id: EntityId, value: &Value);

    fn statement_added(&self, statement: Statement);

    fn statement_removed(&self, statement: Statement);

    fn transaction_started(&self) {}

    fn transaction_commit(&self);

    fn transaction_completed(&self) {}

    fn transaction_aborted(&self);
}
