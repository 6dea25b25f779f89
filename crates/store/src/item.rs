use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Context carried by every label-derived item.
pub const LABEL_CONTEXT: &str = "label";

/// Encoded payload length: 8 bytes of entity id plus one source flag byte.
pub const PAYLOAD_LEN: usize = 9;

/// Where an indexed text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Iri,
    Label,
}

impl SourceKind {
    fn flag(self) -> u8 {
        match self {
            Self::Iri => 0,
            Self::Label => 1,
        }
    }
}

/// Decoded item payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Payload {
    pub entity_id: u64,
    pub kind: SourceKind,
}

impl Payload {
    #[must_use]
    pub fn new(entity_id: u64, kind: SourceKind) -> Self {
        Self { entity_id, kind }
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(PAYLOAD_LEN);
        bytes.extend_from_slice(&self.entity_id.to_be_bytes());
        bytes.push(self.kind.flag());
        bytes
    }

    /// Decode raw payload bytes. An empty slice is a tombstone and yields `None`.
    pub fn decode(bytes: &[u8]) -> Result<Option<Self>> {
        if bytes.is_empty() {
            return Ok(None);
        }
        if bytes.len() != PAYLOAD_LEN {
            return Err(StoreError::InvalidPayload {
                expected: PAYLOAD_LEN,
                actual: bytes.len(),
            });
        }
        let mut id = [0u8; 8];
        id.copy_from_slice(&bytes[..8]);
        // Any non-zero flag is treated as label-derived.
        let kind = if bytes[8] == 0 {
            SourceKind::Iri
        } else {
            SourceKind::Label
        };
        Ok(Some(Self {
            entity_id: u64::from_be_bytes(id),
            kind,
        }))
    }
}

/// One unit of content handed to a suggestion store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexableItem {
    pub text: String,
    pub weight: i64,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub contexts: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payload: Vec<u8>,
}

impl IndexableItem {
    /// Identifier-derived item: the local name, tagged with its namespace.
    #[must_use]
    pub fn iri(entity_id: u64, local_name: &str, namespace: &str, weight: i64) -> Self {
        Self {
            text: local_name.to_string(),
            weight,
            contexts: BTreeSet::from([namespace.to_string()]),
            payload: Payload::new(entity_id, SourceKind::Iri).encode(),
        }
    }

    /// Label-derived item, tagged with [`LABEL_CONTEXT`].
    #[must_use]
    pub fn label(entity_id: u64, text: &str, weight: i64) -> Self {
        Self {
            text: text.to_string(),
            weight,
            contexts: BTreeSet::from([LABEL_CONTEXT.to_string()]),
            payload: Payload::new(entity_id, SourceKind::Label).encode(),
        }
    }

    /// Marks every entry with this exact text as deleted.
    #[must_use]
    pub fn tombstone(text: &str) -> Self {
        Self {
            text: text.to_string(),
            weight: 0,
            contexts: BTreeSet::new(),
            payload: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.payload.is_empty()
    }
}
