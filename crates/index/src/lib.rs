//! # Autocomplete Index
//!
//! Keeps an infix autocomplete index over graph entity identifiers and labels in step with
//! the graph, and answers ranked prefix queries against it.
//!
//! ## Architecture
//!
//! ```text
//! Session ── GraphListener events ──> UpdateMaintainer
//!    │                                    │  (buffers while building)
//!    │                                    ▼
//!    ├── build_index ──────────────> IndexOrchestrator ── build thread
//!    │                                    │                  │
//!    │                                    │        ItemStream (entities + labels)
//!    │                                    ▼                  │
//!    └── query ──> acronym merge ──> SuggestionStore <───────┘
//!                        │
//!                        └─> per-entity dedup ──> Suggestion (<b>highlight</b>)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use autocomplete_index::{MemoryGraph, Session, Value, Weighting};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn main() -> autocomplete_index::Result<()> {
//! let graph = Arc::new(MemoryGraph::new());
//! graph.load(Value::iri("urn:USRegion"), Value::iri("urn:near"), Value::iri("urn:NATO"));
//!
//! let session = Session::open(None, graph, Weighting::unranked())?;
//! if let Some(build) = session.set_enabled(true)? {
//!     build.wait_timeout(Duration::from_secs(10));
//! }
//! for suggestion in session.query_string("urn:;USR")? {
//!     println!("{}", suggestion.display);
//! }
//! # Ok(())
//! # }
//! ```

mod build;
mod error;
mod graph;
mod label;
mod maintainer;
mod memory;
mod merge;
mod orchestrator;
mod session;
mod settings;
mod sources;
mod status;
mod weight;

pub use autocomplete_analysis::{tokenize, LocalNameAnalyzer, Token};
pub use autocomplete_store::{IndexableItem, InfixSuggester, LookupResult, SuggestionStore};
pub use build::{BuildHandle, BuildOutcome, CancelFlag};
pub use error::{AutocompleteError, Result};
pub use graph::{EntityId, GraphListener, GraphSource, Iri, RankProvider, Statement, Value};
pub use label::{LabelConfig, RDFS_LABEL, UNTAGGED_LANGUAGE};
pub use maintainer::{PendingUpdate, PendingUpdateBuffer, UpdateMaintainer};
pub use memory::{GraphTransaction, MemoryGraph, StaticRanks};
pub use merge::{acronym_alternate, htmlify, interleave, is_acronym, resolve, Suggestion};
pub use orchestrator::{BuildHook, IndexOrchestrator, OrchestratorParts};
pub use session::{
    parse_query_string, Session, DEFAULT_RESULT_COUNT, INDEX_DIR, SETTINGS_FILE, SNAPSHOT_FILE,
};
pub use settings::{AutocompleteSettings, IndexSettings, SETTINGS_SCHEMA_VERSION};
pub use sources::{is_special_entity, EntitiesSource, ItemStream, LabelsSource};
pub use status::{BuildState, IndexStatus};
pub use weight::{weight_for, Weighting, RANK_THRESHOLD};
