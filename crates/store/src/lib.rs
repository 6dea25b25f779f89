//! # Autocomplete Store
//!
//! Transactional suggestion storage behind the [`SuggestionStore`] trait.
//!
//! ## Architecture
//!
//! ```text
//! add / update / build
//!     │
//!     ├──> staged entries (copy of last generation)
//!     │
//!     ├──> commit ──> new Generation (postings rebuilt) ──> suggestions.json
//!     │
//!     └──> rollback ──> staged entries dropped
//!
//! lookup ──> Arc<Generation> (never blocks on writers)
//! ```
//!
//! ## Example
//!
//! ```
//! use autocomplete_store::{IndexableItem, InfixSuggester, SuggestionStore};
//!
//! # fn main() -> autocomplete_store::Result<()> {
//! let store = InfixSuggester::in_memory();
//! store.add(IndexableItem::iri(1, "IvanPetrov", "urn:", 990))?;
//! store.commit()?;
//!
//! let results = store.lookup("ivan p", None, 10)?;
//! assert_eq!(results[0].text, "IvanPetrov");
//! # Ok(())
//! # }
//! ```

mod error;
mod infix;
mod item;
mod snapshot;
mod store;

pub use error::{Result, StoreError};
pub use infix::{InfixSuggester, POSITION_LINEAR_COEFFICIENT};
pub use item::{IndexableItem, Payload, SourceKind, LABEL_CONTEXT, PAYLOAD_LEN};
pub use snapshot::{load_snapshot, save_snapshot, SUGGESTION_SNAPSHOT_SCHEMA_VERSION};
pub use store::{LookupResult, SuggestionStore, HIGHLIGHT_END, HIGHLIGHT_START};
