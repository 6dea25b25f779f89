use crate::error::Result;
use crate::item::{IndexableItem, Payload};
use std::collections::BTreeSet;

/// Start of a highlighted span inside [`LookupResult::highlight`].
pub const HIGHLIGHT_START: char = '\u{2}';
/// End of a highlighted span inside [`LookupResult::highlight`].
pub const HIGHLIGHT_END: char = '\u{3}';

/// A ranked match returned by [`SuggestionStore::lookup`].
#[derive(Debug, Clone, PartialEq)]
pub struct LookupResult {
    pub text: String,
    /// `text` with matched spans wrapped in [`HIGHLIGHT_START`] / [`HIGHLIGHT_END`].
    pub highlight: String,
    pub weight: i64,
    pub score: f64,
    pub payload: Vec<u8>,
}

impl LookupResult {
    /// Decoded payload, `None` for tombstones and malformed payloads.
    #[must_use]
    pub fn decoded_payload(&self) -> Option<Payload> {
        Payload::decode(&self.payload).ok().flatten()
    }
}

/// Transactional infix suggester.
///
/// Writes (`add`, `update`, `build`) are staged and become visible to `lookup` only after
/// `commit`. `rollback` discards everything staged since the last commit. Callers are
/// expected to serialize writers; readers may run concurrently with them.
pub trait SuggestionStore: Send + Sync {
    /// Stage one more entry.
    fn add(&self, item: IndexableItem) -> Result<()>;

    /// Stage a replacement of every entry whose text equals `item.text`.
    fn update(&self, item: IndexableItem) -> Result<()>;

    /// Stage a full replacement of the content with `items`. Returns how many were read.
    fn build(&self, items: &mut dyn Iterator<Item = IndexableItem>) -> Result<usize>;

    /// Publish staged writes as the new readable generation.
    fn commit(&self) -> Result<()>;

    /// Drop staged writes; readers keep seeing the last committed generation.
    fn rollback(&self) -> Result<()>;

    /// Ranked lookup. `contexts`, when given, keeps only entries tagged with one of them.
    fn lookup(
        &self,
        query: &str,
        contexts: Option<&BTreeSet<String>>,
        max: usize,
    ) -> Result<Vec<LookupResult>>;

    /// Number of committed entries.
    fn count(&self) -> Result<usize>;

    /// Reject further reads and writes and drop staged writes.
    fn close(&self) -> Result<()>;

    /// Reopen at the last committed generation after `close` or a failed rollback.
    fn reopen(&self) -> Result<()>;
}
