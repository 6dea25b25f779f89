use crate::error::{Result, StoreError};
use crate::item::IndexableItem;
use crate::snapshot::{load_snapshot, save_snapshot};
use crate::store::{LookupResult, SuggestionStore, HIGHLIGHT_END, HIGHLIGHT_START};
use autocomplete_analysis::{LocalNameAnalyzer, QueryTerms, Term};
use log::{debug, info, warn};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Score penalty per token position of the first matched term.
pub const POSITION_LINEAR_COEFFICIENT: f64 = 0.10;

#[derive(Debug)]
struct Entry {
    item: IndexableItem,
    terms: Vec<Term>,
}

impl Entry {
    fn new(analyzer: &LocalNameAnalyzer, item: IndexableItem) -> Arc<Self> {
        let terms = analyzer.analyze(&item.text);
        Arc::new(Self { item, terms })
    }

    /// Position of the first term hit by the query.
    fn first_match_position(&self, query: &QueryTerms) -> Option<usize> {
        self.terms
            .iter()
            .find(|t| term_matches(query, &t.term))
            .map(|t| t.position)
    }
}

fn term_matches(query: &QueryTerms, term: &str) -> bool {
    query.exact.iter().any(|q| q == term)
        || query
            .prefix
            .as_deref()
            .is_some_and(|prefix| term.starts_with(prefix))
}

/// One committed, immutable view of the index.
#[derive(Debug, Default)]
struct Generation {
    entries: Vec<Arc<Entry>>,
    postings: BTreeMap<String, Vec<usize>>,
}

impl Generation {
    fn new(entries: Vec<Arc<Entry>>) -> Self {
        let mut postings: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            for term in &entry.terms {
                let list = postings.entry(term.term.clone()).or_default();
                if list.last() != Some(&idx) {
                    list.push(idx);
                }
            }
        }
        Self { entries, postings }
    }

    fn exact(&self, term: &str) -> BTreeSet<usize> {
        self.postings
            .get(term)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    fn prefixed(&self, prefix: &str) -> BTreeSet<usize> {
        self.postings
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .take_while(|(term, _)| term.starts_with(prefix))
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect()
    }

    /// Entries containing every exact term and at least one term starting with the prefix.
    fn candidates(&self, query: &QueryTerms) -> BTreeSet<usize> {
        if query.is_empty() {
            return (0..self.entries.len()).collect();
        }
        let mut sets = query
            .exact
            .iter()
            .map(|term| self.exact(term))
            .chain(query.prefix.iter().map(|prefix| self.prefixed(prefix)));
        let Some(mut acc) = sets.next() else {
            return BTreeSet::new();
        };
        for set in sets {
            if acc.is_empty() {
                break;
            }
            acc = acc.intersection(&set).copied().collect();
        }
        acc
    }
}

/// In-memory infix suggester with blended position-linear ranking.
///
/// Readers take an `Arc` of the committed [`Generation`] and never wait for writers.
/// Writers stage a full copy of the entries which `commit` turns into the next generation.
/// With a snapshot path every commit is also written to disk and reloaded on open.
pub struct InfixSuggester {
    analyzer: LocalNameAnalyzer,
    committed: RwLock<Arc<Generation>>,
    pending: Mutex<Option<Vec<Arc<Entry>>>>,
    closed: AtomicBool,
    snapshot_path: Option<PathBuf>,
}

impl InfixSuggester {
    /// Empty suggester without persistence.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            analyzer: LocalNameAnalyzer::new(),
            committed: RwLock::new(Arc::new(Generation::default())),
            pending: Mutex::new(None),
            closed: AtomicBool::new(false),
            snapshot_path: None,
        }
    }

    /// Suggester persisted at `path`, loading the last committed generation if present.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut suggester = Self::in_memory();
        if path.exists() {
            let generation = suggester.load_generation(&path)?;
            info!(
                "Loaded {} suggestions from {}",
                generation.entries.len(),
                path.display()
            );
            suggester.committed = RwLock::new(Arc::new(generation));
        }
        suggester.snapshot_path = Some(path);
        Ok(suggester)
    }

    #[must_use]
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    fn load_generation(&self, path: &Path) -> Result<Generation> {
        let entries = load_snapshot(path)?
            .into_iter()
            .map(|item| Entry::new(&self.analyzer, item))
            .collect();
        Ok(Generation::new(entries))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(AtomicOrdering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn current(&self) -> Arc<Generation> {
        self.committed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn pending(&self) -> MutexGuard<'_, Option<Vec<Arc<Entry>>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stage(&self, f: impl FnOnce(&mut Vec<Arc<Entry>>)) -> Result<()> {
        self.ensure_open()?;
        let mut pending = self.pending();
        let entries = pending.get_or_insert_with(|| self.current().entries.clone());
        f(entries);
        Ok(())
    }

    fn highlight(&self, entry: &Entry, query: &QueryTerms) -> String {
        let chars: Vec<char> = entry.item.text.chars().collect();
        let mut out = String::with_capacity(entry.item.text.len() + 8);
        let mut cursor = 0;
        for term in &entry.terms {
            out.extend(&chars[cursor..term.token.start]);
            let surface = &chars[term.token.start..term.token.end];
            if query.exact.iter().any(|q| *q == term.term) {
                out.push(HIGHLIGHT_START);
                out.extend(surface);
                out.push(HIGHLIGHT_END);
            } else if let Some(prefix) = query
                .prefix
                .as_deref()
                .filter(|prefix| term.term.starts_with(prefix))
            {
                let split = prefix.chars().count().min(surface.len());
                out.push(HIGHLIGHT_START);
                out.extend(&surface[..split]);
                out.push(HIGHLIGHT_END);
                out.extend(&surface[split..]);
            } else {
                out.extend(surface);
            }
            cursor = term.token.end;
        }
        out.extend(&chars[cursor..]);
        out
    }
}

impl SuggestionStore for InfixSuggester {
    fn add(&self, item: IndexableItem) -> Result<()> {
        let entry = Entry::new(&self.analyzer, item);
        self.stage(|entries| entries.push(entry))
    }

    fn update(&self, item: IndexableItem) -> Result<()> {
        let entry = Entry::new(&self.analyzer, item);
        self.stage(|entries| {
            entries.retain(|e| e.item.text != entry.item.text);
            entries.push(entry);
        })
    }

    fn build(&self, items: &mut dyn Iterator<Item = IndexableItem>) -> Result<usize> {
        self.ensure_open()?;
        let entries: Vec<Arc<Entry>> = items.map(|item| Entry::new(&self.analyzer, item)).collect();
        let count = entries.len();
        *self.pending() = Some(entries);
        debug!("Staged {count} suggestions for a full rebuild");
        Ok(count)
    }

    fn commit(&self) -> Result<()> {
        self.ensure_open()?;
        let Some(entries) = self.pending().take() else {
            return Ok(());
        };
        let generation = Arc::new(Generation::new(entries));
        if let Some(path) = &self.snapshot_path {
            if let Err(err) = save_snapshot(path, generation.entries.iter().map(|e| &e.item)) {
                warn!("Failed to persist suggestions to {}: {err}", path.display());
            }
        }
        *self
            .committed
            .write()
            .unwrap_or_else(PoisonError::into_inner) = generation;
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.ensure_open()?;
        self.pending().take();
        Ok(())
    }

    fn lookup(
        &self,
        query: &str,
        contexts: Option<&BTreeSet<String>>,
        max: usize,
    ) -> Result<Vec<LookupResult>> {
        self.ensure_open()?;
        if max == 0 {
            return Ok(Vec::new());
        }
        let terms = QueryTerms::parse(&self.analyzer, query);
        if terms.is_empty() && contexts.is_none() {
            return Ok(Vec::new());
        }

        let generation = self.current();
        let mut scored: Vec<(f64, &Arc<Entry>)> = generation
            .candidates(&terms)
            .into_iter()
            .map(|idx| &generation.entries[idx])
            .filter(|entry| {
                contexts.map_or(true, |wanted| !entry.item.contexts.is_disjoint(wanted))
            })
            .map(|entry| {
                let position = entry.first_match_position(&terms).unwrap_or(0);
                let coefficient = 1.0 - POSITION_LINEAR_COEFFICIENT * position as f64;
                (entry.item.weight as f64 * coefficient, entry)
            })
            .collect();

        scored.sort_by(|(a_score, a), (b_score, b)| {
            b_score
                .partial_cmp(a_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.item.text.cmp(&b.item.text))
        });

        Ok(scored
            .into_iter()
            .take(max)
            .map(|(score, entry)| LookupResult {
                text: entry.item.text.clone(),
                highlight: self.highlight(entry, &terms),
                weight: entry.item.weight,
                score,
                payload: entry.item.payload.clone(),
            })
            .collect())
    }

    fn count(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.current().entries.len())
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, AtomicOrdering::Release);
        self.pending().take();
        Ok(())
    }

    fn reopen(&self) -> Result<()> {
        self.pending().take();
        if let Some(path) = self.snapshot_path.as_deref().filter(|p| p.exists()) {
            let generation = self.load_generation(path)?;
            *self
                .committed
                .write()
                .unwrap_or_else(PoisonError::into_inner) = Arc::new(generation);
        }
        self.closed.store(false, AtomicOrdering::Release);
        Ok(())
    }
}
