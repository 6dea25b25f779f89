//! In-memory graph used by the CLI and by tests.

use crate::graph::{EntityId, GraphListener, GraphSource, RankProvider, Statement, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct GraphData {
    values: Vec<Value>,
    ids: HashMap<Value, EntityId>,
    // (predicate, subject, object)
    statements: BTreeSet<(EntityId, EntityId, EntityId)>,
}

/// Entity dictionary plus statement set. Ids start at 1 and are never reused.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    data: RwLock<GraphData>,
}

impl MemoryGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, GraphData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, GraphData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Id for `value`, assigning a new one if needed. The flag is `true` for new entities.
    pub fn intern(&self, value: Value) -> (EntityId, bool) {
        let mut data = self.write();
        if let Some(id) = data.ids.get(&value) {
            return (*id, false);
        }
        data.values.push(value.clone());
        let id = data.values.len() as EntityId;
        data.ids.insert(value, id);
        (id, true)
    }

    #[must_use]
    pub fn id_of(&self, value: &Value) -> Option<EntityId> {
        self.read().ids.get(value).copied()
    }

    #[must_use]
    pub fn contains(&self, statement: Statement) -> bool {
        self.read().statements.contains(&(
            statement.predicate,
            statement.subject,
            statement.object,
        ))
    }

    #[must_use]
    pub fn statement_count(&self) -> usize {
        self.read().statements.len()
    }

    fn insert(&self, statement: Statement) -> bool {
        self.write()
            .statements
            .insert((statement.predicate, statement.subject, statement.object))
    }

    fn delete(&self, statement: Statement) -> bool {
        self.write()
            .statements
            .remove(&(statement.predicate, statement.subject, statement.object))
    }

    /// Add statements without notifying anyone, e.g. when loading data before the index
    /// exists.
    pub fn load(&self, subject: Value, predicate: Value, object: Value) -> Statement {
        let statement = Statement::new(
            self.intern(subject).0,
            self.intern(predicate).0,
            self.intern(object).0,
        );
        self.insert(statement);
        statement
    }

    /// Start a transaction whose events go to `listener`.
    pub fn begin<'a>(&'a self, listener: &'a dyn GraphListener) -> GraphTransaction<'a> {
        listener.transaction_started();
        GraphTransaction {
            graph: self,
            listener,
            added: Vec::new(),
            removed: Vec::new(),
            finished: false,
        }
    }
}

impl GraphSource for MemoryGraph {
    fn value(&self, id: EntityId) -> Option<Value> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.read().values.get(index).cloned()
    }

    fn resolve(&self, iri: &str) -> Option<EntityId> {
        self.id_of(&Value::iri(iri))
    }

    fn entity_count(&self) -> u64 {
        self.read().values.len() as u64
    }

    fn statements_with_predicate(
        &self,
        predicate: EntityId,
    ) -> Box<dyn Iterator<Item = Statement> + Send> {
        let matching: Vec<Statement> = self
            .read()
            .statements
            .range((predicate, 0, 0)..=(predicate, EntityId::MAX, EntityId::MAX))
            .map(|&(p, s, o)| Statement::new(s, p, o))
            .collect();
        Box::new(matching.into_iter())
    }
}

/// Statement changes reported to a [`GraphListener`] as they happen.
///
/// Dropping an unfinished transaction aborts it.
pub struct GraphTransaction<'a> {
    graph: &'a MemoryGraph,
    listener: &'a dyn GraphListener,
    added: Vec<Statement>,
    removed: Vec<Statement>,
    finished: bool,
}

impl GraphTransaction<'_> {
    fn intern(&self, value: Value) -> EntityId {
        let (id, created) = self.graph.intern(value.clone());
        if created {
            self.listener.entity_added(id, &value);
        }
        id
    }

    pub fn add(&mut self, subject: Value, predicate: Value, object: Value) -> Statement {
        let statement = Statement::new(
            self.intern(subject),
            self.intern(predicate),
            self.intern(object),
        );
        if self.graph.insert(statement) {
            self.added.push(statement);
            self.listener.statement_added(statement);
        }
        statement
    }

    /// Remove a statement if present. Returns whether anything was removed.
    pub fn remove(&mut self, subject: &Value, predicate: &Value, object: &Value) -> bool {
        let (Some(s), Some(p), Some(o)) = (
            self.graph.id_of(subject),
            self.graph.id_of(predicate),
            self.graph.id_of(object),
        ) else {
            return false;
        };
        let statement = Statement::new(s, p, o);
        if !self.graph.delete(statement) {
            return false;
        }
        self.removed.push(statement);
        self.listener.statement_removed(statement);
        true
    }

    pub fn commit(mut self) {
        self.finished = true;
        self.listener.transaction_commit();
        self.listener.transaction_completed();
    }

    pub fn abort(mut self) {
        self.rollback();
    }

    fn rollback(&mut self) {
        self.finished = true;
        for statement in self.added.drain(..).rev() {
            self.graph.delete(statement);
        }
        for statement in self.removed.drain(..) {
            self.graph.insert(statement);
        }
        self.listener.transaction_aborted();
        self.listener.transaction_completed();
    }
}

impl Drop for GraphTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.rollback();
        }
    }
}

/// Fixed ranks, e.g. precomputed by an offline job.
#[derive(Debug, Clone, Default)]
pub struct StaticRanks {
    ranks: HashMap<EntityId, f64>,
}

impl StaticRanks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: EntityId, rank: f64) {
        self.ranks.insert(id, rank.clamp(0.0, 1.0));
    }
}

impl FromIterator<(EntityId, f64)> for StaticRanks {
    fn from_iter<T: IntoIterator<Item = (EntityId, f64)>>(iter: T) -> Self {
        let mut ranks = Self::new();
        for (id, rank) in iter {
            ranks.set(id, rank);
        }
        ranks
    }
}

impl RankProvider for StaticRanks {
    fn normalized_rank(&self, id: EntityId) -> f64 {
        self.ranks.get(&id).copied().unwrap_or(0.0)
    }
}
