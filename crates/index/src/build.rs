//! Background build task plumbing: cancellation flag, task state and the caller's handle.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

static NEXT_BUILD_ID: AtomicU64 = AtomicU64::new(1);

const PHASE_RUNNING: u8 = 0;
const PHASE_CANCELLED: u8 = 1;
const PHASE_COMMITTING: u8 = 2;

/// Cooperative cancellation shared between a build and its item sources.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// How a build ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BuildOutcome {
    Committed { items: usize, duration_ms: u64 },
    RolledBack { items: usize },
    Failed { error: String },
}

impl BuildOutcome {
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

#[derive(Debug)]
pub(crate) struct BuildTask {
    id: u64,
    /// Running, cancelled or committing. Cancelled and committing are final.
    phase: AtomicU8,
    cancel: CancelFlag,
    finished: AtomicBool,
    outcome: watch::Sender<Option<BuildOutcome>>,
    published: Mutex<bool>,
    published_cv: Condvar,
}

impl BuildTask {
    pub(crate) fn new() -> Arc<Self> {
        let (outcome, _) = watch::channel(None);
        Arc::new(Self {
            id: NEXT_BUILD_ID.fetch_add(1, Ordering::Relaxed),
            phase: AtomicU8::new(PHASE_RUNNING),
            cancel: CancelFlag::new(),
            finished: AtomicBool::new(false),
            outcome,
            published: Mutex::new(false),
            published_cv: Condvar::new(),
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Returns `false` once the build has started committing or was already cancelled.
    pub(crate) fn cancel(&self) -> bool {
        let accepted = self
            .phase
            .compare_exchange(
                PHASE_RUNNING,
                PHASE_CANCELLED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if accepted {
            self.cancel.cancel();
        }
        accepted
    }

    /// Enter the commit phase; later cancel requests are refused. `false` if cancelled first.
    pub(crate) fn begin_commit(&self) -> bool {
        self.phase
            .compare_exchange(
                PHASE_RUNNING,
                PHASE_COMMITTING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.phase.load(Ordering::Acquire) == PHASE_CANCELLED
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub(crate) fn mark_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }

    pub(crate) fn publish(&self, outcome: BuildOutcome) {
        self.outcome.send_replace(Some(outcome));
        *self.published.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.published_cv.notify_all();
    }
}

/// Caller's view of a submitted build.
#[derive(Debug, Clone)]
pub struct BuildHandle {
    task: Arc<BuildTask>,
}

impl BuildHandle {
    pub(crate) fn new(task: Arc<BuildTask>) -> Self {
        Self { task }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.task.id
    }

    /// Outcome if the build has ended.
    #[must_use]
    pub fn poll(&self) -> Option<BuildOutcome> {
        self.task.outcome.borrow().clone()
    }

    /// Ask the build to stop. Returns immediately; `false` when the build is already
    /// committing or was cancelled before.
    pub fn cancel(&self) -> bool {
        self.task.cancel()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.task.is_cancelled()
    }

    /// Wait for the build to end.
    pub async fn join(&self) -> BuildOutcome {
        let mut rx = self.task.outcome.subscribe();
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone().unwrap_or_else(executor_gone),
            Err(_) => executor_gone(),
        };
        outcome
    }

    /// Blocking variant of [`BuildHandle::join`] for callers outside a runtime.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> Option<BuildOutcome> {
        let published = self
            .task
            .published
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (published, _) = self
            .task
            .published_cv
            .wait_timeout_while(published, timeout, |published| !*published)
            .unwrap_or_else(PoisonError::into_inner);
        drop(published);
        self.poll()
    }
}

fn executor_gone() -> BuildOutcome {
    BuildOutcome::Failed {
        error: "build executor stopped".to_string(),
    }
}
