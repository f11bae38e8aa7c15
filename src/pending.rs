use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

/// Identifies one background task (a remote search or a sync).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Cooperative cancellation flag shared between a task and whoever may
/// cancel it. Cancelling never interrupts anything by itself: the engine is
/// expected to poll [`CancelToken::is_cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The set of in-flight background tasks, shared between the tasks (which
/// deregister themselves on completion) and their owner (which may cancel
/// them all at once).
#[derive(Debug, Clone, Default)]
pub struct PendingSet {
    tasks: Arc<Mutex<HashMap<TaskId, CancelToken>>>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task. It stays registered until the returned entry is
    /// dropped.
    pub(crate) fn register(&self, task: TaskId, token: CancelToken) -> PendingEntry {
        self.tasks.lock().insert(task, token);
        PendingEntry {
            set: self.clone(),
            task,
        }
    }

    /// Register a task only if no other task is pending.
    pub(crate) fn register_exclusive(&self, task: TaskId, token: CancelToken) -> Option<PendingEntry> {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return None;
        }
        tasks.insert(task, token);
        Some(PendingEntry {
            set: self.clone(),
            task,
        })
    }

    /// Cancel every pending task. Returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let tasks = self.tasks.lock();
        for token in tasks.values() {
            token.cancel();
        }
        tasks.len()
    }

    pub fn contains(&self, task: TaskId) -> bool {
        self.tasks.lock().contains_key(&task)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }
}

/// Registration of one task in a [`PendingSet`]; deregisters on drop.
#[derive(Debug)]
pub(crate) struct PendingEntry {
    set: PendingSet,
    task: TaskId,
}

impl PendingEntry {
    pub(crate) fn task(&self) -> TaskId {
        self.task
    }
}

impl Drop for PendingEntry {
    fn drop(&mut self) {
        self.set.tasks.lock().remove(&self.task);
    }
}
