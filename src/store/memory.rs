use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use super::{empty_document, merge_goals, JourneyStore};
use crate::model::Journey;

/// In-process journey store with scriptable write failures.
#[derive(Debug, Default)]
pub struct MemoryJourneyStore {
    document: Mutex<Value>,
    scripted_failures: Mutex<VecDeque<String>>,
    reject_all: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryJourneyStore {
    pub fn new(document: Value) -> Self {
        Self {
            document: Mutex::new(document),
            ..Self::default()
        }
    }

    pub fn empty() -> Self {
        Self::new(empty_document())
    }

    /// Reject the next write with `reason`. Queued reasons are used in order.
    pub fn fail_next_write(&self, reason: impl Into<String>) {
        lock(&self.scripted_failures).push_back(reason.into());
    }

    /// Reject every write until switched off again.
    pub fn set_reject_all(&self, reject: bool) {
        self.reject_all.store(reject, Ordering::SeqCst);
    }

    /// Number of accepted writes.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Current stored document.
    pub fn document(&self) -> Value {
        lock(&self.document).clone()
    }

    pub fn replace_document(&self, document: Value) {
        *lock(&self.document) = document;
    }
}

#[async_trait]
impl JourneyStore for MemoryJourneyStore {
    async fn get_journey(&self) -> anyhow::Result<Value> {
        Ok(self.document())
    }

    async fn update_journey(&self, journey: &Journey) -> anyhow::Result<()> {
        if let Some(reason) = lock(&self.scripted_failures).pop_front() {
            anyhow::bail!(reason);
        }
        if self.reject_all.load(Ordering::SeqCst) {
            anyhow::bail!("journey store is rejecting writes");
        }
        merge_goals(&mut lock(&self.document), journey)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
