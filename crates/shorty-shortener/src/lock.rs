use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A table of async mutexes keyed by string.
///
/// Holding the guard for a key serializes every other task asking for the
/// same key; different keys never contend. Entries are created on demand
/// and dropped again once no task holds or waits for them.
#[derive(Debug, Default)]
pub struct KeyedLock {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Exclusive access to one key of a [`KeyedLock`], released on drop.
#[derive(Debug)]
pub struct KeyGuard<'a> {
    table: &'a KeyedLock,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

type AcquireFuture = Pin<Box<dyn Future<Output = OwnedMutexGuard<()>> + Send>>;

/// A pending acquisition of one key.
///
/// Dropping it before it completes gives up the wait and removes the
/// entry if nobody else holds or waits for it.
struct Acquire<'a> {
    table: &'a KeyedLock,
    key: &'a str,
    pending: Option<AcquireFuture>,
}

impl Future for Acquire<'_> {
    type Output = OwnedMutexGuard<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(pending) = this.pending.as_mut() else {
            unreachable!("key acquisition polled after completion");
        };
        let guard = ready!(pending.as_mut().poll(cx));
        this.pending = None;
        Poll::Ready(guard)
    }
}

impl Drop for Acquire<'_> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            drop(pending);
            self.table.release(self.key);
        }
    }
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until `key` is free and takes it.
    pub async fn lock(&self, key: impl Into<String>) -> KeyGuard<'_> {
        let key = key.into();
        let mutex = {
            let entry = self.locks.entry(key.clone()).or_default();
            Arc::clone(&*entry)
        };
        let guard = Acquire {
            table: self,
            key: &key,
            pending: Some(Box::pin(mutex.lock_owned())),
        }
        .await;

        KeyGuard {
            table: self,
            key,
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or waited on.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    // Entries are cloned under the shard lock, so a count of one here
    // means nobody else holds or waits on this mutex.
    fn release(&self, key: &str) {
        self.locks
            .remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl KeyGuard<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        // Release the mutex first so its Arc no longer counts as a holder.
        drop(self.guard.take());
        self.table.release(&self.key);
    }
}
