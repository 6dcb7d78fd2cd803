//! Optional mutual exclusion around store access.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// A process-wide async lock, or a no-op stand-in.
///
/// The no-op variant suits deployments with a single consumer where
/// serialization buys nothing. Clones share the same underlying mutex.
#[derive(Debug, Clone)]
pub struct AsyncLock {
    inner: Option<Arc<Mutex<()>>>,
}

/// Held while the lock is taken; dropping it releases the lock.
#[derive(Debug)]
pub struct AsyncLockGuard {
    _guard: Option<OwnedMutexGuard<()>>,
}

impl AsyncLock {
    /// A real lock backed by a tokio mutex.
    pub fn mutex() -> Self {
        Self {
            inner: Some(Arc::new(Mutex::new(()))),
        }
    }

    /// A lock that never blocks.
    pub fn noop() -> Self {
        Self { inner: None }
    }

    /// `mutex()` when `thread_safety` is set, otherwise `noop()`.
    pub fn new(thread_safety: bool) -> Self {
        if thread_safety {
            Self::mutex()
        } else {
            Self::noop()
        }
    }

    pub async fn lock(&self) -> AsyncLockGuard {
        let guard = match &self.inner {
            Some(mutex) => Some(Arc::clone(mutex).lock_owned().await),
            None => None,
        };
        AsyncLockGuard { _guard: guard }
    }
}

impl Default for AsyncLock {
    fn default() -> Self {
        Self::noop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn mutex_excludes_second_holder() {
        let lock = AsyncLock::mutex();
        let guard = lock.lock().await;

        let other = lock.clone();
        let attempt = tokio::time::timeout(Duration::from_millis(20), other.lock()).await;
        assert!(attempt.is_err());

        drop(guard);
        let attempt = tokio::time::timeout(Duration::from_millis(20), other.lock()).await;
        assert!(attempt.is_ok());
    }

    #[tokio::test]
    async fn noop_never_blocks() {
        let lock = AsyncLock::noop();
        let _first = lock.lock().await;
        let second = tokio::time::timeout(Duration::from_millis(20), lock.lock()).await;
        assert!(second.is_ok());
    }
}
