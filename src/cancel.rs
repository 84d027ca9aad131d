//! Idempotent cancellation of streaming calls.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

type CancelOp = Box<dyn FnOnce() + Send>;

/// A handle that cancels an underlying streaming call at most once.
///
/// Callers routinely cancel more than once (component teardown plus an
/// explicit user action, for instance), and the underlying call may not
/// tolerate a double cancel. The handle absorbs the extras: the wrapped
/// operation runs on the first [`cancel`](CancelHandle::cancel) and every
/// later invocation is a no-op.
///
/// Clones share the fired state, so cancelling through any clone disarms
/// all of them.
#[derive(Clone)]
pub struct CancelHandle {
    op: Arc<Mutex<Option<CancelOp>>>,
}

impl CancelHandle {
    /// Wrap a cancel operation.
    pub fn new(op: impl FnOnce() + Send + 'static) -> Self {
        Self {
            op: Arc::new(Mutex::new(Some(Box::new(op)))),
        }
    }

    /// A handle that does nothing. Useful as a placeholder for calls that
    /// have nothing to tear down.
    pub fn noop() -> Self {
        Self {
            op: Arc::new(Mutex::new(None)),
        }
    }

    /// Run the wrapped cancel operation if it has not run yet.
    pub fn cancel(&self) {
        let op = self
            .op
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(op) = op {
            op();
        }
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fired = self
            .op
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none();
        f.debug_struct("CancelHandle").field("fired", &fired).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::CancelHandle;

    #[test]
    fn cancel_runs_the_operation_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let handle = CancelHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        handle.cancel();
        handle.cancel();
        handle.cancel();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clones_share_the_fired_state() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let handle = CancelHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let clone = handle.clone();

        clone.cancel();
        handle.cancel();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn noop_handle_is_inert() {
        let handle = CancelHandle::noop();
        handle.cancel();
        handle.cancel();
    }
}
