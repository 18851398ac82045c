use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Why a [Context] is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The context was cancelled through a [CancelHandle].
    #[error("context canceled")]
    Cancelled,
    /// The deadline of the context has passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    parent: Option<Arc<Inner>>,
}

impl Inner {
    fn err(&self) -> Option<ContextError> {
        if self.cancelled.load(Ordering::Acquire) {
            return Some(ContextError::Cancelled);
        }

        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Some(ContextError::DeadlineExceeded);
            }
        }

        self.parent.as_ref()?.err()
    }
}

/// The execution context passed to command handlers.
///
/// The tree itself never looks at the context. It's up to handlers to check
/// [Context::err] and stop what they are doing.
///
/// # Examples
///
/// ```rust
/// use cmdwerk::{Context, ContextError};
///
/// let (ctx, cancel) = Context::background().with_cancel();
/// let child = ctx.with_cancel().0;
///
/// assert!(!child.is_done());
/// cancel.cancel();
/// assert_eq!(child.err(), Some(ContextError::Cancelled));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    /// A context which is never done.
    pub fn background() -> Self {
        Self::default()
    }

    fn child(&self, deadline: Option<Instant>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline,
                parent: Some(self.inner.clone()),
            }),
        }
    }

    /// Derive a context which is done once `handle` is cancelled, or once
    /// this context is done.
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let ctx = self.child(None);
        let handle = CancelHandle {
            inner: ctx.inner.clone(),
        };
        (ctx, handle)
    }

    /// Derive a context which is done at `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> (Self, CancelHandle) {
        let ctx = self.child(Some(deadline));
        let handle = CancelHandle {
            inner: ctx.inner.clone(),
        };
        (ctx, handle)
    }

    /// Derive a context which is done after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> (Self, CancelHandle) {
        self.with_deadline(Instant::now() + timeout)
    }

    /// The earliest deadline of this context and its parents.
    pub fn deadline(&self) -> Option<Instant> {
        let mut current = Some(&self.inner);
        let mut deadline = None::<Instant>;

        while let Some(inner) = current {
            deadline = match (deadline, inner.deadline) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };

            current = inner.parent.as_ref();
        }

        deadline
    }

    /// Why the context is done, if it is.
    pub fn err(&self) -> Option<ContextError> {
        self.inner.err()
    }

    /// Test if the context is done.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }
}

/// Cancels the [Context] it was created with.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    inner: Arc<Inner>,
}

impl CancelHandle {
    /// Cancel the context, and every context derived from it.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }
}
