//! The read capability handed to rule bodies.

use std::cell::RefCell;
use std::sync::Arc;

use crate::rule::Rule;
use crate::target::Target;
use crate::BuildError;

/// Capability to read the value of other targets.
///
/// This trait is implemented by both [`Incremental`](crate::Incremental) and
/// [`Traced`], allowing rules to work with either.
///
/// - `Incremental::get_or_eval()`: No dependency tracking
/// - `Traced::get_or_eval()`: Records every read as a dependency
pub trait Reader {
    /// Read the value of `R` invoked with `args`, computing it if needed.
    fn get_or_eval<R: Rule>(&self, args: R::Args) -> Result<Arc<R::Value>, BuildError>;
}

/// A [`Reader`] that records every target read through it, in call order.
///
/// After one rule body has run against a fresh `Traced`, the trace is exactly
/// that run's dependency list. A target read twice appears twice.
pub struct Traced<'a, R: Reader> {
    inner: &'a R,
    trace: RefCell<Vec<Target>>,
}

impl<'a, R: Reader> Traced<'a, R> {
    /// Wrap `inner` with an empty trace.
    pub fn new(inner: &'a R) -> Self {
        Self {
            inner,
            trace: RefCell::new(Vec::new()),
        }
    }

    /// Snapshot of the targets read so far.
    pub fn trace(&self) -> Vec<Target> {
        self.trace.borrow().clone()
    }

    /// Consume the reader, returning the recorded targets.
    pub fn into_trace(self) -> Vec<Target> {
        self.trace.into_inner()
    }
}

impl<'a, R: Reader> Reader for Traced<'a, R> {
    fn get_or_eval<Q: Rule>(&self, args: Q::Args) -> Result<Arc<Q::Value>, BuildError> {
        // Recorded before the read so a failed read still shows up.
        self.trace.borrow_mut().push(Target::new::<Q>(&args));
        self.inner.get_or_eval::<Q>(args)
    }
}
