//! Observers of engine activity.
//!
//! The engine reports every input write and every rule evaluation to an
//! [`EventHandler`]. Handlers are for diagnostics and testing only; nothing
//! they do can influence the result of a read.
//!
//! - [`NullHandler`] discards everything (the default).
//! - [`EvalCollector`] buffers events for assertions in tests.
//! - [`TracingHandler`] forwards events to the `tracing` crate.

use parking_lot::Mutex;

use crate::target::Target;

/// Observer notified synchronously by [`Incremental`](crate::Incremental).
///
/// All methods have default empty implementations, so you only need to
/// override the events you're interested in.
pub trait EventHandler: Send + Sync + 'static {
    /// Called after a write that changed an input value.
    #[inline]
    fn on_set_input(&self, _target: &Target) {}

    /// Called after every execution of a rule body, whether or not its
    /// value changed.
    #[inline]
    fn on_eval(&self, _target: &Target) {}

    /// Called when a stale entry is proven up to date without running its
    /// rule body.
    #[inline]
    fn on_verify(&self, _target: &Target) {}

    /// Called when a dependency cycle is detected.
    #[inline]
    fn on_cycle(&self, _path: &[Target]) {}
}

/// Handler that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHandler;

impl EventHandler for NullHandler {}

/// Handler that buffers evaluated targets for later inspection.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use target_flow::{EvalCollector, Incremental};
///
/// let collector = Arc::new(EvalCollector::new());
/// let engine = Incremental::with_handler(collector.clone());
/// // ... read targets ...
/// assert!(collector.take_targets().is_empty());
/// # drop(engine);
/// ```
#[derive(Debug, Default)]
pub struct EvalCollector {
    evaluated: Mutex<Vec<Target>>,
    inputs: Mutex<Vec<Target>>,
}

impl EvalCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the evaluated targets, in evaluation order, clearing the buffer.
    pub fn take_targets(&self) -> Vec<Target> {
        std::mem::take(&mut *self.evaluated.lock())
    }

    /// Like [`take_targets`](Self::take_targets), rendered as strings.
    pub fn take_targets_to_string(&self) -> Vec<String> {
        self.take_targets().iter().map(Target::to_string).collect()
    }

    /// Take the inputs whose value changed, in write order, clearing the buffer.
    pub fn take_inputs(&self) -> Vec<Target> {
        std::mem::take(&mut *self.inputs.lock())
    }
}

impl EventHandler for EvalCollector {
    fn on_set_input(&self, target: &Target) {
        self.inputs.lock().push(target.clone());
    }

    fn on_eval(&self, target: &Target) {
        self.evaluated.lock().push(target.clone());
    }
}

/// Handler that forwards events to the `tracing` crate.
///
/// Writes and evaluations are logged at `DEBUG`, verifications at `TRACE`,
/// and cycles at `WARN`.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHandler;

#[cfg(feature = "tracing")]
impl EventHandler for TracingHandler {
    fn on_set_input(&self, target: &Target) {
        tracing::debug!(node = %target, "input set");
    }

    fn on_eval(&self, target: &Target) {
        tracing::debug!(node = %target, "rule evaluated");
    }

    fn on_verify(&self, target: &Target) {
        tracing::trace!(node = %target, "entry verified");
    }

    fn on_cycle(&self, path: &[Target]) {
        let path: Vec<String> = path.iter().map(Target::to_string).collect();
        tracing::warn!(path = ?path, "dependency cycle detected");
    }
}
