//! The incremental engine.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;

use crate::handler::{EventHandler, NullHandler};
use crate::reader::Reader;
use crate::rule::{ErasedValue, Evaluation, Rule};
use crate::target::{Target, TargetMap};
use crate::BuildError;

/// Global logical clock.
///
/// Advanced by exactly one each time an input write changes a value. Rule
/// re-evaluation never advances it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Revision(pub u64);

impl Revision {
    /// The revision of a fresh engine.
    pub const ZERO: Revision = Revision(0);

    /// The following revision.
    pub fn next(self) -> Self {
        Revision(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Memoized state of one target.
struct CacheEntry {
    value: ErasedValue,
    /// Last revision at which `value` actually changed.
    changed_at: Revision,
    /// Last revision at which `value` was confirmed up to date.
    /// Always `>= changed_at`.
    verified_at: Revision,
    /// Targets read by the last execution of the rule body, in read order.
    /// Empty for inputs.
    dependencies: Arc<[Target]>,
}

impl CacheEntry {
    fn new(value: ErasedValue, rev: Revision, dependencies: Vec<Target>) -> Self {
        Self {
            value,
            changed_at: rev,
            verified_at: rev,
            dependencies: dependencies.into(),
        }
    }

    fn resolved(&self) -> Resolved {
        Resolved {
            value: self.value.clone(),
            changed_at: self.changed_at,
        }
    }
}

/// An up-to-date value and the revision it last changed at.
struct Resolved {
    value: ErasedValue,
    changed_at: Revision,
}

/// What is known about an entry that was not verified this revision.
struct Stale {
    verified_at: Revision,
    dependencies: Arc<[Target]>,
}

/// Read-only snapshot of a cache entry, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Last revision at which the value changed.
    pub changed_at: Revision,
    /// Last revision at which the value was confirmed up to date.
    pub verified_at: Revision,
    /// Targets read by the last execution of the rule body, in read order.
    pub dependencies: Vec<Target>,
}

/// The incremental engine.
///
/// Owns the revision counter and the cache of every target it has seen.
/// Inputs are written with [`set_input`](Self::set_input); any target is read
/// with [`get_or_eval`](Self::get_or_eval), which re-runs only the rules whose
/// transitive inputs have actually changed.
///
/// Evaluation is single-threaded and recursive: a read may re-enter the
/// engine through the dependency graph before returning. Writes take
/// `&mut self`, so no write can happen while a read is in flight.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use target_flow::{BuildError, EvalCollector, Incremental, Input, Reader, Rule};
///
/// struct Width;
/// impl Input for Width {
///     const NAME: &'static str = "WIDTH";
///     type Args = ();
///     type Value = i64;
/// }
///
/// struct Area;
/// impl Rule for Area {
///     const NAME: &'static str = "AREA";
///     type Args = (i64,);
///     type Value = i64;
///
///     fn eval(reader: &impl Reader, (height,): Self::Args) -> Result<i64, BuildError> {
///         Ok(*reader.get_or_eval::<Width>(())? * height)
///     }
/// }
///
/// let collector = Arc::new(EvalCollector::new());
/// let mut engine = Incremental::with_handler(collector.clone());
///
/// engine.set_input::<Width>((), 3);
/// assert_eq!(*engine.get_or_eval::<Area>((2,)).unwrap(), 6);
/// assert_eq!(collector.take_targets_to_string(), vec!["AREA(2)"]);
///
/// // Same value: no new revision, nothing recomputed.
/// assert!(!engine.set_input::<Width>((), 3));
/// assert_eq!(*engine.get_or_eval::<Area>((2,)).unwrap(), 6);
/// assert!(collector.take_targets().is_empty());
/// ```
pub struct Incremental {
    current_rev: Revision,
    cache: RefCell<TargetMap<CacheEntry>>,
    /// Targets being validated or evaluated, outermost first.
    in_progress: RefCell<Vec<Target>>,
    handler: Arc<dyn EventHandler>,
}

impl Default for Incremental {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Incremental {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Incremental")
            .field("current_rev", &self.current_rev)
            .field("entries", &self.cache.borrow().len())
            .finish_non_exhaustive()
    }
}

impl Incremental {
    /// Create an engine that reports to no one.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for customizing the engine.
    pub fn builder() -> IncrementalBuilder {
        IncrementalBuilder::new()
    }

    /// Create an engine that reports to `handler`.
    pub fn with_handler(handler: Arc<dyn EventHandler>) -> Self {
        Self::builder().event_handler(handler).build()
    }

    /// The current revision.
    pub fn revision(&self) -> Revision {
        self.current_rev
    }

    /// Write the value of the input target `R(args)`.
    ///
    /// If the target already holds a value equal to `value` (per
    /// [`Rule::value_eq`]) this is a no-op and returns `false`. Otherwise the
    /// revision advances, the value is stored as a leaf with no dependencies,
    /// and `true` is returned.
    pub fn set_input<R: Rule>(&mut self, args: R::Args, value: R::Value) -> bool {
        let target = Target::new::<R>(&args);
        let value: ErasedValue = Arc::new(value);
        let cache = self.cache.get_mut();

        if let Some(entry) = cache.get(&target) {
            if target.rule().value_eq(&entry.value, &value) {
                return false;
            }
        }

        self.current_rev = self.current_rev.next();
        cache.set(&target, CacheEntry::new(value, self.current_rev, Vec::new()));
        self.handler.on_set_input(&target);
        true
    }

    /// Read the value of `R(args)`, computing or re-validating it as needed.
    ///
    /// # Errors
    ///
    /// - `BuildError::UnsetInput` - an input reached from here was never set
    /// - `BuildError::Cycle` - a target reached from here depends on itself
    /// - `BuildError::Rule` - a rule body failed
    pub fn get_or_eval<R: Rule>(&self, args: R::Args) -> Result<Arc<R::Value>, BuildError> {
        let target = Target::new::<R>(&args);
        let resolved = self.update_entry(&target)?;
        resolved
            .value
            .downcast::<R::Value>()
            .map_err(|_| anyhow!("cached value of {} has an unexpected type", target).into())
    }

    /// Bring the entry of `target` up to date with the current revision.
    fn update_entry(&self, target: &Target) -> Result<Resolved, BuildError> {
        let stale = match self.cache.borrow().get(target) {
            Some(entry) if entry.verified_at == self.current_rev => return Ok(entry.resolved()),
            Some(entry) => Some(Stale {
                verified_at: entry.verified_at,
                dependencies: entry.dependencies.clone(),
            }),
            None => None,
        };

        self.enter(target)?;
        let result = self.refresh(target, stale);
        self.in_progress.borrow_mut().pop();
        result
    }

    fn refresh(&self, target: &Target, stale: Option<Stale>) -> Result<Resolved, BuildError> {
        if let Some(stale) = stale {
            if self.dependencies_unchanged(&stale) {
                if let Some(resolved) = self.mark_verified(target) {
                    self.handler.on_verify(target);
                    return Ok(resolved);
                }
            }
        }

        let evaluation = target.eval(self)?;
        self.handler.on_eval(target);
        Ok(self.commit(target, evaluation))
    }

    /// Update every dependency in recorded order and report whether none of
    /// them changed since `stale.verified_at`.
    ///
    /// Does not stop at the first changed dependency: the whole reachable
    /// stale subgraph is brought current either way.
    ///
    /// A dependency that fails to update counts as changed. Its error is not
    /// the target's own: the re-run decides whether it is still read, and
    /// raises it again if so.
    fn dependencies_unchanged(&self, stale: &Stale) -> bool {
        let mut unchanged = true;
        for dependency in stale.dependencies.iter() {
            match self.update_entry(dependency) {
                Ok(resolved) => unchanged &= resolved.changed_at <= stale.verified_at,
                Err(_) => unchanged = false,
            }
        }
        unchanged
    }

    fn mark_verified(&self, target: &Target) -> Option<Resolved> {
        let mut cache = self.cache.borrow_mut();
        let entry = cache.get_mut(target)?;
        entry.verified_at = self.current_rev;
        Some(entry.resolved())
    }

    /// Store the outcome of a successful execution of the rule body.
    fn commit(&self, target: &Target, evaluation: Evaluation) -> Resolved {
        let rev = self.current_rev;
        let mut cache = self.cache.borrow_mut();
        match cache.get_mut(target) {
            Some(entry) => {
                // An equal value keeps its old revision so dependents stay valid.
                if !target.rule().value_eq(&entry.value, &evaluation.value) {
                    entry.value = evaluation.value;
                    entry.changed_at = rev;
                }
                entry.verified_at = rev;
                entry.dependencies = evaluation.trace.into();
                entry.resolved()
            }
            None => {
                let entry = CacheEntry::new(evaluation.value, rev, evaluation.trace);
                let resolved = entry.resolved();
                cache.set(target, entry);
                resolved
            }
        }
    }

    fn enter(&self, target: &Target) -> Result<(), BuildError> {
        let mut stack = self.in_progress.borrow_mut();
        if let Some(start) = stack.iter().position(|t| t == target) {
            let mut path = stack[start..].to_vec();
            path.push(target.clone());
            drop(stack);
            self.handler.on_cycle(&path);
            return Err(BuildError::Cycle { path });
        }
        stack.push(target.clone());
        Ok(())
    }

    /// Snapshot of the entry of `target`, if it was ever read or written.
    pub fn entry_info(&self, target: &Target) -> Option<EntryInfo> {
        self.cache.borrow().get(target).map(|entry| EntryInfo {
            changed_at: entry.changed_at,
            verified_at: entry.verified_at,
            dependencies: entry.dependencies.to_vec(),
        })
    }

    /// The revision at which the value of `R(args)` last changed.
    ///
    /// Returns `None` if the target was never read or written. Does not
    /// validate the entry.
    pub fn changed_at<R: Rule>(&self, args: R::Args) -> Option<Revision> {
        self.entry_info(&Target::new::<R>(&args))
            .map(|info| info.changed_at)
    }

    /// The dependencies recorded by the last execution of `R(args)`.
    ///
    /// Returns `None` if the target was never read or written. Does not
    /// validate the entry.
    pub fn dependencies<R: Rule>(&self, args: R::Args) -> Option<Vec<Target>> {
        self.entry_info(&Target::new::<R>(&args))
            .map(|info| info.dependencies)
    }

    /// Number of cached targets.
    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.cache.borrow().is_empty()
    }

    /// All cached targets, in no particular order.
    pub fn targets(&self) -> Vec<Target> {
        self.cache.borrow().targets()
    }

    /// Remove the entry of `R(args)` from the cache, freeing its value.
    ///
    /// Removing a derived target is always safe: it is recomputed on next
    /// access, and anything that depended on it is recomputed too. Removing
    /// an input makes it unset again.
    pub fn remove<R: Rule>(&mut self, args: R::Args) -> bool {
        self.remove_target(&Target::new::<R>(&args))
    }

    /// Remove the entry of `target` from the cache.
    pub fn remove_target(&mut self, target: &Target) -> bool {
        self.cache.get_mut().remove(target).is_some()
    }

    /// Remove every entry. The revision keeps counting from where it was.
    pub fn clear(&mut self) {
        self.cache.get_mut().clear();
    }
}

impl Reader for Incremental {
    fn get_or_eval<R: Rule>(&self, args: R::Args) -> Result<Arc<R::Value>, BuildError> {
        Incremental::get_or_eval::<R>(self, args)
    }
}

/// Builder for [`Incremental`] with customizable settings.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use target_flow::{EvalCollector, Incremental};
///
/// let collector = Arc::new(EvalCollector::new());
/// let engine = Incremental::builder()
///     .event_handler(collector.clone())
///     .build();
/// assert!(engine.is_empty());
/// ```
#[derive(Default)]
pub struct IncrementalBuilder {
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl IncrementalBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the handler notified of input writes and rule evaluations.
    ///
    /// Without one, events are discarded.
    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Build the engine with the configured settings.
    pub fn build(self) -> Incremental {
        Incremental {
            current_rev: Revision::ZERO,
            cache: RefCell::new(TargetMap::new()),
            in_progress: RefCell::new(Vec::new()),
            handler: self
                .event_handler
                .unwrap_or_else(|| Arc::new(NullHandler)),
        }
    }
}
