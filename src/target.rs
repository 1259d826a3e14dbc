//! Targets: the identity of one rule invocation.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::arg::{ArgList, RuleArgs};
use crate::rule::{self, Evaluation, ErasedValue, Rule};
use crate::runtime::Incremental;
use crate::BuildError;

type EvalFn = fn(&Incremental, &Target) -> Result<Evaluation, BuildError>;
type ValueEqFn = fn(&ErasedValue, &ErasedValue) -> bool;

/// Identity of a rule.
///
/// Two rules are the same rule iff they are the same Rust type; the display
/// name is for diagnostics only. Also carries the type-erased entry points the
/// engine needs to re-run a rule it only knows by [`Target`].
#[derive(Clone, Copy)]
pub struct RuleId {
    type_id: TypeId,
    name: &'static str,
    input: bool,
    eval: EvalFn,
    value_eq: ValueEqFn,
}

impl RuleId {
    /// Get the identity of rule `R`.
    pub fn of<R: Rule>() -> Self {
        Self {
            type_id: TypeId::of::<R>(),
            name: R::NAME,
            input: R::INPUT,
            eval: rule::eval_erased::<R>,
            value_eq: rule::value_eq_erased::<R>,
        }
    }

    /// The display name of the rule.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true if the rule is an input rule.
    pub fn is_input(&self) -> bool {
        self.input
    }

    /// Returns true if this is the identity of rule `R`.
    pub fn is<R: Rule>(&self) -> bool {
        self.type_id == TypeId::of::<R>()
    }

    pub(crate) fn value_eq(&self, old: &ErasedValue, new: &ErasedValue) -> bool {
        (self.value_eq)(old, new)
    }
}

impl PartialEq for RuleId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for RuleId {}

impl Hash for RuleId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// One invocation of one rule with one argument tuple.
///
/// Equal iff same rule and element-wise equal arguments, however separately
/// constructed. Clone is cheap.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Target {
    rule: RuleId,
    args: ArgList,
}

impl Target {
    /// Create the target for `R` invoked with `args`.
    pub fn new<R: Rule>(args: &R::Args) -> Self {
        Self {
            rule: RuleId::of::<R>(),
            args: args.to_args(),
        }
    }

    /// The rule of this target.
    pub fn rule(&self) -> RuleId {
        self.rule
    }

    /// The display name of the rule.
    pub fn rule_name(&self) -> &'static str {
        self.rule.name
    }

    /// The canonical argument tuple.
    pub fn args(&self) -> &ArgList {
        &self.args
    }

    /// Returns true if this target invokes rule `R`.
    pub fn is<R: Rule>(&self) -> bool {
        self.rule.is::<R>()
    }

    /// Run the rule body against a fresh trace.
    pub(crate) fn eval(&self, engine: &Incremental) -> Result<Evaluation, BuildError> {
        (self.rule.eval)(engine, self)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.rule.name, self.args)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Target({})", self)
    }
}

/// Associative store from [`Target`] to `T`, keyed structurally.
///
/// Lookups go through two layers: one keyed by the rule identity and one
/// keyed by the argument tuple, so a target built ad hoc inside a rule body
/// finds the slot of an equal target built elsewhere.
pub struct TargetMap<T> {
    data: HashMap<RuleId, HashMap<ArgList, T, ahash::RandomState>, ahash::RandomState>,
}

impl<T> Default for TargetMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TargetMap<T> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            data: HashMap::default(),
        }
    }

    /// Get the value stored for `target`.
    pub fn get(&self, target: &Target) -> Option<&T> {
        self.data.get(&target.rule)?.get(&target.args)
    }

    /// Get a mutable reference to the value stored for `target`.
    pub fn get_mut(&mut self, target: &Target) -> Option<&mut T> {
        self.data.get_mut(&target.rule)?.get_mut(&target.args)
    }

    /// Store `value` for `target`, replacing any previous value.
    pub fn set(&mut self, target: &Target, value: T) -> &mut Self {
        self.data
            .entry(target.rule)
            .or_default()
            .insert(target.args.clone(), value);
        self
    }

    /// Remove the value stored for `target`.
    pub fn remove(&mut self, target: &Target) -> Option<T> {
        let inner = self.data.get_mut(&target.rule)?;
        let removed = inner.remove(&target.args);
        if inner.is_empty() {
            self.data.remove(&target.rule);
        }
        removed
    }

    /// Returns true if a value is stored for `target`.
    pub fn contains(&self, target: &Target) -> bool {
        self.get(target).is_some()
    }

    /// Number of stored targets.
    pub fn len(&self) -> usize {
        self.data.values().map(HashMap::len).sum()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Iterate over stored targets and values, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (Target, &T)> + '_ {
        self.data.iter().flat_map(|(rule, inner)| {
            inner.iter().map(move |(args, value)| {
                (
                    Target {
                        rule: *rule,
                        args: args.clone(),
                    },
                    value,
                )
            })
        })
    }

    /// All stored targets, in no particular order.
    pub fn targets(&self) -> Vec<Target> {
        self.iter().map(|(target, _)| target).collect()
    }
}

impl<T: fmt::Debug> fmt::Debug for TargetMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
