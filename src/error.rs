//! Error types for rule evaluation.

use thiserror::Error;

use crate::rule::Rule;
use crate::target::Target;

/// An input target was read before it was ever written.
///
/// Recoverable by the caller: write the input and read again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("input for {target} should be set")]
pub struct UnsetInput {
    target: Target,
}

impl UnsetInput {
    /// The input target that was read.
    pub fn target(&self) -> &Target {
        &self.target
    }
}

/// Errors surfaced by [`Incremental::get_or_eval`](crate::Incremental::get_or_eval).
///
/// All errors propagate synchronously and unmodified to the direct caller.
/// Nothing is retried, and a failed evaluation leaves no cache entry behind.
///
/// Rule bodies report their own failures through the `Rule` variant, which
/// any [`anyhow::Error`] converts into with `?`:
///
/// ```
/// use anyhow::Context;
/// use target_flow::BuildError;
///
/// fn parse(line: &str) -> Result<i64, BuildError> {
///     Ok(line.parse::<i64>().with_context(|| format!("bad number {:?}", line))?)
/// }
///
/// assert!(parse("12").is_ok());
/// assert!(matches!(parse("x"), Err(BuildError::Rule(_))));
/// ```
#[derive(Debug, Error)]
pub enum BuildError {
    /// An input rule was read before being set.
    #[error(transparent)]
    UnsetInput(#[from] UnsetInput),

    /// A target depends on itself.
    ///
    /// `path` runs from the first occurrence of the repeated target to its
    /// re-entry, both included.
    #[error("dependency cycle detected: {}", display_path(.path))]
    Cycle {
        /// The targets forming the cycle.
        path: Vec<Target>,
    },

    /// Error raised by a rule body.
    #[error(transparent)]
    Rule(#[from] anyhow::Error),
}

fn display_path(path: &[Target]) -> String {
    path.iter()
        .map(Target::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl BuildError {
    /// Build the error for reading input `R` with `args` while it is unset.
    pub fn unset_input<R: Rule>(args: &R::Args) -> Self {
        BuildError::UnsetInput(UnsetInput {
            target: Target::new::<R>(args),
        })
    }

    /// Returns the unset input if this is an `UnsetInput` error.
    pub fn as_unset_input(&self) -> Option<&UnsetInput> {
        match self {
            BuildError::UnsetInput(e) => Some(e),
            _ => None,
        }
    }

    /// Returns true if this is a `Cycle` error.
    pub fn is_cycle(&self) -> bool {
        matches!(self, BuildError::Cycle { .. })
    }

    /// Attempts to downcast a rule error to a specific type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        match self {
            BuildError::Rule(e) => e.downcast_ref::<E>(),
            _ => None,
        }
    }
}
