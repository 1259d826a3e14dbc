//! Rule traits.

use std::any::Any;
use std::sync::Arc;

use anyhow::anyhow;

use crate::arg::RuleArgs;
use crate::reader::{Reader, Traced};
use crate::runtime::Incremental;
use crate::target::Target;
use crate::BuildError;

/// A pure function from a [`Reader`] and an argument tuple to a value.
///
/// Rules are the unit of memoization. A rule is identified by its implementing
/// type, so two rules with the same signature and the same [`NAME`](Rule::NAME)
/// are still distinct nodes of the graph.
///
/// # Purity
///
/// `eval` must compute its value only from `args` and from what it reads
/// through `reader`. Every read is recorded as a dependency, and the rule is
/// re-run only when one of those reads may have changed.
///
/// # Example
///
/// ```
/// use target_flow::{BuildError, Input, Reader, Rule};
///
/// struct FileText;
///
/// impl Input for FileText {
///     const NAME: &'static str = "FILE_TEXT";
///     type Args = (String,);
///     type Value = String;
/// }
///
/// struct FileLen;
///
/// impl Rule for FileLen {
///     const NAME: &'static str = "FILE_LEN";
///     type Args = (String,);
///     type Value = usize;
///
///     fn eval(reader: &impl Reader, (path,): Self::Args) -> Result<usize, BuildError> {
///         Ok(reader.get_or_eval::<FileText>((path,))?.len())
///     }
/// }
/// ```
pub trait Rule: 'static {
    /// Display name, used in diagnostics only.
    const NAME: &'static str;

    /// True for input rules, whose values can only be written.
    const INPUT: bool = false;

    /// The argument tuple.
    type Args: RuleArgs;

    /// The computed value.
    type Value: PartialEq + Send + Sync + 'static;

    /// Run the rule body.
    fn eval(reader: &impl Reader, args: Self::Args) -> Result<Self::Value, BuildError>;

    /// Compare an old and a new value for early cutoff.
    ///
    /// When a re-run produces a value equal to the previous one, nothing that
    /// depends on this rule is told it changed.
    ///
    /// Defaults to `==`, under which a value holding `f64::NAN` never equals
    /// itself. Override it (comparing `to_bits()`, say) for float payloads.
    fn value_eq(old: &Self::Value, new: &Self::Value) -> bool {
        old == new
    }
}

/// A rule with no body, whose values are supplied by
/// [`Incremental::set_input`].
///
/// Reading an input target that was never written fails with
/// [`BuildError::UnsetInput`].
pub trait Input: 'static {
    /// Display name, used in diagnostics only.
    const NAME: &'static str;

    /// The argument tuple.
    type Args: RuleArgs;

    /// The stored value.
    type Value: PartialEq + Send + Sync + 'static;

    /// Compare the stored value with a newly written one.
    ///
    /// An equal write is a no-op. Same default and caveats as
    /// [`Rule::value_eq`].
    fn value_eq(old: &Self::Value, new: &Self::Value) -> bool {
        old == new
    }
}

impl<I: Input> Rule for I {
    const NAME: &'static str = <I as Input>::NAME;
    const INPUT: bool = true;

    type Args = <I as Input>::Args;
    type Value = <I as Input>::Value;

    fn eval(
        _reader: &impl Reader,
        args: <I as Input>::Args,
    ) -> Result<<I as Input>::Value, BuildError> {
        Err(BuildError::unset_input::<I>(&args))
    }

    fn value_eq(old: &<I as Input>::Value, new: &<I as Input>::Value) -> bool {
        <I as Input>::value_eq(old, new)
    }
}

pub(crate) type ErasedValue = Arc<dyn Any + Send + Sync>;

/// Outcome of one execution of a rule body.
pub(crate) struct Evaluation {
    pub(crate) value: ErasedValue,
    /// Every target read during the execution, in read order.
    pub(crate) trace: Vec<Target>,
}

pub(crate) fn eval_erased<R: Rule>(
    engine: &Incremental,
    target: &Target,
) -> Result<Evaluation, BuildError> {
    let args = R::Args::from_args(target.args())
        .ok_or_else(|| anyhow!("malformed arguments for {}", target))?;
    let traced = Traced::new(engine);
    let value = R::eval(&traced, args)?;
    Ok(Evaluation {
        value: Arc::new(value),
        trace: traced.into_trace(),
    })
}

pub(crate) fn value_eq_erased<R: Rule>(old: &ErasedValue, new: &ErasedValue) -> bool {
    match (old.downcast_ref::<R::Value>(), new.downcast_ref::<R::Value>()) {
        (Some(old), Some(new)) => R::value_eq(old, new),
        _ => false,
    }
}
