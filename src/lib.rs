//! Target-Flow: a demand-driven incremental computation engine.
//!
//! Computations are expressed as ordinary functions ("rules") that read other
//! rules on demand. The engine memoizes every rule invocation ("target"),
//! records what each one read, and after an input edit re-runs only the rules
//! whose transitive inputs have actually changed.
//!
//! # Key Features
//!
//! - **Dynamic dependencies**: Every read made by a rule body is recorded; no
//!   static declaration is needed, and the set may change between runs
//! - **Write stability**: Re-writing an input with an equal value is a no-op
//! - **Early cutoff**: A rule that re-runs to an equal value does not make
//!   anything downstream re-run
//! - **Observable**: Every write and evaluation is reported to an
//!   [`EventHandler`]
//! - **Cycle detection**: A target that depends on itself fails with
//!   [`BuildError::Cycle`] instead of overflowing the stack
//!
//! # Example
//!
//! ```
//! use target_flow::{BuildError, Incremental, Input, Reader, Rule};
//!
//! struct Greeting;
//!
//! impl Input for Greeting {
//!     const NAME: &'static str = "GREETING";
//!     type Args = ();
//!     type Value = String;
//! }
//!
//! struct Shout;
//!
//! impl Rule for Shout {
//!     const NAME: &'static str = "SHOUT";
//!     type Args = ();
//!     type Value = String;
//!
//!     fn eval(reader: &impl Reader, (): Self::Args) -> Result<String, BuildError> {
//!         Ok(reader.get_or_eval::<Greeting>(())?.to_uppercase())
//!     }
//! }
//!
//! let mut engine = Incremental::new();
//! engine.set_input::<Greeting>((), "hello".to_string());
//! assert_eq!(*engine.get_or_eval::<Shout>(()).unwrap(), "HELLO");
//! ```

mod arg;
mod error;
pub mod handler;
mod reader;
mod rule;
mod runtime;
mod target;

pub use arg::{Arg, ArgList, ArgValue, RuleArgs};
pub use error::{BuildError, UnsetInput};
#[cfg(feature = "tracing")]
pub use handler::TracingHandler;
pub use handler::{EvalCollector, EventHandler, NullHandler};
pub use reader::{Reader, Traced};
pub use rule::{Input, Rule};
pub use runtime::{EntryInfo, Incremental, IncrementalBuilder, Revision};
pub use target::{RuleId, Target, TargetMap};
