//! Primitive rule arguments.
//!
//! Arguments are restricted to a closed set of primitive kinds so that
//! structural equality, hashing and display are cheap and well-defined.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// A single primitive argument of a rule invocation.
#[derive(Debug, Clone)]
pub enum Arg {
    /// A string argument.
    Str(Arc<str>),
    /// A signed integer argument.
    Int(i64),
    /// A floating point argument. Compared by canonical bit pattern.
    Float(f64),
    /// A boolean argument.
    Bool(bool),
}

impl Arg {
    // -0.0 and 0.0 are the same key; every NaN is the same key.
    fn float_bits(value: f64) -> u64 {
        if value == 0.0 {
            0.0f64.to_bits()
        } else if value.is_nan() {
            f64::NAN.to_bits()
        } else {
            value.to_bits()
        }
    }

    /// Returns the string payload, if this is a string argument.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Arg {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Arg::Str(a), Arg::Str(b)) => a == b,
            (Arg::Int(a), Arg::Int(b)) => a == b,
            (Arg::Float(a), Arg::Float(b)) => Arg::float_bits(*a) == Arg::float_bits(*b),
            (Arg::Bool(a), Arg::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Arg {}

impl Hash for Arg {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Arg::Str(s) => s.hash(state),
            Arg::Int(i) => i.hash(state),
            Arg::Float(f) => Arg::float_bits(*f).hash(state),
            Arg::Bool(b) => b.hash(state),
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Str(s) => f.write_str(s),
            Arg::Int(i) => write!(f, "{}", i),
            Arg::Float(x) => write!(f, "{}", x),
            Arg::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Canonical, immutable argument tuple of one rule invocation.
///
/// Clone is cheap as the arguments are shared behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArgList(Arc<[Arg]>);

impl ArgList {
    /// An empty argument tuple.
    pub fn empty() -> Self {
        ArgList(Arc::from(Vec::new()))
    }
}

impl Deref for ArgList {
    type Target = [Arg];

    fn deref(&self) -> &[Arg] {
        &self.0
    }
}

impl From<Vec<Arg>> for ArgList {
    fn from(args: Vec<Arg>) -> Self {
        ArgList(Arc::from(args))
    }
}

impl FromIterator<Arg> for ArgList {
    fn from_iter<T: IntoIterator<Item = Arg>>(iter: T) -> Self {
        ArgList(iter.into_iter().collect())
    }
}

impl fmt::Display for ArgList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg)?;
        }
        Ok(())
    }
}

/// A Rust value usable as a single rule argument.
pub trait ArgValue: Sized {
    /// Convert into the primitive argument form.
    fn to_arg(&self) -> Arg;

    /// Convert back from the primitive argument form.
    ///
    /// Returns `None` if the argument is of a different kind or out of range.
    fn from_arg(arg: &Arg) -> Option<Self>;
}

impl ArgValue for String {
    fn to_arg(&self) -> Arg {
        Arg::Str(Arc::from(self.as_str()))
    }

    fn from_arg(arg: &Arg) -> Option<Self> {
        arg.as_str().map(str::to_owned)
    }
}

impl ArgValue for Arc<str> {
    fn to_arg(&self) -> Arg {
        Arg::Str(self.clone())
    }

    fn from_arg(arg: &Arg) -> Option<Self> {
        match arg {
            Arg::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}

macro_rules! int_arg_value {
    ($($ty:ty),*) => {
        $(
            impl ArgValue for $ty {
                fn to_arg(&self) -> Arg {
                    Arg::Int(i64::from(*self))
                }

                fn from_arg(arg: &Arg) -> Option<Self> {
                    match arg {
                        Arg::Int(i) => <$ty>::try_from(*i).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

int_arg_value!(i64, i32, u32);

impl ArgValue for f64 {
    fn to_arg(&self) -> Arg {
        Arg::Float(*self)
    }

    fn from_arg(arg: &Arg) -> Option<Self> {
        match arg {
            Arg::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl ArgValue for bool {
    fn to_arg(&self) -> Arg {
        Arg::Bool(*self)
    }

    fn from_arg(arg: &Arg) -> Option<Self> {
        match arg {
            Arg::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// An ordered argument tuple of a rule.
///
/// Implemented for tuples of up to six [`ArgValue`]s, including `()`.
pub trait RuleArgs: Sized + 'static {
    /// Convert into the canonical argument list.
    fn to_args(&self) -> ArgList;

    /// Rebuild the tuple from a canonical argument list.
    fn from_args(args: &[Arg]) -> Option<Self>;
}

macro_rules! tuple_rule_args {
    ($len:expr; $($name:ident $idx:tt),*) => {
        impl<$($name: ArgValue + 'static),*> RuleArgs for ($($name,)*) {
            fn to_args(&self) -> ArgList {
                let args: Vec<Arg> = vec![$(self.$idx.to_arg()),*];
                ArgList::from(args)
            }

            #[allow(unused_variables)]
            fn from_args(args: &[Arg]) -> Option<Self> {
                if args.len() != $len {
                    return None;
                }
                Some(($($name::from_arg(&args[$idx])?,)*))
            }
        }
    };
}

tuple_rule_args!(0;);
tuple_rule_args!(1; A 0);
tuple_rule_args!(2; A 0, B 1);
tuple_rule_args!(3; A 0, B 1, C 2);
tuple_rule_args!(4; A 0, B 1, C 2, D 3);
tuple_rule_args!(5; A 0, B 1, C 2, D 3, E 4);
tuple_rule_args!(6; A 0, B 1, C 2, D 3, E 4, F 5);
