//! Scalar values and their runtime string form
//!
//! Case values and action parameters reach the flow document as strings.
//! The conversion is fixed so that output never depends on locale:
//!
//! | value          | runtime form |
//! |----------------|--------------|
//! | `true`/`false` | `True`/`False` |
//! | integers       | decimal digits, `-` for negatives |
//! | floats         | shortest round-trip form, `.` separator, no exponent |
//! | strings        | unchanged |

use std::fmt;

use crate::error::{UsageError, UsageResult};

/// A case value or parameter value before stringification
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Boolean, rendered `True` / `False`
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point number, must be finite
    Float(f64),
    /// String, passed through
    Str(String),
}

impl Scalar {
    /// The string the runtime compares against
    pub fn to_runtime_string(&self) -> String {
        self.to_string()
    }

    /// Reject values that have no runtime form
    pub fn check(&self) -> UsageResult<()> {
        match self {
            Scalar::Float(value) if !value.is_finite() => {
                Err(UsageError::NonFiniteNumber { value: *value })
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(true) => f.write_str("True"),
            Scalar::Bool(false) => f.write_str("False"),
            Scalar::Int(value) => write!(f, "{value}"),
            Scalar::Float(value) => write!(f, "{value}"),
            Scalar::Str(value) => f.write_str(value),
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

macro_rules! int_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Scalar {
                fn from(value: $ty) -> Self {
                    Scalar::Int(i64::from(value))
                }
            }
        )*
    };
}

int_scalar!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Scalar {
    fn from(value: f32) -> Self {
        Scalar::Float(f64::from(value))
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

impl From<&String> for Scalar {
    fn from(value: &String) -> Self {
        Scalar::Str(value.clone())
    }
}
