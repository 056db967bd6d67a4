//! Tagged value carried by every record
//!
//! The probe writes a `val_type` tag followed by one slot per representation
//! (`val_i`, `val_u`, `val_d`, `val_s`). Only the slot named by the tag is
//! meaningful.

use std::fmt;

use pvtrace_common::{
    VAL_TYPE_DOUBLE, VAL_TYPE_INT, VAL_TYPE_NULL, VAL_TYPE_STRING, VAL_TYPE_UINT,
};

use super::decoder::fixed_str;

/// Decoded record value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Uint(u64),
    Double(f64),
    String(String),
    Null,
}

impl Value {
    /// Pick the slot named by `tag`
    ///
    /// Unknown tags decode as [`Value::Null`]; this includes 0, which the
    /// process probe writes when it could not read the field.
    #[allow(clippy::match_same_arms)]
    pub fn from_tagged(tag: u32, val_i: i64, val_u: u64, val_d: f64, val_s: &[u8]) -> Self {
        match tag {
            VAL_TYPE_INT => Value::Int(val_i),
            VAL_TYPE_UINT => Value::Uint(val_u),
            VAL_TYPE_DOUBLE => Value::Double(val_d),
            VAL_TYPE_STRING => Value::String(fixed_str(val_s)),
            VAL_TYPE_NULL => Value::Null,
            _ => Value::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Uint(v) => write!(f, "{v}"),
            // Debug keeps the fractional part on whole numbers ("2.0", not "2")
            Value::Double(v) => write!(f, "{v:?}"),
            Value::String(s) => f.write_str(s),
            Value::Null => f.write_str("NULL"),
        }
    }
}
