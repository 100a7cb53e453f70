// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host-side value representation.
//!
//! [`HostValue`] is the only shape in which data crosses the boundary between
//! the host and a script context. It is plain owned data: it can be stored,
//! sent to other threads and compared without touching any engine.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// String-keyed mapping that remembers insertion order.
pub type Mapping = IndexMap<String, HostValue>;

/// A host-native value exchanged with script contexts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostValue {
    /// Absence of a value (`null` / `undefined` on the script side)
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating-point value with a fractional part (or non-finite)
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Ordered sequence
    Sequence(Vec<HostValue>),
    /// String-keyed associative mapping
    Mapping(Mapping),
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Null, HostValue::Null) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Int(a), HostValue::Int(b)) => a == b,
            // Bitwise so that NaN round-trips compare equal
            (HostValue::Float(a), HostValue::Float(b)) => a == b || a.to_bits() == b.to_bits(),
            (HostValue::String(a), HostValue::String(b)) => a == b,
            (HostValue::Sequence(a), HostValue::Sequence(b)) => a == b,
            (HostValue::Mapping(a), HostValue::Mapping(b)) => a == b,
            _ => false,
        }
    }
}

impl HostValue {
    /// Returns true if this value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    /// Returns the boolean payload, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer payload, if any.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HostValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value as a float for either numeric variant.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Int(n) => Some(*n as f64),
            HostValue::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the sequence payload, if any.
    pub fn as_sequence(&self) -> Option<&[HostValue]> {
        match self {
            HostValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the mapping payload, if any.
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            HostValue::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Short name of the variant, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Float(_) => "float",
            HostValue::String(_) => "string",
            HostValue::Sequence(_) => "sequence",
            HostValue::Mapping(_) => "mapping",
        }
    }

    /// Coerces the value to the string a dynamic host would produce.
    ///
    /// Strings are returned verbatim, scalars in their literal form and
    /// `Null` as the empty string. Composites fall back to [`fmt::Display`].
    pub fn to_plain_string(&self) -> String {
        match self {
            HostValue::Null => String::new(),
            HostValue::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Null => write!(f, "null"),
            HostValue::Bool(b) => write!(f, "{}", b),
            HostValue::Int(n) => write!(f, "{}", n),
            HostValue::Float(n) => {
                if n.is_nan() {
                    write!(f, "NaN")
                } else if n.is_infinite() {
                    write!(f, "{}Infinity", if *n < 0.0 { "-" } else { "" })
                } else {
                    write!(f, "{}", n)
                }
            }
            HostValue::String(s) => write!(f, "{}", quote(s)),
            HostValue::Sequence(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            HostValue::Mapping(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", quote(key), value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Bool(value)
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        HostValue::Int(i64::from(value))
    }
}

impl From<u32> for HostValue {
    fn from(value: u32) -> Self {
        HostValue::Int(i64::from(value))
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        HostValue::Int(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Float(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::String(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::String(value)
    }
}

impl<T: Into<HostValue>> From<Vec<T>> for HostValue {
    fn from(items: Vec<T>) -> Self {
        HostValue::Sequence(items.into_iter().map(Into::into).collect())
    }
}

impl From<Mapping> for HostValue {
    fn from(map: Mapping) -> Self {
        HostValue::Mapping(map)
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(HostValue::Null, Into::into)
    }
}

/// Create a [`HostValue::Mapping`] literal.
///
/// # Example
///
/// ```
/// use spacey_embed::{host_map, HostValue};
///
/// let config = host_map! {
///     "debug" => true,
///     "version" => "1.0.0",
/// };
///
/// assert_eq!(config.as_mapping().unwrap().get("debug"), Some(&HostValue::Bool(true)));
/// ```
#[macro_export]
macro_rules! host_map {
    () => {
        $crate::HostValue::Mapping($crate::Mapping::new())
    };
    ($($key:literal => $value:expr),+ $(,)?) => {{
        let mut map = $crate::Mapping::new();
        $(map.insert($key.to_string(), $crate::HostValue::from($value));)+
        $crate::HostValue::Mapping(map)
    }};
}
