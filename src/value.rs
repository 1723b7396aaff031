// Copyright (C) 2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of gelf-tracing.
//
// gelf-tracing is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// mpdpopm is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even
// the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details.
//
// You should have received a copy of the GNU General Public License along with mpdpopm.  If not,
// see <http://www.gnu.org/licenses/>.

//! The attribute value model.
//!
//! Attribute values arrive from the logging front-end dynamically typed. Rather than dispatch
//! over `dyn Any` at encode time, the open set of runtime types is classified *once*, at the
//! boundary, into the closed set of kinds in [`Value`]; anything unrecognized falls back to
//! [`Value::Structured`] via [`Value::serialize`]. The encoder then matches on the variant.

use crate::error::{Error, Result};

use backtrace::Backtrace;
use chrono::{DateTime, Utc};

use std::{borrow::Cow, fmt, time::Duration};

/// A value that can render itself as text, fallibly.
///
/// The analogue of the standard text-marshaling interfaces in other ecosystems; the error is
/// propagated through [`Error::Encoding`] rather than swallowed.
pub trait EncodeText {
    fn encode_text(&self) -> std::result::Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

/// One attribute value, classified by kind.
pub enum Value {
    Null,
    Str(Cow<'static, str>),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Duration(Duration),
    /// `None` is the zero/unset timestamp; it encodes as `""`.
    Timestamp(Option<DateTime<Utc>>),
    Error(Box<dyn std::error::Error + Send + Sync>),
    /// Encoded as the quoted result of its `Display` implementation.
    Stringable(Box<dyn fmt::Display + Send + Sync>),
    Text(Box<dyn EncodeText + Send + Sync>),
    /// Arbitrary structured data, rendered by `serde_json`.
    Structured(serde_json::Value),
    /// A named group of child attributes, flattened with a `_`-joined prefix.
    Group(Vec<Attr>),
    /// Computed on demand, exactly once per log call, during flattening. Not memoized.
    Lazy(Box<dyn Fn() -> Value + Send + Sync>),
}

impl Value {
    /// Classify an arbitrary serializable value as [`Value::Structured`].
    ///
    /// This is the boundary conversion for types outside the closed kind set; a failed
    /// serialization surfaces here rather than mid-message.
    pub fn serialize<T: serde::Serialize>(v: &T) -> Result<Value> {
        serde_json::to_value(v)
            .map(Value::Structured)
            .map_err(|err| Error::Encoding {
                source: Box::new(err),
                back: Backtrace::new(),
            })
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Int(v) => write!(f, "Int({})", v),
            Value::Uint(v) => write!(f, "Uint({})", v),
            Value::Float(v) => write!(f, "Float({})", v),
            Value::Bool(v) => write!(f, "Bool({})", v),
            Value::Duration(d) => write!(f, "Duration({:?})", d),
            Value::Timestamp(ts) => write!(f, "Timestamp({:?})", ts),
            Value::Error(e) => write!(f, "Error({})", e),
            Value::Stringable(v) => write!(f, "Stringable({})", v),
            Value::Text(_) => write!(f, "Text(..)"),
            Value::Structured(v) => write!(f, "Structured({})", v),
            Value::Group(attrs) => f.debug_tuple("Group").field(attrs).finish(),
            Value::Lazy(_) => write!(f, "Lazy(..)"),
        }
    }
}

impl From<&'static str> for Value {
    fn from(v: &'static str) -> Self {
        Value::Str(Cow::Borrowed(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Cow::Owned(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Uint(v.into())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Duration> for Value {
    fn from(v: Duration) -> Self {
        Value::Duration(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(Some(v))
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Structured(v)
    }
}

/// A key/value pair attached to a log record.
///
/// Attributes are read-only snapshots taken at log time; the encoder never mutates them.
#[derive(Debug)]
pub struct Attr {
    pub key: Cow<'static, str>,
    pub value: Value,
}

impl Attr {
    pub fn new<K: Into<Cow<'static, str>>, V: Into<Value>>(key: K, value: V) -> Attr {
        Attr {
            key: key.into(),
            value: value.into(),
        }
    }

    /// A named group; children flatten to `<group>_<child>` field names.
    pub fn group<K: Into<Cow<'static, str>>>(key: K, attrs: Vec<Attr>) -> Attr {
        Attr {
            key: key.into(),
            value: Value::Group(attrs),
        }
    }

    /// A value computed only if and when the record is actually encoded.
    pub fn lazy<K, F>(key: K, resolve: F) -> Attr
    where
        K: Into<Cow<'static, str>>,
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Attr {
            key: key.into(),
            value: Value::Lazy(Box::new(resolve)),
        }
    }

    pub fn error<K, E>(key: K, err: E) -> Attr
    where
        K: Into<Cow<'static, str>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Attr {
            key: key.into(),
            value: Value::Error(Box::new(err)),
        }
    }

    pub fn display<K, V>(key: K, v: V) -> Attr
    where
        K: Into<Cow<'static, str>>,
        V: fmt::Display + Send + Sync + 'static,
    {
        Attr {
            key: key.into(),
            value: Value::Stringable(Box::new(v)),
        }
    }

    pub fn text<K, V>(key: K, v: V) -> Attr
    where
        K: Into<Cow<'static, str>>,
        V: EncodeText + Send + Sync + 'static,
    {
        Attr {
            key: key.into(),
            value: Value::Text(Box::new(v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(matches!(Value::from(1i32), Value::Int(1)));
        assert!(matches!(Value::from(1u64), Value::Uint(1)));
        assert!(matches!(Value::from(true), Value::Bool(true)));
        assert!(matches!(Value::from("x"), Value::Str(_)));
    }

    #[test]
    fn test_serialize_boundary() {
        #[derive(serde::Serialize)]
        struct Payload {
            test: &'static str,
        }
        let v = Value::serialize(&Payload { test: "test" }).unwrap();
        match v {
            Value::Structured(json) => assert_eq!(json["test"], "test"),
            other => panic!("expected Structured, got {:?}", other),
        }
    }
}
