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

//! Flattening & encoding of attributes into GELF custom fields.

use crate::{
    buffer::Buffer,
    error::{Error, Result},
    value::{Attr, Value},
};

use backtrace::Backtrace;

use std::{borrow::Cow, fmt::Write};

/// Field names the message builder emits itself, or that the collector treats specially once
/// the `_` prefix is stripped server-side. A user key equal to one of these gets a `_` suffix
/// so it cannot shadow the real field.
const RESERVED: [&str; 7] = [
    "source",
    "message",
    "full_message",
    "level",
    "timestamp",
    "facility",
    "file",
];

/// Recursively flatten `attr` into the buffer.
///
/// Groups contribute each child under `<prefix>_<group>`; lazy values are resolved once and
/// re-dispatched with the composed name as their key; an attribute with an empty key is
/// silently dropped. Encoding errors of individual leaves are skipped at this call site, not
/// propagated: one bad attribute must not lose the record.
pub(crate) fn write_attr(buf: &mut Buffer, attr: &Attr, prefix: &str) {
    if attr.key.is_empty() {
        return;
    }

    let name: Cow<str> = if prefix.is_empty() {
        Cow::Borrowed(attr.key.as_ref())
    } else {
        Cow::Owned(format!("{}_{}", prefix, attr.key))
    };

    match &attr.value {
        Value::Group(children) => {
            for child in children {
                write_attr(buf, child, &name);
            }
        }
        Value::Lazy(resolve) => {
            let resolved = Attr {
                key: Cow::Owned(name.into_owned()),
                value: resolve(),
            };
            write_attr(buf, &resolved, "");
        }
        value => {
            let _ = write_attr_value(buf, &name, value);
        }
    }
}

/// Write one leaf as `,"<name>":<value>`.
///
/// An empty name is a no-op; the name "id" is unsupported as a GELF custom field and is the
/// one hard error here. On a marshaling error the buffer is rolled back to its previous
/// length, leaving no half-written field behind.
pub(crate) fn write_attr_value(buf: &mut Buffer, name: &str, value: &Value) -> Result<()> {
    match name {
        "" => return Ok(()),
        "id" => {
            return Err(Error::ReservedName {
                name: name.to_owned(),
                back: Backtrace::new(),
            })
        }
        _ => {}
    }

    // Containers re-enter the walker; only scalars are written below.
    match value {
        Value::Group(children) => {
            for child in children {
                write_attr(buf, child, name);
            }
            return Ok(());
        }
        Value::Lazy(resolve) => return write_attr_value(buf, name, &resolve()),
        _ => {}
    }

    let start = buf.len();
    buf.write_str(",\"");
    if RESERVED.contains(&name) {
        buf.write_str(&fix_name(&format!("{}_", name)));
    } else {
        buf.write_str(&fix_name(name));
    }
    buf.write_str("\":");

    let result = match value {
        Value::Null => {
            buf.write_str("null");
            Ok(())
        }
        Value::Str(s) => buf.write_quoted(s),
        Value::Int(v) => {
            buf.write_int(*v);
            Ok(())
        }
        Value::Uint(v) => {
            buf.write_uint(*v);
            Ok(())
        }
        Value::Float(v) => buf.write_float(*v),
        Value::Bool(v) => {
            buf.write_bool(*v);
            Ok(())
        }
        Value::Duration(d) => buf.write_quoted(&humantime::format_duration(*d).to_string()),
        Value::Timestamp(None) => {
            buf.write_str(r#""""#);
            Ok(())
        }
        Value::Timestamp(Some(ts)) => buf.write_quoted(&ts.to_rfc3339()),
        Value::Error(err) => buf.write_quoted(&err.to_string()),
        Value::Stringable(v) => buf.write_quoted(&v.to_string()),
        Value::Text(v) => match v.encode_text() {
            Ok(text) => buf.write_quoted(&text),
            Err(source) => Err(Error::Encoding {
                source,
                back: Backtrace::new(),
            }),
        },
        Value::Structured(v) => buf.write_json(v),
        Value::Group(_) | Value::Lazy(_) => unreachable!("containers handled above"),
    };

    if result.is_err() {
        buf.truncate(start);
    }
    result
}

/// Normalize an attribute key into a GELF-legal field name, `_`-prefixed per the GELF custom
/// field convention.
///
/// Characters outside `[A-Za-z0-9_.-]` are escaped: ASCII bytes become `_`, anything else
/// becomes a `\uXXXX` escape in lowercase hex. The result needs no further JSON escaping.
pub(crate) fn fix_name(s: &str) -> String {
    let s = s.trim();
    let mut fixed = String::with_capacity(s.len() + 1);
    fixed.push('_');
    for c in s.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
            fixed.push(c);
        } else if c.is_ascii() {
            fixed.push('_');
        } else {
            let _ = write!(fixed, "\\u{:04x}", c as u32);
        }
    }
    fixed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPool;

    fn encoded(f: impl FnOnce(&mut Buffer)) -> String {
        let pool = BufferPool::new();
        let mut buf = pool.acquire();
        f(&mut buf);
        String::from_utf8((*buf).to_vec()).unwrap()
    }

    #[test]
    fn test_fix_name_passthrough() {
        assert_eq!(fix_name("request.id"), "_request.id");
        assert_eq!(fix_name("http-status"), "_http-status");
        assert_eq!(fix_name("a_b2"), "_a_b2");
        assert_eq!(fix_name("  spaced  "), "_spaced");
    }

    #[test]
    fn test_fix_name_escaping() {
        assert_eq!(fix_name("a b"), "_a_b");
        assert_eq!(fix_name("a !b"), "_a__b");
        assert_eq!(fix_name("тест"), r"_\u0442\u0435\u0441\u0442");
        assert_eq!(fix_name("mix п x"), r"_mix_\u043f_x");
        assert_eq!(fix_name("日 本"), r"_\u65e5_\u672c");
    }

    #[test]
    fn test_scalars() {
        assert_eq!(
            encoded(|buf| write_attr_value(buf, "n", &Value::Null).unwrap()),
            r#","_n":null"#
        );
        assert_eq!(
            encoded(|buf| write_attr_value(buf, "i", &Value::Int(-7)).unwrap()),
            r#","_i":-7"#
        );
        assert_eq!(
            encoded(|buf| write_attr_value(buf, "u", &Value::Uint(u64::MAX)).unwrap()),
            format!(r#","_u":{}"#, u64::MAX)
        );
        assert_eq!(
            encoded(|buf| write_attr_value(buf, "b", &Value::Bool(false)).unwrap()),
            r#","_b":"false""#
        );
        assert_eq!(
            encoded(|buf| write_attr_value(buf, "f", &Value::Float(f64::NAN)).unwrap()),
            r#","_f":"NaN""#
        );
    }

    #[test]
    fn test_duration_and_timestamp() {
        assert_eq!(
            encoded(|buf| {
                write_attr_value(buf, "d", &Value::Duration(std::time::Duration::from_secs(90)))
                    .unwrap()
            }),
            r#","_d":"1m 30s""#
        );
        assert_eq!(
            encoded(|buf| write_attr_value(buf, "t", &Value::Timestamp(None)).unwrap()),
            r#","_t":"""#
        );
    }

    #[test]
    fn test_reserved_names() {
        let pool = BufferPool::new();
        let mut buf = pool.acquire();
        assert!(matches!(
            write_attr_value(&mut buf, "id", &Value::Int(1)),
            Err(Error::ReservedName { .. })
        ));
        assert!(buf.is_empty());

        assert_eq!(
            encoded(|buf| write_attr_value(buf, "facility", &Value::Int(1)).unwrap()),
            r#","_facility_":1"#
        );
        assert_eq!(
            encoded(|buf| write_attr_value(buf, "level", &Value::Int(1)).unwrap()),
            r#","_level_":1"#
        );
    }

    #[test]
    fn test_group_prefixing() {
        let attr = Attr::group("db", vec![Attr::new("host", "x")]);
        assert_eq!(
            encoded(|buf| write_attr(buf, &attr, "")),
            r#","_db_host":"x""#
        );
        // Nested group, non-empty running prefix.
        let attr = Attr::group("a", vec![Attr::group("b", vec![Attr::new("c", 1i64)])]);
        assert_eq!(encoded(|buf| write_attr(buf, &attr, "p")), r#","_p_a_b_c":1"#);
    }

    #[test]
    fn test_empty_key_dropped() {
        let attr = Attr::new("", 1i64);
        assert_eq!(encoded(|buf| write_attr(buf, &attr, "prefix")), "");
    }

    #[test]
    fn test_lazy_resolution() {
        // The composed name replaces the outer key before re-dispatch.
        let attr = Attr::lazy("user", || {
            Value::Group(vec![Attr::new("name", "kim"), Attr::new("uid", 7i64)])
        });
        assert_eq!(
            encoded(|buf| write_attr(buf, &attr, "ctx")),
            r#","_ctx_user_name":"kim","_ctx_user_uid":7"#
        );
    }

    #[test]
    fn test_marshal_error_rolls_back() {
        struct Broken;
        impl crate::value::EncodeText for Broken {
            fn encode_text(
                &self,
            ) -> std::result::Result<String, Box<dyn std::error::Error + Send + Sync>> {
                Err("broken".into())
            }
        }

        let pool = BufferPool::new();
        let mut buf = pool.acquire();
        buf.write_str("{");
        let err = write_attr_value(&mut buf, "x", &Value::Text(Box::new(Broken)));
        assert!(matches!(err, Err(Error::Encoding { .. })));
        // No dangling `,"_x":` left behind.
        assert_eq!(&*buf, b"{");
    }
}
