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

//! GELF 1.1 message formatting.
//!
//! [`Gelf`] is a [`Formatter`] that produces [GELF] payloads: a JSON object with `version`,
//! `host`, `short_message`, optional `full_message` & `timestamp`, `level`, and any number of
//! `_`-prefixed custom fields.
//!
//! [GELF]: https://go2docs.graylog.org/current/getting_in_log_data/gelf.html

use crate::{
    attrs::write_attr,
    buffer::{Buffer, BufferPool},
    error::{Error, Result},
    facility::{priority, Facility, Hostname, Level, Severity},
    formatter::{Formatter, Record},
    truncate::truncate,
    value::Attr,
};

use std::borrow::Cow;

/// Titles longer than this are truncated on a word boundary...
const MAX_TITLE: usize = 120;
/// ...but never to fewer characters than this.
const MIN_TITLE: usize = 60;

/// A formatter producing GELF version 1.1 messages.
///
/// Construction is by builder; every knob has a discovered or empty default:
///
/// ```rust
/// use gelf_tracing::facility::Facility;
/// use gelf_tracing::gelf::Gelf;
/// use gelf_tracing::value::Attr;
///
/// let formatter = Gelf::builder()
///     .hostname_as_string("web01".to_string())
///     .facility(Facility::new("billing"))
///     .attr(Attr::new("region", "eu-central-1"))
///     .build();
/// ```
pub struct Gelf {
    hostname: Hostname,
    facility: Facility,
    attrs: Vec<Attr>,
    pool: BufferPool,
}

impl std::default::Default for Gelf {
    fn default() -> Self {
        Gelf {
            hostname: Hostname::default(),
            facility: Facility::default(),
            attrs: Vec::new(),
            pool: BufferPool::new(),
        }
    }
}

pub struct GelfBuilder {
    imp: Gelf,
}

impl GelfBuilder {
    pub fn hostname(mut self, hostname: Hostname) -> Self {
        self.imp.hostname = hostname;
        self
    }
    pub fn hostname_as_string(mut self, hostname: String) -> Self {
        self.imp.hostname = Hostname::new(hostname);
        self
    }
    pub fn facility(mut self, facility: Facility) -> Self {
        self.imp.facility = facility;
        self
    }
    pub fn facility_as_string(mut self, facility: String) -> Self {
        self.imp.facility = Facility::new(facility);
        self
    }
    /// Bind an attribute to every message this formatter produces.
    pub fn attr(mut self, attr: Attr) -> Self {
        self.imp.attrs.push(attr);
        self
    }
    pub fn attrs<I: IntoIterator<Item = Attr>>(mut self, attrs: I) -> Self {
        self.imp.attrs.extend(attrs);
        self
    }
    pub fn build(self) -> Gelf {
        self.imp
    }
}

impl Gelf {
    pub fn builder() -> GelfBuilder {
        GelfBuilder {
            imp: Gelf::default(),
        }
    }

    fn write_message(&self, buf: &mut Buffer, record: &Record) -> Result<()> {
        let level = priority(record.severity);
        if level > Level::LOG_DEBUG as u8 {
            // Below the bottom of the syslog scale: nothing to send.
            return Ok(());
        }

        buf.write_str(r#"{"version":"1.1","host":"#);
        buf.write_quoted(self.hostname.as_str())?;

        let title = truncate(record.message, MAX_TITLE, MIN_TITLE);
        let title: Cow<str> = if title.is_empty() {
            Cow::Borrowed(record.message)
        } else {
            title
        };
        buf.write_str(r#","short_message":"#);
        buf.write_quoted(&title)?;
        if title != record.message {
            buf.write_str(r#","full_message":"#);
            buf.write_quoted(record.message)?;
        }

        if let Some(ts) = record.timestamp {
            buf.write_str(r#","timestamp":"#);
            buf.write_float(ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_nanos()) / 1e9)?;
        }

        buf.write_str(r#","level":"#);
        buf.write_uint(u64::from(level));

        if !self.facility.is_empty() {
            buf.write_str(r#","_facility":"#);
            buf.write_quoted(self.facility.as_str())?;
        }

        // Source location rides along only on warnings and worse; resolving it on every
        // informational message is overhead for a field nobody reads.
        if record.severity >= Severity::WARN {
            if let (Some(file), Some(line)) = (record.file, record.line) {
                buf.write_str(r#","_file":"#);
                buf.write_quoted(&format!("{}:{}", file, line))?;
            }
        }

        for attr in &self.attrs {
            write_attr(buf, attr, "");
        }
        for attr in record.attrs {
            write_attr(buf, attr, "");
        }

        buf.write_byte(b'}');
        Ok(())
    }
}

impl Formatter for Gelf {
    type Error = Error;
    type Output<'a>
        = Buffer<'a>
    where
        Self: 'a;

    fn format(&self, record: &Record) -> Result<Buffer<'_>> {
        let mut buf = self.pool.acquire();
        self.write_message(&mut buf, record)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use chrono::{DateTime, Utc};

    fn test_formatter() -> Gelf {
        Gelf::builder()
            .hostname_as_string("bree.local".to_string())
            .facility_as_string(String::new())
            .build()
    }

    fn format_str(formatter: &Gelf, record: &Record) -> String {
        let buf = formatter.format(record).unwrap();
        String::from_utf8((*buf).to_vec()).unwrap()
    }

    fn info_record<'a>(message: &'a str, attrs: &'a [Attr]) -> Record<'a> {
        Record {
            severity: Severity::INFO,
            message,
            timestamp: None,
            file: None,
            line: None,
            attrs,
        }
    }

    #[test]
    fn test_minimal_message() {
        let f = test_formatter();
        assert_eq!(
            format_str(&f, &info_record("Hello", &[])),
            r#"{"version":"1.1","host":"bree.local","short_message":"Hello","level":6}"#
        );
    }

    #[test]
    fn test_facility_and_bound_attrs() {
        let f = Gelf::builder()
            .hostname_as_string("bree.local".to_string())
            .facility_as_string("prototyping".to_string())
            .attr(Attr::new("region", "eu"))
            .build();
        assert_eq!(
            format_str(&f, &info_record("Hello", &[])),
            r#"{"version":"1.1","host":"bree.local","short_message":"Hello","level":6,"_facility":"prototyping","_region":"eu"}"#
        );
    }

    #[test]
    fn test_timestamp_fractional_seconds() {
        let f = test_formatter();
        let ts: DateTime<Utc> = DateTime::from_timestamp(1_700_000_000, 250_000_000).unwrap();
        let record = Record {
            timestamp: Some(ts),
            ..info_record("Hello", &[])
        };
        let out = format_str(&f, &record);
        assert!(
            out.contains(r#""timestamp":1700000000.25"#),
            "unexpected timestamp encoding: {}",
            out
        );
    }

    #[test]
    fn test_full_message_only_when_truncated() {
        let f = test_formatter();

        let long = format!("{} {}", "word".repeat(20), "tail ".repeat(30));
        let out = format_str(&f, &info_record(&long, &[]));
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["full_message"], long.as_str());
        let title = parsed["short_message"].as_str().unwrap();
        assert!(title.ends_with('…'));
        assert!(title.chars().count() <= MAX_TITLE + 1);

        let out = format_str(&f, &info_record("short enough", &[]));
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert!(parsed.get("full_message").is_none());
    }

    #[test]
    fn test_multiline_message() {
        let f = test_formatter();
        let out = format_str(&f, &info_record("Test message.\nMore info...", &[]));
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["short_message"], "Test message.");
        assert_eq!(parsed["full_message"], "Test message.\nMore info...");
    }

    #[test]
    fn test_source_location_warn_and_above() {
        let f = test_formatter();
        let mut record = info_record("boom", &[]);
        record.file = Some("src/main.rs");
        record.line = Some(42);

        let out = format_str(&f, &record);
        assert!(!out.contains("_file"));

        record.severity = Severity::WARN;
        let out = format_str(&f, &record);
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["_file"], "src/main.rs:42");
    }

    #[test]
    fn test_below_scale_is_dropped() {
        let f = test_formatter();
        let record = Record {
            severity: Severity(-5),
            ..info_record("invisible", &[])
        };
        let buf = f.format(&record).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_round_trip_attribute_values() {
        let f = test_formatter();
        let attrs = vec![
            Attr::new("str", "string value"),
            Attr::new("int", -12i64),
            Attr::new("uint", 12u64),
            Attr::new("float", 1.25f64),
            Attr::new("flag", true),
            Attr::new("inf", f64::INFINITY),
        ];
        let out = format_str(&f, &info_record("Hello", &attrs));
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["_str"], "string value");
        assert_eq!(parsed["_int"], -12);
        assert_eq!(parsed["_uint"], 12);
        assert_eq!(parsed["_float"], 1.25);
        assert_eq!(parsed["_flag"], "true");
        assert_eq!(parsed["_inf"], "+Inf");
    }

    #[test]
    fn test_grouped_and_structured_attrs() {
        let f = test_formatter();
        let attrs = vec![
            Attr::group(
                "db",
                vec![Attr::new("host", "x"), Attr::new("port", 5432i64)],
            ),
            Attr::new(
                "payload",
                Value::serialize(&serde_json::json!({"test": "test"})).unwrap(),
            ),
        ];
        let out = format_str(&f, &info_record("Hello", &attrs));
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["_db_host"], "x");
        assert_eq!(parsed["_db_port"], 5432);
        assert_eq!(parsed["_payload"]["test"], "test");
    }

    #[test]
    fn test_buffer_returns_to_pool_between_calls() {
        let f = test_formatter();
        let first = format_str(&f, &info_record("one", &[]));
        let second = format_str(&f, &info_record("two", &[]));
        assert!(first.contains("one") && !second.contains("one"));
    }
}
