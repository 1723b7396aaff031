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

//! GELF facility, hostname, severity & priority definitions.
//!
//! GELF borrows syslog's eight-level priority scale for its `level` field ([`Level`] here), but
//! structured logging front-ends usually speak a much wider, signed severity scale where "info"
//! sits at zero, "debug" below it and "warn"/"error" above ([`Severity`] here). [`priority`]
//! folds the wide scale down onto the narrow one.
//!
//! [`Facility`] and [`Hostname`] are the two per-process strings a GELF message carries to
//! identify its origin. Both have discovery defaults; both can be overridden when building a
//! [`Gelf`](crate::gelf::Gelf) formatter.

type StdResult<T, E> = std::result::Result<T, E>;

/// A free-text field identifying the emitting application or module.
///
/// The default is derived from the current executable's file stem, which is as close as a
/// library can get to "the name of the program" without being told. It cannot fail; if the
/// executable path cannot be retrieved the facility is simply empty and the `_facility` field
/// is omitted from messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Facility(String);

impl Facility {
    /// Construct a facility from an arbitrary string; surrounding whitespace is trimmed.
    pub fn new<S: AsRef<str>>(s: S) -> Facility {
        Facility(s.as_ref().trim().to_owned())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::default::Default for Facility {
    fn default() -> Self {
        std::env::current_exe()
            .ok()
            .as_deref()
            .and_then(std::path::Path::file_stem)
            .map(|stem| Facility::new(stem.to_string_lossy()))
            .unwrap_or_else(|| Facility(String::new()))
    }
}

impl std::fmt::Display for Facility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Facility {
    fn from(s: String) -> Self {
        Facility::new(s)
    }
}

impl From<&str> for Facility {
    fn from(s: &str) -> Self {
        Facility::new(s)
    }
}

/// The `host` field of every GELF message.
///
/// Unlike syslog's HOSTNAME there is no ASCII-only constraint here; GELF is UTF-8 JSON
/// throughout. An empty or all-whitespace hostname is replaced with `"localhost"` at
/// construction so the required `host` field is never empty on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hostname(String);

impl Hostname {
    pub fn new<S: AsRef<str>>(s: S) -> Hostname {
        let s = s.as_ref().trim();
        if s.is_empty() {
            Hostname("localhost".to_owned())
        } else {
            Hostname(s.to_owned())
        }
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::default::Default for Hostname {
    /// Attempt to figure-out the local hostname.
    ///
    /// This implementation will first simply try [gethostname()], then fall back to the
    /// machine's local IP address, and finally to `"localhost"`.
    ///
    /// [gethostname()]: https://man7.org/linux/man-pages/man2/gethostname.2.html
    fn default() -> Self {
        hostname::get()
            .ok()
            .map(|hn| hn.to_string_lossy().into_owned())
            .filter(|hn| !hn.trim().is_empty())
            .or_else(|| {
                local_ip_address::local_ip()
                    .ok()
                    .map(|ip| ip.to_string())
            })
            .map(Hostname::new)
            .unwrap_or_else(|| Hostname("localhost".to_owned()))
    }
}

impl std::fmt::Display for Hostname {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Hostname {
    fn from(s: String) -> Self {
        Hostname::new(s)
    }
}

impl From<&str> for Hostname {
    fn from(s: &str) -> Self {
        Hostname::new(s)
    }
}

/// The wide, signed severity scale of the structured-logging front-end.
///
/// The numbering follows the convention of leaving gaps for intermediate levels: `DEBUG` = -4,
/// `INFO` = 0, `WARN` = 4, `ERROR` = 8. Values in between (and beyond) are meaningful and map
/// onto distinct syslog priorities; see [`priority`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Severity(pub i32);

impl Severity {
    pub const DEBUG: Severity = Severity(-4);
    pub const INFO: Severity = Severity(0);
    pub const WARN: Severity = Severity(4);
    pub const ERROR: Severity = Severity(8);
}

/// GELF re-uses syslog's eight severity levels for its `level` field. The enumeration values
/// duplicate the constants documented as per the `syslog()` manual [page] & defined in
/// `<syslog.h>`.
///
/// [page]: https://man7.org/linux/man-pages/man3/syslog.3.html
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Level {
    /// system is unusable
    LOG_EMERG,
    /// action must be take immediately
    LOG_ALERT,
    /// critical conditions
    LOG_CRIT,
    /// error conditions
    LOG_ERR,
    /// warning conditions
    LOG_WARNING,
    /// normal, but significant condition
    LOG_NOTICE,
    /// informational message
    LOG_INFO,
    /// debug-level message
    LOG_DEBUG,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(
            f,
            "{}",
            match self {
                Level::LOG_EMERG => "LOG_EMERG",
                Level::LOG_ALERT => "LOG_ALERT",
                Level::LOG_CRIT => "LOG_CRIT",
                Level::LOG_ERR => "LOG_ERR",
                Level::LOG_WARNING => "LOG_WARNING",
                Level::LOG_NOTICE => "LOG_NOTICE",
                Level::LOG_INFO => "LOG_INFO",
                Level::LOG_DEBUG => "LOG_DEBUG",
            }
        )
    }
}

/// Map a wide-scale [`Severity`] onto the syslog priority encoded in the GELF `level` field.
///
/// Returns a raw `u8` rather than a [`Level`]: severities below [`Severity::DEBUG`] map to
/// `LOG_DEBUG` plus the distance below it, which runs off the bottom of the syslog scale. The
/// message builder drops records whose priority exceeds `LOG_DEBUG`. The arithmetic saturates
/// at `u8::MAX` instead of wrapping, so an extremely negative severity can never alias back
/// onto a real priority.
pub fn priority(severity: Severity) -> u8 {
    if severity < Severity::DEBUG {
        let below = Severity::DEBUG.0.saturating_sub(severity.0);
        (Level::LOG_DEBUG as u8).saturating_add(u8::try_from(below).unwrap_or(u8::MAX))
    } else if severity < Severity::INFO {
        Level::LOG_DEBUG as u8
    } else if severity == Severity::INFO {
        Level::LOG_INFO as u8
    } else if severity < Severity::WARN {
        Level::LOG_NOTICE as u8
    } else if severity < Severity::ERROR {
        Level::LOG_WARNING as u8
    } else if severity == Severity::ERROR {
        Level::LOG_ERR as u8
    } else if severity.0 == Severity::ERROR.0 + 1 {
        Level::LOG_CRIT as u8
    } else if severity.0 == Severity::ERROR.0 + 2 {
        Level::LOG_ALERT as u8
    } else {
        Level::LOG_EMERG as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_mapping() {
        assert_eq!(priority(Severity::DEBUG), 7);
        assert_eq!(priority(Severity(-1)), 7);
        assert_eq!(priority(Severity::INFO), 6);
        assert_eq!(priority(Severity(1)), 5);
        assert_eq!(priority(Severity(3)), 5);
        assert_eq!(priority(Severity::WARN), 4);
        assert_eq!(priority(Severity(7)), 4);
        assert_eq!(priority(Severity::ERROR), 3);
        assert_eq!(priority(Severity(9)), 2);
        assert_eq!(priority(Severity(10)), 1);
        assert_eq!(priority(Severity(11)), 0);
        assert_eq!(priority(Severity(1000)), 0);
    }

    #[test]
    fn test_priority_below_debug() {
        // One step below the scale: off the end, dropped by the builder.
        assert_eq!(priority(Severity(-5)), 8);
        assert_eq!(priority(Severity(-10)), 13);
        // Saturates instead of wrapping back onto a real priority.
        assert_eq!(priority(Severity(-1000)), u8::MAX);
        assert_eq!(priority(Severity(i32::MIN)), u8::MAX);
    }

    #[test]
    fn test_facility() {
        let _x = Facility::default(); // At least _exercise_ `Default`

        assert_eq!(Facility::new("  api-gateway  ").as_str(), "api-gateway");
        assert!(Facility::new("   ").is_empty());
        assert_eq!(format!("{}", Facility::new("billing")), "billing");
    }

    #[test]
    fn test_hostname() {
        assert_eq!(Hostname::default().as_str().is_empty(), false);
        assert_eq!(Hostname::new("").as_str(), "localhost");
        assert_eq!(Hostname::new(" web01 ").as_str(), "web01");
    }
}
