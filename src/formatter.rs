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

//! Message formatting primitives.
//!
//! This module defines the [`Formatter`] trait and the [`Record`] it consumes.

use crate::{facility::Severity, value::Attr};

use chrono::{DateTime, Utc};

use std::ops::Deref;

/// One log record, as handed to a [`Formatter`]: severity, message text, timestamp and an
/// ordered set of attributes, plus the source location when the caller has it.
///
/// The record borrows everything; it is assembled on the stack per log call and never outlives
/// the call.
pub struct Record<'a> {
    pub severity: Severity,
    pub message: &'a str,
    /// `None` means "no timestamp"; the field is omitted from the message.
    pub timestamp: Option<DateTime<Utc>>,
    pub file: Option<&'a str>,
    pub line: Option<u32>,
    pub attrs: &'a [Attr],
}

/// Operations all formatters must support
/// ======================================
///
/// Shipping a log record happens in two parts: encoding the record into a wire payload, and
/// transporting that payload to a collector. [`Formatter`] is the first part.
///
/// # Design
///
/// The associated type `Output` is designed to make illegal states unrepresentable. If the
/// [`Transport`] trait simply took, say, a slice of `u8` then callers could mistakenly pass
/// _anything_ to it (a little endian binary representation of a `u32`, `[0; 1204]` or any silly
/// thing). I would like to enforce the rule that "The thing passed to the [`Transport`] trait
/// must have been returned from a [`Formatter`] implementation." Hence the associated type, and
/// the constraint that it be dereferenceable to a slice of `u8` (to enable the [`Transport`]
/// implementation to deal with it). The lifetime parameter lets an implementation hand back a
/// buffer on loan from its own pool; the loan ends when the caller drops the output.
///
/// [`Transport`]: crate::transport::Transport
pub trait Formatter {
    type Error: std::error::Error;
    type Output<'a>: Deref<Target = [u8]>
    where
        Self: 'a;
    fn format(&self, record: &Record) -> std::result::Result<Self::Output<'_>, Self::Error>;
}
