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

//! Pooled byte buffers with GELF-flavored write methods.
//!
//! Every encode-and-send operation borrows a [`Buffer`] from a [`BufferPool`] for its duration;
//! the buffer is returned on drop, success or failure alike. Pools are plain values owned by
//! the formatter or transport that uses them, not process-wide statics, so two independent
//! loggers never contend on one free list.

use crate::error::{Error, Result};

use backtrace::Backtrace;
use bytes::BufMut;

use std::{
    io::{self, Write},
    ops::Deref,
    sync::{Mutex, PoisonError},
};

/// Having an initial size gives a dramatic speedup.
const INITIAL_CAPACITY: usize = 1024;

/// To reduce peak allocation, only buffers at or below this capacity return to the pool.
const MAX_POOLED_CAPACITY: usize = 16 << 10;

/// A thread-safe free list of byte buffers.
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub fn new() -> BufferPool {
        BufferPool {
            free: Mutex::new(Vec::new()),
        }
    }

    /// Borrow a buffer for the duration of one encode-and-send operation.
    pub fn acquire(&self) -> Buffer<'_> {
        let bytes = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(INITIAL_CAPACITY));
        Buffer { pool: self, bytes }
    }

    fn release(&self, mut bytes: Vec<u8>) {
        if bytes.capacity() <= MAX_POOLED_CAPACITY {
            bytes.clear();
            self.free
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(bytes);
        }
    }
}

impl std::default::Default for BufferPool {
    fn default() -> Self {
        BufferPool::new()
    }
}

/// A byte buffer on loan from a [`BufferPool`]; dereferences to `[u8]`.
///
/// Dropping the guard returns the bytes to the pool, so early returns and `?` propagation
/// cannot leak a pooled buffer.
pub struct Buffer<'a> {
    pool: &'a BufferPool,
    bytes: Vec<u8>,
}

impl Buffer<'_> {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.bytes.truncate(len);
    }

    pub(crate) fn write_str(&mut self, s: &str) {
        self.bytes.put_slice(s.as_bytes());
    }

    pub(crate) fn write_byte(&mut self, b: u8) {
        self.bytes.put_u8(b);
    }

    /// Write `s` as a JSON string literal, quotes and escapes included.
    pub(crate) fn write_quoted(&mut self, s: &str) -> Result<()> {
        serde_json::to_writer(&mut self.bytes, s).map_err(|err| Error::Encoding {
            source: Box::new(err),
            back: Backtrace::new(),
        })
    }

    pub(crate) fn write_int(&mut self, v: i64) {
        let _ = write!(self.bytes, "{}", v); // infallible for Vec
    }

    pub(crate) fn write_uint(&mut self, v: u64) {
        let _ = write!(self.bytes, "{}", v);
    }

    /// Booleans are encoded as the *strings* `"true"`/`"false"`, not JSON booleans, so a field
    /// first indexed as a string by the collector keeps accepting later values.
    pub(crate) fn write_bool(&mut self, v: bool) {
        self.write_str(if v { r#""true""# } else { r#""false""# });
    }

    /// Write a float as a JSON number, except for the non-finite values JSON cannot carry:
    /// those become the strings `"+Inf"`, `"-Inf"` & `"NaN"`.
    pub(crate) fn write_float(&mut self, v: f64) -> Result<()> {
        if v.is_infinite() {
            self.write_str(if v > 0.0 { r#""+Inf""# } else { r#""-Inf""# });
            Ok(())
        } else if v.is_nan() {
            self.write_str(r#""NaN""#);
            Ok(())
        } else {
            serde_json::to_writer(&mut self.bytes, &v).map_err(|err| Error::Encoding {
                source: Box::new(err),
                back: Backtrace::new(),
            })
        }
    }

    pub(crate) fn write_json(&mut self, v: &serde_json::Value) -> Result<()> {
        serde_json::to_writer(&mut self.bytes, v).map_err(|err| Error::Encoding {
            source: Box::new(err),
            back: Backtrace::new(),
        })
    }
}

impl Drop for Buffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.bytes));
    }
}

impl Deref for Buffer<'_> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl io::Write for Buffer<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.put_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_release() {
        let pool = BufferPool::new();
        {
            let mut buf = pool.acquire();
            buf.write_str("hello");
            assert_eq!(&*buf, b"hello");
        }
        // The buffer went back to the pool and comes out empty.
        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert!(buf.bytes.capacity() >= INITIAL_CAPACITY);
    }

    #[test]
    fn test_oversized_buffers_are_dropped() {
        let pool = BufferPool::new();
        {
            let mut buf = pool.acquire();
            buf.write_str(&"x".repeat(MAX_POOLED_CAPACITY * 2));
        }
        assert!(pool
            .free
            .lock()
            .unwrap()
            .iter()
            .all(|b| b.capacity() <= MAX_POOLED_CAPACITY));
    }

    #[test]
    fn test_write_methods() {
        let pool = BufferPool::new();
        let mut buf = pool.acquire();
        buf.write_int(-42);
        buf.write_byte(b' ');
        buf.write_uint(42);
        buf.write_byte(b' ');
        buf.write_bool(true);
        buf.write_quoted("say \"hi\"\n").unwrap();
        assert_eq!(
            std::str::from_utf8(&buf).unwrap(),
            r#"-42 42 "true""say \"hi\"\n""#
        );
    }

    #[test]
    fn test_write_float() {
        let pool = BufferPool::new();
        let mut buf = pool.acquire();
        buf.write_float(1.5).unwrap();
        buf.write_byte(b' ');
        buf.write_float(f64::INFINITY).unwrap();
        buf.write_byte(b' ');
        buf.write_float(f64::NEG_INFINITY).unwrap();
        buf.write_byte(b' ');
        buf.write_float(f64::NAN).unwrap();
        assert_eq!(
            std::str::from_utf8(&buf).unwrap(),
            r#"1.5 "+Inf" "-Inf" "NaN""#
        );
    }
}
