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

//! The GELF transport layer.
//!
//! This module defines the [`Transport`] trait that all implementations must support, as well
//! as the TCP & UDP implementations.
//!
//! GELF collectors speak two framings. Over TCP, messages travel uncompressed, back-to-back,
//! each terminated by a single NUL byte (newline framing exists in the wild but NUL is what
//! Graylog's TCP input expects for GELF). Over UDP, the message is gzip-compressed and, when
//! the compressed payload exceeds one datagram's worth (8192 bytes -- some Graylog components
//! are limited to processing that much), split into up to 128 chunks, each carrying a 12-byte
//! header: the magic bytes `0x1E 0x0F`, an 8-byte random message ID shared by every chunk of
//! the message, a sequence number and a sequence count. The collector reassembles by message
//! ID and discards chunk sets that do not complete within 5 seconds; the sender neither waits
//! nor retries.
//!
//! # Examples
//!
//! To send GELF messages over UDP to a collector listening on port 12201 (the default) on
//! localhost:
//!
//! ```no_run
//! use gelf_tracing::transport::UdpTransport;
//! let transpo = UdpTransport::local().unwrap();
//! ```
//!
//! On a non-standard port on another host:
//!
//! ```no_run
//! use gelf_tracing::transport::UdpTransport;
//! let transpo = UdpTransport::new("some-host.domain.io:12202");
//! ```

use crate::{
    buffer::BufferPool,
    error::{Error, Result},
};

use backtrace::Backtrace;
use libflate::gzip;
use rand::Rng;

use std::{
    io::Write,
    net::{TcpStream, ToSocketAddrs, UdpSocket},
    sync::{Mutex, PoisonError},
};

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                      transport mechanisms                                      //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Operations all transport layers must support.
///
/// An empty buffer is a no-op for every implementation: the formatter produces empty output
/// for records it refuses (e.g. severities below the syslog scale), and those must not reach
/// the wire as empty datagrams or bare NUL bytes.
pub trait Transport {
    /// Send one finished message on this transport mechanism; returns the number of bytes
    /// handed to the socket. A failed send is failed -- there is no retry, no reconnection and
    /// no buffering here; the caller decides what a lost message is worth.
    fn send(&self, buf: &[u8]) -> Result<usize>;
}

/// Chunked GELF magic bytes.
const MAGIC: [u8; 2] = [0x1e, 0x0f];
/// Some Graylog components are limited to processing up to 8192 bytes.
const MAX_DATAGRAM: usize = 8192;
/// Magic (2) + message ID (8) + sequence number (1) + sequence count (1).
const CHUNK_HEADER: usize = 12;
/// A message MUST NOT consist of more than 128 chunks.
const MAX_CHUNKS: usize = 128;

/// Number of chunks needed for a compressed payload of `size` bytes.
fn chunk_count(size: usize) -> usize {
    (size - 1) / (MAX_DATAGRAM - CHUNK_HEADER) + 1
}

/// Sending GELF messages over a TCP stream, NUL-framed.
pub struct TcpTransport {
    // `write`ing a stream takes `&mut self`, and concurrent callers' messages must not
    // interleave on the wire, so the stream lives behind a mutex.
    socket: Mutex<TcpStream>,
}

impl TcpTransport {
    /// Construct a [`Transport`] implementation via TCP at `addr`.
    pub fn new<A: ToSocketAddrs>(addr: A) -> Result<TcpTransport> {
        Ok(TcpTransport {
            socket: Mutex::new(TcpStream::connect(addr).map_err(|err| Error::Transport {
                source: Box::new(err),
                back: Backtrace::new(),
            })?),
        })
    }
    /// Construct a [`Transport`] implementation via TCP at localhost:12201
    pub fn local() -> Result<TcpTransport> {
        TcpTransport::new("localhost:12201")
    }
}

impl Transport for TcpTransport {
    fn send(&self, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut socket = self.socket.lock().unwrap_or_else(PoisonError::into_inner);
        socket.write_all(buf).map_err(|err| Error::Transport {
            source: Box::new(err),
            back: Backtrace::new(),
        })?;
        socket.write_all(&[0]).map_err(|err| Error::Transport {
            source: Box::new(err),
            back: Backtrace::new(),
        })?;
        socket.flush().map_err(|err| Error::Transport {
            source: Box::new(err),
            back: Backtrace::new(),
        })?;
        Ok(buf.len() + 1)
    }
}

/// Sending GELF messages via UDP datagrams, gzip-compressed and chunked as needed.
pub struct UdpTransport {
    socket: UdpSocket,
    // A datagram send is atomic, but the chunks of one message must go out as an unbroken
    // sequence; this serializes whole messages rather than single datagrams.
    write: Mutex<()>,
    pool: BufferPool,
}

impl UdpTransport {
    /// Construct a [`Transport`] implementation via UDP at `addr`.
    pub fn new<A: ToSocketAddrs>(addr: A) -> Result<UdpTransport> {
        // Bind to any available port...
        let socket = UdpSocket::bind("0.0.0.0:0").map_err(|err| Error::Transport {
            source: Box::new(err),
            back: Backtrace::new(),
        })?;
        // and connect to the collector at `addr`:
        socket.connect(addr).map_err(|err| Error::Transport {
            source: Box::new(err),
            back: Backtrace::new(),
        })?;
        Ok(UdpTransport {
            socket,
            write: Mutex::new(()),
            pool: BufferPool::new(),
        })
    }
    /// Construct a [`Transport`] implementation via UDP at localhost:12201
    pub fn local() -> Result<UdpTransport> {
        UdpTransport::new("localhost:12201")
    }
}

impl Transport for UdpTransport {
    fn send(&self, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        // Compress message
        let mut compressed = self.pool.acquire();
        let mut encoder =
            gzip::Encoder::new(&mut compressed).map_err(|err| Error::Transport {
                source: Box::new(err),
                back: Backtrace::new(),
            })?;
        encoder.write_all(buf).map_err(|err| Error::Transport {
            source: Box::new(err),
            back: Backtrace::new(),
        })?;
        encoder
            .finish()
            .into_result()
            .map_err(|err| Error::Transport {
                source: Box::new(err),
                back: Backtrace::new(),
            })?;

        let _guard = self.write.lock().unwrap_or_else(PoisonError::into_inner);

        if compressed.len() <= MAX_DATAGRAM {
            return self.socket.send(&compressed).map_err(|err| Error::Transport {
                source: Box::new(err),
                back: Backtrace::new(),
            });
        }

        let count = chunk_count(compressed.len());
        if count > MAX_CHUNKS {
            // All-or-nothing: nothing has been written yet, and nothing will be.
            return Err(Error::MessageTooLarge {
                size: compressed.len(),
                back: Backtrace::new(),
            });
        }

        let mut datagram = [0u8; MAX_DATAGRAM];
        datagram[..2].copy_from_slice(&MAGIC);
        // Message ID - 8 bytes: must be the same for every chunk of this message; the
        // collector reassembles by it.
        rand::thread_rng().fill(&mut datagram[2..10]);
        datagram[11] = count as u8;

        let mut sent = 0;
        for (seq, chunk) in compressed.chunks(MAX_DATAGRAM - CHUNK_HEADER).enumerate() {
            datagram[10] = seq as u8;
            datagram[CHUNK_HEADER..CHUNK_HEADER + chunk.len()].copy_from_slice(chunk);
            sent += self
                .socket
                .send(&datagram[..CHUNK_HEADER + chunk.len()])
                .map_err(|err| Error::Transport {
                    source: Box::new(err),
                    back: Backtrace::new(),
                })?;
        }
        Ok(sent)
    }
}

/// Fan one message out to several transports.
///
/// Every inner transport is attempted, whatever happens to the ones before it; the first
/// error (if any) is returned once all have been tried.
pub struct Broadcast {
    transports: Vec<Box<dyn Transport + Send + Sync>>,
}

impl Broadcast {
    pub fn new() -> Broadcast {
        Broadcast {
            transports: Vec::new(),
        }
    }
    pub fn push<T: Transport + Send + Sync + 'static>(mut self, transport: T) -> Broadcast {
        self.transports.push(Box::new(transport));
        self
    }
}

impl std::default::Default for Broadcast {
    fn default() -> Self {
        Broadcast::new()
    }
}

impl Transport for Broadcast {
    fn send(&self, buf: &[u8]) -> Result<usize> {
        let mut first_err = None;
        for transport in &self.transports {
            if let Err(err) = transport.send(buf) {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(buf.len()),
        }
    }
}
