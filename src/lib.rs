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

//! A [`tracing-subscriber`] [`Layer`] implementation for sending [`tracing`] [`Event`]s to a
//! [Graylog] collector in [GELF]
//!
//! [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html
//! [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
//! [`tracing`]: https://docs.rs/tracing/0.1.35/tracing/index.html
//! [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
//! [Graylog]: https://graylog.org
//! [GELF]: https://go2docs.graylog.org/current/getting_in_log_data/gelf.html
//!
//! # Introduction
//!
//! GELF -- the Graylog Extended Log Format -- is a JSON log message schema with a companion wire
//! convention: NUL-delimited messages over TCP, or gzip-compressed (and, past one datagram's
//! worth, chunked) messages over UDP. It exists because classic syslog gives you exactly one
//! line of unstructured text; a GELF record carries the message *and* any number of typed
//! custom fields, which a collector indexes and makes searchable.
//!
//! This crate splits the work of getting a [`tracing`] event onto that wire into three pieces,
//! each replaceable on its own:
//!
//! 1. the [`Layer`](layer::Layer) lifts a [`tracing`] [`Event`] into a flat
//!    [`Record`](formatter::Record) of severity, message & attributes;
//!
//! 2. a [`Formatter`](formatter::Formatter) -- in practice [`Gelf`](gelf::Gelf) -- encodes the
//!    record into one JSON payload, writing into a buffer on loan from a pool rather than
//!    allocating per message;
//!
//! 3. a [`Transport`](transport::Transport) -- [`TcpTransport`](transport::TcpTransport),
//!    [`UdpTransport`](transport::UdpTransport), or a [`Broadcast`](transport::Broadcast) of
//!    several -- moves the finished payload, blocking on the caller's thread.
//!
//! There is deliberately no machinery beyond that: no retry, no reconnection, no batching, no
//! background queue. A failed send surfaces to the caller (and is *not* logged internally,
//! which would recurse); what a lost log message is worth is the application's call.
//!
//! # Usage
//!
//! ```no_run
//! use gelf_tracing::layer::Layer;
//! use tracing::info;
//! use tracing_subscriber::layer::SubscriberExt; // Needed to get `with()`
//! use tracing_subscriber::registry::Registry;
//!
//! // Send GELF messages via UDP to port 12201 on localhost, with discovered
//! // hostname & facility.
//! let subscriber = Registry::default().with(Layer::try_default().unwrap());
//! let _guard = tracing::subscriber::set_default(subscriber);
//!
//! info!(elapsed_ms = 17, "Hello, world!");
//! ```
//!
//! Produces a message like:
//!
//! ```text
//! {"version":"1.1","host":"bree.local","short_message":"Hello, world!",
//!  "timestamp":1722525902.637,"level":6,"_facility":"my-app","_elapsed_ms":17}
//! ```
//!
//! The formatter & transport are configurable:
//!
//! ```no_run
//! use gelf_tracing::{gelf::Gelf, layer::Layer, transport::TcpTransport, value::Attr};
//! use tracing_subscriber::layer::SubscriberExt;
//! use tracing_subscriber::registry::Registry;
//!
//! let formatter = Gelf::builder()
//!     .facility_as_string("billing".to_string())
//!     .attr(Attr::new("region", "eu-central-1"))
//!     .build();
//! let transport = TcpTransport::new("graylog.internal:12201").unwrap();
//! let subscriber = Registry::default().with(Layer::new(formatter, transport));
//! ```

pub mod buffer;
pub mod error;
pub mod facility;
pub mod formatter;
pub mod gelf;
pub mod layer;
pub mod transport;
pub mod value;

mod attrs;
mod truncate;
