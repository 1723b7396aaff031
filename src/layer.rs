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

//! [gelf-tracing](crate) [`Layer`] implementations.
//!
//! [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
//!
//! The [`Layer`] here is a thin adapter: it lifts a [`tracing`] [`Event`] into a
//! [`Record`] -- message out of the "message" field, every other field classified into a
//! [`Value`](crate::value::Value) kind, the event's level mapped onto the wide severity
//! scale -- and pushes the formatted result through a [`Transport`]. All the interesting work
//! happens in the [`Formatter`].

use crate::{
    error::Result,
    facility::Severity,
    formatter::{Formatter, Record},
    gelf::Gelf,
    transport::{TcpTransport, Transport, UdpTransport},
    value::{Attr, Value},
};

use chrono::Utc;
use tracing::Event;
use tracing_core::field::{Field, Visit};
use tracing_subscriber::layer::Context;

use std::net::ToSocketAddrs;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                          struct Layer                                          //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A [`tracing-subscriber`]-compliant [`Layer`] implementation that will send [`Event`]s to a
/// GELF collector.
///
/// [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html
/// [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
/// [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
pub struct Layer<S, F: Formatter = Gelf, T: Transport = UdpTransport>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    formatter: F,
    transport: T,
    // I need the Subscriber implementation type as a type parameter to transmit it to the
    // Layer trait implementation. 👇 gets the compiler to shut-up about unused type parameters.
    subscriber_type: std::marker::PhantomData<S>,
}

impl<S, F: Formatter, T: Transport> Layer<S, F, T>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    /// Construct a [`Layer`] from any formatter & transport.
    pub fn new(formatter: F, transport: T) -> Self {
        Layer {
            formatter,
            transport,
            subscriber_type: std::marker::PhantomData,
        }
    }
}

impl<S> Layer<S, Gelf, UdpTransport>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    /// Attempt to construct a [`Layer`] that will send GELF messages via UDP to port 12201 on
    /// localhost, with discovered hostname & facility.
    pub fn try_default() -> Result<Self> {
        Ok(Layer::new(Gelf::default(), UdpTransport::local()?))
    }

    /// Attempt to construct a [`Layer`] that will send GELF messages via UDP to `addr`.
    pub fn udp<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        Ok(Layer::new(Gelf::default(), UdpTransport::new(addr)?))
    }
}

impl<S> Layer<S, Gelf, TcpTransport>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    /// Attempt to construct a [`Layer`] that will send GELF messages via TCP to `addr`.
    pub fn tcp<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        Ok(Layer::new(Gelf::default(), TcpTransport::new(addr)?))
    }
}

fn default_severity_mapping(level: &tracing::Level) -> Severity {
    match *level {
        tracing::Level::TRACE | tracing::Level::DEBUG => Severity::DEBUG,
        tracing::Level::INFO => Severity::INFO,
        tracing::Level::WARN => Severity::WARN,
        tracing::Level::ERROR => Severity::ERROR,
    }
}

/// Collects an [`Event`]'s fields: the conventional "message" field becomes the record's
/// message text, everything else is classified into the closed [`Value`] kind set.
struct GelfVisitor {
    message: Option<String>,
    attrs: Vec<Attr>,
}

impl Visit for GelfVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.attrs.push(Attr::new(field.name(), Value::Float(value)));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.attrs.push(Attr::new(field.name(), Value::Int(value)));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.attrs.push(Attr::new(field.name(), Value::Uint(value)));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.attrs.push(Attr::new(field.name(), Value::Bool(value)));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_owned());
        } else {
            self.attrs
                .push(Attr::new(field.name(), value.to_owned()));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        // Only a borrow is available; snapshot the message text, which is all the encoder
        // would render anyway.
        self.attrs
            .push(Attr::new(field.name(), value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        // The tracing macros "pre-format" the message field so that `value` actually refers
        // to a `std::fmt::Arguments` instance, which will print to a debug format without
        // enclosing double-quotes.
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.attrs
                .push(Attr::new(field.name(), format!("{:?}", value)));
        }
    }
}

/// This is the Big Tuna-- the [`Layer`] implementation.
///
/// [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
impl<S, F, T> tracing_subscriber::layer::Layer<S> for Layer<S, F, T>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    F: Formatter + 'static,
    T: Transport + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = GelfVisitor {
            message: None,
            attrs: Vec::new(),
        };
        event.record(&mut visitor);

        let message = match visitor.message {
            Some(message) => message,
            // An event without a message field has nothing to say to a GELF collector.
            None => return,
        };

        let meta = event.metadata();
        let record = Record {
            severity: default_severity_mapping(meta.level()),
            message: &message,
            timestamp: Some(Utc::now()),
            file: meta.file(),
            line: meta.line(),
            attrs: &visitor.attrs,
        };

        // A failed format or send is dropped on the floor: reporting it through `tracing`
        // would arrive right back here.
        if let Ok(buf) = self.formatter.format(&record) {
            let _ = self.transport.send(&buf);
        }
    }
}
