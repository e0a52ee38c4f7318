// Copyright (C) 2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of gelf-tracing.
//
// gelf-tracing is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// gelf-tracing is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without
// even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with gelf-tracing.  If
// not, see <http://www.gnu.org/licenses/>.

//! [gelf-tracing](crate) [`Layer`] implementation.
//!
//! [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
//!
//! The [`Layer`] turns each [`Event`] into a [`LogRecord`] & hands it to a [`GelfTarget`]. Fields
//! of the spans enclosing the event are merged into the record as ambient context: the event's own
//! fields win over span fields, inner spans win over outer spans, and span fields win over the
//! thread-local [context](crate::context).
//!
//! [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html

use crate::{
    config::TargetConfig,
    error::Result,
    factory::TransportFactory,
    record::LogRecord,
    severity::LogLevel,
    target::GelfTarget,
    tracing::{FieldVisitor, SpanFields},
    transport::{ChunkedUdpTransport, DEFAULT_UDP_DATAGRAM_SIZE},
};

use tracing::{span, Event};
use tracing_subscriber::layer::Context;

// When the tracing-log feature is enabled, use NormalizeEvent to extract file/line metadata
// from events that originated from the `log` crate.
#[cfg(feature = "tracing-log")]
use tracing_log::NormalizeEvent;

use std::net::{Ipv4Addr, SocketAddr};

/// A [`tracing-subscriber`]-compliant [`Layer`] implementation that will send [`Event`]s to a
/// GELF endpoint (Graylog, typically).
///
/// [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html
/// [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
/// [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
pub struct Layer {
    target: GelfTarget,
    capture_backtraces: bool,
}

impl Layer {
    /// Attempt to construct a [`Layer`] that will send GELF messages via UDP to port 12201 on
    /// localhost
    pub fn try_default() -> Result<Self> {
        let transport = ChunkedUdpTransport::connect(
            SocketAddr::new(Ipv4Addr::LOCALHOST.into(), crate::factory::DEFAULT_GELF_PORT),
            DEFAULT_UDP_DATAGRAM_SIZE,
        )?;
        Ok(Layer::with_target(GelfTarget::new(
            TargetConfig::default(),
            Default::default(),
            Some(Box::new(transport)),
        )))
    }
    /// Construct a [`Layer`] from `config`, resolving the endpoint with the system resolver.
    ///
    /// If no transport can be created for the endpoint the reasons are logged & the resulting
    /// [`Layer`] discards every event.
    pub fn open(config: TargetConfig) -> Self {
        Layer::with_target(GelfTarget::open(config, &TransportFactory::default()))
    }
    pub fn with_target(target: GelfTarget) -> Self {
        Layer {
            target,
            capture_backtraces: false,
        }
    }
    /// Attach a backtrace of the logging thread to errors recorded on events
    pub fn with_backtraces(mut self, capture: bool) -> Self {
        self.capture_backtraces = capture;
        self
    }
    pub fn target(&self) -> &GelfTarget {
        &self.target
    }
}

/// The internal diagnostics of this crate must never be shipped through itself.
fn is_own_event(target: &str) -> bool {
    const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");
    target == OWN_TARGET
        || target
            .strip_prefix(OWN_TARGET)
            .is_some_and(|rest| rest.starts_with("::"))
}

impl<S> tracing_subscriber::layer::Layer<S> for Layer
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            let mut visitor = FieldVisitor::for_span();
            attrs.record(&mut visitor);
            span.extensions_mut()
                .insert(SpanFields::new(visitor.into_properties()));
        }
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            let mut visitor = FieldVisitor::for_span();
            values.record(&mut visitor);
            let mut extensions = span.extensions_mut();
            match extensions.get_mut::<SpanFields>() {
                Some(fields) => fields.merge(visitor.into_properties()),
                None => extensions.insert(SpanFields::new(visitor.into_properties())),
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        // For events that originated from the `log` crate, normalized_metadata() recovers the
        // logger name & file/line; for native tracing events it returns None.
        #[cfg(feature = "tracing-log")]
        let normalized_meta = event.normalized_metadata();
        #[cfg(feature = "tracing-log")]
        let meta = normalized_meta.as_ref().unwrap_or_else(|| event.metadata());
        #[cfg(not(feature = "tracing-log"))]
        let meta = event.metadata();

        if is_own_event(meta.target()) {
            return;
        }

        let mut visitor = FieldVisitor::for_event();
        event.record(&mut visitor);
        if self.capture_backtraces {
            visitor.capture_backtrace();
        }

        let mut record: LogRecord = visitor
            .into_record(LogLevel::from(*meta.level()))
            .with_logger_name(meta.target());
        if let (Some(file), Some(line)) = (meta.file(), meta.line()) {
            record = record.with_stack_frame(file, line);
        }

        // Innermost span first, so that inner values shadow outer ones
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    for (key, value) in fields.properties().iter() {
                        record.properties_mut().insert_if_absent(key, value.clone());
                    }
                }
            }
        }

        self.target.write(record);
    }
}
