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

//! Primitives for mapping [`tracing`] entities to [`LogRecord`]s.
//!
//! [`FieldVisitor`] walks the fields of an [`Event`] (or a [`Span`]) & sorts them into the pieces
//! of a [`LogRecord`]:
//!
//! - the `message` field becomes the record's formatted message
//! - every other field becomes a property of the same name, and (in the order recorded) a
//!   format parameter
//! - a field recorded as an error (via [`Visit::record_error`]) additionally becomes the record's
//!   exception, with its [`source`] chain as the inner exceptions
//!
//! Fields of spans are kept in the span's extensions as [`SpanFields`], where the layer picks
//! them up for every event inside the span.
//!
//! [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
//! [`Span`]: https://docs.rs/tracing/0.1.35/tracing/struct.Span.html
//! [`Visit::record_error`]: tracing::field::Visit::record_error
//! [`source`]: std::error::Error::source

use crate::{
    exception::ExceptionInfo,
    record::{LogRecord, Properties},
    severity::LogLevel,
};

use backtrace::Backtrace;
use serde_json::{json, Value};
use tracing::field::{Field, Visit};

/// Name of the field into which the `tracing` macros place the formatted message.
pub const MESSAGE_FIELD: &str = "message";

/// The fields recorded on a span so far.
#[derive(Clone, Debug, Default)]
pub struct SpanFields(Properties);

impl SpanFields {
    pub fn new(properties: Properties) -> SpanFields {
        SpanFields(properties)
    }
    pub fn properties(&self) -> &Properties {
        &self.0
    }
    /// Fold in fields recorded after the span was created; later values replace earlier ones.
    pub fn merge(&mut self, properties: Properties) {
        for (key, value) in properties.iter() {
            self.0.insert(key, value.clone());
        }
    }
}

/// Collects the fields of an event or span.
#[derive(Debug, Default)]
pub struct FieldVisitor {
    // Spans have no message; there, a "message" field is just another property
    capture_message: bool,
    message: Option<String>,
    properties: Properties,
    parameters: Vec<Value>,
    exception: Option<ExceptionInfo>,
}

impl FieldVisitor {
    pub fn for_event() -> FieldVisitor {
        FieldVisitor {
            capture_message: true,
            ..Default::default()
        }
    }
    pub fn for_span() -> FieldVisitor {
        FieldVisitor::default()
    }
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
    pub fn properties(&self) -> &Properties {
        &self.properties
    }
    pub fn into_properties(self) -> Properties {
        self.properties
    }
    /// Attach a backtrace of the current thread to the recorded error, if there is one & it
    /// doesn't already carry a stack trace.
    pub fn capture_backtrace(&mut self) {
        if let Some(exception) = self.exception.take() {
            self.exception = Some(match exception.stack_trace() {
                Some(_) => exception,
                None => exception.with_stack_trace(format!("{:?}", Backtrace::new())),
            });
        }
    }
    /// Turn what's been collected into a record logged now at `level`.
    pub fn into_record(self, level: LogLevel) -> LogRecord {
        let mut record = match self.message {
            Some(message) => LogRecord::new(level, message),
            None => LogRecord::without_message(level),
        };
        if let Some(exception) = self.exception {
            record = record.with_exception(exception);
        }
        for (key, value) in self.properties.iter() {
            record.properties_mut().insert(key, value.clone());
        }
        self.parameters
            .into_iter()
            .fold(record, |record, parameter| record.with_parameter(parameter))
    }

    fn is_message(&self, field: &Field) -> bool {
        self.capture_message && field.name() == MESSAGE_FIELD
    }
    fn add(&mut self, field: &Field, value: Value) {
        if is_log_metadata(field) {
            return;
        }
        self.properties.insert(field.name(), value.clone());
        self.parameters.push(value);
    }
    fn add_text(&mut self, field: &Field, text: String) {
        if is_log_metadata(field) {
            return;
        }
        // Text that is a JSON object (`%json!(...)`, say) is an object as far as parameter
        // promotion is concerned
        let parameter = if text.trim_start().starts_with('{') {
            match serde_json::from_str::<Value>(&text) {
                Ok(object @ Value::Object(_)) => object,
                _ => Value::String(text.clone()),
            }
        } else {
            Value::String(text.clone())
        };
        self.properties.insert(field.name(), Value::String(text));
        self.parameters.push(parameter);
    }
}

/// `tracing-log` describes the originating `log` record in fields of its own; the layer gets the
/// same information from the normalized metadata.
fn is_log_metadata(field: &Field) -> bool {
    cfg!(feature = "tracing-log") && field.name().starts_with("log.")
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        // The tracing macros pre-format the `message` field into a `std::fmt::Arguments`, whose
        // Debug representation has no enclosing quotes.
        let text = format!("{:?}", value);
        if self.is_message(field) {
            self.message = Some(text);
        } else {
            self.add_text(field, text);
        }
    }
    fn record_str(&mut self, field: &Field, value: &str) {
        if self.is_message(field) {
            self.message = Some(value.to_string());
        } else {
            self.add_text(field, value.to_string());
        }
    }
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.add(field, json!(value));
    }
    fn record_u64(&mut self, field: &Field, value: u64) {
        self.add(field, json!(value));
    }
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.add(field, json!(value));
    }
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.add(field, json!(value));
    }
    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.exception = Some(ExceptionInfo::from_dyn_error(value));
        self.add(field, Value::String(value.to_string()));
    }
}
