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

//! Converting [`LogRecord`]s to [`GelfDocument`]s.
//!
//! [`GelfConverter`] is the heart of the crate: given a record it decides whether the record is
//! shipped at all, fills in the fixed GELF fields, and turns the record's properties (plus any
//! error it carries & the ambient context) into additional fields.

use crate::{
    context::{AmbientContext, ThreadLocalContext},
    exception::flatten,
    gelf::{AdditionalField, GelfDocument, Timestamp},
    record::LogRecord,
};

use serde_json::Value;

/// Used when no facility has been configured; GELF requires one.
pub const DEFAULT_FACILITY: &str = "GELF";
pub const DEFAULT_MAX_NESTED_EXCEPTIONS_DEPTH: usize = 10;

/// Builds [`GelfDocument`]s from [`LogRecord`]s.
pub struct GelfConverter {
    hostname: String,
    facility: Option<String>,
    max_nested_exceptions_depth: usize,
    ambient: Box<dyn AmbientContext + Send + Sync>,
}

impl std::default::Default for GelfConverter {
    fn default() -> Self {
        GelfConverter {
            hostname: crate::dns::local_hostname(),
            facility: None,
            max_nested_exceptions_depth: DEFAULT_MAX_NESTED_EXCEPTIONS_DEPTH,
            ambient: Box::new(ThreadLocalContext),
        }
    }
}

pub struct GelfConverterBuilder {
    imp: GelfConverter,
}

impl GelfConverterBuilder {
    pub fn hostname<S: Into<String>>(mut self, hostname: S) -> Self {
        self.imp.hostname = hostname.into();
        self
    }
    pub fn facility<S: Into<String>>(mut self, facility: S) -> Self {
        self.imp.facility = Some(facility.into());
        self
    }
    pub fn max_nested_exceptions_depth(mut self, depth: usize) -> Self {
        self.imp.max_nested_exceptions_depth = depth;
        self
    }
    pub fn ambient_context<C: AmbientContext + Send + Sync + 'static>(mut self, ctx: C) -> Self {
        self.imp.ambient = Box::new(ctx);
        self
    }
    pub fn build(self) -> GelfConverter {
        self.imp
    }
}

impl GelfConverter {
    pub fn builder() -> GelfConverterBuilder {
        GelfConverterBuilder {
            imp: GelfConverter::default(),
        }
    }

    /// The facility that will be stamped on documents.
    pub fn facility(&self) -> &str {
        match self.facility.as_deref() {
            Some(facility) if !facility.is_empty() => facility,
            _ => DEFAULT_FACILITY,
        }
    }

    /// Build the GELF document for `record`.
    ///
    /// Returns `None` for records that carry no formatted message or were logged at
    /// [`LogLevel::Off`]. Note that this adds properties to `record` along the way: the details
    /// of any error it carries (`ExceptionSource`, `ExceptionMessage` & `StackTrace`), its
    /// `LoggerName` & any ambient context values it doesn't already have.
    ///
    /// [`LogLevel::Off`]: crate::severity::LogLevel::Off
    pub fn convert(&self, record: &mut LogRecord) -> Option<GelfDocument> {
        let message = record.message()?.to_string();
        let severity = record.level().severity()?;

        if let Some(exception) = record.exception() {
            let (detail, stack) = flatten(exception, self.max_nested_exceptions_depth);
            let source = exception
                .source()
                .map(|s| Value::String(s.to_string()))
                .unwrap_or(Value::Null);
            let props = record.properties_mut();
            props.insert("ExceptionSource", source);
            props.insert("ExceptionMessage", Value::String(detail));
            props.insert("StackTrace", Value::String(stack));
        }

        let mut doc = GelfDocument::new(
            &self.hostname,
            &message,
            Timestamp::from(record.timestamp()),
            severity,
            self.facility(),
        );
        if let Some(frame) = record.stack_frame() {
            doc = doc.with_location(&frame.file, frame.line);
        }

        if let Some(name) = record.logger_name().map(str::to_string) {
            record
                .properties_mut()
                .insert_if_absent("LoggerName", Value::String(name));
        }
        // The record's own properties always win over the ambient context
        for (key, value) in self.ambient.properties().iter() {
            record.properties_mut().insert_if_absent(key, value.clone());
        }

        for (key, value) in record.properties().iter() {
            doc.add_field(AdditionalField::Value {
                key: key.to_string(),
                value: value.clone(),
            });
        }
        for object in record.promoted() {
            doc.add_field(AdditionalField::PromoteObject(object.clone()));
        }

        Some(doc)
    }
}
