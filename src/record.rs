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

//! The log record: the input to GELF conversion.
//!
//! A [`LogRecord`] is what a logging call produces before any GELF-specific processing: a
//! timestamp, a level, the formatted message, optionally an error & the source location of the
//! call, an insertion-ordered bag of named [`Properties`] and the raw format parameters.

use crate::{exception::ExceptionInfo, severity::LogLevel};

use chrono::prelude::*;
use serde_json::Value;

/// The source location of a logging call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackFrame {
    pub file: String,
    pub line: u32,
}

/// Named values attached to a [`LogRecord`], kept in insertion order.
///
/// Keys are unique & compared exactly (case-sensitively).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Properties(Vec<(String, Value)>);

impl Properties {
    pub fn new() -> Properties {
        Properties::default()
    }
    /// Set `key` to `value`, replacing (in place) any previous value.
    pub fn insert<K: Into<String>>(&mut self, key: K, value: Value) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.0.push((key, value)),
        }
    }
    /// Set `key` to `value` only if `key` is not already present; returns whether it was set.
    pub fn insert_if_absent<K: Into<String>>(&mut self, key: K, value: Value) -> bool {
        let key = key.into();
        if self.contains_key(&key) {
            false
        } else {
            self.0.push((key, value));
            true
        }
    }
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let idx = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(idx).1)
    }
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> std::iter::FromIterator<(K, Value)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut props = Properties::new();
        for (k, v) in iter {
            props.insert(k, v);
        }
        props
    }
}

/// A single logging call, as seen by the GELF converter.
#[derive(Clone, Debug)]
pub struct LogRecord {
    timestamp: DateTime<Utc>,
    level: LogLevel,
    message: Option<String>,
    logger_name: Option<String>,
    exception: Option<ExceptionInfo>,
    stack_frame: Option<StackFrame>,
    properties: Properties,
    parameters: Vec<Value>,
    promoted: Vec<Value>,
}

impl LogRecord {
    /// A record logged "now" at `level` with the formatted message `message`.
    pub fn new<M: Into<String>>(level: LogLevel, message: M) -> LogRecord {
        LogRecord {
            timestamp: Utc::now(),
            level,
            message: Some(message.into()),
            logger_name: None,
            exception: None,
            stack_frame: None,
            properties: Properties::new(),
            parameters: Vec::new(),
            promoted: Vec::new(),
        }
    }
    /// A record that carries no formatted message; such records are never converted.
    pub fn without_message(level: LogLevel) -> LogRecord {
        let mut record = LogRecord::new(level, "");
        record.message = None;
        record
    }
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
    pub fn with_logger_name<S: Into<String>>(mut self, name: S) -> Self {
        self.logger_name = Some(name.into());
        self
    }
    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }
    pub fn with_stack_frame(mut self, file: &str, line: u32) -> Self {
        self.stack_frame = Some(StackFrame {
            file: file.to_string(),
            line,
        });
        self
    }
    pub fn with_property<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.properties.insert(key, value);
        self
    }
    pub fn with_parameter(mut self, parameter: Value) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
    pub fn level(&self) -> LogLevel {
        self.level
    }
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
    pub fn logger_name(&self) -> Option<&str> {
        self.logger_name.as_deref()
    }
    pub fn exception(&self) -> Option<&ExceptionInfo> {
        self.exception.as_ref()
    }
    pub fn stack_frame(&self) -> Option<&StackFrame> {
        self.stack_frame.as_ref()
    }
    pub fn properties(&self) -> &Properties {
        &self.properties
    }
    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }
    /// The raw format parameters of the logging call, in order.
    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }
    /// Ask that `object`'s own members be shipped as additional fields.
    pub fn promote_object(&mut self, object: Value) {
        self.promoted.push(object);
    }
    pub fn promoted(&self) -> &[Value] {
        &self.promoted
    }
}
