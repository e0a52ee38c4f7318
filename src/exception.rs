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

//! Flattening chains of nested errors.
//!
//! A GELF message has room for exactly one "exception message" and one "stack trace" (we ship
//! them as the additional fields `_ExceptionMessage` & `_StackTrace`), but errors nest: an
//! [`ExceptionInfo`] may wrap an inner [`ExceptionInfo`], which may wrap another, and so on.
//! [`flatten`] renders a bounded prefix of such a chain into one string of each kind.

/// Placed between the `"{type}: {message}"` renderings of successive errors in the chain.
pub const MESSAGE_SEPARATOR: &str = " ---> ";
/// Placed (on its own line) after the stack trace of each inner error.
pub const STACK_TRACE_SEPARATOR: &str = "--- Inner exception stack trace ---";

/// An error (or "exception") attached to a log record, together with whatever it wraps.
#[derive(Clone, Debug, PartialEq)]
pub struct ExceptionInfo {
    type_name: String,
    message: String,
    source: Option<String>,
    stack_trace: Option<String>,
    inner: Option<Box<ExceptionInfo>>,
}

impl ExceptionInfo {
    pub fn new<T: Into<String>, M: Into<String>>(type_name: T, message: M) -> ExceptionInfo {
        ExceptionInfo {
            type_name: type_name.into(),
            message: message.into(),
            source: None,
            stack_trace: None,
            inner: None,
        }
    }
    /// The component from which the error originated (shipped as `_ExceptionSource`).
    pub fn with_source<S: Into<String>>(mut self, source: S) -> Self {
        self.source = Some(source.into());
        self
    }
    pub fn with_stack_trace<S: Into<String>>(mut self, stack_trace: S) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }
    pub fn with_inner(mut self, inner: ExceptionInfo) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }
    /// Build an [`ExceptionInfo`] chain from a concrete error & its [`source`] chain.
    ///
    /// The outermost error is named by its Rust type; see [`ExceptionInfo::from_dyn_error`] for
    /// how the errors it wraps are named.
    ///
    /// [`source`]: std::error::Error::source
    pub fn from_error<E: std::error::Error + 'static>(err: &E) -> ExceptionInfo {
        let mut info = ExceptionInfo::from_dyn_error(err);
        info.type_name = std::any::type_name::<E>().to_string();
        info
    }
    /// Build an [`ExceptionInfo`] chain from a type-erased error & its [`source`] chain.
    ///
    /// Rust offers no way to recover the concrete type behind a `dyn Error`, so each error in the
    /// chain is named after the leading identifier of its [`Debug`] representation (which, for
    /// derived implementations, is the type or variant name). Errors whose [`Debug`] output
    /// doesn't start with an identifier are simply called "Error".
    ///
    /// [`source`]: std::error::Error::source
    /// [`Debug`]: std::fmt::Debug
    pub fn from_dyn_error(err: &(dyn std::error::Error + 'static)) -> ExceptionInfo {
        let mut chain = vec![ExceptionInfo::new(debug_type_name(err), err.to_string())];
        let mut next = err.source();
        while let Some(err) = next {
            chain.push(ExceptionInfo::new(debug_type_name(err), err.to_string()));
            next = err.source();
        }
        // `chain` is non-empty, so this always yields a value
        let mut outer = chain.pop().unwrap_or_else(|| ExceptionInfo::new("Error", ""));
        while let Some(wrapper) = chain.pop() {
            outer = wrapper.with_inner(outer);
        }
        outer
    }
    pub fn type_name(&self) -> &str {
        &self.type_name
    }
    pub fn message(&self) -> &str {
        &self.message
    }
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
    pub fn stack_trace(&self) -> Option<&str> {
        self.stack_trace.as_deref()
    }
    pub fn inner(&self) -> Option<&ExceptionInfo> {
        self.inner.as_deref()
    }
}

fn debug_type_name(err: &dyn std::error::Error) -> String {
    let name: String = format!("{:?}", err)
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    if name.is_empty() {
        "Error".to_string()
    } else {
        name
    }
}

/// Render `exception` & (at most `max_depth` of) the errors it wraps.
///
/// Returns `(detail, stack)`:
///
/// - `detail` is `"{type}: {message}"` for each error visited, outermost first, joined by
///   [`MESSAGE_SEPARATOR`]
/// - `stack` is each visited error's stack trace (one per line), *innermost* first, with every
///   inner error's trace followed by the [`STACK_TRACE_SEPARATOR`] line; errors without a stack
///   trace contribute nothing
///
/// A `max_depth` of zero renders only `exception` itself.
pub fn flatten(exception: &ExceptionInfo, max_depth: usize) -> (String, String) {
    let mut detail = String::new();
    let mut current = Some(exception);
    let mut level = 0;
    while let Some(ex) = current {
        if level > 0 {
            detail.push_str(MESSAGE_SEPARATOR);
        }
        detail.push_str(&ex.type_name);
        detail.push_str(": ");
        detail.push_str(&ex.message);
        current = if level < max_depth { ex.inner() } else { None };
        level += 1;
    }

    let mut stack = String::new();
    push_stack_detail(exception, 0, max_depth, &mut stack);

    (detail, stack)
}

fn push_stack_detail(exception: &ExceptionInfo, level: usize, max_depth: usize, out: &mut String) {
    if level < max_depth {
        if let Some(inner) = exception.inner() {
            push_stack_detail(inner, level + 1, max_depth, out);
        }
    }
    if let Some(stack_trace) = exception.stack_trace() {
        out.push_str(stack_trace);
        out.push('\n');
        if level > 0 {
            out.push_str(STACK_TRACE_SEPARATOR);
            out.push('\n');
        }
    }
}
