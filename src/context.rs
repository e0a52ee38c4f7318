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

//! Ambient diagnostic context.
//!
//! Values set here are attached to every record logged *on the current thread* (think
//! correlation IDs), unless the record carries its own value under the same name. The converter
//! reads the context through the [`AmbientContext`] trait so that tests (or applications with
//! their own notion of context) can substitute another source.

use crate::record::Properties;

use serde_json::Value;

use std::cell::RefCell;

thread_local! {
    static CONTEXT: RefCell<Properties> = RefCell::new(Properties::new());
}

/// Set `key` to `value` in the current thread's context.
pub fn set<K: Into<String>>(key: K, value: Value) {
    CONTEXT.with(|ctx| ctx.borrow_mut().insert(key, value));
}

/// Remove `key` from the current thread's context, returning its value if it was set.
pub fn remove(key: &str) -> Option<Value> {
    CONTEXT.with(|ctx| ctx.borrow_mut().remove(key))
}

/// Empty the current thread's context.
pub fn clear() {
    CONTEXT.with(|ctx| *ctx.borrow_mut() = Properties::new());
}

/// A copy of the current thread's context.
pub fn snapshot() -> Properties {
    CONTEXT.with(|ctx| ctx.borrow().clone())
}

/// Set `key` to `value` until the returned guard is dropped, at which point the previous value
/// (if any) is restored.
pub fn scoped<K: Into<String>>(key: K, value: Value) -> ScopedValue {
    let key = key.into();
    let previous = CONTEXT.with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        let previous = ctx.get(&key).cloned();
        ctx.insert(key.clone(), value);
        previous
    });
    ScopedValue { key, previous }
}

/// Returned by [`scoped`].
#[must_use]
pub struct ScopedValue {
    key: String,
    previous: Option<Value>,
}

impl Drop for ScopedValue {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => set(self.key.clone(), value),
            None => {
                remove(&self.key);
            }
        }
    }
}

/// A source of ambient name/value pairs to be merged into every converted record.
pub trait AmbientContext {
    fn properties(&self) -> Properties;
}

/// The thread-local context maintained by this module.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadLocalContext;

impl AmbientContext for ThreadLocalContext {
    fn properties(&self) -> Properties {
        snapshot()
    }
}
