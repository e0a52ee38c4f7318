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

//! Log levels & GELF severity definitions.
//!
//! GELF borrows its `level` field from syslog: the value is one of the eight severities defined in
//! RFC [5424] (and replicated in `<syslog.h>`). [`Severity`] models those; [`LogLevel`] models the
//! six levels a logging call may carry (plus [`LogLevel::Off`], which marks a record that must not
//! be shipped at all).
//!
//! [5424]: https://datatracker.ietf.org/doc/html/rfc5424

type StdResult<T, E> = std::result::Result<T, E>;

/// The eight syslog severities, numbered as in RFC [5424].
///
/// [5424]: https://datatracker.ietf.org/doc/html/rfc5424
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    /// system is unusable
    Emergency = 0,
    /// action must be taken immediately
    Alert = 1,
    /// critical conditions
    Critical = 2,
    /// error conditions
    Error = 3,
    /// warning conditions
    Warning = 4,
    /// normal, but significant condition
    Notice = 5,
    /// informational message
    Informational = 6,
    /// debug-level message
    Debug = 7,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(
            f,
            "{}",
            match self {
                Severity::Emergency => "Emergency",
                Severity::Alert => "Alert",
                Severity::Critical => "Critical",
                Severity::Error => "Error",
                Severity::Warning => "Warning",
                Severity::Notice => "Notice",
                Severity::Informational => "Informational",
                Severity::Debug => "Debug",
            }
        )
    }
}

/// The level at which a record was logged.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    /// Sentinel: records at this level are never converted.
    Off,
}

// Indexed by `LogLevel as usize`; see
// <https://go2docs.graylog.org/current/getting_in_log_data/gelf.html#GELFPayloadSpecification>
const SEVERITY_MAPPING: [Severity; 6] = [
    /* Trace => */ Severity::Debug,
    /* Debug => */ Severity::Debug,
    /* Info  => */ Severity::Informational,
    /* Warn  => */ Severity::Warning,
    /* Error => */ Severity::Error,
    /* Fatal => */ Severity::Critical,
];

impl LogLevel {
    /// Map this level to a syslog [`Severity`]; `None` for [`LogLevel::Off`].
    pub fn severity(self) -> Option<Severity> {
        SEVERITY_MAPPING.get(self as usize).copied()
    }
}

impl std::convert::From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => LogLevel::Trace,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warn,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(
            f,
            "{}",
            match self {
                LogLevel::Trace => "Trace",
                LogLevel::Debug => "Debug",
                LogLevel::Info => "Info",
                LogLevel::Warn => "Warn",
                LogLevel::Error => "Error",
                LogLevel::Fatal => "Fatal",
                LogLevel::Off => "Off",
            }
        )
    }
}
