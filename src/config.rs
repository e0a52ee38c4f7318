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

//! Target configuration.
//!
//! [`TargetConfig`] collects everything needed to build a converter & a transport: where to send
//! messages, how big a datagram may be, how deep to go into nested errors, and so on. It may be
//! built in code:
//!
//! ```rust
//! use gelf_tracing::config::TargetConfig;
//! let config = TargetConfig::builder()
//!     .endpoint("udp://graylog.example.com:12201")
//!     .facility("billing")
//!     .max_udp_chunk_size(8192)
//!     .build();
//! assert_eq!(config.max_udp_chunk_size(), 8192);
//! ```
//!
//! or deserialized (e.g. from a section of an application's configuration file). Either way,
//! out-of-range values are coerced into range & an unparseable endpoint is ignored; both are
//! logged, neither is an error.

use crate::{
    converter::DEFAULT_MAX_NESTED_EXCEPTIONS_DEPTH,
    error::{Error, Result},
    record::LogRecord,
    transport::{DEFAULT_UDP_DATAGRAM_SIZE, MAX_UDP_DATAGRAM_SIZE, MIN_UDP_DATAGRAM_SIZE},
};

use backtrace::Backtrace;
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

/// A named value computed from each record & attached to it as a property (unless the record
/// already has a property of that name).
pub struct Parameter {
    name: String,
    layout: Box<dyn Fn(&LogRecord) -> String + Send + Sync>,
}

impl Parameter {
    pub fn new<S, F>(name: S, layout: F) -> Parameter
    where
        S: Into<String>,
        F: Fn(&LogRecord) -> String + Send + Sync + 'static,
    {
        Parameter {
            name: name.into(),
            layout: Box::new(layout),
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn render(&self, record: &LogRecord) -> String {
        (self.layout)(record)
    }
}

impl std::fmt::Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter").field("name", &self.name).finish()
    }
}

/// Parse `endpoint` as an absolute URI.
pub fn parse_endpoint(endpoint: &str) -> Result<Url> {
    Url::parse(endpoint).map_err(|err| Error::BadEndpoint {
        endpoint: endpoint.to_string(),
        source: err,
        back: Backtrace::new(),
    })
}

/// Configuration for a GELF target.
#[derive(Debug, Deserialize)]
#[serde(from = "RawTargetConfig")]
pub struct TargetConfig {
    endpoint: Option<Url>,
    facility: Option<String>,
    max_udp_chunk_size: usize,
    max_nested_exceptions_depth: usize,
    send_last_format_parameter: bool,
    parameters: Vec<Parameter>,
}

impl std::default::Default for TargetConfig {
    fn default() -> Self {
        TargetConfig {
            endpoint: None,
            facility: None,
            max_udp_chunk_size: DEFAULT_UDP_DATAGRAM_SIZE,
            max_nested_exceptions_depth: DEFAULT_MAX_NESTED_EXCEPTIONS_DEPTH,
            send_last_format_parameter: false,
            parameters: Vec::new(),
        }
    }
}

impl TargetConfig {
    pub fn builder() -> TargetConfigBuilder {
        TargetConfigBuilder {
            imp: TargetConfig::default(),
        }
    }

    /// Set the destination, e.g. `udp://graylog:12201`.
    ///
    /// If `endpoint` can't be parsed, the previous endpoint (if any) is retained, a warning is
    /// logged & `false` returned.
    pub fn set_endpoint(&mut self, endpoint: &str) -> bool {
        match parse_endpoint(endpoint) {
            Ok(url) => {
                self.endpoint = Some(url);
                true
            }
            Err(err) => {
                warn!("Ignoring GELF endpoint: {}", err);
                false
            }
        }
    }
    pub fn set_facility<S: Into<String>>(&mut self, facility: S) {
        self.facility = Some(facility.into());
    }
    /// Set the maximum datagram size, coerced into [576, 8192].
    pub fn set_max_udp_chunk_size(&mut self, size: i64) {
        self.max_udp_chunk_size =
            size.clamp(MIN_UDP_DATAGRAM_SIZE as i64, MAX_UDP_DATAGRAM_SIZE as i64) as usize;
        info!("MaxUdpChunkSize is set to {}", self.max_udp_chunk_size);
    }
    /// Set the maximum number of nested errors to render, coerced to be non-negative.
    pub fn set_max_nested_exceptions_depth(&mut self, depth: i64) {
        self.max_nested_exceptions_depth = usize::try_from(depth.max(0)).unwrap_or(usize::MAX);
        info!(
            "MaxNestedExceptionsDepth is set to {}",
            self.max_nested_exceptions_depth
        );
    }
    pub fn set_send_last_format_parameter(&mut self, send: bool) {
        self.send_last_format_parameter = send;
    }
    pub fn add_parameter(&mut self, parameter: Parameter) {
        self.parameters.push(parameter);
    }

    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }
    pub fn facility(&self) -> Option<&str> {
        self.facility.as_deref()
    }
    pub fn max_udp_chunk_size(&self) -> usize {
        self.max_udp_chunk_size
    }
    pub fn max_nested_exceptions_depth(&self) -> usize {
        self.max_nested_exceptions_depth
    }
    pub fn send_last_format_parameter(&self) -> bool {
        self.send_last_format_parameter
    }
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }
}

pub struct TargetConfigBuilder {
    imp: TargetConfig,
}

impl TargetConfigBuilder {
    pub fn endpoint(mut self, endpoint: &str) -> Self {
        self.imp.set_endpoint(endpoint);
        self
    }
    pub fn facility<S: Into<String>>(mut self, facility: S) -> Self {
        self.imp.set_facility(facility);
        self
    }
    pub fn max_udp_chunk_size(mut self, size: i64) -> Self {
        self.imp.set_max_udp_chunk_size(size);
        self
    }
    pub fn max_nested_exceptions_depth(mut self, depth: i64) -> Self {
        self.imp.set_max_nested_exceptions_depth(depth);
        self
    }
    pub fn send_last_format_parameter(mut self, send: bool) -> Self {
        self.imp.set_send_last_format_parameter(send);
        self
    }
    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.imp.add_parameter(parameter);
        self
    }
    pub fn build(self) -> TargetConfig {
        self.imp
    }
}

/// The serialized form of [`TargetConfig`]; everything is routed through the setters so that
/// configuration files get the same coercions as code.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTargetConfig {
    endpoint: Option<String>,
    facility: Option<String>,
    max_udp_chunk_size: Option<i64>,
    max_nested_exceptions_depth: Option<i64>,
    #[serde(default)]
    send_last_format_parameter: bool,
}

impl std::convert::From<RawTargetConfig> for TargetConfig {
    fn from(raw: RawTargetConfig) -> Self {
        let mut config = TargetConfig::default();
        if let Some(endpoint) = raw.endpoint {
            config.set_endpoint(&endpoint);
        }
        if let Some(facility) = raw.facility {
            config.set_facility(facility);
        }
        if let Some(size) = raw.max_udp_chunk_size {
            config.set_max_udp_chunk_size(size);
        }
        if let Some(depth) = raw.max_nested_exceptions_depth {
            config.set_max_nested_exceptions_depth(depth);
        }
        config.set_send_last_format_parameter(raw.send_last_format_parameter);
        config
    }
}
