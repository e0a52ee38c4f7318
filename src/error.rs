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

//! [gelf-tracing](crate) errors

use backtrace::Backtrace;

/// [gelf-tracing](crate) error type
///
/// [gelf-tracing](crate) eschews libraries like [thiserror], [anyhow] & [Snafu] in favor of
/// a straightforward enumeration with a few match arms chosen on the basis what the caller will
/// need to respond.
///
/// Note that almost nothing here reaches application code: a GELF message that can't be built or
/// sent is dropped with a diagnostic. The exceptions are the constructors, where a bad argument
/// means the caller wired things up wrong.
///
/// [thiserror]: https://docs.rs/thiserror
/// [anyhow]: https://docs.rs/anyhow
/// [Snafu]: https://docs.rs/snafu/latest/snafu
#[non_exhaustive]
pub enum Error {
    /// A chunk size outside of [576, 8192] was handed to a transport constructor
    BadChunkSize { size: usize, back: Backtrace },
    /// An endpoint that couldn't be parsed as a URI
    BadEndpoint {
        endpoint: String,
        source: url::ParseError,
        back: Backtrace,
    },
    /// gzip compression failed
    Compression {
        source: std::io::Error,
        back: Backtrace,
    },
    /// A transport was constructed without a datagram socket
    NoSocket { back: Backtrace },
    /// The GELF document couldn't be serialized
    Serialization {
        source: serde_json::Error,
        back: Backtrace,
    },
    /// General transport layer error
    Transport {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
        back: Backtrace,
    },
}

impl std::fmt::Display for Error {
    // `Error` is non-exhaustive so that adding variants won't be a breaking change to our
    // callers. That means the compiler won't catch us if we miss a variant here, so we
    // always include a `_` arm.
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::BadChunkSize { size, .. } => write!(
                f,
                "Maximum chunk size must be in the interval [576, 8192] (got {})",
                size
            ),
            Error::BadEndpoint {
                endpoint, source, ..
            } => write!(f, "{:?} is not a valid endpoint URI: {}", endpoint, source),
            Error::Compression { source, .. } => {
                write!(f, "While compressing a GELF message, got {}", source)
            }
            Error::NoSocket { .. } => write!(f, "A datagram socket is required"),
            Error::Serialization { source, .. } => {
                write!(f, "While serializing a GELF message, got {}", source)
            }
            Error::Transport { source, .. } => write!(f, "Transport error: {}", source),
            _ => write!(f, "Other gelf-tracing error"),
        }
    }
}

impl std::fmt::Debug for Error {
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::BadChunkSize { back, .. } => write!(f, "{}\n{:?}", self, back),
            Error::BadEndpoint { back, .. } => write!(f, "{}\n{:?}", self, back),
            Error::Compression { back, .. } => write!(f, "{}\n{:?}", self, back),
            Error::NoSocket { back } => write!(f, "{}\n{:?}", self, back),
            Error::Serialization { back, .. } => write!(f, "{}\n{:?}", self, back),
            Error::Transport { back, .. } => write!(f, "{}\n{:?}", self, back),
            err => write!(f, "gelf-tracing error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::BadEndpoint { source, .. } => Some(source),
            Error::Compression { source, .. } => Some(source),
            Error::Serialization { source, .. } => Some(source),
            Error::Transport { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
