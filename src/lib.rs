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

//! A [`tracing-subscriber`] [`Layer`] implementation for sending [`tracing`] [`Event`]s to a
//! [GELF] endpoint such as [Graylog]
//!
//! [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html
//! [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
//! [`tracing`]: https://docs.rs/tracing/0.1.35/tracing/index.html
//! [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
//! [GELF]: https://go2docs.graylog.org/current/getting_in_log_data/gelf.html
//! [Graylog]: https://graylog.org
//!
//! # Introduction
//!
//! GELF (the Graylog Extended Log Format) is a JSON document format for log messages. Beyond a
//! handful of fixed fields (`host`, `short_message`, `timestamp`, `level` & so on) a message may
//! carry any number of "additional fields", whose names begin with an underscore. That maps
//! nicely onto [`tracing`]'s structured events: every field of an event (and of the spans
//! enclosing it) becomes an additional field.
//!
//! GELF is most often shipped over UDP, gzip-compressed. Messages too large for one datagram are
//! split into at most 128 chunks, each prefixed with a twelve-byte header that lets the server
//! reassemble them. Delivery is fire-and-forget: nothing is acknowledged or retried.
//!
//! # Usage
//!
//! ```no_run
//! use tracing::info;
//! use gelf_tracing::{config::TargetConfig, layer::Layer};
//! use tracing_subscriber::registry::Registry;
//! use tracing_subscriber::layer::SubscriberExt; // Needed to get `with()`
//!
//! let config = TargetConfig::builder()
//!     .endpoint("udp://graylog.example.com:12201")
//!     .facility("billing")
//!     .build();
//! let subscriber = Registry::default().with(Layer::open(config));
//! let _guard = tracing::subscriber::set_default(subscriber);
//!
//! info!(order_id = 1234, "Order placed");
//! ```
//!
//! will send a document along the lines of:
//!
//! ```text
//! {"version":"1.1","host":"bree","short_message":"Order placed","full_message":"Order placed",
//!  "timestamp":1540711622.898,"level":6,"facility":"billing","line":"14","file":"src/main.rs",
//!  "_order_id":1234,"_LoggerName":"billing"}
//! ```
//!
//! The pipeline is also usable without [`tracing`]: build a [`LogRecord`] & hand it to a
//! [`GelfTarget`].
//!
//! [`LogRecord`]: crate::record::LogRecord
//! [`GelfTarget`]: crate::target::GelfTarget
//!
//! See the [general docs](crate::_docs) for how the pieces fit together.

pub mod _docs;
pub mod config;
pub mod context;
pub mod converter;
pub mod dns;
pub mod error;
pub mod exception;
pub mod factory;
pub mod gelf;
pub mod layer;
pub mod record;
pub mod severity;
pub mod target;
pub mod tracing;
pub mod transport;
