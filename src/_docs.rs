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

//! # General gelf-tracing Documentation
//!
//! ## From tracing Events to GELF Messages
//!
//! The translation from tracing [Event]s to datagrams on the wire happens in four steps:
//!
//! [Event]: tracing::Event
//!
//! 1. collecting the [Event]'s fields into a [LogRecord]
//! 2. converting the [LogRecord] into a [GelfDocument]
//! 3. serializing & compressing the document
//! 4. sending the result, in chunks if need be
//!
//! [LogRecord]: crate::record::LogRecord
//! [GelfDocument]: crate::gelf::GelfDocument
//!
//! ### Collecting Fields
//!
//! [FieldVisitor] sorts an [Event]'s fields: `message` becomes the formatted message, an error
//! recorded via `record_error` becomes the record's exception, and everything else becomes a
//! property. The [Layer] then adds the fields of any enclosing spans the event doesn't set
//! itself, along with the event's level, target (as `LoggerName`) & source location.
//!
//! [FieldVisitor]: crate::tracing::FieldVisitor
//! [Layer]: crate::layer::Layer
//!
//! ### Conversion
//!
//! [GelfConverter] builds the document. The level is mapped onto a syslog severity. If there's an
//! exception, its chain (down to a configurable depth) is flattened into `ExceptionMessage` &
//! `StackTrace` properties. Values in the thread-local [context] are added for names the record
//! doesn't already have. Finally each property becomes an additional field: names get a leading
//! underscore if they lack one, and `id` (which Graylog reserves) becomes `_id_`.
//!
//! [GelfConverter]: crate::converter::GelfConverter
//! [context]: crate::context
//!
//! With `send_last_format_parameter` set, the members of the last field of an event (if it's a
//! JSON object) are promoted to additional fields of their own:
//!
//! ```ignore
//! info!(order = %json!({"id": 17, "total": 12.5}), "Order placed");
//! // => ..., "_order": "{\"id\":17,\"total\":12.5}", "_id_": 17, "_total": 12.5
//! ```
//!
//! ### Chunking
//!
//! The compressed document goes out as a single datagram if it fits in the configured maximum
//! (1500 bytes unless configured otherwise; always between 576 & 8192). Otherwise it's cut into
//! chunks, each carrying a twelve-byte header: the magic bytes `0x1e 0x0f`, an eight-byte random
//! message id, the chunk's sequence number & the total number of chunks. GELF servers discard
//! messages of more than 128 chunks, so such messages are never sent at all.
//!
//! For compatibility with existing GELF senders the chunk count is computed as
//! `len / (max - 12) + 1`, which sends an extra, header-only chunk when the payload divides
//! evenly. [ChunkCounting::Exact] turns that off.
//!
//! [ChunkCounting::Exact]: crate::transport::ChunkCounting::Exact
//!
//! ## Failure
//!
//! Logging never fails from the caller's point of view. An endpoint that can't be parsed or
//! resolved leaves the [Layer] without a transport, so it discards events; an oversized message
//! or a failed send is logged (through `tracing`, under this crate's target, which the [Layer]
//! itself ignores) & dropped.
