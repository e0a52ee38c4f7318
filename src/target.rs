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

//! The write path: from [`LogRecord`] to the wire.
//!
//! A [`GelfTarget`] is opened in two steps: build a [`TargetConfig`], then hand it to
//! [`GelfTarget::open`], which asks a [`TransportFactory`] for a transport. A target whose
//! transport couldn't be created is still usable; it just drops everything written to it.

use crate::{
    config::TargetConfig,
    converter::GelfConverter,
    dns::Resolver,
    factory::{BoxedTransport, TransportFactory},
    record::LogRecord,
};

use serde_json::Value;
use tracing::{debug, warn};

/// Converts [`LogRecord`]s to GELF & ships them.
pub struct GelfTarget {
    config: TargetConfig,
    converter: GelfConverter,
    transport: Option<BoxedTransport>,
}

impl GelfTarget {
    /// Open a target, letting `factory` choose the transport for `config`'s endpoint.
    pub fn open<R: Resolver>(config: TargetConfig, factory: &TransportFactory<R>) -> GelfTarget {
        let mut converter = GelfConverter::builder()
            .hostname(factory.resolver().host_name())
            .max_nested_exceptions_depth(config.max_nested_exceptions_depth());
        if let Some(facility) = config.facility() {
            converter = converter.facility(facility);
        }
        let transport = factory.create_transport(&config);
        GelfTarget::new(config, converter.build(), transport)
    }
    /// Assemble a target from parts; `transport` may be `None`, in which case writes are
    /// silently discarded.
    pub fn new(
        config: TargetConfig,
        converter: GelfConverter,
        transport: Option<BoxedTransport>,
    ) -> GelfTarget {
        GelfTarget {
            config,
            converter,
            transport,
        }
    }
    pub fn config(&self) -> &TargetConfig {
        &self.config
    }
    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Convert `record` & send it.
    ///
    /// Nothing that goes wrong here is reported to the caller: failures are logged & the
    /// record dropped.
    pub fn write(&self, mut record: LogRecord) {
        let transport = match &self.transport {
            Some(transport) => transport,
            None => return,
        };

        for parameter in self.config.parameters() {
            let value = parameter.render(&record);
            record
                .properties_mut()
                .insert_if_absent(parameter.name(), Value::String(value));
        }
        if self.config.send_last_format_parameter() {
            if let Some(last) = record.parameters().last().cloned() {
                record.promote_object(last);
            }
        }

        match self.converter.convert(&mut record) {
            Some(document) => {
                if let Err(err) = transport.send(&document) {
                    warn!("Failed to send a GELF message: {}", err);
                }
            }
            None => debug!("Record produced no GELF document; dropping it"),
        }
    }

    /// Close the underlying transport. Subsequent writes are dropped.
    pub fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
    }
}

impl Drop for GelfTarget {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod test {

    use super::*;

    use crate::{
        config::Parameter,
        context::AmbientContext,
        gelf::GelfDocument,
        record::Properties,
        severity::LogLevel,
        transport::Transport,
    };

    use flate2::read::GzDecoder;

    use serde_json::json;

    use std::{
        io::Read,
        net::{IpAddr, Ipv4Addr, UdpSocket},
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        time::Duration,
    };

    #[derive(Clone, Default)]
    struct Recorder {
        sent: Arc<Mutex<Vec<Value>>>,
        closed: Arc<AtomicUsize>,
    }

    impl Transport for Recorder {
        fn send(&self, document: &GelfDocument) -> crate::error::Result<()> {
            let doc: Value = serde_json::from_str(&document.to_json()?).unwrap();
            self.sent.lock().unwrap().push(doc);
            Ok(())
        }
        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct NoContext;
    impl AmbientContext for NoContext {
        fn properties(&self) -> Properties {
            Properties::new()
        }
    }

    fn target(config: TargetConfig, recorder: &Recorder) -> GelfTarget {
        let converter = GelfConverter::builder()
            .hostname("bree.local")
            .ambient_context(NoContext)
            .build();
        GelfTarget::new(config, converter, Some(Box::new(recorder.clone())))
    }

    #[test]
    fn writes_documents() {
        let recorder = Recorder::default();
        let target = target(TargetConfig::default(), &recorder);
        target.write(LogRecord::new(LogLevel::Info, "Hello, world!").with_logger_name("app"));
        target.write(LogRecord::without_message(LogLevel::Info));
        target.write(LogRecord::new(LogLevel::Off, "never sent"));

        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["short_message"], json!("Hello, world!"));
        assert_eq!(sent[0]["host"], json!("bree.local"));
        assert_eq!(sent[0]["_LoggerName"], json!("app"));
    }

    #[test]
    fn parameters() {
        let recorder = Recorder::default();
        let config = TargetConfig::builder()
            .parameter(Parameter::new("level", |r: &LogRecord| r.level().to_string()))
            .parameter(Parameter::new("app", |_: &LogRecord| "from-layout".to_string()))
            .build();
        let target = target(config, &recorder);
        target.write(LogRecord::new(LogLevel::Warn, "careful").with_property("app", json!("own")));

        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent[0]["_level"], json!(LogLevel::Warn.to_string()));
        // The record's own property wins
        assert_eq!(sent[0]["_app"], json!("own"));
    }

    #[test]
    fn send_last_format_parameter() {
        let recorder = Recorder::default();
        let target = target(
            TargetConfig::builder().send_last_format_parameter(true).build(),
            &recorder,
        );
        target.write(
            LogRecord::new(LogLevel::Info, "order placed")
                .with_parameter(json!("ignored"))
                .with_parameter(json!({"id": 42, "customer": {"name": "Frodo"}})),
        );
        // A scalar last parameter is warned about & skipped, not fatal
        target.write(LogRecord::new(LogLevel::Info, "scalar").with_parameter(json!(7)));

        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["_id_"], json!(42));
        assert_eq!(sent[0]["_customer"], json!({"name": "Frodo"}));

        let off = Recorder::default();
        let target = self::target(TargetConfig::default(), &off);
        target.write(
            LogRecord::new(LogLevel::Info, "order placed").with_parameter(json!({"id": 42})),
        );
        assert!(off.sent.lock().unwrap()[0].get("_id_").is_none());
    }

    #[test]
    fn no_transport() {
        let config = TargetConfig::default();
        let factory = TransportFactory::default();
        let target = GelfTarget::open(config, &factory);
        assert!(!target.is_open());
        target.write(LogRecord::new(LogLevel::Error, "dropped"));
    }

    /// Resolves every host to the loopback address & names this host "test-host".
    struct LoopbackResolver;
    impl Resolver for LoopbackResolver {
        fn resolve(&self, _host: &str) -> std::io::Result<Vec<IpAddr>> {
            Ok(vec![IpAddr::V4(Ipv4Addr::LOCALHOST)])
        }
        fn host_name(&self) -> String {
            "test-host".to_string()
        }
    }

    #[test]
    fn host_comes_from_the_resolver() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let config = TargetConfig::builder()
            .endpoint(&format!("udp://graylog:{}", port))
            .build();
        let target = GelfTarget::open(config, &TransportFactory::new(LoopbackResolver));
        assert!(target.is_open());
        target.write(LogRecord::new(LogLevel::Info, "Hello, world!"));

        let mut buf = [0u8; 2048];
        let n = receiver.recv(&mut buf).unwrap();
        let mut text = String::new();
        GzDecoder::new(&buf[..n]).read_to_string(&mut text).unwrap();
        let doc: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(doc["host"], json!("test-host"));
        assert_eq!(doc["short_message"], json!("Hello, world!"));
    }

    #[test]
    fn close_is_idempotent() {
        let recorder = Recorder::default();
        let mut target = target(TargetConfig::default(), &recorder);
        target.close();
        target.close();
        target.write(LogRecord::new(LogLevel::Info, "dropped"));
        drop(target);
        assert_eq!(recorder.closed.load(Ordering::SeqCst), 1);
        assert!(recorder.sent.lock().unwrap().is_empty());
    }
}
