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

//! Choosing a [`Transport`] for an endpoint.
//!
//! [`TransportFactory::create_transport`] looks at the scheme of the configured endpoint & builds
//! the matching transport. `udp://` endpoints get a [`ChunkedUdpTransport`] connected to the
//! first IPv4 address the host resolves to. `http://` & `https://` endpoints are handed to an
//! HTTP transport constructor, if the application supplied one; this crate doesn't ship one.
//!
//! Nothing here fails loudly: if no transport can be built, the reason is logged & `None`
//! returned, which leaves the target unable to ship messages (and dropping them quietly).

use crate::{
    config::TargetConfig,
    dns::{first_ipv4, Resolver, SystemResolver},
    transport::{ChunkedUdpTransport, Transport, UdpSocketClient},
};

use tracing::warn;
use url::Url;

use std::net::SocketAddr;

/// Endpoint schemes served by the chunked UDP transport.
pub const UDP_SCHEMES: &[&str] = &["udp"];
/// Endpoint schemes served by an HTTP transport.
pub const HTTP_SCHEMES: &[&str] = &["http", "https"];
/// Used for `udp://` endpoints that don't name a port.
pub const DEFAULT_GELF_PORT: u16 = 12201;

pub type BoxedTransport = Box<dyn Transport + Send + Sync>;

type HttpTransportConstructor = Box<dyn Fn(&Url) -> Option<BoxedTransport> + Send + Sync>;

/// Builds transports from [`TargetConfig`]s.
pub struct TransportFactory<R: Resolver> {
    resolver: R,
    http: Option<HttpTransportConstructor>,
}

impl std::default::Default for TransportFactory<SystemResolver> {
    fn default() -> Self {
        TransportFactory::new(SystemResolver)
    }
}

impl<R: Resolver> TransportFactory<R> {
    pub fn new(resolver: R) -> TransportFactory<R> {
        TransportFactory {
            resolver,
            http: None,
        }
    }
    /// Use `ctor` to build transports for `http://` & `https://` endpoints.
    pub fn with_http_transport<F>(mut self, ctor: F) -> Self
    where
        F: Fn(&Url) -> Option<BoxedTransport> + Send + Sync + 'static,
    {
        self.http = Some(Box::new(ctor));
        self
    }
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Build a transport for `target`'s endpoint, or explain (in the logs) why not.
    pub fn create_transport(&self, target: &TargetConfig) -> Option<BoxedTransport> {
        let endpoint = match target.endpoint() {
            Some(endpoint) => endpoint,
            None => {
                warn!("Unable to create a GELF transport: no endpoint has been configured");
                return None;
            }
        };

        let scheme = endpoint.scheme().to_ascii_lowercase();
        let transport = if UDP_SCHEMES.contains(&scheme.as_str()) {
            self.create_udp_transport(endpoint, target)
        } else if HTTP_SCHEMES.contains(&scheme.as_str()) {
            match &self.http {
                Some(ctor) => ctor(endpoint),
                None => {
                    warn!("No HTTP transport has been provided for {}", endpoint);
                    None
                }
            }
        } else {
            None
        };

        if transport.is_none() {
            warn!("No transport could be created for the endpoint {}", endpoint);
        }
        transport
    }

    fn create_udp_transport(
        &self,
        endpoint: &Url,
        target: &TargetConfig,
    ) -> Option<BoxedTransport> {
        let host = match endpoint.host_str() {
            Some(host) if !host.is_empty() => host,
            _ => {
                warn!("The endpoint {} names no host", endpoint);
                return None;
            }
        };
        let addrs = self.resolver.resolve(host).unwrap_or_else(|err| {
            warn!("While resolving {}, got {}", host, err);
            Vec::new()
        });
        let ip = match first_ipv4(&addrs) {
            Some(ip) => ip,
            None => {
                warn!("Unable to determine IPv4 address of host: {}", host);
                return None;
            }
        };
        let peer = SocketAddr::new(ip, endpoint.port().unwrap_or(DEFAULT_GELF_PORT));

        UdpSocketClient::new(peer)
            .and_then(|socket| {
                ChunkedUdpTransport::new(Some(Box::new(socket)), target.max_udp_chunk_size())
            })
            .map(|transport| Box::new(transport) as BoxedTransport)
            .map_err(|err| warn!("Unable to create a UDP transport to {}: {}", peer, err))
            .ok()
    }
}

#[cfg(test)]
mod test {

    use super::*;

    use crate::{
        gelf::{GelfDocument, Timestamp},
        severity::Severity,
    };

    use std::{
        collections::HashMap,
        net::{IpAddr, UdpSocket},
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    #[derive(Default)]
    struct FakeResolver(HashMap<String, Vec<IpAddr>>);

    impl FakeResolver {
        fn with(mut self, host: &str, addrs: &[&str]) -> Self {
            self.0.insert(
                host.to_string(),
                addrs.iter().map(|a| a.parse().unwrap()).collect(),
            );
            self
        }
    }

    impl Resolver for FakeResolver {
        fn resolve(&self, host: &str) -> std::io::Result<Vec<IpAddr>> {
            self.0.get(host).cloned().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such host")
            })
        }
        fn host_name(&self) -> String {
            "test-host".to_string()
        }
    }

    fn config(endpoint: &str) -> TargetConfig {
        TargetConfig::builder().endpoint(endpoint).build()
    }

    #[test]
    fn no_endpoint() {
        let factory = TransportFactory::new(FakeResolver::default());
        assert!(factory.create_transport(&TargetConfig::default()).is_none());
    }

    #[test]
    fn udp_endpoint() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(std::time::Duration::from_secs(5)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let factory =
            TransportFactory::new(FakeResolver::default().with("graylog", &["::1", "127.0.0.1"]));
        let transport = factory
            .create_transport(&config(&format!("UDP://graylog:{}", port)))
            .unwrap();
        let doc = GelfDocument::new("h", "m", Timestamp::from_millis(0), Severity::Notice, "GELF");
        transport.send(&doc).unwrap();
        let mut buf = [0u8; 1500];
        assert!(receiver.recv(&mut buf).unwrap() > 0);
    }

    #[test]
    fn unresolvable_hosts() {
        let factory = TransportFactory::new(FakeResolver::default().with("v6only", &["::1"]));
        assert!(factory
            .create_transport(&config("udp://v6only:12201"))
            .is_none());
        assert!(factory
            .create_transport(&config("udp://nowhere:12201"))
            .is_none());
    }

    #[test]
    fn unknown_schemes() {
        let factory = TransportFactory::new(FakeResolver::default().with("graylog", &["127.0.0.1"]));
        assert!(factory
            .create_transport(&config("tcp://graylog:12201"))
            .is_none());
        // No HTTP transport supplied
        assert!(factory
            .create_transport(&config("https://graylog/gelf"))
            .is_none());
    }

    struct NullTransport;
    impl Transport for NullTransport {
        fn send(&self, _document: &GelfDocument) -> crate::error::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn http_endpoints_use_the_supplied_constructor() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let factory = TransportFactory::new(FakeResolver::default()).with_http_transport(
            move |url: &Url| {
                counter.fetch_add(1, Ordering::SeqCst);
                assert_eq!(url.scheme(), "https");
                Some(Box::new(NullTransport) as BoxedTransport)
            },
        );
        assert!(factory
            .create_transport(&config("HTTPS://graylog:12202/gelf"))
            .is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
