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

//! Name resolution.
//!
//! Transport construction needs to turn the endpoint's host into an address, and the converter
//! needs a name for *this* host. Both go through the [`Resolver`] trait so that tests don't touch
//! the network.

use std::net::{IpAddr, ToSocketAddrs};

/// Host name & address lookup.
pub trait Resolver {
    /// All addresses for `host`, in the order the system returned them.
    fn resolve(&self, host: &str) -> std::io::Result<Vec<IpAddr>>;
    /// The name of the local host.
    fn host_name(&self) -> String;
}

/// [`Resolver`] backed by the system resolver.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn resolve(&self, host: &str) -> std::io::Result<Vec<IpAddr>> {
        Ok((host, 0).to_socket_addrs()?.map(|addr| addr.ip()).collect())
    }
    fn host_name(&self) -> String {
        local_hostname()
    }
}

/// Attempt to figure-out a name for this host.
///
/// We first try [gethostname()]; failing that we'll use an IP address for this host, and failing
/// *that* we'll just say "localhost" (GELF requires a non-empty `host`).
///
/// [gethostname()]: https://man7.org/linux/man-pages/man2/gethostname.2.html
pub fn local_hostname() -> String {
    hostname::get()
        .map(|hn| hn.to_string_lossy().into_owned())
        .ok()
        .filter(|hn| !hn.is_empty())
        .or_else(|| local_ip_address::local_ip().ok().map(|ip| ip.to_string()))
        .unwrap_or_else(|| "localhost".to_string())
}

/// The first IPv4 address in `addrs`, if any.
pub fn first_ipv4(addrs: &[IpAddr]) -> Option<IpAddr> {
    addrs.iter().find(|addr| addr.is_ipv4()).copied()
}
