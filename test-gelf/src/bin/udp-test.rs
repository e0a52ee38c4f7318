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

//! Test sending GELF over UDP to a listener on the local host.
//!
//! Binds a socket on an ephemeral loopback port, logs through the [`Layer`] to it, then
//! reassembles whatever arrives & checks the decoded documents.

use flate2::read::GzDecoder;
use gelf_tracing::{config::TargetConfig, layer::Layer};
use rand::{distr::Alphanumeric, Rng};
use serde_json::Value;
use tracing::{error, info};
use tracing_subscriber::{
    layer::SubscriberExt, // Needed to get `with()`
    registry::Registry,
};

use std::{collections::HashMap, io::Read, net::UdpSocket, time::Duration};

/// Pull datagrams off `socket` until `expected` complete messages have been reassembled.
fn receive(socket: &UdpSocket, expected: usize) -> Vec<Value> {
    let mut messages = Vec::new();
    let mut partial: HashMap<[u8; 8], Vec<Option<Vec<u8>>>> = HashMap::new();
    let mut buf = [0u8; 8192];
    while messages.len() < expected {
        let n = socket.recv(&mut buf).expect("timed out waiting for a datagram");
        let datagram = &buf[..n];
        let payload = if datagram.starts_with(&[0x1e, 0x0f]) {
            let id: [u8; 8] = datagram[2..10].try_into().unwrap();
            let (seq, count) = (datagram[10] as usize, datagram[11] as usize);
            let chunks = partial.entry(id).or_insert_with(|| vec![None; count]);
            chunks[seq] = Some(datagram[12..].to_vec());
            if chunks.iter().any(Option::is_none) {
                continue;
            }
            partial
                .remove(&id)
                .unwrap()
                .into_iter()
                .flatten()
                .flatten()
                .collect::<Vec<u8>>()
        } else {
            datagram.to_vec()
        };
        let mut text = String::new();
        GzDecoder::new(&payload[..])
            .read_to_string(&mut text)
            .unwrap();
        messages.push(serde_json::from_str(&text).unwrap());
    }
    messages
}

pub fn main() {
    let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
    listener
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let port = listener.local_addr().unwrap().port();

    let config = TargetConfig::builder()
        .endpoint(&format!("udp://127.0.0.1:{}", port))
        .facility("udp-test")
        .max_udp_chunk_size(576)
        .build();
    // Setup the real subsriber...
    let subscriber = Registry::default().with(Layer::open(config));
    // and install it.
    let _guard = tracing::subscriber::set_default(subscriber);

    // Random text compresses poorly, so this will need several chunks
    let large: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(4000)
        .map(char::from)
        .collect();

    info!(target: "udp-test", user = "frodo", "Hello, 世界!");
    error!(target: "udp-test", id = 42, "{}", large);

    let messages = receive(&listener, 2);

    // Loopback keeps datagrams in order, but don't rely on it
    let small = messages.iter().find(|m| m["_user"] == "frodo").unwrap();
    assert_eq!(small["version"], "1.1");
    assert_eq!(small["short_message"], "Hello, 世界!");
    assert_eq!(small["level"], 6);
    assert_eq!(small["facility"], "udp-test");
    assert_eq!(small["_user"], "frodo");
    assert_eq!(small["_LoggerName"], "udp-test");

    let big = messages.iter().find(|m| m["level"] == 3).unwrap();
    assert_eq!(big["level"], 3);
    assert_eq!(big["full_message"].as_str().unwrap(), large);
    assert_eq!(big["short_message"].as_str().unwrap(), &large[..250]);
    assert_eq!(big["_id_"], 42);

    println!("Received & verified {} GELF messages.", messages.len());
}
