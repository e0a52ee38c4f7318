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

//! The GELF transport layer.
//!
//! This module defines the [`Transport`] trait that all implementations must support, as well
//! as the chunked UDP implementation.
//!
//! # Chunked GELF
//!
//! A GELF message is serialized, gzipped & (if the result fits) sent as a single datagram. If it
//! doesn't fit, it's split into at most 128 [chunks], each of which is sent as its own datagram
//! prefixed by a twelve byte header:
//!
//! ```text
//! +------+------+----- ... -----+----------+-------+------ ... ------+
//! | 0x1e | 0x0f | message ID (8)| sequence | count | payload slice   |
//! +------+------+----- ... -----+----------+-------+------ ... ------+
//! ```
//!
//! The receiver reassembles the message; there's no acknowledgement, no retransmission & no
//! attempt to preserve ordering on the wire.
//!
//! [chunks]: https://go2docs.graylog.org/current/getting_in_log_data/gelf.html#chunking
//!
//! # Examples
//!
//! To send GELF messages to a Graylog input on port 12201 on localhost:
//!
//! ```rust
//! use gelf_tracing::transport::ChunkedUdpTransport;
//! let transpo = ChunkedUdpTransport::connect("127.0.0.1:12201".parse().unwrap(), 1500).unwrap();
//! assert_eq!(transpo.max_chunk_size(), 1500);
//! ```

use crate::{
    error::{Error, Result},
    gelf::GelfDocument,
};

use backtrace::Backtrace;
use bytes::{BufMut, BytesMut};
use flate2::{write::GzEncoder, Compression};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::debug;

use std::{
    io::Write,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket},
    sync::{Mutex, PoisonError},
};

/// Graylog won't reassemble a message split into more chunks than this.
pub const MAX_NUMBER_OF_CHUNKS: usize = 128;
/// Smallest datagram every IPv4 host must accept.
pub const MIN_UDP_DATAGRAM_SIZE: usize = 576;
/// Largest datagram the transport will send.
pub const MAX_UDP_DATAGRAM_SIZE: usize = 8192;
/// Fits an Ethernet MTU.
pub const DEFAULT_UDP_DATAGRAM_SIZE: usize = 1500;
/// Magic, message ID, sequence number & chunk count.
pub const CHUNK_HEADER_SIZE: usize = 12;
/// Identifies a datagram as a GELF chunk.
pub const CHUNK_MAGIC: [u8; 2] = [0x1e, 0x0f];

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                      transport mechanisms                                      //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Operations all transport layers must support.
pub trait Transport {
    /// Send `document` on this transport mechanism.
    ///
    /// Delivery is best-effort; an `Ok` return means only that the document was handed to the
    /// underlying mechanism (or deliberately dropped), not that anyone received it.
    fn send(&self, document: &GelfDocument) -> Result<()>;
    /// Release any resources held by this transport. Calling this more than once is harmless.
    fn close(&mut self) {}
}

/// The minimal interface the chunked transport needs from a datagram socket.
pub trait DatagramSocket: Send + Sync {
    /// Send one datagram, returning the number of bytes sent.
    fn send(&self, datagram: &[u8]) -> std::io::Result<usize>;
    /// Ask that datagrams not be fragmented on the way.
    fn set_dont_fragment(&self, dont_fragment: bool) -> std::io::Result<()>;
    /// Close the socket.
    fn close(self: Box<Self>) {}
}

/// A non-blocking [`UdpSocket`] connected to a single peer.
pub struct UdpSocketClient {
    socket: UdpSocket,
}

impl UdpSocketClient {
    /// Bind an ephemeral local port & connect it to `peer`.
    pub fn new(peer: SocketAddr) -> Result<UdpSocketClient> {
        let local = match peer.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(local).map_err(|err| Error::Transport {
            source: Box::new(err),
            back: Backtrace::new(),
        })?;
        // Sends are fire-and-forget; never block the logging call on a full socket buffer
        socket.set_nonblocking(true).map_err(|err| Error::Transport {
            source: Box::new(err),
            back: Backtrace::new(),
        })?;
        socket.connect(peer).map_err(|err| Error::Transport {
            source: Box::new(err),
            back: Backtrace::new(),
        })?;
        Ok(UdpSocketClient { socket })
    }
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl DatagramSocket for UdpSocketClient {
    fn send(&self, datagram: &[u8]) -> std::io::Result<usize> {
        self.socket.send(datagram)
    }
    fn set_dont_fragment(&self, _dont_fragment: bool) -> std::io::Result<()> {
        // `std::net` has no portable way to set DF (IP_MTU_DISCOVER on Linux, IP_DONTFRAGMENT
        // on Windows).
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "setting don't-fragment is not supported on this socket",
        ))
    }
}

/// gzip `message`.
pub fn compress(message: &str) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(message.as_bytes())
        .and_then(|_| encoder.finish())
        .map_err(|err| Error::Compression {
            source: err,
            back: Backtrace::new(),
        })
}

/// Build the header for chunk number `sequence` (of `count`) of the message `message_id`.
pub fn chunk_header(message_id: &[u8; 8], sequence: u8, count: u8) -> [u8; CHUNK_HEADER_SIZE] {
    let mut header = [0u8; CHUNK_HEADER_SIZE];
    header[..2].copy_from_slice(&CHUNK_MAGIC);
    header[2..10].copy_from_slice(message_id);
    header[10] = sequence;
    header[11] = count;
    header
}

/// How to work out the number of chunks a payload needs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChunkCounting {
    /// `len / budget + 1`: one chunk too many when `len` is an exact multiple of the per-chunk
    /// budget (the final chunk is then header-only). This is what existing deployments of this
    /// sender have always put on the wire.
    #[default]
    Legacy,
    /// `ceil(len / budget)`
    Exact,
}

impl ChunkCounting {
    pub fn chunk_count(self, len: usize, budget: usize) -> usize {
        match self {
            ChunkCounting::Legacy => len / budget + 1,
            ChunkCounting::Exact => len.div_ceil(budget),
        }
    }
}

/// Generates the eight-byte IDs that tie a message's chunks together.
///
/// The generator may be shared by any number of threads; IDs are random, so are unique only
/// with (very) high probability.
pub struct MessageIdGenerator {
    rng: Mutex<StdRng>,
}

impl std::default::Default for MessageIdGenerator {
    fn default() -> Self {
        MessageIdGenerator {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }
}

impl MessageIdGenerator {
    pub fn next_id(&self) -> [u8; 8] {
        let mut id = [0u8; 8];
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fill(&mut id);
        id
    }
}

/// Sending GELF messages via UDP datagrams, chunking them as needed.
pub struct ChunkedUdpTransport {
    socket: Option<Box<dyn DatagramSocket>>,
    max_chunk_size: usize,
    chunk_counting: ChunkCounting,
    message_ids: MessageIdGenerator,
}

impl ChunkedUdpTransport {
    /// Construct a [`Transport`] implementation that sends datagrams of at most `max_chunk_size`
    /// bytes on `socket`.
    ///
    /// Fails if there is no socket or if `max_chunk_size` is outside of
    /// [[`MIN_UDP_DATAGRAM_SIZE`], [`MAX_UDP_DATAGRAM_SIZE`]].
    pub fn new(
        socket: Option<Box<dyn DatagramSocket>>,
        max_chunk_size: usize,
    ) -> Result<ChunkedUdpTransport> {
        let socket = socket.ok_or_else(|| Error::NoSocket {
            back: Backtrace::new(),
        })?;
        if !(MIN_UDP_DATAGRAM_SIZE..=MAX_UDP_DATAGRAM_SIZE).contains(&max_chunk_size) {
            return Err(Error::BadChunkSize {
                size: max_chunk_size,
                back: Backtrace::new(),
            });
        }
        if let Err(err) = socket.set_dont_fragment(true) {
            debug!("Unable to set don't-fragment on the GELF socket: {}", err);
        }
        Ok(ChunkedUdpTransport {
            socket: Some(socket),
            max_chunk_size,
            chunk_counting: ChunkCounting::default(),
            message_ids: MessageIdGenerator::default(),
        })
    }
    /// Construct a [`Transport`] implementation via UDP to `peer`.
    pub fn connect(peer: SocketAddr, max_chunk_size: usize) -> Result<ChunkedUdpTransport> {
        ChunkedUdpTransport::new(Some(Box::new(UdpSocketClient::new(peer)?)), max_chunk_size)
    }
    pub fn with_chunk_counting(mut self, chunk_counting: ChunkCounting) -> Self {
        self.chunk_counting = chunk_counting;
        self
    }
    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }
    pub fn is_closed(&self) -> bool {
        self.socket.is_none()
    }
    /// Send an already-compressed payload, chunking if needed; returns the number of datagrams
    /// handed to the socket.
    pub fn send_compressed(&self, compressed: &[u8]) -> usize {
        let socket = match &self.socket {
            Some(socket) => socket,
            None => {
                debug!("Dropping a GELF message: the transport has been closed");
                return 0;
            }
        };

        if compressed.len() <= self.max_chunk_size {
            emit(&**socket, compressed);
            return 1;
        }

        let budget = self.max_chunk_size - CHUNK_HEADER_SIZE;
        let count = self.chunk_counting.chunk_count(compressed.len(), budget);
        if count > MAX_NUMBER_OF_CHUNKS {
            debug!(
                "Unable to transport a GELF message: {} chunks exceeds the limit ({})",
                count, MAX_NUMBER_OF_CHUNKS
            );
            return 0;
        }

        let message_id = self.message_ids.next_id();
        let mut datagram = BytesMut::with_capacity(self.max_chunk_size);
        for i in 0..count {
            let start = (i * budget).min(compressed.len());
            let end = (start + budget).min(compressed.len());
            datagram.clear();
            // `count` <= 128, so these casts are lossless
            datagram.put_slice(&chunk_header(&message_id, i as u8, count as u8));
            datagram.put_slice(&compressed[start..end]);
            emit(&**socket, &datagram);
        }
        count
    }
}

fn emit(socket: &dyn DatagramSocket, datagram: &[u8]) {
    if let Err(err) = socket.send(datagram) {
        debug!("Failed to send a {}-byte GELF datagram: {}", datagram.len(), err);
    }
}

impl Transport for ChunkedUdpTransport {
    fn send(&self, document: &GelfDocument) -> Result<()> {
        let compressed = compress(&document.to_json()?)?;
        self.send_compressed(&compressed);
        Ok(())
    }
    fn close(&mut self) {
        if let Some(socket) = self.socket.take() {
            socket.close();
        }
    }
}

impl Drop for ChunkedUdpTransport {
    fn drop(&mut self) {
        Transport::close(self);
    }
}

#[cfg(test)]
mod test {

    use super::*;

    use crate::{gelf::Timestamp, severity::Severity};

    use flate2::read::GzDecoder;
    use rand::distr::Alphanumeric;

    use std::{
        collections::HashSet,
        io::Read,
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            Arc,
        },
    };

    #[derive(Clone, Default)]
    struct FakeSocket {
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
        closed: Arc<AtomicUsize>,
        dont_fragment: Arc<AtomicBool>,
    }

    impl DatagramSocket for FakeSocket {
        fn send(&self, datagram: &[u8]) -> std::io::Result<usize> {
            self.sent.lock().unwrap().push(datagram.to_vec());
            Ok(datagram.len())
        }
        fn set_dont_fragment(&self, dont_fragment: bool) -> std::io::Result<()> {
            self.dont_fragment.store(dont_fragment, Ordering::SeqCst);
            Ok(())
        }
        fn close(self: Box<Self>) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl FakeSocket {
        fn sent(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().clone()
        }
    }

    /// Refuses every datagram, counting the attempts.
    #[derive(Clone, Default)]
    struct FailingSocket {
        attempts: Arc<AtomicUsize>,
    }

    impl DatagramSocket for FailingSocket {
        fn send(&self, _datagram: &[u8]) -> std::io::Result<usize> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(std::io::Error::new(std::io::ErrorKind::WouldBlock, "socket buffer full"))
        }
        fn set_dont_fragment(&self, _dont_fragment: bool) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn transport(max_chunk_size: usize) -> (ChunkedUdpTransport, FakeSocket) {
        let socket = FakeSocket::default();
        let t = ChunkedUdpTransport::new(Some(Box::new(socket.clone())), max_chunk_size).unwrap();
        (t, socket)
    }

    fn gunzip(bytes: &[u8]) -> String {
        let mut text = String::new();
        GzDecoder::new(bytes).read_to_string(&mut text).unwrap();
        text
    }

    #[test]
    fn construction() {
        let (t, socket) = transport(1500);
        assert_eq!(t.max_chunk_size(), 1500);
        assert!(socket.dont_fragment.load(Ordering::SeqCst));

        assert!(matches!(
            ChunkedUdpTransport::new(None, 1500),
            Err(Error::NoSocket { .. })
        ));
        for size in [0, 575, 8193] {
            assert!(matches!(
                ChunkedUdpTransport::new(Some(Box::new(FakeSocket::default())), size),
                Err(Error::BadChunkSize { .. })
            ));
        }
        assert!(ChunkedUdpTransport::new(Some(Box::new(FakeSocket::default())), 576).is_ok());
        assert!(ChunkedUdpTransport::new(Some(Box::new(FakeSocket::default())), 8192).is_ok());
    }

    #[test]
    fn compression_round_trip() {
        for text in ["lorem ipsum dolor sit amet", "", "Hello, 世界!"] {
            assert_eq!(gunzip(&compress(text).unwrap()), text);
        }
    }

    #[test]
    fn chunk_header_layout() {
        let header = chunk_header(&[1, 2, 3, 4, 5, 6, 7, 8], 1, 2);
        assert_eq!(
            header,
            [0x1e, 0x0f, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x01, 0x02]
        );
    }

    #[test]
    fn message_ids_are_distinct() {
        let (t, _) = transport(1500);
        assert_eq!(t.message_ids.next_id().len(), 8);
        let ids: Vec<[u8; 8]> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| (0..1250).map(|_| t.message_ids.next_id()).collect::<Vec<_>>()))
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });
        assert_eq!(ids.len(), 10_000);
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 10_000);
    }

    #[test]
    fn small_payloads_go_unchunked() {
        let (t, socket) = transport(600);
        assert_eq!(t.send_compressed(&[7u8; 600]), 1);
        assert_eq!(socket.sent(), vec![vec![7u8; 600]]);
    }

    #[test]
    fn large_payloads_are_chunked() {
        let (t, socket) = transport(600);
        let payload: Vec<u8> = (0..601u32).map(|i| i as u8).collect();
        // 601 / 588 + 1
        assert_eq!(t.send_compressed(&payload), 2);
        let sent = socket.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].len(), 600);
        assert_eq!(sent[1].len(), 12 + 13);
        assert_eq!(sent[0][..2], CHUNK_MAGIC);
        assert_eq!(sent[0][2..10], sent[1][2..10]);
        assert_eq!((sent[0][10], sent[0][11]), (0, 2));
        assert_eq!((sent[1][10], sent[1][11]), (1, 2));
        let mut reassembled = sent[0][12..].to_vec();
        reassembled.extend_from_slice(&sent[1][12..]);
        assert_eq!(reassembled, payload);
    }

    #[test]
    fn exact_multiples() {
        let payload = vec![0u8; 588 * 2];

        let (t, socket) = transport(600);
        assert_eq!(t.send_compressed(&payload), 3);
        let sent = socket.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[2].len(), CHUNK_HEADER_SIZE);
        assert_eq!(sent[2][11], 3);

        let (t, socket) = transport(600);
        let t = t.with_chunk_counting(ChunkCounting::Exact);
        assert_eq!(t.send_compressed(&payload), 2);
        assert!(socket.sent().iter().all(|d| d.len() == 600));
    }

    #[test]
    fn too_many_chunks() {
        // 128 full chunks' worth: legacy counting asks for 129 & so drops the message...
        let payload = vec![0u8; 588 * 128];
        let (t, socket) = transport(600);
        assert_eq!(t.send_compressed(&payload), 0);
        assert!(socket.sent().is_empty());
        // ...exact counting squeaks by
        let (t, socket) = transport(600);
        let t = t.with_chunk_counting(ChunkCounting::Exact);
        assert_eq!(t.send_compressed(&payload), 128);
        assert_eq!(socket.sent().len(), 128);

        let (t, socket) = transport(600);
        assert_eq!(t.send_compressed(&vec![0u8; 588 * 200]), 0);
        assert!(socket.sent().is_empty());
    }

    #[test]
    fn send_document() {
        let (t, socket) = transport(1500);
        let doc = GelfDocument::new(
            "h",
            "short & sweet",
            Timestamp::from_millis(1540711622000),
            Severity::Warning,
            "GELF",
        );
        t.send(&doc).unwrap();
        let sent = socket.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(gunzip(&sent[0]), doc.to_json().unwrap());
    }

    #[test]
    fn send_chunked_document() {
        let (t, socket) = transport(600);
        // Random text doesn't compress much, so this will need several chunks
        let noise: String = StdRng::seed_from_u64(7)
            .sample_iter(&Alphanumeric)
            .take(5_000)
            .map(char::from)
            .collect();
        let doc = GelfDocument::new(
            "h",
            &noise,
            Timestamp::from_millis(0),
            Severity::Debug,
            "GELF",
        );
        t.send(&doc).unwrap();
        let sent = socket.sent();
        assert!(sent.len() > 1);
        assert!(sent.iter().all(|d| d.len() <= 600));
        let mut payload = Vec::new();
        for (i, datagram) in sent.iter().enumerate() {
            assert_eq!(datagram[10] as usize, i);
            assert_eq!(datagram[11] as usize, sent.len());
            payload.extend_from_slice(&datagram[12..]);
        }
        assert_eq!(gunzip(&payload), doc.to_json().unwrap());
    }

    #[test]
    fn socket_errors_are_not_reported() {
        let socket = FailingSocket::default();
        let t = ChunkedUdpTransport::new(Some(Box::new(socket.clone())), 600).unwrap();

        let doc = GelfDocument::new(
            "h",
            "nobody is listening",
            Timestamp::from_millis(0),
            Severity::Error,
            "GELF",
        );
        assert!(t.send(&doc).is_ok());
        assert_eq!(socket.attempts.load(Ordering::SeqCst), 1);

        // A failed chunk doesn't stop the rest from going out
        let payload: Vec<u8> = (0..2000u32).map(|i| i as u8).collect();
        assert_eq!(t.send_compressed(&payload), 4);
        assert_eq!(socket.attempts.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn close_is_idempotent() {
        let (mut t, socket) = transport(1500);
        t.close();
        t.close();
        assert!(t.is_closed());
        assert_eq!(socket.closed.load(Ordering::SeqCst), 1);
        assert_eq!(t.send_compressed(&[1, 2, 3]), 0);
        drop(t);
        assert_eq!(socket.closed.load(Ordering::SeqCst), 1);

        let (t, socket) = transport(1500);
        drop(t);
        assert_eq!(socket.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn udp_loopback() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(std::time::Duration::from_secs(5)))
            .unwrap();
        let t = ChunkedUdpTransport::connect(receiver.local_addr().unwrap(), 1500).unwrap();
        let doc = GelfDocument::new(
            "h",
            "over the wire",
            Timestamp::from_millis(1),
            Severity::Error,
            "GELF",
        );
        t.send(&doc).unwrap();
        let mut buf = [0u8; 2048];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(gunzip(&buf[..n]), doc.to_json().unwrap());
    }
}
