//! Non-blocking TCP transport and the length-prefixed reply framing.

mod errors;
mod listener;

pub use errors::ListenerError;
pub(crate) use listener::{ListenerHandle, SocketListener};

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

/// Tracing target for transport activity.
pub(crate) const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Pause between polls of a stream that has nothing to offer yet.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Transient read errors tolerated before the connection is abandoned.
const MAX_TRANSIENT_RETRIES: u32 = 10;

/// Result of attempting to read one request line.
pub(crate) enum ReadOutcome {
    /// A complete line, terminator consumed and excluded.
    Line(String),
    /// No bytes pending; poll again later.
    NotReady,
    /// The peer disconnected or the stream failed.
    Closed,
}

/// One client connection in non-blocking mode.
///
/// The stream is dropped on any unrecoverable error; subsequent calls then
/// report [`ReadOutcome::Closed`] and sends become no-ops.
pub(crate) struct Transport {
    stream: Option<TcpStream>,
}

impl Transport {
    pub(crate) fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self {
            stream: Some(stream),
        })
    }

    pub(crate) fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn close(&mut self) {
        self.stream = None;
    }

    /// Sends one framed reply: a host-native 4-byte length then the payload.
    ///
    /// When the client is not draining its receive buffer the frame is
    /// dropped, with a warning, rather than blocking the connection thread.
    /// Once the header has started going out the frame is committed and the
    /// remainder is written to completion.
    pub(crate) fn send_frame(&mut self, payload: &[u8]) {
        let Some(stream) = &mut self.stream else {
            return;
        };
        match stream.take_error() {
            Ok(None) => {}
            Ok(Some(error)) => {
                debug!(target: TRANSPORT_TARGET, error = %error, "socket error before send");
                self.close();
                return;
            }
            Err(error) => {
                debug!(target: TRANSPORT_TARGET, error = %error, "socket probe failed");
                self.close();
                return;
            }
        }
        let Ok(length) = u32::try_from(payload.len()) else {
            warn!(
                target: TRANSPORT_TARGET,
                bytes = payload.len(),
                "reply too large to frame; dropped"
            );
            return;
        };
        let header = length.to_ne_bytes();
        let written = match stream.write(&header) {
            Ok(written) => written,
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                warn!(
                    target: TRANSPORT_TARGET,
                    bytes = payload.len(),
                    "client not keeping up; reply dropped"
                );
                return;
            }
            Err(error) if error.kind() == io::ErrorKind::Interrupted => 0,
            Err(error) => {
                warn!(target: TRANSPORT_TARGET, error = %error, "send failed");
                self.close();
                return;
            }
        };
        self.write_committed(&header[written..]);
        self.write_committed(payload);
    }

    /// Writes every byte of an already committed frame, polling through
    /// would-block conditions.
    fn write_committed(&mut self, mut buffer: &[u8]) {
        while !buffer.is_empty() {
            let Some(stream) = &mut self.stream else {
                return;
            };
            match stream.write(buffer) {
                Ok(0) => {
                    warn!(target: TRANSPORT_TARGET, "connection closed mid-frame");
                    self.close();
                    return;
                }
                Ok(written) => buffer = &buffer[written..],
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(POLL_INTERVAL);
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => {
                    warn!(target: TRANSPORT_TARGET, error = %error, "send failed mid-frame");
                    self.close();
                    return;
                }
            }
        }
    }

    /// Reads one request line terminated by `\n` or `\r`.
    ///
    /// Returns [`ReadOutcome::NotReady`] when no bytes are pending at all;
    /// once a partial line has been buffered the call polls until the
    /// terminator arrives. The terminator is consumed but not included.
    pub(crate) fn read_line(&mut self) -> ReadOutcome {
        let mut line = Vec::new();
        let mut retries = 0;
        let mut byte = [0u8; 1];
        loop {
            let Some(stream) = &mut self.stream else {
                return ReadOutcome::Closed;
            };
            match stream.read(&mut byte) {
                Ok(0) => {
                    self.close();
                    return ReadOutcome::Closed;
                }
                Ok(_) => {
                    if byte[0] == b'\n' || byte[0] == b'\r' {
                        return ReadOutcome::Line(
                            String::from_utf8_lossy(&line).into_owned(),
                        );
                    }
                    line.push(byte[0]);
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    if line.is_empty() {
                        return ReadOutcome::NotReady;
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => {
                    retries += 1;
                    if retries > MAX_TRANSIENT_RETRIES {
                        warn!(target: TRANSPORT_TARGET, error = %error, "read failed");
                        self.close();
                        return ReadOutcome::Closed;
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::net::TcpListener;

    fn stream_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let client = TcpStream::connect(addr).expect("connect");
        let (server, _) = listener.accept().expect("accept");
        (client, server)
    }

    fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
        let mut header = [0u8; 4];
        stream.read_exact(&mut header).expect("frame header");
        let length = u32::from_ne_bytes(header) as usize;
        let mut payload = vec![0u8; length];
        stream.read_exact(&mut payload).expect("frame payload");
        payload
    }

    #[test]
    fn frames_carry_a_native_length_prefix() {
        let (mut client, server) = stream_pair();
        let mut transport = Transport::new(server).expect("transport");
        transport.send_frame(b"error\n");
        assert_eq!(read_frame(&mut client), b"error\n");
    }

    #[test]
    fn empty_payloads_still_produce_a_frame() {
        let (mut client, server) = stream_pair();
        let mut transport = Transport::new(server).expect("transport");
        transport.send_frame(b"");
        let mut header = [0u8; 4];
        client.read_exact(&mut header).expect("frame header");
        assert_eq!(u32::from_ne_bytes(header), 0);
    }

    #[rstest]
    #[case(b"wait 1 0.5\n", "wait 1 0.5")]
    #[case(b"wait 1 0.5\r", "wait 1 0.5")]
    #[case(b"\n", "")]
    fn lines_end_at_either_terminator(#[case] wire: &[u8], #[case] expected: &str) {
        let (mut client, server) = stream_pair();
        let mut transport = Transport::new(server).expect("transport");
        client.write_all(wire).expect("write");
        let ReadOutcome::Line(line) = transport.read_line() else {
            panic!("expected a complete line");
        };
        assert_eq!(line, expected);
    }

    #[test]
    fn idle_streams_report_not_ready() {
        let (_client, server) = stream_pair();
        let mut transport = Transport::new(server).expect("transport");
        assert!(matches!(transport.read_line(), ReadOutcome::NotReady));
    }

    #[test]
    fn disconnect_reports_closed() {
        let (client, server) = stream_pair();
        let mut transport = Transport::new(server).expect("transport");
        drop(client);
        loop {
            match transport.read_line() {
                ReadOutcome::Closed => break,
                ReadOutcome::NotReady => thread::sleep(POLL_INTERVAL),
                ReadOutcome::Line(_) => panic!("unexpected line"),
            }
        }
        assert!(!transport.is_open());
    }
}
