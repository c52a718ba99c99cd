//! # Network Module
//!
//! This module provides the line transport used by the navigation link: a TCP socket which
//! either connects to or listens on an endpoint, carrying newline delimited frames.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod codec;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, trace};
use serde::Deserialize;
use std::{
    io::{self, Read, Write},
    net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    thread,
    time::{Duration, Instant},
};

pub use codec::{FrameError, LineCodec};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Size of the buffer used for each read from the stream.
const READ_CHUNK_SIZE: usize = 4096;

/// Interval between polls of a listening socket while waiting for a peer.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A bidirectional channel of text lines.
///
/// Implemented by [`LineSocket`] and by in-memory transports in tests.
pub trait LineTransport {
    /// Send one line. The delimiter is appended by the transport.
    fn send_line(&mut self, line: &str) -> Result<(), LineSocketError>;

    /// Receive the next line, waiting at most for the transport's receive timeout.
    fn recv_line(&mut self) -> Result<String, LineSocketError>;

    /// Drop the current connection, including any buffered data, and establish a new one.
    fn reconnect(&mut self) -> Result<(), LineSocketError>;

    /// Return if the transport currently has a live connection.
    fn connected(&self) -> bool;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A TCP socket carrying newline delimited frames.
pub struct LineSocket {
    address: String,

    options: SocketOptions,

    /// Listener, present only for sockets which bind.
    listener: Option<TcpListener>,

    stream: Option<TcpStream>,

    codec: LineCodec,
}

/// Represents options which can be set on a [`LineSocket`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SocketOptions {
    /// Indicates if the socket should bind itself to the endpoint and wait for a peer. The
    /// navigation core normally connects, test peers bind.
    ///
    /// The default value is `false`.
    pub bind: bool,

    /// Maximum time to wait for a connection to be established, in milliseconds.
    pub connect_timeout_ms: u64,

    /// Maximum time a receive may wait for a complete line, in milliseconds. Zero blocks forever.
    pub recv_timeout_ms: u64,

    /// Maximum time a send may block, in milliseconds. Zero blocks forever.
    pub send_timeout_ms: u64,

    /// Maximum length of a single frame in bytes.
    pub max_frame_len: usize,

    /// Disable Nagle's algorithm on the stream.
    pub nodelay: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum LineSocketError {
    #[error("Could not resolve the address {0}")]
    AddressError(String),

    #[error("Could not connect to {0}: {1}")]
    CouldNotConnect(String, io::Error),

    #[error("The socket is not connected")]
    NotConnected,

    #[error("The connection was closed by the peer")]
    Closed,

    #[error("No complete frame was received before the timeout")]
    Timeout,

    #[error("Received an invalid frame: {0}")]
    Frame(FrameError),

    #[error("Socket IO error: {0}")]
    Io(io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LineSocket {
    /// Create a new socket and establish the first connection.
    ///
    /// ## Arguments
    /// - `socket_options`: a [`SocketOptions`] struct specifying how to configure the socket
    /// - `address`: a TCP address such as `"localhost:5000"`
    pub fn new(socket_options: SocketOptions, address: &str) -> Result<Self, LineSocketError> {
        let listener = match socket_options.bind {
            true => {
                let l = TcpListener::bind(address)
                    .map_err(|e| LineSocketError::CouldNotConnect(address.into(), e))?;
                l.set_nonblocking(true).map_err(LineSocketError::Io)?;
                Some(l)
            }
            false => None,
        };

        let mut socket = Self {
            address: address.into(),
            codec: LineCodec::new(socket_options.max_frame_len),
            options: socket_options,
            listener,
            stream: None,
        };

        socket.reconnect()?;

        Ok(socket)
    }

    /// Address of the local listener, if this socket binds.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    fn connect(&self) -> Result<TcpStream, LineSocketError> {
        let addr = self
            .address
            .to_socket_addrs()
            .map_err(|_| LineSocketError::AddressError(self.address.clone()))?
            .next()
            .ok_or_else(|| LineSocketError::AddressError(self.address.clone()))?;

        TcpStream::connect_timeout(&addr, millis(self.options.connect_timeout_ms))
            .map_err(|e| LineSocketError::CouldNotConnect(self.address.clone(), e))
    }

    fn accept(&self, listener: &TcpListener) -> Result<TcpStream, LineSocketError> {
        let start = Instant::now();
        let timeout = millis(self.options.connect_timeout_ms);

        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    debug!("Accepted link peer {}", peer);
                    stream.set_nonblocking(false).map_err(LineSocketError::Io)?;
                    return Ok(stream);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if start.elapsed() >= timeout {
                        return Err(LineSocketError::CouldNotConnect(
                            self.address.clone(),
                            io::Error::new(io::ErrorKind::TimedOut, "no peer connected"),
                        ));
                    }
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(LineSocketError::CouldNotConnect(self.address.clone(), e))
                }
            }
        }
    }

    /// Drop the stream after an unrecoverable error on it.
    fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            debug!("Link stream to {} dropped", self.address);
        }
    }
}

impl LineTransport for LineSocket {
    fn send_line(&mut self, line: &str) -> Result<(), LineSocketError> {
        let stream = self.stream.as_mut().ok_or(LineSocketError::NotConnected)?;

        let mut frame = Vec::with_capacity(line.len() + 1);
        frame.extend_from_slice(line.as_bytes());
        frame.push(crate::msg::MSG_DELIMITER);

        let result = stream.write_all(&frame).and_then(|_| stream.flush());

        match result {
            Ok(()) => {
                trace!("Sent: {}", line);
                Ok(())
            }
            Err(e) if is_timeout(&e) => Err(LineSocketError::Timeout),
            Err(e) => {
                self.disconnect();
                match e.kind() {
                    io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted => Err(LineSocketError::Closed),
                    _ => Err(LineSocketError::Io(e)),
                }
            }
        }
    }

    fn recv_line(&mut self) -> Result<String, LineSocketError> {
        // The deadline covers the whole line, not each partial read
        let deadline = match self.options.recv_timeout_ms {
            0 => None,
            t => Some(Instant::now() + millis(t)),
        };
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            if let Some(frame) = self.codec.next_frame() {
                return frame.map_err(LineSocketError::Frame);
            }

            let read_timeout = match deadline {
                Some(d) => {
                    let remaining = d.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(LineSocketError::Timeout);
                    }
                    Some(remaining)
                }
                None => None,
            };

            let stream = self.stream.as_mut().ok_or(LineSocketError::NotConnected)?;
            stream
                .set_read_timeout(read_timeout)
                .map_err(LineSocketError::Io)?;

            match stream.read(&mut chunk) {
                Ok(0) => {
                    self.disconnect();
                    return Err(LineSocketError::Closed);
                }
                Ok(n) => self.codec.push(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_timeout(&e) => return Err(LineSocketError::Timeout),
                Err(e) => {
                    self.disconnect();
                    return Err(match e.kind() {
                        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                            LineSocketError::Closed
                        }
                        _ => LineSocketError::Io(e),
                    });
                }
            }
        }
    }

    fn reconnect(&mut self) -> Result<(), LineSocketError> {
        self.disconnect();
        self.codec.clear();

        let stream = match self.listener {
            Some(ref l) => self.accept(l)?,
            None => self.connect()?,
        };

        stream
            .set_nodelay(self.options.nodelay)
            .map_err(LineSocketError::Io)?;
        stream
            .set_write_timeout(match self.options.send_timeout_ms {
                0 => None,
                t => Some(millis(t)),
            })
            .map_err(LineSocketError::Io)?;

        debug!("Link connected to {}", self.address);
        self.stream = Some(stream);

        Ok(())
    }

    fn connected(&self) -> bool {
        self.stream.is_some()
    }
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            bind: false,
            connect_timeout_ms: 1000,
            recv_timeout_ms: 500,
            send_timeout_ms: 500,
            max_frame_len: 64 * 1024,
            nodelay: true,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::io::BufRead;

    fn client_opts() -> SocketOptions {
        SocketOptions {
            recv_timeout_ms: 200,
            ..Default::default()
        }
    }

    #[test]
    fn test_exchange_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut writer = stream.try_clone().unwrap();
            writer.write_all(b"hello\nwor").unwrap();
            writer.flush().unwrap();
            thread::sleep(Duration::from_millis(20));
            writer.write_all(b"ld\n").unwrap();

            let mut reader = io::BufReader::new(stream);
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            line
        });

        let mut socket = LineSocket::new(client_opts(), &addr.to_string()).unwrap();
        assert!(socket.connected());
        assert_eq!(socket.recv_line().unwrap(), "hello");
        assert_eq!(socket.recv_line().unwrap(), "world");
        socket.send_line("reply").unwrap();

        assert_eq!(peer.join().unwrap(), "reply\n");
    }

    #[test]
    fn test_timeout_then_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(300));
            drop(stream);
        });

        let mut socket = LineSocket::new(client_opts(), &addr.to_string()).unwrap();
        assert!(matches!(socket.recv_line(), Err(LineSocketError::Timeout)));
        assert!(socket.connected());

        peer.join().unwrap();
        assert!(matches!(socket.recv_line(), Err(LineSocketError::Closed)));
        assert!(!socket.connected());
        assert!(matches!(
            socket.send_line("x"),
            Err(LineSocketError::NotConnected)
        ));
    }

    #[test]
    fn test_bind_accepts_peer() {
        // Find a free port
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let address = format!("127.0.0.1:{}", port);

        let client_address = address.clone();
        let peer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            let mut stream = TcpStream::connect(client_address).unwrap();
            stream.write_all(b"from peer\n").unwrap();
            thread::sleep(Duration::from_millis(50));
        });

        let opts = SocketOptions {
            bind: true,
            connect_timeout_ms: 2000,
            ..client_opts()
        };
        let mut socket = LineSocket::new(opts, &address).unwrap();
        assert_eq!(socket.recv_line().unwrap(), "from peer");

        peer.join().unwrap();
    }

    #[test]
    fn test_connect_refused() {
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        assert!(matches!(
            LineSocket::new(client_opts(), &format!("127.0.0.1:{}", port)),
            Err(LineSocketError::CouldNotConnect(_, _))
        ));
    }
}
