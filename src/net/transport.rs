//! Point-to-Point Transport
//!
//! One WebSocket channel between exactly two endpoints, driven
//! synchronously: the core is single-threaded and poll-based, so the
//! stream runs in non-blocking mode once connected and all waiting happens
//! in short bounded polls.

use std::io;
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info};
use tungstenite::{Message, WebSocket};

use crate::error::{Error, Result};

/// Poll interval for bounded receives.
const RECV_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Poll interval while waiting for a peer to dial in or accept.
const CONNECT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Bound applied when a receive is requested with the default policy.
const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Flush poll interval during graceful teardown.
const LINGER_POLL_INTERVAL: Duration = Duration::from_millis(50);

// =============================================================================
// ROLE
// =============================================================================

/// The two fixed roles of a session. Chosen at construction, immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Binds the port and waits for the peer; owns the RSA key pair.
    Listener,
    /// Dials the listener; generates the session key.
    Connector,
}

impl Role {
    /// Player id owned by this role: 0 for the listener, 1 for the
    /// connector.
    pub const fn player_id(self) -> u8 {
        match self {
            Role::Listener => 0,
            Role::Connector => 1,
        }
    }

    /// The opposite role.
    pub const fn peer(self) -> Role {
        match self {
            Role::Listener => Role::Connector,
            Role::Connector => Role::Listener,
        }
    }
}

// =============================================================================
// RECEIVE POLICY
// =============================================================================

/// How long a receive may wait for data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveTimeout {
    /// Return `None` right away if nothing is queued.
    Immediate,
    /// Poll until data arrives or the bound elapses, then fail.
    Bounded(Duration),
    /// Poll with a generous default bound.
    Default,
}

// =============================================================================
// TRANSPORT
// =============================================================================

/// A connected, message-oriented channel to exactly one peer.
#[derive(Debug)]
pub struct Transport {
    socket: WebSocket<TcpStream>,
    role: Role,
}

impl Transport {
    /// Bind `port` and wait for the peer to dial in, up to `deadline`.
    pub fn listen(port: u16, deadline: Duration) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        listener.set_nonblocking(true)?;
        info!("listening on port {}", port);

        let expiry = Instant::now() + deadline;
        let stream = loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    info!("peer connected from {}", peer);
                    break stream;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= expiry {
                        error!("no peer dialed in within {:?}", deadline);
                        return Err(Error::Timeout(deadline));
                    }
                    thread::sleep(CONNECT_POLL_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        };

        // The handshake runs in blocking mode; polling starts afterwards.
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        let socket = tungstenite::accept(stream).map_err(|e| Error::Connect(e.to_string()))?;
        socket.get_ref().set_nonblocking(true)?;

        Ok(Self {
            socket,
            role: Role::Listener,
        })
    }

    /// Dial `host:port`, retrying until `deadline`.
    pub fn connect(host: &str, port: u16, deadline: Duration) -> Result<Self> {
        let addr = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::Connect(format!("cannot resolve {host}:{port}")))?;

        let expiry = Instant::now() + deadline;
        let stream = loop {
            let remaining = expiry.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                error!("could not reach {} within {:?}", addr, deadline);
                return Err(Error::Connect(format!("{addr}: connect deadline elapsed")));
            }
            match TcpStream::connect_timeout(&addr, remaining) {
                Ok(stream) => break stream,
                Err(e) => {
                    debug!("connect to {} failed ({}), retrying", addr, e);
                    thread::sleep(CONNECT_POLL_INTERVAL);
                }
            }
        };

        stream.set_nodelay(true)?;
        let (socket, _response) = tungstenite::client(format!("ws://{host}:{port}"), stream)
            .map_err(|e| Error::Connect(e.to_string()))?;
        socket.get_ref().set_nonblocking(true)?;
        info!("connected to {}", addr);

        Ok(Self {
            socket,
            role: Role::Connector,
        })
    }

    /// Role this endpoint was constructed with.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Queue one frame for the peer.
    ///
    /// A frame that cannot be written right away stays queued inside the
    /// socket and is flushed opportunistically by later send/receive
    /// calls.
    pub fn send(&mut self, frame: Vec<u8>) -> Result<()> {
        match self.socket.send(Message::Binary(frame)) {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Receive one frame under the given policy.
    ///
    /// `Immediate` returns `Ok(None)` when nothing is queued; the bounded
    /// policies poll at a fixed interval and fail with
    /// [`Error::Timeout`] when the bound elapses.
    pub fn receive(&mut self, timeout: ReceiveTimeout) -> Result<Option<Vec<u8>>> {
        let bound = match timeout {
            ReceiveTimeout::Immediate => return self.try_receive(),
            ReceiveTimeout::Bounded(d) => d,
            ReceiveTimeout::Default => DEFAULT_RECEIVE_TIMEOUT,
        };

        let expiry = Instant::now() + bound;
        loop {
            if let Some(frame) = self.try_receive()? {
                return Ok(Some(frame));
            }
            let remaining = expiry.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                error!("communication timed out after {:?}", bound);
                return Err(Error::Timeout(bound));
            }
            thread::sleep(remaining.min(RECV_POLL_INTERVAL));
        }
    }

    /// Flush anything still queued, giving up after `linger`, then close.
    pub fn close_gracefully(&mut self, linger: Duration) {
        let expiry = Instant::now() + linger;
        loop {
            match self.socket.flush() {
                Ok(()) => break,
                Err(tungstenite::Error::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= expiry {
                        debug!("discarding queued outbound data after {:?}", linger);
                        break;
                    }
                    thread::sleep(LINGER_POLL_INTERVAL);
                }
                Err(_) => break,
            }
        }
        let _ = self.socket.close(None);
        debug!("transport closed");
    }

    /// One non-blocking poll of the socket.
    fn try_receive(&mut self) -> Result<Option<Vec<u8>>> {
        self.flush_pending()?;
        match self.socket.read() {
            Ok(Message::Binary(frame)) => Ok(Some(frame)),
            Ok(Message::Text(text)) => Ok(Some(text.into_bytes())),
            // Control frames are transparent to callers.
            Ok(_) => Ok(None),
            Err(tungstenite::Error::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Push out frames left queued by a `send` that hit `WouldBlock`.
    fn flush_pending(&mut self) -> Result<()> {
        match self.socket.flush() {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(port: u16) -> (Transport, Transport) {
        let listener =
            thread::spawn(move || Transport::listen(port, Duration::from_secs(10)).unwrap());
        let connector =
            Transport::connect("127.0.0.1", port, Duration::from_secs(10)).unwrap();
        (listener.join().unwrap(), connector)
    }

    #[test]
    fn test_frames_cross_both_directions() {
        let (mut listener, mut connector) = pair(24701);

        connector.send(b"ping".to_vec()).unwrap();
        let got = listener
            .receive(ReceiveTimeout::Bounded(Duration::from_secs(5)))
            .unwrap();
        assert_eq!(got.as_deref(), Some(&b"ping"[..]));

        listener.send(b"pong".to_vec()).unwrap();
        let got = connector
            .receive(ReceiveTimeout::Bounded(Duration::from_secs(5)))
            .unwrap();
        assert_eq!(got.as_deref(), Some(&b"pong"[..]));
    }

    #[test]
    fn test_immediate_receive_returns_none_when_idle() {
        let (mut listener, _connector) = pair(24702);
        assert!(listener.receive(ReceiveTimeout::Immediate).unwrap().is_none());
    }

    #[test]
    fn test_bounded_receive_times_out() {
        let (mut listener, _connector) = pair(24703);
        let result = listener.receive(ReceiveTimeout::Bounded(Duration::from_millis(200)));
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[test]
    fn test_listen_times_out_without_peer() {
        let result = Transport::listen(24704, Duration::from_millis(200));
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[test]
    fn test_frames_arrive_in_send_order() {
        let (mut listener, mut connector) = pair(24705);
        for i in 0..10u8 {
            connector.send(vec![i]).unwrap();
        }
        for i in 0..10u8 {
            let got = listener
                .receive(ReceiveTimeout::Bounded(Duration::from_secs(5)))
                .unwrap();
            assert_eq!(got, Some(vec![i]));
        }
    }
}
