//! # Network Module
//!
//! ZMQ networking for the navigation executable. Only publish-subscribe sockets are used: the
//! odometry and positioning sources publish to the executable, and the executable publishes motor
//! demands to the motor driver.
//!
//! Sockets are wrapped in a [`MonitoredSocket`], which tracks whether a peer is connected using a
//! ZMQ socket monitor. Connecting sockets see `CONNECTED` events, bound sockets see `ACCEPTED`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{Arc, atomic::{AtomicBool, AtomicUsize, Ordering}},
    thread
};
use log::{debug, warn};
use serde::Deserialize;
use zmq::{Context, Socket, SocketEvent, SocketType};

pub use zmq;

// ------------------------------------------------------------------------------------------------
// STATICS
// ------------------------------------------------------------------------------------------------

/// Counter giving each monitor a unique inproc endpoint.
static MONITOR_ID: AtomicUsize = AtomicUsize::new(0);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Network endpoints used by the navigation executable, loaded from `net.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct NetParams {
    /// Endpoint the visual odometry source publishes poses on.
    pub pose_endpoint: String,

    /// Endpoint the positioning source publishes displacement reports on.
    pub displacement_endpoint: String,

    /// Endpoint on which motor demands are published to the motor driver.
    pub motor_dems_endpoint: String,
}

/// A zmq socket with a background monitor reporting whether it is connected.
///
/// Dereferences to the underlying [`zmq::Socket`] for sending and receiving.
pub struct MonitoredSocket {
    socket: Socket,
    shutdown: Arc<AtomicBool>,
    connected: Arc<AtomicBool>
}

/// Options applied to a [`MonitoredSocket`].
///
/// Times are in milliseconds. The socket options match those of
/// [`zmq_setsockopt`](http://api.zeromq.org/4-2:zmq-setsockopt).
#[derive(Debug, Clone, Copy)]
pub struct SocketOptions {
    /// Bind to the endpoint rather than connecting to it.
    pub bind: bool,

    /// `ZMQ_LINGER`
    pub linger: i32,

    /// `ZMQ_RECONNECT_IVL`
    pub reconnect_ivl: i32,

    /// `ZMQ_CONNECT_TIMEOUT`
    pub connect_timeout: i32,

    /// `ZMQ_RCVTIMEO`, -1 blocks forever
    pub recv_timeout: i32,

    /// `ZMQ_SNDTIMEO`, -1 blocks forever
    pub send_timeout: i32,

    /// `ZMQ_HEARTBEAT_IVL`
    pub heartbeat_ivl: i32,

    /// `ZMQ_HEARTBEAT_TIMEOUT`
    pub heartbeat_timeout: i32,

    /// `ZMQ_HEARTBEAT_TTL`
    pub heartbeat_ttl: i32
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum MonitoredSocketError {
    #[error("Error creating the socket: {0}")]
    CreateSocketError(zmq::Error),

    #[error("Error enabling monitoring for the socket: {0}")]
    MonitoringEnableError(zmq::Error),

    #[error("Could not connect the socket: {0}")]
    CouldNotConnect(zmq::Error),

    #[error("Could not subscribe the socket: {0}")]
    SubscribeError(zmq::Error),

    #[error("Could not read event from monitor socket: {0}")]
    EventReadError(zmq::Error),

    #[error("Monitor event frame too short, expected at least 2 bytes, got {0}")]
    ShortEventFrame(usize),

    #[error("Could not set the {0} socket option: {1}")]
    SocketOptionError(&'static str, zmq::Error)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MonitoredSocket {
    /// Create a new monitored socket connected (or bound) to `endpoint`.
    ///
    /// `SUB` sockets are subscribed to every message.
    pub fn new(
        ctx: &Context,
        socket_type: SocketType,
        options: SocketOptions,
        endpoint: &str
    ) -> Result<Self, MonitoredSocketError> {
        let socket = ctx.socket(socket_type)
            .map_err(MonitoredSocketError::CreateSocketError)?;

        let monitor = open_monitor(ctx, &socket)?;

        options.apply(&socket)?;

        if let SocketType::SUB = socket_type {
            socket.set_subscribe(b"")
                .map_err(MonitoredSocketError::SubscribeError)?;
        }

        let result = if options.bind {
            socket.bind(endpoint)
        }
        else {
            socket.connect(endpoint)
        };
        result.map_err(MonitoredSocketError::CouldNotConnect)?;

        let connected = Arc::new(AtomicBool::new(false));

        debug!("Socket {} {}", if options.bind { "bound to" } else { "connecting to" }, endpoint);

        let shutdown = Arc::new(AtomicBool::new(false));

        // The monitor thread may be blocked on an event which never arrives, so it is detached.
        {
            let shutdown = shutdown.clone();
            let connected = connected.clone();
            thread::spawn(move || monitor_thread(monitor, shutdown, connected));
        }

        Ok(Self {
            socket,
            shutdown,
            connected
        })
    }

    /// Whether the socket currently has a connected peer.
    ///
    /// For a bound socket this is whether any peer has been accepted and not since disconnected.
    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

impl Drop for MonitoredSocket {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

impl std::ops::Deref for MonitoredSocket {
    type Target = Socket;

    fn deref(&self) -> &Self::Target {
        &self.socket
    }
}

impl std::ops::DerefMut for MonitoredSocket {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.socket
    }
}

impl SocketOptions {
    /// Options for a subscriber polling for messages.
    ///
    /// The short receive timeout lets receiving threads check for shutdown regularly.
    pub fn subscriber() -> Self {
        Self {
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: 10,
            send_timeout: 10,
            ..Default::default()
        }
    }

    /// Options for a bound publisher.
    ///
    /// Messages queued when the socket is closed are given `linger` ms to be sent.
    pub fn publisher(linger: i32) -> Self {
        Self {
            bind: true,
            linger,
            ..Self::subscriber()
        }
    }

    /// Apply the socket options to `socket`.
    pub fn apply(&self, socket: &Socket) -> Result<(), MonitoredSocketError> {
        let set = |name: &'static str, r: zmq::Result<()>| {
            r.map_err(|e| MonitoredSocketError::SocketOptionError(name, e))
        };

        set("connect_timeout", socket.set_connect_timeout(self.connect_timeout))?;
        set("heartbeat_ivl", socket.set_heartbeat_ivl(self.heartbeat_ivl))?;
        set("heartbeat_timeout", socket.set_heartbeat_timeout(self.heartbeat_timeout))?;
        set("heartbeat_ttl", socket.set_heartbeat_ttl(self.heartbeat_ttl))?;
        set("linger", socket.set_linger(self.linger))?;
        set("reconnect_ivl", socket.set_reconnect_ivl(self.reconnect_ivl))?;
        set("recv_timeout", socket.set_rcvtimeo(self.recv_timeout))?;
        set("send_timeout", socket.set_sndtimeo(self.send_timeout))
    }
}

impl Default for SocketOptions {
    /// The libzmq defaults, not bound.
    fn default() -> Self {
        Self {
            bind: false,
            connect_timeout: 0,
            heartbeat_ivl: 0,
            heartbeat_timeout: 0,
            heartbeat_ttl: 0,
            linger: 30_000,
            reconnect_ivl: 100,
            recv_timeout: -1,
            send_timeout: -1
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Enable monitoring of `socket` and return the connected monitor.
fn open_monitor(ctx: &Context, socket: &Socket) -> Result<Socket, MonitoredSocketError> {
    let endpoint = format!("inproc://monitor_{}", MONITOR_ID.fetch_add(1, Ordering::Relaxed));

    socket.monitor(&endpoint, SocketEvent::ALL as i32)
        .map_err(MonitoredSocketError::MonitoringEnableError)?;

    let monitor = ctx.socket(zmq::PAIR)
        .map_err(MonitoredSocketError::CreateSocketError)?;
    monitor.connect(&endpoint)
        .map_err(MonitoredSocketError::CouldNotConnect)?;

    Ok(monitor)
}

/// Read an event from a monitor socket.
///
/// Events are two frames, the event ID and value followed by the endpoint address. The address is
/// discarded.
fn read_event(monitor: &Socket) -> Result<SocketEvent, MonitoredSocketError> {
    let msg = monitor.recv_msg(0)
        .map_err(MonitoredSocketError::EventReadError)?;

    // The address frame is drained even if the event frame is bad
    if monitor.get_rcvmore().map_err(MonitoredSocketError::EventReadError)? {
        monitor.recv_msg(0)
            .map_err(MonitoredSocketError::EventReadError)?;
    }

    parse_event(&msg)
}

/// Decode the event ID from the first monitor frame.
fn parse_event(frame: &[u8]) -> Result<SocketEvent, MonitoredSocketError> {
    match frame {
        [a, b, ..] => Ok(SocketEvent::from_raw(u16::from_ne_bytes([*a, *b]))),
        _ => Err(MonitoredSocketError::ShortEventFrame(frame.len()))
    }
}

fn monitor_thread(
    monitor: Socket,
    shutdown: Arc<AtomicBool>,
    connected: Arc<AtomicBool>
) {
    while !shutdown.load(Ordering::Relaxed) {
        let event = match read_event(&monitor) {
            Ok(e) => e,
            Err(MonitoredSocketError::ShortEventFrame(len)) => {
                warn!("Ignoring short socket monitor frame ({} bytes)", len);
                continue;
            },
            Err(e) => {
                warn!("Error reading socket monitor event: {}", e);
                break;
            }
        };

        match event {
            SocketEvent::CONNECTED | SocketEvent::ACCEPTED => {
                connected.store(true, Ordering::Relaxed)
            },
            SocketEvent::DISCONNECTED => connected.store(false, Ordering::Relaxed),
            _ => ()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_publisher_options() {
        let opts = SocketOptions::publisher(500);
        assert!(opts.bind);
        assert_eq!(opts.linger, 500);
        assert_eq!(opts.recv_timeout, 10);

        let opts = SocketOptions::subscriber();
        assert!(!opts.bind);
    }

    #[test]
    fn test_parse_event() {
        let connected = (SocketEvent::CONNECTED as u16).to_ne_bytes();
        assert!(matches!(parse_event(&connected), Ok(SocketEvent::CONNECTED)));

        // Trailing event value bytes are ignored
        let mut accepted = (SocketEvent::ACCEPTED as u16).to_ne_bytes().to_vec();
        accepted.extend_from_slice(&[1, 0, 0, 0]);
        assert!(matches!(parse_event(&accepted), Ok(SocketEvent::ACCEPTED)));

        assert!(matches!(parse_event(&[]), Err(MonitoredSocketError::ShortEventFrame(0))));
        assert!(matches!(parse_event(&[7]), Err(MonitoredSocketError::ShortEventFrame(1))));
    }

    #[test]
    fn test_connection_tracked_on_both_ends() {
        let ctx = zmq::Context::new();

        let publisher = MonitoredSocket::new(
            &ctx, zmq::PUB, SocketOptions::publisher(0), "tcp://127.0.0.1:*"
        ).unwrap();
        assert!(!publisher.connected());

        let endpoint = publisher.get_last_endpoint().unwrap().unwrap();

        let subscriber = MonitoredSocket::new(
            &ctx, zmq::SUB, SocketOptions::subscriber(), &endpoint
        ).unwrap();

        let mut both = false;
        for _ in 0..200 {
            if publisher.connected() && subscriber.connected() {
                both = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(both);
    }

    #[test]
    fn test_net_params_from_toml() {
        let p: NetParams = toml::from_str(r#"
            pose_endpoint = "tcp://localhost:5010"
            displacement_endpoint = "tcp://localhost:5011"
            motor_dems_endpoint = "tcp://*:5020"
        "#).unwrap();

        assert_eq!(p.motor_dems_endpoint, "tcp://*:5020");
    }

    #[test]
    fn test_pub_sub_over_inproc() {
        let ctx = zmq::Context::new();

        let publisher = MonitoredSocket::new(
            &ctx, zmq::PUB, SocketOptions::publisher(0), "inproc://nav_test"
        ).unwrap();

        let subscriber = MonitoredSocket::new(
            &ctx, zmq::SUB, SocketOptions::subscriber(), "inproc://nav_test"
        ).unwrap();

        // Subscriptions propagate asynchronously, so publish until one arrives
        let mut received = None;
        for _ in 0..200 {
            publisher.send("hello", 0).unwrap();
            if let Ok(Ok(s)) = subscriber.recv_string(0) {
                received = Some(s);
                break;
            }
        }

        assert_eq!(received.as_deref(), Some("hello"));
    }
}
