//! # Motor Client
//!
//! Publishes motor demands to the motor driver. Demands are sent as [`MotorDems`] JSON strings
//! every cycle, the motor driver subscribes to them and applies the most recent one.
//!
//! A PUB socket silently drops messages when nobody is subscribed, so the client warns whenever the
//! motor driver is not connected.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, trace, warn};

use comms_if::{
    eqpt::nav::MotorDems,
    net::{MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions, zmq}
};
use crate::{
    hw_if::{CommandSink, HwIfError},
    motion_ctrl::MotorCommand
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Publisher of motor demands.
pub struct MotorClient {
    socket: MonitoredSocket,

    /// Connection state at the last send, used to log changes.
    driver_connected: bool
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum MotorClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send demands to the motor driver: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialize the demands: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MotorClient {
    /// Bind the demands socket.
    ///
    /// This function will not block until the motor driver connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, MotorClientError> {
        // Allow the final stop demand to be flushed when the socket is closed
        let socket_options = SocketOptions::publisher(500);

        let socket = MonitoredSocket::new(
            ctx,
            zmq::PUB,
            socket_options,
            &params.motor_dems_endpoint
        ).map_err(MotorClientError::SocketError)?;

        Ok(Self {
            socket,
            driver_connected: true
        })
    }

    /// Publish a set of demands.
    pub fn send_demands(&mut self, dems: &MotorDems) -> Result<(), MotorClientError> {
        let dems_string = serde_json::to_string(dems)
            .map_err(MotorClientError::SerializationError)?;

        self.check_driver_connected();

        trace!("Sending demands: {}", dems_string);

        self.socket.send(dems_string.as_str(), 0)
            .map_err(MotorClientError::SendError)
    }

    /// Whether the motor driver is subscribed to the demands.
    pub fn driver_connected(&self) -> bool {
        self.socket.connected()
    }

    fn check_driver_connected(&mut self) {
        let connected = self.driver_connected();

        if connected != self.driver_connected {
            match connected {
                true => info!("Motor driver connected"),
                false => warn!("No motor driver connected, demands are not being received")
            }
            self.driver_connected = connected;
        }
    }
}

impl CommandSink for MotorClient {
    fn send(&mut self, cmd: &MotorCommand) -> Result<(), HwIfError> {
        self.send_demands(&MotorDems::from(*cmd))
            .map_err(|e| HwIfError::SendError(e.to_string()))
    }
}
