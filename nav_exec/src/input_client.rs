//! # Input Client
//!
//! Receives the two asynchronous inputs of the navigation executable:
//!
//! - Vehicle poses from the visual odometry source, pushed into a [`PoseTracker`].
//! - Displacement reports from the positioning source, pushed into a [`GoalResolver`].
//!
//! Both sources publish JSON messages as often as they like, each is received on its own
//! background thread so neither can hold up the other or the control loop.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{Arc, atomic::{AtomicBool, Ordering}},
    thread::{self, JoinHandle}
};
use log::{error, info, trace, warn};

use comms_if::{
    eqpt::nav::{DisplacementMsg, PoseMsg},
    net::{MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions, zmq}
};
use crate::{
    goal_resolver::{GoalError, GoalResolver, ReportOutcome},
    pose_tracker::{PoseError, PoseTracker}
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Client receiving poses and displacement reports in the background.
///
/// The background threads are stopped when the client is dropped.
pub struct InputClient {
    bg_run: Arc<AtomicBool>,
    pose_jh: Option<JoinHandle<()>>,
    displacement_jh: Option<JoinHandle<()>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum InputClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not deserialize the message: {0}")]
    DeserializeError(serde_json::Error),

    #[error("Pose rejected: {0}")]
    PoseError(PoseError),

    #[error("Displacement report rejected: {0}")]
    GoalError(GoalError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl InputClient {
    /// Connect to both sources and start the background threads.
    ///
    /// This function will not block until the sources connect.
    pub fn new(
        ctx: &zmq::Context,
        params: &NetParams,
        resolver: GoalResolver
    ) -> Result<Self, InputClientError> {
        let pose_socket = MonitoredSocket::new(
            ctx,
            zmq::SUB,
            SocketOptions::subscriber(),
            &params.pose_endpoint
        ).map_err(InputClientError::SocketError)?;

        let displacement_socket = MonitoredSocket::new(
            ctx,
            zmq::SUB,
            SocketOptions::subscriber(),
            &params.displacement_endpoint
        ).map_err(InputClientError::SocketError)?;

        let bg_run = Arc::new(AtomicBool::new(true));

        let pose_jh = {
            let run = bg_run.clone();
            let tracker = resolver.pose_tracker().clone();
            thread::spawn(move || bg_thread(pose_socket, run, "pose", |msg| {
                handle_pose_msg(&tracker, msg)
            }))
        };

        let displacement_jh = {
            let run = bg_run.clone();
            thread::spawn(move || bg_thread(displacement_socket, run, "displacement", |msg| {
                handle_displacement_msg(&resolver, msg).map(|_| ())
            }))
        };

        info!(
            "InputClient listening for poses on {} and displacements on {}",
            params.pose_endpoint, params.displacement_endpoint
        );

        Ok(Self {
            bg_run,
            pose_jh: Some(pose_jh),
            displacement_jh: Some(displacement_jh),
        })
    }
}

impl Drop for InputClient {
    fn drop(&mut self) {
        self.bg_run.store(false, Ordering::Relaxed);

        for jh in vec![self.pose_jh.take(), self.displacement_jh.take()].into_iter().flatten() {
            if jh.join().is_err() {
                error!("InputClient background thread panicked");
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Decode a pose message and push it into the tracker.
pub fn handle_pose_msg(tracker: &PoseTracker, msg: &str) -> Result<(), InputClientError> {
    let pose: PoseMsg = serde_json::from_str(msg)
        .map_err(InputClientError::DeserializeError)?;

    tracker.update_pose(pose.orientation_q, pose.position_m)
        .map(|_| ())
        .map_err(InputClientError::PoseError)
}

/// Decode a displacement message and pass it to the resolver.
pub fn handle_displacement_msg(
    resolver: &GoalResolver,
    msg: &str
) -> Result<ReportOutcome, InputClientError> {
    let displacement: DisplacementMsg = serde_json::from_str(msg)
        .map_err(InputClientError::DeserializeError)?;

    resolver.on_displacement_report(displacement.into())
        .map_err(InputClientError::GoalError)
}

/// Background thread, hands every message received on the socket to `handler`.
///
/// Connection changes of the source are logged, messages are still polled while disconnected so
/// that nothing is missed on reconnection.
fn bg_thread<F>(socket: MonitoredSocket, run: Arc<AtomicBool>, source: &str, handler: F)
where
    F: Fn(&str) -> Result<(), InputClientError>
{
    let mut source_connected = false;

    while run.load(Ordering::Relaxed) {
        let connected = socket.connected();
        if connected != source_connected {
            match connected {
                true => info!("The {} source has connected", source),
                false => warn!("The {} source has disconnected", source)
            }
            source_connected = connected;
        }

        let msg = match socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                warn!("Non UTF-8 {} message", source);
                continue
            },
            Err(zmq::Error::EAGAIN) => continue,
            Err(e) => {
                error!("Error receiving {} message: {:?}", source, e);
                break
            }
        };

        trace!("{} message: {}", source, msg);

        if let Err(e) = handler(&msg) {
            warn!("Could not handle {} message: {}", source, e);
        }
    }
}
