//! Fake hardware used to test the control loop without a vehicle.
//!
//! Both fakes are cheap handles around shared state, so a test can keep a clone to inspect after
//! the original has been moved into (and dropped by) a [`HwGuard`](super::HwGuard).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{CommandSink, HwIfError, SwitchInput};
use crate::motion_ctrl::MotorCommand;
use crate::safety_gate::SwitchState;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Switches which play back a scripted sequence of states.
///
/// Once the script runs out the last state is repeated.
#[derive(Debug, Clone, Default)]
pub struct FakeSwitches {
    inner: Arc<Mutex<SwitchesInner>>,
}

#[derive(Debug, Default)]
struct SwitchesInner {
    script: VecDeque<Result<SwitchState, ()>>,
    last: SwitchState,
    samples: usize,
    release_count: usize,
}

/// Sink recording every command it is sent.
#[derive(Debug, Clone, Default)]
pub struct FakeSink {
    inner: Arc<Mutex<SinkInner>>,
}

#[derive(Debug, Default)]
struct SinkInner {
    sent: Vec<MotorCommand>,
    fail: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FakeSwitches {
    pub fn new(script: Vec<SwitchState>) -> Self {
        let fake = Self::default();
        fake.push_all(script);
        fake
    }

    /// Append states to the script.
    pub fn push_all(&self, states: Vec<SwitchState>) {
        self.inner.lock().unwrap().script.extend(states.into_iter().map(Ok));
    }

    /// Make the next sample fail.
    pub fn push_failure(&self) {
        self.inner.lock().unwrap().script.push_back(Err(()));
    }

    pub fn samples(&self) -> usize {
        self.inner.lock().unwrap().samples
    }

    pub fn release_count(&self) -> usize {
        self.inner.lock().unwrap().release_count
    }
}

impl SwitchInput for FakeSwitches {
    fn sample(&mut self) -> Result<SwitchState, HwIfError> {
        let mut inner = self.inner.lock().unwrap();
        inner.samples += 1;

        match inner.script.pop_front() {
            Some(Ok(s)) => {
                inner.last = s;
                Ok(s)
            }
            Some(Err(())) => Err(HwIfError::GpioError("scripted failure".into())),
            None => Ok(inner.last),
        }
    }

    fn release(&mut self) {
        self.inner.lock().unwrap().release_count += 1;
    }
}

impl FakeSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink which rejects every command.
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.inner.lock().unwrap().fail = true;
        sink
    }

    pub fn sent(&self) -> Vec<MotorCommand> {
        self.inner.lock().unwrap().sent.clone()
    }

    pub fn last(&self) -> Option<MotorCommand> {
        self.inner.lock().unwrap().sent.last().copied()
    }
}

impl CommandSink for FakeSink {
    fn send(&mut self, cmd: &MotorCommand) -> Result<(), HwIfError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.fail {
            return Err(HwIfError::SendError("scripted failure".into()));
        }

        inner.sent.push(*cmd);
        Ok(())
    }
}
