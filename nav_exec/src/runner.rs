//! # Control loop runner
//!
//! Drives [`NavCtrl`] at a fixed cadence. Each cycle the switches are sampled, NavCtrl is
//! processed, the resulting command is sent, and the cycle's report is archived. The loop then
//! sleeps for whatever remains of the cycle period.
//!
//! The runner owns the hardware through a [`HwGuard`], so however the runner ends (shutdown,
//! error, or panic) the vehicle is stopped and the switches released.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use log::{error, info, warn};

use crate::{
    clock::Clock,
    hw_if::{CommandSink, HwGuard, SwitchInput},
    motion_ctrl::MotorCommand,
    nav_ctrl::{NavCtrl, StatusReport},
    safety_gate::SwitchState,
};
use util::{
    archive::{ArchiveError, Archived},
    module::State,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct Runner<S: SwitchInput, C: CommandSink, K: Clock> {
    nav_ctrl: NavCtrl,
    hw: HwGuard<S, C>,
    clock: K,
    cycle_period: Duration,
    num_cycles: u64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<S: SwitchInput, C: CommandSink, K: Clock> Runner<S, C, K> {
    pub fn new(nav_ctrl: NavCtrl, hw: HwGuard<S, C>, clock: K, cycle_period: Duration) -> Self {
        Self {
            nav_ctrl,
            hw,
            clock,
            cycle_period,
            num_cycles: 0,
        }
    }

    /// Run cycles until `running` is cleared.
    ///
    /// The flag is checked once per cycle, before the cycle starts.
    pub fn run(&mut self, running: &AtomicBool) {
        info!("Begining main loop\n");

        while running.load(Ordering::Relaxed) {
            let cycle_start = self.clock.now();

            self.cycle();

            // ---- CYCLE MANAGEMENT ----

            let cycle_dur = self.clock.now().checked_sub(cycle_start).unwrap_or_default();

            match self.cycle_period.checked_sub(cycle_dur) {
                Some(d) => self.clock.sleep(d),
                None => warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - self.cycle_period.as_secs_f64()
                ),
            }
        }

        info!("Main loop stopped after {} cycles", self.num_cycles);
    }

    /// Perform a single cycle, returning the report of the cycle.
    pub fn cycle(&mut self) -> StatusReport {
        // ---- DATA INPUT ----

        let switches = match self.hw.sample() {
            Ok(s) => s,
            Err(e) => {
                warn!("Could not sample the switches, treating them as off: {}", e);
                SwitchState::all_off()
            }
        };

        // ---- CONTROL ALGORITHM PROCESSING ----

        let (cmd, report) = match self.nav_ctrl.proc(&switches) {
            Ok(o) => o,
            Err(e) => {
                warn!("Error during NavCtrl processing: {}", e);
                (MotorCommand::stop(), *self.nav_ctrl.report())
            }
        };

        // ---- OUTPUT ----

        if let Err(e) = self.hw.send(&cmd) {
            error!("Could not send the motor command: {}", e);
        }

        // ---- WRITE ARCHIVES ----

        match self.nav_ctrl.write() {
            Ok(()) | Err(ArchiveError::NotInit) => (),
            Err(e) => warn!("Could not write the NavCtrl archive: {}", e),
        }

        self.num_cycles += 1;

        report
    }

    pub fn num_cycles(&self) -> u64 {
        self.num_cycles
    }

    /// Stop the vehicle and release the hardware.
    pub fn shutdown(mut self) {
        info!("Shutting down after {} cycles", self.num_cycles);
        self.hw.release();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::f64::consts::FRAC_PI_6;

    use crate::{
        clock::fake::FakeClock,
        goal_resolver::{DisplacementReport, GoalResolver, ReportOutcome},
        hw_if::fake::{FakeSink, FakeSwitches},
        nav_ctrl::CycleAction,
        pose_tracker::PoseTracker,
        safety_gate::GateState,
    };
    use comms_if::eqpt::nav::MotorDems;

    const RTK_ONLY: SwitchState = SwitchState {
        rtk_available: true,
        operation_enabled: false,
        autonomous_enabled: false,
    };
    const ALL_ON: SwitchState = SwitchState {
        rtk_available: true,
        operation_enabled: true,
        autonomous_enabled: true,
    };

    /// Clock which clears the running flag after a number of sleeps.
    struct StopAfter {
        clock: FakeClock,
        sleeps_left: std::cell::Cell<usize>,
        running: Arc<AtomicBool>,
    }

    impl Clock for StopAfter {
        fn now(&self) -> Duration {
            self.clock.now()
        }

        fn sleep(&self, duration: Duration) {
            self.clock.sleep(duration);
            let left = self.sleeps_left.get().saturating_sub(1);
            self.sleeps_left.set(left);
            if left == 0 {
                self.running.store(false, Ordering::Relaxed);
            }
        }
    }

    fn dems(cmd: MotorCommand) -> (u8, u8, u8, u8) {
        let d = MotorDems::from(cmd);
        (d.left_speed, d.left_dir, d.right_speed, d.right_dir)
    }

    fn runner(
        switches: &FakeSwitches,
        sink: &FakeSink,
    ) -> (Runner<FakeSwitches, FakeSink, FakeClock>, GoalResolver, FakeClock) {
        let resolver = GoalResolver::new(PoseTracker::new());
        let clock = FakeClock::new();
        let runner = Runner::new(
            NavCtrl::new(resolver.clone()),
            HwGuard::new(switches.clone(), sink.clone()),
            clock.clone(),
            Duration::from_secs(1),
        );

        (runner, resolver, clock)
    }

    #[test]
    fn test_end_to_end() {
        let switches = FakeSwitches::new(vec![RTK_ONLY, ALL_ON, ALL_ON]);
        let sink = FakeSink::new();
        let (mut runner, resolver, _) = runner(&switches, &sink);
        let tracker = resolver.pose_tracker().clone();

        let report = DisplacementReport {
            dx_m: 5.0,
            dy_m: 0.0,
            straight_line_m: 5.0,
            turn_angle_deg: 60.0,
            current_bearing_deg: 30.0,
        };

        tracker.update_pose([0.0, 0.0, 0.0, 1.0], [0.0; 3]).unwrap();
        assert_eq!(
            resolver.on_displacement_report(report).unwrap(),
            ReportOutcome::RotationNotInitialised
        );

        // Cycle 1: rotation initialised from the 30 deg bearing
        let rpt = runner.cycle();
        assert_eq!(rpt.action, CycleAction::InitRotation);
        assert_eq!(rpt.gate_state, GateState::Run);

        let m = *resolver.rotation().unwrap().matrix();
        assert!((m[(0, 0)] - 0.5).abs() < 1e-9);
        assert!((m[(0, 1)] + 0.8660254037844386).abs() < 1e-9);
        assert!((m[(1, 0)] - 0.8660254037844386).abs() < 1e-9);
        assert!((m[(1, 1)] - 0.5).abs() < 1e-9);

        let goal = match resolver.on_displacement_report(report).unwrap() {
            ReportOutcome::GoalUpdated(g) => g,
            o => panic!("Expected a goal, got {:?}", o),
        };
        assert!((goal.position_m[0] - 2.5).abs() < 1e-9);
        assert!((goal.position_m[1] - 4.330127018922193).abs() < 1e-9);
        assert_eq!(goal.yaw_deg, 60.0);

        // Cycle 2: facing the wrong way, turn clockwise
        let rpt = runner.cycle();
        assert_eq!(rpt.action, CycleAction::TurnCw);
        assert_eq!(dems(sink.last().unwrap()), (15, 1, 15, 0));

        // The vehicle has turned to face the goal
        tracker.update_pose([0.0, 0.0, FRAC_PI_6.sin(), FRAC_PI_6.cos()], [0.0; 3]).unwrap();

        // Cycle 3: drive straight
        let rpt = runner.cycle();
        assert_eq!(rpt.action, CycleAction::Straight);
        assert_eq!(rpt.yaw_error_deg, Some(0.0));
        assert!((rpt.distance_m.unwrap() - 5.0).abs() < 1e-9);
        assert_eq!(dems(sink.last().unwrap()), (37, 1, 37, 1));

        runner.shutdown();

        assert_eq!(sink.sent().len(), 4);
        assert_eq!(sink.last(), Some(MotorCommand::stop()));
        assert_eq!(switches.release_count(), 1);
    }

    #[test]
    fn test_run_until_flag_cleared() {
        let switches = FakeSwitches::new(vec![RTK_ONLY]);
        let sink = FakeSink::new();
        let resolver = GoalResolver::new(PoseTracker::new());
        let running = Arc::new(AtomicBool::new(true));

        let clock = StopAfter {
            clock: FakeClock::new(),
            sleeps_left: std::cell::Cell::new(5),
            running: running.clone(),
        };
        let fake_clock = clock.clock.clone();

        let mut runner = Runner::new(
            NavCtrl::new(resolver.clone()),
            HwGuard::new(switches.clone(), sink.clone()),
            clock,
            Duration::from_secs(1),
        );

        runner.run(&running);

        assert_eq!(runner.num_cycles(), 5);
        assert_eq!(switches.samples(), 5);

        // No time passes during a fake cycle, so each sleep is the full period
        assert_eq!(fake_clock.sleeps(), vec![Duration::from_secs(1); 5]);
        assert_eq!(fake_clock.now(), Duration::from_secs(5));

        // No bearing ever arrived so every command was a stop
        assert!(sink.sent().iter().all(|c| c.is_stop()));

        runner.shutdown();

        assert_eq!(sink.sent().len(), 6);
        assert_eq!(sink.last(), Some(MotorCommand::stop()));
        assert_eq!(switches.release_count(), 1);
    }

    #[test]
    fn test_stop_before_running() {
        let switches = FakeSwitches::new(vec![]);
        let sink = FakeSink::new();
        let (mut runner, _, clock) = runner(&switches, &sink);

        runner.run(&AtomicBool::new(false));
        assert_eq!(runner.num_cycles(), 0);
        assert!(clock.sleeps().is_empty());

        drop(runner);

        assert_eq!(sink.sent(), vec![MotorCommand::stop()]);
        assert_eq!(switches.release_count(), 1);
    }

    #[test]
    fn test_dropped_mid_motion_stops() {
        let switches = FakeSwitches::new(vec![RTK_ONLY, ALL_ON]);
        let sink = FakeSink::new();
        let (mut runner, resolver, _) = runner(&switches, &sink);

        resolver.pose_tracker().update_pose([0.0, 0.0, 0.0, 1.0], [0.0; 3]).unwrap();
        let report = DisplacementReport {
            dx_m: 0.0,
            dy_m: 5.0,
            straight_line_m: 5.0,
            turn_angle_deg: 0.0,
            current_bearing_deg: 90.0,
        };
        resolver.on_displacement_report(report).unwrap();
        runner.cycle();
        resolver.on_displacement_report(report).unwrap();

        assert_eq!(runner.cycle().action, CycleAction::Straight);

        // An error path unwinding out of main drops the runner without an explicit shutdown
        drop(runner);

        assert_eq!(sink.last(), Some(MotorCommand::stop()));
        assert_eq!(switches.release_count(), 1);
    }

    #[test]
    fn test_switch_failure_treated_as_off() {
        let switches = FakeSwitches::new(vec![RTK_ONLY]);
        let sink = FakeSink::new();
        let (mut runner, resolver, _) = runner(&switches, &sink);

        resolver.pose_tracker().update_pose([0.0, 0.0, 0.0, 1.0], [0.0; 3]).unwrap();
        let report = DisplacementReport {
            dx_m: 5.0,
            dy_m: 0.0,
            straight_line_m: 5.0,
            turn_angle_deg: 0.0,
            current_bearing_deg: 90.0,
        };
        resolver.on_displacement_report(report).unwrap();
        runner.cycle();
        resolver.on_displacement_report(report).unwrap();

        switches.push_all(vec![ALL_ON]);
        assert_eq!(runner.cycle().action, CycleAction::Straight);

        switches.push_failure();
        let rpt = runner.cycle();
        assert_eq!(rpt.action, CycleAction::StopAutonomousOff);
        assert!(sink.last().unwrap().is_stop());
    }

    #[test]
    fn test_overrun_does_not_sleep() {
        /// Clock where every cycle takes longer than the period, stopping after one cycle.
        struct SlowClock {
            clock: FakeClock,
            readings: std::cell::Cell<usize>,
            running: Arc<AtomicBool>,
        }

        impl Clock for SlowClock {
            fn now(&self) -> Duration {
                self.clock.advance(Duration::from_millis(1500));

                // Each cycle reads the clock at its start and end
                self.readings.set(self.readings.get() + 1);
                if self.readings.get() >= 2 {
                    self.running.store(false, Ordering::Relaxed);
                }

                self.clock.now()
            }

            fn sleep(&self, duration: Duration) {
                self.clock.sleep(duration)
            }
        }

        let running = Arc::new(AtomicBool::new(true));
        let fake = FakeClock::new();
        let switches = FakeSwitches::new(vec![]);
        let sink = FakeSink::new();

        let mut runner = Runner::new(
            NavCtrl::new(GoalResolver::new(PoseTracker::new())),
            HwGuard::new(switches, sink.clone()),
            SlowClock {
                clock: fake.clone(),
                readings: std::cell::Cell::new(0),
                running: running.clone(),
            },
            Duration::from_secs(1),
        );

        runner.run(&running);

        assert_eq!(runner.num_cycles(), 1);
        assert!(fake.sleeps().is_empty());
        assert_eq!(sink.sent().len(), 1);
    }
}
