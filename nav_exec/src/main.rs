//! Main navigation executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging, and parameters
//!     - Start the input client, which receives poses and displacement reports in the background
//!     - Acquire the operator switches and bind the motor demands socket
//!     - Main loop, until Ctrl-C, SIGTERM or SIGHUP is received:
//!         - Sample the operator switches
//!         - Navigation control processing
//!         - Send the motor command
//!     - Stop the vehicle and release the switches

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{Report, eyre::WrapErr};
use log::info;

// Internal
use comms_if::net::{NetParams, zmq};
use nav_lib::{
    clock::SystemClock,
    goal_resolver::GoalResolver,
    hw_if::HwGuard,
    input_client::InputClient,
    motor_client::MotorClient,
    nav_ctrl::NavCtrl,
    params::NavExecParams,
    pose_tracker::PoseTracker,
    runner::Runner,
    signal,
};
use util::{
    host,
    module::State,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    // Initialise session
    let session = Session::new(
        "nav_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("UGV Navigation Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // Clear the running flag on Ctrl-C, SIGTERM or SIGHUP
    let running = signal::install_stop_handler()
        .wrap_err("Failed to set the stop signal handler")?;

    // ---- LOAD PARAMETERS ----

    let exec_params: NavExecParams = util::params::load("nav_exec.toml")
        .wrap_err("Could not load exec params")?;
    let net_params: NetParams = util::params::load("net.toml")
        .wrap_err("Could not load net params")?;

    let cycle_period = exec_params.cycle_period()
        .wrap_err("Invalid exec params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let resolver = GoalResolver::new(PoseTracker::new());

    let mut nav_ctrl = NavCtrl::new(resolver.clone());
    nav_ctrl.init("nav_exec.toml", &session)
        .wrap_err("Failed to initialise NavCtrl")?;
    info!("NavCtrl init complete");

    info!("Module initialisation complete\n");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = zmq::Context::new();

    let _input_client = InputClient::new(&zmq_ctx, &net_params, resolver)
        .wrap_err("Failed to initialise the InputClient")?;
    info!("InputClient initialised");

    let motor_client = MotorClient::new(&zmq_ctx, &net_params)
        .wrap_err("Failed to initialise the MotorClient")?;
    info!("MotorClient initialised");

    info!("Network initialisation complete");

    // ---- INITIALISE HARDWARE ----

    let switches = init_switches(&exec_params)?;

    // From here on the guard stops the vehicle and releases the switches on every exit path
    let hw = HwGuard::new(switches, motor_client);

    // ---- MAIN LOOP ----

    let mut runner = Runner::new(
        nav_ctrl,
        hw,
        SystemClock::new(),
        cycle_period
    );

    runner.run(&running);

    // ---- SHUTDOWN ----

    runner.shutdown();

    info!("Please flip the RTK switch OFF before the next run");
    info!("End of execution");

    Ok(())
}

/// Acquire the operator switch GPIO pins.
#[cfg(all(target_arch = "arm", target_os = "linux"))]
fn init_switches(
    params: &NavExecParams
) -> Result<nav_lib::hw_if::gpio::GpioSwitches, Report> {
    let s = nav_lib::hw_if::gpio::GpioSwitches::new(&params.switch_pins)
        .wrap_err("Failed to acquire the switch GPIO pins")?;
    info!("Switch GPIO pins acquired: {:?}", params.switch_pins);
    Ok(s)
}

/// Without GPIO the switches are fixed by the parameters.
#[cfg(not(all(target_arch = "arm", target_os = "linux")))]
fn init_switches(
    params: &NavExecParams
) -> Result<nav_lib::hw_if::FixedSwitches, Report> {
    log::warn!(
        "No GPIO on this target, using fixed switch state from parameters: {:?}",
        params.fixed_switches
    );
    Ok(nav_lib::hw_if::FixedSwitches::new(params.fixed_switches))
}
