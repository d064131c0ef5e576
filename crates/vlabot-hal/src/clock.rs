//! `SimulationClock` – the robot's fixed-rate control clock.
//!
//! The controller is cooperative with the simulator: nothing moves unless
//! [`SimulationClock::step`] is called, and the clock is the only scheduler.

use std::time::Duration;

/// Fixed-step control clock.
pub trait SimulationClock: Send {
    /// Advance the physics/actuator step by one control tick.
    ///
    /// Returns `false` once the simulation has terminated; callers must stop
    /// stepping.
    fn step(&mut self) -> bool;

    /// Simulated time in seconds since start.
    fn time(&self) -> f64;

    /// Length of one control tick.
    fn time_step(&self) -> Duration;
}
