//! Generic `Actuator` trait for wheel motors and arm joints.
//!
//! Motors follow the usual simulator contract: a finite target position puts
//! the motor in position control, while a target of `f64::INFINITY` switches
//! it to velocity control so [`Actuator::set_velocity`] drives it
//! continuously.  The [`HardwareRegistry`][crate::registry::HardwareRegistry]
//! is the only caller; the rest of the robot talks to the registry.

use vlabot_types::VlaError;

/// A motor or joint exposed by the robot body.
pub trait Actuator: Send + Sync {
    /// Stable device name, e.g. `"fl_wheel_joint"` or `"wrist_joint"`.
    fn id(&self) -> &str;

    /// Command a target position in radians.  `f64::INFINITY` selects
    /// velocity mode.
    ///
    /// # Errors
    ///
    /// Returns [`VlaError::HardwareFault`] if the device rejects the target.
    fn set_position(&mut self, target_rad: f64) -> Result<(), VlaError>;

    /// Command an angular velocity in rad/s.
    ///
    /// # Errors
    ///
    /// Returns [`VlaError::HardwareFault`] if the device rejects the command.
    fn set_velocity(&mut self, rad_per_sec: f64) -> Result<(), VlaError>;

    /// Most recently commanded position.
    fn position(&self) -> f64;

    /// Most recently commanded velocity.
    fn velocity(&self) -> f64;
}
