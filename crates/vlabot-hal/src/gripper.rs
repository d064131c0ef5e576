//! `Gripper` trait for the end-of-arm tool.

use vlabot_types::VlaError;

/// A parallel gripper.
///
/// Aperture is a fraction in `0.0..=1.0` (closed to fully open); force is a
/// percentage of the device's rated grip force.
pub trait Gripper: Send + Sync {
    fn id(&self) -> &str;

    /// Open to `aperture`.
    ///
    /// # Errors
    ///
    /// Returns [`VlaError::HardwareFault`] if the command cannot be applied.
    fn open(&mut self, aperture: f64) -> Result<(), VlaError>;

    /// Close with `force_percent` of rated force.
    ///
    /// # Errors
    ///
    /// Returns [`VlaError::HardwareFault`] if the command cannot be applied.
    fn close(&mut self, force_percent: f64) -> Result<(), VlaError>;

    fn aperture(&self) -> f64;

    fn is_closed(&self) -> bool {
        self.aperture() <= 0.0
    }
}
