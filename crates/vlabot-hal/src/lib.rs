//! `vlabot-hal` – device collaborators of the robot controller.
//!
//! The controller never talks to a simulator or driver directly.  It goes
//! through the traits defined here and the [`HardwareRegistry`] that routes
//! drive and manipulation requests to named devices.
//!
//! # Modules
//!
//! - [`actuator`] – [`Actuator`]: position/velocity controlled motors.
//! - [`camera`] – [`Camera`] and the raw [`CameraFrame`] pixel buffer.
//! - [`gripper`] – [`Gripper`]: the end-of-arm tool.
//! - [`clock`] – [`SimulationClock`]: the fixed-rate control clock.
//! - [`registry`] – [`HardwareRegistry`]: device lookup, skid-steer drive
//!   mapping with velocity clamping, and manipulation routing.
//! - [`sim`] – stub devices and [`SimClock`][sim::SimClock] for headless runs.

pub mod actuator;
pub mod camera;
pub mod clock;
pub mod gripper;
pub mod registry;
pub mod sim;

pub use actuator::Actuator;
pub use camera::{Camera, CameraFrame, PixelFormat};
pub use clock::SimulationClock;
pub use gripper::Gripper;
pub use registry::HardwareRegistry;
