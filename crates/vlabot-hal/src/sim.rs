//! In-process simulation for running the controller without a simulator.
//!
//! [`SimRegistry`] builds a [`HardwareRegistry`] populated with stub devices
//! that record what they were told, and [`SimClock`] provides a fixed-step
//! clock.  Together they let the whole control loop run headless in tests
//! and in `vlabot controller`.
//!
//! # Example
//!
//! ```rust
//! use vlabot_hal::sim::{SimClock, SimRegistry};
//! use vlabot_hal::SimulationClock;
//!
//! let mut registry = SimRegistry::new().with_drive_base().build(26.0);
//! registry.enable_velocity_mode().unwrap();
//! registry.set_wheel_speeds(6.0, 6.0).unwrap();
//!
//! let mut clock = SimClock::new(32);
//! assert!(clock.step());
//! assert!((clock.time() - 0.032).abs() < 1e-9);
//! ```

use std::time::Duration;

use vlabot_types::VlaError;

use crate::actuator::Actuator;
use crate::camera::{Camera, CameraFrame, PixelFormat};
use crate::clock::SimulationClock;
use crate::gripper::Gripper;
use crate::registry::{
    ARM_LIFT_JOINT, END_EFFECTOR_JOINTS, GRIPPER, HardwareRegistry, WHEEL_JOINTS, WRIST_JOINT,
};

// ────────────────────────────────────────────────────────────────────────────
// Stub devices
// ────────────────────────────────────────────────────────────────────────────

/// A motor that records the last commanded position and velocity.
pub struct SimActuator {
    id: String,
    position: f64,
    velocity: f64,
}

impl SimActuator {
    pub fn new(id: impl Into<String>) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            position: 0.0,
            velocity: 0.0,
        })
    }
}

impl Actuator for SimActuator {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_position(&mut self, target_rad: f64) -> Result<(), VlaError> {
        self.position = target_rad;
        Ok(())
    }

    fn set_velocity(&mut self, rad_per_sec: f64) -> Result<(), VlaError> {
        self.velocity = rad_per_sec;
        Ok(())
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn velocity(&self) -> f64 {
        self.velocity
    }
}

/// A gripper that records its aperture.  Starts fully open.
pub struct SimGripper {
    id: String,
    aperture: f64,
}

impl SimGripper {
    pub fn new(id: impl Into<String>) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            aperture: 1.0,
        })
    }
}

impl Gripper for SimGripper {
    fn id(&self) -> &str {
        &self.id
    }

    fn open(&mut self, aperture: f64) -> Result<(), VlaError> {
        self.aperture = aperture.clamp(0.0, 1.0);
        Ok(())
    }

    fn close(&mut self, _force_percent: f64) -> Result<(), VlaError> {
        self.aperture = 0.0;
        Ok(())
    }

    fn aperture(&self) -> f64 {
        self.aperture
    }
}

/// A camera that renders a moving RGBA gradient.  The pattern shifts by one
/// step per capture so consecutive frames differ.
pub struct SimCamera {
    id: String,
    width: u32,
    height: u32,
    captures: u32,
}

impl SimCamera {
    pub fn new(id: impl Into<String>, width: u32, height: u32) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            width,
            height,
            captures: 0,
        })
    }

    /// RGBA buffer size for one capture.
    fn buffer_len(&self) -> usize {
        self.width as usize * self.height as usize * PixelFormat::BYTES_PER_PIXEL
    }
}

impl Camera for SimCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<CameraFrame, VlaError> {
        if self.width == 0 || self.height == 0 {
            return Err(VlaError::NoFrame(self.id.clone()));
        }
        let shift = self.captures;
        self.captures = self.captures.wrapping_add(1);
        let mut data = Vec::with_capacity(self.buffer_len());
        for y in 0..self.height {
            for x in 0..self.width {
                data.extend_from_slice(&[
                    (x.wrapping_add(shift) % 256) as u8,
                    (y % 256) as u8,
                    ((x + y) % 256) as u8,
                    255,
                ]);
            }
        }
        Ok(CameraFrame {
            width: self.width,
            height: self.height,
            format: PixelFormat::Rgba,
            data,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Clock
// ────────────────────────────────────────────────────────────────────────────

/// Fixed-step clock.  Time is derived from the integer step count so it
/// never accumulates floating-point drift.
///
/// By default a step returns immediately.  [`SimClock::realtime`] makes each
/// step also sleep for one step of wall-clock time, which is what a headless
/// controller run wants.
pub struct SimClock {
    step_ms: u64,
    steps: u64,
    max_steps: Option<u64>,
    realtime: bool,
}

impl SimClock {
    pub fn new(step_ms: u64) -> Self {
        Self {
            step_ms: step_ms.max(1),
            steps: 0,
            max_steps: None,
            realtime: false,
        }
    }

    /// Pace steps against the wall clock.
    pub fn realtime(mut self) -> Self {
        self.realtime = true;
        self
    }

    /// Terminate the simulation after `max_steps` calls to `step`.
    pub fn with_limit(mut self, max_steps: u64) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }
}

impl SimulationClock for SimClock {
    fn step(&mut self) -> bool {
        if self.max_steps.is_some_and(|max| self.steps >= max) {
            return false;
        }
        if self.realtime {
            std::thread::sleep(self.time_step());
        }
        self.steps += 1;
        true
    }

    fn time(&self) -> f64 {
        (self.steps * self.step_ms) as f64 / 1000.0
    }

    fn time_step(&self) -> Duration {
        Duration::from_millis(self.step_ms)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimRegistry builder
// ────────────────────────────────────────────────────────────────────────────

/// Builder for a [`HardwareRegistry`] backed by stub devices.
#[derive(Default)]
pub struct SimRegistry {
    actuators: Vec<Box<dyn Actuator>>,
    custom_actuators: Vec<Box<dyn Actuator>>,
    grippers: Vec<Box<dyn Gripper>>,
    cameras: Vec<Box<dyn Camera>>,
}

impl SimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Four skid-steer wheel motors.
    pub fn with_drive_base(mut self) -> Self {
        for id in WHEEL_JOINTS {
            self.actuators.push(SimActuator::new(id));
        }
        self
    }

    /// Arm lift joint, wrist joint and the three end-effector axes.
    pub fn with_arm(mut self) -> Self {
        self.actuators.push(SimActuator::new(ARM_LIFT_JOINT));
        self.actuators.push(SimActuator::new(WRIST_JOINT));
        for id in END_EFFECTOR_JOINTS {
            self.actuators.push(SimActuator::new(id));
        }
        self
    }

    pub fn with_gripper(mut self) -> Self {
        self.grippers.push(SimGripper::new(GRIPPER));
        self
    }

    pub fn with_camera(mut self, id: impl Into<String>, width: u32, height: u32) -> Self {
        self.cameras.push(SimCamera::new(id, width, height));
        self
    }

    /// Register a custom actuator, e.g. one that tracks commands for a test.
    /// Registered after the stock devices, so it replaces a stub of the same
    /// id.
    pub fn with_actuator(mut self, actuator: Box<dyn Actuator>) -> Self {
        self.custom_actuators.push(actuator);
        self
    }

    /// Register a custom camera.
    pub fn with_camera_driver(mut self, camera: Box<dyn Camera>) -> Self {
        self.cameras.push(camera);
        self
    }

    pub fn build(self, max_velocity: f64) -> HardwareRegistry {
        let mut registry = HardwareRegistry::new(max_velocity);
        for a in self.actuators.into_iter().chain(self.custom_actuators) {
            registry.register_actuator(a);
        }
        for g in self.grippers {
            registry.register_gripper(g);
        }
        for c in self.cameras {
            registry.register_camera(c);
        }
        registry
    }
}
