//! [`HardwareRegistry`] – device registry and command router.
//!
//! Holds every registered [`Actuator`], [`Gripper`] and [`Camera`] by name
//! and translates robot-level requests into device calls.
//!
//! # Drive base
//!
//! The base is a four-wheel skid-steer.  [`HardwareRegistry::set_wheel_speeds`]
//! drives both wheels on each side with the same velocity, clamped to
//! `±max_velocity`.  Register actuators named as in [`WHEEL_JOINTS`] and call
//! [`HardwareRegistry::enable_velocity_mode`] once before driving.
//!
//! # Manipulation
//!
//! [`HardwareRegistry::apply`] handles the non-locomotion vocabulary:
//!
//! | Command | Device |
//! |---|---|
//! | `grab(force)`, `close_gripper(force)` | [`GRIPPER`] closes |
//! | `release()`, `open_gripper(percent)` | [`GRIPPER`] opens |
//! | `lift_arm(deg)`, `lower_arm(deg)` | [`ARM_LIFT_JOINT`] moves relative |
//! | `rotate_wrist(deg)` | [`WRIST_JOINT`] moves relative |
//! | `pick/place/move_to_position(x, y, z)` | [`END_EFFECTOR_JOINTS`] |
//! | `detect_objects()` | [`CAMERA`] capture |
//! | `navigate_to`, `jump`, `swim` | not supported by a wheeled base |

use std::collections::HashMap;

use tracing::{debug, info};
use vlabot_types::{Command, CommandKind, VlaError};

use crate::actuator::Actuator;
use crate::camera::{Camera, CameraFrame};
use crate::gripper::Gripper;

/// Front-left, front-right, rear-left, rear-right wheel motors.
pub const WHEEL_JOINTS: [&str; 4] = [
    "fl_wheel_joint",
    "fr_wheel_joint",
    "rl_wheel_joint",
    "rr_wheel_joint",
];
pub const ARM_LIFT_JOINT: &str = "arm_lift_joint";
pub const WRIST_JOINT: &str = "wrist_joint";
pub const END_EFFECTOR_JOINTS: [&str; 3] = ["end_effector_x", "end_effector_y", "end_effector_z"];
pub const GRIPPER: &str = "gripper";
pub const CAMERA: &str = "camera rgb";

/// Default wheel velocity cap in rad/s.
pub const DEFAULT_MAX_VELOCITY: f64 = 26.0;

/// Central device registry.
pub struct HardwareRegistry {
    actuators: HashMap<String, Box<dyn Actuator>>,
    grippers: HashMap<String, Box<dyn Gripper>>,
    cameras: HashMap<String, Box<dyn Camera>>,
    max_velocity: f64,
}

impl Default for HardwareRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_VELOCITY)
    }
}

impl HardwareRegistry {
    /// Create an empty registry whose wheel commands are clamped to
    /// `±max_velocity`.
    pub fn new(max_velocity: f64) -> Self {
        Self {
            actuators: HashMap::new(),
            grippers: HashMap::new(),
            cameras: HashMap::new(),
            max_velocity: max_velocity.abs(),
        }
    }

    pub fn max_velocity(&self) -> f64 {
        self.max_velocity
    }

    /// Register an actuator.  A previous driver with the same id is replaced.
    pub fn register_actuator(&mut self, actuator: Box<dyn Actuator>) {
        self.actuators.insert(actuator.id().to_string(), actuator);
    }

    /// Register a gripper.  A previous driver with the same id is replaced.
    pub fn register_gripper(&mut self, gripper: Box<dyn Gripper>) {
        self.grippers.insert(gripper.id().to_string(), gripper);
    }

    /// Register a camera.  A previous driver with the same id is replaced.
    pub fn register_camera(&mut self, camera: Box<dyn Camera>) {
        self.cameras.insert(camera.id().to_string(), camera);
    }

    pub fn actuator(&self, id: &str) -> Option<&dyn Actuator> {
        self.actuators.get(id).map(|a| a.as_ref())
    }

    pub fn gripper(&self, id: &str) -> Option<&dyn Gripper> {
        self.grippers.get(id).map(|g| g.as_ref())
    }

    // -------------------------------------------------------------------------
    // Drive base
    // -------------------------------------------------------------------------

    /// Switch every wheel motor to velocity control and zero its velocity.
    ///
    /// # Errors
    ///
    /// Returns [`VlaError::HardwareFault`] if a wheel is not registered.
    pub fn enable_velocity_mode(&mut self) -> Result<(), VlaError> {
        for id in WHEEL_JOINTS {
            self.actuator_mut(id)?.set_position(f64::INFINITY)?;
        }
        self.stop()
    }

    /// Drive the left and right sides, clamping each to `±max_velocity`.
    ///
    /// # Errors
    ///
    /// Returns [`VlaError::HardwareFault`] if a wheel is missing or rejects
    /// the command.
    pub fn set_wheel_speeds(&mut self, left: f64, right: f64) -> Result<(), VlaError> {
        let left = left.clamp(-self.max_velocity, self.max_velocity);
        let right = right.clamp(-self.max_velocity, self.max_velocity);
        let [fl, fr, rl, rr] = WHEEL_JOINTS;
        self.actuator_mut(fl)?.set_velocity(left)?;
        self.actuator_mut(fr)?.set_velocity(right)?;
        self.actuator_mut(rl)?.set_velocity(left)?;
        self.actuator_mut(rr)?.set_velocity(right)?;
        Ok(())
    }

    /// Bring every wheel to zero velocity.
    ///
    /// # Errors
    ///
    /// Propagates the first wheel fault.
    pub fn stop(&mut self) -> Result<(), VlaError> {
        self.set_wheel_speeds(0.0, 0.0)
    }

    /// Current `(left, right)` commanded wheel velocities, read from the
    /// front wheels.
    pub fn wheel_speeds(&self) -> Option<(f64, f64)> {
        let left = self.actuator(WHEEL_JOINTS[0])?.velocity();
        let right = self.actuator(WHEEL_JOINTS[1])?.velocity();
        Some((left, right))
    }

    // -------------------------------------------------------------------------
    // Camera
    // -------------------------------------------------------------------------

    /// Capture from the named camera.
    ///
    /// # Errors
    ///
    /// Returns [`VlaError::HardwareFault`] if the camera is not registered or
    /// whatever the driver returns on failure.
    pub fn capture(&mut self, camera_id: &str) -> Result<CameraFrame, VlaError> {
        match self.cameras.get_mut(camera_id) {
            Some(cam) => cam.capture(),
            None => Err(not_registered("camera", camera_id)),
        }
    }

    // -------------------------------------------------------------------------
    // Manipulation / auxiliary commands
    // -------------------------------------------------------------------------

    /// Carry out the device effect of a non-locomotion command.
    ///
    /// # Errors
    ///
    /// Returns [`VlaError::InvalidCommand`] for locomotion commands and
    /// out-of-range arguments, and [`VlaError::HardwareFault`] when the
    /// required device is missing, fails, or the platform lacks the
    /// capability.
    pub fn apply(&mut self, command: &Command) -> Result<(), VlaError> {
        let a = |i: usize| command.arg(i).unwrap_or_default();
        match command.kind() {
            CommandKind::Grab | CommandKind::CloseGripper => {
                let force = a(0);
                check_percent(command, force)?;
                self.gripper_mut(GRIPPER)?.close(force)
            }
            CommandKind::Release => self.gripper_mut(GRIPPER)?.open(1.0),
            CommandKind::OpenGripper => {
                let percent = a(0);
                check_percent(command, percent)?;
                self.gripper_mut(GRIPPER)?.open(percent / 100.0)
            }
            CommandKind::LiftArm => self.rotate_joint(ARM_LIFT_JOINT, a(0)),
            CommandKind::LowerArm => self.rotate_joint(ARM_LIFT_JOINT, -a(0)),
            CommandKind::RotateWrist => self.rotate_joint(WRIST_JOINT, a(0)),
            CommandKind::MoveToPosition => self.move_end_effector(a(0), a(1), a(2)),
            CommandKind::Pick => {
                self.gripper_mut(GRIPPER)?.open(1.0)?;
                self.move_end_effector(a(0), a(1), a(2))?;
                self.gripper_mut(GRIPPER)?.close(100.0)
            }
            CommandKind::Place => {
                self.move_end_effector(a(0), a(1), a(2))?;
                self.gripper_mut(GRIPPER)?.open(1.0)
            }
            CommandKind::DetectObjects => {
                let frame = self.capture(CAMERA)?;
                info!(
                    width = frame.width,
                    height = frame.height,
                    "detect_objects: frame captured for the operator"
                );
                Ok(())
            }
            CommandKind::NavigateTo | CommandKind::Jump | CommandKind::Swim => {
                Err(VlaError::HardwareFault {
                    component: "drive_base".to_string(),
                    details: format!("{} is not supported by a wheeled base", command.kind()),
                })
            }
            CommandKind::GoAhead
            | CommandKind::GoBack
            | CommandKind::TurnLeft
            | CommandKind::TurnRight
            | CommandKind::ChangeSpeed => Err(VlaError::InvalidCommand {
                command: command.to_string(),
                reason: "drive commands are executed by the engine, not routed to devices"
                    .to_string(),
            }),
        }
    }

    fn rotate_joint(&mut self, id: &str, degrees: f64) -> Result<(), VlaError> {
        let joint = self.actuator_mut(id)?;
        let target = joint.position() + degrees.to_radians();
        debug!(joint = id, target_rad = target, "moving joint");
        joint.set_position(target)
    }

    fn move_end_effector(&mut self, x: f64, y: f64, z: f64) -> Result<(), VlaError> {
        for (id, target) in END_EFFECTOR_JOINTS.into_iter().zip([x, y, z]) {
            self.actuator_mut(id)?.set_position(target)?;
        }
        Ok(())
    }

    fn actuator_mut(&mut self, id: &str) -> Result<&mut Box<dyn Actuator>, VlaError> {
        self.actuators
            .get_mut(id)
            .ok_or_else(|| not_registered("actuator", id))
    }

    fn gripper_mut(&mut self, id: &str) -> Result<&mut Box<dyn Gripper>, VlaError> {
        self.grippers
            .get_mut(id)
            .ok_or_else(|| not_registered("gripper", id))
    }
}

fn not_registered(kind: &str, id: &str) -> VlaError {
    VlaError::HardwareFault {
        component: id.to_string(),
        details: format!("{kind} '{id}' is not registered"),
    }
}

fn check_percent(command: &Command, value: f64) -> Result<(), VlaError> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(VlaError::InvalidCommand {
            command: command.to_string(),
            reason: format!("{value} is outside 0..=100"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimRegistry;

    fn cmd(kind: CommandKind, args: &[f64]) -> Command {
        Command::new(kind, args.to_vec()).unwrap()
    }

    #[test]
    fn wheel_speeds_are_clamped() {
        let mut reg = SimRegistry::new().with_drive_base().build(10.0);
        reg.enable_velocity_mode().unwrap();
        reg.set_wheel_speeds(50.0, -50.0).unwrap();
        assert_eq!(reg.wheel_speeds(), Some((10.0, -10.0)));
        let rr = reg.actuator("rr_wheel_joint").unwrap();
        assert!((rr.velocity() + 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stop_zeroes_all_wheels() {
        let mut reg = SimRegistry::new().with_drive_base().build(26.0);
        reg.enable_velocity_mode().unwrap();
        reg.set_wheel_speeds(6.0, 6.0).unwrap();
        reg.stop().unwrap();
        for id in WHEEL_JOINTS {
            assert_eq!(reg.actuator(id).unwrap().velocity(), 0.0);
        }
    }

    #[test]
    fn velocity_mode_sets_infinite_position() {
        let mut reg = SimRegistry::new().with_drive_base().build(26.0);
        reg.enable_velocity_mode().unwrap();
        assert!(reg.actuator("fl_wheel_joint").unwrap().position().is_infinite());
    }

    #[test]
    fn missing_wheel_is_a_hardware_fault() {
        let mut reg = HardwareRegistry::default();
        let err = reg.set_wheel_speeds(1.0, 1.0).unwrap_err();
        assert!(matches!(err, VlaError::HardwareFault { .. }));
    }

    #[test]
    fn grab_and_release_drive_the_gripper() {
        let mut reg = SimRegistry::new().with_gripper().build(26.0);
        reg.apply(&cmd(CommandKind::Grab, &[50.0])).unwrap();
        assert!(reg.gripper(GRIPPER).unwrap().is_closed());
        reg.apply(&cmd(CommandKind::Release, &[])).unwrap();
        assert!((reg.gripper(GRIPPER).unwrap().aperture() - 1.0).abs() < f64::EPSILON);
        reg.apply(&cmd(CommandKind::OpenGripper, &[25.0])).unwrap();
        assert!((reg.gripper(GRIPPER).unwrap().aperture() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_range_gripper_percent_is_rejected() {
        let mut reg = SimRegistry::new().with_gripper().build(26.0);
        let err = reg.apply(&cmd(CommandKind::OpenGripper, &[150.0])).unwrap_err();
        assert!(matches!(err, VlaError::InvalidCommand { .. }));
    }

    #[test]
    fn arm_moves_relative_in_degrees() {
        let mut reg = SimRegistry::new().with_arm().build(26.0);
        reg.apply(&cmd(CommandKind::LiftArm, &[90.0])).unwrap();
        reg.apply(&cmd(CommandKind::LowerArm, &[45.0])).unwrap();
        let pos = reg.actuator(ARM_LIFT_JOINT).unwrap().position();
        assert!((pos - std::f64::consts::FRAC_PI_4).abs() < 1e-9);
    }

    #[test]
    fn pick_moves_then_closes() {
        let mut reg = SimRegistry::new().with_arm().with_gripper().build(26.0);
        reg.apply(&cmd(CommandKind::Pick, &[0.1, 0.2, 0.3])).unwrap();
        let z = reg.actuator("end_effector_z").unwrap().position();
        assert!((z - 0.3).abs() < f64::EPSILON);
        assert!(reg.gripper(GRIPPER).unwrap().is_closed());
    }

    #[test]
    fn unsupported_locomotion_faults() {
        let mut reg = SimRegistry::new().with_drive_base().build(26.0);
        let err = reg.apply(&cmd(CommandKind::Swim, &[1.0, 2.0])).unwrap_err();
        assert!(matches!(err, VlaError::HardwareFault { .. }));
        assert!(reg.apply(&cmd(CommandKind::NavigateTo, &[1.0, 2.0])).is_err());
    }

    #[test]
    fn drive_commands_are_not_routed() {
        let mut reg = SimRegistry::new().with_drive_base().build(26.0);
        let err = reg.apply(&cmd(CommandKind::GoAhead, &[1.0])).unwrap_err();
        assert!(matches!(err, VlaError::InvalidCommand { .. }));
    }

    #[test]
    fn detect_objects_requires_camera() {
        let mut reg = SimRegistry::new().build(26.0);
        assert!(reg.apply(&cmd(CommandKind::DetectObjects, &[])).is_err());
        let mut reg = SimRegistry::new().with_camera(CAMERA, 4, 3).build(26.0);
        reg.apply(&cmd(CommandKind::DetectObjects, &[])).unwrap();
    }
}
