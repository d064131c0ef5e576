//! Speed & Duration model for the four wheel-driven primitives.
//!
//! Speed is an absolute wheel velocity set as a percentage of the maximum.
//! Motions are open-loop: the engine holds constant wheel velocities for a
//! computed duration and then stops.
//!
//! - Linear: `duration = distance / (speed × linear_scale)`.
//! - Rotation: `duration = angle / 180 × π`, driven at a fixed differential
//!   `turn_velocity` that does not depend on the current speed.

use std::f64::consts::PI;

use thiserror::Error;
use tracing::warn;
use vlabot_types::{Command, CommandKind};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    #[error("{command} cannot run at zero speed")]
    ZeroSpeed { command: String },
    #[error("{command} has a negative magnitude")]
    NegativeMagnitude { command: String },
    #[error("speed {percent}% is outside 0..=100")]
    SpeedOutOfRange { percent: f64 },
    #[error("{0} is not a wheel motion")]
    NotAMotion(CommandKind),
}

/// Parameters of the motion law.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionLimits {
    /// Wheel velocity cap (rad/s); 100% speed.
    pub max_velocity: f64,
    /// Differential wheel velocity used for turns.
    pub turn_velocity: f64,
    /// `k` in `distance / (speed × k)`.
    pub linear_scale: f64,
    /// Longest single motion; longer durations are capped.
    pub max_motion_secs: f64,
}

impl Default for MotionLimits {
    fn default() -> Self {
        Self {
            max_velocity: 26.0,
            turn_velocity: 6.0,
            linear_scale: 0.01,
            max_motion_secs: 120.0,
        }
    }
}

/// Wheel velocities to hold and for how long.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionPlan {
    pub left: f64,
    pub right: f64,
    /// Seconds of simulated time.  Zero means stop immediately.
    pub duration: f64,
}

/// Current speed plus the motion law.
#[derive(Debug, Clone)]
pub struct MotionModel {
    limits: MotionLimits,
    speed: f64,
}

impl MotionModel {
    pub fn new(limits: MotionLimits, base_speed: f64) -> Self {
        let speed = base_speed.clamp(0.0, limits.max_velocity);
        Self { limits, speed }
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn limits(&self) -> &MotionLimits {
        &self.limits
    }

    /// `change_speed(percent)`: speed becomes `max_velocity × percent / 100`.
    ///
    /// # Errors
    ///
    /// [`MotionError::SpeedOutOfRange`] outside `0..=100`; the speed is left
    /// unchanged.
    pub fn change_speed(&mut self, percent: f64) -> Result<f64, MotionError> {
        if !(0.0..=100.0).contains(&percent) {
            return Err(MotionError::SpeedOutOfRange { percent });
        }
        self.speed = self.limits.max_velocity * percent / 100.0;
        Ok(self.speed)
    }

    /// Seconds needed to cover `distance` at the current speed.
    ///
    /// # Errors
    ///
    /// [`MotionError::NegativeMagnitude`] for a negative distance and
    /// [`MotionError::ZeroSpeed`] for a non-zero distance at speed 0.
    pub fn linear_duration(&self, distance: f64) -> Result<f64, MotionError> {
        if distance < 0.0 {
            return Err(MotionError::NegativeMagnitude {
                command: format!("move({distance})"),
            });
        }
        if distance == 0.0 {
            return Ok(0.0);
        }
        if self.speed <= 0.0 {
            return Err(MotionError::ZeroSpeed {
                command: format!("move({distance})"),
            });
        }
        Ok(self.cap(distance / (self.speed * self.limits.linear_scale)))
    }

    /// Seconds needed to turn by `degrees`.
    ///
    /// # Errors
    ///
    /// [`MotionError::NegativeMagnitude`] for a negative angle.
    pub fn rotation_duration(&self, degrees: f64) -> Result<f64, MotionError> {
        if degrees < 0.0 {
            return Err(MotionError::NegativeMagnitude {
                command: format!("turn({degrees})"),
            });
        }
        Ok(self.cap(degrees / 180.0 * PI))
    }

    /// Wheel velocities and duration for a locomotion command.
    ///
    /// # Errors
    ///
    /// [`MotionError::NotAMotion`] for anything but the four wheel
    /// primitives, plus the duration errors above (reported against the
    /// command's own text).
    pub fn plan(&self, command: &Command) -> Result<MotionPlan, MotionError> {
        let magnitude = command.arg(0).unwrap_or_default();
        let (left, right, duration) = match command.kind() {
            CommandKind::GoAhead => (self.speed, self.speed, self.linear_duration(magnitude)),
            CommandKind::GoBack => (-self.speed, -self.speed, self.linear_duration(magnitude)),
            CommandKind::TurnLeft => {
                let v = self.limits.turn_velocity;
                (-v, v, self.rotation_duration(magnitude))
            }
            CommandKind::TurnRight => {
                let v = self.limits.turn_velocity;
                (v, -v, self.rotation_duration(magnitude))
            }
            other => return Err(MotionError::NotAMotion(other)),
        };
        let duration = duration.map_err(|e| match e {
            MotionError::ZeroSpeed { .. } => MotionError::ZeroSpeed {
                command: command.to_string(),
            },
            MotionError::NegativeMagnitude { .. } => MotionError::NegativeMagnitude {
                command: command.to_string(),
            },
            other => other,
        })?;
        Ok(MotionPlan {
            left,
            right,
            duration,
        })
    }

    fn cap(&self, secs: f64) -> f64 {
        if secs > self.limits.max_motion_secs {
            warn!(
                requested = secs,
                cap = self.limits.max_motion_secs,
                "motion duration capped"
            );
            self.limits.max_motion_secs
        } else {
            secs
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> MotionModel {
        MotionModel::new(MotionLimits::default(), 6.0)
    }

    fn cmd(kind: CommandKind, arg: f64) -> Command {
        Command::new(kind, vec![arg]).unwrap()
    }

    #[test]
    fn half_and_full_turns() {
        let m = model();
        assert!((m.rotation_duration(180.0).unwrap() - PI).abs() < 1e-12);
        assert!((m.rotation_duration(90.0).unwrap() - PI / 2.0).abs() < 1e-12);
        let plan = m.plan(&cmd(CommandKind::TurnLeft, 180.0)).unwrap();
        assert!((plan.duration - PI).abs() < 1e-12);
        assert_eq!((plan.left, plan.right), (-6.0, 6.0));
    }

    #[test]
    fn rotation_ignores_scalar_speed() {
        let mut m = model();
        m.change_speed(100.0).unwrap();
        let plan = m.plan(&cmd(CommandKind::TurnRight, 90.0)).unwrap();
        assert_eq!((plan.left, plan.right), (6.0, -6.0));
        assert!((plan.duration - PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn linear_duration_follows_speed() {
        let m = model();
        // 1.0 / (6.0 * 0.01)
        let d = m.linear_duration(1.0).unwrap();
        assert!((d - 1.0 / 0.06).abs() < 1e-9);
        let back = m.plan(&cmd(CommandKind::GoBack, 1.0)).unwrap();
        assert_eq!((back.left, back.right), (-6.0, -6.0));
    }

    #[test]
    fn zero_distance_is_an_immediate_stop() {
        let mut m = model();
        assert_eq!(m.plan(&cmd(CommandKind::GoAhead, 0.0)).unwrap().duration, 0.0);
        m.change_speed(0.0).unwrap();
        assert_eq!(m.linear_duration(0.0).unwrap(), 0.0);
    }

    #[test]
    fn zero_speed_fails_linear_motion() {
        let mut m = model();
        m.change_speed(0.0).unwrap();
        let err = m.plan(&cmd(CommandKind::GoAhead, 1.0)).unwrap_err();
        assert_eq!(
            err,
            MotionError::ZeroSpeed {
                command: "go_ahead(1)".into()
            }
        );
        // Turns still work.
        assert!(m.plan(&cmd(CommandKind::TurnLeft, 90.0)).is_ok());
    }

    #[test]
    fn negative_magnitudes_fail() {
        let m = model();
        assert!(matches!(
            m.plan(&cmd(CommandKind::GoAhead, -1.0)),
            Err(MotionError::NegativeMagnitude { .. })
        ));
        assert!(matches!(
            m.plan(&cmd(CommandKind::TurnLeft, -90.0)),
            Err(MotionError::NegativeMagnitude { .. })
        ));
    }

    #[test]
    fn change_speed_is_percent_of_max() {
        let mut m = model();
        assert_eq!(m.change_speed(50.0).unwrap(), 13.0);
        assert!(matches!(
            m.change_speed(150.0),
            Err(MotionError::SpeedOutOfRange { .. })
        ));
        assert_eq!(m.speed(), 13.0);
    }

    #[test]
    fn long_motions_are_capped() {
        let m = model();
        // 100 / 0.06 ≈ 1667 s
        assert_eq!(m.linear_duration(100.0).unwrap(), 120.0);
    }

    #[test]
    fn non_motion_commands_have_no_plan() {
        let m = model();
        let err = m.plan(&cmd(CommandKind::ChangeSpeed, 10.0)).unwrap_err();
        assert_eq!(err, MotionError::NotAMotion(CommandKind::ChangeSpeed));
    }
}
