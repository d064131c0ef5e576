//! `vlabot-types` – shared vocabulary for every VLA robot process.
//!
//! The robot only ever executes commands drawn from a closed
//! [`VOCABULARY`].  Each entry fixes the command's textual name, its
//! argument arity, and whether executing it blocks the control loop.
//! Nothing outside the table can be constructed as a [`Command`].

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Vocabulary
// ─────────────────────────────────────────────────────────────────────────────

/// Every command name the robot understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    GoAhead,
    GoBack,
    TurnLeft,
    TurnRight,
    ChangeSpeed,
    Grab,
    Release,
    LiftArm,
    LowerArm,
    DetectObjects,
    NavigateTo,
    Pick,
    Place,
    OpenGripper,
    CloseGripper,
    RotateWrist,
    MoveToPosition,
    Jump,
    Swim,
}

/// How the execution engine treats a command once dequeued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionClass {
    /// Holds the control loop until the motion or device action completes.
    Blocking,
    /// Applies its effect and returns within the same tick.
    Instantaneous,
}

/// Number of numeric arguments a command accepts.
///
/// `optional` arguments are trailing; in text they may be omitted or left
/// empty (`jump(1.0, )`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arity {
    pub required: usize,
    pub optional: usize,
}

impl Arity {
    const fn exactly(n: usize) -> Self {
        Self {
            required: n,
            optional: 0,
        }
    }

    const fn between(min: usize, max: usize) -> Self {
        Self {
            required: min,
            optional: max - min,
        }
    }

    /// Largest accepted argument count.
    pub fn max(&self) -> usize {
        self.required + self.optional
    }

    /// `true` if `n` arguments satisfy this arity.
    pub fn accepts(&self, n: usize) -> bool {
        n >= self.required && n <= self.max()
    }
}

/// One row of the closed dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VocabularyEntry {
    pub name: &'static str,
    pub kind: CommandKind,
    pub arity: Arity,
    pub class: ExecutionClass,
}

const fn entry(
    name: &'static str,
    kind: CommandKind,
    arity: Arity,
    class: ExecutionClass,
) -> VocabularyEntry {
    VocabularyEntry {
        name,
        kind,
        arity,
        class,
    }
}

use ExecutionClass::{Blocking, Instantaneous};

/// The closed command vocabulary.  Anything not listed here is rejected.
pub const VOCABULARY: &[VocabularyEntry] = &[
    entry("go_ahead", CommandKind::GoAhead, Arity::exactly(1), Blocking),
    entry("go_back", CommandKind::GoBack, Arity::exactly(1), Blocking),
    entry("turn_left", CommandKind::TurnLeft, Arity::exactly(1), Blocking),
    entry("turn_right", CommandKind::TurnRight, Arity::exactly(1), Blocking),
    entry("change_speed", CommandKind::ChangeSpeed, Arity::exactly(1), Instantaneous),
    entry("grab", CommandKind::Grab, Arity::exactly(1), Blocking),
    entry("release", CommandKind::Release, Arity::exactly(0), Instantaneous),
    entry("lift_arm", CommandKind::LiftArm, Arity::exactly(1), Blocking),
    entry("lower_arm", CommandKind::LowerArm, Arity::exactly(1), Blocking),
    entry("detect_objects", CommandKind::DetectObjects, Arity::exactly(0), Instantaneous),
    entry("navigate_to", CommandKind::NavigateTo, Arity::exactly(2), Blocking),
    entry("pick", CommandKind::Pick, Arity::exactly(3), Blocking),
    entry("place", CommandKind::Place, Arity::exactly(3), Blocking),
    entry("open_gripper", CommandKind::OpenGripper, Arity::exactly(1), Instantaneous),
    entry("close_gripper", CommandKind::CloseGripper, Arity::exactly(1), Instantaneous),
    entry("rotate_wrist", CommandKind::RotateWrist, Arity::exactly(1), Blocking),
    entry("move_to_position", CommandKind::MoveToPosition, Arity::exactly(3), Blocking),
    entry("jump", CommandKind::Jump, Arity::between(1, 2), Blocking),
    entry("swim", CommandKind::Swim, Arity::exactly(2), Blocking),
];

impl CommandKind {
    /// Resolve a textual command name against the vocabulary.
    pub fn lookup(name: &str) -> Option<&'static VocabularyEntry> {
        VOCABULARY.iter().find(|e| e.name == name)
    }

    /// The vocabulary row for this kind.
    pub fn entry(self) -> &'static VocabularyEntry {
        &VOCABULARY[self.row()]
    }

    /// Position of this kind's row in [`VOCABULARY`].
    const fn row(self) -> usize {
        match self {
            CommandKind::GoAhead => 0,
            CommandKind::GoBack => 1,
            CommandKind::TurnLeft => 2,
            CommandKind::TurnRight => 3,
            CommandKind::ChangeSpeed => 4,
            CommandKind::Grab => 5,
            CommandKind::Release => 6,
            CommandKind::LiftArm => 7,
            CommandKind::LowerArm => 8,
            CommandKind::DetectObjects => 9,
            CommandKind::NavigateTo => 10,
            CommandKind::Pick => 11,
            CommandKind::Place => 12,
            CommandKind::OpenGripper => 13,
            CommandKind::CloseGripper => 14,
            CommandKind::RotateWrist => 15,
            CommandKind::MoveToPosition => 16,
            CommandKind::Jump => 17,
            CommandKind::Swim => 18,
        }
    }

    pub fn name(self) -> &'static str {
        self.entry().name
    }

    pub fn arity(self) -> Arity {
        self.entry().arity
    }

    pub fn class(self) -> ExecutionClass {
        self.entry().class
    }

    /// `true` for the four wheel-driven motion primitives.
    pub fn is_locomotion(self) -> bool {
        matches!(
            self,
            CommandKind::GoAhead | CommandKind::GoBack | CommandKind::TurnLeft | CommandKind::TurnRight
        )
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command
// ─────────────────────────────────────────────────────────────────────────────

/// A validated, immutable robot command.
///
/// Construction goes through [`Command::new`], which enforces the
/// vocabulary arity, so a `Command` value is always executable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    kind: CommandKind,
    args: Vec<f64>,
}

impl Command {
    /// Build a command, rejecting argument counts the vocabulary does not
    /// allow and non-finite arguments.
    ///
    /// # Errors
    ///
    /// Returns [`VlaError::InvalidCommand`] on an arity mismatch or a NaN /
    /// infinite argument.
    pub fn new(kind: CommandKind, args: Vec<f64>) -> Result<Self, VlaError> {
        let arity = kind.arity();
        if !arity.accepts(args.len()) {
            return Err(VlaError::InvalidCommand {
                command: kind.name().to_string(),
                reason: format!(
                    "expected {} argument(s), got {}",
                    if arity.optional == 0 {
                        arity.required.to_string()
                    } else {
                        format!("{}..={}", arity.required, arity.max())
                    },
                    args.len()
                ),
            });
        }
        if let Some(bad) = args.iter().find(|a| !a.is_finite()) {
            return Err(VlaError::InvalidCommand {
                command: kind.name().to_string(),
                reason: format!("argument {bad} is not a finite number"),
            });
        }
        Ok(Self { kind, args })
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn args(&self) -> &[f64] {
        &self.args
    }

    /// The `index`-th argument, if present.
    pub fn arg(&self, index: usize) -> Option<f64> {
        self.args.get(index).copied()
    }

    pub fn class(&self) -> ExecutionClass {
        self.kind.class()
    }
}

/// Formats as the textual call form, e.g. `turn_left(90)`.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.kind.name())?;
        for (i, a) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{a}")?;
        }
        f.write_str(")")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Frames and execution state
// ─────────────────────────────────────────────────────────────────────────────

/// A captured camera image published on the image channel.
///
/// Dimensions are only known when the file is an uncompressed bitmap (the
/// header is read on discovery); compressed frames carry `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Unix seconds embedded in the file name.
    pub capture_timestamp: i64,
    pub file_path: PathBuf,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Frame {
    /// Capture time as a UTC timestamp.
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.capture_timestamp, 0)
    }
}

/// Execution engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionState {
    #[default]
    Idle,
    Executing,
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Global error type spanning device faults, channel I/O, command
/// validation and inference transport.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VlaError {
    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("No frame available from {0}")]
    NoFrame(String),

    #[error("I/O error on {path}: {details}")]
    Io { path: String, details: String },

    #[error("No valid commands in batch: {raw:?}")]
    MalformedBatch { raw: String },

    #[error("Invalid command {command}: {reason}")]
    InvalidCommand { command: String, reason: String },

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl VlaError {
    /// Wrap an [`std::io::Error`] together with the path it concerns.
    pub fn io(path: impl AsRef<std::path::Path>, err: std::io::Error) -> Self {
        VlaError::Io {
            path: path.as_ref().display().to_string(),
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_one_entry() {
        for e in VOCABULARY {
            let rows = VOCABULARY.iter().filter(|r| r.kind == e.kind).count();
            assert_eq!(rows, 1, "{} appears {rows} times", e.name);
            assert_eq!(e.kind.entry().name, e.name);
        }
        assert_eq!(VOCABULARY.len(), 19);
    }

    #[test]
    fn row_index_matches_table_position() {
        for (i, e) in VOCABULARY.iter().enumerate() {
            assert_eq!(e.kind.row(), i, "{}", e.name);
            assert_eq!(e.kind.entry().kind, e.kind);
        }
    }

    #[test]
    fn lookup_is_exact_and_closed() {
        assert_eq!(CommandKind::lookup("go_ahead").unwrap().kind, CommandKind::GoAhead);
        assert!(CommandKind::lookup("Go_Ahead").is_none());
        assert!(CommandKind::lookup("stop").is_none());
        assert!(CommandKind::lookup("").is_none());
    }

    #[test]
    fn jump_accepts_one_or_two_arguments() {
        let arity = CommandKind::Jump.arity();
        assert!(!arity.accepts(0));
        assert!(arity.accepts(1));
        assert!(arity.accepts(2));
        assert!(!arity.accepts(3));
    }

    #[test]
    fn command_new_rejects_wrong_arity() {
        let err = Command::new(CommandKind::Pick, vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, VlaError::InvalidCommand { .. }));
        assert!(Command::new(CommandKind::Release, vec![1.0]).is_err());
        assert!(Command::new(CommandKind::Release, vec![]).is_ok());
    }

    #[test]
    fn command_new_rejects_non_finite() {
        assert!(Command::new(CommandKind::GoAhead, vec![f64::NAN]).is_err());
        assert!(Command::new(CommandKind::GoAhead, vec![f64::INFINITY]).is_err());
    }

    #[test]
    fn command_display_is_call_form() {
        let c = Command::new(CommandKind::MoveToPosition, vec![0.5, -1.0, 2.25]).unwrap();
        assert_eq!(c.to_string(), "move_to_position(0.5, -1, 2.25)");
        let r = Command::new(CommandKind::DetectObjects, vec![]).unwrap();
        assert_eq!(r.to_string(), "detect_objects()");
    }

    #[test]
    fn execution_classes_split_locomotion() {
        assert_eq!(CommandKind::GoAhead.class(), ExecutionClass::Blocking);
        assert_eq!(CommandKind::ChangeSpeed.class(), ExecutionClass::Instantaneous);
        assert!(CommandKind::TurnRight.is_locomotion());
        assert!(!CommandKind::Grab.is_locomotion());
    }

    #[test]
    fn frame_captured_at_converts_seconds() {
        let f = Frame {
            capture_timestamp: 1_700_000_000,
            file_path: PathBuf::from("/tmp/rosbot_image_1700000000.bmp"),
            width: Some(4),
            height: Some(4),
        };
        assert_eq!(f.captured_at().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn vla_error_display() {
        let err = VlaError::HardwareFault {
            component: "fl_wheel_joint".to_string(),
            details: "stalled".to_string(),
        };
        assert!(err.to_string().contains("fl_wheel_joint"));

        let err = VlaError::MalformedBatch {
            raw: "I cannot help with that".to_string(),
        };
        assert!(err.to_string().contains("I cannot help with that"));
    }

    #[test]
    fn vla_error_serialization_roundtrip() {
        let err = VlaError::NoFrame("camera rgb".to_string());
        let json = serde_json::to_string(&err).unwrap();
        let back: VlaError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
