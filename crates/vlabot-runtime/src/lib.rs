//! `vlabot-runtime` – the robot side of the VLA pipeline.
//!
//! Turns model text into validated commands and executes them inside the
//! fixed-rate control loop.
//!
//! # Modules
//!
//! - [`interpreter`] – [`interpret`][interpreter::interpret]: free-form text
//!   to an ordered batch of vocabulary [`Command`][vlabot_types::Command]s,
//!   or a diagnostic carrying the raw text when nothing is valid.
//! - [`motion`] – [`MotionModel`][motion::MotionModel]: speed as a
//!   percentage of the maximum wheel velocity and the time-based motion law.
//! - [`engine`] – [`ExecutionEngine`][engine::ExecutionEngine]: the
//!   Idle/Executing state machine that polls the command mailbox and drains
//!   the queue one primitive at a time.
//! - [`frame_producer`] – [`FrameProducer`][frame_producer::FrameProducer]:
//!   camera buffer to a timestamped BMP on the image channel.
//! - [`controller`] – [`RobotController`][controller::RobotController]: the
//!   control loop tying clock, camera, and engine together.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with optional OTLP span export.

pub mod controller;
pub mod engine;
pub mod frame_producer;
pub mod interpreter;
pub mod motion;
pub mod telemetry;

pub use controller::{ControllerConfig, RobotController};
pub use engine::{BatchEvent, EngineConfig, ExecutionEngine, TickReport};
pub use frame_producer::FrameProducer;
pub use interpreter::{InterpretError, ItemError, format, format_batch, interpret};
pub use motion::{MotionError, MotionLimits, MotionModel, MotionPlan};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
