//! [`RobotController`] – the fixed-rate control loop.
//!
//! Every tick the controller steps the clock, publishes a camera frame and
//! hands the tick to the [`ExecutionEngine`].  Nothing else drives the
//! devices: a blocking motion consumes clock steps inside the engine, and
//! no frames are captured while it runs.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::atomic::AtomicBool;
//! use vlabot_hal::registry::CAMERA;
//! use vlabot_hal::sim::{SimClock, SimRegistry};
//! use vlabot_runtime::controller::{ControllerConfig, RobotController};
//!
//! let registry = SimRegistry::new()
//!     .with_drive_base()
//!     .with_camera(CAMERA, 64, 48)
//!     .build(26.0);
//! let mut controller =
//!     RobotController::new(ControllerConfig::default(), registry, SimClock::new(32).realtime())
//!         .expect("drive base missing");
//! controller.run(&AtomicBool::new(false)).expect("failed to stop wheels");
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, warn};
use vlabot_hal::registry::CAMERA;
use vlabot_hal::{HardwareRegistry, SimulationClock};
use vlabot_relay::{CommandMailbox, FrameChannel};
use vlabot_types::VlaError;

use crate::engine::{EngineConfig, ExecutionEngine};
use crate::frame_producer::FrameProducer;

/// Configuration bundle for [`RobotController`].
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Shared directory holding frames and the command file.
    pub exchange_dir: PathBuf,
    pub image_prefix: String,
    pub command_file: String,
    pub camera_id: String,
    pub engine: EngineConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            exchange_dir: std::env::temp_dir(),
            image_prefix: "rosbot_image".to_string(),
            command_file: "rosbot_commands.json".to_string(),
            camera_id: CAMERA.to_string(),
            engine: EngineConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn command_path(&self) -> PathBuf {
        self.exchange_dir.join(&self.command_file)
    }

    pub fn frame_channel(&self) -> FrameChannel {
        FrameChannel::new(&self.exchange_dir, &self.image_prefix)
    }
}

pub struct RobotController<C: SimulationClock> {
    registry: HardwareRegistry,
    clock: C,
    producer: FrameProducer,
    engine: ExecutionEngine,
}

impl<C: SimulationClock> RobotController<C> {
    /// Wire up the loop and switch the wheels to velocity control.
    ///
    /// # Errors
    ///
    /// Returns [`VlaError::HardwareFault`] if the drive base is incomplete.
    pub fn new(
        config: ControllerConfig,
        mut registry: HardwareRegistry,
        clock: C,
    ) -> Result<Self, VlaError> {
        registry.enable_velocity_mode()?;
        let command_path = config.command_path();
        info!(
            exchange_dir = %config.exchange_dir.display(),
            command_file = %command_path.display(),
            "controller initialised"
        );
        Ok(Self {
            producer: FrameProducer::new(config.frame_channel(), config.camera_id),
            engine: ExecutionEngine::new(config.engine, CommandMailbox::new(command_path)),
            registry,
            clock,
        })
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    pub fn registry(&self) -> &HardwareRegistry {
        &self.registry
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// One control tick.  Returns `false` once the clock has stopped.
    ///
    /// Capture failures and device faults are logged; they never end the
    /// loop.
    pub fn tick(&mut self) -> bool {
        if !self.clock.step() {
            return false;
        }

        match self.producer.produce(&mut self.registry) {
            Ok(Some(path)) => debug!(path = %path.display(), "captured image"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "frame capture failed"),
        }

        match self.engine.tick(&mut self.registry, &mut self.clock) {
            Ok(report) => !report.simulation_ended,
            Err(e) => {
                error!(error = %e, "tick aborted");
                true
            }
        }
    }

    /// Tick until `shutdown` is set or the clock stops, then stop the wheels.
    ///
    /// # Errors
    ///
    /// Returns the fault raised while stopping the wheels.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<(), VlaError> {
        info!("control loop running");
        while !shutdown.load(Ordering::SeqCst) {
            if !self.tick() {
                info!("simulation ended");
                break;
            }
        }
        self.registry.stop()
    }

    /// Run at most `ticks` ticks; returns how many ran.
    pub fn run_for(&mut self, ticks: usize) -> usize {
        (0..ticks).take_while(|_| self.tick()).count()
    }
}
