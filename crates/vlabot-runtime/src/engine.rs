//! [`ExecutionEngine`] – the Idle/Executing state machine.
//!
//! The engine runs inside the robot's control loop and is its only
//! scheduler.  Each [`tick`][ExecutionEngine::tick]:
//!
//! 1. **Check** the [`CommandMailbox`] (at most once per
//!    `relay_check_interval_secs` of simulated time).  A new batch is run
//!    through the interpreter; if at least one command is valid the queue is
//!    replaced wholesale and the state becomes `Executing`.  A batch with no
//!    valid command leaves the current queue alone.
//! 2. **Drain** while `Executing`:
//!    - *instantaneous* commands apply their effect and the tick carries on
//!      with the next item;
//!    - *blocking* commands drive the devices, then busy-wait on the clock
//!      until their duration has elapsed, stop the wheels and end the tick.
//!      The wait is not interruptible: a batch written meanwhile is picked up
//!      on the next tick.
//! 3. **Idle** once the queue is empty: the wheels are stopped.
//!
//! A command whose arguments cannot be executed (zero speed, negative
//! distance, gripper percentage out of range) fails on its own and the
//! batch continues.  A device fault aborts the current tick only; the
//! failing command is consumed and the next tick resumes with the rest of
//! the queue.

use std::collections::VecDeque;

use tracing::{debug, info, warn};
use vlabot_hal::{HardwareRegistry, SimulationClock};
use vlabot_relay::CommandMailbox;
use vlabot_types::{Command, CommandKind, ExecutionClass, ExecutionState, VlaError};

use crate::interpreter::{self, InterpretError};
use crate::motion::{MotionError, MotionLimits, MotionModel};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`ExecutionEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub limits: MotionLimits,
    /// Wheel velocity before any `change_speed`.
    pub base_speed: f64,
    /// How long blocking manipulation commands hold the loop after the
    /// device call.
    pub settle_secs: f64,
    /// Minimum simulated time between mailbox checks; `0` checks every tick.
    pub relay_check_interval_secs: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limits: MotionLimits::default(),
            base_speed: 6.0,
            settle_secs: 1.0,
            relay_check_interval_secs: 0.0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tick report
// ─────────────────────────────────────────────────────────────────────────────

/// What happened to a batch found in the mailbox.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    /// The queue was replaced with this many commands.
    Accepted(usize),
    /// Nothing in the batch was executable; the queue is unchanged.
    Rejected { raw: String },
}

/// Outcome of one [`ExecutionEngine::tick`].
#[derive(Debug, Default)]
pub struct TickReport {
    pub batch: Option<BatchEvent>,
    pub executed: Vec<Command>,
    pub failed: Vec<(Command, VlaError)>,
    /// The clock refused to step during a blocking wait.
    pub simulation_ended: bool,
}

enum Step {
    /// Keep draining within this tick.
    Continue,
    /// A blocking command finished; end the tick.
    Yield,
    /// The clock stopped mid-wait.
    Ended,
}

// ─────────────────────────────────────────────────────────────────────────────
// ExecutionEngine
// ─────────────────────────────────────────────────────────────────────────────

pub struct ExecutionEngine {
    config: EngineConfig,
    mailbox: CommandMailbox,
    motion: MotionModel,
    queue: VecDeque<Command>,
    state: ExecutionState,
    last_relay_check: Option<f64>,
}

impl ExecutionEngine {
    pub fn new(config: EngineConfig, mailbox: CommandMailbox) -> Self {
        let motion = MotionModel::new(config.limits.clone(), config.base_speed);
        Self {
            config,
            mailbox,
            motion,
            queue: VecDeque::new(),
            state: ExecutionState::Idle,
            last_relay_check: None,
        }
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Commands still waiting, front first.
    pub fn queue(&self) -> impl Iterator<Item = &Command> {
        self.queue.iter()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn speed(&self) -> f64 {
        self.motion.speed()
    }

    /// Simulated time of the most recent mailbox check.
    pub fn last_relay_check(&self) -> Option<f64> {
        self.last_relay_check
    }

    /// Interpret `text` and, if anything is valid, replace the queue with it.
    ///
    /// # Errors
    ///
    /// Returns the interpreter diagnostic when no command is valid; the
    /// queue and state are left untouched.
    pub fn load_batch(&mut self, text: &str) -> Result<usize, InterpretError> {
        let commands = interpreter::interpret(text)?;
        if !self.queue.is_empty() {
            info!(discarded = self.queue.len(), "replacing in-flight batch");
        }
        self.queue = commands.into();
        self.state = ExecutionState::Executing;
        info!(
            commands = %interpreter::format_batch(self.queue.make_contiguous()),
            "batch queued"
        );
        Ok(self.queue.len())
    }

    /// Advance the engine by one control tick.
    ///
    /// # Errors
    ///
    /// Returns the device error when a command hits a hardware fault.  The
    /// wheels are stopped (best effort) and the rest of the queue is kept
    /// for the next tick.
    pub fn tick(
        &mut self,
        registry: &mut HardwareRegistry,
        clock: &mut dyn SimulationClock,
    ) -> Result<TickReport, VlaError> {
        let mut report = TickReport {
            batch: self.check_mailbox(clock.time()),
            ..TickReport::default()
        };

        while self.state == ExecutionState::Executing {
            let Some(command) = self.queue.pop_front() else {
                self.finish(registry)?;
                break;
            };
            debug!(command = %command, remaining = self.queue.len(), "dispatching");

            match self.execute(&command, registry, clock) {
                Ok(Step::Continue) => report.executed.push(command),
                Ok(Step::Yield) => {
                    report.executed.push(command);
                    if self.queue.is_empty() {
                        self.finish(registry)?;
                    }
                    break;
                }
                Ok(Step::Ended) => {
                    report.executed.push(command);
                    report.simulation_ended = true;
                    break;
                }
                Err(e @ VlaError::InvalidCommand { .. }) => {
                    warn!(command = %command, error = %e, "command failed");
                    report.failed.push((command, e));
                }
                Err(e) => {
                    if let Err(stop_err) = registry.stop() {
                        warn!(error = %stop_err, "could not stop wheels after fault");
                    }
                    if self.queue.is_empty() {
                        self.state = ExecutionState::Idle;
                    }
                    return Err(e);
                }
            }
        }

        Ok(report)
    }

    fn check_mailbox(&mut self, now: f64) -> Option<BatchEvent> {
        if let Some(last) = self.last_relay_check {
            if now - last < self.config.relay_check_interval_secs {
                return None;
            }
        }
        self.last_relay_check = Some(now);

        match self.mailbox.poll() {
            Ok(Some(payload)) => match self.load_batch(&payload.source_text()) {
                Ok(n) => Some(BatchEvent::Accepted(n)),
                Err(InterpretError::NoValidCommands { raw }) => {
                    warn!(raw = %raw, "batch has no valid commands; keeping current queue");
                    Some(BatchEvent::Rejected { raw })
                }
            },
            Ok(None) => None,
            Err(VlaError::MalformedBatch { raw }) => {
                warn!(raw = %raw, "command file is not a command document");
                Some(BatchEvent::Rejected { raw })
            }
            Err(e) => {
                debug!(error = %e, "command file unavailable; retrying next tick");
                None
            }
        }
    }

    fn execute(
        &mut self,
        command: &Command,
        registry: &mut HardwareRegistry,
        clock: &mut dyn SimulationClock,
    ) -> Result<Step, VlaError> {
        let kind = command.kind();

        if kind == CommandKind::ChangeSpeed {
            let percent = command.arg(0).unwrap_or_default();
            let speed = self
                .motion
                .change_speed(percent)
                .map_err(|e| invalid(command, e))?;
            info!(speed, "speed changed");
            return Ok(Step::Continue);
        }

        if kind.is_locomotion() {
            let plan = self.motion.plan(command).map_err(|e| invalid(command, e))?;
            if plan.duration <= 0.0 {
                registry.stop()?;
                return Ok(Step::Yield);
            }
            registry.set_wheel_speeds(plan.left, plan.right)?;
            let completed = hold(clock, plan.duration);
            registry.stop()?;
            return Ok(if completed { Step::Yield } else { Step::Ended });
        }

        registry.apply(command)?;
        match command.class() {
            ExecutionClass::Instantaneous => Ok(Step::Continue),
            ExecutionClass::Blocking => {
                if hold(clock, self.config.settle_secs) {
                    Ok(Step::Yield)
                } else {
                    Ok(Step::Ended)
                }
            }
        }
    }

    fn finish(&mut self, registry: &mut HardwareRegistry) -> Result<(), VlaError> {
        self.state = ExecutionState::Idle;
        info!("command queue empty, waiting for new commands");
        registry.stop()
    }
}

/// Step the clock until `secs` of simulated time have passed.  Returns
/// `false` if the clock stops first.
fn hold(clock: &mut dyn SimulationClock, secs: f64) -> bool {
    if secs <= 0.0 {
        return true;
    }
    let start = clock.time();
    while clock.step() {
        if clock.time() - start >= secs {
            return true;
        }
    }
    false
}

fn invalid(command: &Command, err: MotionError) -> VlaError {
    VlaError::InvalidCommand {
        command: command.to_string(),
        reason: err.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use std::fs;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, SystemTime};

    use vlabot_hal::Actuator;
    use vlabot_hal::sim::{SimClock, SimRegistry};
    use vlabot_relay::{CommandPayload, write_batch};

    /// Front-left wheel that logs every velocity it is given.
    struct TrackingWheel {
        log: Arc<Mutex<Vec<f64>>>,
        velocity: f64,
    }

    impl Actuator for TrackingWheel {
        fn id(&self) -> &str {
            "fl_wheel_joint"
        }
        fn set_position(&mut self, _target_rad: f64) -> Result<(), VlaError> {
            Ok(())
        }
        fn set_velocity(&mut self, rad_per_sec: f64) -> Result<(), VlaError> {
            self.velocity = rad_per_sec;
            self.log.lock().unwrap().push(rad_per_sec);
            Ok(())
        }
        fn position(&self) -> f64 {
            0.0
        }
        fn velocity(&self) -> f64 {
            self.velocity
        }
    }

    struct Rig {
        _dir: tempfile::TempDir,
        path: std::path::PathBuf,
        engine: ExecutionEngine,
        registry: HardwareRegistry,
        clock: SimClock,
    }

    fn rig() -> Rig {
        rig_with(SimRegistry::new().with_drive_base().build(26.0))
    }

    fn rig_with(mut registry: HardwareRegistry) -> Rig {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rosbot_commands.json");
        registry.enable_velocity_mode().unwrap();
        Rig {
            engine: ExecutionEngine::new(EngineConfig::default(), CommandMailbox::new(&path)),
            _dir: dir,
            path,
            registry,
            clock: SimClock::new(32),
        }
    }

    impl Rig {
        fn tick(&mut self) -> TickReport {
            self.engine.tick(&mut self.registry, &mut self.clock).unwrap()
        }

        /// Write a batch with an mtime strictly later than any earlier write.
        fn send(&self, commands: impl Into<CommandPayload>, bump_secs: u64) {
            write_batch(&self.path, commands).unwrap();
            bump_mtime(&self.path, bump_secs);
        }
    }

    fn bump_mtime(path: &Path, secs: u64) {
        let f = fs::OpenOptions::new().write(true).open(path).unwrap();
        f.set_modified(SystemTime::now() + Duration::from_secs(secs))
            .unwrap();
    }

    fn names(cmds: &[Command]) -> Vec<String> {
        cmds.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn unknown_function_is_skipped_and_engine_ends_idle() {
        let mut rig = rig();
        rig.send(
            CommandPayload::List(vec![
                "go_ahead(1.0)".into(),
                "bogus_fn(1,2,3)".into(),
                "turn_right(90)".into(),
            ]),
            1,
        );

        let mut executed = Vec::new();
        for _ in 0..10 {
            let report = rig.tick();
            executed.extend(report.executed);
            if rig.engine.state() == ExecutionState::Idle {
                break;
            }
        }

        assert_eq!(names(&executed), ["go_ahead(1)", "turn_right(90)"]);
        assert_eq!(rig.engine.state(), ExecutionState::Idle);
        assert_eq!(rig.registry.wheel_speeds(), Some((0.0, 0.0)));
        assert!(rig.clock.time() >= 1.0 / 0.06 + PI / 2.0);
    }

    #[test]
    fn blocking_motion_ends_the_tick() {
        let mut rig = rig();
        rig.send("[turn_left(90), turn_left(90)]", 1);
        let report = rig.tick();
        assert_eq!(report.batch, Some(BatchEvent::Accepted(2)));
        assert_eq!(report.executed.len(), 1);
        assert_eq!(rig.engine.state(), ExecutionState::Executing);
        assert_eq!(rig.engine.queue_len(), 1);
        // π/2 at 32 ms steps.
        assert_eq!(rig.clock.steps(), 50);
    }

    #[test]
    fn instantaneous_commands_share_a_tick() {
        let mut rig = rig();
        rig.send("[change_speed(50), change_speed(100), go_ahead(0)]", 1);
        let report = rig.tick();
        assert_eq!(report.executed.len(), 3);
        assert_eq!(rig.engine.speed(), 26.0);
        assert_eq!(rig.engine.state(), ExecutionState::Idle);
    }

    #[test]
    fn go_ahead_zero_stops_without_stepping() {
        let mut rig = rig();
        rig.send("[go_ahead(0)]", 1);
        let report = rig.tick();
        assert!(report.failed.is_empty());
        assert_eq!(rig.clock.steps(), 0);
        assert_eq!(rig.registry.wheel_speeds(), Some((0.0, 0.0)));
    }

    #[test]
    fn wheels_are_held_then_stopped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = SimRegistry::new()
            .with_drive_base()
            .with_actuator(Box::new(TrackingWheel {
                log: Arc::clone(&log),
                velocity: 0.0,
            }))
            .build(26.0);
        let mut rig = rig_with(registry);
        rig.send("[go_ahead(0.5)]", 1);
        rig.tick();
        let log = log.lock().unwrap();
        // drive, stop after the wait, stop on entering Idle
        assert_eq!(log[log.len() - 3..], [6.0, 0.0, 0.0]);
    }

    #[test]
    fn unchanged_file_never_requeues() {
        let mut rig = rig();
        rig.send("[change_speed(10)]", 1);
        assert_eq!(rig.tick().batch, Some(BatchEvent::Accepted(1)));
        for _ in 0..5 {
            let report = rig.tick();
            assert!(report.batch.is_none());
            assert!(report.executed.is_empty());
        }
        assert_eq!(rig.engine.state(), ExecutionState::Idle);
    }

    #[test]
    fn new_batch_replaces_remaining_queue() {
        let mut rig = rig();
        rig.send("[go_ahead(0.1), go_ahead(0.1), go_ahead(0.1)]", 1);
        rig.tick();
        assert_eq!(rig.engine.queue_len(), 2);

        rig.send("[turn_left(45)]", 10);
        let report = rig.tick();
        assert_eq!(report.batch, Some(BatchEvent::Accepted(1)));
        assert_eq!(names(&report.executed), ["turn_left(45)"]);
        assert_eq!(rig.engine.state(), ExecutionState::Idle);
        assert_eq!(rig.engine.queue_len(), 0);
    }

    #[test]
    fn invalid_batch_keeps_current_queue() {
        let mut rig = rig();
        rig.send("[go_ahead(0.1), go_back(0.1)]", 1);
        rig.tick();

        rig.send("I cannot help with that", 10);
        let report = rig.tick();
        assert_eq!(
            report.batch,
            Some(BatchEvent::Rejected {
                raw: "I cannot help with that".into()
            })
        );
        assert_eq!(names(&report.executed), ["go_back(0.1)"]);
    }

    #[test]
    fn malformed_file_is_rejected_once() {
        let mut rig = rig();
        fs::write(&rig.path, "not json").unwrap();
        assert!(matches!(
            rig.tick().batch,
            Some(BatchEvent::Rejected { .. })
        ));
        assert!(rig.tick().batch.is_none());
    }

    #[test]
    fn zero_speed_fails_only_the_linear_move() {
        let mut rig = rig();
        rig.send("[change_speed(0), go_ahead(1), turn_left(90)]", 1);
        let report = rig.tick();
        assert_eq!(names(&report.executed), ["change_speed(0)", "turn_left(90)"]);
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0].1, VlaError::InvalidCommand { .. }));
        assert_eq!(rig.engine.state(), ExecutionState::Idle);
    }

    #[test]
    fn device_fault_aborts_only_the_tick() {
        // No gripper registered.
        let mut rig = rig();
        rig.send("[grab(50), go_ahead(0)]", 1);
        let err = rig.engine.tick(&mut rig.registry, &mut rig.clock).unwrap_err();
        assert!(matches!(err, VlaError::HardwareFault { .. }));
        assert_eq!(rig.engine.state(), ExecutionState::Executing);

        let report = rig.tick();
        assert_eq!(names(&report.executed), ["go_ahead(0)"]);
        assert_eq!(rig.engine.state(), ExecutionState::Idle);
    }

    #[test]
    fn blocking_manipulation_holds_for_settle_time() {
        let registry = SimRegistry::new()
            .with_drive_base()
            .with_arm()
            .with_gripper()
            .build(26.0);
        let mut rig = rig_with(registry);
        rig.send("[release(), lift_arm(30)]", 1);
        let report = rig.tick();
        assert_eq!(report.executed.len(), 2);
        assert!(rig.clock.time() >= 1.0);
    }

    #[test]
    fn stopped_clock_ends_the_simulation() {
        let mut rig = rig();
        rig.clock = SimClock::new(32).with_limit(10);
        rig.send("[go_ahead(1)]", 1);
        let report = rig.tick();
        assert!(report.simulation_ended);
        assert_eq!(rig.registry.wheel_speeds(), Some((0.0, 0.0)));
    }

    #[test]
    fn relay_checks_respect_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rosbot_commands.json");
        let config = EngineConfig {
            relay_check_interval_secs: 1.0,
            ..EngineConfig::default()
        };
        let mut engine = ExecutionEngine::new(config, CommandMailbox::new(&path));
        let mut registry = SimRegistry::new().with_drive_base().build(26.0);
        let mut clock = SimClock::new(32);

        engine.tick(&mut registry, &mut clock).unwrap();
        assert_eq!(engine.last_relay_check(), Some(0.0));

        write_batch(&path, "[change_speed(20)]").unwrap();
        clock.step();
        assert!(engine.tick(&mut registry, &mut clock).unwrap().batch.is_none());

        while clock.time() < 1.0 {
            clock.step();
        }
        let report = engine.tick(&mut registry, &mut clock).unwrap();
        assert_eq!(report.batch, Some(BatchEvent::Accepted(1)));
    }
}
