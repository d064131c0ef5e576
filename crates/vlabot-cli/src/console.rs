//! Operator console – a terminal front end for the inference round trip.
//!
//! One presentation task owns the console state and is the only writer to
//! stdout.  The frame watcher, the stdin reader and every in-flight
//! inference request run elsewhere and report back as [`ConsoleEvent`]s.
//!
//! Commands at the `vlabot>` prompt:
//!   /help         – show this list
//!   /status       – newest frame and last status line
//!   /quit | /exit – leave the console
//!   anything else – send it as the instruction for the newest frame

use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use vlabot_inference::{ClientError, InferenceClient};
use vlabot_relay::{FrameChannel, FrameWatcher, write_batch};
use vlabot_types::{Frame, VlaError};

/// Everything the presentation task reacts to.
#[derive(Debug)]
pub enum ConsoleEvent {
    Frame(Frame),
    Input(String),
    Inference(Result<String, ClientError>),
    /// EOF or interrupt on stdin.
    Closed,
}

/// What the presentation task must do after handling an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Help,
    ShowStatus,
    Request { image: PathBuf, prompt: String },
    Quit,
}

/// Console state.  Mutated only by the presentation task.
#[derive(Debug)]
pub struct ConsoleState {
    command_path: PathBuf,
    latest: Option<Frame>,
    status: String,
}

impl ConsoleState {
    pub fn new(command_path: impl Into<PathBuf>) -> Self {
        Self {
            command_path: command_path.into(),
            latest: None,
            status: "Waiting for images".to_string(),
        }
    }

    pub fn latest(&self) -> Option<&Frame> {
        self.latest.as_ref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn handle(&mut self, event: ConsoleEvent) -> Action {
        match event {
            ConsoleEvent::Frame(frame) => {
                debug!(path = %frame.file_path.display(), "new frame");
                self.latest = Some(frame);
                Action::None
            }
            ConsoleEvent::Input(line) => self.on_input(&line),
            ConsoleEvent::Inference(result) => {
                self.on_inference(result);
                Action::ShowStatus
            }
            ConsoleEvent::Closed => Action::Quit,
        }
    }

    fn on_input(&mut self, line: &str) -> Action {
        let prompt = line.trim();
        match prompt {
            "/quit" | "/exit" => return Action::Quit,
            "/help" => return Action::Help,
            "/status" => return Action::ShowStatus,
            _ => {}
        }
        if prompt.is_empty() {
            self.status = "Please enter a prompt".to_string();
            return Action::ShowStatus;
        }
        let Some(frame) = &self.latest else {
            self.status = "No image available to process".to_string();
            return Action::ShowStatus;
        };
        self.status = "Processing...".to_string();
        Action::Request {
            image: frame.file_path.clone(),
            prompt: prompt.to_string(),
        }
    }

    fn on_inference(&mut self, result: Result<String, ClientError>) {
        self.status = match result {
            Ok(commands) => match write_batch(&self.command_path, commands.as_str()) {
                Ok(()) => format!("Commands received: {commands}"),
                Err(e) => format!("Error: {e}"),
            },
            Err(e) => format!("Error: {e}"),
        };
    }
}

/// Console wiring taken from the config file.
#[derive(Debug, Clone)]
pub struct ConsoleSettings {
    pub inference_url: String,
    pub channel: FrameChannel,
    pub command_path: PathBuf,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

/// Run the console until `/quit`, EOF or `shutdown` is cancelled.
///
/// # Errors
///
/// Returns [`VlaError::Inference`] if the HTTP client cannot be built.
pub async fn run(settings: ConsoleSettings, shutdown: CancellationToken) -> Result<(), VlaError> {
    let client = InferenceClient::new(settings.inference_url.clone(), settings.request_timeout)
        .map_err(|e| VlaError::Inference(e.to_string()))?;

    let (frame_tx, mut frame_rx) = mpsc::channel::<Frame>(8);
    let watcher = FrameWatcher::new(settings.channel.clone(), settings.poll_interval)
        .spawn(frame_tx, shutdown.clone());

    let (event_tx, mut event_rx) = mpsc::channel::<ConsoleEvent>(32);
    spawn_stdin_reader(event_tx.clone());

    let mut state = ConsoleState::new(&settings.command_path);
    println!(
        "  Inference service : {}\n  Watching          : {}\n  Command file      : {}",
        client.base_url().bold(),
        settings.channel.dir().display().to_string().bold(),
        settings.command_path.display().to_string().bold(),
    );
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            Some(frame) = frame_rx.recv() => ConsoleEvent::Frame(frame),
            Some(event) = event_rx.recv() => event,
            else => break,
        };

        match state.handle(event) {
            Action::None => {}
            Action::Help => print_help(),
            Action::ShowStatus => print_status(&state),
            Action::Request { image, prompt } => {
                print_status(&state);
                let client = client.clone();
                let tx = event_tx.clone();
                tokio::spawn(async move {
                    let result = client.process_image(&image, &prompt).await;
                    if tx.send(ConsoleEvent::Inference(result)).await.is_err() {
                        debug!("console closed before the inference reply arrived");
                    }
                });
            }
            Action::Quit => break,
        }
    }

    shutdown.cancel();
    if let Err(e) = watcher.await {
        warn!(error = %e, "frame watcher task failed");
    }
    println!("{}", "Goodbye.".green());
    Ok(())
}

/// Read lines on a plain OS thread; a blocking read must not hold up
/// runtime shutdown.
fn spawn_stdin_reader(tx: mpsc::Sender<ConsoleEvent>) {
    std::thread::spawn(move || {
        let mut editor = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                warn!(error = %e, "cannot open line editor");
                let _ = tx.blocking_send(ConsoleEvent::Closed);
                return;
            }
        };
        loop {
            let event = match editor.readline("vlabot> ") {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = editor.add_history_entry(line.as_str());
                    }
                    ConsoleEvent::Input(line)
                }
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => ConsoleEvent::Closed,
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    ConsoleEvent::Closed
                }
            };
            let closing = matches!(event, ConsoleEvent::Closed);
            if tx.blocking_send(event).is_err() || closing {
                break;
            }
        }
    });
}

fn print_help() {
    println!();
    println!("{}", "Console Commands".bold().underline());
    println!("  {}     – newest frame and last status", "/status".bold().cyan());
    println!("  {} – exit the console", "/quit  /exit".bold().cyan());
    println!("  {}     – send as instruction for the newest frame", "<text>".bold().cyan());
    println!();
}

fn print_status(state: &ConsoleState) {
    match state.latest() {
        Some(frame) => {
            let size = match (frame.width, frame.height) {
                (Some(w), Some(h)) => format!(" ({w}x{h})"),
                _ => String::new(),
            };
            println!("  Frame  : {}{}", frame.file_path.display().to_string().bold(), size.dimmed());
        }
        None => println!("  Frame  : {}", "none yet".dimmed()),
    }
    let status = state.status();
    let styled = if status.starts_with("Error") {
        status.red()
    } else if status.starts_with("Commands received") {
        status.green()
    } else {
        status.yellow()
    };
    println!("  Status : {styled}");
}
