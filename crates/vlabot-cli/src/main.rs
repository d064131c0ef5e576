//! `vlabot` – command line entry point for the VLA robot stack.
//!
//! One binary, one subcommand per process of the system:
//!
//! - `controller` runs the fixed-rate control loop against the simulated
//!   robot, publishing frames and executing command batches.
//! - `serve` runs the inference service.
//! - `console [URL]` runs the operator console against the service at URL.
//! - `plan` interprets model replies interactively without a robot.
//! - `send <text>` writes a command batch into the mailbox by hand.
//! - `init` writes the default `~/.vlabot/config.toml`.
//!
//! Ctrl-C stops the controller loop and the wheels, and closes the console.

mod config;
mod console;
mod plan;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use vlabot_hal::registry::CAMERA;
use vlabot_hal::sim::{SimClock, SimRegistry};
use vlabot_inference::{OllamaVision, server};
use vlabot_relay::write_batch;
use vlabot_runtime::RobotController;
use vlabot_types::VlaError;

use crate::config::Config;

/// Simulated camera resolution.
const CAMERA_WIDTH: u32 = 320;
const CAMERA_HEIGHT: u32 = 240;

#[derive(Parser, Debug)]
#[command(name = "vlabot")]
#[command(version)]
#[command(about = "Drive a mobile robot from vision-language model output.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the robot control loop
    Controller {
        /// Stop after this many ticks (default: run until Ctrl-C)
        #[arg(long)]
        ticks: Option<u64>,
    },

    /// Start the inference service
    Serve {
        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Start the operator console
    Console {
        /// Inference service base URL (overrides the config file)
        url: Option<String>,
    },

    /// Ask the vision model by hand and show the interpreted commands
    Plan,

    /// Write a command batch into the mailbox
    Send {
        /// Model-style text, e.g. '["go_ahead(1.0)", "turn_left(90)"]'
        text: String,
    },

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = vlabot_runtime::init_tracing("vlabot");

    print_banner();
    let cfg = config::load_or_default();

    let result = match cli.command {
        Commands::Controller { ticks } => run_controller(&cfg, ticks),
        Commands::Serve { port } => run_serve(&cfg, port),
        Commands::Console { url } => run_console(&cfg, url),
        Commands::Plan => run_plan(&cfg),
        Commands::Send { text } => run_send(&cfg, &text),
        Commands::Init { force } => run_init(force),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("{}: {}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subcommands
// ─────────────────────────────────────────────────────────────────────────────

fn run_controller(cfg: &Config, ticks: Option<u64>) -> Result<(), VlaError> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the robot …".yellow().bold());
        flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the loop can only end with the clock");
    }

    let registry = SimRegistry::new()
        .with_drive_base()
        .with_arm()
        .with_gripper()
        .with_camera(CAMERA, CAMERA_WIDTH, CAMERA_HEIGHT)
        .build(cfg.max_velocity);
    let mut clock = SimClock::new(cfg.time_step_ms).realtime();
    if let Some(limit) = ticks {
        clock = clock.with_limit(limit);
    }

    let controller_cfg = cfg.controller_config();
    println!(
        "  Frames   → {}\n  Commands ← {}",
        controller_cfg.exchange_dir.display().to_string().bold(),
        controller_cfg.command_path().display().to_string().bold()
    );
    let mut controller = RobotController::new(controller_cfg, registry, clock)?;
    controller.run(&shutdown)?;
    println!("{}", "  ✓ Wheels stopped.".green());
    Ok(())
}

fn run_serve(cfg: &Config, port: Option<u16>) -> Result<(), VlaError> {
    let mut server_cfg = cfg.server_config();
    if let Some(port) = port {
        server_cfg.port = port;
    }
    let model = Arc::new(OllamaVision::new(cfg.ollama_url.clone(), cfg.model.clone()));
    println!(
        "  Model {} via {} on port {}",
        cfg.model.bold(),
        cfg.ollama_url.dimmed(),
        server_cfg.port.to_string().bold()
    );
    runtime()?.block_on(server::run(server_cfg, model))
}

fn run_console(cfg: &Config, url: Option<String>) -> Result<(), VlaError> {
    let settings = console::ConsoleSettings {
        inference_url: url.unwrap_or_else(|| cfg.inference_url.clone()),
        channel: cfg.controller_config().frame_channel(),
        command_path: cfg.command_path(),
        poll_interval: cfg.poll_interval(),
        request_timeout: cfg.request_timeout(),
    };

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || token.cancel()) {
        warn!(error = %e, "Failed to install Ctrl-C handler; use /quit to leave");
    }
    runtime()?.block_on(console::run(settings, shutdown))
}

fn run_plan(cfg: &Config) -> Result<(), VlaError> {
    let model = OllamaVision::new(cfg.ollama_url.clone(), cfg.model.clone());
    println!("  Model {} via {}", cfg.model.bold(), cfg.ollama_url.dimmed());
    plan::run(&runtime()?, &model)
}

fn run_send(cfg: &Config, text: &str) -> Result<(), VlaError> {
    let path = cfg.command_path();
    write_batch(&path, text)?;
    println!(
        "  {} Batch written to {}",
        "✓".green().bold(),
        path.display().to_string().bold()
    );
    Ok(())
}

fn run_init(force: bool) -> Result<(), VlaError> {
    let path = config::config_path();
    if path.exists() && !force {
        println!(
            "  Config already exists at {} (use {} to overwrite)",
            path.display().to_string().bold(),
            "--force".bold()
        );
        return Ok(());
    }
    config::save(&Config::default())?;
    println!(
        "  {} Config saved to {}",
        "✓".green().bold(),
        path.display().to_string().bold()
    );
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn runtime() -> Result<Runtime, VlaError> {
    Runtime::new().map_err(|e| VlaError::Config(format!("cannot start async runtime: {e}")))
}

fn print_banner() {
    println!();
    println!("{}", r#"  _    ____    ___         __ "#.bold().cyan());
    println!("{}", r#" | |  / / /   /   |  ____ / /_"#.bold().cyan());
    println!("{}", r#" | | / / /   / /| | / __ \ __/"#.bold().cyan());
    println!("{}", r#" | |/ / /___/ ___ |/ /_/ / /_ "#.bold().cyan());
    println!("{}", r#" |___/_____/_/  |_/_.___/\__/ "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "vlabot".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Vision-language-action robot control");
    println!();
}
