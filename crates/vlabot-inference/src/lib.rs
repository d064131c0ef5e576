//! `vlabot-inference` – the vision-language inference service.
//!
//! A thin HTTP wrapper around a vision model.  Given a frame path and an
//! operator instruction it returns the model's raw text; it never validates
//! or executes commands (the robot's interpreter does that).
//!
//! # Modules
//!
//! - [`api`] – request/response wire types.
//! - [`model`] – [`VisionModel`] trait, the [`OllamaVision`] backend and
//!   prompt construction.
//! - [`server`] – axum router with `/process-image` and `/health`.
//! - [`client`] – [`InferenceClient`], the timeout-bounded caller used by
//!   the operator console.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vlabot_inference::{OllamaVision, ServerConfig, server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let model = Arc::new(OllamaVision::new("http://localhost:11434", "gemma3:4b"));
//!     server::run(ServerConfig::default(), model)
//!         .await
//!         .expect("inference service failed");
//! }
//! ```

pub mod api;
pub mod client;
pub mod model;
pub mod server;

pub use api::{ErrorResponse, HealthResponse, ProcessImageRequest, ProcessImageResponse};
pub use client::{ClientError, InferenceClient};
pub use model::{ModelError, OllamaVision, VisionModel, build_prompt};
pub use server::{AppState, ServerConfig};
