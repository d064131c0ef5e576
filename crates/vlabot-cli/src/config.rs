//! Configuration Vault – reads/writes `~/.vlabot/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use vlabot_inference::ServerConfig;
use vlabot_runtime::{ControllerConfig, EngineConfig, MotionLimits};
use vlabot_types::VlaError;

/// Persisted operator configuration stored in `~/.vlabot/config.toml`.
///
/// Every field has a default, so a partial file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory shared by the controller, the console and the service.
    pub exchange_dir: PathBuf,
    pub image_prefix: String,
    pub command_file: String,

    /// Base URL the console sends `/process-image` requests to.
    pub inference_url: String,
    /// Port the inference service listens on.
    pub listen_port: u16,
    pub ollama_url: String,
    /// Vision model name (e.g. "gemma3:4b").
    pub model: String,

    /// Console frame-watcher interval.
    pub poll_interval_ms: u64,
    pub request_timeout_secs: u64,

    /// Control loop period.
    pub time_step_ms: u64,
    pub max_velocity: f64,
    pub base_speed: f64,
    pub turn_velocity: f64,
    pub linear_scale: f64,
    pub max_motion_secs: f64,
}

impl Default for Config {
    fn default() -> Self {
        let limits = MotionLimits::default();
        Self {
            exchange_dir: std::env::temp_dir(),
            image_prefix: "rosbot_image".to_string(),
            command_file: "rosbot_commands.json".to_string(),
            inference_url: "http://localhost:5000".to_string(),
            listen_port: 5000,
            ollama_url: "http://localhost:11434".to_string(),
            model: "gemma3:4b".to_string(),
            poll_interval_ms: 500,
            request_timeout_secs: 120,
            time_step_ms: 32,
            max_velocity: limits.max_velocity,
            base_speed: EngineConfig::default().base_speed,
            turn_velocity: limits.turn_velocity,
            linear_scale: limits.linear_scale,
            max_motion_secs: limits.max_motion_secs,
        }
    }
}

impl Config {
    pub fn command_path(&self) -> PathBuf {
        self.exchange_dir.join(&self.command_file)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            exchange_dir: self.exchange_dir.clone(),
            image_prefix: self.image_prefix.clone(),
            command_file: self.command_file.clone(),
            engine: EngineConfig {
                limits: MotionLimits {
                    max_velocity: self.max_velocity,
                    turn_velocity: self.turn_velocity,
                    linear_scale: self.linear_scale,
                    max_motion_secs: self.max_motion_secs,
                },
                base_speed: self.base_speed,
                ..EngineConfig::default()
            },
            ..ControllerConfig::default()
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            port: self.listen_port,
            request_timeout_secs: self.request_timeout_secs,
        }
    }
}

/// Return the path to `~/.vlabot/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".vlabot").join("config.toml")
}

/// Load the config from disk with `VLABOT_*` overrides applied.  Returns
/// `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, VlaError> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// The stored config, or defaults when absent or unreadable; environment
/// overrides apply either way.
pub fn load_or_default() -> Config {
    match load() {
        Ok(Some(cfg)) => cfg,
        Ok(None) => {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            tracing::warn!(error = %e, "config unreadable, using defaults");
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, VlaError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| VlaError::io(path, e))?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| VlaError::Config(format!("Failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `VLABOT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `VLABOT_EXCHANGE_DIR` | `exchange_dir` |
/// | `VLABOT_INFERENCE_URL` | `inference_url` |
/// | `VLABOT_OLLAMA_URL` | `ollama_url` |
/// | `VLABOT_MODEL` | `model` |
/// | `VLABOT_LISTEN_PORT` | `listen_port` |
/// | `VLABOT_POLL_INTERVAL_MS` | `poll_interval_ms` |
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

/// Unparseable numeric values are ignored.
pub(crate) fn apply_overrides(cfg: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("VLABOT_EXCHANGE_DIR") {
        cfg.exchange_dir = PathBuf::from(v);
    }
    if let Some(v) = var("VLABOT_INFERENCE_URL") {
        cfg.inference_url = v;
    }
    if let Some(v) = var("VLABOT_OLLAMA_URL") {
        cfg.ollama_url = v;
    }
    if let Some(v) = var("VLABOT_MODEL") {
        cfg.model = v;
    }
    if let Some(v) = var("VLABOT_LISTEN_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.listen_port = port;
    }
    if let Some(v) = var("VLABOT_POLL_INTERVAL_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.poll_interval_ms = ms;
    }
}

/// Save the config to disk, creating `~/.vlabot/` if necessary.
pub fn save(cfg: &Config) -> Result<(), VlaError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), VlaError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| VlaError::io(parent, e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| VlaError::io(parent, e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| VlaError::Serialization(format!("Failed to serialize config: {e}")))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| VlaError::io(path, e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| VlaError::io(path, e))?;
    Ok(())
}
