//! Configuration for the drift-control daemon and chaos agent.
//!
//! Contains the desired-state document (the setpoint the controller
//! converges on) and the process settings read from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriftConfigError {
    #[error("Failed to read setpoint file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse setpoint: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid setpoint: {0}")]
    Validation(String),
}

/// Desired lifecycle status of the workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadStatus {
    /// The workload should be up and serving (default)
    #[default]
    Running,
    /// The workload should exist but be stopped
    Stopped,
}

/// The operator-declared setpoint for a single containerized workload.
///
/// Loaded fresh from disk on every control cycle so that edits take effect
/// without restarting the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredState {
    /// Unique identifier for the workload (container name)
    pub app_name: String,
    /// Image reference to enforce, always carrying a tag after validation
    pub image: String,
    /// Desired lifecycle status
    #[serde(default)]
    pub status: WorkloadStatus,
    /// Primary public port
    pub host_port: u16,
    /// Backup port if the primary is taken
    #[serde(default)]
    pub fallback_host_port: Option<u16>,
    /// Internal port the workload listens on
    pub container_port: u16,
}

impl DesiredState {
    /// Loads and validates a setpoint from a YAML file.
    pub fn load(path: &Path) -> Result<Self, DriftConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parses and validates a setpoint from a YAML string.
    pub fn from_yaml(content: &str) -> Result<Self, DriftConfigError> {
        let mut state: DesiredState = serde_yaml::from_str(content)?;
        state.validate()?;
        Ok(state)
    }

    /// Validates the setpoint and normalizes the image reference.
    pub fn validate(&mut self) -> Result<(), DriftConfigError> {
        if self.app_name.trim().is_empty() {
            return Err(DriftConfigError::Validation(
                "app_name must not be empty".to_string(),
            ));
        }
        if self.image.trim().is_empty() {
            return Err(DriftConfigError::Validation(
                "image must not be empty".to_string(),
            ));
        }

        validate_port("host_port", self.host_port)?;
        validate_port("container_port", self.container_port)?;
        if let Some(fallback) = self.fallback_host_port {
            validate_port("fallback_host_port", fallback)?;
        }

        self.image = normalize_image_tag(&self.image);
        Ok(())
    }

    /// The port mapping key docker uses for the workload's listening port.
    pub fn container_port_key(&self) -> String {
        format!("{}/tcp", self.container_port)
    }
}

fn validate_port(field: &str, port: u16) -> Result<(), DriftConfigError> {
    if port == 0 {
        return Err(DriftConfigError::Validation(format!(
            "{} must be between 1 and 65535",
            field
        )));
    }
    Ok(())
}

/// Normalizes an image reference so it always carries a tag.
///
/// An untagged reference implicitly resolves to `:latest`.
pub fn normalize_image_tag(image: &str) -> String {
    if image.contains(':') {
        image.to_string()
    } else {
        format!("{}:latest", image)
    }
}

/// Process settings for the daemon and the chaos agent.
///
/// Built once at startup and passed explicitly to every component; there is
/// no global settings instance.
#[derive(Debug, Clone)]
pub struct AppSettings {
    /// Path to the setpoint document
    pub config_file: PathBuf,
    /// Time between control cycles
    pub polling_interval: Duration,
    /// Slice size of the interruptible wait between cycles
    pub control_interval: Duration,
    /// Optional remote docker endpoint (`docker -H`)
    pub docker_host: Option<String>,
    /// Decoy image the chaos agent deploys for configuration drift
    pub rogue_image: String,
    /// Host port the decoy container binds
    pub rogue_port: u16,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from("desired_state.yaml"),
            polling_interval: Duration::from_secs(5),
            control_interval: Duration::from_millis(100),
            docker_host: None,
            rogue_image: "httpd:alpine".to_string(),
            rogue_port: 8080,
        }
    }
}

impl AppSettings {
    /// Reads settings from `DRIFT_`-prefixed environment variables, falling
    /// back to defaults for anything unset.
    pub fn from_env() -> Result<Self, DriftConfigError> {
        let mut settings = Self::default();

        if let Some(path) = env_var("DRIFT_CONFIG_FILE") {
            settings.config_file = PathBuf::from(path);
        }
        if let Some(secs) = env_var("DRIFT_POLLING_INTERVAL") {
            settings.polling_interval = Duration::from_secs(parse_env("DRIFT_POLLING_INTERVAL", &secs)?);
        }
        if let Some(ms) = env_var("DRIFT_CONTROL_INTERVAL_MS") {
            settings.control_interval = Duration::from_millis(parse_env("DRIFT_CONTROL_INTERVAL_MS", &ms)?);
        }
        if let Some(host) = env_var("DRIFT_DOCKER_HOST") {
            settings.docker_host = Some(host);
        }
        if let Some(image) = env_var("DRIFT_ROGUE_IMAGE") {
            settings.rogue_image = image;
        }
        if let Some(port) = env_var("DRIFT_ROGUE_PORT") {
            settings.rogue_port = parse_env("DRIFT_ROGUE_PORT", &port)?;
        }

        Ok(settings)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, DriftConfigError> {
    value
        .parse()
        .map_err(|_| DriftConfigError::Validation(format!("{} has invalid value '{}'", name, value)))
}
