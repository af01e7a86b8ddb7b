use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use transcribe_domain::SchedulingPolicy;

mod logging;

pub use logging::setup_logging;

pub type AppConfig = TranscribeConfig;

/// Optional file source, looked up next to the working directory.
pub const CONFIG_FILE: &str = "transcribe.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<validator::ValidationErrors> for ConfigError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ConfigError::Invalid(errors.to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct TranscribeConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    #[validate(nested)]
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServiceConfig {
    #[serde(default)]
    #[validate(nested)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    #[validate(nested)]
    pub audio: AudioConfig,
    #[serde(default)]
    #[validate(nested)]
    pub inference: InferenceConfig,
    /// Whole-request deadline; zero disables it.
    #[serde(default = "default_request_timeout_sec")]
    pub request_timeout_sec: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SchedulingConfig {
    #[serde(default = "default_short_max_sec")]
    #[validate(range(exclusive_min = 0.0))]
    pub short_max_sec: f64,
    #[serde(default = "default_batch_max_items")]
    #[validate(range(min = 1))]
    pub batch_max_items: usize,
    #[serde(default = "default_batch_max_total_sec")]
    #[validate(range(exclusive_min = 0.0))]
    pub batch_max_total_sec: f64,
    #[serde(default = "default_local_attention_after_sec")]
    #[validate(range(exclusive_min = 0.0))]
    pub local_attention_after_sec: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    #[validate(range(min = 8_000, max = 192_000))]
    pub sample_rate_hz: u32,
    #[serde(default = "default_normalize_concurrency")]
    #[validate(range(min = 1, max = 256))]
    pub normalize_concurrency: usize,
    #[serde(default = "default_ffmpeg_bin")]
    #[validate(length(min = 1))]
    pub ffmpeg_bin: String,
    #[serde(default = "default_ffprobe_bin")]
    #[validate(length(min = 1))]
    pub ffprobe_bin: String,
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
    #[serde(default = "default_download_timeout_sec")]
    #[validate(range(min = 1))]
    pub download_timeout_sec: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InferenceConfig {
    #[serde(default = "default_model")]
    #[validate(length(min = 1))]
    pub model: String,
    /// Replaces the engine with the dry-run stub.
    #[serde(default)]
    pub skip_model_load: bool,
    #[serde(default = "default_inference_endpoint")]
    #[validate(url)]
    pub endpoint: String,
    #[serde(default = "default_inference_timeout_sec")]
    #[validate(range(min = 1))]
    pub timeout_sec: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            scheduling: SchedulingConfig::default(),
            audio: AudioConfig::default(),
            inference: InferenceConfig::default(),
            request_timeout_sec: default_request_timeout_sec(),
        }
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            short_max_sec: default_short_max_sec(),
            batch_max_items: default_batch_max_items(),
            batch_max_total_sec: default_batch_max_total_sec(),
            local_attention_after_sec: default_local_attention_after_sec(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: default_sample_rate(),
            normalize_concurrency: default_normalize_concurrency(),
            ffmpeg_bin: default_ffmpeg_bin(),
            ffprobe_bin: default_ffprobe_bin(),
            temp_dir: None,
            download_timeout_sec: default_download_timeout_sec(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            skip_model_load: false,
            endpoint: default_inference_endpoint(),
            timeout_sec: default_inference_timeout_sec(),
        }
    }
}

impl TranscribeConfig {
    pub fn to_policy(&self) -> SchedulingPolicy {
        let scheduling = &self.service.scheduling;
        SchedulingPolicy {
            short_max_seconds: scheduling.short_max_sec,
            batch_max_items: scheduling.batch_max_items,
            batch_max_total_seconds: scheduling.batch_max_total_sec,
            local_attention_after_seconds: scheduling.local_attention_after_sec,
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        match self.service.request_timeout_sec {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        }
    }

    /// Field ranges plus the checks that span several fields.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;

        let scheduling = &self.service.scheduling;
        for (key, value) in [
            ("SHORT_MAX_SEC", scheduling.short_max_sec),
            ("BATCH_MAX_TOTAL_SEC", scheduling.batch_max_total_sec),
            ("LOCAL_ATTENTION_AFTER_SEC", scheduling.local_attention_after_sec),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!("{key} must be finite, got {value}")));
            }
        }
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("HOST must not be empty".to_string()));
        }
        if tracing_subscriber::EnvFilter::try_new(&self.logging.level).is_err() {
            return Err(ConfigError::Invalid(format!(
                "LOG_LEVEL is not a valid filter: {}",
                self.logging.level
            )));
        }
        Ok(())
    }
}

/// Environment keys and the configuration paths they override.
const ENV_KEYS: &[(&str, &str)] = &[
    ("HOST", "server.host"),
    ("PORT", "server.port"),
    ("LOG_LEVEL", "logging.level"),
    ("PARAKEET_MODEL", "service.inference.model"),
    ("INFERENCE_ENDPOINT", "service.inference.endpoint"),
    ("INFERENCE_TIMEOUT_SEC", "service.inference.timeout_sec"),
    ("SHORT_MAX_SEC", "service.scheduling.short_max_sec"),
    ("BATCH_MAX_ITEMS", "service.scheduling.batch_max_items"),
    ("BATCH_MAX_TOTAL_SEC", "service.scheduling.batch_max_total_sec"),
    ("LOCAL_ATTENTION_AFTER_SEC", "service.scheduling.local_attention_after_sec"),
    ("SAMPLE_RATE_HZ", "service.audio.sample_rate_hz"),
    ("NORMALIZE_CONCURRENCY", "service.audio.normalize_concurrency"),
    ("FFMPEG_BIN", "service.audio.ffmpeg_bin"),
    ("FFPROBE_BIN", "service.audio.ffprobe_bin"),
    ("TEMP_DIR", "service.audio.temp_dir"),
    ("DOWNLOAD_TIMEOUT_SEC", "service.audio.download_timeout_sec"),
    ("REQUEST_TIMEOUT_SEC", "service.request_timeout_sec"),
];

/// Boolean keys accept `1`, `true` and `True`; anything else is false.
const FLAG_KEYS: &[(&str, &str)] = &[
    ("SKIP_MODEL_LOAD", "service.inference.skip_model_load"),
    ("LOG_JSON", "logging.json"),
];

fn parse_flag(value: &str) -> bool {
    matches!(value, "1" | "true" | "True")
}

pub fn load_config() -> Result<TranscribeConfig, ConfigError> {
    load_config_from(Some(Path::new(CONFIG_FILE)), |key| std::env::var(key).ok())
}

/// Builds the configuration from an optional file, then applies overrides read
/// through `lookup`, then validates.
pub fn load_config_from<F>(file: Option<&Path>, lookup: F) -> Result<TranscribeConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut builder = Config::builder();
    if let Some(path) = file {
        builder = builder.add_source(File::from(path).required(false));
    }
    for (env_key, path) in ENV_KEYS {
        builder = builder.set_override_option(*path, lookup(env_key))?;
    }
    for (env_key, path) in FLAG_KEYS {
        let flag = lookup(env_key).map(|value| parse_flag(value.trim()));
        builder = builder.set_override_option(*path, flag)?;
    }

    let config: TranscribeConfig = builder.build()?.try_deserialize()?;
    config.check()?;
    Ok(config)
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout_sec() -> u64 {
    3_600
}

fn default_short_max_sec() -> f64 {
    600.0
}

fn default_batch_max_items() -> usize {
    16
}

fn default_batch_max_total_sec() -> f64 {
    1_200.0
}

fn default_local_attention_after_sec() -> f64 {
    1_440.0
}

fn default_sample_rate() -> u32 {
    16_000
}

fn default_normalize_concurrency() -> usize {
    4
}

fn default_ffmpeg_bin() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_bin() -> String {
    "ffprobe".to_string()
}

fn default_download_timeout_sec() -> u64 {
    120
}

fn default_model() -> String {
    "nvidia/parakeet-tdt-0.6b-v3".to_string()
}

fn default_inference_endpoint() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_inference_timeout_sec() -> u64 {
    1_800
}
