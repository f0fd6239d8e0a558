//! Server configuration from environment variables

use astroguard_object_detection::YOLOModel;
use astroguard_pipeline::{FrameSettings, SamplingLimits};
use axum::http::HeaderValue;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

/// Default upload body limit: 512 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub addr: String,
    /// Explicit model file; overrides discovery under `model_root`
    pub model_path: Option<PathBuf>,
    /// Directory searched for trained weights
    pub model_root: PathBuf,
    /// One class name per line
    pub classes_path: PathBuf,
    /// TrueType font for box labels; boxes only when unset
    pub label_font: Option<PathBuf>,
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub video: FrameSettings,
    pub image: FrameSettings,
    pub limits: SamplingLimits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8000".to_string(),
            model_path: None,
            model_root: PathBuf::from("."),
            classes_path: PathBuf::from("classes.txt"),
            label_font: None,
            cors_origins: vec!["http://localhost:3000".to_string()],
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            video: FrameSettings::video(),
            image: FrameSettings::image(),
            limits: SamplingLimits::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults
    ///
    /// | Env Var                            | Default                 |
    /// |------------------------------------|-------------------------|
    /// | `ASTROGUARD_ADDR`                  | `0.0.0.0:8000`          |
    /// | `ASTROGUARD_MODEL_PATH`            | discovered              |
    /// | `ASTROGUARD_MODEL_ROOT`            | `.`                     |
    /// | `ASTROGUARD_CLASSES_PATH`          | `classes.txt`           |
    /// | `ASTROGUARD_LABEL_FONT`            | unset                   |
    /// | `ASTROGUARD_CORS_ORIGINS`          | `http://localhost:3000` |
    /// | `ASTROGUARD_MAX_UPLOAD_BYTES`      | `536870912`             |
    /// | `ASTROGUARD_VIDEO_CONFIDENCE`      | `0.4`                   |
    /// | `ASTROGUARD_IMAGE_CONFIDENCE`      | `0.5`                   |
    /// | `ASTROGUARD_VIDEO_JPEG_QUALITY`    | `85`                    |
    /// | `ASTROGUARD_IMAGE_JPEG_QUALITY`    | `95`                    |
    /// | `ASTROGUARD_MAX_FRAMES_TO_PROCESS` | `20`                    |
    /// | `ASTROGUARD_MAX_FRAMES_SCANNED`    | `1000`                  |
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`ServerConfig::from_env`] with a custom variable source
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set but cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(addr) = get("ASTROGUARD_ADDR") {
            config.addr = addr;
        }
        config.model_path = get("ASTROGUARD_MODEL_PATH").map(PathBuf::from);
        if let Some(root) = get("ASTROGUARD_MODEL_ROOT") {
            config.model_root = PathBuf::from(root);
        }
        if let Some(classes) = get("ASTROGUARD_CLASSES_PATH") {
            config.classes_path = PathBuf::from(classes);
        }
        config.label_font = get("ASTROGUARD_LABEL_FONT").map(PathBuf::from);

        if let Some(origins) = get("ASTROGUARD_CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        for origin in &config.cors_origins {
            if let Err(e) = origin.parse::<HeaderValue>() {
                return Err(invalid("ASTROGUARD_CORS_ORIGINS", origin, e));
            }
        }

        if let Some(value) = get("ASTROGUARD_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = parse("ASTROGUARD_MAX_UPLOAD_BYTES", &value)?;
        }
        if let Some(value) = get("ASTROGUARD_VIDEO_CONFIDENCE") {
            config.video.confidence = parse_confidence("ASTROGUARD_VIDEO_CONFIDENCE", &value)?;
        }
        if let Some(value) = get("ASTROGUARD_IMAGE_CONFIDENCE") {
            config.image.confidence = parse_confidence("ASTROGUARD_IMAGE_CONFIDENCE", &value)?;
        }
        if let Some(value) = get("ASTROGUARD_VIDEO_JPEG_QUALITY") {
            config.video.jpeg_quality = parse_quality("ASTROGUARD_VIDEO_JPEG_QUALITY", &value)?;
        }
        if let Some(value) = get("ASTROGUARD_IMAGE_JPEG_QUALITY") {
            config.image.jpeg_quality = parse_quality("ASTROGUARD_IMAGE_JPEG_QUALITY", &value)?;
        }
        if let Some(value) = get("ASTROGUARD_MAX_FRAMES_TO_PROCESS") {
            config.limits.max_frames_to_process =
                parse_positive("ASTROGUARD_MAX_FRAMES_TO_PROCESS", &value)?;
        }
        if let Some(value) = get("ASTROGUARD_MAX_FRAMES_SCANNED") {
            config.limits.max_frames_scanned =
                parse_positive("ASTROGUARD_MAX_FRAMES_SCANNED", &value)?;
        }

        Ok(config)
    }

    /// Model file to load: the explicit path, else discovery under `model_root`
    #[must_use]
    pub fn resolved_model_path(&self) -> PathBuf {
        match &self.model_path {
            Some(path) => path.clone(),
            None => resolve_model_path(&self.model_root),
        }
    }
}

/// Pick the most recent trained model under `root`
///
/// Looks for `runs/detect/train*/weights/best.onnx`, taking the
/// lexicographically greatest `train*` directory, and falls back to the stock
/// [`YOLOModel::Small`] export in `root`.
#[must_use]
pub fn resolve_model_path(root: &Path) -> PathBuf {
    let detect_dir = root.join("runs").join("detect");

    let latest_train = std::fs::read_dir(&detect_dir)
        .ok()
        .into_iter()
        .flatten()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with("train"))
        .max();

    match latest_train {
        Some(train) => {
            let path = detect_dir.join(train).join("weights").join("best.onnx");
            info!("Using trained model {}", path.display());
            path
        }
        None => {
            let path = root.join(YOLOModel::Small.filename());
            info!("No trained model found, using {}", path.display());
            path
        }
    }
}

fn invalid(var: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    value.trim().parse().map_err(|e| invalid(var, value, e))
}

fn parse_confidence(var: &'static str, value: &str) -> Result<f32, ConfigError> {
    let confidence: f32 = parse(var, value)?;
    if (0.0..=1.0).contains(&confidence) {
        Ok(confidence)
    } else {
        Err(invalid(var, value, "must be between 0 and 1"))
    }
}

fn parse_quality(var: &'static str, value: &str) -> Result<u8, ConfigError> {
    let quality: u8 = parse(var, value)?;
    if (1..=100).contains(&quality) {
        Ok(quality)
    } else {
        Err(invalid(var, value, "must be between 1 and 100"))
    }
}

fn parse_positive<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr + Default + PartialEq,
    T::Err: ToString,
{
    let parsed: T = parse(var, value)?;
    if parsed == T::default() {
        Err(invalid(var, value, "must be greater than 0"))
    } else {
        Ok(parsed)
    }
}
