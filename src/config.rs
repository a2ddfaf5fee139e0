use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::audio::{analyser, is_valid_transform_size, ByteSpectrumAnalyser, DEFAULT_TRANSFORM_SIZE};

/// Everything tunable about a session, loadable from JSON.
///
/// Every section falls back to its defaults when missing from the file, so a
/// config only needs to name what it changes:
///
/// ```json
/// { "bricks": { "rows": 5 }, "control": { "clamp_paddle": true } }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub canvas: CanvasConfig,
    pub paddle: PaddleConfig,
    pub ball: BallConfig,
    pub bricks: BrickConfig,
    pub calibration: CalibrationConfig,
    pub control: ControlConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: f32,
    pub height: f32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 480.0,
            height: 320.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaddleConfig {
    pub width: f32,
    pub height: f32,
}

impl Default for PaddleConfig {
    fn default() -> Self {
        Self {
            width: 75.0,
            height: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallConfig {
    pub radius: f32,
    /// Horizontal velocity in canvas units per tick.
    pub dx: f32,
    /// Vertical velocity in canvas units per tick; negative is up.
    pub dy: f32,
    /// Distance of the starting centre above the canvas bottom.
    pub start_height: f32,
}

impl Default for BallConfig {
    fn default() -> Self {
        Self {
            radius: 10.0,
            dx: 2.0,
            dy: -2.0,
            start_height: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrickConfig {
    pub rows: usize,
    pub columns: usize,
    pub width: f32,
    pub height: f32,
    pub padding: f32,
    pub offset_top: f32,
    pub offset_left: f32,
}

impl Default for BrickConfig {
    fn default() -> Self {
        Self {
            rows: 3,
            columns: 5,
            width: 75.0,
            height: 20.0,
            padding: 10.0,
            offset_top: 30.0,
            offset_left: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub warmup_ms: u64,
    pub sampling_ms: u64,
    pub lowest_freq_hz: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            warmup_ms: 5000,
            sampling_ms: 10000,
            lowest_freq_hz: 200.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Keep the paddle on the canvas even when the pitch leaves the band.
    pub clamp_paddle: bool,
    /// Only look for the play-time peak inside the calibrated band.
    pub band_limited_peak: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub transform_size: usize,
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
    /// Expected display refresh; sets how far a recording advances per tick.
    pub ticks_per_second: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            transform_size: DEFAULT_TRANSFORM_SIZE,
            smoothing: analyser::DEFAULT_SMOOTHING,
            min_decibels: analyser::DEFAULT_MIN_DECIBELS,
            max_decibels: analyser::DEFAULT_MAX_DECIBELS,
            ticks_per_second: 60.0,
        }
    }
}

impl AudioConfig {
    pub fn analyser(&self) -> ByteSpectrumAnalyser {
        ByteSpectrumAnalyser::new(self.transform_size).with_range(
            self.min_decibels,
            self.max_decibels,
            self.smoothing,
        )
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "could not read config: {e}"),
            ConfigError::Parse(e) => write!(f, "could not parse config: {e}"),
            ConfigError::Invalid(reason) => write!(f, "invalid config: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl GameConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(&path)?;
        let config: GameConfig = serde_json::from_str(&json)?;
        config.validate()?;
        info!("Loaded config from {:?}", path.as_ref());
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        info!("Config saved to {:?}", path.as_ref());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| Err(ConfigError::Invalid(reason));

        let numbers = [
            ("canvas.width", self.canvas.width),
            ("canvas.height", self.canvas.height),
            ("paddle.width", self.paddle.width),
            ("paddle.height", self.paddle.height),
            ("ball.radius", self.ball.radius),
            ("ball.dx", self.ball.dx),
            ("ball.dy", self.ball.dy),
            ("ball.start_height", self.ball.start_height),
            ("bricks.width", self.bricks.width),
            ("bricks.height", self.bricks.height),
            ("bricks.padding", self.bricks.padding),
            ("bricks.offset_top", self.bricks.offset_top),
            ("bricks.offset_left", self.bricks.offset_left),
            ("calibration.lowest_freq_hz", self.calibration.lowest_freq_hz),
            ("audio.smoothing", self.audio.smoothing),
            ("audio.min_decibels", self.audio.min_decibels),
            ("audio.max_decibels", self.audio.max_decibels),
            ("audio.ticks_per_second", self.audio.ticks_per_second),
        ];
        if let Some((name, value)) = numbers.iter().find(|(_, value)| !value.is_finite()) {
            return invalid(format!("{name} must be a finite number, got {value}"));
        }

        if !is_valid_transform_size(self.audio.transform_size) {
            return invalid(format!(
                "transform size {} is not a power of two of at least 512",
                self.audio.transform_size
            ));
        }
        if self.audio.max_decibels <= self.audio.min_decibels {
            return invalid("max_decibels must be above min_decibels".to_string());
        }
        if self.audio.ticks_per_second <= 0.0 {
            return invalid("ticks_per_second must be positive".to_string());
        }
        if self.canvas.width <= 0.0 || self.canvas.height <= 0.0 {
            return invalid("canvas must have a positive size".to_string());
        }
        if self.paddle.width <= 0.0 || self.paddle.width > self.canvas.width {
            return invalid("paddle must fit the canvas".to_string());
        }
        if self.ball.radius <= 0.0 {
            return invalid("ball radius must be positive".to_string());
        }
        if self.bricks.rows == 0 || self.bricks.columns == 0 {
            return invalid("brick grid needs at least one row and one column".to_string());
        }
        Ok(())
    }

    pub fn brick_count(&self) -> usize {
        self.bricks.rows * self.bricks.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.brick_count(), 15);
        assert_eq!(config.calibration.warmup_ms, 5000);
        assert_eq!(config.audio.transform_size, 2048);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: GameConfig =
            serde_json::from_str(r#"{ "bricks": { "rows": 5 }, "control": { "clamp_paddle": true } }"#)
                .unwrap();
        assert_eq!(config.bricks.rows, 5);
        assert_eq!(config.bricks.columns, 5);
        assert!(config.control.clamp_paddle);
        assert!(!config.control.band_limited_peak);
        assert_eq!(config.canvas, CanvasConfig::default());
    }

    #[test]
    fn rejects_bad_transform_size() {
        let mut config = GameConfig::default();
        config.audio.transform_size = 1000;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_non_finite_numbers() {
        let mut config = GameConfig::default();
        config.canvas.width = f32::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(reason)) if reason.contains("canvas.width")));

        let mut config = GameConfig::default();
        config.ball.dy = f32::INFINITY;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(reason)) if reason.contains("ball.dy")));

        let mut config = GameConfig::default();
        config.paddle.width = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn save_and_load() {
        let path = std::env::temp_dir().join("whistle_breaker_config_test.json");
        let mut config = GameConfig::default();
        config.ball.dx = 3.0;
        config.calibration.sampling_ms = 8000;

        config.save(&path).unwrap();
        let loaded = GameConfig::load(&path).unwrap();
        assert_eq!(loaded, config);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            GameConfig::load("/nonexistent/whistle.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
