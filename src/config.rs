use serde::{Deserialize, Serialize};

use crate::common::EngineError;

/// Engine-wide settings, loadable from a TOML file. Every field has a
/// default so an empty (or absent) file yields a working engine.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    /// Sample rate of the processing context, in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub reverb: ReverbConfig,
    pub logging: Option<LoggingConfig>,
}

/// Defaults for the analysis tap before the UI pushes its own values.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AnalysisConfig {
    /// FFT window size in samples. Power of two; bin count is half this.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Temporal smoothing factor for frequency bins, in [0, 1).
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
}

/// Shape constants for the generated reverb impulse response.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReverbConfig {
    #[serde(default = "default_impulse_duration")]
    pub impulse_duration_secs: f32,
    /// Power-law exponent of the impulse decay envelope.
    #[serde(default = "default_impulse_decay")]
    pub impulse_decay: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            analysis: AnalysisConfig::default(),
            reverb: ReverbConfig::default(),
            logging: None,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            smoothing: default_smoothing(),
        }
    }
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            impulse_duration_secs: default_impulse_duration(),
            impulse_decay: default_impulse_decay(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &str) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{path}: {e}")))?;
        toml::from_str(&raw).map_err(|e| EngineError::Config(format!("{path}: {e}")))
    }
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_window_size() -> usize {
    2048
}

fn default_smoothing() -> f32 {
    0.8
}

fn default_impulse_duration() -> f32 {
    2.0
}

fn default_impulse_decay() -> f32 {
    2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: EngineConfig = toml::from_str("").expect("empty config should parse");
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.analysis.window_size, 2048);
        assert_eq!(config.analysis.smoothing, 0.8);
        assert_eq!(config.reverb.impulse_duration_secs, 2.0);
        assert_eq!(config.reverb.impulse_decay, 2.0);
        assert!(config.logging.is_none());
    }

    #[test]
    fn partial_toml_fills_rest() {
        let config: EngineConfig = toml::from_str(
            r#"
            sample_rate = 48000

            [analysis]
            window_size = 1024
            "#,
        )
        .expect("partial config should parse");
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.analysis.window_size, 1024);
        assert_eq!(config.analysis.smoothing, 0.8);
    }

    #[test]
    fn logging_section_parses() {
        let config: EngineConfig = toml::from_str(
            r#"
            [logging]
            level = "debug"
            "#,
        )
        .expect("logging section should parse");
        assert_eq!(config.logging.unwrap().level.as_deref(), Some("debug"));
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let err = EngineConfig::load("/nonexistent/pulseviz.toml").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
