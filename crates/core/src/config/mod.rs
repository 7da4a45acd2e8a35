use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pad: PadConfig,
}

impl AppConfig {
    /// Reads a JSON config file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Tunables for the pad core. The defaults match the values the persisted
/// format and playback behaviour were designed around.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PadConfig {
    pub limits: Limits,
    pub epsilons: Epsilons,
    pub tween: TweenConfig,
}

/// Upper bounds used to reject corrupt counts while decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_balls: i32,
    pub max_ball_id: i32,
    pub max_timelines: i32,
    pub max_events_per_ball: i32,
    pub max_table_rows: i32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_balls: 1_000,
            max_ball_id: 10_000,
            max_timelines: 1_000,
            max_events_per_ball: 100_000,
            max_table_rows: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Epsilons {
    /// Smallest per-axis move accepted by `set_position`.
    pub position: f32,
    /// Playback results closer than this to the live position are suppressed.
    pub playback: f32,
    /// Transport movement (in quarter notes) that counts as a scrub while stopped.
    pub scrub_time: f64,
}

impl Default for Epsilons {
    fn default() -> Self {
        Self {
            position: 1e-5,
            playback: 1e-4,
            scrub_time: 0.001,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TweenConfig {
    /// Sampling interval assumed when a timeline is too sparse to measure one.
    pub nominal_interval_ms: f64,
    /// Tempo used when the transport reports an unusable one.
    pub fallback_tempo: f64,
    /// Ceiling on generated samples per quarter note of span.
    pub max_steps_per_quarter: f64,
    /// Absolute ceiling on samples generated by one tween, whatever the span.
    pub max_steps: f64,
}

impl Default for TweenConfig {
    fn default() -> Self {
        Self {
            nominal_interval_ms: 20.0,
            fallback_tempo: 120.0,
            max_steps_per_quarter: 960.0,
            max_steps: 100_000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = AppConfig::from_json(r#"{ "pad": { "limits": { "max_balls": 8 } } }"#)
            .expect("config should parse");

        assert_eq!(config.pad.limits.max_balls, 8);
        assert_eq!(config.pad.limits.max_ball_id, 10_000);
        assert_eq!(config.pad.tween, TweenConfig::default());
    }

    #[test]
    fn rejects_malformed_json() {
        let err = AppConfig::from_json("{ pad: ").unwrap_err();
        assert!(matches!(err, crate::PadError::Json(_)));
    }
}
