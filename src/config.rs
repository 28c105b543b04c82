//! Configuration system for the CSV-to-MIDI converter

use crate::error::{ConvertError, Result};
use crate::timing;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tempo used when neither the rows nor the config say otherwise (120 BPM)
pub const DEFAULT_USPB: u32 = 500_000;

/// Default tempo in beats per minute
pub const DEFAULT_BPM: u32 = 120;

/// Largest metrical division an SMF header can carry (top bit selects SMPTE)
pub const MAX_PPQ: u16 = 0x7FFF;

/// Unit of the `time` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[default]
    Ticks,
    Beats,
    Ms,
}

impl TimeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Ticks => "ticks",
            TimeUnit::Beats => "beats",
            TimeUnit::Ms => "ms",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeUnit {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ticks" => Ok(TimeUnit::Ticks),
            "beats" => Ok(TimeUnit::Beats),
            "ms" => Ok(TimeUnit::Ms),
            other => Err(ConvertError::InvalidConfigParameter(format!(
                "Unknown time unit: {} (expected ticks, beats or ms)",
                other
            ))),
        }
    }
}

/// Unit in which tempo settings are expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TempoUnit {
    Bpm,
    #[default]
    Uspb,
}

impl TempoUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TempoUnit::Bpm => "bpm",
            TempoUnit::Uspb => "uspb",
        }
    }
}

impl fmt::Display for TempoUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TempoUnit {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bpm" => Ok(TempoUnit::Bpm),
            "uspb" => Ok(TempoUnit::Uspb),
            other => Err(ConvertError::InvalidConfigParameter(format!(
                "Unknown tempo unit: {} (expected bpm or uspb)",
                other
            ))),
        }
    }
}

/// Conversion configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pulses per quarter note, written as the header division
    pub ppq: u16,
    pub time_unit: TimeUnit,
    pub tempo_unit: TempoUnit,
    /// Accepted for compatibility; no synthetic note-offs are generated
    pub auto_note_off: bool,
    /// Accepted for compatibility; see `auto_note_off`
    pub auto_note_off_duration: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ppq: 480,
            time_unit: TimeUnit::default(),
            tempo_unit: TempoUnit::default(),
            auto_note_off: true,
            auto_note_off_duration: 480,
        }
    }
}

impl Config {
    /// Resolve the file's default tempo in microseconds per beat.
    ///
    /// With `tempo_unit = bpm` the 120 BPM default goes through the BPM
    /// conversion; otherwise the 500000 µs/beat constant is used directly.
    pub fn default_uspb(&self) -> u32 {
        match self.tempo_unit {
            TempoUnit::Bpm => timing::bpm_to_uspb(DEFAULT_BPM as f64),
            TempoUnit::Uspb => DEFAULT_USPB,
        }
    }
}

/// Validate configuration parameters
pub fn validate_config(config: &Config) -> Result<()> {
    if config.ppq == 0 || config.ppq > MAX_PPQ {
        return Err(ConvertError::InvalidConfigParameter(format!(
            "ppq must be between 1 and {}, got {}",
            MAX_PPQ, config.ppq
        )));
    }

    Ok(())
}

/// Load configuration from JSON file
pub fn load_config<P: AsRef<std::path::Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        ConvertError::ConfigFileError(format!("cannot read {}: {}", path.display(), e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Save configuration to JSON file
pub fn save_config<P: AsRef<std::path::Path>>(config: &Config, path: P) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
