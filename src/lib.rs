//! CSV-to-MIDI Converter
//!
//! Turns a human-editable CSV event list into a Standard MIDI File
//! (format 1). Times given in ticks, beats or milliseconds are normalized
//! onto one tick timeline per track and encoded with delta-times.

pub mod config;
pub mod error;
pub mod midi;
pub mod rows;
pub mod timing;
pub mod tracks;
pub mod validate;

pub use config::{Config, TempoUnit, TimeUnit};
pub use error::{ConvertError, Result as ConvertResult};
pub use rows::{EventRow, EventType};
pub use validate::{Severity, ValidationFinding};

use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of one conversion.
///
/// Errors never escape as `Err`; they are flattened into `errors`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionResult {
    pub success: bool,
    pub track_count: usize,
    /// Number of input rows
    pub event_count: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Encoded file, present iff `success`
    #[serde(skip)]
    pub midi_bytes: Option<Vec<u8>>,
    pub conversion_time_ms: Option<f64>,
}

impl ConversionResult {
    fn failure(errors: Vec<String>, warnings: Vec<String>, started: Option<Instant>) -> Self {
        Self {
            success: false,
            errors,
            warnings,
            conversion_time_ms: started.map(elapsed_ms),
            ..Default::default()
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Main processing pipeline for CSV-to-MIDI conversion
#[derive(Debug, Clone)]
pub struct Converter {
    config: Config,
    default_uspb: u32,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Converter {
    /// Create a new converter with the given configuration
    pub fn new(config: Config) -> Self {
        let default_uspb = config.default_uspb();
        Self {
            config,
            default_uspb,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Tempo in µs/beat used for ms timing and tempo rows without a value
    pub fn default_uspb(&self) -> u32 {
        self.default_uspb
    }

    /// Convert CSV text to MIDI bytes
    pub fn convert(&self, csv_content: &str) -> ConversionResult {
        let started = Instant::now();

        if let Err(err) = config::validate_config(&self.config) {
            return ConversionResult::failure(
                vec![format!("Invalid configuration: {}", err.detail())],
                Vec::new(),
                Some(started),
            );
        }

        // Step 1: Parse CSV
        let rows = match rows::parse_rows(csv_content) {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "csv parse failed");
                return ConversionResult::failure(
                    vec![format!("Failed to parse CSV: {}", err.detail())],
                    Vec::new(),
                    Some(started),
                );
            }
        };
        debug!(rows = rows.len(), "parsed csv rows");

        // Step 2: Validate
        let findings = validate::validate_rows(&rows, self.config.time_unit);
        let (errors, warnings): (Vec<_>, Vec<_>) =
            findings.into_iter().partition(ValidationFinding::is_error);
        let warnings: Vec<String> = warnings.iter().map(ToString::to_string).collect();

        if !errors.is_empty() {
            warn!(errors = errors.len(), "validation rejected conversion");
            return ConversionResult::failure(
                errors.iter().map(ToString::to_string).collect(),
                warnings,
                Some(started),
            );
        }

        // Steps 3-5: Normalize, assemble, encode
        match self.run_pipeline(&rows) {
            Ok((track_count, midi_bytes)) => {
                let result = ConversionResult {
                    success: true,
                    track_count,
                    event_count: rows.len(),
                    errors: Vec::new(),
                    warnings,
                    midi_bytes: Some(midi_bytes),
                    conversion_time_ms: Some(elapsed_ms(started)),
                };
                info!(
                    tracks = result.track_count,
                    events = result.event_count,
                    warnings = result.warnings.len(),
                    "conversion finished"
                );
                result
            }
            Err(err) => {
                warn!(error = %err, "conversion failed after validation");
                ConversionResult::failure(
                    vec![format!("Unexpected error: {}", err.detail())],
                    warnings,
                    Some(started),
                )
            }
        }
    }

    /// Convert a CSV file and write the MIDI file on success
    pub fn convert_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: Q,
    ) -> ConversionResult {
        match self.try_convert_file(input_path.as_ref(), output_path.as_ref()) {
            Ok(result) => result,
            Err(err) => ConversionResult::failure(
                vec![format!("Failed to read/write file: {}", err.detail())],
                Vec::new(),
                None,
            ),
        }
    }

    fn try_convert_file(&self, input_path: &Path, output_path: &Path) -> ConvertResult<ConversionResult> {
        let csv_content = std::fs::read_to_string(input_path)?;
        let result = self.convert(&csv_content);

        if let Some(bytes) = result.midi_bytes.as_ref().filter(|_| result.success) {
            std::fs::write(output_path, bytes)?;
            debug!(path = %output_path.display(), bytes = bytes.len(), "wrote midi file");
        }

        Ok(result)
    }

    /// Normalize, group and encode validated rows
    fn run_pipeline(&self, rows: &[EventRow]) -> ConvertResult<(usize, Vec<u8>)> {
        let events = timing::normalize_rows(rows, &self.config, self.default_uspb)?;

        let tracks = tracks::group_events_by_track(events);
        let tracks = tracks::absolute_to_delta_times(tracks);
        debug!(tracks = tracks.len(), "assembled tracks");

        let bytes = midi::write_smf(&tracks, &self.config, self.default_uspb)?;
        Ok((tracks.len(), bytes))
    }
}
