//! Time normalization: ticks, beats and milliseconds onto one tick timeline

use crate::config::{Config, TimeUnit};
use crate::error::{ConvertError, Result};
use crate::rows::{row_number, EventRow};
use crate::tracks::{MidiEvent, NormalizedEvent};

/// Microseconds in one minute
const MICROS_PER_MINUTE: f64 = 60_000_000.0;

/// Convert BPM to microseconds per beat, rounded to the nearest integer
pub fn bpm_to_uspb(bpm: f64) -> u32 {
    (MICROS_PER_MINUTE / bpm).round() as u32
}

/// Convert microseconds per beat to BPM, rounded to the nearest integer.
///
/// Not an exact inverse of [`bpm_to_uspb`]: 180 BPM becomes 333333 µs/beat,
/// which maps back to 180 only after rounding.
pub fn uspb_to_bpm(uspb: u32) -> u32 {
    (MICROS_PER_MINUTE / uspb as f64).round() as u32
}

/// Convert beats to ticks
pub fn beats_to_ticks(beats: f64, ppq: u16) -> u64 {
    (beats * ppq as f64).round() as u64
}

/// Convert milliseconds to ticks at a fixed tempo
pub fn ms_to_ticks(ms: f64, uspb: u32, ppq: u16) -> u64 {
    let ms_per_beat = uspb as f64 / 1000.0;
    let beats = ms / ms_per_beat;
    beats_to_ticks(beats, ppq)
}

/// Map a time value in `unit` to an absolute tick.
///
/// Milliseconds are converted with `default_uspb` for the whole file;
/// set_tempo rows do not bend the timeline.
pub fn normalize_time(time: f64, unit: TimeUnit, ppq: u16, default_uspb: u32) -> u64 {
    match unit {
        TimeUnit::Ticks => time.round() as u64,
        TimeUnit::Beats => beats_to_ticks(time, ppq),
        TimeUnit::Ms => ms_to_ticks(time, default_uspb, ppq),
    }
}

/// Normalize validated rows into typed events on the tick timeline.
///
/// Input order is kept in `NormalizedEvent::order` so later sorting stays
/// stable. Rows missing a field that validation requires are reported as
/// [`ConvertError::InvalidRow`].
pub fn normalize_rows(
    rows: &[EventRow],
    config: &Config,
    default_uspb: u32,
) -> Result<Vec<NormalizedEvent>> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let invalid = |what: &str| {
                ConvertError::InvalidRow(format!("Row {}: {}", row_number(index), what))
            };

            let track = row
                .track
                .and_then(|t| u64::try_from(t).ok())
                .ok_or_else(|| invalid("track is missing or negative"))?;
            let time = row
                .time
                .filter(|t| t.is_finite() && *t >= 0.0)
                .ok_or_else(|| invalid("time is missing or negative"))?;
            let event = MidiEvent::from_row(row)
                .ok_or_else(|| invalid("event type or required field is missing"))?;

            Ok(NormalizedEvent {
                track,
                tick: normalize_time(time, config.time_unit, config.ppq, default_uspb),
                order: index,
                event,
            })
        })
        .collect()
}
