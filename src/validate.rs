//! Row validation
//!
//! Field-range and type-conditional checks, applied to each row on its own.
//! Every finding is collected; nothing short-circuits. A conversion is
//! rejected iff at least one finding has [`Severity::Error`].

use crate::config::TimeUnit;
use crate::rows::{row_number, EventRow, EventType};
use std::fmt;

/// Largest tempo that fits the 24-bit set_tempo payload
pub const MAX_TEMPO_USPB: i64 = 0xFF_FFFF;

/// Whether a finding blocks conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A single validation result tied to one cell
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFinding {
    /// 1-based row number, header included (first data row is 2)
    pub row: usize,
    pub column: String,
    /// Offending value as text, `None` when the field is missing
    pub value: Option<String>,
    pub message: String,
    pub severity: Severity,
}

impl ValidationFinding {
    fn error(row: usize, column: &str, value: Option<String>, message: impl Into<String>) -> Self {
        Self {
            row,
            column: column.to_string(),
            value,
            message: message.into(),
            severity: Severity::Error,
        }
    }

    fn warning(row: usize, column: &str, value: Option<String>, message: impl Into<String>) -> Self {
        Self {
            row,
            column: column.to_string(),
            value,
            message: message.into(),
            severity: Severity::Warning,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Formats as `Row N, column: message`, the form used in conversion results
impl fmt::Display for ValidationFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row {}, {}: {}", self.row, self.column, self.message)
    }
}

/// Validate every row, returning all findings in row order.
///
/// `time_unit` only affects the wording of the `time` message.
pub fn validate_rows(rows: &[EventRow], time_unit: TimeUnit) -> Vec<ValidationFinding> {
    let mut findings = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        validate_row(row, row_number(index), time_unit, &mut findings);
    }
    findings
}

/// Number of error-severity findings
pub fn error_count(findings: &[ValidationFinding]) -> usize {
    findings.iter().filter(|f| f.is_error()).count()
}

fn validate_row(
    row: &EventRow,
    row_num: usize,
    time_unit: TimeUnit,
    findings: &mut Vec<ValidationFinding>,
) {
    if !matches!(row.track, Some(track) if track >= 0) {
        findings.push(ValidationFinding::error(
            row_num,
            "track",
            cell_text(row, "track", row.track),
            "track must be a non-negative integer",
        ));
    }

    if !matches!(row.time, Some(time) if time.is_finite() && time >= 0.0) {
        findings.push(ValidationFinding::error(
            row_num,
            "time",
            cell_text(row, "time", row.time),
            format!("time must be a non-negative {}", time_unit),
        ));
    }

    let kind = row.kind();
    if kind.is_none() {
        let allowed: Vec<&str> = EventType::ALL.iter().map(EventType::as_str).collect();
        findings.push(ValidationFinding::error(
            row_num,
            "type",
            Some(row.event_type.clone()),
            format!("type must be one of: {}", allowed.join(", ")),
        ));
    }

    check_range(findings, row, row_num, "channel", row.channel, 0, 15);
    check_range(findings, row, row_num, "note", row.note, 0, 127);
    check_range(findings, row, row_num, "velocity", row.velocity, 0, 127);
    check_range(findings, row, row_num, "program", row.program, 0, 127);
    check_range(findings, row, row_num, "controller", row.controller, 0, 127);
    check_range(findings, row, row_num, "value", row.value, 0, 127);

    if let Some(text) = row.unparsed_text("tempo") {
        findings.push(ValidationFinding::error(
            row_num,
            "tempo",
            Some(text.to_string()),
            "tempo must be a positive integer",
        ));
    } else if let Some(tempo) = row.tempo {
        if tempo <= 0 {
            findings.push(ValidationFinding::error(
                row_num,
                "tempo",
                Some(tempo.to_string()),
                "tempo must be a positive integer",
            ));
        } else if tempo > MAX_TEMPO_USPB {
            findings.push(ValidationFinding::warning(
                row_num,
                "tempo",
                Some(tempo.to_string()),
                format!(
                    "tempo exceeds {} and will be truncated to 24 bits",
                    MAX_TEMPO_USPB
                ),
            ));
        }
    }

    let Some(kind) = kind else {
        return;
    };

    match kind {
        EventType::NoteOn | EventType::NoteOff => {
            require(findings, row, row_num, kind, "note", row.note.is_some());
            require(findings, row, row_num, kind, "velocity", row.velocity.is_some());
        }
        EventType::ProgramChange => {
            require(findings, row, row_num, kind, "program", row.program.is_some());
        }
        EventType::ControlChange => {
            require(findings, row, row_num, kind, "controller", row.controller.is_some());
            require(findings, row, row_num, kind, "value", row.value.is_some());
        }
        EventType::SetTempo if row.tempo.is_none() && row.unparsed_text("tempo").is_none() => {
            findings.push(ValidationFinding::warning(
                row_num,
                "tempo",
                None,
                "set_tempo has no tempo field; the default tempo is used",
            ));
        }
        EventType::TrackName if row.meta_text.is_none() => {
            findings.push(ValidationFinding::warning(
                row_num,
                "meta_text",
                None,
                "track_name has no meta_text field; 'Track' is used",
            ));
        }
        _ => {}
    }
}

/// Text to report for a numeric cell: the parsed value, or the raw text
/// of a cell that held no number
fn cell_text<T: ToString>(row: &EventRow, column: &str, value: Option<T>) -> Option<String> {
    value
        .map(|v| v.to_string())
        .or_else(|| row.unparsed_text(column).map(str::to_string))
}

fn check_range(
    findings: &mut Vec<ValidationFinding>,
    row: &EventRow,
    row_num: usize,
    column: &str,
    value: Option<i64>,
    min: i64,
    max: i64,
) {
    let out_of_range = match value {
        Some(v) => v < min || v > max,
        None => row.unparsed_text(column).is_some(),
    };
    if out_of_range {
        findings.push(ValidationFinding::error(
            row_num,
            column,
            cell_text(row, column, value),
            format!("{} must be an integer between {} and {}", column, min, max),
        ));
    }
}

/// Report a missing required field; a cell that held no number was already
/// reported by its range check
fn require(
    findings: &mut Vec<ValidationFinding>,
    row: &EventRow,
    row_num: usize,
    kind: EventType,
    column: &str,
    present: bool,
) {
    if !present && row.unparsed_text(column).is_none() {
        findings.push(ValidationFinding::error(
            row_num,
            column,
            None,
            format!("{} requires a {} field", kind, column),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::UnparsedCell;

    fn note_on(note: i64, velocity: i64) -> EventRow {
        EventRow {
            channel: Some(0),
            note: Some(note),
            velocity: Some(velocity),
            ..EventRow::new(0, 0.0, "note_on")
        }
    }

    #[test]
    fn test_valid_note_on_has_no_findings() {
        assert!(validate_rows(&[note_on(60, 100)], TimeUnit::Ticks).is_empty());
    }

    #[test]
    fn test_row_may_yield_several_findings() {
        let row = EventRow {
            track: Some(-1),
            channel: Some(16),
            note: Some(128),
            ..EventRow::new(0, -5.0, "note_on")
        };
        let findings = validate_rows(&[row], TimeUnit::Ticks);
        let columns: Vec<&str> = findings.iter().map(|f| f.column.as_str()).collect();
        assert_eq!(columns, vec!["track", "time", "channel", "note", "velocity"]);
        assert!(findings.iter().all(|f| f.row == 2));
    }

    #[test]
    fn test_time_message_names_unit() {
        let row = EventRow::new(0, -1.0, "set_tempo");
        let findings = validate_rows(&[row], TimeUnit::Beats);
        let time = findings.iter().find(|f| f.column == "time").unwrap();
        assert_eq!(time.message, "time must be a non-negative beats");
    }

    #[test]
    fn test_display_matches_result_format() {
        let findings = validate_rows(&[note_on(200, 100)], TimeUnit::Ticks);
        assert_eq!(
            findings[0].to_string(),
            "Row 2, note: note must be an integer between 0 and 127"
        );
    }

    #[test]
    fn test_fallback_warnings_do_not_count_as_errors() {
        let rows = vec![
            EventRow::new(0, 0.0, "set_tempo"),
            EventRow::new(0, 0.0, "track_name"),
        ];
        let findings = validate_rows(&rows, TimeUnit::Ticks);
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.severity == Severity::Warning));
        assert_eq!(error_count(&findings), 0);
    }

    #[test]
    fn test_unparsed_cell_reports_range_error_once() {
        let row = EventRow {
            velocity: Some(100),
            unparsed: vec![UnparsedCell {
                column: "note",
                text: "C4".to_string(),
            }],
            ..EventRow::new(0, 0.0, "note_on")
        };
        let findings = validate_rows(&[row], TimeUnit::Ticks);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].column, "note");
        assert_eq!(findings[0].value.as_deref(), Some("C4"));
        assert_eq!(findings[0].message, "note must be an integer between 0 and 127");
    }
}
