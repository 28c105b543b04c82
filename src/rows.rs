//! Row model and CSV parsing
//!
//! One CSV line describes one MIDI event. The column set is fixed:
//!
//! ```text
//! track,time,type,channel,note,velocity,program,controller,value,tempo,meta_text
//! ```
//!
//! Columns are located by header name, cells are trimmed, and an empty cell
//! means "field absent" rather than zero. Numeric cells are read from their
//! leading number (`60.0` is note 60); a cell with no leading number is kept
//! as an [`UnparsedCell`] for the validator to report.

use crate::error::{ConvertError, Result};
use std::fmt;
use std::str::FromStr;

/// Columns a header must name for rows to be decodable
pub const REQUIRED_COLUMNS: [&str; 3] = ["track", "time", "type"];

/// Column names in schema order
pub const COLUMNS: [&str; 11] = [
    "track",
    "time",
    "type",
    "channel",
    "note",
    "velocity",
    "program",
    "controller",
    "value",
    "tempo",
    "meta_text",
];

/// The closed set of event kinds a row may describe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    NoteOn,
    NoteOff,
    ProgramChange,
    ControlChange,
    SetTempo,
    TrackName,
    TimeSignature,
    KeySignature,
}

impl EventType {
    /// All event types, in the order they are listed to users
    pub const ALL: [EventType; 8] = [
        EventType::NoteOn,
        EventType::NoteOff,
        EventType::ProgramChange,
        EventType::ControlChange,
        EventType::SetTempo,
        EventType::TrackName,
        EventType::TimeSignature,
        EventType::KeySignature,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::NoteOn => "note_on",
            EventType::NoteOff => "note_off",
            EventType::ProgramChange => "program_change",
            EventType::ControlChange => "control_change",
            EventType::SetTempo => "set_tempo",
            EventType::TrackName => "track_name",
            EventType::TimeSignature => "time_signature",
            EventType::KeySignature => "key_signature",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// A numeric cell whose text has no leading number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnparsedCell {
    pub column: &'static str,
    pub text: String,
}

/// One input record, exactly as parsed.
///
/// `event_type` keeps the raw tag so that unknown types can be reported by
/// the validator; use [`EventRow::kind`] for the typed form. A numeric
/// field is `None` both when its cell is empty and when it is listed in
/// `unparsed`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventRow {
    pub track: Option<i64>,
    pub time: Option<f64>,
    pub event_type: String,
    pub channel: Option<i64>,
    pub note: Option<i64>,
    pub velocity: Option<i64>,
    pub program: Option<i64>,
    pub controller: Option<i64>,
    pub value: Option<i64>,
    pub tempo: Option<i64>,
    pub meta_text: Option<String>,
    pub unparsed: Vec<UnparsedCell>,
}

impl EventRow {
    /// Row with the three mandatory columns filled and every optional field absent
    pub fn new(track: i64, time: f64, event_type: impl Into<String>) -> Self {
        Self {
            track: Some(track),
            time: Some(time),
            event_type: event_type.into(),
            ..Default::default()
        }
    }

    /// Typed event kind, or `None` if the tag is not recognized
    pub fn kind(&self) -> Option<EventType> {
        self.event_type.parse().ok()
    }

    /// Original text of `column` if its cell held no number
    pub fn unparsed_text(&self, column: &str) -> Option<&str> {
        self.unparsed
            .iter()
            .find(|cell| cell.column == column)
            .map(|cell| cell.text.as_str())
    }
}

/// Spreadsheet-style row number of the `index`-th data row (header is row 1)
pub fn row_number(index: usize) -> usize {
    index + 2
}

/// Parse CSV text into event rows.
///
/// A header line naming at least `track`, `time` and `type` is required
/// unless the input is empty. Short rows are allowed (missing trailing cells
/// are absent) and blank lines are skipped. A record of empty cells such as
/// `,,,` is kept so that validation reports it.
pub fn parse_rows(csv_content: &str) -> Result<Vec<EventRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(csv_content.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.iter().all(|h| h.is_empty()) {
        return Ok(Vec::new());
    }
    if let Some(missing) = REQUIRED_COLUMNS
        .iter()
        .find(|name| !headers.iter().any(|h| h == **name))
    {
        return Err(ConvertError::CsvParseError(format!(
            "header has no '{}' column",
            missing
        )));
    }

    let positions: Vec<Option<usize>> = COLUMNS
        .iter()
        .map(|name| headers.iter().position(|h| h == *name))
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() <= 1 && record.iter().all(|cell| cell.is_empty()) {
            continue;
        }

        let cell = |column: usize| {
            positions[column]
                .and_then(|idx| record.get(idx))
                .filter(|text| !text.is_empty())
        };

        let mut unparsed = Vec::new();
        let mut int = |column: usize| read_int(cell(column), COLUMNS[column], &mut unparsed);
        let track = int(0);
        let channel = int(3);
        let note = int(4);
        let velocity = int(5);
        let program = int(6);
        let controller = int(7);
        let value = int(8);
        let tempo = int(9);
        let time = read_float(cell(1), COLUMNS[1], &mut unparsed);

        rows.push(EventRow {
            track,
            time,
            event_type: cell(2).unwrap_or_default().to_string(),
            channel,
            note,
            velocity,
            program,
            controller,
            value,
            tempo,
            meta_text: cell(10).map(str::to_string),
            unparsed,
        });
    }

    Ok(rows)
}

/// Longest prefix of `text` that reads as a decimal number: optional sign
/// and digits, plus a fraction and exponent when `fraction` is set.
fn numeric_prefix(text: &str, fraction: bool) -> &str {
    let bytes = text.as_bytes();
    let digits_from = |mut pos: usize| {
        while bytes.get(pos).is_some_and(u8::is_ascii_digit) {
            pos += 1;
        }
        pos
    };

    let sign = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let mut end = digits_from(sign);
    let mut has_digits = end > sign;

    if fraction && bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        if has_digits || frac_end > end + 1 {
            has_digits = true;
            end = frac_end;
        }
    }
    if !has_digits {
        return "";
    }

    if fraction && matches!(bytes.get(end), Some(b'e' | b'E')) {
        let exp_sign = end + 1 + usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_end = digits_from(exp_sign);
        if exp_end > exp_sign {
            end = exp_end;
        }
    }

    &text[..end]
}

fn read_int(
    text: Option<&str>,
    column: &'static str,
    unparsed: &mut Vec<UnparsedCell>,
) -> Option<i64> {
    let text = text?;
    let value = numeric_prefix(text, false).parse::<i64>().ok();
    if value.is_none() {
        unparsed.push(UnparsedCell {
            column,
            text: text.to_string(),
        });
    }
    value
}

fn read_float(
    text: Option<&str>,
    column: &'static str,
    unparsed: &mut Vec<UnparsedCell>,
) -> Option<f64> {
    let text = text?;
    let value = numeric_prefix(text, true).parse::<f64>().ok();
    if value.is_none() {
        unparsed.push(UnparsedCell {
            column,
            text: text.to_string(),
        });
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "track,time,type,channel,note,velocity,program,controller,value,tempo,meta_text";

    #[test]
    fn test_event_type_round_trips_through_str() {
        for t in EventType::ALL {
            assert_eq!(t.as_str().parse::<EventType>(), Ok(t));
        }
        assert_eq!("pitch_bend".parse::<EventType>(), Err("pitch_bend".to_string()));
    }

    #[test]
    fn test_row_number_accounts_for_header() {
        assert_eq!(row_number(0), 2);
        assert_eq!(row_number(9), 11);
    }

    #[test]
    fn test_short_row_leaves_trailing_fields_absent() {
        let csv = format!("{}\n0,0,set_tempo", HEADER);
        let rows = parse_rows(&csv).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind(), Some(EventType::SetTempo));
        assert_eq!(rows[0].tempo, None);
        assert_eq!(rows[0].meta_text, None);
    }

    #[test]
    fn test_whitespace_cells_are_absent() {
        let csv = format!("{}\n0,0,set_tempo,, , , , , ,500000,", HEADER);
        let rows = parse_rows(&csv).unwrap();
        assert_eq!(rows[0].note, None);
        assert_eq!(rows[0].velocity, None);
        assert_eq!(rows[0].tempo, Some(500_000));
    }

    #[test]
    fn test_numeric_prefix() {
        assert_eq!(numeric_prefix("60", false), "60");
        assert_eq!(numeric_prefix("60.0", false), "60");
        assert_eq!(numeric_prefix("-5", false), "-5");
        assert_eq!(numeric_prefix("12abc", false), "12");
        assert_eq!(numeric_prefix("C4", false), "");
        assert_eq!(numeric_prefix("-", false), "");
        assert_eq!(numeric_prefix("1.5e2x", true), "1.5e2");
        assert_eq!(numeric_prefix(".5", true), ".5");
        assert_eq!(numeric_prefix("2e", true), "2");
        assert_eq!(numeric_prefix(".", true), "");
    }

    #[test]
    fn test_non_numeric_cell_is_kept_for_validation() {
        let csv = format!("{}\n0,0,note_on,0,C4,100", HEADER);
        let rows = parse_rows(&csv).unwrap();
        assert_eq!(rows[0].note, None);
        assert_eq!(rows[0].unparsed_text("note"), Some("C4"));
        assert_eq!(rows[0].velocity, Some(100));
        assert_eq!(rows[0].unparsed_text("velocity"), None);
    }

    #[test]
    fn test_missing_required_column_is_fatal() {
        let err = parse_rows("track,time,note\n0,0,60").unwrap_err();
        match err {
            ConvertError::CsvParseError(msg) => assert!(msg.contains("'type'"), "{}", msg),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_columns_located_by_header_name() {
        let csv = "type,time,track,note,velocity\nnote_on,12,3,64,90";
        let rows = parse_rows(csv).unwrap();
        assert_eq!(rows[0].track, Some(3));
        assert_eq!(rows[0].time, Some(12.0));
        assert_eq!(rows[0].note, Some(64));
        assert_eq!(rows[0].channel, None);
    }
}
