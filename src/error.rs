//! Error types for the CSV-to-MIDI converter

use std::fmt;

/// Custom error type for CSV-to-MIDI conversion
#[derive(Debug, Clone)]
pub enum ConvertError {
    /// E001: CSV text could not be decoded into the row schema
    CsvParseError(String),
    /// E002: Invalid configuration parameter (unit names, ppq range)
    InvalidConfigParameter(String),
    /// E003: Configuration file could not be read or decoded
    ConfigFileError(String),
    /// E004: Input/output file error
    FileError(String),
    /// E005: Track set cannot be represented in a Standard MIDI File
    MidiEncodeError(String),
    /// E006: A row reached conversion without the fields validation requires
    InvalidRow(String),
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::CsvParseError(msg) => {
                write!(f, "E001: CSV parse error - {}", msg)
            }
            ConvertError::InvalidConfigParameter(msg) => {
                write!(f, "E002: Invalid configuration parameter - {}", msg)
            }
            ConvertError::ConfigFileError(msg) => {
                write!(f, "E003: Configuration file error - {}", msg)
            }
            ConvertError::FileError(msg) => {
                write!(f, "E004: File I/O error - {}", msg)
            }
            ConvertError::MidiEncodeError(msg) => {
                write!(f, "E005: MIDI encode error - {}", msg)
            }
            ConvertError::InvalidRow(msg) => {
                write!(f, "E006: Invalid row - {}", msg)
            }
        }
    }
}

impl std::error::Error for ConvertError {}

impl ConvertError {
    /// The message without its error code, as shown in conversion results
    pub fn detail(&self) -> String {
        match self {
            ConvertError::CsvParseError(msg)
            | ConvertError::InvalidConfigParameter(msg)
            | ConvertError::ConfigFileError(msg)
            | ConvertError::FileError(msg)
            | ConvertError::MidiEncodeError(msg)
            | ConvertError::InvalidRow(msg) => msg.clone(),
        }
    }
}

impl From<std::io::Error> for ConvertError {
    fn from(err: std::io::Error) -> Self {
        ConvertError::FileError(err.to_string())
    }
}

impl From<csv::Error> for ConvertError {
    fn from(err: csv::Error) -> Self {
        ConvertError::CsvParseError(err.to_string())
    }
}

impl From<serde_json::Error> for ConvertError {
    fn from(err: serde_json::Error) -> Self {
        ConvertError::ConfigFileError(format!("JSON error: {}", err))
    }
}

/// Result type alias for conversion operations
pub type Result<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_code() {
        let err = ConvertError::CsvParseError("bad quote".to_string());
        assert_eq!(err.to_string(), "E001: CSV parse error - bad quote");

        let err = ConvertError::InvalidRow("Row 4: time is missing".to_string());
        assert_eq!(err.to_string(), "E006: Invalid row - Row 4: time is missing");
    }

    #[test]
    fn test_detail_drops_code() {
        let err = ConvertError::MidiEncodeError("too many tracks".to_string());
        assert_eq!(err.detail(), "too many tracks");
    }

    #[test]
    fn test_io_error_maps_to_file_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.csv");
        let err: ConvertError = io.into();
        assert!(matches!(err, ConvertError::FileError(_)));
    }
}
