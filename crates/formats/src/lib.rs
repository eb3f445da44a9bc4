pub mod delimited;
pub mod geojson;
pub mod json;
pub mod topojson;

pub use geojson::*;

use serde_json::Value;

#[derive(Debug)]
pub enum FormatError {
    Json(serde_json::Error),
    Csv(csv::Error),
    /// The payload parsed but does not have the expected shape.
    Invalid(String),
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatError::Json(e) => write!(f, "JSON parse error: {e}"),
            FormatError::Csv(e) => write!(f, "delimited text parse error: {e}"),
            FormatError::Invalid(reason) => write!(f, "invalid payload: {reason}"),
        }
    }
}

impl std::error::Error for FormatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FormatError::Json(e) => Some(e),
            FormatError::Csv(e) => Some(e),
            FormatError::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for FormatError {
    fn from(e: serde_json::Error) -> Self {
        FormatError::Json(e)
    }
}

impl From<csv::Error> for FormatError {
    fn from(e: csv::Error) -> Self {
        FormatError::Csv(e)
    }
}

/// Payload formats a data source can name in its `type` field.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Format {
    Json,
    /// Parsed as JSON; topology decoding happens where the objects are used.
    TopoJson,
    Csv,
    Tsv,
}

impl Format {
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "json" => Some(Format::Json),
            "topojson" => Some(Format::TopoJson),
            "csv" => Some(Format::Csv),
            "tsv" => Some(Format::Tsv),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::TopoJson => "topojson",
            Format::Csv => "csv",
            Format::Tsv => "tsv",
        }
    }

    pub fn decode(self, bytes: &[u8]) -> Result<Value, FormatError> {
        match self {
            Format::Json | Format::TopoJson => json::decode(bytes),
            Format::Csv => delimited::decode(bytes, b','),
            Format::Tsv => delimited::decode(bytes, b'\t'),
        }
    }
}
