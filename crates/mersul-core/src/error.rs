use chrono::NaiveDate;
use thiserror::Error;

/// A required pattern did not match the text pulled from the page.
///
/// Always fatal for the extraction call that produced it; records are never
/// partially filled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot parse {field} from {raw_text:?}")]
pub struct ParseError {
    /// Name of the field whose grammar failed (e.g. `trainHeader`, `km`).
    pub field: &'static str,
    /// The normalized text that was offered to the grammar.
    pub raw_text: String,
}

impl ParseError {
    pub fn new(field: &'static str, raw_text: impl Into<String>) -> Self {
        Self {
            field,
            raw_text: raw_text.into(),
        }
    }
}

/// Application-wide error types for Mersul.
#[derive(Error, Debug)]
pub enum AppError {
    /// Origin unreachable, returned a non-success status, or served a page
    /// without the containers the extractor navigates.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Origin request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// A required field did not match its grammar.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// The train exists but has no itinerary for the requested day.
    #[error("Train {number} does not run on {date}")]
    TrainNotRunning { number: String, date: NaiveDate },

    /// The origin knows no connection between two stations on a date.
    #[error("No itinerary from {from} to {to} on {date}")]
    NoItineraries {
        from: String,
        to: String,
        date: NaiveDate,
    },

    /// Outgoing document does not satisfy its declared schema.
    #[error("Schema validation error: {0}")]
    SchemaValidation(String),

    /// Knowledge store read, write or migration failed.
    #[error("Store error: {0}")]
    Store(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// The origin served a page whose structure the extractor does not know.
    pub fn page_shape(missing: &str) -> Self {
        AppError::Fetch(format!("unexpected page shape: missing {missing}"))
    }

    /// Returns true if the error came from talking to the origin site.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, AppError::Fetch(_) | AppError::Timeout(_))
    }
}
