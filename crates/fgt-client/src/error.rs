//! Error types for FortiGate client operations

use thiserror::Error;

/// Result type alias for FortiGate client operations
pub type Result<T> = std::result::Result<T, FgtError>;

/// Errors that can occur while talking to a FortiGate or preparing a run
#[derive(Error, Debug)]
pub enum FgtError {
    /// Operator input failed validation (bad IPv4, unparseable filename, ...)
    #[error("Invalid input: {0}")]
    InputValidation(String),

    /// Connection, TLS or timeout failure before a status was received
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The appliance answered with a non-2xx status
    #[error("API error {status}: {}", body.as_deref().unwrap_or("<empty body>"))]
    Api { status: u16, body: Option<String> },

    /// Malformed inventory row
    #[error(transparent)]
    Record(#[from] RecordError),

    /// Inventory file could not be read as CSV
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl FgtError {
    /// Create an API error from status code and raw body
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self::Api {
            status,
            body: (!body.is_empty()).then_some(body),
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::InputValidation(message.into())
    }

    /// HTTP status code carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Why a workflow step failed, detached from the error that caused it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    /// HTTP status when the device answered, `None` for transport or local errors
    pub status: Option<u16>,
    pub message: String,
}

impl From<&FgtError> for StepFailure {
    fn from(err: &FgtError) -> Self {
        Self {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for StepFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// A row of the inventory file that could not be turned into a device
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("inventory line {line}: {reason}")]
pub struct RecordError {
    /// 1-based line number in the inventory file
    pub line: usize,
    /// Device name, when the row had one
    pub name: Option<String>,
    pub reason: String,
}
