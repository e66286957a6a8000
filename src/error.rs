/// Error taxonomy shared by the trackers, the calibration table and the uploader
use std::error::Error as StdError;

pub type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(thiserror::Error, Debug)]
pub enum StationError {
    /// Malformed or out-of-range metric value, raised before any network attempt.
    #[error("invalid telemetry value: {0}")]
    Validation(String),
    /// Missing credentials, empty calibration table or a bad setting. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The upload endpoint could not be reached. The caller owns the retry policy.
    #[error("transport failure reaching {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: BoxError,
    },
}

pub type StationResult<T> = Result<T, StationError>;

impl StationError {
    pub fn validation(message: impl Into<String>) -> Self {
        StationError::Validation(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        StationError::Configuration(message.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, StationError::Configuration(_))
    }
}
