use crate::domain::TrainNumber;

/// Core error type for the bot.
///
/// Adapter crates should map their specific errors into this type so the bot
/// core can handle failures consistently (user-facing message vs retryable).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid train number: {0:?}")]
    InvalidTrainNumber(String),

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of a single train-status lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    #[error("train {0} not found")]
    NotFound(TrainNumber),

    #[error("train status service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("malformed train status response: {0}")]
    MalformedResponse(String),
}

impl StatusError {
    /// Whether the next poll cycle may succeed where this one failed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::NotFound(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackingError {
    #[error("already tracking train {0}")]
    AlreadyTracking(TrainNumber),

    #[error("not tracking {}", .0.as_ref().map(|t| format!("train {t}")).unwrap_or_else(|| "any train".to_string()))]
    NotTracking(Option<TrainNumber>),

    #[error("tracking limit reached ({limit} trains per chat)")]
    LimitReached { limit: usize },
}

impl Error {
    /// Short plain-text explanation suitable for sending back to the user.
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidTrainNumber(raw) if raw.trim().is_empty() => {
                "Please give a train number, e.g. /addtrain 12303".to_string()
            }
            Error::InvalidTrainNumber(raw) => {
                format!("\"{}\" is not a valid train number", raw.trim())
            }
            Error::Status(StatusError::NotFound(t)) => {
                format!("Train {t} was not found")
            }
            Error::Status(StatusError::UpstreamUnavailable(_)) => {
                "Train status service is unavailable right now".to_string()
            }
            Error::Status(StatusError::MalformedResponse(_)) => {
                "Train status service returned an unexpected response".to_string()
            }
            Error::Tracking(TrackingError::AlreadyTracking(t)) => {
                format!("Already tracking train {t}")
            }
            Error::Tracking(TrackingError::NotTracking(Some(t))) => {
                format!("Train {t} is not being tracked")
            }
            Error::Tracking(TrackingError::NotTracking(None)) => "No active train".to_string(),
            Error::Tracking(TrackingError::LimitReached { limit }) => {
                format!("You can track at most {limit} trains at once")
            }
            other => format!("Something went wrong: {other}"),
        }
    }
}
