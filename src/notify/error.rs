use std::fmt;

/// Failure to hand a report to the external sink. Every variant is transient from
/// the run's point of view: periodic deliveries drop it, the final one retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    Network { message: String },
    Timeout,
    Rejected { status: u16 },
    Reported { message: String },
    Encode { message: String },
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::Network { message } => write!(f, "report sink unreachable: {message}"),
            DeliveryError::Timeout => write!(f, "report sink request timed out"),
            DeliveryError::Rejected { status } => {
                write!(f, "report sink rejected request with status {status}")
            }
            DeliveryError::Reported { message } => {
                write!(f, "report sink returned an error: {message}")
            }
            DeliveryError::Encode { message } => write!(f, "failed to encode report: {message}"),
        }
    }
}

impl std::error::Error for DeliveryError {}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DeliveryError::Timeout
        } else if let Some(status) = err.status() {
            DeliveryError::Rejected {
                status: status.as_u16(),
            }
        } else {
            DeliveryError::Network {
                message: err.to_string(),
            }
        }
    }
}
