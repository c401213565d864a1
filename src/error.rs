use std::time::Duration;
use thiserror::Error;

/// Failures a single award rule can report.
///
/// "No qualifying data" is deliberately absent: an empty period is a normal
/// outcome and never surfaces as an error.
#[derive(Debug, Error)]
pub enum RewardError {
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    #[error("Reward category not found: {0}")]
    CategoryNotFound(String),

    #[error("Store query failed ({context}): {source}")]
    StoreQuery {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Store write failed ({context}): {source}")]
    StoreWrite {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Rule {rule} timed out after {timeout:?}")]
    Timeout { rule: String, timeout: Duration },

    #[error("Unexpected fault: {0}")]
    UnexpectedFault(String),
}

impl RewardError {
    pub fn query(context: impl Into<String>, source: sqlx::Error) -> Self {
        RewardError::StoreQuery {
            context: context.into(),
            source,
        }
    }

    pub fn write(context: impl Into<String>, source: sqlx::Error) -> Self {
        RewardError::StoreWrite {
            context: context.into(),
            source,
        }
    }

    pub fn invalid_period(message: impl Into<String>) -> Self {
        RewardError::InvalidPeriod(message.into())
    }
}
