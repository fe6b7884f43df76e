use std::path::PathBuf;

use thiserror::Error;

use crate::ident::ChallengeId;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid date format '{0}'. Please use YYYYMMDD format.")]
    InvalidDateFormat(String),
    #[error("Start date {start} cannot be after end date {end}")]
    InvalidRange { start: ChallengeId, end: ChallengeId },
    #[error("Tried to reconcile record {incoming} against record {existing}")]
    IdentityMismatch {
        incoming: ChallengeId,
        existing: ChallengeId,
    },

    #[error("Network Error: {0}")]
    Network(String),
    #[error("Challenge {0} not found")]
    NotFound(ChallengeId),
    #[error("Couldn't extract a challenge from the page: {0}")]
    Parse(String),
    #[error("The selector you are trying to scrape for is missing. Selector: {0}")]
    ParseMissingSelector(String),
    #[error("Image bundle Error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Couldn't write store to {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Store file {} is not a list of challenges: {source}", path.display())]
    StoreFormat {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Config Error: {0}")]
    Config(String),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),
}

impl Error {
    /// Errors that only concern a single challenge and must not abort a batch.
    pub fn is_item_failure(&self) -> bool {
        matches!(
            self,
            Error::Network(_)
                | Error::NotFound(_)
                | Error::Parse(_)
                | Error::ParseMissingSelector(_)
                | Error::Zip(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Network(value.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(value: toml::de::Error) -> Self {
        Error::Config(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_date_message_names_input_and_format() {
        let msg = Error::InvalidDateFormat("2020-01-01".into()).to_string();
        assert!(msg.contains("2020-01-01"));
        assert!(msg.contains("YYYYMMDD"));
    }

    #[test]
    fn test_item_failures_are_classified() {
        let id: ChallengeId = "20051013".parse().unwrap();
        assert!(Error::NotFound(id).is_item_failure());
        assert!(Error::Parse("no question".into()).is_item_failure());
        assert!(Error::Network("timeout".into()).is_item_failure());
        assert!(!Error::InvalidDateFormat("x".into()).is_item_failure());
        assert!(!Error::Config("bad".into()).is_item_failure());
    }
}
