//! Error types for the lottery feed client.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request cancelled before the feed was received")]
    Cancelled,

    #[error("cannot decode feed: {0}")]
    Decode(String),

    #[error("malformed feed document: {0}")]
    Malformed(String),

    #[error("invalid {field} value: {value:?}")]
    Format { field: &'static str, value: String },

    #[error("duplicate game {game_id} instances with conflicting outcomes")]
    Conflict { game_id: String },
}

/// Broad class of a [`FeedError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Decode,
    Malformed,
    Format,
    Conflict,
}

impl FeedError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FeedError::Http(_) | FeedError::Cancelled => ErrorKind::Transport,
            FeedError::Decode(_) => ErrorKind::Decode,
            FeedError::Malformed(_) => ErrorKind::Malformed,
            FeedError::Format { .. } => ErrorKind::Format,
            FeedError::Conflict { .. } => ErrorKind::Conflict,
        }
    }

    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    pub(crate) fn format(field: &'static str, value: &str) -> Self {
        FeedError::Format {
            field,
            value: value.to_string(),
        }
    }
}

impl From<quick_xml::de::DeError> for FeedError {
    fn from(e: quick_xml::de::DeError) -> Self {
        FeedError::Malformed(e.to_string())
    }
}

impl From<quick_xml::Error> for FeedError {
    fn from(e: quick_xml::Error) -> Self {
        FeedError::Malformed(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;
