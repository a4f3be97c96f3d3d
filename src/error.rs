use std::{io, path::PathBuf};

use thiserror::Error;

/// Why a drag payload was rejected.
///
/// Drops that fail with one of these are ignored by the editor; the error only
/// ever reaches the log.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unexpected payload kind `{0}`")]
    UnexpectedKind(String),

    #[error("unknown word category `{0}`")]
    UnknownCategory(String),

    #[error("form `{qualifier}` does not apply to {category}")]
    ForeignQualifier { category: String, qualifier: String },

    #[error("payload has an empty label")]
    EmptyLabel,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoryKeyError {
    #[error("story key is empty")]
    Empty,

    #[error("`{0}` is neither a 6-character invite code nor a story id")]
    Unrecognized(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access story file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("story file {path} is corrupt")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no story matches `{0}`")]
    NotFound(String),

    #[error("story `{0}` belongs to someone else")]
    NotOwner(String),

    #[error("a story needs a title")]
    TitleMissing,

    #[error("could not find an unused invite code after {0} attempts")]
    CodesExhausted(usize),

    #[error(transparent)]
    Key(#[from] StoryKeyError),
}
