//! Error types for the change-feed side of the `events` crate.
use std::error::Error as StdError;
use std::fmt;

/// Errors raised while reading patient document batches from a change feed.
/// The `error_kind` decides whether the adapter keeps waiting for the next
/// batch or stops and hands the error to the process.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ChangeFeedErrorKind,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ChangeFeedErrorKind {
    // A single read failed; the next batch may well succeed
    Transient,
    // The feed can never produce another batch
    Fatal,
}

impl Error {
    pub fn transient<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Error {
            source: Some(err.into()),
            error_kind: ChangeFeedErrorKind::Transient,
        }
    }

    pub fn fatal<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Error {
            source: Some(err.into()),
            error_kind: ChangeFeedErrorKind::Fatal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.error_kind == ChangeFeedErrorKind::Transient
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Change Feed Error ({:?}): {source}", self.error_kind),
            None => write!(f, "Change Feed Error ({:?})", self.error_kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}
