//! Error types for entity API
use std::error::Error as StdError;
use std::fmt;

use sea_orm::error::DbErr;

/// Errors while executing operations related to entities.
/// The intent is to categorize errors into two major types:
///  * Errors related to data. Ex DbError::RecordNotFound
///  * Errors related to interactions with the database itself. Ex DbError::Conn
#[derive(Debug, PartialEq)]
pub struct Error {
    // Underlying error emitted from seaORM internals
    pub source: Option<DbErr>,
    // Enum representing which category of error
    pub error_kind: EntityApiErrorKind,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum EntityApiErrorKind {
    // Record not found
    RecordNotFound,
    // A stored record could not be decoded into its model
    InvalidRecord,
    // Errors related to interactions with the database itself. Ex DbError::Conn
    SystemError,
    // Other errors
    Other,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Entity API Error: {:?}", self)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn StdError + 'static))
    }
}

impl From<DbErr> for Error {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::RecordNotFound(_) => Error {
                source: Some(err),
                error_kind: EntityApiErrorKind::RecordNotFound,
            },
            DbErr::Type(_) | DbErr::Json(_) | DbErr::TryIntoErr { .. } => Error {
                source: Some(err),
                error_kind: EntityApiErrorKind::InvalidRecord,
            },
            DbErr::ConnectionAcquire(_) | DbErr::Conn(_) | DbErr::Exec(_) | DbErr::Query(_) => {
                Error {
                    source: Some(err),
                    error_kind: EntityApiErrorKind::SystemError,
                }
            }
            _ => Error {
                source: Some(err),
                error_kind: EntityApiErrorKind::Other,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(DbErr::Json(err.to_string())),
            error_kind: EntityApiErrorKind::InvalidRecord,
        }
    }
}

// The change feed only distinguishes "try again later" from "give up":
// a record that cannot be decoded will fail the same way on every poll.
impl From<Error> for events::error::Error {
    fn from(err: Error) -> Self {
        match err.error_kind {
            EntityApiErrorKind::InvalidRecord => events::error::Error::fatal(err),
            _ => events::error::Error::transient(err),
        }
    }
}
