//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for documents, metadata
//!   posts and feed ledger records.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Document writes enforce `Document::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `IdentityChanged`)
//!   in addition to DB transport errors.
//! - Repositories never open transactions; callers own atomicity.

use crate::db::DbError;
use crate::model::document::{DocumentId, DocumentValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod document_repo;
pub mod ledger_repo;
pub mod post_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by all persistence contracts.
#[derive(Debug)]
pub enum RepoError {
    Validation(DocumentValidationError),
    Db(DbError),
    NotFound(String),
    /// Update attempted to change collection, year, sequence or base.
    IdentityChanged {
        id: DocumentId,
        stored_slug: String,
        new_slug: String,
    },
    /// Delete attempted on a document still used as a consolidation base.
    Referenced(DocumentId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::IdentityChanged {
                id,
                stored_slug,
                new_slug,
            } => write!(
                f,
                "identity of document {id} is immutable: stored {stored_slug}, got {new_slug}"
            ),
            Self::Referenced(id) => {
                write!(f, "document {id} is referenced by a consolidated document")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::IdentityChanged { .. } => None,
            Self::Referenced(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DocumentValidationError> for RepoError {
    fn from(value: DocumentValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn parse_uuid(value: &str) -> RepoResult<DocumentId> {
    uuid::Uuid::parse_str(value)
        .map_err(|err| RepoError::InvalidData(format!("invalid uuid `{value}`: {err}")))
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
