//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into the publish, update and delete
//!   lifecycle of documents.
//! - Keep the CLI and web layers decoupled from storage details.
//!
//! # Invariants
//! - Every lifecycle action runs in one `IMMEDIATE` transaction.
//! - Description failures surface before any ledger write.

use crate::db::DbError;
use crate::feed::FeedError;
use crate::rdf::description::DescribeError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod clock;
pub mod ledger;
pub mod orchestrator;
pub mod post_cache;

pub type PublishResult<T> = Result<T, PublishError>;

/// Failure of a save, publish, delete or feed action.
#[derive(Debug)]
pub enum PublishError {
    Describe(DescribeError),
    Repo(RepoError),
    Feed(FeedError),
}

impl PublishError {
    /// Whether the action failed because its target does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Repo(RepoError::NotFound(_)))
    }
}

impl Display for PublishError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Describe(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Feed(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PublishError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Describe(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Feed(err) => Some(err),
        }
    }
}

impl From<DescribeError> for PublishError {
    fn from(value: DescribeError) -> Self {
        Self::Describe(value)
    }
}

impl From<RepoError> for PublishError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<FeedError> for PublishError {
    fn from(value: FeedError) -> Self {
        Self::Feed(value)
    }
}

impl From<rusqlite::Error> for PublishError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::Db(DbError::Sqlite(value)))
    }
}
