//! Feed importer: seeds the document store from another instance's feed.
//!
//! # Responsibility
//! - Read an Atom feed, fetch each entry's RDF and PDF, and rebuild the
//!   documents they describe.
//! - Publish every imported document through the regular orchestrator.
//!
//! # Invariants
//! - Entries are processed oldest first, so amended documents usually exist
//!   before the documents amending them.
//! - Reference data is memoized per run in `ImportRun`; there is no global
//!   importer state.
//! - A failing entry is reported and skipped; storage errors abort the run.

use crate::media::MediaError;
use crate::rdf::parse::ParseError;
use crate::repo::RepoError;
use crate::service::PublishError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod feed;
mod fetch;
mod handlers;
mod importer;
mod run;

pub use feed::{parse_feed, FeedEntryLinks};
pub use fetch::{DirFetcher, HttpFetcher, ResourceFetcher};
pub use handlers::{DocumentDraft, SeriesKey, PREDICATE_HANDLERS};
pub use importer::{FeedImporter, ImportReport, SkippedEntry};
pub use run::ImportRun;

pub type ImportResult<T> = Result<T, ImportError>;

#[derive(Debug)]
pub enum ImportError {
    Fetch {
        location: String,
        source: std::io::Error,
    },
    Http {
        location: String,
        source: reqwest::Error,
    },
    Feed(String),
    Rdf(ParseError),
    /// No subject of a known document class in the fetched RDF.
    UnsupportedDocument(String),
    MissingField(&'static str),
    InvalidValue {
        predicate: String,
        value: String,
    },
    Media(MediaError),
    Repo(RepoError),
    Publish(PublishError),
}

impl ImportError {
    /// Whether the failure is confined to one feed entry.
    pub fn is_entry_level(&self) -> bool {
        !matches!(
            self,
            Self::Repo(RepoError::Db(_))
                | Self::Publish(PublishError::Repo(RepoError::Db(_)))
                | Self::Media(_)
        )
    }
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch { location, source } => write!(f, "cannot fetch {location}: {source}"),
            Self::Http { location, source } => {
                write!(f, "cannot download {location}: {source}")
            }
            Self::Feed(message) => write!(f, "invalid Atom feed: {message}"),
            Self::Rdf(err) => write!(f, "{err}"),
            Self::UnsupportedDocument(what) => write!(f, "unsupported document: {what}"),
            Self::MissingField(field) => write!(f, "missing required field {field}"),
            Self::InvalidValue { predicate, value } => {
                write!(f, "invalid value `{value}` for {predicate}")
            }
            Self::Media(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Publish(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Fetch { source, .. } => Some(source),
            Self::Http { source, .. } => Some(source),
            Self::Rdf(err) => Some(err),
            Self::Media(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Publish(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ParseError> for ImportError {
    fn from(value: ParseError) -> Self {
        Self::Rdf(value)
    }
}

impl From<MediaError> for ImportError {
    fn from(value: MediaError) -> Self {
        Self::Media(value)
    }
}

impl From<RepoError> for ImportError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<PublishError> for ImportError {
    fn from(value: PublishError) -> Self {
        Self::Publish(value)
    }
}
