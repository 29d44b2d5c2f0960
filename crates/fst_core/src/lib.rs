//! Core domain logic for the regulation publishing service.
//! This crate is the single source of truth for document identity and
//! for everything the Atom feed exposes.

pub mod checksum;
pub mod config;
pub mod db;
pub mod feed;
pub mod import;
pub mod logging;
pub mod media;
pub mod model;
pub mod rdf;
pub mod repo;
pub mod service;

pub use config::{ConfigError, Settings};
pub use db::{open_db, open_db_in_memory, DbError};
pub use feed::{render_entry, render_feed, FeedContext, FeedError};
pub use logging::{init_logging, LoggingError};
pub use media::{MediaError, MediaStore};
pub use model::document::{
    Document, DocumentBody, DocumentId, DocumentKind, DocumentRef, DocumentValidationError,
};
pub use model::publication::{DeletionPolicy, LedgerRecord, MetadataPost};
pub use repo::document_repo::{DocumentRepository, SqliteDocumentRepository};
pub use repo::{RepoError, RepoResult};
pub use service::clock::{Clock, ManualClock, SystemClock};
pub use service::orchestrator::PublishingService;
pub use service::{PublishError, PublishResult};
