//! Publication artifacts derived from documents.
//!
//! # Responsibility
//! - Define the cached RDF snapshot (`MetadataPost`) and the feed ledger
//!   record (`LedgerRecord`).
//!
//! # Invariants
//! - `MetadataPost::md5` always matches `data` bytes.
//! - `LedgerRecord::published_ms` is fixed at first creation.
//! - A ledger record without an owner is a pure deletion marker.

use crate::model::document::DocumentRef;
use serde::{Deserialize, Serialize};

/// Storage identifier of a metadata post row.
pub type MetadataPostId = i64;
/// Storage identifier of a ledger row.
pub type LedgerRecordId = i64;

/// Persisted, checksummed RDF/XML snapshot of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataPost {
    pub id: MetadataPostId,
    pub owner: DocumentRef,
    /// Document slug; the post is served at `/publ/<slug>/rdf`.
    pub slug: String,
    /// UTF-8 RDF/XML.
    pub data: String,
    /// Lowercase MD5 hex digest of `data`.
    pub md5: String,
}

impl MetadataPost {
    /// Byte length of `data`, advertised on the feed's RDF link.
    pub fn length(&self) -> usize {
        self.data.len()
    }
}

/// One feed-visible record of a document's publish/update/delete lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: LedgerRecordId,
    pub owner: Option<DocumentRef>,
    /// Atom entry id: the document's canonical URI.
    pub entry_id: String,
    /// Epoch milliseconds (UTC).
    pub updated_ms: i64,
    /// Epoch milliseconds (UTC). Set once.
    pub published_ms: i64,
    /// Epoch milliseconds (UTC) when the document was removed.
    pub deleted_ms: Option<i64>,
    pub metadata_post_id: Option<MetadataPostId>,
}

impl LedgerRecord {
    pub fn is_live(&self) -> bool {
        self.deleted_ms.is_none()
    }
}

/// How deleted documents are reflected in the feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionPolicy {
    /// Drop post and ledger rows; the feed stays complete (RFC 5005).
    #[default]
    Remove,
    /// Legacy: leave an ownerless deletion marker in the feed.
    Tombstone,
}

impl DeletionPolicy {
    /// Whether the rendered feed may declare `<fh:complete/>`.
    pub fn is_complete_feed(self) -> bool {
        matches!(self, Self::Remove)
    }
}
