//! Feed ledger persistence.
//!
//! # Responsibility
//! - Store one row per feed-visible publish/delete event.
//! - Answer the ordering queries the feed and the publish path rely on.
//!
//! # Invariants
//! - At most one live row (`deleted_at IS NULL`) per owner, enforced by a
//!   partial unique index.
//! - `published_at` is never rewritten by `touch_record`.
//! - Feed order is `updated_at DESC, id DESC`.

use crate::model::document::{DocumentKind, DocumentRef};
use crate::model::publication::{LedgerRecord, LedgerRecordId, MetadataPostId};
use crate::repo::{parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const LEDGER_SELECT_SQL: &str = "SELECT
    id,
    document_kind,
    document_uuid,
    entry_id,
    updated_at,
    published_at,
    deleted_at,
    metadata_post_id
FROM feed_entries";

/// Insert model for ledger rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerRecord {
    pub owner: Option<DocumentRef>,
    pub entry_id: String,
    pub updated_ms: i64,
    pub published_ms: i64,
    pub deleted_ms: Option<i64>,
    pub metadata_post_id: Option<MetadataPostId>,
}

pub trait LedgerRepository {
    /// Earliest live row for `owner` by `published ASC, id ASC`.
    fn earliest_live(&self, owner: DocumentRef) -> RepoResult<Option<LedgerRecord>>;
    fn insert_record(&self, record: &NewLedgerRecord) -> RepoResult<LedgerRecord>;
    /// Bumps `updated_at` and relinks the post; `published_at` is untouched.
    fn touch_record(
        &self,
        id: LedgerRecordId,
        entry_id: &str,
        updated_ms: i64,
        metadata_post_id: Option<MetadataPostId>,
    ) -> RepoResult<LedgerRecord>;
    /// Deletes every row owned by `owner`; returns the number removed.
    fn delete_for(&self, owner: DocumentRef) -> RepoResult<usize>;
    /// Deletes only the live rows owned by `owner`.
    fn delete_live_for(&self, owner: DocumentRef) -> RepoResult<usize>;
    /// All rows in feed order.
    fn list_records(&self) -> RepoResult<Vec<LedgerRecord>>;
}

pub struct SqliteLedgerRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLedgerRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn get_record(&self, id: LedgerRecordId) -> RepoResult<LedgerRecord> {
        let raw = self
            .conn
            .query_row(
                &format!("{LEDGER_SELECT_SQL} WHERE id = ?1;"),
                [id],
                raw_ledger_row,
            )
            .optional()?
            .ok_or_else(|| RepoError::NotFound(format!("ledger record {id}")))?;
        record_from_raw(raw)
    }
}

impl LedgerRepository for SqliteLedgerRepository<'_> {
    fn earliest_live(&self, owner: DocumentRef) -> RepoResult<Option<LedgerRecord>> {
        let raw = self
            .conn
            .query_row(
                &format!(
                    "{LEDGER_SELECT_SQL}
                     WHERE document_kind = ?1 AND document_uuid = ?2 AND deleted_at IS NULL
                     ORDER BY published_at ASC, id ASC
                     LIMIT 1;"
                ),
                params![owner.kind.as_str(), owner.id.to_string()],
                raw_ledger_row,
            )
            .optional()?;
        raw.map(record_from_raw).transpose()
    }

    fn insert_record(&self, record: &NewLedgerRecord) -> RepoResult<LedgerRecord> {
        self.conn.execute(
            "INSERT INTO feed_entries (
                document_kind,
                document_uuid,
                entry_id,
                updated_at,
                published_at,
                deleted_at,
                metadata_post_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                record.owner.map(|owner| owner.kind.as_str()),
                record.owner.map(|owner| owner.id.to_string()),
                record.entry_id.as_str(),
                record.updated_ms,
                record.published_ms,
                record.deleted_ms,
                record.metadata_post_id,
            ],
        )?;
        self.get_record(self.conn.last_insert_rowid())
    }

    fn touch_record(
        &self,
        id: LedgerRecordId,
        entry_id: &str,
        updated_ms: i64,
        metadata_post_id: Option<MetadataPostId>,
    ) -> RepoResult<LedgerRecord> {
        let changed = self.conn.execute(
            "UPDATE feed_entries
             SET entry_id = ?2, updated_at = ?3, metadata_post_id = ?4
             WHERE id = ?1;",
            params![id, entry_id, updated_ms, metadata_post_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("ledger record {id}")));
        }
        self.get_record(id)
    }

    fn delete_for(&self, owner: DocumentRef) -> RepoResult<usize> {
        Ok(self.conn.execute(
            "DELETE FROM feed_entries WHERE document_kind = ?1 AND document_uuid = ?2;",
            params![owner.kind.as_str(), owner.id.to_string()],
        )?)
    }

    fn delete_live_for(&self, owner: DocumentRef) -> RepoResult<usize> {
        Ok(self.conn.execute(
            "DELETE FROM feed_entries
             WHERE document_kind = ?1 AND document_uuid = ?2 AND deleted_at IS NULL;",
            params![owner.kind.as_str(), owner.id.to_string()],
        )?)
    }

    fn list_records(&self) -> RepoResult<Vec<LedgerRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{LEDGER_SELECT_SQL} ORDER BY updated_at DESC, id DESC;"
        ))?;
        let raws = stmt
            .query_map([], raw_ledger_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(record_from_raw).collect()
    }
}

struct RawLedgerRow {
    id: LedgerRecordId,
    kind: Option<String>,
    uuid: Option<String>,
    entry_id: String,
    updated_ms: i64,
    published_ms: i64,
    deleted_ms: Option<i64>,
    metadata_post_id: Option<MetadataPostId>,
}

fn raw_ledger_row(row: &Row<'_>) -> rusqlite::Result<RawLedgerRow> {
    Ok(RawLedgerRow {
        id: row.get("id")?,
        kind: row.get("document_kind")?,
        uuid: row.get("document_uuid")?,
        entry_id: row.get("entry_id")?,
        updated_ms: row.get("updated_at")?,
        published_ms: row.get("published_at")?,
        deleted_ms: row.get("deleted_at")?,
        metadata_post_id: row.get("metadata_post_id")?,
    })
}

fn record_from_raw(raw: RawLedgerRow) -> RepoResult<LedgerRecord> {
    let owner = match (raw.kind, raw.uuid) {
        (Some(kind), Some(uuid)) => {
            let kind = DocumentKind::parse(kind.as_str()).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid document kind `{kind}` in feed_entries.document_kind"
                ))
            })?;
            Some(DocumentRef::new(kind, parse_uuid(uuid.as_str())?))
        }
        (None, None) => None,
        _ => {
            return Err(RepoError::InvalidData(format!(
                "ledger record {} has a partial owner",
                raw.id
            )));
        }
    };
    Ok(LedgerRecord {
        id: raw.id,
        owner,
        entry_id: raw.entry_id,
        updated_ms: raw.updated_ms,
        published_ms: raw.published_ms,
        deleted_ms: raw.deleted_ms,
        metadata_post_id: raw.metadata_post_id,
    })
}
