//! Metadata post persistence.
//!
//! # Invariants
//! - At most one post per `(document_kind, document_uuid)`.
//! - Upserts rewrite the existing row in place, so its id stays stable.

use crate::model::document::{DocumentKind, DocumentRef};
use crate::model::publication::{MetadataPost, MetadataPostId};
use crate::repo::{parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const POST_SELECT_SQL: &str =
    "SELECT id, document_kind, document_uuid, slug, data, md5 FROM metadata_posts";

pub trait MetadataPostRepository {
    /// Inserts or replaces the post owned by `owner`.
    fn upsert_post(
        &self,
        owner: DocumentRef,
        slug: &str,
        data: &str,
        md5: &str,
    ) -> RepoResult<MetadataPost>;
    fn get_post(&self, owner: DocumentRef) -> RepoResult<Option<MetadataPost>>;
    fn get_post_by_id(&self, id: MetadataPostId) -> RepoResult<Option<MetadataPost>>;
    fn get_post_by_slug(&self, slug: &str) -> RepoResult<Option<MetadataPost>>;
    /// Returns whether a post existed.
    fn delete_post(&self, owner: DocumentRef) -> RepoResult<bool>;
}

pub struct SqliteMetadataPostRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMetadataPostRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn select_one(
        &self,
        filter: &str,
        params: impl rusqlite::Params,
    ) -> RepoResult<Option<MetadataPost>> {
        let raw = self
            .conn
            .query_row(&format!("{POST_SELECT_SQL} {filter};"), params, raw_post_row)
            .optional()?;
        raw.map(post_from_raw).transpose()
    }
}

impl MetadataPostRepository for SqliteMetadataPostRepository<'_> {
    fn upsert_post(
        &self,
        owner: DocumentRef,
        slug: &str,
        data: &str,
        md5: &str,
    ) -> RepoResult<MetadataPost> {
        self.conn.execute(
            "INSERT INTO metadata_posts (document_kind, document_uuid, slug, data, md5)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (document_kind, document_uuid) DO UPDATE SET
                slug = excluded.slug,
                data = excluded.data,
                md5 = excluded.md5;",
            params![owner.kind.as_str(), owner.id.to_string(), slug, data, md5],
        )?;
        self.get_post(owner)?
            .ok_or_else(|| RepoError::NotFound(format!("metadata post for {owner}")))
    }

    fn get_post(&self, owner: DocumentRef) -> RepoResult<Option<MetadataPost>> {
        self.select_one(
            "WHERE document_kind = ?1 AND document_uuid = ?2",
            params![owner.kind.as_str(), owner.id.to_string()],
        )
    }

    fn get_post_by_id(&self, id: MetadataPostId) -> RepoResult<Option<MetadataPost>> {
        self.select_one("WHERE id = ?1", [id])
    }

    fn get_post_by_slug(&self, slug: &str) -> RepoResult<Option<MetadataPost>> {
        self.select_one("WHERE slug = ?1", [slug])
    }

    fn delete_post(&self, owner: DocumentRef) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM metadata_posts WHERE document_kind = ?1 AND document_uuid = ?2;",
            params![owner.kind.as_str(), owner.id.to_string()],
        )?;
        Ok(changed > 0)
    }
}

type RawPost = (MetadataPostId, String, String, String, String, String);

fn raw_post_row(row: &Row<'_>) -> rusqlite::Result<RawPost> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn post_from_raw((id, kind, uuid, slug, data, md5): RawPost) -> RepoResult<MetadataPost> {
    let kind = DocumentKind::parse(kind.as_str()).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid document kind `{kind}` in metadata_posts.document_kind"
        ))
    })?;
    Ok(MetadataPost {
        id,
        owner: DocumentRef::new(kind, parse_uuid(uuid.as_str())?),
        slug,
        data,
        md5,
    })
}
