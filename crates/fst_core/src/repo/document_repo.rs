//! Document store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist collections, organizations, reference data and the three
//!   document variants with their relation sets.
//! - Load full document aggregates, including derived consolidation links.
//!
//! # Invariants
//! - `slug` and `identifier` are written once at creation and never change.
//! - `update_document` replaces every relation set of the document.
//! - `is_published` is only written by `set_published`.

use crate::model::collection::{Collection, CollectionId, Organization};
use crate::model::document::{
    Attachment, AuthorizationRef, ConsolidatedRegulation, ContentFile, DirectiveRef, Document,
    DocumentBody, DocumentId, DocumentKind, DocumentLink, DocumentRef, DocumentValidationError,
    GeneralAdvice, Keyword, Regulation, SeriesFields, SupplementaryFile,
};
use crate::model::identity::{compare_sequence, to_slug};
use crate::repo::{bool_to_int, parse_uuid, RepoError, RepoResult};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::cmp::Ordering;
use std::collections::HashSet;

const DOCUMENT_SELECT_SQL: &str = "SELECT
    d.uuid,
    d.kind,
    d.collection_id,
    c.title AS collection_title,
    c.short_name AS collection_short_name,
    c.slug AS collection_slug,
    d.year,
    d.sequence_number,
    d.title,
    d.summary,
    d.decision_date,
    d.effective_date,
    d.print_date,
    d.consolidation_date,
    d.base_uuid,
    d.latest_amendment_uuid,
    d.is_reprint,
    d.is_published,
    d.content_path,
    d.content_md5,
    p.name AS publisher_name,
    b.name AS decided_by_name
FROM documents d
LEFT JOIN collections c ON c.id = d.collection_id
LEFT JOIN organizations p ON p.id = d.publisher_id
LEFT JOIN organizations b ON b.id = d.decided_by_id";

const RELATION_AMENDS: &str = "amends";
const RELATION_REPEALS: &str = "repeals";
const RELATION_CONSOLIDATES: &str = "consolidates";

/// Filter for document listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentListQuery {
    pub kind: Option<DocumentKind>,
    pub published: Option<bool>,
}

impl DocumentListQuery {
    /// Documents awaiting the publish action.
    pub fn unpublished() -> Self {
        Self {
            kind: None,
            published: Some(false),
        }
    }
}

/// Repository interface for the document store.
pub trait DocumentRepository {
    fn create_collection(&self, title: &str, short_name: &str) -> RepoResult<Collection>;
    fn get_collection(&self, id: CollectionId) -> RepoResult<Option<Collection>>;
    /// Looks a collection up by short name (`EXFS`) or slug (`exfs`).
    fn find_collection(&self, name: &str) -> RepoResult<Option<Collection>>;
    fn list_collections(&self) -> RepoResult<Vec<Collection>>;
    /// Returns the id of the organization named `name`, creating it if missing.
    fn ensure_organization(&self, name: &str) -> RepoResult<i64>;
    fn create_document(&self, document: &Document) -> RepoResult<DocumentId>;
    /// Rejects any change of kind or identity fields.
    fn update_document(&self, document: &Document) -> RepoResult<()>;
    fn get_document(&self, id: DocumentId) -> RepoResult<Option<Document>>;
    fn find_by_slug(&self, slug: &str) -> RepoResult<Option<Document>>;
    /// Newest decision (or consolidation) date first.
    fn list_documents(&self, query: &DocumentListQuery) -> RepoResult<Vec<Document>>;
    fn set_published(&self, id: DocumentId, published: bool) -> RepoResult<()>;
    fn delete_document(&self, id: DocumentId) -> RepoResult<()>;
}

/// SQLite-backed document store.
pub struct SqliteDocumentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

/// Row image of `documents` before relations are hydrated.
struct DocumentRow {
    uuid: String,
    kind: DocumentKind,
    collection: Option<Collection>,
    year: Option<i32>,
    sequence_number: Option<String>,
    title: String,
    summary: String,
    decision_date: Option<NaiveDate>,
    effective_date: Option<NaiveDate>,
    print_date: Option<NaiveDate>,
    consolidation_date: Option<NaiveDate>,
    base_uuid: Option<String>,
    latest_amendment_uuid: Option<String>,
    is_reprint: bool,
    is_published: bool,
    content: Option<ContentFile>,
    publisher: Option<Organization>,
    decided_by: Option<Organization>,
}

impl DocumentRepository for SqliteDocumentRepository<'_> {
    fn create_collection(&self, title: &str, short_name: &str) -> RepoResult<Collection> {
        let title = title.trim();
        let short_name = short_name.trim();
        if title.is_empty() || short_name.is_empty() {
            return Err(RepoError::InvalidData(
                "collection title and short name must not be empty".to_string(),
            ));
        }
        let slug = to_slug(short_name);
        self.conn.execute(
            "INSERT INTO collections (title, short_name, slug) VALUES (?1, ?2, ?3);",
            params![title, short_name, slug],
        )?;
        Ok(Collection {
            id: self.conn.last_insert_rowid(),
            title: title.to_string(),
            short_name: short_name.to_string(),
            slug,
        })
    }

    fn get_collection(&self, id: CollectionId) -> RepoResult<Option<Collection>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, title, short_name, slug FROM collections WHERE id = ?1;",
                [id],
                parse_collection_row,
            )
            .optional()?)
    }

    fn find_collection(&self, name: &str) -> RepoResult<Option<Collection>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, title, short_name, slug FROM collections
                 WHERE short_name = ?1 OR slug = ?2
                 ORDER BY id ASC LIMIT 1;",
                params![name, to_slug(name)],
                parse_collection_row,
            )
            .optional()?)
    }

    fn list_collections(&self) -> RepoResult<Vec<Collection>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, short_name, slug FROM collections ORDER BY short_name;")?;
        let collections = stmt
            .query_map([], parse_collection_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(collections)
    }

    fn ensure_organization(&self, name: &str) -> RepoResult<i64> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RepoError::InvalidData(
                "organization name must not be empty".to_string(),
            ));
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO organizations (name) VALUES (?1);",
            [name],
        )?;
        Ok(self.conn.query_row(
            "SELECT id FROM organizations WHERE name = ?1;",
            [name],
            |row| row.get(0),
        )?)
    }

    fn create_document(&self, document: &Document) -> RepoResult<DocumentId> {
        document.validate()?;
        let slug = document.slug()?;
        let identifier = document.identifier()?;
        let uuid = document.id.to_string();

        self.conn.execute(
            "INSERT INTO documents (uuid, kind, slug, identifier, title)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                uuid,
                document.kind().as_str(),
                slug,
                identifier,
                document.title()
            ],
        )?;
        self.write_fields(document)?;
        self.write_relations(document)?;
        Ok(document.id)
    }

    fn update_document(&self, document: &Document) -> RepoResult<()> {
        document.validate()?;
        let uuid = document.id.to_string();
        let stored: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT kind, slug FROM documents WHERE uuid = ?1;",
                [uuid.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((stored_kind, stored_slug)) = stored else {
            return Err(RepoError::NotFound(format!("document {}", document.id)));
        };

        let new_slug = document.slug()?;
        if stored_kind != document.kind().as_str() || stored_slug != new_slug {
            return Err(RepoError::IdentityChanged {
                id: document.id,
                stored_slug,
                new_slug,
            });
        }

        self.write_fields(document)?;
        self.write_relations(document)?;
        Ok(())
    }

    fn get_document(&self, id: DocumentId) -> RepoResult<Option<Document>> {
        self.load_one("WHERE d.uuid = ?1", id.to_string())
    }

    fn find_by_slug(&self, slug: &str) -> RepoResult<Option<Document>> {
        self.load_one("WHERE d.slug = ?1", slug.to_string())
    }

    fn list_documents(&self, query: &DocumentListQuery) -> RepoResult<Vec<Document>> {
        let mut sql = format!("{DOCUMENT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(kind) = query.kind {
            sql.push_str(" AND d.kind = ?");
            bind_values.push(Value::Text(kind.as_str().to_string()));
        }
        if let Some(published) = query.published {
            sql.push_str(" AND d.is_published = ?");
            bind_values.push(Value::Integer(bool_to_int(published)));
        }
        sql.push_str(
            " ORDER BY COALESCE(d.decision_date, d.consolidation_date) DESC, d.slug ASC",
        );

        let rows = {
            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(bind_values))?;
            let mut parsed = Vec::new();
            while let Some(row) = rows.next()? {
                parsed.push(parse_document_row(row)?);
            }
            parsed
        };

        rows.into_iter().map(|row| self.hydrate(row)).collect()
    }

    fn set_published(&self, id: DocumentId, published: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE documents
             SET is_published = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), bool_to_int(published)],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("document {id}")));
        }
        Ok(())
    }

    fn delete_document(&self, id: DocumentId) -> RepoResult<()> {
        let uuid = id.to_string();
        let referencing: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents
             WHERE base_uuid = ?1 OR latest_amendment_uuid = ?1;",
            [uuid.as_str()],
            |row| row.get(0),
        )?;
        if referencing > 0 {
            return Err(RepoError::Referenced(id));
        }

        let changed = self
            .conn
            .execute("DELETE FROM documents WHERE uuid = ?1;", [uuid.as_str()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("document {id}")));
        }
        Ok(())
    }
}

impl SqliteDocumentRepository<'_> {
    fn load_one(&self, filter: &str, value: String) -> RepoResult<Option<Document>> {
        let row = {
            let mut stmt = self.conn.prepare(&format!("{DOCUMENT_SELECT_SQL} {filter};"))?;
            let mut rows = stmt.query([value])?;
            let parsed = match rows.next()? {
                Some(row) => Some(parse_document_row(row)?),
                None => None,
            };
            parsed
        };
        row.map(|row| self.hydrate(row)).transpose()
    }

    fn write_fields(&self, document: &Document) -> RepoResult<()> {
        let uuid = document.id.to_string();
        let content_path = document.content().map(|file| file.path.as_str());
        let content_md5 = document.content().map_or("", |file| file.md5.as_str());
        let publisher_id = document
            .publisher()
            .map(|org| self.ensure_organization(org.name.as_str()))
            .transpose()?;

        match &document.body {
            DocumentBody::Regulation(Regulation { series, .. })
            | DocumentBody::GeneralAdvice(GeneralAdvice { series }) => {
                let collection = series
                    .collection
                    .as_ref()
                    .ok_or(DocumentValidationError::MissingCollection)?;
                if self.get_collection(collection.id)?.is_none() {
                    return Err(RepoError::NotFound(format!("collection {}", collection.id)));
                }
                let decided_by_id = series
                    .decided_by
                    .as_ref()
                    .map(|org| self.ensure_organization(org.name.as_str()))
                    .transpose()?;

                self.conn.execute(
                    "UPDATE documents SET
                        collection_id = ?2,
                        year = ?3,
                        sequence_number = ?4,
                        title = ?5,
                        summary = ?6,
                        decision_date = ?7,
                        effective_date = ?8,
                        print_date = ?9,
                        is_reprint = ?10,
                        content_path = ?11,
                        content_md5 = ?12,
                        publisher_id = ?13,
                        decided_by_id = ?14,
                        updated_at = (strftime('%s', 'now') * 1000)
                     WHERE uuid = ?1;",
                    params![
                        uuid,
                        collection.id,
                        series.year,
                        series.sequence_number.as_str(),
                        series.title.as_str(),
                        series.summary.as_str(),
                        series.decision_date,
                        series.effective_date,
                        series.print_date,
                        bool_to_int(series.is_reprint),
                        content_path,
                        content_md5,
                        publisher_id,
                        decided_by_id,
                    ],
                )?;
            }
            DocumentBody::ConsolidatedRegulation(consolidated) => {
                let base = consolidated.base.as_ref().map(|link| link.reference.id);
                let latest = consolidated
                    .latest_amendment
                    .as_ref()
                    .map(|link| link.reference.id);
                for target in base.iter().chain(latest.iter()) {
                    self.ensure_document(*target)?;
                }

                self.conn.execute(
                    "UPDATE documents SET
                        title = ?2,
                        consolidation_date = ?3,
                        base_uuid = ?4,
                        latest_amendment_uuid = ?5,
                        content_path = ?6,
                        content_md5 = ?7,
                        publisher_id = ?8,
                        updated_at = (strftime('%s', 'now') * 1000)
                     WHERE uuid = ?1;",
                    params![
                        uuid,
                        consolidated.title.as_str(),
                        consolidated.consolidation_date,
                        base.map(|id| id.to_string()),
                        latest.map(|id| id.to_string()),
                        content_path,
                        content_md5,
                        publisher_id,
                    ],
                )?;
            }
        }
        Ok(())
    }

    fn write_relations(&self, document: &Document) -> RepoResult<()> {
        let uuid = document.id.to_string();
        for table in [
            "document_relations",
            "document_keywords",
            "document_directives",
            "document_authorizations",
            "attachments",
            "supplementary_files",
        ] {
            let column = if table == "document_relations" {
                "from_uuid"
            } else {
                "document_uuid"
            };
            self.conn.execute(
                &format!("DELETE FROM {table} WHERE {column} = ?1;"),
                [uuid.as_str()],
            )?;
        }

        let Some(series) = document.series() else {
            return Ok(());
        };

        for (relation, links) in [
            (RELATION_AMENDS, &series.amends),
            (RELATION_REPEALS, &series.repeals),
            (RELATION_CONSOLIDATES, &series.consolidates),
        ] {
            for (position, link) in links.iter().enumerate() {
                self.ensure_document(link.reference.id)?;
                self.conn.execute(
                    "INSERT OR IGNORE INTO document_relations (from_uuid, to_uuid, relation, position)
                     VALUES (?1, ?2, ?3, ?4);",
                    params![uuid, link.reference.id.to_string(), relation, position as i64],
                )?;
            }
        }

        for keyword in &series.keywords {
            let keyword_id = self.ensure_keyword(keyword)?;
            self.conn.execute(
                "INSERT OR IGNORE INTO document_keywords (document_uuid, keyword_id) VALUES (?1, ?2);",
                params![uuid, keyword_id],
            )?;
        }

        let DocumentBody::Regulation(regulation) = &document.body else {
            return Ok(());
        };

        for (position, directive) in regulation.directives.iter().enumerate() {
            let directive_id = self.ensure_directive(directive)?;
            self.conn.execute(
                "INSERT OR IGNORE INTO document_directives (document_uuid, directive_id, position)
                 VALUES (?1, ?2, ?3);",
                params![uuid, directive_id, position as i64],
            )?;
        }

        for (position, authorization) in regulation.authorizations.iter().enumerate() {
            let authorization_id = self.ensure_authorization(authorization)?;
            self.conn.execute(
                "INSERT OR IGNORE INTO document_authorizations (document_uuid, authorization_id, position)
                 VALUES (?1, ?2, ?3);",
                params![uuid, authorization_id, position as i64],
            )?;
        }

        for (position, attachment) in regulation.attachments.iter().enumerate() {
            self.conn.execute(
                "INSERT INTO attachments (document_uuid, position, title, file_path, file_md5)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    uuid,
                    position as i64,
                    attachment.title.as_str(),
                    attachment.file.as_ref().map(|file| file.path.as_str()),
                    attachment.file.as_ref().map_or("", |file| file.md5.as_str()),
                ],
            )?;
        }

        for (position, extra) in regulation.supplementary_files.iter().enumerate() {
            self.conn.execute(
                "INSERT INTO supplementary_files (document_uuid, position, title, file_path, file_md5)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    uuid,
                    position as i64,
                    extra.title.as_str(),
                    extra.file.path.as_str(),
                    extra.file.md5.as_str(),
                ],
            )?;
        }

        Ok(())
    }

    fn ensure_document(&self, id: DocumentId) -> RepoResult<()> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE uuid = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(RepoError::NotFound(format!("document {id}")));
        }
        Ok(())
    }

    fn ensure_keyword(&self, keyword: &Keyword) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT OR IGNORE INTO keywords (title, description) VALUES (?1, ?2);",
            params![keyword.title.as_str(), keyword.description.as_str()],
        )?;
        Ok(self.conn.query_row(
            "SELECT id FROM keywords WHERE title = ?1;",
            [keyword.title.as_str()],
            |row| row.get(0),
        )?)
    }

    fn ensure_directive(&self, directive: &DirectiveRef) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT OR IGNORE INTO directive_refs (celex_number, title) VALUES (?1, ?2);",
            params![directive.celex_number.as_str(), directive.title.as_str()],
        )?;
        Ok(self.conn.query_row(
            "SELECT id FROM directive_refs WHERE celex_number = ?1;",
            [directive.celex_number.as_str()],
            |row| row.get(0),
        )?)
    }

    fn ensure_authorization(&self, authorization: &AuthorizationRef) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT OR IGNORE INTO authorization_refs (title, sfs_number, chapter, section, comment)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                authorization.title.as_str(),
                authorization.sfs_number.as_str(),
                authorization.chapter.as_str(),
                authorization.section.as_str(),
                authorization.comment.as_str(),
            ],
        )?;
        Ok(self.conn.query_row(
            "SELECT id FROM authorization_refs
             WHERE sfs_number = ?1 AND chapter = ?2 AND section = ?3;",
            params![
                authorization.sfs_number.as_str(),
                authorization.chapter.as_str(),
                authorization.section.as_str(),
            ],
            |row| row.get(0),
        )?)
    }

    fn hydrate(&self, row: DocumentRow) -> RepoResult<Document> {
        let id = parse_uuid(row.uuid.as_str())?;
        let body = match row.kind {
            DocumentKind::Regulation => DocumentBody::Regulation(Regulation {
                series: self.load_series(&row)?,
                directives: self.load_directives(row.uuid.as_str())?,
                authorizations: self.load_authorizations(row.uuid.as_str())?,
                attachments: self.load_attachments(row.uuid.as_str())?,
                supplementary_files: self.load_supplementary_files(row.uuid.as_str())?,
            }),
            DocumentKind::GeneralAdvice => DocumentBody::GeneralAdvice(GeneralAdvice {
                series: self.load_series(&row)?,
            }),
            DocumentKind::ConsolidatedRegulation => {
                let consolidation_date =
                    required(row.consolidation_date, &row, "consolidation_date")?;
                let base = row
                    .base_uuid
                    .as_deref()
                    .map(|uuid| self.load_link(uuid))
                    .transpose()?;
                let latest_amendment = row
                    .latest_amendment_uuid
                    .as_deref()
                    .map(|uuid| self.load_link(uuid))
                    .transpose()?;
                let underlying = match (&base, &latest_amendment) {
                    (Some(base), Some(latest)) => self.consolidation_chain(base, latest)?,
                    _ => Vec::new(),
                };
                DocumentBody::ConsolidatedRegulation(ConsolidatedRegulation {
                    title: row.title.clone(),
                    consolidation_date,
                    content: row.content.clone(),
                    base,
                    latest_amendment,
                    underlying,
                    publisher: row.publisher.clone(),
                    is_published: row.is_published,
                })
            }
        };
        Ok(Document::with_id(id, body))
    }

    fn load_series(&self, row: &DocumentRow) -> RepoResult<SeriesFields> {
        Ok(SeriesFields {
            collection: row.collection.clone(),
            year: required(row.year, row, "year")?,
            sequence_number: required(row.sequence_number.clone(), row, "sequence_number")?,
            title: row.title.clone(),
            summary: row.summary.clone(),
            decision_date: required(row.decision_date, row, "decision_date")?,
            effective_date: required(row.effective_date, row, "effective_date")?,
            print_date: required(row.print_date, row, "print_date")?,
            is_reprint: row.is_reprint,
            is_published: row.is_published,
            content: row.content.clone(),
            keywords: self.load_keywords(row.uuid.as_str())?,
            amends: self.load_relations(row.uuid.as_str(), RELATION_AMENDS)?,
            repeals: self.load_relations(row.uuid.as_str(), RELATION_REPEALS)?,
            consolidates: self.load_relations(row.uuid.as_str(), RELATION_CONSOLIDATES)?,
            publisher: row.publisher.clone(),
            decided_by: row.decided_by.clone(),
        })
    }

    fn load_link(&self, uuid: &str) -> RepoResult<DocumentLink> {
        self.conn
            .query_row(
                "SELECT uuid, kind, slug, identifier FROM documents WHERE uuid = ?1;",
                [uuid],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| RepoError::NotFound(format!("document {uuid}")))
            .and_then(|(uuid, kind, slug, identifier)| {
                link_from_parts(uuid, kind, slug, identifier)
            })
    }

    fn load_relations(&self, uuid: &str, relation: &str) -> RepoResult<Vec<DocumentLink>> {
        let mut stmt = self.conn.prepare(
            "SELECT d.uuid, d.kind, d.slug, d.identifier
             FROM document_relations r
             JOIN documents d ON d.uuid = r.to_uuid
             WHERE r.from_uuid = ?1 AND r.relation = ?2
             ORDER BY r.position ASC;",
        )?;
        let parts = stmt
            .query_map(params![uuid, relation], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<Result<Vec<(String, String, String, String)>, _>>()?;
        parts
            .into_iter()
            .map(|(uuid, kind, slug, identifier)| link_from_parts(uuid, kind, slug, identifier))
            .collect()
    }

    fn load_keywords(&self, uuid: &str) -> RepoResult<Vec<Keyword>> {
        let mut stmt = self.conn.prepare(
            "SELECT k.title, k.description
             FROM document_keywords dk
             JOIN keywords k ON k.id = dk.keyword_id
             WHERE dk.document_uuid = ?1
             ORDER BY k.title ASC;",
        )?;
        let keywords = stmt
            .query_map([uuid], |row| {
                Ok(Keyword {
                    title: row.get(0)?,
                    description: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keywords)
    }

    fn load_directives(&self, uuid: &str) -> RepoResult<Vec<DirectiveRef>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.celex_number, r.title
             FROM document_directives dd
             JOIN directive_refs r ON r.id = dd.directive_id
             WHERE dd.document_uuid = ?1
             ORDER BY dd.position ASC;",
        )?;
        let directives = stmt
            .query_map([uuid], |row| {
                Ok(DirectiveRef::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(directives)
    }

    fn load_authorizations(&self, uuid: &str) -> RepoResult<Vec<AuthorizationRef>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.title, r.sfs_number, r.chapter, r.section, r.comment
             FROM document_authorizations da
             JOIN authorization_refs r ON r.id = da.authorization_id
             WHERE da.document_uuid = ?1
             ORDER BY da.position ASC;",
        )?;
        let authorizations = stmt
            .query_map([uuid], |row| {
                Ok(AuthorizationRef {
                    title: row.get(0)?,
                    sfs_number: row.get(1)?,
                    chapter: row.get(2)?,
                    section: row.get(3)?,
                    comment: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(authorizations)
    }

    fn load_attachments(&self, uuid: &str) -> RepoResult<Vec<Attachment>> {
        let mut stmt = self.conn.prepare(
            "SELECT title, file_path, file_md5 FROM attachments
             WHERE document_uuid = ?1
             ORDER BY position ASC;",
        )?;
        let attachments = stmt
            .query_map([uuid], |row| {
                let path: Option<String> = row.get(1)?;
                let md5: String = row.get(2)?;
                Ok(Attachment {
                    title: row.get(0)?,
                    file: path.map(|path| ContentFile::new(path, md5)),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(attachments)
    }

    fn load_supplementary_files(&self, uuid: &str) -> RepoResult<Vec<SupplementaryFile>> {
        let mut stmt = self.conn.prepare(
            "SELECT title, file_path, file_md5 FROM supplementary_files
             WHERE document_uuid = ?1
             ORDER BY position ASC;",
        )?;
        let files = stmt
            .query_map([uuid], |row| {
                Ok(SupplementaryFile {
                    title: row.get(0)?,
                    file: ContentFile::new(row.get::<_, String>(1)?, row.get::<_, String>(2)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(files)
    }

    /// Regulations after `base` up to `latest` that amend the base, directly
    /// or through an already included amendment.
    fn consolidation_chain(
        &self,
        base: &DocumentLink,
        latest: &DocumentLink,
    ) -> RepoResult<Vec<DocumentLink>> {
        let (collection_id, base_key) = self.identity_key(base.reference.id)?;
        let (_, latest_key) = self.identity_key(latest.reference.id)?;

        let mut stmt = self.conn.prepare(
            "SELECT uuid, kind, slug, identifier, year, sequence_number
             FROM documents
             WHERE kind = 'regulation' AND collection_id = ?1;",
        )?;
        let mut candidates = stmt
            .query_map([collection_id], |row| {
                Ok((
                    (
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ),
                    (row.get::<_, i32>(4)?, row.get::<_, String>(5)?),
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        candidates.retain(|(_, key)| {
            compare_key(key, &base_key) == Ordering::Greater
                && compare_key(key, &latest_key) != Ordering::Greater
        });
        candidates.sort_by(|(_, left), (_, right)| compare_key(left, right));

        let mut included: HashSet<String> = HashSet::from([base.reference.id.to_string()]);
        let mut chain = Vec::new();
        for ((uuid, kind, slug, identifier), _) in candidates {
            let amends = self.amended_ids(uuid.as_str())?;
            if amends.iter().any(|target| included.contains(target)) {
                included.insert(uuid.clone());
                chain.push(link_from_parts(uuid, kind, slug, identifier)?);
            }
        }
        Ok(chain)
    }

    fn identity_key(&self, id: DocumentId) -> RepoResult<(Option<i64>, (i32, String))> {
        let row: Option<(Option<i64>, Option<i32>, Option<String>)> = self
            .conn
            .query_row(
                "SELECT collection_id, year, sequence_number FROM documents WHERE uuid = ?1;",
                [id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        match row {
            Some((collection_id, Some(year), Some(sequence))) => {
                Ok((collection_id, (year, sequence)))
            }
            Some(_) => Err(RepoError::InvalidData(format!(
                "document {id} has no year/sequence identity"
            ))),
            None => Err(RepoError::NotFound(format!("document {id}"))),
        }
    }

    fn amended_ids(&self, uuid: &str) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT to_uuid FROM document_relations WHERE from_uuid = ?1 AND relation = 'amends';",
        )?;
        let ids = stmt
            .query_map([uuid], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}

fn compare_key(left: &(i32, String), right: &(i32, String)) -> Ordering {
    left.0
        .cmp(&right.0)
        .then_with(|| compare_sequence(left.1.as_str(), right.1.as_str()))
}

fn required<T>(value: Option<T>, row: &DocumentRow, column: &str) -> RepoResult<T> {
    value.ok_or_else(|| {
        RepoError::InvalidData(format!(
            "document {} ({}) has no {column}",
            row.uuid, row.kind
        ))
    })
}

fn link_from_parts(
    uuid: String,
    kind: String,
    slug: String,
    identifier: String,
) -> RepoResult<DocumentLink> {
    let kind = DocumentKind::parse(kind.as_str()).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid document kind `{kind}` in documents.kind"))
    })?;
    Ok(DocumentLink {
        reference: DocumentRef::new(kind, parse_uuid(uuid.as_str())?),
        slug,
        identifier,
    })
}

fn parse_collection_row(row: &Row<'_>) -> rusqlite::Result<Collection> {
    Ok(Collection {
        id: row.get(0)?,
        title: row.get(1)?,
        short_name: row.get(2)?,
        slug: row.get(3)?,
    })
}

fn parse_document_row(row: &Row<'_>) -> RepoResult<DocumentRow> {
    let kind_text: String = row.get("kind")?;
    let kind = DocumentKind::parse(kind_text.as_str()).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid document kind `{kind_text}` in documents.kind"))
    })?;

    let collection = match row.get::<_, Option<i64>>("collection_id")? {
        Some(id) => Some(Collection {
            id,
            title: row.get("collection_title")?,
            short_name: row.get("collection_short_name")?,
            slug: row.get("collection_slug")?,
        }),
        None => None,
    };

    let content = row
        .get::<_, Option<String>>("content_path")?
        .map(|path| row.get::<_, String>("content_md5").map(|md5| ContentFile::new(path, md5)))
        .transpose()?;

    Ok(DocumentRow {
        uuid: row.get("uuid")?,
        kind,
        collection,
        year: row.get("year")?,
        sequence_number: row.get("sequence_number")?,
        title: row.get("title")?,
        summary: row.get("summary")?,
        decision_date: row.get("decision_date")?,
        effective_date: row.get("effective_date")?,
        print_date: row.get("print_date")?,
        consolidation_date: row.get("consolidation_date")?,
        base_uuid: row.get("base_uuid")?,
        latest_amendment_uuid: row.get("latest_amendment_uuid")?,
        is_reprint: row.get::<_, i64>("is_reprint")? == 1,
        is_published: row.get::<_, i64>("is_published")? == 1,
        content,
        publisher: row
            .get::<_, Option<String>>("publisher_name")?
            .map(Organization::new),
        decided_by: row
            .get::<_, Option<String>>("decided_by_name")?
            .map(Organization::new),
    })
}
