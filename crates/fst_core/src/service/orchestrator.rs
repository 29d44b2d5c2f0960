//! Publication orchestrator.
//!
//! # Responsibility
//! - Drive documents through Unpublished, Published and Removed.
//! - Wrap every transition in one `IMMEDIATE` transaction so document,
//!   post and ledger writes commit or roll back together.
//!
//! # Invariants
//! - Saving a never-published document writes neither post nor ledger row.
//! - Saving a published document refreshes its post and `updated`.
//! - Deleting runs `mark_deleted` before the document row is removed.

use crate::config::Settings;
use crate::feed::FeedContext;
use crate::model::document::{Document, DocumentId};
use crate::model::publication::{DeletionPolicy, LedgerRecord, MetadataPost};
use crate::repo::document_repo::{DocumentListQuery, DocumentRepository, SqliteDocumentRepository};
use crate::repo::ledger_repo::SqliteLedgerRepository;
use crate::repo::post_repo::SqliteMetadataPostRepository;
use crate::repo::RepoError;
use crate::service::clock::Clock;
use crate::service::ledger::FeedLedger;
use crate::service::post_cache::MetadataPostCache;
use crate::service::PublishResult;
use log::{error, info};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Instant;

/// Publishing entry point shared by the CLI, web server and importer.
pub struct PublishingService<C: Clock> {
    default_publisher: String,
    policy: DeletionPolicy,
    clock: C,
}

impl<C: Clock> PublishingService<C> {
    pub fn new(default_publisher: impl Into<String>, policy: DeletionPolicy, clock: C) -> Self {
        Self {
            default_publisher: default_publisher.into(),
            policy,
            clock,
        }
    }

    pub fn from_settings(settings: &Settings, clock: C) -> Self {
        Self::new(
            settings.site.org_name.clone(),
            settings.feed.deletion_policy,
            clock,
        )
    }

    pub fn deletion_policy(&self) -> DeletionPolicy {
        self.policy
    }

    fn ledger<'c>(
        &'c self,
        conn: &'c Connection,
    ) -> FeedLedger<SqliteLedgerRepository<'c>, SqliteMetadataPostRepository<'c>, &'c C> {
        FeedLedger::new(
            SqliteLedgerRepository::new(conn),
            MetadataPostCache::new(
                SqliteMetadataPostRepository::new(conn),
                self.default_publisher.as_str(),
            ),
            &self.clock,
            self.policy,
        )
    }

    /// Creates or updates `document`, republishing it if it is published.
    ///
    /// Returns the stored document as reloaded from the store.
    pub fn save_document(
        &self,
        conn: &Connection,
        document: &Document,
    ) -> PublishResult<Document> {
        let started_at = Instant::now();
        let result = self.save_in_tx(conn, document);
        log_outcome("save_document", document.id, started_at, &result);
        result
    }

    fn save_in_tx(&self, conn: &Connection, document: &Document) -> PublishResult<Document> {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        let repo = SqliteDocumentRepository::new(&tx);
        if repo.get_document(document.id)?.is_some() {
            repo.update_document(document)?;
        } else {
            repo.create_document(document)?;
        }
        let stored = load_required(&repo, document.id)?;
        if stored.is_published() {
            self.ledger(&tx).publish(&stored)?;
        }
        tx.commit()?;
        Ok(stored)
    }

    /// Marks each document published and publishes it to the feed.
    ///
    /// The batch is all-or-nothing.
    pub fn make_published(
        &self,
        conn: &Connection,
        ids: &[DocumentId],
    ) -> PublishResult<Vec<LedgerRecord>> {
        let started_at = Instant::now();
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        let repo = SqliteDocumentRepository::new(&tx);
        let ledger = self.ledger(&tx);

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            repo.set_published(*id, true)?;
            let document = load_required(&repo, *id)?;
            records.push(ledger.publish(&document)?);
        }
        tx.commit()?;

        info!(
            "event=make_published module=service status=ok count={} duration_ms={}",
            records.len(),
            started_at.elapsed().as_millis()
        );
        Ok(records)
    }

    /// Removes the document from the feed, then from the store.
    ///
    /// Returns the deletion marker when the tombstone policy produced one.
    pub fn delete_document(
        &self,
        conn: &Connection,
        id: DocumentId,
    ) -> PublishResult<Option<LedgerRecord>> {
        let started_at = Instant::now();
        let result = self.delete_in_tx(conn, id);
        log_outcome("delete_document", id, started_at, &result);
        result
    }

    fn delete_in_tx(
        &self,
        conn: &Connection,
        id: DocumentId,
    ) -> PublishResult<Option<LedgerRecord>> {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        let repo = SqliteDocumentRepository::new(&tx);
        let document = load_required(&repo, id)?;
        let marker = self.ledger(&tx).mark_deleted(&document)?;
        repo.delete_document(id)?;
        tx.commit()?;
        Ok(marker)
    }

    /// Rebuilds the metadata post of every published document.
    ///
    /// Ledger timestamps are left alone. Returns the number of posts written.
    pub fn regenerate_all(&self, conn: &Connection) -> PublishResult<usize> {
        let started_at = Instant::now();
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        let repo = SqliteDocumentRepository::new(&tx);
        let ledger = self.ledger(&tx);

        let published = repo.list_documents(&DocumentListQuery {
            kind: None,
            published: Some(true),
        })?;
        for document in &published {
            ledger.posts().regenerate(document)?;
        }
        tx.commit()?;

        info!(
            "event=regenerate_all module=service status=ok count={} duration_ms={}",
            published.len(),
            started_at.elapsed().as_millis()
        );
        Ok(published.len())
    }

    /// Renders the Atom feed from the current ledger.
    pub fn render_feed(&self, conn: &Connection, context: &FeedContext) -> PublishResult<String> {
        let documents = SqliteDocumentRepository::new(conn);
        self.ledger(conn).render_feed(&documents, context)
    }

    /// Cached post for `slug`. Never regenerates on read.
    pub fn metadata_post(
        &self,
        conn: &Connection,
        slug: &str,
    ) -> PublishResult<Option<MetadataPost>> {
        Ok(self.ledger(conn).posts().get_by_slug(slug)?)
    }

    /// Live document for `slug`, straight from the store.
    pub fn find_document(&self, conn: &Connection, slug: &str) -> PublishResult<Option<Document>> {
        Ok(SqliteDocumentRepository::new(conn).find_by_slug(slug)?)
    }

    /// Ledger rows in feed order.
    pub fn ledger_records(&self, conn: &Connection) -> PublishResult<Vec<LedgerRecord>> {
        self.ledger(conn).records()
    }
}

fn load_required<R: DocumentRepository>(repo: &R, id: DocumentId) -> PublishResult<Document> {
    repo.get_document(id)?
        .ok_or_else(|| RepoError::NotFound(format!("document {id}")).into())
}

fn log_outcome<T>(
    action: &str,
    id: DocumentId,
    started_at: Instant,
    result: &PublishResult<T>,
) {
    match result {
        Ok(_) => info!(
            "event={action} module=service status=ok document={id} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event={action} module=service status=error document={id} duration_ms={} error={err}",
            started_at.elapsed().as_millis()
        ),
    }
}
