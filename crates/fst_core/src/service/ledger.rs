//! Feed entry ledger.
//!
//! # Responsibility
//! - Record publish and delete events for documents.
//! - Assemble the Atom feed from ledger rows, documents and posts.
//!
//! # Invariants
//! - A document has at most one live ledger row; publishing updates it in
//!   place.
//! - `published` is taken from the earliest live row and never rewritten.
//! - Under `DeletionPolicy::Remove` nothing of a deleted document remains.

use crate::feed::{render_feed, EntryView, FeedContext};
use crate::model::document::{Document, DocumentId};
use crate::model::publication::{DeletionPolicy, LedgerRecord};
use crate::repo::document_repo::DocumentRepository;
use crate::repo::ledger_repo::{LedgerRepository, NewLedgerRecord};
use crate::repo::post_repo::MetadataPostRepository;
use crate::rdf::description::DescribeError;
use crate::service::clock::Clock;
use crate::service::post_cache::MetadataPostCache;
use crate::service::PublishResult;
use log::info;
use std::collections::BTreeMap;

pub struct FeedLedger<L: LedgerRepository, P: MetadataPostRepository, C: Clock> {
    ledger: L,
    posts: MetadataPostCache<P>,
    clock: C,
    policy: DeletionPolicy,
}

impl<L, P, C> FeedLedger<L, P, C>
where
    L: LedgerRepository,
    P: MetadataPostRepository,
    C: Clock,
{
    pub fn new(ledger: L, posts: MetadataPostCache<P>, clock: C, policy: DeletionPolicy) -> Self {
        Self {
            ledger,
            posts,
            clock,
            policy,
        }
    }

    pub fn posts(&self) -> &MetadataPostCache<P> {
        &self.posts
    }

    /// Regenerates the post and upserts the live record for `document`.
    ///
    /// The post is rendered before the ledger is touched, so a description
    /// error leaves the ledger unchanged.
    pub fn publish(&self, document: &Document) -> PublishResult<LedgerRecord> {
        let now = self.clock.now_ms();
        let entry_id = document.uri().map_err(DescribeError::from)?;
        let post = self.posts.regenerate(document)?;
        let owner = document.reference();

        let record = match self.ledger.earliest_live(owner)? {
            Some(existing) => {
                self.ledger
                    .touch_record(existing.id, entry_id.as_str(), now, Some(post.id))?
            }
            None => self.ledger.insert_record(&NewLedgerRecord {
                owner: Some(owner),
                entry_id,
                updated_ms: now,
                published_ms: now,
                deleted_ms: None,
                metadata_post_id: Some(post.id),
            })?,
        };

        info!(
            "event=ledger_publish module=service status=ok document={} record_id={} published_ms={} updated_ms={}",
            owner, record.id, record.published_ms, record.updated_ms
        );
        Ok(record)
    }

    /// Removes `document` from the feed according to the deletion policy.
    ///
    /// Returns the deletion marker under `DeletionPolicy::Tombstone` when the
    /// document had been in the feed.
    pub fn mark_deleted(&self, document: &Document) -> PublishResult<Option<LedgerRecord>> {
        let owner = document.reference();
        self.posts.delete(owner)?;

        let marker = match self.policy {
            DeletionPolicy::Remove => {
                let removed = self.ledger.delete_for(owner)?;
                info!(
                    "event=ledger_mark_deleted module=service status=ok policy=remove document={owner} removed={removed}"
                );
                None
            }
            DeletionPolicy::Tombstone => {
                let removed = self.ledger.delete_live_for(owner)?;
                if removed == 0 {
                    info!(
                        "event=ledger_mark_deleted module=service status=ok policy=tombstone document={owner} removed=0"
                    );
                    return Ok(None);
                }
                let now = self.clock.now_ms();
                let entry_id = document.uri().map_err(DescribeError::from)?;
                let marker = self.ledger.insert_record(&NewLedgerRecord {
                    owner: None,
                    entry_id,
                    updated_ms: now,
                    published_ms: now,
                    deleted_ms: Some(now),
                    metadata_post_id: None,
                })?;
                info!(
                    "event=ledger_mark_deleted module=service status=ok policy=tombstone document={owner} record_id={}",
                    marker.id
                );
                Some(marker)
            }
        };
        Ok(marker)
    }

    /// All ledger rows in feed order.
    pub fn records(&self) -> PublishResult<Vec<LedgerRecord>> {
        Ok(self.ledger.list_records()?)
    }

    /// Renders the Atom feed, loading each entry's document and post.
    pub fn render_feed<D: DocumentRepository>(
        &self,
        documents: &D,
        context: &FeedContext,
    ) -> PublishResult<String> {
        let records = self.ledger.list_records()?;

        let mut loaded: BTreeMap<DocumentId, Document> = BTreeMap::new();
        let mut posts = BTreeMap::new();
        for record in records.iter().filter(|record| record.is_live()) {
            if let Some(owner) = record.owner {
                if let Some(document) = documents.get_document(owner.id)? {
                    loaded.insert(owner.id, document);
                }
            }
            if let Some(post_id) = record.metadata_post_id {
                if let Some(post) = self.posts.get_by_id(post_id)? {
                    posts.insert(post_id, post);
                }
            }
        }

        let views: Vec<EntryView<'_>> = records
            .iter()
            .map(|record| {
                EntryView::new(
                    record,
                    record.owner.and_then(|owner| loaded.get(&owner.id)),
                    record.metadata_post_id.and_then(|id| posts.get(&id)),
                )
            })
            .collect();

        Ok(render_feed(&views, context, self.clock.now_ms())?)
    }
}
