//! Metadata post cache.
//!
//! # Responsibility
//! - Serialize documents to RDF/XML and persist the checksummed snapshot.
//!
//! # Invariants
//! - Regeneration of an unchanged document yields byte-identical `data`.
//! - The checksum is always computed here, never accepted from callers.
//! - Documents are read-only to this component.

use crate::checksum::md5_hex;
use crate::model::document::{Document, DocumentRef};
use crate::model::publication::{MetadataPost, MetadataPostId};
use crate::rdf::description::{describe_rdfxml, DescribeError};
use crate::repo::post_repo::MetadataPostRepository;
use crate::repo::RepoResult;
use crate::service::PublishResult;
use log::{debug, info};

pub struct MetadataPostCache<P: MetadataPostRepository> {
    repo: P,
    default_publisher: String,
}

impl<P: MetadataPostRepository> MetadataPostCache<P> {
    /// `default_publisher` is the configured organization name.
    pub fn new(repo: P, default_publisher: impl Into<String>) -> Self {
        Self {
            repo,
            default_publisher: default_publisher.into(),
        }
    }

    /// Rebuilds and stores the post for `document`.
    pub fn regenerate(&self, document: &Document) -> PublishResult<MetadataPost> {
        let data = describe_rdfxml(document, self.default_publisher.as_str())?;
        let slug = document.slug().map_err(DescribeError::from)?;
        let md5 = md5_hex(data.as_bytes());
        let post = self
            .repo
            .upsert_post(document.reference(), slug.as_str(), data.as_str(), md5.as_str())?;
        info!(
            "event=post_regenerate module=service status=ok document={} slug={} bytes={} md5={}",
            post.owner,
            post.slug,
            post.length(),
            post.md5
        );
        Ok(post)
    }

    pub fn get(&self, owner: DocumentRef) -> RepoResult<Option<MetadataPost>> {
        self.repo.get_post(owner)
    }

    pub fn get_by_id(&self, id: MetadataPostId) -> RepoResult<Option<MetadataPost>> {
        self.repo.get_post_by_id(id)
    }

    pub fn get_by_slug(&self, slug: &str) -> RepoResult<Option<MetadataPost>> {
        self.repo.get_post_by_slug(slug)
    }

    /// Returns whether a post was removed.
    pub fn delete(&self, owner: DocumentRef) -> RepoResult<bool> {
        let removed = self.repo.delete_post(owner)?;
        debug!("event=post_delete module=service status=ok document={owner} removed={removed}");
        Ok(removed)
    }
}
