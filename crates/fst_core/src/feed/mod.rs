//! Atom feed rendering for the publication ledger.
//!
//! # Responsibility
//! - Turn ledger records (plus their documents and metadata posts) into
//!   Atom entries and a complete feed document.
//! - Keep feed-level metadata in `FeedContext`, derived from `Settings`.
//!
//! # Invariants
//! - Timestamps render as RFC 3339 UTC with second precision.
//! - Rendering never touches storage; callers pass everything in.

use crate::config::Settings;
use crate::model::document::Document;
use crate::model::publication::{DeletionPolicy, LedgerRecord, MetadataPost};
use chrono::{DateTime, SecondsFormat, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod atom;

pub use atom::{render_entry, render_feed};

pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
/// Atom link extensions (`le:md5`).
pub const LINK_EXTENSIONS_NS: &str = "http://purl.org/atompub/link-extensions/1.0";
/// RFC 5005 feed history (`fh:complete`).
pub const FEED_HISTORY_NS: &str = "http://purl.org/syndication/history/1.0";

pub type FeedResult<T> = Result<T, FeedError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// Stored epoch milliseconds outside chrono's range.
    InvalidTimestamp(i64),
    Xml(String),
}

impl Display for FeedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTimestamp(ms) => write!(f, "timestamp out of range: {ms}"),
            Self::Xml(message) => write!(f, "feed write failed: {message}"),
        }
    }
}

impl Error for FeedError {}

/// Renders the HTML page served at `publ/<slug>/`.
pub type PageRenderer = fn(&Document, &FeedContext) -> String;

/// Feed-level metadata. Never taken from documents.
#[derive(Debug, Clone)]
pub struct FeedContext {
    pub feed_id: String,
    pub title: String,
    pub contact_name: String,
    pub contact_url: String,
    pub contact_email: String,
    /// Public base URL with a trailing slash.
    pub base_url: String,
    pub deletion_policy: DeletionPolicy,
    /// When set, HTML alternates carry the length and MD5 of the page.
    pub page_renderer: Option<PageRenderer>,
}

impl FeedContext {
    pub fn from_settings(settings: &Settings) -> Self {
        let mut base_url = settings.site.base_url.trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            feed_id: settings.feed.id.clone(),
            title: settings.feed.title.clone(),
            contact_name: settings.feed.contact_name.clone(),
            contact_url: settings.feed.contact_url.clone(),
            contact_email: settings.feed.contact_email.clone(),
            base_url,
            deletion_policy: settings.feed.deletion_policy,
            page_renderer: None,
        }
    }

    pub fn with_page_renderer(mut self, renderer: PageRenderer) -> Self {
        self.page_renderer = Some(renderer);
        self
    }

    /// Absolute URL for a site-relative path such as `publ/exfs/2009:1/`.
    pub fn site_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn rdf_url(&self, slug: &str) -> String {
        self.site_url(&format!("publ/{slug}/rdf"))
    }

    pub fn html_url(&self, slug: &str) -> String {
        self.site_url(&format!("publ/{slug}/"))
    }

    pub fn media_url(&self, path: &str) -> String {
        self.site_url(&format!("dokument/{}", path.trim_start_matches('/')))
    }
}

/// Everything needed to render one entry.
///
/// `document` and `post` are `None` once the content object is gone.
#[derive(Debug, Clone, Copy)]
pub struct EntryView<'a> {
    pub record: &'a LedgerRecord,
    pub document: Option<&'a Document>,
    pub post: Option<&'a MetadataPost>,
}

impl<'a> EntryView<'a> {
    pub fn new(
        record: &'a LedgerRecord,
        document: Option<&'a Document>,
        post: Option<&'a MetadataPost>,
    ) -> Self {
        Self {
            record,
            document,
            post,
        }
    }

    /// Document and post, only while the record is live and both remain.
    fn content(&self) -> Option<(&'a Document, &'a MetadataPost)> {
        if self.record.deleted_ms.is_some() {
            return None;
        }
        self.document.zip(self.post)
    }
}

/// Formats epoch milliseconds as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn rfc3339(ms: i64) -> FeedResult<String> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|value| value.to_rfc3339_opts(SecondsFormat::Secs, true))
        .ok_or(FeedError::InvalidTimestamp(ms))
}
