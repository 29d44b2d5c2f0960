//! Document aggregate for the three published variants.
//!
//! # Responsibility
//! - Define `Regulation`, `GeneralAdvice` and `ConsolidatedRegulation` bodies
//!   and the reference data they point at.
//! - Derive human identifiers, slugs and canonical URIs from identity fields.
//!
//! # Invariants
//! - `id` is stable and never reused for another document.
//! - Identity fields (collection, year, sequence number; base and
//!   consolidation date for consolidated documents) never change after the
//!   first save, so the canonical URI never changes either.
//! - `is_published` is only flipped by the explicit publish action.

use crate::model::collection::{Collection, Organization};
use crate::model::identity::{eur_lex_uri, normalize_celex, publ_uri, sfs_uri};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for every stored document.
pub type DocumentId = Uuid;

/// Persisted discriminator of the document variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// "Myndighetsföreskrift".
    Regulation,
    /// "Allmänna råd".
    GeneralAdvice,
    /// "Konsoliderad föreskrift".
    ConsolidatedRegulation,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Regulation => "regulation",
            Self::GeneralAdvice => "general_advice",
            Self::ConsolidatedRegulation => "consolidated_regulation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "regulation" => Some(Self::Regulation),
            "general_advice" => Some(Self::GeneralAdvice),
            "consolidated_regulation" => Some(Self::ConsolidatedRegulation),
            _ => None,
        }
    }

    /// Swedish display name used on detail pages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Regulation => "Myndighetsföreskrift",
            Self::GeneralAdvice => "Allmänna råd",
            Self::ConsolidatedRegulation => "Konsoliderad föreskrift",
        }
    }
}

impl Display for DocumentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Polymorphic owner key of metadata posts and ledger records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub kind: DocumentKind,
    pub id: DocumentId,
}

impl DocumentRef {
    pub fn new(kind: DocumentKind, id: DocumentId) -> Self {
        Self { kind, id }
    }
}

impl Display for DocumentRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// File stored under the media root, with its checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFile {
    /// Path relative to the media root, `/`-separated.
    pub path: String,
    /// Lowercase MD5 hex digest of the file bytes.
    pub md5: String,
}

impl ContentFile {
    pub fn new(path: impl Into<String>, md5: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            md5: md5.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub title: String,
    pub description: String,
}

impl Keyword {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
        }
    }
}

/// Reference to an EU directive the regulation implements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectiveRef {
    pub celex_number: String,
    pub title: String,
}

impl DirectiveRef {
    pub fn new(celex_number: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            celex_number: celex_number.into(),
            title: title.into(),
        }
    }

    /// EUR-Lex URI using the padded CELEX number.
    pub fn uri(&self) -> String {
        eur_lex_uri(normalize_celex(self.celex_number.as_str()).as_str())
    }
}

/// Citation of the statute provision empowering the authority ("bemyndigande").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRef {
    pub title: String,
    /// SFS number, e.g. `1991:446`.
    pub sfs_number: String,
    /// Empty when the statute has no chapters.
    pub chapter: String,
    pub section: String,
    pub comment: String,
}

impl AuthorizationRef {
    pub fn new(
        title: impl Into<String>,
        sfs_number: impl Into<String>,
        chapter: impl Into<String>,
        section: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            sfs_number: sfs_number.into(),
            chapter: chapter.into(),
            section: section.into(),
            comment: String::new(),
        }
    }

    pub fn statute_uri(&self) -> String {
        sfs_uri(self.sfs_number.as_str())
    }

    /// Human-readable citation, e.g. `Arkivförordningen (1991:446) 2 kap. 11 §`.
    pub fn citation(&self) -> String {
        let mut out = format!("{} ({})", self.title, self.sfs_number);
        if !self.chapter.is_empty() {
            out.push_str(&format!(" {} kap.", self.chapter));
        }
        if !self.section.is_empty() {
            out.push_str(&format!(" {} §", self.section));
        }
        out
    }
}

/// Attachment ("bilaga"). Without a file it is part of the main document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub title: String,
    pub file: Option<ContentFile>,
}

/// Supplementary document ("övrigt dokument"), e.g. a decision memo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplementaryFile {
    pub title: String,
    pub file: ContentFile,
}

/// Resolved pointer from one document to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLink {
    pub reference: DocumentRef,
    pub slug: String,
    pub identifier: String,
}

impl DocumentLink {
    /// Builds a link to an existing document; fails if its identity is incomplete.
    pub fn to(document: &Document) -> Result<Self, DocumentValidationError> {
        Ok(Self {
            reference: document.reference(),
            slug: document.slug()?,
            identifier: document.identifier()?,
        })
    }

    pub fn uri(&self) -> String {
        publ_uri(self.slug.as_str())
    }
}

/// Fields shared by regulations and general advice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesFields {
    pub collection: Option<Collection>,
    pub year: i32,
    pub sequence_number: String,
    pub title: String,
    pub summary: String,
    pub decision_date: NaiveDate,
    pub effective_date: NaiveDate,
    pub print_date: NaiveDate,
    pub is_reprint: bool,
    pub is_published: bool,
    pub content: Option<ContentFile>,
    pub keywords: Vec<Keyword>,
    pub amends: Vec<DocumentLink>,
    pub repeals: Vec<DocumentLink>,
    pub consolidates: Vec<DocumentLink>,
    pub publisher: Option<Organization>,
    pub decided_by: Option<Organization>,
}

impl SeriesFields {
    /// Creates series fields with all three dates set to `decision_date`.
    pub fn new(
        collection: Collection,
        year: i32,
        sequence_number: impl Into<String>,
        title: impl Into<String>,
        decision_date: NaiveDate,
    ) -> Self {
        Self {
            collection: Some(collection),
            year,
            sequence_number: sequence_number.into(),
            title: title.into(),
            summary: String::new(),
            decision_date,
            effective_date: decision_date,
            print_date: decision_date,
            is_reprint: false,
            is_published: false,
            content: None,
            keywords: Vec::new(),
            amends: Vec::new(),
            repeals: Vec::new(),
            consolidates: Vec::new(),
            publisher: None,
            decided_by: None,
        }
    }

    fn collection(&self) -> Result<&Collection, DocumentValidationError> {
        self.collection
            .as_ref()
            .ok_or(DocumentValidationError::MissingCollection)
    }

    pub fn identifier(&self) -> Result<String, DocumentValidationError> {
        let collection = self.collection()?;
        Ok(format!(
            "{} {}:{}",
            collection.short_name, self.year, self.sequence_number
        ))
    }

    pub fn slug(&self) -> Result<String, DocumentValidationError> {
        let collection = self.collection()?;
        Ok(format!(
            "{}/{}:{}",
            collection.slug, self.year, self.sequence_number
        ))
    }

    /// "Grundförfattning" or "Ändringsförfattning", with " (omtryck)" for reprints.
    pub fn role_label(&self) -> String {
        let mut label = if self.amends.is_empty() {
            String::from("Grundförfattning")
        } else {
            String::from("Ändringsförfattning")
        };
        if self.is_reprint {
            label.push_str(" (omtryck)");
        }
        label
    }

    fn validate(&self) -> Result<(), DocumentValidationError> {
        self.collection()?;
        if !(1000..=9999).contains(&self.year) {
            return Err(DocumentValidationError::YearOutOfRange(self.year));
        }
        if self.sequence_number.trim().is_empty() {
            return Err(DocumentValidationError::BlankSequenceNumber);
        }
        if self.title.trim().is_empty() {
            return Err(DocumentValidationError::BlankTitle);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Regulation {
    pub series: SeriesFields,
    pub directives: Vec<DirectiveRef>,
    pub authorizations: Vec<AuthorizationRef>,
    /// Ordered; positions are 1-based in URIs.
    pub attachments: Vec<Attachment>,
    pub supplementary_files: Vec<SupplementaryFile>,
}

impl Regulation {
    pub fn new(series: SeriesFields) -> Self {
        Self {
            series,
            directives: Vec::new(),
            authorizations: Vec::new(),
            attachments: Vec::new(),
            supplementary_files: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralAdvice {
    pub series: SeriesFields,
}

/// Consolidated text of a base regulation as amended up to a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedRegulation {
    pub title: String,
    pub consolidation_date: NaiveDate,
    pub content: Option<ContentFile>,
    pub base: Option<DocumentLink>,
    pub latest_amendment: Option<DocumentLink>,
    /// Amendments incorporated after the base, oldest first. Derived on load.
    pub underlying: Vec<DocumentLink>,
    pub publisher: Option<Organization>,
    pub is_published: bool,
}

impl ConsolidatedRegulation {
    pub fn new(
        title: impl Into<String>,
        consolidation_date: NaiveDate,
        base: DocumentLink,
        latest_amendment: DocumentLink,
    ) -> Self {
        Self {
            title: title.into(),
            consolidation_date,
            content: None,
            base: Some(base),
            latest_amendment: Some(latest_amendment),
            underlying: Vec::new(),
            publisher: None,
            is_published: false,
        }
    }

    fn base(&self) -> Result<&DocumentLink, DocumentValidationError> {
        self.base.as_ref().ok_or(DocumentValidationError::MissingBase)
    }

    pub fn identifier(&self) -> Result<String, DocumentValidationError> {
        Ok(format!(
            "{} i lydelse enligt {}",
            self.base()?.identifier,
            self.consolidation_date.format("%Y-%m-%d")
        ))
    }

    pub fn slug(&self) -> Result<String, DocumentValidationError> {
        Ok(format!(
            "{}/konsolidering/{}",
            self.base()?.slug,
            self.consolidation_date.format("%Y-%m-%d")
        ))
    }

    fn validate(&self) -> Result<(), DocumentValidationError> {
        let base = self.base()?;
        if base.reference.kind != DocumentKind::Regulation {
            return Err(DocumentValidationError::BaseNotRegulation(base.reference));
        }
        let latest = self
            .latest_amendment
            .as_ref()
            .ok_or(DocumentValidationError::MissingLatestAmendment)?;
        if latest.reference.kind != DocumentKind::Regulation {
            return Err(DocumentValidationError::BaseNotRegulation(latest.reference));
        }
        if self.title.trim().is_empty() {
            return Err(DocumentValidationError::BlankTitle);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentBody {
    Regulation(Regulation),
    GeneralAdvice(GeneralAdvice),
    ConsolidatedRegulation(ConsolidatedRegulation),
}

/// Canonical aggregate loaded from and written to the document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub body: DocumentBody,
}

/// Structural validation failure for document writes and identity derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentValidationError {
    MissingCollection,
    MissingBase,
    MissingLatestAmendment,
    BaseNotRegulation(DocumentRef),
    BlankTitle,
    BlankSequenceNumber,
    YearOutOfRange(i32),
}

impl Display for DocumentValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCollection => write!(f, "document has no collection"),
            Self::MissingBase => write!(f, "consolidated document has no base regulation"),
            Self::MissingLatestAmendment => {
                write!(f, "consolidated document has no latest amendment")
            }
            Self::BaseNotRegulation(reference) => {
                write!(f, "consolidation must point at a regulation, got {reference}")
            }
            Self::BlankTitle => write!(f, "document title must not be blank"),
            Self::BlankSequenceNumber => write!(f, "sequence number must not be blank"),
            Self::YearOutOfRange(year) => write!(f, "year {year} is out of range"),
        }
    }
}

impl Error for DocumentValidationError {}

impl Document {
    pub fn new(body: DocumentBody) -> Self {
        Self::with_id(Uuid::new_v4(), body)
    }

    /// Used by import paths where identity is already decided by the caller.
    pub fn with_id(id: DocumentId, body: DocumentBody) -> Self {
        Self { id, body }
    }

    pub fn regulation(regulation: Regulation) -> Self {
        Self::new(DocumentBody::Regulation(regulation))
    }

    pub fn general_advice(series: SeriesFields) -> Self {
        Self::new(DocumentBody::GeneralAdvice(GeneralAdvice { series }))
    }

    pub fn consolidated(consolidated: ConsolidatedRegulation) -> Self {
        Self::new(DocumentBody::ConsolidatedRegulation(consolidated))
    }

    pub fn kind(&self) -> DocumentKind {
        match &self.body {
            DocumentBody::Regulation(_) => DocumentKind::Regulation,
            DocumentBody::GeneralAdvice(_) => DocumentKind::GeneralAdvice,
            DocumentBody::ConsolidatedRegulation(_) => DocumentKind::ConsolidatedRegulation,
        }
    }

    pub fn reference(&self) -> DocumentRef {
        DocumentRef::new(self.kind(), self.id)
    }

    /// Shared series fields, `None` for consolidated documents.
    pub fn series(&self) -> Option<&SeriesFields> {
        match &self.body {
            DocumentBody::Regulation(regulation) => Some(&regulation.series),
            DocumentBody::GeneralAdvice(advice) => Some(&advice.series),
            DocumentBody::ConsolidatedRegulation(_) => None,
        }
    }

    pub fn series_mut(&mut self) -> Option<&mut SeriesFields> {
        match &mut self.body {
            DocumentBody::Regulation(regulation) => Some(&mut regulation.series),
            DocumentBody::GeneralAdvice(advice) => Some(&mut advice.series),
            DocumentBody::ConsolidatedRegulation(_) => None,
        }
    }

    pub fn title(&self) -> &str {
        match &self.body {
            DocumentBody::ConsolidatedRegulation(consolidated) => consolidated.title.as_str(),
            _ => self.series().map_or("", |series| series.title.as_str()),
        }
    }

    pub fn summary(&self) -> &str {
        self.series().map_or("", |series| series.summary.as_str())
    }

    pub fn identifier(&self) -> Result<String, DocumentValidationError> {
        match &self.body {
            DocumentBody::Regulation(regulation) => regulation.series.identifier(),
            DocumentBody::GeneralAdvice(advice) => advice.series.identifier(),
            DocumentBody::ConsolidatedRegulation(consolidated) => consolidated.identifier(),
        }
    }

    pub fn slug(&self) -> Result<String, DocumentValidationError> {
        match &self.body {
            DocumentBody::Regulation(regulation) => regulation.series.slug(),
            DocumentBody::GeneralAdvice(advice) => advice.series.slug(),
            DocumentBody::ConsolidatedRegulation(consolidated) => consolidated.slug(),
        }
    }

    /// Canonical URI under `http://rinfo.lagrummet.se/publ/`.
    pub fn uri(&self) -> Result<String, DocumentValidationError> {
        Ok(publ_uri(self.slug()?.as_str()))
    }

    pub fn content(&self) -> Option<&ContentFile> {
        match &self.body {
            DocumentBody::ConsolidatedRegulation(consolidated) => consolidated.content.as_ref(),
            _ => self.series().and_then(|series| series.content.as_ref()),
        }
    }

    pub fn publisher(&self) -> Option<&Organization> {
        match &self.body {
            DocumentBody::ConsolidatedRegulation(consolidated) => consolidated.publisher.as_ref(),
            _ => self.series().and_then(|series| series.publisher.as_ref()),
        }
    }

    pub fn is_published(&self) -> bool {
        match &self.body {
            DocumentBody::ConsolidatedRegulation(consolidated) => consolidated.is_published,
            _ => self.series().is_some_and(|series| series.is_published),
        }
    }

    pub fn set_published(&mut self, published: bool) {
        match &mut self.body {
            DocumentBody::Regulation(regulation) => regulation.series.is_published = published,
            DocumentBody::GeneralAdvice(advice) => advice.series.is_published = published,
            DocumentBody::ConsolidatedRegulation(consolidated) => {
                consolidated.is_published = published
            }
        }
    }

    /// Role of the document within its collection, for listings.
    pub fn role_label(&self) -> String {
        match self.series() {
            Some(series) => series.role_label(),
            None => self.kind().label().to_string(),
        }
    }

    /// Checks structural completeness required before any write.
    pub fn validate(&self) -> Result<(), DocumentValidationError> {
        match &self.body {
            DocumentBody::Regulation(regulation) => regulation.series.validate(),
            DocumentBody::GeneralAdvice(advice) => advice.series.validate(),
            DocumentBody::ConsolidatedRegulation(consolidated) => consolidated.validate(),
        }
    }

    /// Files offered as Atom enclosures: attachments with a file, then
    /// supplementary files.
    pub fn enclosures(&self) -> Vec<&ContentFile> {
        match &self.body {
            DocumentBody::Regulation(regulation) => regulation
                .attachments
                .iter()
                .filter_map(|attachment| attachment.file.as_ref())
                .chain(regulation.supplementary_files.iter().map(|extra| &extra.file))
                .collect(),
            _ => Vec::new(),
        }
    }
}
