//! Entry-by-entry import driver.

use crate::import::feed::{parse_feed, FeedEntryLinks};
use crate::import::fetch::ResourceFetcher;
use crate::import::handlers::{handler_for, DocumentDraft, SeriesKey};
use crate::import::run::ImportRun;
use crate::import::{ImportError, ImportResult};
use crate::media::MediaStore;
use crate::model::collection::Collection;
use crate::model::document::{
    ContentFile, Document, DocumentKind, DocumentLink, Regulation, SeriesFields,
};
use crate::rdf::parse::parse_rdfxml;
use crate::rdf::{ns, Graph, Term};
use crate::repo::document_repo::{DocumentRepository, SqliteDocumentRepository};
use crate::repo::RepoError;
use crate::service::clock::Clock;
use crate::service::orchestrator::PublishingService;
use chrono::NaiveDate;
use log::{info, warn};
use rusqlite::Connection;
use std::time::Instant;

/// Entry that could not be imported.
#[derive(Debug)]
pub struct SkippedEntry {
    pub entry_id: String,
    pub error: ImportError,
}

/// Outcome of one import run.
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Slugs of imported documents, in import order.
    pub imported: Vec<String>,
    pub skipped: Vec<SkippedEntry>,
    pub placeholders: usize,
}

/// Imports the documents of a remote feed into the local store.
pub struct FeedImporter<'a, F: ResourceFetcher, C: Clock> {
    fetcher: F,
    media: &'a MediaStore,
    service: &'a PublishingService<C>,
}

impl<'a, F: ResourceFetcher, C: Clock> FeedImporter<'a, F, C> {
    pub fn new(fetcher: F, media: &'a MediaStore, service: &'a PublishingService<C>) -> Self {
        Self {
            fetcher,
            media,
            service,
        }
    }

    /// Imports every entry of the feed at `feed_location`.
    ///
    /// Entry-level failures are collected in the report; storage failures
    /// abort the run.
    pub fn run(&self, conn: &Connection, feed_location: &str) -> ImportResult<ImportReport> {
        let started_at = Instant::now();
        let bytes = self.fetcher.fetch(feed_location)?;
        let text = String::from_utf8(bytes).map_err(|err| ImportError::Feed(err.to_string()))?;
        let entries = parse_feed(text.as_str())?;
        info!(
            "event=import_run module=import status=start feed={feed_location} entries={}",
            entries.len()
        );

        let mut run = ImportRun::new();
        let mut report = ImportReport::default();
        for entry in &entries {
            match self.import_entry(conn, &mut run, entry) {
                Ok(slug) => {
                    info!("event=import_entry module=import status=ok slug={slug}");
                    report.imported.push(slug);
                }
                Err(err) if err.is_entry_level() => {
                    warn!(
                        "event=import_entry module=import status=skipped entry={} error={err}",
                        entry.entry_id
                    );
                    report.skipped.push(SkippedEntry {
                        entry_id: entry.entry_id.clone(),
                        error: err,
                    });
                }
                Err(err) => return Err(err),
            }
        }
        report.placeholders = run.placeholders();

        info!(
            "event=import_run module=import status=ok imported={} skipped={} placeholders={} duration_ms={}",
            report.imported.len(),
            report.skipped.len(),
            report.placeholders,
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }

    fn import_entry(
        &self,
        conn: &Connection,
        run: &mut ImportRun,
        entry: &FeedEntryLinks,
    ) -> ImportResult<String> {
        let rdf_url = entry
            .rdf_url
            .as_deref()
            .ok_or(ImportError::MissingField("application/rdf+xml link"))?;
        let rdf = self.fetcher.fetch(rdf_url)?;
        let text = String::from_utf8(rdf).map_err(|err| ImportError::InvalidValue {
            predicate: "application/rdf+xml".to_string(),
            value: err.to_string(),
        })?;
        let graph = parse_rdfxml(text.as_str())?;

        let subject = main_subject(&graph)
            .ok_or_else(|| ImportError::UnsupportedDocument(rdf_url.to_string()))?;
        let draft = read_draft(&graph, subject, run)?;

        let repo = SqliteDocumentRepository::new(conn);
        let mut document = self.build_document(conn, &repo, run, draft)?;
        if let Some(pdf_url) = entry.pdf_url.as_deref() {
            let bytes = self.fetcher.fetch(pdf_url)?;
            let content = self.store_content(&document, bytes.as_slice())?;
            if let Some(series) = document.series_mut() {
                series.content = Some(content);
            }
        }

        let slug = document.slug().map_err(RepoError::from)?;
        if let Some(existing) = repo.find_by_slug(slug.as_str())? {
            document.id = existing.id;
        }

        let stored = self.service.save_document(conn, &document)?;
        self.service.make_published(conn, &[stored.id])?;
        Ok(slug)
    }

    fn build_document<R: DocumentRepository>(
        &self,
        conn: &Connection,
        repo: &R,
        run: &mut ImportRun,
        draft: DocumentDraft,
    ) -> ImportResult<Document> {
        let kind = draft
            .kind
            .ok_or(ImportError::MissingField("rdf:type"))?;
        if kind == DocumentKind::ConsolidatedRegulation {
            return Err(ImportError::UnsupportedDocument(
                "consolidated documents are not imported".to_string(),
            ));
        }
        let short_name = draft
            .collection
            .as_deref()
            .ok_or(ImportError::MissingField("rpubl:forfattningssamling"))?;
        let year = draft.year.ok_or(ImportError::MissingField("rpubl:arsutgava"))?;
        let sequence_number = draft
            .sequence_number
            .clone()
            .ok_or(ImportError::MissingField("rpubl:lopnummer"))?;
        let collection = run.collection(repo, short_name)?;

        let year_end = calendar_date(year, 12, 31)?;
        let decision_date = draft.decision_date.unwrap_or(year_end);
        let identifier = format!("{} {}:{}", collection.short_name, year, sequence_number);
        let title = draft.title.clone().unwrap_or(identifier);

        let mut series = SeriesFields::new(collection, year, sequence_number, title, decision_date);
        series.effective_date = draft.effective_date.unwrap_or(decision_date);
        series.print_date = draft.print_date.unwrap_or(year_end);
        series.is_reprint = draft.is_reprint;
        series.keywords = draft.keywords;
        series.publisher = draft.publisher.or_else(|| draft.decided_by.clone());
        series.decided_by = draft.decided_by;
        for key in &draft.amends {
            series.amends.push(self.resolve_link(conn, repo, run, key)?);
        }
        for key in &draft.repeals {
            series.repeals.push(self.resolve_link(conn, repo, run, key)?);
        }

        Ok(match kind {
            DocumentKind::GeneralAdvice => Document::general_advice(series),
            _ => {
                let mut regulation = Regulation::new(series);
                regulation.directives = draft.directives;
                regulation.authorizations = draft.authorizations;
                Document::regulation(regulation)
            }
        })
    }

    /// Links to the referenced document, creating an unpublished placeholder
    /// regulation when it does not exist yet.
    fn resolve_link<R: DocumentRepository>(
        &self,
        conn: &Connection,
        repo: &R,
        run: &mut ImportRun,
        key: &SeriesKey,
    ) -> ImportResult<DocumentLink> {
        let collection = run.collection(repo, key.short_name.as_str())?;
        let slug = format!("{}/{}:{}", collection.slug, key.year, key.sequence_number);
        if let Some(existing) = repo.find_by_slug(slug.as_str())? {
            return Ok(DocumentLink::to(&existing).map_err(RepoError::from)?);
        }

        let placeholder = placeholder_regulation(collection, key)?;
        let stored = self.service.save_document(conn, &placeholder)?;
        run.note_placeholder();
        info!("event=import_placeholder module=import status=ok slug={slug}");
        Ok(DocumentLink::to(&stored).map_err(RepoError::from)?)
    }

    fn store_content(
        &self,
        document: &Document,
        bytes: &[u8],
    ) -> ImportResult<ContentFile> {
        let dir = match document.kind() {
            DocumentKind::Regulation => "foreskrift",
            DocumentKind::GeneralAdvice => "allmanna_rad",
            DocumentKind::ConsolidatedRegulation => "konsoliderad_foreskrift",
        };
        let file_name = match document.series() {
            Some(series) => format!(
                "{}-{}-{}.pdf",
                series
                    .collection
                    .as_ref()
                    .map_or("FS", |collection| collection.short_name.as_str()),
                series.year,
                series.sequence_number
            ),
            None => format!("{}.pdf", document.id),
        };
        Ok(self.media.store(dir, file_name.as_str(), bytes)?)
    }
}

/// The subject typed as one of the three document classes.
fn main_subject(graph: &Graph) -> Option<&Term> {
    let rdf_type = ns::rdf_type();
    let classes = [
        ns::iri(ns::RPUBL, "Myndighetsforeskrift"),
        ns::iri(ns::RPUBL, "AllmannaRad"),
        ns::iri(ns::RPUBL, "KonsolideradGrundforfattning"),
    ];
    graph
        .iter()
        .find(|triple| {
            triple.predicate == rdf_type
                && triple
                    .object
                    .as_iri()
                    .is_some_and(|class| classes.iter().any(|known| known == class))
        })
        .map(|triple| &triple.subject)
}

fn read_draft(graph: &Graph, subject: &Term, run: &mut ImportRun) -> ImportResult<DocumentDraft> {
    let mut draft = DocumentDraft::default();
    for triple in graph.about(subject) {
        match handler_for(triple.predicate.as_str()) {
            Some(handler) => handler(&mut draft, run, graph, &triple.object)?,
            None => warn!(
                "event=import_predicate module=import status=skipped predicate={}",
                triple.predicate
            ),
        }
    }
    Ok(draft)
}

fn placeholder_regulation(collection: Collection, key: &SeriesKey) -> ImportResult<Document> {
    let year_start = calendar_date(key.year, 1, 1)?;
    let series = SeriesFields::new(
        collection,
        key.year,
        key.sequence_number.as_str(),
        format!("{}:{}", key.year, key.sequence_number),
        year_start,
    );
    Ok(Document::regulation(Regulation::new(series)))
}

fn calendar_date(year: i32, month: u32, day: u32) -> ImportResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| ImportError::InvalidValue {
        predicate: "rpubl:arsutgava".to_string(),
        value: year.to_string(),
    })
}
