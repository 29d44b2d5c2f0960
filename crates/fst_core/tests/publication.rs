use chrono::NaiveDate;
use fst_core::checksum::md5_hex;
use fst_core::db::open_db_in_memory;
use fst_core::model::collection::Collection;
use fst_core::model::document::{Document, DocumentLink, Keyword, Regulation, SeriesFields};
use fst_core::rdf::description::DescribeError;
use fst_core::rdf::parse::parse_rdfxml;
use fst_core::rdf::{ns, Term};
use fst_core::repo::document_repo::{DocumentRepository, SqliteDocumentRepository};
use fst_core::{
    DeletionPolicy, FeedContext, ManualClock, PublishError, PublishingService, Settings,
};
use rusqlite::Connection;

const T0: i64 = 1_262_304_000_000;
const HOUR: i64 = 3_600_000;

fn service(clock: &ManualClock, policy: DeletionPolicy) -> PublishingService<&ManualClock> {
    PublishingService::new("Exempelmyndigheten", policy, clock)
}

fn context(policy: DeletionPolicy) -> FeedContext {
    let mut settings = Settings::default();
    settings.site.base_url = "http://fs.example.se/".to_string();
    settings.feed.deletion_policy = policy;
    FeedContext::from_settings(&settings)
}

fn collection(conn: &Connection) -> Collection {
    SqliteDocumentRepository::new(conn)
        .create_collection("Exempelmyndighetens författningssamling", "EXFS")
        .unwrap()
}

fn regulation(collection: &Collection, year: i32, sequence: &str) -> Document {
    let decided = NaiveDate::from_ymd_opt(year, 5, 1).unwrap();
    Document::regulation(Regulation::new(SeriesFields::new(
        collection.clone(),
        year,
        sequence,
        format!("Föreskrift {year}:{sequence}"),
        decided,
    )))
}

fn publish_new<C: fst_core::Clock>(
    service: &PublishingService<C>,
    conn: &Connection,
    document: &Document,
) {
    service.save_document(conn, document).unwrap();
    service.make_published(conn, &[document.id]).unwrap();
}

#[test]
fn saving_unpublished_document_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(T0);
    let service = service(&clock, DeletionPolicy::Remove);
    let document = regulation(&collection(&conn), 2009, "1");

    service.save_document(&conn, &document).unwrap();

    assert!(service.ledger_records(&conn).unwrap().is_empty());
    assert!(service.metadata_post(&conn, "exfs/2009:1").unwrap().is_none());
}

#[test]
fn regeneration_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(T0);
    let service = service(&clock, DeletionPolicy::Remove);
    let document = regulation(&collection(&conn), 2009, "1");
    publish_new(&service, &conn, &document);

    let first = service.metadata_post(&conn, "exfs/2009:1").unwrap().unwrap();
    clock.advance(HOUR);
    assert_eq!(service.regenerate_all(&conn).unwrap(), 1);
    let second = service.metadata_post(&conn, "exfs/2009:1").unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(second.md5, md5_hex(second.data.as_bytes()));
    let records = service.ledger_records(&conn).unwrap();
    assert_eq!(records[0].updated_ms, T0);
}

#[test]
fn published_timestamp_survives_updates() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(T0);
    let service = service(&clock, DeletionPolicy::Remove);
    let mut document = regulation(&collection(&conn), 2009, "1");
    publish_new(&service, &conn, &document);

    clock.advance(HOUR);
    document.series_mut().unwrap().title = "Ändrad titel".to_string();
    let stored = service.save_document(&conn, &document).unwrap();
    assert!(stored.is_published());

    let records = service.ledger_records(&conn).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].published_ms, T0);
    assert_eq!(records[0].updated_ms, T0 + HOUR);

    let post = service.metadata_post(&conn, "exfs/2009:1").unwrap().unwrap();
    assert!(post.data.contains("Ändrad titel"));
}

#[test]
fn republishing_keeps_single_live_record() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(T0);
    let service = service(&clock, DeletionPolicy::Remove);
    let document = regulation(&collection(&conn), 2009, "1");
    publish_new(&service, &conn, &document);

    clock.advance(HOUR);
    service.make_published(&conn, &[document.id]).unwrap();
    clock.advance(HOUR);
    service.make_published(&conn, &[document.id]).unwrap();

    let records = service.ledger_records(&conn).unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].is_live());
    assert_eq!(records[0].owner, Some(document.reference()));
    assert_eq!(records[0].updated_ms, T0 + 2 * HOUR);
}

fn subjects_in_post(service: &PublishingService<&ManualClock>, conn: &Connection) -> Vec<Term> {
    let post = service.metadata_post(conn, "exfs/2009:1").unwrap().unwrap();
    let graph = parse_rdfxml(post.data.as_str()).unwrap();
    let document = Term::iri("http://rinfo.lagrummet.se/publ/exfs/2009:1");
    let predicate = ns::iri(ns::DCES, "subject");
    let found: Vec<Term> = graph
        .objects(&document, predicate.as_str())
        .cloned()
        .collect();
    found
}

#[test]
fn keyword_changes_reach_published_post() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(T0);
    let service = service(&clock, DeletionPolicy::Remove);
    let mut document = regulation(&collection(&conn), 2009, "1");
    document.series_mut().unwrap().keywords = vec![Keyword::new("Arkiv"), Keyword::new("Gallring")];
    publish_new(&service, &conn, &document);

    let subjects = subjects_in_post(&service, &conn);
    assert_eq!(subjects.len(), 2);
    assert!(subjects.contains(&Term::lang_literal("Arkiv", "sv")));
    assert!(subjects.contains(&Term::lang_literal("Gallring", "sv")));

    clock.advance(HOUR);
    document.series_mut().unwrap().keywords = vec![Keyword::new("Arkiv")];
    service.save_document(&conn, &document).unwrap();

    assert_eq!(
        subjects_in_post(&service, &conn),
        vec![Term::lang_literal("Arkiv", "sv")]
    );
    let post = service.metadata_post(&conn, "exfs/2009:1").unwrap().unwrap();
    assert_eq!(post.data.matches("<dces:subject xml:lang=\"sv\">").count(), 1);
    assert!(!post.data.contains("Gallring"));
}

#[test]
fn feed_checksum_matches_served_post() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(T0);
    let service = service(&clock, DeletionPolicy::Remove);
    let document = regulation(&collection(&conn), 2009, "1");
    publish_new(&service, &conn, &document);

    let post = service.metadata_post(&conn, "exfs/2009:1").unwrap().unwrap();
    let feed = service
        .render_feed(&conn, &context(DeletionPolicy::Remove))
        .unwrap();

    let link = format!(
        "href=\"http://fs.example.se/publ/exfs/2009:1/rdf\" length=\"{}\" le:md5=\"{}\"",
        post.data.len(),
        md5_hex(post.data.as_bytes())
    );
    assert!(feed.contains(&link), "feed lacks {link}:\n{feed}");
    assert!(feed.contains("<updated>2010-01-01T00:00:00Z</updated>"));
}

#[test]
fn reprint_triple_follows_flag() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(T0);
    let service = service(&clock, DeletionPolicy::Remove);
    let collection = collection(&conn);
    let base = regulation(&collection, 2009, "1");
    publish_new(&service, &conn, &base);

    let mut amendment = regulation(&collection, 2010, "2");
    amendment
        .series_mut()
        .unwrap()
        .amends
        .push(DocumentLink::to(&base).unwrap());
    publish_new(&service, &conn, &amendment);
    let plain = service.metadata_post(&conn, "exfs/2010:2").unwrap().unwrap();
    assert!(plain.data.contains("<andrar rdf:resource"));
    assert!(!plain.data.contains("omtryckAv"));

    amendment.series_mut().unwrap().is_reprint = true;
    service.save_document(&conn, &amendment).unwrap();
    let reprint = service.metadata_post(&conn, "exfs/2010:2").unwrap().unwrap();
    assert!(reprint
        .data
        .contains("<omtryckAv rdf:resource=\"http://rinfo.lagrummet.se/publ/exfs/2009:1\"/>"));
    assert_ne!(plain.md5, reprint.md5);
}

#[test]
fn deletion_removes_entry_from_complete_feed() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(T0);
    let service = service(&clock, DeletionPolicy::Remove);
    let collection = collection(&conn);
    let first = regulation(&collection, 2009, "1");
    let second = regulation(&collection, 2009, "2");
    publish_new(&service, &conn, &first);
    clock.advance(HOUR);
    publish_new(&service, &conn, &second);

    let context = context(DeletionPolicy::Remove);
    let before = service.render_feed(&conn, &context).unwrap();
    assert_eq!(before.matches("<entry>").count(), 2);
    assert!(before.contains("<fh:complete/>"));

    clock.advance(HOUR);
    let marker = service.delete_document(&conn, first.id).unwrap();
    assert!(marker.is_none());

    let after = service.render_feed(&conn, &context).unwrap();
    assert_eq!(after.matches("<entry>").count(), 1);
    assert!(!after.contains("exfs/2009:1<"));
    assert!(service.metadata_post(&conn, "exfs/2009:1").unwrap().is_none());
    let records = service.ledger_records(&conn).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].owner, Some(second.reference()));
}

#[test]
fn tombstone_policy_leaves_deletion_marker() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(T0);
    let service = service(&clock, DeletionPolicy::Tombstone);
    let collection = collection(&conn);
    let published = regulation(&collection, 2009, "1");
    let draft = regulation(&collection, 2009, "2");
    publish_new(&service, &conn, &published);
    service.save_document(&conn, &draft).unwrap();

    clock.advance(HOUR);
    let marker = service.delete_document(&conn, published.id).unwrap().unwrap();
    assert_eq!(marker.owner, None);
    assert_eq!(marker.deleted_ms, Some(T0 + HOUR));
    assert_eq!(marker.entry_id, "http://rinfo.lagrummet.se/publ/exfs/2009:1");
    assert!(service.delete_document(&conn, draft.id).unwrap().is_none());

    let feed = service
        .render_feed(&conn, &context(DeletionPolicy::Tombstone))
        .unwrap();
    assert!(!feed.contains("<fh:complete/>"));
    assert_eq!(feed.matches("<entry>").count(), 1);
    assert!(!feed.contains("application/rdf+xml"));
}

#[test]
fn describe_failure_leaves_no_trace() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(T0);
    let service = PublishingService::new("", DeletionPolicy::Remove, &clock);
    let document = regulation(&collection(&conn), 2009, "1");
    service.save_document(&conn, &document).unwrap();

    let err = service.make_published(&conn, &[document.id]).unwrap_err();

    assert!(matches!(
        err,
        PublishError::Describe(DescribeError::MissingPublisher)
    ));
    assert!(service.ledger_records(&conn).unwrap().is_empty());
    let stored = SqliteDocumentRepository::new(&conn)
        .get_document(document.id)
        .unwrap()
        .unwrap();
    assert!(!stored.is_published());
}

#[test]
fn unknown_document_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(T0);
    let service = service(&clock, DeletionPolicy::Remove);

    let err = service
        .delete_document(&conn, uuid::Uuid::new_v4())
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn empty_feed_uses_read_time() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(T0 + HOUR);
    let service = service(&clock, DeletionPolicy::Remove);

    let feed = service
        .render_feed(&conn, &context(DeletionPolicy::Remove))
        .unwrap();
    assert!(feed.contains("<updated>2010-01-01T01:00:00Z</updated>"));
    assert_eq!(feed.matches("<entry>").count(), 0);
}
