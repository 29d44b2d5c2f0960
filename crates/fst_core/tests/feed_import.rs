use fst_core::checksum::md5_hex;
use fst_core::db::open_db_in_memory;
use fst_core::import::{DirFetcher, FeedImporter, ImportError};
use fst_core::repo::document_repo::{DocumentRepository, SqliteDocumentRepository};
use fst_core::{DeletionPolicy, DocumentBody, ManualClock, MediaStore, PublishingService};
use std::fs;
use std::path::Path;

const T0: i64 = 1_262_304_000_000;
const PDF: &[u8] = b"%PDF-1.4 exfs 2009:1";

const FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:le="http://purl.org/atompub/link-extensions/1.0">
  <id>tag:exempelmyndigheten.se,2009:rinfo:feed</id>
  <title>Exempelflöde</title>
  <entry>
    <id>http://rinfo.lagrummet.se/publ/exfs/2009:1/konsolidering/2010-03-01</id>
    <link rel="alternate" type="application/rdf+xml" href="http://fs.example.se/publ/exfs/2009:1/konsolidering/2010-03-01/rdf"/>
  </entry>
  <entry>
    <id>http://rinfo.lagrummet.se/publ/exfs/2010:2</id>
    <link rel="alternate" type="application/rdf+xml" href="http://fs.example.se/publ/exfs/2010:2/rdf"/>
  </entry>
  <entry>
    <id>http://rinfo.lagrummet.se/publ/exfs/2009:1</id>
    <content src="http://fs.example.se/dokument/foreskrift/EXFS-2009-1.pdf" type="application/pdf"/>
    <link rel="alternate" type="application/rdf+xml" href="http://fs.example.se/publ/exfs/2009:1/rdf"/>
  </entry>
</feed>
"#;

const BASE_RDF: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<rdf:RDF xmlns="http://rinfo.lagrummet.se/ns/2008/11/rinfo/publ#"
         xmlns:dces="http://purl.org/dc/elements/1.1/"
         xmlns:dct="http://purl.org/dc/terms/"
         xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <Myndighetsforeskrift rdf:about="http://rinfo.lagrummet.se/publ/exfs/2009:1">
    <dct:title xml:lang="sv">Föreskrift om arkiv</dct:title>
    <dct:identifier>EXFS 2009:1</dct:identifier>
    <dct:publisher rdf:resource="http://rinfo.lagrummet.se/org/exempelmyndigheten"/>
    <forfattningssamling rdf:resource="http://rinfo.lagrummet.se/serier/fs/exfs"/>
    <arsutgava>2009</arsutgava>
    <lopnummer>1</lopnummer>
    <beslutsdatum rdf:datatype="http://www.w3.org/2001/XMLSchema#date">2009-05-01</beslutsdatum>
    <ikrafttradandedatum rdf:datatype="http://www.w3.org/2001/XMLSchema#date">2009-07-01</ikrafttradandedatum>
    <dces:subject xml:lang="sv">Arkiv</dces:subject>
    <bemyndigande rdf:resource="http://rinfo.lagrummet.se/publ/sfs/1991:446#K2P11"/>
    <bemyndigande rdf:resource="http://rinfo.lagrummet.se/publ/sfs/9999:999#P1"/>
    <genomforDirektiv rdf:resource="http://rinfo.lagrummet.se/ext/eur-lex/31979L0409"/>
    <sammanfattning>okänt predikat</sammanfattning>
  </Myndighetsforeskrift>
</rdf:RDF>
"#;

const AMENDMENT_RDF: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<rdf:RDF xmlns="http://rinfo.lagrummet.se/ns/2008/11/rinfo/publ#"
         xmlns:dct="http://purl.org/dc/terms/"
         xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <Myndighetsforeskrift rdf:about="http://rinfo.lagrummet.se/publ/exfs/2010:2">
    <forfattningssamling rdf:resource="http://rinfo.lagrummet.se/serier/fs/exfs"/>
    <arsutgava>2010</arsutgava>
    <lopnummer>2</lopnummer>
    <beslutadAv rdf:resource="http://rinfo.lagrummet.se/org/exempelmyndigheten"/>
    <andrar rdf:resource="http://rinfo.lagrummet.se/publ/exfs/2009:1"/>
    <andrar rdf:resource="http://rinfo.lagrummet.se/publ/exfs/2008:4"/>
  </Myndighetsforeskrift>
</rdf:RDF>
"#;

const CONSOLIDATED_RDF: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<rdf:RDF xmlns="http://rinfo.lagrummet.se/ns/2008/11/rinfo/publ#"
         xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <KonsolideradGrundforfattning rdf:about="http://rinfo.lagrummet.se/publ/exfs/2009:1/konsolidering/2010-03-01"/>
</rdf:RDF>
"#;

fn write(root: &Path, relative: &str, bytes: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

fn mirror() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "feed/index.atom", FEED.as_bytes());
    write(dir.path(), "publ/exfs/2009:1/rdf", BASE_RDF.as_bytes());
    write(dir.path(), "publ/exfs/2010:2/rdf", AMENDMENT_RDF.as_bytes());
    write(
        dir.path(),
        "publ/exfs/2009:1/konsolidering/2010-03-01/rdf",
        CONSOLIDATED_RDF.as_bytes(),
    );
    write(dir.path(), "dokument/foreskrift/EXFS-2009-1.pdf", PDF);
    dir
}

#[test]
fn import_publishes_entries_oldest_first() {
    let mirror = mirror();
    let media_dir = tempfile::tempdir().unwrap();
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(T0);
    let service = PublishingService::new("Exempelmyndigheten", DeletionPolicy::Remove, &clock);
    let media = MediaStore::new(media_dir.path());

    let importer = FeedImporter::new(DirFetcher::new(mirror.path()), &media, &service);
    let report = importer
        .run(&conn, "http://fs.example.se/feed/index.atom")
        .unwrap();

    assert_eq!(report.imported, vec!["exfs/2009:1", "exfs/2010:2"]);
    assert_eq!(report.skipped.len(), 1);
    assert!(matches!(
        report.skipped[0].error,
        ImportError::UnsupportedDocument(_)
    ));
    assert_eq!(report.placeholders, 1);
    assert_eq!(service.ledger_records(&conn).unwrap().len(), 2);
}

#[test]
fn imported_fields_and_defaults() {
    let mirror = mirror();
    let media_dir = tempfile::tempdir().unwrap();
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(T0);
    let service = PublishingService::new("Exempelmyndigheten", DeletionPolicy::Remove, &clock);
    let media = MediaStore::new(media_dir.path());
    FeedImporter::new(DirFetcher::new(mirror.path()), &media, &service)
        .run(&conn, "feed/index.atom")
        .unwrap();

    let repo = SqliteDocumentRepository::new(&conn);
    let base = repo.find_by_slug("exfs/2009:1").unwrap().unwrap();
    let DocumentBody::Regulation(regulation) = &base.body else {
        panic!("expected regulation");
    };
    let series = &regulation.series;
    assert!(series.is_published);
    assert_eq!(series.title, "Föreskrift om arkiv");
    assert_eq!(series.effective_date.to_string(), "2009-07-01");
    assert_eq!(series.print_date.to_string(), "2009-12-31");
    assert_eq!(series.keywords[0].title, "Arkiv");
    assert_eq!(
        series.publisher.as_ref().map(|org| org.name.as_str()),
        Some("Exempelmyndigheten")
    );
    assert_eq!(regulation.authorizations.len(), 1);
    assert_eq!(regulation.authorizations[0].sfs_number, "1991:446");
    assert_eq!(regulation.authorizations[0].chapter, "2");
    assert_eq!(regulation.authorizations[0].section, "11");
    assert_eq!(regulation.directives[0].celex_number, "31979L0409");

    let content = series.content.as_ref().unwrap();
    assert_eq!(content.path, "foreskrift/EXFS-2009-1.pdf");
    assert_eq!(content.md5, md5_hex(PDF));
    assert_eq!(fs::read(media_dir.path().join(&content.path)).unwrap(), PDF);

    let amendment = repo.find_by_slug("exfs/2010:2").unwrap().unwrap();
    let amendment = amendment.series().unwrap();
    assert_eq!(amendment.title, "EXFS 2010:2");
    assert_eq!(amendment.decision_date.to_string(), "2010-12-31");
    assert_eq!(amendment.effective_date, amendment.decision_date);
    assert_eq!(
        amendment.publisher.as_ref().map(|org| org.name.as_str()),
        Some("Exempelmyndigheten")
    );
    let amended: Vec<&str> = amendment
        .amends
        .iter()
        .map(|link| link.slug.as_str())
        .collect();
    assert_eq!(amended, vec!["exfs/2009:1", "exfs/2008:4"]);

    let placeholder = repo.find_by_slug("exfs/2008:4").unwrap().unwrap();
    assert!(!placeholder.is_published());
    assert_eq!(placeholder.title(), "2008:4");
    assert_eq!(
        placeholder.series().unwrap().decision_date.to_string(),
        "2008-01-01"
    );
}

#[test]
fn reimport_updates_in_place() {
    let mirror = mirror();
    let media_dir = tempfile::tempdir().unwrap();
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(T0);
    let service = PublishingService::new("Exempelmyndigheten", DeletionPolicy::Remove, &clock);
    let media = MediaStore::new(media_dir.path());
    let importer = FeedImporter::new(DirFetcher::new(mirror.path()), &media, &service);

    importer.run(&conn, "feed/index.atom").unwrap();
    clock.advance(60_000);
    let second = importer.run(&conn, "feed/index.atom").unwrap();

    assert_eq!(second.imported.len(), 2);
    assert_eq!(second.placeholders, 0);
    let records = service.ledger_records(&conn).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records
        .iter()
        .all(|record| record.published_ms == T0 && record.updated_ms == T0 + 60_000));
}

#[test]
fn missing_feed_aborts_run() {
    let mirror = tempfile::tempdir().unwrap();
    let media_dir = tempfile::tempdir().unwrap();
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(T0);
    let service = PublishingService::new("Exempelmyndigheten", DeletionPolicy::Remove, &clock);
    let media = MediaStore::new(media_dir.path());

    let err = FeedImporter::new(DirFetcher::new(mirror.path()), &media, &service)
        .run(&conn, "feed/index.atom")
        .unwrap_err();
    assert!(matches!(err, ImportError::Fetch { .. }));
}
