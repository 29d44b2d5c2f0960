use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use fst_core::model::document::{Regulation, SeriesFields};
use fst_core::repo::document_repo::{DocumentRepository, SqliteDocumentRepository};
use fst_core::{open_db_in_memory, Document, ManualClock, PublishingService, Settings};
use fst_web::{router, AppState, ATOM_CONTENT_TYPE, RDF_CONTENT_TYPE};
use http_body_util::BodyExt;
use tower::ServiceExt;

struct Fixture {
    app: Router,
    _media: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let media = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(media.path().join("foreskrift")).unwrap();
    std::fs::write(media.path().join("foreskrift/EXFS-2009-1.pdf"), b"%PDF-1.4").unwrap();

    let mut settings = Settings::default();
    settings.site.base_url = "http://fs.example.se/".to_string();
    settings.storage.media_root = media.path().to_path_buf();

    let conn = open_db_in_memory().unwrap();
    let collection = SqliteDocumentRepository::new(&conn)
        .create_collection("Exempelmyndighetens författningssamling", "EXFS")
        .unwrap();
    let decided = NaiveDate::from_ymd_opt(2009, 5, 1).unwrap();
    let document = Document::regulation(Regulation::new(SeriesFields::new(
        collection.clone(),
        2009,
        "1",
        "Föreskrift om arkiv",
        decided,
    )));
    let draft = Document::regulation(Regulation::new(SeriesFields::new(
        collection,
        2009,
        "2",
        "Hemligt utkast",
        decided,
    )));
    let service = PublishingService::from_settings(&settings, ManualClock::new(1_262_304_000_000));
    service.save_document(&conn, &document).unwrap();
    service.make_published(&conn, &[document.id]).unwrap();
    service.save_document(&conn, &draft).unwrap();

    Fixture {
        app: router(AppState::new(conn, &settings).into_shared()),
        _media: media,
    }
}

async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|value| value.to_str().unwrap().to_string());
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, content_type, String::from_utf8_lossy(&bytes).into_owned())
}

#[tokio::test]
async fn root_redirects_to_feed() {
    let fixture = fixture();
    let response = fixture
        .app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/feed/");
}

#[tokio::test]
async fn feed_lists_published_document() {
    let fixture = fixture();
    let (status, content_type, body) = get(fixture.app, "/feed/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some(ATOM_CONTENT_TYPE));
    assert!(body.contains("<id>http://rinfo.lagrummet.se/publ/exfs/2009:1</id>"));
    assert!(body.contains("<fh:complete/>"));
}

#[tokio::test]
async fn rdf_endpoint_serves_cached_post() {
    let fixture = fixture();
    let (status, content_type, body) = get(fixture.app, "/publ/exfs/2009:1/rdf").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some(RDF_CONTENT_TYPE));
    assert!(body.contains("rdf:about=\"http://rinfo.lagrummet.se/publ/exfs/2009:1\""));
}

#[tokio::test]
async fn rdf_endpoint_md5_matches_feed() {
    let fixture = fixture();
    let (_, _, feed) = get(fixture.app.clone(), "/feed/").await;
    let (_, _, rdf) = get(fixture.app, "/publ/exfs/2009:1/rdf").await;

    let expected = fst_core::checksum::md5_hex(rdf.as_bytes());
    assert!(feed.contains(&format!("le:md5=\"{expected}\"")));
    assert!(feed.contains(&format!("length=\"{}\"", rdf.len())));
}

#[tokio::test]
async fn page_md5_matches_feed() {
    let fixture = fixture();
    let (_, _, feed) = get(fixture.app.clone(), "/feed/").await;
    let (_, _, page) = get(fixture.app, "/publ/exfs/2009:1/").await;

    let expected = format!(
        "type=\"text/html\" href=\"http://fs.example.se/publ/exfs/2009:1/\" length=\"{}\" le:md5=\"{}\"",
        page.len(),
        fst_core::checksum::md5_hex(page.as_bytes())
    );
    assert!(feed.contains(&expected), "feed lacks {expected}:\n{feed}");
}

#[tokio::test]
async fn unknown_slug_is_not_found() {
    let fixture = fixture();
    let (rdf_status, _, _) = get(fixture.app.clone(), "/publ/exfs/2009:99/rdf").await;
    let (page_status, _, _) = get(fixture.app, "/publ/exfs/2009:99/").await;

    assert_eq!(rdf_status, StatusCode::NOT_FOUND);
    assert_eq!(page_status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unpublished_document_is_not_exposed() {
    let fixture = fixture();
    let (rdf_status, _, _) = get(fixture.app.clone(), "/publ/exfs/2009:2/rdf").await;
    let (page_status, _, page) = get(fixture.app.clone(), "/publ/exfs/2009:2/").await;
    let (_, _, feed) = get(fixture.app, "/feed/").await;

    assert_eq!(rdf_status, StatusCode::NOT_FOUND);
    assert_eq!(page_status, StatusCode::NOT_FOUND);
    assert!(!page.contains("Hemligt utkast"));
    assert!(!feed.contains("exfs/2009:2"));
}

#[tokio::test]
async fn document_page_is_rendered_from_store() {
    let fixture = fixture();
    let (status, _, body) = get(fixture.app, "/publ/exfs/2009:1/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<body class=\"foreskrift\">"));
    assert!(body.contains("Föreskrift om arkiv"));
}

#[tokio::test]
async fn media_files_are_served() {
    let fixture = fixture();
    let (status, _, body) = get(fixture.app, "/dokument/foreskrift/EXFS-2009-1.pdf").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "%PDF-1.4");
}
