//! HTTP surface of the publishing service.
//!
//! # Responsibility
//! - Serve the Atom feed, cached metadata posts, document pages and media.
//! - Map core errors onto HTTP status codes.
//!
//! # Invariants
//! - Read handlers never regenerate metadata posts.
//! - The shared connection is locked only for synchronous store reads.

pub mod html;

use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use fst_core::{FeedContext, PublishError, PublishingService, Settings, SystemClock};
use log::{error, info, warn};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tower_http::services::ServeDir;

pub const ATOM_CONTENT_TYPE: &str = "application/atom+xml; charset=utf-8";
pub const RDF_CONTENT_TYPE: &str = "application/rdf+xml; charset=utf-8";
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// State shared by all handlers.
pub struct AppState {
    conn: Mutex<Connection>,
    service: PublishingService<SystemClock>,
    feed: FeedContext,
    media_root: PathBuf,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(conn: Connection, settings: &Settings) -> Self {
        Self {
            conn: Mutex::new(conn),
            service: PublishingService::from_settings(settings, SystemClock),
            feed: FeedContext::from_settings(settings)
                .with_page_renderer(html::render_document),
            media_root: settings.storage.media_root.clone(),
        }
    }

    pub fn into_shared(self) -> SharedState {
        Arc::new(self)
    }

    fn with_conn<T>(
        &self,
        action: impl FnOnce(&Connection) -> Result<T, PublishError>,
    ) -> Result<T, WebError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| WebError::Internal("connection lock poisoned".to_string()))?;
        action(&conn).map_err(WebError::from)
    }
}

/// Handler failure rendered as a plain-text response.
#[derive(Debug)]
pub enum WebError {
    NotFound(String),
    Internal(String),
}

impl From<PublishError> for WebError {
    fn from(value: PublishError) -> Self {
        if value.is_not_found() {
            Self::NotFound(value.to_string())
        } else {
            Self::Internal(value.to_string())
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound(what) => (StatusCode::NOT_FOUND, what).into_response(),
            Self::Internal(message) => {
                error!("event=http_handler module=web status=error error={message}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
        }
    }
}

/// Builds the application router.
pub fn router(state: SharedState) -> Router {
    let media = ServeDir::new(state.media_root.clone());
    Router::new()
        .route("/", get(index))
        .route("/feed/", get(feed))
        .route("/publ/*path", get(publication))
        .nest_service("/dokument", media)
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn index() -> Redirect {
    Redirect::to("/feed/")
}

async fn feed(State(state): State<SharedState>) -> Result<Response, WebError> {
    let body = state.with_conn(|conn| state.service.render_feed(conn, &state.feed))?;
    Ok(([(header::CONTENT_TYPE, ATOM_CONTENT_TYPE)], body).into_response())
}

/// Dispatches `/publ/<slug>/rdf` and `/publ/<slug>/`.
async fn publication(
    State(state): State<SharedState>,
    Path(path): Path<String>,
) -> Result<Response, WebError> {
    if let Some(slug) = path.strip_suffix("/rdf") {
        let post = state
            .with_conn(|conn| state.service.metadata_post(conn, slug))?
            .ok_or_else(|| WebError::NotFound(format!("no metadata post for {slug}")))?;
        return Ok(([(header::CONTENT_TYPE, RDF_CONTENT_TYPE)], post.data).into_response());
    }

    let slug = path
        .strip_suffix('/')
        .ok_or_else(|| WebError::NotFound(format!("no page at /publ/{path}")))?;
    // Only documents with a metadata post have been published.
    let document = state
        .with_conn(|conn| {
            if state.service.metadata_post(conn, slug)?.is_none() {
                return Ok(None);
            }
            state.service.find_document(conn, slug)
        })?
        .ok_or_else(|| WebError::NotFound(format!("no published document {slug}")))?;
    let page = html::render_document(&document, &state.feed);
    Ok(([(header::CONTENT_TYPE, HTML_CONTENT_TYPE)], page).into_response())
}

async fn log_request(request: Request, next: Next) -> Response {
    let started_at = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    let status = response.status();
    let duration_ms = started_at.elapsed().as_millis();
    if status.is_server_error() {
        warn!(
            "event=http_request module=web status=error method={method} path={path} code={} duration_ms={duration_ms}",
            status.as_u16()
        );
    } else {
        info!(
            "event=http_request module=web status=ok method={method} path={path} code={} duration_ms={duration_ms}",
            status.as_u16()
        );
    }
    response
}
