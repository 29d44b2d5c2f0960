//! Resource access for the importer.
//!
//! # Invariants
//! - `HttpFetcher` retries only timeouts, connection failures and 5xx
//!   responses, at most `attempts` times in total.
//! - `DirFetcher` never reads outside its mirror root except for a location
//!   that already names an existing local file.

use crate::import::{ImportError, ImportResult};
use log::warn;
use reqwest::blocking::Client;
use std::path::{Component, Path, PathBuf};
use std::thread;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Fetches feed, RDF and PDF resources by location.
pub trait ResourceFetcher {
    fn fetch(&self, location: &str) -> ImportResult<Vec<u8>>;
}

impl<T: ResourceFetcher + ?Sized> ResourceFetcher for &T {
    fn fetch(&self, location: &str) -> ImportResult<Vec<u8>> {
        (**self).fetch(location)
    }
}

/// Reads resources from a local mirror of a remote instance.
///
/// `http://host/publ/exfs/2009:1/rdf` maps to `<root>/publ/exfs/2009:1/rdf`.
/// A location naming an existing local file is read as is.
#[derive(Debug, Clone)]
pub struct DirFetcher {
    root: PathBuf,
}

impl DirFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Local path a location resolves to.
    pub fn local_path(&self, location: &str) -> ImportResult<PathBuf> {
        let direct = Path::new(location);
        if !location.contains("://") && direct.is_file() {
            return Ok(direct.to_path_buf());
        }

        let path = match location.split_once("://") {
            Some((_, rest)) => rest.split_once('/').map_or("", |(_, path)| path),
            None => location,
        };
        let path = path
            .split(['#', '?'])
            .next()
            .unwrap_or_default()
            .trim_start_matches('/');

        let relative = Path::new(path);
        if path.is_empty()
            || relative
                .components()
                .any(|component| !matches!(component, Component::Normal(_)))
        {
            return Err(ImportError::Fetch {
                location: location.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "location does not map into the mirror",
                ),
            });
        }
        Ok(self.root.join(relative))
    }
}

impl ResourceFetcher for DirFetcher {
    fn fetch(&self, location: &str) -> ImportResult<Vec<u8>> {
        let path = self.local_path(location)?;
        std::fs::read(&path).map_err(|source| ImportError::Fetch {
            location: location.to_string(),
            source,
        })
    }
}

/// Fetches resources from a live instance over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    attempts: u32,
    backoff: Duration,
}

impl HttpFetcher {
    /// Client with a 30 second timeout and three attempts per resource.
    pub fn new() -> ImportResult<Self> {
        Self::with_policy(DEFAULT_TIMEOUT, DEFAULT_ATTEMPTS)
    }

    pub fn with_policy(timeout: Duration, attempts: u32) -> ImportResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fst/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| ImportError::Http {
                location: "(client setup)".to_string(),
                source,
            })?;
        Ok(Self {
            client,
            attempts: attempts.max(1),
            backoff: RETRY_BACKOFF,
        })
    }

    /// Pause before the second attempt; doubled for each further one.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    fn fetch_once(&self, location: &str) -> Result<Vec<u8>, reqwest::Error> {
        let response = self.client.get(location).send()?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout()
        || err.is_connect()
        || err.status().is_some_and(|status| status.is_server_error())
}

impl ResourceFetcher for HttpFetcher {
    fn fetch(&self, location: &str) -> ImportResult<Vec<u8>> {
        if !(location.starts_with("http://") || location.starts_with("https://")) {
            return Err(ImportError::Fetch {
                location: location.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "not an http(s) URL",
                ),
            });
        }

        let mut attempt = 1;
        let mut backoff = self.backoff;
        loop {
            match self.fetch_once(location) {
                Ok(bytes) => return Ok(bytes),
                Err(err) if attempt < self.attempts && is_transient(&err) => {
                    warn!(
                        "event=import_fetch module=import status=retry location={location} attempt={attempt} error={err}"
                    );
                    thread::sleep(backoff);
                    backoff *= 2;
                    attempt += 1;
                }
                Err(source) => {
                    return Err(ImportError::Http {
                        location: location.to_string(),
                        source,
                    })
                }
            }
        }
    }
}
