//! Media root storage for content files, attachments and supplementary files.
//!
//! # Responsibility
//! - Write uploaded or imported bytes under the media root.
//! - Compute the checksum recorded alongside every stored file.
//!
//! # Invariants
//! - Stored paths are relative, `/`-separated and never escape the root.
//! - An existing file is never overwritten; a numeric suffix is added.

use crate::checksum::{file_md5, md5_hex};
use crate::model::document::ContentFile;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Component, Path, PathBuf};

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug)]
pub enum MediaError {
    Io { path: PathBuf, source: std::io::Error },
    InvalidPath(String),
}

impl Display for MediaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "media I/O failed at {}: {source}", path.display()),
            Self::InvalidPath(path) => write!(f, "invalid media path: {path}"),
        }
    }
}

impl Error for MediaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::InvalidPath(_) => None,
        }
    }
}

/// File-system store rooted at the configured media directory.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// Stores `bytes` as `<dir>/<file_name>` and returns the relative path
    /// with its MD5.
    ///
    /// `dir` is one of the upload areas (`foreskrift`, `bilaga`, ...).
    pub fn store(&self, dir: &str, file_name: &str, bytes: &[u8]) -> MediaResult<ContentFile> {
        let dir = sanitize_relative(dir)?;
        let file_name = sanitize_file_name(file_name)?;
        let target_dir = self.root.join(&dir);
        fs::create_dir_all(&target_dir).map_err(|source| MediaError::Io {
            path: target_dir.clone(),
            source,
        })?;

        let stored_name = free_file_name(&target_dir, file_name.as_str());
        let target = target_dir.join(&stored_name);
        fs::write(&target, bytes).map_err(|source| MediaError::Io {
            path: target.clone(),
            source,
        })?;

        log::info!(
            "event=media_store module=media status=ok path={dir}/{stored_name} bytes={}",
            bytes.len()
        );
        Ok(ContentFile::new(format!("{dir}/{stored_name}"), md5_hex(bytes)))
    }

    /// Resolves a stored relative path to an absolute location under the root.
    pub fn resolve(&self, relative: &str) -> MediaResult<PathBuf> {
        Ok(self.root.join(sanitize_relative(relative)?))
    }

    /// Recomputes the checksum of an already stored file.
    pub fn checksum(&self, relative: &str) -> MediaResult<String> {
        let path = self.resolve(relative)?;
        file_md5(&path).map_err(|source| MediaError::Io { path, source })
    }
}

fn sanitize_relative(value: &str) -> MediaResult<String> {
    let trimmed = value.trim_matches('/');
    if trimmed.is_empty() {
        return Err(MediaError::InvalidPath(value.to_string()));
    }
    for component in Path::new(trimmed).components() {
        if !matches!(component, Component::Normal(_)) {
            return Err(MediaError::InvalidPath(value.to_string()));
        }
    }
    Ok(trimmed.replace('\\', "/"))
}

fn sanitize_file_name(value: &str) -> MediaResult<String> {
    let name = value.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(MediaError::InvalidPath(value.to_string()));
    }
    Ok(name.to_string())
}

fn free_file_name(dir: &Path, file_name: &str) -> String {
    if !dir.join(file_name).exists() {
        return file_name.to_string();
    }
    let (stem, extension) = match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => (stem, format!(".{extension}")),
        _ => (file_name, String::new()),
    };
    let mut counter = 1_u32;
    loop {
        let candidate = format!("{stem}_{counter}{extension}");
        if !dir.join(&candidate).exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::{MediaError, MediaStore};
    use crate::checksum::md5_hex;

    #[test]
    fn store_writes_file_and_records_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());

        let stored = store.store("foreskrift", "exfs-2009-1.pdf", b"pdf-bytes").unwrap();

        assert_eq!(stored.path, "foreskrift/exfs-2009-1.pdf");
        assert_eq!(stored.md5, md5_hex(b"pdf-bytes"));
        assert_eq!(store.checksum(&stored.path).unwrap(), stored.md5);
    }

    #[test]
    fn store_never_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());

        store.store("bilaga", "a.pdf", b"one").unwrap();
        let second = store.store("bilaga", "a.pdf", b"two").unwrap();

        assert_eq!(second.path, "bilaga/a_1.pdf");
    }

    #[test]
    fn resolve_rejects_parent_components() {
        let store = MediaStore::new("/tmp/media");
        assert!(matches!(
            store.resolve("../etc/passwd"),
            Err(MediaError::InvalidPath(_))
        ));
    }
}
