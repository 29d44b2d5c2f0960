//! Instance configuration.
//!
//! # Responsibility
//! - Describe the publishing organization, feed metadata and storage paths.
//! - Layer defaults, an optional TOML file and environment overrides.
//!
//! # Invariants
//! - A loaded `Settings` value has passed `validate()`.
//! - Feed-level metadata is never taken from documents, only from here.

use crate::model::publication::DeletionPolicy;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Environment variable naming the TOML configuration file.
pub const CONFIG_ENV: &str = "FST_CONFIG";
/// Environment variable overriding `storage.database_path`.
pub const DATABASE_PATH_ENV: &str = "FST_DATABASE_PATH";
/// Environment variable overriding `storage.media_root`.
pub const MEDIA_ROOT_ENV: &str = "FST_MEDIA_ROOT";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
    Invalid(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config {}: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "cannot parse config {}: {source}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    /// Public base URL of this instance, used for the feed's alternate link.
    pub base_url: String,
    /// Publisher used when a document names none.
    pub org_name: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/".to_string(),
            org_name: "Exempelmyndigheten".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// Tag URI identifying the feed.
    pub id: String,
    pub title: String,
    pub contact_name: String,
    pub contact_url: String,
    pub contact_email: String,
    pub deletion_policy: DeletionPolicy,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            id: "tag:exempelmyndigheten.se,2009:rinfo:feed".to_string(),
            title: "Flöde för Exempelmyndighetens författningssamling".to_string(),
            contact_name: "Erik Exempelson".to_string(),
            contact_url: "http://www.exempelmyndigheten.se/".to_string(),
            contact_email: "lagrum@exempelmyndigheten.se".to_string(),
            deletion_policy: DeletionPolicy::Remove,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub database_path: PathBuf,
    pub media_root: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("fst.sqlite3"),
            media_root: PathBuf::from("uploads"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `log::LevelFilter` name, e.g. `info`.
    pub level: String,
    /// Directory for rolling log files.
    pub dir: PathBuf,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: PathBuf::from("logs"),
        }
    }
}

/// Full instance configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub site: SiteSettings,
    pub feed: FeedSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Parses TOML text on top of the defaults. Missing keys keep defaults.
    pub fn from_toml_str(text: &str, origin: &Path) -> ConfigResult<Self> {
        let settings: Settings = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(text.as_str(), path)
    }

    /// Loads defaults, then `explicit_path` or `$FST_CONFIG` if set, then
    /// storage overrides from the environment.
    pub fn load(explicit_path: Option<&Path>) -> ConfigResult<Self> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut settings = match explicit_path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        settings.apply_env_overrides(|key| std::env::var_os(key).map(PathBuf::from));
        settings.validate()?;
        Ok(settings)
    }

    /// Applies storage overrides from a variable lookup.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<PathBuf>) {
        if let Some(path) = lookup(DATABASE_PATH_ENV) {
            self.storage.database_path = path;
        }
        if let Some(path) = lookup(MEDIA_ROOT_ENV) {
            self.storage.media_root = path;
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.feed.id.trim().is_empty() {
            return Err(ConfigError::Invalid("feed.id must not be empty"));
        }
        if self.feed.title.trim().is_empty() {
            return Err(ConfigError::Invalid("feed.title must not be empty"));
        }
        if self.site.org_name.trim().is_empty() {
            return Err(ConfigError::Invalid("site.org_name must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, Settings, DATABASE_PATH_ENV};
    use crate::model::publication::DeletionPolicy;
    use std::path::{Path, PathBuf};

    #[test]
    fn defaults_describe_sample_instance() {
        let settings = Settings::default();
        assert_eq!(settings.site.org_name, "Exempelmyndigheten");
        assert_eq!(settings.feed.id, "tag:exempelmyndigheten.se,2009:rinfo:feed");
        assert_eq!(settings.feed.deletion_policy, DeletionPolicy::Remove);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let settings = Settings::from_toml_str(
            r#"
[site]
org_name = "Statens Växtskyddsnämnd"

[feed]
deletion_policy = "tombstone"
"#,
            Path::new("test.toml"),
        )
        .unwrap();

        assert_eq!(settings.site.org_name, "Statens Växtskyddsnämnd");
        assert_eq!(settings.feed.deletion_policy, DeletionPolicy::Tombstone);
        assert_eq!(settings.feed.contact_name, "Erik Exempelson");
        assert_eq!(settings.storage.media_root, PathBuf::from("uploads"));
    }

    #[test]
    fn empty_feed_id_is_rejected() {
        let err = Settings::from_toml_str("[feed]\nid = \"\"\n", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_reports_parse_error() {
        let err = Settings::from_toml_str("[feed\n", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn env_overrides_replace_storage_paths() {
        let mut settings = Settings::default();
        settings.apply_env_overrides(|key| {
            (key == DATABASE_PATH_ENV).then(|| PathBuf::from("/var/lib/fst/db.sqlite3"))
        });
        assert_eq!(
            settings.storage.database_path,
            PathBuf::from("/var/lib/fst/db.sqlite3")
        );
        assert_eq!(settings.storage.media_root, PathBuf::from("uploads"));
    }
}
