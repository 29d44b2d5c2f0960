//! Collections ("författningssamlingar") and publishing organizations.

use crate::model::identity::{organization_uri, to_slug, RINFO_SERIES_BASE};
use serde::{Deserialize, Serialize};

/// Storage identifier of a collection row.
pub type CollectionId = i64;

/// Named document series that provides the identifier prefix, e.g. `EXFS`.
///
/// Identity (`short_name`, `slug`) is immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    /// Full title, e.g. "Exempelmyndighetens författningssamling".
    pub title: String,
    /// Identifier prefix, e.g. "EXFS".
    pub short_name: String,
    /// URI path segment derived from `short_name`, e.g. "exfs".
    pub slug: String,
}

impl Collection {
    /// Builds an unsaved collection value with the slug derived from
    /// `short_name`.
    pub fn new(
        id: CollectionId,
        title: impl Into<String>,
        short_name: impl Into<String>,
    ) -> Self {
        let short_name = short_name.into();
        Self {
            id,
            title: title.into(),
            slug: to_slug(short_name.as_str()),
            short_name,
        }
    }

    /// Returns the collection URI in the national series namespace.
    pub fn uri(&self) -> String {
        format!("{RINFO_SERIES_BASE}{}", to_slug(self.short_name.as_str()))
    }
}

/// Organization publishing, deciding or authorizing documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub name: String,
}

impl Organization {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn uri(&self) -> String {
        organization_uri(self.name.as_str())
    }
}
