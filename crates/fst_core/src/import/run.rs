//! Per-run memo of reference data shared between imported entries.

use crate::model::collection::{Collection, Organization};
use crate::model::document::{AuthorizationRef, DirectiveRef};
use crate::model::identity::normalize_celex;
use crate::repo::document_repo::DocumentRepository;
use crate::repo::RepoResult;
use std::collections::HashMap;

/// Reference data resolved so far in one import run.
///
/// Dropped at the end of the run; nothing here outlives it.
#[derive(Debug, Default)]
pub struct ImportRun {
    collections: HashMap<String, Collection>,
    organizations: HashMap<String, Organization>,
    authorizations: HashMap<(String, String, String), AuthorizationRef>,
    directives: HashMap<String, DirectiveRef>,
    placeholders: usize,
}

impl ImportRun {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds or creates the collection with `short_name`.
    pub fn collection<R: DocumentRepository>(
        &mut self,
        repo: &R,
        short_name: &str,
    ) -> RepoResult<Collection> {
        if let Some(collection) = self.collections.get(short_name) {
            return Ok(collection.clone());
        }
        let collection = match repo.find_collection(short_name)? {
            Some(collection) => collection,
            None => {
                log::info!(
                    "event=import_collection module=import status=ok action=create short_name={short_name}"
                );
                repo.create_collection(
                    format!("{short_name} författningssamling").as_str(),
                    short_name,
                )?
            }
        };
        self.collections
            .insert(short_name.to_string(), collection.clone());
        Ok(collection)
    }

    pub fn organization(&mut self, name: &str) -> Organization {
        self.organizations
            .entry(name.to_string())
            .or_insert_with(|| Organization::new(name))
            .clone()
    }

    /// Statute titles are not looked up; the SFS number stands in.
    pub fn authorization(
        &mut self,
        sfs_number: &str,
        chapter: &str,
        section: &str,
    ) -> AuthorizationRef {
        self.authorizations
            .entry((sfs_number.to_string(), chapter.to_string(), section.to_string()))
            .or_insert_with(|| {
                AuthorizationRef::new(format!("SFS {sfs_number}"), sfs_number, chapter, section)
            })
            .clone()
    }

    /// Directive reference with a padded CELEX number.
    pub fn directive(&mut self, celex_number: &str) -> DirectiveRef {
        let celex_number = normalize_celex(celex_number);
        self.directives
            .entry(celex_number.clone())
            .or_insert_with(|| {
                DirectiveRef::new(celex_number.as_str(), format!("CELEX {celex_number}"))
            })
            .clone()
    }

    pub(crate) fn note_placeholder(&mut self) {
        self.placeholders += 1;
    }

    /// Number of placeholder documents created so far.
    pub fn placeholders(&self) -> usize {
        self.placeholders
    }
}

#[cfg(test)]
mod tests {
    use super::ImportRun;
    use crate::db::open_db_in_memory;
    use crate::repo::document_repo::{DocumentRepository, SqliteDocumentRepository};

    #[test]
    fn collections_are_created_once_and_reused() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteDocumentRepository::new(&conn);
        let mut run = ImportRun::new();

        let first = run.collection(&repo, "EXFS").unwrap();
        let second = run.collection(&repo, "EXFS").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.slug, "exfs");
        assert_eq!(repo.list_collections().unwrap().len(), 1);
    }

    #[test]
    fn existing_collection_is_found_by_short_name() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteDocumentRepository::new(&conn);
        let created = repo
            .create_collection("Exempelmyndighetens författningssamling", "EXFS")
            .unwrap();

        let mut run = ImportRun::new();
        assert_eq!(run.collection(&repo, "EXFS").unwrap(), created);
    }

    #[test]
    fn directives_are_memoized_by_padded_number() {
        let mut run = ImportRun::new();
        let short = run.directive("392L0049");
        let long = run.directive("31992L0049");
        assert_eq!(short, long);
        assert_eq!(short.title, "CELEX 31992L0049");
    }
}
