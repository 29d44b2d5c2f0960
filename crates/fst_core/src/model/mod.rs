//! Domain model for published regulatory documents.
//!
//! # Responsibility
//! - Define the document variants, their reference data and identity rules.
//! - Define the publication artifacts (metadata posts, ledger records).
//!
//! # Invariants
//! - Every document is identified by a stable `DocumentId`.
//! - A document's canonical URI is derived from immutable identity fields.

pub mod collection;
pub mod document;
pub mod identity;
pub mod publication;
