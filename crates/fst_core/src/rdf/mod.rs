//! Minimal RDF graph model and RDF/XML codec.
//!
//! # Responsibility
//! - Hold document descriptions as sets of triples.
//! - Serialize graphs to deterministic RDF/XML and parse RDF/XML back.
//!
//! # Invariants
//! - A graph is a set: adding the same triple twice is a no-op.
//! - Iteration order is total and stable, so serialization is byte-stable.

use chrono::NaiveDate;
use std::collections::BTreeSet;

pub mod description;
pub mod parse;
pub mod xml;

/// Namespace IRIs of the fixed prefix table.
pub mod ns {
    pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
    pub const DCT: &str = "http://purl.org/dc/terms/";
    pub const DCES: &str = "http://purl.org/dc/elements/1.1/";
    pub const FOAF: &str = "http://xmlns.com/foaf/0.1/";
    pub const RPUBL: &str = "http://rinfo.lagrummet.se/ns/2008/11/rinfo/publ#";
    pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

    /// Joins a namespace and a local name into a full IRI.
    pub fn iri(namespace: &str, local: &str) -> String {
        format!("{namespace}{local}")
    }

    pub fn rdf_type() -> String {
        iri(RDF, "type")
    }
}

/// Literal value with an optional language tag or datatype (never both).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Literal {
    pub lexical: String,
    pub lang: Option<String>,
    pub datatype: Option<String>,
}

/// Node in a triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    Iri(String),
    Blank(String),
    Literal(Literal),
}

impl Term {
    pub fn iri(value: impl Into<String>) -> Self {
        Self::Iri(value.into())
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(Literal {
            lexical: value.into(),
            lang: None,
            datatype: None,
        })
    }

    pub fn lang_literal(value: impl Into<String>, lang: &str) -> Self {
        Self::Literal(Literal {
            lexical: value.into(),
            lang: Some(lang.to_string()),
            datatype: None,
        })
    }

    pub fn typed_literal(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self::Literal(Literal {
            lexical: value.into(),
            lang: None,
            datatype: Some(datatype.into()),
        })
    }

    /// `xsd:date` literal in ISO format.
    pub fn date(value: NaiveDate) -> Self {
        Self::typed_literal(value.format("%Y-%m-%d").to_string(), ns::iri(ns::XSD, "date"))
    }

    /// `xsd:integer` literal.
    pub fn integer(value: i64) -> Self {
        Self::typed_literal(value.to_string(), ns::iri(ns::XSD, "integer"))
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Self::Iri(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Lexical form of a literal, or the IRI text of an IRI node.
    pub fn lexical(&self) -> Option<&str> {
        match self {
            Self::Iri(value) => Some(value.as_str()),
            Self::Literal(literal) => Some(literal.lexical.as_str()),
            Self::Blank(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Triple {
    pub subject: Term,
    pub predicate: String,
    pub object: Term,
}

/// Ordered set of triples.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    triples: BTreeSet<Triple>,
    next_blank: u32,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, subject: Term, predicate: impl Into<String>, object: Term) {
        self.triples.insert(Triple {
            subject,
            predicate: predicate.into(),
            object,
        });
    }

    /// Allocates a fresh blank node label unique within this graph.
    pub fn new_blank(&mut self) -> Term {
        self.next_blank += 1;
        Term::Blank(format!("b{}", self.next_blank))
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    pub fn contains(&self, subject: &Term, predicate: &str, object: &Term) -> bool {
        self.triples.iter().any(|triple| {
            &triple.subject == subject && triple.predicate == predicate && &triple.object == object
        })
    }

    /// All objects of `(subject, predicate, _)` in graph order.
    pub fn objects<'a>(
        &'a self,
        subject: &'a Term,
        predicate: &'a str,
    ) -> impl Iterator<Item = &'a Term> + 'a {
        self.triples
            .iter()
            .filter(move |triple| &triple.subject == subject && triple.predicate == predicate)
            .map(|triple| &triple.object)
    }

    /// All triples with `subject`, ordered by predicate then object.
    pub fn about<'a>(&'a self, subject: &'a Term) -> impl Iterator<Item = &'a Triple> + 'a {
        self.triples
            .iter()
            .filter(move |triple| &triple.subject == subject)
    }

    /// Distinct subjects in graph order.
    pub fn subjects(&self) -> BTreeSet<&Term> {
        self.triples.iter().map(|triple| &triple.subject).collect()
    }
}
