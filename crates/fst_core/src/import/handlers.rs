//! Predicate dispatch for imported RDF.
//!
//! Each handler copies one predicate's object into a `DocumentDraft`.
//! Predicates without a handler are logged and skipped by the caller.

use crate::import::run::ImportRun;
use crate::import::{ImportError, ImportResult};
use crate::model::collection::Organization;
use crate::model::document::{AuthorizationRef, DirectiveRef, DocumentKind, Keyword};
use crate::rdf::{ns, Graph, Term};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

/// Handler for one predicate of the main subject.
pub type PredicateHandler =
    fn(&mut DocumentDraft, &mut ImportRun, &Graph, &Term) -> ImportResult<()>;

/// Static dispatch table keyed on full predicate IRIs.
pub static PREDICATE_HANDLERS: &[(&str, PredicateHandler)] = &[
    ("http://purl.org/dc/terms/title", handle_title),
    ("http://purl.org/dc/terms/identifier", handle_identifier),
    ("http://purl.org/dc/terms/publisher", handle_publisher),
    ("http://purl.org/dc/elements/1.1/subject", handle_subject),
    ("http://www.w3.org/1999/02/22-rdf-syntax-ns#type", handle_type),
    ("http://rinfo.lagrummet.se/ns/2008/11/rinfo/publ#arsutgava", handle_year),
    ("http://rinfo.lagrummet.se/ns/2008/11/rinfo/publ#lopnummer", handle_sequence),
    ("http://rinfo.lagrummet.se/ns/2008/11/rinfo/publ#beslutsdatum", handle_decision_date),
    (
        "http://rinfo.lagrummet.se/ns/2008/11/rinfo/publ#ikrafttradandedatum",
        handle_effective_date,
    ),
    ("http://rinfo.lagrummet.se/ns/2008/11/rinfo/publ#utkomFranTryck", handle_print_date),
    (
        "http://rinfo.lagrummet.se/ns/2008/11/rinfo/publ#forfattningssamling",
        handle_collection,
    ),
    ("http://rinfo.lagrummet.se/ns/2008/11/rinfo/publ#beslutadAv", handle_decided_by),
    ("http://rinfo.lagrummet.se/ns/2008/11/rinfo/publ#genomforDirektiv", handle_directive),
    ("http://rinfo.lagrummet.se/ns/2008/11/rinfo/publ#bemyndigande", handle_authorization),
    ("http://rinfo.lagrummet.se/ns/2008/11/rinfo/publ#andrar", handle_amends),
    ("http://rinfo.lagrummet.se/ns/2008/11/rinfo/publ#upphaver", handle_repeals),
    ("http://rinfo.lagrummet.se/ns/2008/11/rinfo/publ#omtryckAv", handle_reprint),
];

/// Looks up the handler for `predicate`.
pub fn handler_for(predicate: &str) -> Option<PredicateHandler> {
    PREDICATE_HANDLERS
        .iter()
        .find(|(iri, _)| *iri == predicate)
        .map(|(_, handler)| *handler)
}

static AUTHORIZATION_FRAGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+:\d+)#K?([\da-z]*)P([\da-z]*)").expect("authorization regex is valid")
});

/// SFS number used by some publishers for "no authorization".
const PLACEHOLDER_SFS: &str = "9999:999";

/// Collection, year and sequence of a referenced document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    /// Collection short name, upper-cased (`EXFS`).
    pub short_name: String,
    pub year: i32,
    pub sequence_number: String,
}

impl SeriesKey {
    /// Parses `http://rinfo.lagrummet.se/publ/exfs/2008:4`.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let mut segments = uri.trim_end_matches('/').rsplit('/');
        let number = segments.next()?;
        let collection = segments.next()?;
        let (year, sequence_number) = number.split_once(':')?;
        if collection.is_empty() || sequence_number.is_empty() {
            return None;
        }
        Some(Self {
            short_name: collection.to_uppercase(),
            year: year.parse().ok()?,
            sequence_number: sequence_number.to_string(),
        })
    }
}

/// Fields collected from one entry's RDF before the document is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentDraft {
    pub kind: Option<DocumentKind>,
    pub title: Option<String>,
    pub identifier: Option<String>,
    pub collection: Option<String>,
    pub year: Option<i32>,
    pub sequence_number: Option<String>,
    pub decision_date: Option<NaiveDate>,
    pub effective_date: Option<NaiveDate>,
    pub print_date: Option<NaiveDate>,
    pub publisher: Option<Organization>,
    pub decided_by: Option<Organization>,
    pub keywords: Vec<Keyword>,
    pub directives: Vec<DirectiveRef>,
    pub authorizations: Vec<AuthorizationRef>,
    pub amends: Vec<SeriesKey>,
    pub repeals: Vec<SeriesKey>,
    pub is_reprint: bool,
}

fn invalid(predicate: &str, object: &Term) -> ImportError {
    ImportError::InvalidValue {
        predicate: predicate.to_string(),
        value: object.lexical().unwrap_or("_:blank").to_string(),
    }
}

fn literal<'t>(predicate: &str, object: &'t Term) -> ImportResult<&'t str> {
    match object {
        Term::Literal(literal) => Ok(literal.lexical.trim()),
        _ => Err(invalid(predicate, object)),
    }
}

fn resource<'t>(predicate: &str, object: &'t Term) -> ImportResult<&'t str> {
    object.as_iri().ok_or_else(|| invalid(predicate, object))
}

fn date(predicate: &str, object: &Term) -> ImportResult<NaiveDate> {
    let value = literal(predicate, object)?;
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid(predicate, object))
}

fn last_segment(uri: &str) -> &str {
    uri.trim_end_matches('/').rsplit('/').next().unwrap_or(uri)
}

/// `http://rinfo.lagrummet.se/org/exempelmyndigheten` becomes
/// `Exempelmyndigheten`.
fn organization_name(uri: &str) -> String {
    let segment = last_segment(uri).replace('_', " ");
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn handle_title(
    draft: &mut DocumentDraft,
    _: &mut ImportRun,
    _: &Graph,
    object: &Term,
) -> ImportResult<()> {
    draft.title = Some(literal("dct:title", object)?.to_string());
    Ok(())
}

fn handle_identifier(
    draft: &mut DocumentDraft,
    _: &mut ImportRun,
    _: &Graph,
    object: &Term,
) -> ImportResult<()> {
    draft.identifier = Some(literal("dct:identifier", object)?.to_string());
    Ok(())
}

fn handle_publisher(
    draft: &mut DocumentDraft,
    run: &mut ImportRun,
    _: &Graph,
    object: &Term,
) -> ImportResult<()> {
    let name = organization_name(resource("dct:publisher", object)?);
    draft.publisher = Some(run.organization(name.as_str()));
    Ok(())
}

fn handle_decided_by(
    draft: &mut DocumentDraft,
    run: &mut ImportRun,
    _: &Graph,
    object: &Term,
) -> ImportResult<()> {
    let name = organization_name(resource("rpubl:beslutadAv", object)?);
    draft.decided_by = Some(run.organization(name.as_str()));
    Ok(())
}

fn handle_subject(
    draft: &mut DocumentDraft,
    _: &mut ImportRun,
    _: &Graph,
    object: &Term,
) -> ImportResult<()> {
    let title = literal("dces:subject", object)?;
    if !title.is_empty() && !draft.keywords.iter().any(|keyword| keyword.title == title) {
        draft.keywords.push(Keyword::new(title));
    }
    Ok(())
}

fn handle_type(
    draft: &mut DocumentDraft,
    _: &mut ImportRun,
    _: &Graph,
    object: &Term,
) -> ImportResult<()> {
    let class = resource("rdf:type", object)?;
    let kind = match class.strip_prefix(ns::RPUBL) {
        Some("Myndighetsforeskrift") => Some(DocumentKind::Regulation),
        Some("AllmannaRad") => Some(DocumentKind::GeneralAdvice),
        Some("KonsolideradGrundforfattning") => Some(DocumentKind::ConsolidatedRegulation),
        _ => None,
    };
    if kind.is_some() {
        draft.kind = kind;
    }
    Ok(())
}

fn handle_year(
    draft: &mut DocumentDraft,
    _: &mut ImportRun,
    _: &Graph,
    object: &Term,
) -> ImportResult<()> {
    let value = literal("rpubl:arsutgava", object)?;
    draft.year = Some(value.parse().map_err(|_| invalid("rpubl:arsutgava", object))?);
    Ok(())
}

fn handle_sequence(
    draft: &mut DocumentDraft,
    _: &mut ImportRun,
    _: &Graph,
    object: &Term,
) -> ImportResult<()> {
    draft.sequence_number = Some(literal("rpubl:lopnummer", object)?.to_string());
    Ok(())
}

fn handle_decision_date(
    draft: &mut DocumentDraft,
    _: &mut ImportRun,
    _: &Graph,
    object: &Term,
) -> ImportResult<()> {
    draft.decision_date = Some(date("rpubl:beslutsdatum", object)?);
    Ok(())
}

fn handle_effective_date(
    draft: &mut DocumentDraft,
    _: &mut ImportRun,
    _: &Graph,
    object: &Term,
) -> ImportResult<()> {
    draft.effective_date = Some(date("rpubl:ikrafttradandedatum", object)?);
    Ok(())
}

fn handle_print_date(
    draft: &mut DocumentDraft,
    _: &mut ImportRun,
    _: &Graph,
    object: &Term,
) -> ImportResult<()> {
    draft.print_date = Some(date("rpubl:utkomFranTryck", object)?);
    Ok(())
}

fn handle_collection(
    draft: &mut DocumentDraft,
    _: &mut ImportRun,
    _: &Graph,
    object: &Term,
) -> ImportResult<()> {
    let uri = resource("rpubl:forfattningssamling", object)?;
    draft.collection = Some(last_segment(uri).to_uppercase());
    Ok(())
}

fn handle_directive(
    draft: &mut DocumentDraft,
    run: &mut ImportRun,
    _: &Graph,
    object: &Term,
) -> ImportResult<()> {
    let celex = last_segment(resource("rpubl:genomforDirektiv", object)?);
    let directive = run.directive(celex);
    if !draft.directives.contains(&directive) {
        draft.directives.push(directive);
    }
    Ok(())
}

/// Accepts both fragment URIs (`.../sfs/1962:700#K4P1`) and nested
/// `rpubl:Forfattningsreferens` nodes.
fn handle_authorization(
    draft: &mut DocumentDraft,
    run: &mut ImportRun,
    graph: &Graph,
    object: &Term,
) -> ImportResult<()> {
    let parts = match object {
        Term::Iri(uri) => {
            let Some(captures) = AUTHORIZATION_FRAGMENT.captures(last_segment(uri)) else {
                log::warn!(
                    "event=import_authorization module=import status=skipped reason=unparsable uri={uri}"
                );
                return Ok(());
            };
            (
                captures[1].to_string(),
                captures[2].to_string(),
                captures[3].to_string(),
            )
        }
        Term::Blank(_) => {
            let value = |local: &str| {
                let predicate = ns::iri(ns::RPUBL, local);
                let found = graph
                    .objects(object, predicate.as_str())
                    .next()
                    .and_then(Term::lexical)
                    .map(str::to_string);
                found
            };
            let Some(statute) = value("angerGrundforfattning") else {
                return Err(invalid("rpubl:bemyndigande", object));
            };
            (
                last_segment(statute.as_str()).to_string(),
                value("angerKapitelnummer").unwrap_or_default(),
                value("angerParagrafnummer").unwrap_or_default(),
            )
        }
        Term::Literal(_) => return Err(invalid("rpubl:bemyndigande", object)),
    };

    let (sfs_number, chapter, section) = parts;
    if sfs_number == PLACEHOLDER_SFS {
        return Ok(());
    }
    let authorization = run.authorization(sfs_number.as_str(), chapter.as_str(), section.as_str());
    if !draft.authorizations.contains(&authorization) {
        draft.authorizations.push(authorization);
    }
    Ok(())
}

fn series_key(predicate: &str, object: &Term) -> ImportResult<SeriesKey> {
    SeriesKey::from_uri(resource(predicate, object)?).ok_or_else(|| invalid(predicate, object))
}

fn handle_amends(
    draft: &mut DocumentDraft,
    _: &mut ImportRun,
    _: &Graph,
    object: &Term,
) -> ImportResult<()> {
    let key = series_key("rpubl:andrar", object)?;
    if !draft.amends.contains(&key) {
        draft.amends.push(key);
    }
    Ok(())
}

fn handle_repeals(
    draft: &mut DocumentDraft,
    _: &mut ImportRun,
    _: &Graph,
    object: &Term,
) -> ImportResult<()> {
    let key = series_key("rpubl:upphaver", object)?;
    if !draft.repeals.contains(&key) {
        draft.repeals.push(key);
    }
    Ok(())
}

fn handle_reprint(
    draft: &mut DocumentDraft,
    _: &mut ImportRun,
    _: &Graph,
    object: &Term,
) -> ImportResult<()> {
    let key = series_key("rpubl:omtryckAv", object)?;
    draft.is_reprint = true;
    if !draft.amends.contains(&key) {
        draft.amends.push(key);
    }
    Ok(())
}
