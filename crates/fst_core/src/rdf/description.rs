//! Document descriptions: document aggregate to RDF graph.
//!
//! # Responsibility
//! - Map each document variant to the triples consumed by the national
//!   legal-information aggregator.
//!
//! # Invariants
//! - Pure: no I/O, no clock, no storage access.
//! - Incomplete input fails with `DescribeError` before any triple is
//!   returned.

use crate::model::document::{
    ConsolidatedRegulation, Document, DocumentBody, DocumentValidationError, Regulation,
    SeriesFields,
};
use crate::model::identity::organization_uri;
use crate::rdf::xml::{to_rdfxml, SerializeError};
use crate::rdf::{ns, Graph, Term};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type DescribeResult<T> = Result<T, DescribeError>;

/// Source data is too incomplete to describe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescribeError {
    MissingCollection,
    BlankTitle,
    MissingBase,
    MissingPublisher,
    Invalid(DocumentValidationError),
    Serialize(SerializeError),
}

impl Display for DescribeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCollection => write!(f, "cannot describe document without collection"),
            Self::BlankTitle => write!(f, "cannot describe document with blank title"),
            Self::MissingBase => write!(f, "cannot describe consolidation without base"),
            Self::MissingPublisher => write!(f, "no publisher organization can be resolved"),
            Self::Invalid(err) => write!(f, "{err}"),
            Self::Serialize(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DescribeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            Self::Serialize(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DocumentValidationError> for DescribeError {
    fn from(value: DocumentValidationError) -> Self {
        match value {
            DocumentValidationError::MissingCollection => Self::MissingCollection,
            DocumentValidationError::BlankTitle => Self::BlankTitle,
            DocumentValidationError::MissingBase => Self::MissingBase,
            other => Self::Invalid(other),
        }
    }
}

impl From<SerializeError> for DescribeError {
    fn from(value: SerializeError) -> Self {
        Self::Serialize(value)
    }
}

/// Builds the RDF graph for `document`.
///
/// `default_publisher` names the configured organization used when the
/// document has no publisher of its own.
pub fn describe(document: &Document, default_publisher: &str) -> DescribeResult<Graph> {
    document.validate()?;
    let uri = document.uri()?;
    let subject = Term::iri(uri.as_str());

    let publisher = match document.publisher() {
        Some(org) if !org.name.trim().is_empty() => org.uri(),
        _ if !default_publisher.trim().is_empty() => organization_uri(default_publisher),
        _ => return Err(DescribeError::MissingPublisher),
    };

    let mut graph = Graph::new();
    graph.add(
        subject.clone(),
        ns::iri(ns::DCT, "title"),
        Term::lang_literal(document.title(), "sv"),
    );
    graph.add(
        subject.clone(),
        ns::iri(ns::DCT, "identifier"),
        Term::literal(document.identifier()?),
    );
    graph.add(subject.clone(), ns::iri(ns::DCT, "publisher"), Term::iri(publisher));

    match &document.body {
        DocumentBody::Regulation(regulation) => {
            add_series(&mut graph, &subject, &regulation.series);
            add_type(&mut graph, &subject, "Myndighetsforeskrift");
            add_regulation(&mut graph, &subject, uri.as_str(), regulation);
        }
        DocumentBody::GeneralAdvice(advice) => {
            add_series(&mut graph, &subject, &advice.series);
            add_type(&mut graph, &subject, "AllmannaRad");
        }
        DocumentBody::ConsolidatedRegulation(consolidated) => {
            add_type(&mut graph, &subject, "KonsolideradGrundforfattning");
            add_consolidated(&mut graph, &subject, consolidated)?;
        }
    }

    Ok(graph)
}

/// Describes and serializes `document` to RDF/XML.
pub fn describe_rdfxml(document: &Document, default_publisher: &str) -> DescribeResult<String> {
    let graph = describe(document, default_publisher)?;
    let subject = Term::iri(document.uri()?);
    Ok(to_rdfxml(&graph, Some(&subject))?)
}

fn add_type(graph: &mut Graph, subject: &Term, class: &str) {
    graph.add(subject.clone(), ns::rdf_type(), Term::iri(ns::iri(ns::RPUBL, class)));
}

fn add_series(graph: &mut Graph, subject: &Term, series: &SeriesFields) {
    let rpubl = |local: &str| ns::iri(ns::RPUBL, local);

    graph.add(subject.clone(), rpubl("arsutgava"), Term::integer(i64::from(series.year)));
    graph.add(
        subject.clone(),
        rpubl("lopnummer"),
        Term::literal(series.sequence_number.as_str()),
    );
    graph.add(subject.clone(), rpubl("beslutsdatum"), Term::date(series.decision_date));
    graph.add(
        subject.clone(),
        rpubl("ikrafttradandedatum"),
        Term::date(series.effective_date),
    );
    graph.add(subject.clone(), rpubl("utkomFranTryck"), Term::date(series.print_date));

    for amended in &series.amends {
        if series.is_reprint {
            graph.add(subject.clone(), rpubl("omtryckAv"), Term::iri(amended.uri()));
        }
        graph.add(subject.clone(), rpubl("andrar"), Term::iri(amended.uri()));
    }

    for keyword in &series.keywords {
        graph.add(
            subject.clone(),
            ns::iri(ns::DCES, "subject"),
            Term::lang_literal(keyword.title.as_str(), "sv"),
        );
    }
}

fn add_regulation(graph: &mut Graph, subject: &Term, uri: &str, regulation: &Regulation) {
    let rpubl = |local: &str| ns::iri(ns::RPUBL, local);

    for directive in &regulation.directives {
        graph.add(subject.clone(), rpubl("genomforDirektiv"), Term::iri(directive.uri()));
    }

    for authorization in &regulation.authorizations {
        let reference = graph.new_blank();
        graph.add(subject.clone(), rpubl("bemyndigande"), reference.clone());
        graph.add(
            reference.clone(),
            ns::rdf_type(),
            Term::iri(rpubl("Forfattningsreferens")),
        );
        graph.add(
            reference.clone(),
            rpubl("angerGrundforfattning"),
            Term::iri(authorization.statute_uri()),
        );
        if !authorization.chapter.is_empty() {
            graph.add(
                reference.clone(),
                rpubl("angerKapitelnummer"),
                Term::literal(authorization.chapter.as_str()),
            );
        }
        graph.add(
            reference,
            rpubl("angerParagrafnummer"),
            Term::literal(authorization.section.as_str()),
        );
    }

    for (index, attachment) in regulation.attachments.iter().enumerate() {
        if attachment.title.is_empty() {
            continue;
        }
        let attachment_ref = Term::iri(format!("{uri}#bilaga_{}", index + 1));
        graph.add(subject.clone(), rpubl("bilaga"), attachment_ref.clone());
        graph.add(
            attachment_ref,
            ns::iri(ns::DCT, "title"),
            Term::literal(attachment.title.as_str()),
        );
    }

    for extra in &regulation.supplementary_files {
        let extra_ref = Term::iri(format!("{uri}/{}", extra.file.path));
        graph.add(
            extra_ref.clone(),
            ns::rdf_type(),
            Term::iri(ns::iri(ns::FOAF, "Document")),
        );
        graph.add(
            extra_ref.clone(),
            ns::iri(ns::DCT, "title"),
            Term::lang_literal(extra.title.as_str(), "sv"),
        );
        graph.add(extra_ref, ns::iri(ns::FOAF, "primaryTopic"), subject.clone());
    }
}

fn add_consolidated(
    graph: &mut Graph,
    subject: &Term,
    consolidated: &ConsolidatedRegulation,
) -> DescribeResult<()> {
    let base = consolidated.base.as_ref().ok_or(DescribeError::MissingBase)?;

    graph.add(
        subject.clone(),
        ns::iri(ns::DCT, "issued"),
        Term::date(consolidated.consolidation_date),
    );
    graph.add(
        subject.clone(),
        ns::iri(ns::RPUBL, "konsoliderar"),
        Term::iri(base.uri()),
    );

    let underlying = ns::iri(ns::RPUBL, "konsolideringsunderlag");
    graph.add(subject.clone(), underlying.clone(), Term::iri(base.uri()));
    for link in &consolidated.underlying {
        graph.add(subject.clone(), underlying.clone(), Term::iri(link.uri()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{describe, describe_rdfxml, DescribeError};
    use crate::model::collection::{Collection, Organization};
    use crate::model::document::{
        Attachment, AuthorizationRef, ConsolidatedRegulation, ContentFile, DirectiveRef,
        Document, DocumentLink, Keyword, Regulation, SeriesFields, SupplementaryFile,
    };
    use crate::rdf::{ns, Term};
    use chrono::NaiveDate;

    fn series(sequence: &str) -> SeriesFields {
        SeriesFields::new(
            Collection::new(1, "Exempelmyndighetens författningssamling", "EXFS"),
            2009,
            sequence,
            "Föreskrift om administration hos statliga myndigheter",
            NaiveDate::from_ymd_opt(2009, 5, 1).unwrap(),
        )
    }

    fn subject(document: &Document) -> Term {
        Term::iri(document.uri().unwrap())
    }

    #[test]
    fn regulation_emits_common_and_series_triples() {
        let mut series = series("1");
        series.keywords.push(Keyword::new("Administration"));
        let doc = Document::regulation(Regulation::new(series));

        let graph = describe(&doc, "Exempelmyndigheten").unwrap();
        let s = subject(&doc);

        assert!(graph.contains(
            &s,
            &ns::iri(ns::DCT, "publisher"),
            &Term::iri("http://rinfo.lagrummet.se/org/exempelmyndigheten")
        ));
        assert!(graph.contains(&s, &ns::iri(ns::DCT, "identifier"), &Term::literal("EXFS 2009:1")));
        assert!(graph.contains(
            &s,
            &ns::iri(ns::DCES, "subject"),
            &Term::lang_literal("Administration", "sv")
        ));
        assert!(graph.contains(
            &s,
            &ns::iri(ns::RPUBL, "ikrafttradandedatum"),
            &Term::date(NaiveDate::from_ymd_opt(2009, 5, 1).unwrap())
        ));
    }

    #[test]
    fn document_publisher_overrides_default() {
        let mut series = series("1");
        series.publisher = Some(Organization::new("Statens Växtskyddsnämnd"));
        let doc = Document::general_advice(series);

        let graph = describe(&doc, "Exempelmyndigheten").unwrap();

        assert!(graph.contains(
            &subject(&doc),
            &ns::iri(ns::DCT, "publisher"),
            &Term::iri("http://rinfo.lagrummet.se/org/statens_vaextskyddsnaemnd")
        ));
        assert!(graph.contains(
            &subject(&doc),
            &ns::rdf_type(),
            &Term::iri(ns::iri(ns::RPUBL, "AllmannaRad"))
        ));
    }

    #[test]
    fn missing_publisher_is_an_error() {
        let doc = Document::regulation(Regulation::new(series("1")));
        assert_eq!(describe(&doc, "  ").unwrap_err(), DescribeError::MissingPublisher);
    }

    #[test]
    fn blank_title_is_an_error() {
        let mut series = series("1");
        series.title = String::new();
        let doc = Document::regulation(Regulation::new(series));
        assert_eq!(describe(&doc, "Exempelmyndigheten").unwrap_err(), DescribeError::BlankTitle);
    }

    #[test]
    fn authorization_becomes_nested_reference_without_empty_chapter() {
        let mut regulation = Regulation::new(series("1"));
        regulation
            .authorizations
            .push(AuthorizationRef::new("Arkivförordningen", "1991:446", "", "11"));
        regulation
            .directives
            .push(DirectiveRef::new("31979L0409", "Fågeldirektivet"));
        let doc = Document::regulation(regulation);

        let xml = describe_rdfxml(&doc, "Exempelmyndigheten").unwrap();

        assert!(xml.contains("<Forfattningsreferens>"));
        assert!(xml.contains(
            "<angerGrundforfattning rdf:resource=\"http://rinfo.lagrummet.se/publ/sfs/1991:446\"/>"
        ));
        assert!(xml.contains("<angerParagrafnummer>11</angerParagrafnummer>"));
        assert!(!xml.contains("angerKapitelnummer"));
        assert!(xml.contains(
            "<genomforDirektiv rdf:resource=\"http://rinfo.lagrummet.se/ext/eur-lex/31979L0409\"/>"
        ));
    }

    #[test]
    fn titled_attachments_keep_their_position_and_extras_point_back() {
        let mut regulation = Regulation::new(series("1"));
        regulation.attachments.push(Attachment {
            title: String::new(),
            file: None,
        });
        regulation.attachments.push(Attachment {
            title: "Bilaga 2".to_string(),
            file: Some(ContentFile::new("bilaga/b2.pdf", "abc")),
        });
        regulation.supplementary_files.push(SupplementaryFile {
            title: "Besluts-PM".to_string(),
            file: ContentFile::new("ovrigt/pm.pdf", "def"),
        });
        let doc = Document::regulation(regulation);
        let graph = describe(&doc, "Exempelmyndigheten").unwrap();
        let s = subject(&doc);

        let second = Term::iri("http://rinfo.lagrummet.se/publ/exfs/2009:1#bilaga_2");
        assert!(graph.contains(&s, &ns::iri(ns::RPUBL, "bilaga"), &second));
        assert!(!graph.contains(
            &s,
            &ns::iri(ns::RPUBL, "bilaga"),
            &Term::iri("http://rinfo.lagrummet.se/publ/exfs/2009:1#bilaga_1")
        ));
        assert!(graph.contains(&second, &ns::iri(ns::DCT, "title"), &Term::literal("Bilaga 2")));

        let extra = Term::iri("http://rinfo.lagrummet.se/publ/exfs/2009:1/ovrigt/pm.pdf");
        assert!(graph.contains(&extra, &ns::iri(ns::FOAF, "primaryTopic"), &s));
    }

    #[test]
    fn reprint_flag_controls_omtryck_only() {
        let base = Document::regulation(Regulation::new(series("1")));
        let mut amendment_series = series("2");
        amendment_series.amends.push(DocumentLink::to(&base).unwrap());
        let mut amendment = Document::regulation(Regulation::new(amendment_series));

        let plain = describe_rdfxml(&amendment, "Exempelmyndigheten").unwrap();
        assert!(plain.contains("<andrar rdf:resource=\"http://rinfo.lagrummet.se/publ/exfs/2009:1\"/>"));
        assert!(!plain.contains("<omtryckAv"));

        amendment.series_mut().unwrap().is_reprint = true;
        let reprint = describe_rdfxml(&amendment, "Exempelmyndigheten").unwrap();
        assert!(reprint.contains("<omtryckAv rdf:resource=\"http://rinfo.lagrummet.se/publ/exfs/2009:1\"/>"));
    }

    #[test]
    fn consolidation_lists_base_and_underlying() {
        let base = Document::regulation(Regulation::new(series("1")));
        let latest = Document::regulation(Regulation::new(series("3")));
        let mut consolidated = ConsolidatedRegulation::new(
            "Konsoliderad föreskrift om administration",
            NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
            DocumentLink::to(&base).unwrap(),
            DocumentLink::to(&latest).unwrap(),
        );
        consolidated.underlying.push(DocumentLink::to(&latest).unwrap());
        let doc = Document::consolidated(consolidated);

        let graph = describe(&doc, "Exempelmyndigheten").unwrap();
        let s = subject(&doc);
        let underlying = ns::iri(ns::RPUBL, "konsolideringsunderlag");

        assert!(graph.contains(&s, &ns::iri(ns::RPUBL, "konsoliderar"), &subject(&base)));
        assert!(graph.contains(&s, &underlying, &subject(&base)));
        assert!(graph.contains(&s, &underlying, &subject(&latest)));
        assert_eq!(graph.objects(&s, &underlying).count(), 2);
    }
}
