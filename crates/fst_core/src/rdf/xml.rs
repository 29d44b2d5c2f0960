//! Deterministic RDF/XML serializer.
//!
//! # Responsibility
//! - Render a `Graph` as abbreviated RDF/XML with the fixed prefix table.
//!
//! # Invariants
//! - The same graph always yields the same bytes.
//! - The main subject is written first as a typed node element.
//! - Blank nodes referenced exactly once are nested under their referrer.
//! - An IRI outside the prefix table is an error, never a partial document.

use crate::rdf::{ns, Graph, Literal, Term, Triple};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Prefix table in `xmlns` declaration order. The empty prefix is the
/// default namespace.
pub const PREFIXES: &[(&str, &str)] = &[
    ("", ns::RPUBL),
    ("dces", ns::DCES),
    ("dct", ns::DCT),
    ("foaf", ns::FOAF),
    ("rdf", ns::RDF),
];

pub type SerializeResult<T> = Result<T, SerializeError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerializeError {
    /// Predicate or type IRI has no entry in the prefix table.
    UnboundNamespace(String),
    Xml(String),
}

impl Display for SerializeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnboundNamespace(iri) => write!(f, "no namespace prefix bound for {iri}"),
            Self::Xml(message) => write!(f, "RDF/XML write failed: {message}"),
        }
    }
}

impl Error for SerializeError {}

fn xml_err(err: impl Display) -> SerializeError {
    SerializeError::Xml(err.to_string())
}

/// Serializes `graph`, writing `main` (if present in the graph) first.
pub fn to_rdfxml(graph: &Graph, main: Option<&Term>) -> SerializeResult<String> {
    let inline = inline_blanks(graph);
    let subjects = graph.subjects();

    let mut ordered: Vec<&Term> = Vec::with_capacity(subjects.len());
    if let Some(main) = main.filter(|main| subjects.contains(main)) {
        ordered.push(main);
    }
    ordered.extend(
        subjects
            .iter()
            .copied()
            .filter(|subject| Some(*subject) != main && !inline.contains(subject)),
    );

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(xml_err)?;

    let mut root = BytesStart::new("rdf:RDF");
    for (prefix, namespace) in PREFIXES {
        let attr = if prefix.is_empty() {
            String::from("xmlns")
        } else {
            format!("xmlns:{prefix}")
        };
        root.push_attribute((attr.as_str(), *namespace));
    }
    writer.write_event(Event::Start(root)).map_err(xml_err)?;

    for subject in ordered {
        write_node(&mut writer, graph, subject, &inline)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("rdf:RDF")))
        .map_err(xml_err)?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    String::from_utf8(bytes).map_err(xml_err)
}

/// Resolves an IRI to `prefix:local` (or bare `local` in the default
/// namespace).
pub fn qname(iri: &str) -> SerializeResult<String> {
    for (prefix, namespace) in PREFIXES {
        if let Some(local) = iri.strip_prefix(namespace) {
            if !is_ncname(local) {
                continue;
            }
            return Ok(if prefix.is_empty() {
                local.to_string()
            } else {
                format!("{prefix}:{local}")
            });
        }
    }
    Err(SerializeError::UnboundNamespace(iri.to_string()))
}

fn is_ncname(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.'))
}

fn inline_blanks(graph: &Graph) -> BTreeSet<&Term> {
    let mut references: BTreeMap<&Term, usize> = BTreeMap::new();
    for triple in graph.iter() {
        if matches!(triple.object, Term::Blank(_)) && triple.object != triple.subject {
            *references.entry(&triple.object).or_default() += 1;
        }
    }
    references
        .into_iter()
        .filter(|(_, count)| *count == 1)
        .map(|(term, _)| term)
        .collect()
}

fn write_node(
    writer: &mut Writer<Vec<u8>>,
    graph: &Graph,
    subject: &Term,
    inline: &BTreeSet<&Term>,
) -> SerializeResult<()> {
    let rdf_type = ns::rdf_type();
    let triples: Vec<&Triple> = graph.about(subject).collect();

    let type_triple = triples.iter().copied().find(|triple| {
        triple.predicate == rdf_type
            && triple
                .object
                .as_iri()
                .is_some_and(|iri| qname(iri).is_ok())
    });
    let element = match type_triple.and_then(|triple| triple.object.as_iri()) {
        Some(iri) => qname(iri)?,
        None => String::from("rdf:Description"),
    };

    let mut start = BytesStart::new(element.as_str());
    match subject {
        Term::Iri(iri) => start.push_attribute(("rdf:about", iri.as_str())),
        Term::Blank(label) if !inline.contains(&subject) => {
            start.push_attribute(("rdf:nodeID", label.as_str()))
        }
        _ => {}
    }

    let properties: Vec<&Triple> = triples
        .into_iter()
        .filter(|triple| Some(*triple) != type_triple)
        .collect();
    if properties.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(xml_err)?;
        return Ok(());
    }

    writer.write_event(Event::Start(start)).map_err(xml_err)?;
    for triple in properties {
        write_property(writer, graph, triple, inline)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.as_str())))
        .map_err(xml_err)?;
    Ok(())
}

fn write_property(
    writer: &mut Writer<Vec<u8>>,
    graph: &Graph,
    triple: &Triple,
    inline: &BTreeSet<&Term>,
) -> SerializeResult<()> {
    let name = qname(triple.predicate.as_str())?;
    let mut start = BytesStart::new(name.as_str());

    match &triple.object {
        Term::Iri(iri) => {
            start.push_attribute(("rdf:resource", iri.as_str()));
            writer.write_event(Event::Empty(start)).map_err(xml_err)?;
        }
        Term::Blank(_) if inline.contains(&&triple.object) => {
            writer.write_event(Event::Start(start)).map_err(xml_err)?;
            write_node(writer, graph, &triple.object, inline)?;
            writer
                .write_event(Event::End(BytesEnd::new(name.as_str())))
                .map_err(xml_err)?;
        }
        Term::Blank(label) => {
            start.push_attribute(("rdf:nodeID", label.as_str()));
            writer.write_event(Event::Empty(start)).map_err(xml_err)?;
        }
        Term::Literal(Literal {
            lexical,
            lang,
            datatype,
        }) => {
            if let Some(lang) = lang {
                start.push_attribute(("xml:lang", lang.as_str()));
            } else if let Some(datatype) = datatype {
                start.push_attribute(("rdf:datatype", datatype.as_str()));
            }
            writer.write_event(Event::Start(start)).map_err(xml_err)?;
            writer
                .write_event(Event::Text(BytesText::new(lexical.as_str())))
                .map_err(xml_err)?;
            writer
                .write_event(Event::End(BytesEnd::new(name.as_str())))
                .map_err(xml_err)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{qname, to_rdfxml, SerializeError};
    use crate::rdf::{ns, Graph, Term};

    fn doc() -> Term {
        Term::iri("http://rinfo.lagrummet.se/publ/exfs/2009:1")
    }

    #[test]
    fn qname_uses_default_namespace_for_rpubl() {
        assert_eq!(qname(&ns::iri(ns::RPUBL, "andrar")).unwrap(), "andrar");
        assert_eq!(qname(&ns::iri(ns::DCT, "title")).unwrap(), "dct:title");
        assert!(matches!(
            qname("http://example.org/unknown#p"),
            Err(SerializeError::UnboundNamespace(_))
        ));
    }

    #[test]
    fn resource_and_language_literals_are_abbreviated() {
        let mut graph = Graph::new();
        graph.add(doc(), ns::rdf_type(), Term::iri(ns::iri(ns::RPUBL, "Myndighetsforeskrift")));
        graph.add(doc(), ns::iri(ns::DCES, "subject"), Term::lang_literal("Administration", "sv"));
        graph.add(
            doc(),
            ns::iri(ns::RPUBL, "genomforDirektiv"),
            Term::iri("http://rinfo.lagrummet.se/ext/eur-lex/31979L0409"),
        );

        let xml = to_rdfxml(&graph, Some(&doc())).unwrap();

        assert!(xml.contains(
            "<Myndighetsforeskrift rdf:about=\"http://rinfo.lagrummet.se/publ/exfs/2009:1\">"
        ));
        assert!(xml.contains("<dces:subject xml:lang=\"sv\">Administration</dces:subject>"));
        assert!(xml.contains(
            "<genomforDirektiv rdf:resource=\"http://rinfo.lagrummet.se/ext/eur-lex/31979L0409\"/>"
        ));
    }

    #[test]
    fn single_use_blank_nodes_are_nested() {
        let mut graph = Graph::new();
        let blank = graph.new_blank();
        graph.add(doc(), ns::iri(ns::RPUBL, "bemyndigande"), blank.clone());
        graph.add(blank.clone(), ns::rdf_type(), Term::iri(ns::iri(ns::RPUBL, "Forfattningsreferens")));
        graph.add(blank, ns::iri(ns::RPUBL, "angerParagrafnummer"), Term::literal("11"));

        let xml = to_rdfxml(&graph, Some(&doc())).unwrap();

        assert!(xml.contains("<bemyndigande>"));
        assert!(xml.contains("<Forfattningsreferens>"));
        assert!(!xml.contains("rdf:nodeID"));
    }

    #[test]
    fn output_is_byte_stable() {
        let mut graph = Graph::new();
        graph.add(doc(), ns::iri(ns::DCT, "identifier"), Term::literal("EXFS 2009:1"));
        graph.add(doc(), ns::iri(ns::DCT, "title"), Term::lang_literal("Titel & mer", "sv"));

        let first = to_rdfxml(&graph, Some(&doc())).unwrap();
        let second = to_rdfxml(&graph.clone(), Some(&doc())).unwrap();

        assert_eq!(first, second);
        assert!(first.contains("Titel &amp; mer"));
    }
}
