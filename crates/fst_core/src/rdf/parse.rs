//! RDF/XML reader for harvested metadata posts.
//!
//! Supports the subset produced by legal-information publishers: node
//! elements (typed or `rdf:Description`), `rdf:about` / `rdf:nodeID`,
//! `rdf:resource`, `rdf:datatype`, inherited `xml:lang`, nested node
//! elements and `rdf:parseType="Resource"`.

use crate::rdf::{ns, Graph, Literal, Term};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Xml(String),
    UnboundPrefix(String),
    Malformed(String),
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Xml(message) => write!(f, "invalid XML: {message}"),
            Self::UnboundPrefix(prefix) => write!(f, "unbound namespace prefix: {prefix}"),
            Self::Malformed(message) => write!(f, "malformed RDF/XML: {message}"),
        }
    }
}

impl Error for ParseError {}

fn xml_err(err: impl Display) -> ParseError {
    ParseError::Xml(err.to_string())
}

#[derive(Debug, Default, Clone)]
struct Scope {
    prefixes: BTreeMap<String, String>,
    lang: Option<String>,
}

enum Frame {
    Root,
    Node {
        subject: Term,
    },
    Property {
        subject: Term,
        predicate: String,
        datatype: Option<String>,
        lang: Option<String>,
        text: String,
        object: Option<Term>,
    },
}

struct RdfReader {
    graph: Graph,
    scopes: Vec<Scope>,
    frames: Vec<Frame>,
    blank_labels: BTreeMap<String, Term>,
}

/// Parses an RDF/XML document into a graph.
pub fn parse_rdfxml(text: &str) -> ParseResult<Graph> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut state = RdfReader {
        graph: Graph::new(),
        scopes: vec![Scope::default()],
        frames: Vec::new(),
        blank_labels: BTreeMap::new(),
    };

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(element) => state.open(&element)?,
            Event::Empty(element) => {
                state.open(&element)?;
                state.close()?;
            }
            Event::End(_) => state.close()?,
            Event::Text(text) => {
                let value = text.unescape().map_err(xml_err)?;
                state.text(value.as_ref());
            }
            Event::CData(data) => {
                let value = String::from_utf8_lossy(data.as_ref()).into_owned();
                state.text(value.as_str());
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !state.frames.is_empty() {
        return Err(ParseError::Malformed("unexpected end of document".to_string()));
    }
    Ok(state.graph)
}

impl RdfReader {
    fn open(&mut self, element: &BytesStart<'_>) -> ParseResult<()> {
        let mut scope = self.scopes.last().cloned().unwrap_or_default();
        let mut attributes = Vec::new();
        for attr in element.attributes() {
            let attr = attr.map_err(xml_err)?;
            let key = std::str::from_utf8(attr.key.as_ref()).map_err(xml_err)?.to_string();
            let value = attr.unescape_value().map_err(xml_err)?.into_owned();
            if key == "xmlns" {
                scope.prefixes.insert(String::new(), value);
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                scope.prefixes.insert(prefix.to_string(), value);
            } else if key == "xml:lang" {
                scope.lang = (!value.is_empty()).then_some(value);
            } else {
                attributes.push((key, value));
            }
        }
        self.scopes.push(scope);

        let name = std::str::from_utf8(element.name().as_ref())
            .map_err(xml_err)?
            .to_string();
        let iri = self.resolve(name.as_str())?;
        let mut resolved = Vec::with_capacity(attributes.len());
        for (key, value) in attributes {
            // Unqualified attributes carry no RDF meaning.
            if !key.contains(':') {
                continue;
            }
            resolved.push((self.resolve(key.as_str())?, value));
        }

        match self.frames.last() {
            None if iri == ns::iri(ns::RDF, "RDF") => {
                self.frames.push(Frame::Root);
                Ok(())
            }
            None | Some(Frame::Root) => self.open_node(iri, resolved, None),
            Some(Frame::Property { subject, predicate, .. }) => {
                let parent = Some((subject.clone(), predicate.clone()));
                self.open_node(iri, resolved, parent)
            }
            Some(Frame::Node { subject }) => {
                let subject = subject.clone();
                self.open_property(subject, iri, resolved)
            }
        }
    }

    fn open_node(
        &mut self,
        element_iri: String,
        attributes: Vec<(String, String)>,
        parent: Option<(Term, String)>,
    ) -> ParseResult<()> {
        let about = ns::iri(ns::RDF, "about");
        let node_id = ns::iri(ns::RDF, "nodeID");

        let mut subject = None;
        let mut extra = Vec::new();
        for (key, value) in attributes {
            if key == about {
                subject = Some(Term::Iri(value));
            } else if key == node_id {
                subject = Some(self.blank(value.as_str()));
            } else if !key.starts_with(ns::RDF) {
                extra.push((key, value));
            }
        }
        let subject = match subject {
            Some(subject) => subject,
            None => self.graph.new_blank(),
        };

        if element_iri != ns::iri(ns::RDF, "Description") {
            self.graph
                .add(subject.clone(), ns::rdf_type(), Term::Iri(element_iri));
        }
        let lang = self.current_lang();
        for (predicate, value) in extra {
            self.graph
                .add(subject.clone(), predicate, literal(value, lang.clone(), None));
        }
        if let Some((parent_subject, predicate)) = parent {
            self.graph.add(parent_subject, predicate.clone(), subject.clone());
            if let Some(Frame::Property { object, .. }) = self.frames.last_mut() {
                *object = Some(subject.clone());
            }
        }

        self.frames.push(Frame::Node { subject });
        Ok(())
    }

    fn open_property(
        &mut self,
        subject: Term,
        predicate: String,
        attributes: Vec<(String, String)>,
    ) -> ParseResult<()> {
        let mut object = None;
        let mut datatype = None;
        let mut parse_type_resource = false;
        for (key, value) in attributes {
            match key.strip_prefix(ns::RDF) {
                Some("resource") => object = Some(Term::Iri(value)),
                Some("nodeID") => object = Some(self.blank(value.as_str())),
                Some("datatype") => datatype = Some(value),
                Some("parseType") => parse_type_resource = value == "Resource",
                _ => {}
            }
        }

        if parse_type_resource {
            let blank = self.graph.new_blank();
            self.graph.add(subject, predicate, blank.clone());
            self.frames.push(Frame::Node { subject: blank });
            return Ok(());
        }

        if let Some(object) = &object {
            self.graph.add(subject.clone(), predicate.clone(), object.clone());
        }
        let lang = self.current_lang();
        self.frames.push(Frame::Property {
            subject,
            predicate,
            datatype,
            lang,
            text: String::new(),
            object,
        });
        Ok(())
    }

    fn text(&mut self, value: &str) {
        if let Some(Frame::Property { text, object: None, .. }) = self.frames.last_mut() {
            text.push_str(value);
        }
    }

    fn close(&mut self) -> ParseResult<()> {
        self.scopes.pop();
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| ParseError::Malformed("unbalanced end tag".to_string()))?;
        if let Frame::Property {
            subject,
            predicate,
            datatype,
            lang,
            text,
            object: None,
        } = frame
        {
            self.graph.add(subject, predicate, literal(text, lang, datatype));
        }
        Ok(())
    }

    fn resolve(&self, qname: &str) -> ParseResult<String> {
        let (prefix, local) = match qname.split_once(':') {
            Some((prefix, local)) => (prefix, local),
            None => ("", qname),
        };
        if prefix == "xml" {
            return Ok(ns::iri(ns::XML, local));
        }
        self.scopes
            .last()
            .and_then(|scope| scope.prefixes.get(prefix))
            .map(|namespace| ns::iri(namespace, local))
            .ok_or_else(|| ParseError::UnboundPrefix(prefix.to_string()))
    }

    fn current_lang(&self) -> Option<String> {
        self.scopes.last().and_then(|scope| scope.lang.clone())
    }

    fn blank(&mut self, label: &str) -> Term {
        if let Some(term) = self.blank_labels.get(label) {
            return term.clone();
        }
        let term = self.graph.new_blank();
        self.blank_labels.insert(label.to_string(), term.clone());
        term
    }
}

fn literal(lexical: String, lang: Option<String>, datatype: Option<String>) -> Term {
    let lang = if datatype.is_some() { None } else { lang };
    Term::Literal(Literal {
        lexical,
        lang,
        datatype,
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_rdfxml, ParseError};
    use crate::rdf::{ns, Term};

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<rdf:RDF xmlns="http://rinfo.lagrummet.se/ns/2008/11/rinfo/publ#"
         xmlns:dct="http://purl.org/dc/terms/"
         xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <Myndighetsforeskrift rdf:about="http://rinfo.lagrummet.se/publ/exfs/2009:1">
    <dct:title xml:lang="sv">Föreskrift om arkiv</dct:title>
    <beslutsdatum rdf:datatype="http://www.w3.org/2001/XMLSchema#date">2009-05-01</beslutsdatum>
    <andrar rdf:resource="http://rinfo.lagrummet.se/publ/exfs/2008:4"/>
    <bemyndigande>
      <Forfattningsreferens>
        <angerGrundforfattning rdf:resource="http://rinfo.lagrummet.se/publ/sfs/1991:446"/>
      </Forfattningsreferens>
    </bemyndigande>
  </Myndighetsforeskrift>
</rdf:RDF>"#;

    #[test]
    fn parses_typed_node_with_literals_and_resources() {
        let graph = parse_rdfxml(SAMPLE).unwrap();
        let doc = Term::iri("http://rinfo.lagrummet.se/publ/exfs/2009:1");

        assert!(graph.contains(
            &doc,
            &ns::rdf_type(),
            &Term::iri(ns::iri(ns::RPUBL, "Myndighetsforeskrift"))
        ));
        assert!(graph.contains(
            &doc,
            &ns::iri(ns::DCT, "title"),
            &Term::lang_literal("Föreskrift om arkiv", "sv")
        ));
        assert!(graph.contains(
            &doc,
            &ns::iri(ns::RPUBL, "beslutsdatum"),
            &Term::typed_literal("2009-05-01", ns::iri(ns::XSD, "date"))
        ));
        assert!(graph.contains(
            &doc,
            &ns::iri(ns::RPUBL, "andrar"),
            &Term::iri("http://rinfo.lagrummet.se/publ/exfs/2008:4")
        ));
    }

    #[test]
    fn nested_node_becomes_blank_object() {
        let graph = parse_rdfxml(SAMPLE).unwrap();
        let doc = Term::iri("http://rinfo.lagrummet.se/publ/exfs/2009:1");
        let bemyndigande = ns::iri(ns::RPUBL, "bemyndigande");

        let blank = graph.objects(&doc, &bemyndigande).next().unwrap().clone();
        assert!(matches!(blank, Term::Blank(_)));
        assert!(graph.contains(
            &blank,
            &ns::iri(ns::RPUBL, "angerGrundforfattning"),
            &Term::iri("http://rinfo.lagrummet.se/publ/sfs/1991:446")
        ));
    }

    #[test]
    fn unbound_prefix_is_rejected() {
        let err = parse_rdfxml("<x:RDF/>").unwrap_err();
        assert_eq!(err, ParseError::UnboundPrefix("x".to_string()));
    }
}
