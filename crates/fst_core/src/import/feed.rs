//! Atom feed reader for the importer.

use crate::import::{ImportError, ImportResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Locations advertised by one feed entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntryLinks {
    pub entry_id: String,
    /// `link` with `type="application/rdf+xml"`.
    pub rdf_url: Option<String>,
    /// `content` with `type="application/pdf"`.
    pub pdf_url: Option<String>,
}

/// Parses the entries of an Atom feed, oldest first.
///
/// Feeds list newest entries first; the result is reversed.
pub fn parse_feed(text: &str) -> ImportResult<Vec<FeedEntryLinks>> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<FeedEntryLinks> = None;
    let mut in_id = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| ImportError::Feed(err.to_string()))?;
        match event {
            Event::Start(element) => match element.local_name().as_ref() {
                b"entry" => current = Some(FeedEntryLinks::default()),
                b"id" => in_id = current.is_some(),
                _ => record_link(&element, current.as_mut())?,
            },
            Event::Empty(element) => record_link(&element, current.as_mut())?,
            Event::Text(text) if in_id => {
                let value = text
                    .unescape()
                    .map_err(|err| ImportError::Feed(err.to_string()))?;
                if let Some(entry) = current.as_mut() {
                    entry.entry_id.push_str(value.as_ref());
                }
            }
            Event::End(element) => match element.local_name().as_ref() {
                b"entry" => {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
                b"id" => in_id = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if current.is_some() {
        return Err(ImportError::Feed("unterminated entry".to_string()));
    }
    entries.reverse();
    Ok(entries)
}

fn record_link(element: &BytesStart<'_>, entry: Option<&mut FeedEntryLinks>) -> ImportResult<()> {
    let Some(entry) = entry else {
        return Ok(());
    };
    let (target_attr, wanted_type) = match element.local_name().as_ref() {
        b"link" => ("href", "application/rdf+xml"),
        b"content" => ("src", "application/pdf"),
        _ => return Ok(()),
    };

    let mut media_type = None;
    let mut target = None;
    for attr in element.attributes() {
        let attr = attr.map_err(|err| ImportError::Feed(err.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|err| ImportError::Feed(err.to_string()))?
            .into_owned();
        match attr.key.local_name().as_ref() {
            b"type" => media_type = Some(value),
            key if key == target_attr.as_bytes() => target = Some(value),
            _ => {}
        }
    }

    if media_type.as_deref() == Some(wanted_type) {
        match wanted_type {
            "application/rdf+xml" => entry.rdf_url = target,
            _ => entry.pdf_url = target,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::parse_feed;

    const FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:le="http://purl.org/atompub/link-extensions/1.0">
  <id>tag:example.se,2009:rinfo:feed</id>
  <title>Flöde</title>
  <entry>
    <id>http://rinfo.lagrummet.se/publ/exfs/2009:2</id>
    <title>Nyare</title>
    <content src="http://fs.example.se/dokument/foreskrift/EXFS-2009-2.pdf" type="application/pdf" le:md5="aa"/>
    <link rel="alternate" type="application/rdf+xml" href="http://fs.example.se/publ/exfs/2009:2/rdf"/>
    <link rel="alternate" type="text/html" href="http://fs.example.se/publ/exfs/2009:2/"/>
  </entry>
  <entry>
    <id>http://rinfo.lagrummet.se/publ/exfs/2009:1</id>
    <title>Äldre</title>
    <link rel="alternate" type="application/rdf+xml" href="http://fs.example.se/publ/exfs/2009:1/rdf"/>
  </entry>
</feed>"#;

    #[test]
    fn entries_are_returned_oldest_first_with_links() {
        let entries = parse_feed(FEED).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entry_id, "http://rinfo.lagrummet.se/publ/exfs/2009:1");
        assert_eq!(entries[0].pdf_url, None);
        assert_eq!(
            entries[1].rdf_url.as_deref(),
            Some("http://fs.example.se/publ/exfs/2009:2/rdf")
        );
        assert_eq!(
            entries[1].pdf_url.as_deref(),
            Some("http://fs.example.se/dokument/foreskrift/EXFS-2009-2.pdf")
        );
    }

    #[test]
    fn feed_id_outside_entries_is_ignored() {
        let entries = parse_feed(FEED).unwrap();
        assert!(entries
            .iter()
            .all(|entry| !entry.entry_id.starts_with("tag:")));
    }
}
