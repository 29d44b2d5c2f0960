//! Atom 1.0 writer.
//!
//! Entry element order is fixed: `id`, `title`, `summary`, `updated`,
//! `published`, `content`, the RDF and HTML alternates, then enclosures.

use crate::checksum::md5_hex;
use crate::feed::{
    rfc3339, EntryView, FeedContext, FeedError, FeedResult, ATOM_NS, FEED_HISTORY_NS,
    LINK_EXTENSIONS_NS,
};
use log::debug;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fmt::Display;

type AtomWriter = Writer<Vec<u8>>;

fn xml_err(err: impl Display) -> FeedError {
    FeedError::Xml(err.to_string())
}

/// Renders a standalone `<entry>` carrying its own namespace declarations.
pub fn render_entry(view: &EntryView<'_>, context: &FeedContext) -> FeedResult<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_entry(&mut writer, view, context, true)?;
    String::from_utf8(writer.into_inner()).map_err(xml_err)
}

/// Renders the complete feed. `views` must already be in feed order.
///
/// `now_ms` is used as the feed `updated` value when there are no entries.
pub fn render_feed(
    views: &[EntryView<'_>],
    context: &FeedContext,
    now_ms: i64,
) -> FeedResult<String> {
    let updated_ms = views
        .iter()
        .map(|view| view.record.updated_ms)
        .max()
        .unwrap_or(now_ms);

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(xml_err)?;

    let mut root = BytesStart::new("feed");
    root.push_attribute(("xmlns", ATOM_NS));
    root.push_attribute(("xmlns:le", LINK_EXTENSIONS_NS));
    root.push_attribute(("xmlns:fh", FEED_HISTORY_NS));
    writer.write_event(Event::Start(root)).map_err(xml_err)?;

    text_element(&mut writer, "id", &[], context.feed_id.as_str())?;
    text_element(&mut writer, "title", &[], context.title.as_str())?;
    text_element(&mut writer, "updated", &[], rfc3339(updated_ms)?.as_str())?;

    writer
        .write_event(Event::Start(BytesStart::new("author")))
        .map_err(xml_err)?;
    text_element(&mut writer, "name", &[], context.contact_name.as_str())?;
    text_element(&mut writer, "uri", &[], context.contact_url.as_str())?;
    text_element(&mut writer, "email", &[], context.contact_email.as_str())?;
    writer
        .write_event(Event::End(BytesEnd::new("author")))
        .map_err(xml_err)?;

    let self_url = context.site_url("feed/");
    empty_element(
        &mut writer,
        "link",
        &[("rel", "self"), ("href", self_url.as_str())],
    )?;
    empty_element(
        &mut writer,
        "link",
        &[("rel", "alternate"), ("href", context.base_url.as_str())],
    )?;
    if context.deletion_policy.is_complete_feed() {
        empty_element(&mut writer, "fh:complete", &[])?;
    }

    for view in views {
        write_entry(&mut writer, view, context, false)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("feed")))
        .map_err(xml_err)?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    debug!(
        "event=feed_render module=feed status=ok entries={} complete={}",
        views.len(),
        context.deletion_policy.is_complete_feed()
    );
    String::from_utf8(bytes).map_err(xml_err)
}

fn write_entry(
    writer: &mut AtomWriter,
    view: &EntryView<'_>,
    context: &FeedContext,
    standalone: bool,
) -> FeedResult<()> {
    let record = view.record;
    let mut start = BytesStart::new("entry");
    if standalone {
        start.push_attribute(("xmlns", ATOM_NS));
        start.push_attribute(("xmlns:le", LINK_EXTENSIONS_NS));
    }
    writer.write_event(Event::Start(start)).map_err(xml_err)?;

    let title = view
        .document
        .map(|document| document.title())
        .filter(|title| !title.trim().is_empty())
        .unwrap_or(record.entry_id.as_str());
    text_element(writer, "id", &[], record.entry_id.as_str())?;
    text_element(writer, "title", &[], title)?;
    if let Some(summary) = view
        .document
        .map(|document| document.summary())
        .filter(|summary| !summary.trim().is_empty())
    {
        text_element(writer, "summary", &[], summary)?;
    }
    text_element(writer, "updated", &[], rfc3339(record.updated_ms)?.as_str())?;
    text_element(writer, "published", &[], rfc3339(record.published_ms)?.as_str())?;

    if let Some((document, post)) = view.content() {
        if let Some(content) = document.content() {
            let src = context.media_url(content.path.as_str());
            empty_element(
                writer,
                "content",
                &[
                    ("src", src.as_str()),
                    ("type", "application/pdf"),
                    ("le:md5", content.md5.as_str()),
                ],
            )?;
        }

        let rdf_url = context.rdf_url(post.slug.as_str());
        let length = post.length().to_string();
        empty_element(
            writer,
            "link",
            &[
                ("rel", "alternate"),
                ("type", "application/rdf+xml"),
                ("href", rdf_url.as_str()),
                ("length", length.as_str()),
                ("le:md5", post.md5.as_str()),
            ],
        )?;

        let html_url = context.html_url(post.slug.as_str());
        let page = context.page_renderer.map(|render| {
            let page = render(document, context);
            (page.len().to_string(), md5_hex(page.as_bytes()))
        });
        let mut html_link = vec![
            ("rel", "alternate"),
            ("type", "text/html"),
            ("href", html_url.as_str()),
        ];
        if let Some((length, md5)) = &page {
            html_link.push(("length", length.as_str()));
            html_link.push(("le:md5", md5.as_str()));
        }
        empty_element(writer, "link", &html_link)?;

        for file in document.enclosures() {
            let href = context.media_url(file.path.as_str());
            empty_element(
                writer,
                "link",
                &[
                    ("rel", "enclosure"),
                    ("href", href.as_str()),
                    ("type", media_type(file.path.as_str())),
                    ("le:md5", file.md5.as_str()),
                ],
            )?;
        }
    }

    writer
        .write_event(Event::End(BytesEnd::new("entry")))
        .map_err(xml_err)?;
    Ok(())
}

fn text_element(
    writer: &mut AtomWriter,
    name: &str,
    attributes: &[(&str, &str)],
    text: &str,
) -> FeedResult<()> {
    let mut start = BytesStart::new(name);
    for attribute in attributes {
        start.push_attribute(*attribute);
    }
    writer.write_event(Event::Start(start)).map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_err)?;
    Ok(())
}

fn empty_element(
    writer: &mut AtomWriter,
    name: &str,
    attributes: &[(&str, &str)],
) -> FeedResult<()> {
    let mut start = BytesStart::new(name);
    for attribute in attributes {
        start.push_attribute(*attribute);
    }
    writer.write_event(Event::Empty(start)).map_err(xml_err)?;
    Ok(())
}

fn media_type(path: &str) -> &'static str {
    let extension = path
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase());
    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("xls") => "application/vnd.ms-excel",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
