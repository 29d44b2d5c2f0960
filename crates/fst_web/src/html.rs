//! Server-rendered document pages.
//!
//! One template per document variant: `foreskrift`, `allmanna_rad` and
//! `konsoliderad_foreskrift`. Pages are built from the live document store,
//! never from the cached metadata post.

use fst_core::feed::FeedContext;
use fst_core::model::document::{
    ConsolidatedRegulation, Document, DocumentBody, DocumentLink, Regulation, SeriesFields,
};
use quick_xml::escape::escape;

/// Template used for a document variant.
pub fn template_name(document: &Document) -> &'static str {
    match &document.body {
        DocumentBody::Regulation(_) => "foreskrift",
        DocumentBody::GeneralAdvice(_) => "allmanna_rad",
        DocumentBody::ConsolidatedRegulation(_) => "konsoliderad_foreskrift",
    }
}

/// Renders the detail page of `document`.
pub fn render_document(document: &Document, context: &FeedContext) -> String {
    let heading = document
        .identifier()
        .unwrap_or_else(|_| document.title().to_string());
    let body = match &document.body {
        DocumentBody::Regulation(regulation) => foreskrift(regulation, context),
        DocumentBody::GeneralAdvice(advice) => allmanna_rad(&advice.series, context),
        DocumentBody::ConsolidatedRegulation(consolidated) => {
            konsoliderad_foreskrift(consolidated, context)
        }
    };
    let rdf_link = document
        .slug()
        .map(|slug| {
            format!(
                "<p class=\"rdf\"><a href=\"{}\">RDF</a></p>\n",
                escape(context.rdf_url(slug.as_str()).as_str())
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="sv">
<head>
    <meta charset="utf-8">
    <title>{heading}</title>
</head>
<body class="{template}">
    <h1>{heading}</h1>
    <h2>{title}</h2>
{body}{rdf_link}</body>
</html>
"#,
        heading = escape(heading.as_str()),
        template = template_name(document),
        title = escape(document.title()),
    )
}

fn foreskrift(regulation: &Regulation, context: &FeedContext) -> String {
    let mut out = series_section(&regulation.series, context);

    if !regulation.authorizations.is_empty() {
        out.push_str("<h3>Bemyndigande</h3>\n<ul class=\"bemyndiganden\">\n");
        for authorization in &regulation.authorizations {
            out.push_str(&format!(
                "<li>{}</li>\n",
                escape(authorization.citation().as_str())
            ));
        }
        out.push_str("</ul>\n");
    }

    if !regulation.directives.is_empty() {
        out.push_str("<h3>Genomför direktiv</h3>\n<ul class=\"direktiv\">\n");
        for directive in &regulation.directives {
            out.push_str(&format!(
                "<li><a href=\"{}\">{}</a></li>\n",
                escape(directive.uri().as_str()),
                escape(directive.title.as_str())
            ));
        }
        out.push_str("</ul>\n");
    }

    if !regulation.attachments.is_empty() {
        out.push_str("<h3>Bilagor</h3>\n<ol class=\"bilagor\">\n");
        for attachment in &regulation.attachments {
            match &attachment.file {
                Some(file) => out.push_str(&format!(
                    "<li><a href=\"{}\">{}</a></li>\n",
                    escape(context.media_url(file.path.as_str()).as_str()),
                    escape(attachment.title.as_str())
                )),
                None => out.push_str(&format!(
                    "<li>{} (ingår i dokumentet)</li>\n",
                    escape(attachment.title.as_str())
                )),
            }
        }
        out.push_str("</ol>\n");
    }

    if !regulation.supplementary_files.is_empty() {
        out.push_str("<h3>Övriga dokument</h3>\n<ul class=\"ovriga\">\n");
        for extra in &regulation.supplementary_files {
            out.push_str(&format!(
                "<li><a href=\"{}\">{}</a></li>\n",
                escape(context.media_url(extra.file.path.as_str()).as_str()),
                escape(extra.title.as_str())
            ));
        }
        out.push_str("</ul>\n");
    }
    out
}

fn allmanna_rad(series: &SeriesFields, context: &FeedContext) -> String {
    series_section(series, context)
}

fn konsoliderad_foreskrift(
    consolidated: &ConsolidatedRegulation,
    context: &FeedContext,
) -> String {
    let mut out = String::from("<dl>\n");
    out.push_str(&definition(
        "Konsoliderad t.o.m.",
        consolidated
            .consolidation_date
            .format("%Y-%m-%d")
            .to_string()
            .as_str(),
    ));
    if let Some(base) = &consolidated.base {
        out.push_str(&format!(
            "<dt>Grundförfattning</dt><dd>{}</dd>\n",
            document_link(base, context)
        ));
    }
    if let Some(latest) = &consolidated.latest_amendment {
        out.push_str(&format!(
            "<dt>Senaste ändring</dt><dd>{}</dd>\n",
            document_link(latest, context)
        ));
    }
    if let Some(publisher) = &consolidated.publisher {
        out.push_str(&definition("Utgivare", publisher.name.as_str()));
    }
    out.push_str("</dl>\n");

    out.push_str(&link_list("Ingående ändringar", &consolidated.underlying, context));
    if let Some(file) = &consolidated.content {
        out.push_str(&pdf_link(file.path.as_str(), context));
    }
    out
}

fn series_section(series: &SeriesFields, context: &FeedContext) -> String {
    let mut out = String::new();
    if !series.summary.is_empty() {
        out.push_str(&format!(
            "<p class=\"sammanfattning\">{}</p>\n",
            escape(series.summary.as_str())
        ));
    }

    out.push_str("<dl>\n");
    out.push_str(&definition("Typ", series.role_label().as_str()));
    out.push_str(&definition(
        "Beslutad",
        series.decision_date.format("%Y-%m-%d").to_string().as_str(),
    ));
    out.push_str(&definition(
        "Träder i kraft",
        series.effective_date.format("%Y-%m-%d").to_string().as_str(),
    ));
    out.push_str(&definition(
        "Utkom från trycket",
        series.print_date.format("%Y-%m-%d").to_string().as_str(),
    ));
    if let Some(decided_by) = &series.decided_by {
        out.push_str(&definition("Beslutad av", decided_by.name.as_str()));
    }
    if let Some(publisher) = &series.publisher {
        out.push_str(&definition("Utgivare", publisher.name.as_str()));
    }
    if !series.keywords.is_empty() {
        let keywords = series
            .keywords
            .iter()
            .map(|keyword| keyword.title.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&definition("Ämnesord", keywords.as_str()));
    }
    out.push_str("</dl>\n");

    out.push_str(&link_list("Ändrar", &series.amends, context));
    out.push_str(&link_list("Upphäver", &series.repeals, context));
    if let Some(file) = &series.content {
        out.push_str(&pdf_link(file.path.as_str(), context));
    }
    out
}

fn definition(label: &str, value: &str) -> String {
    format!("<dt>{}</dt><dd>{}</dd>\n", escape(label), escape(value))
}

fn document_link(link: &DocumentLink, context: &FeedContext) -> String {
    format!(
        "<a href=\"{}\">{}</a>",
        escape(context.html_url(link.slug.as_str()).as_str()),
        escape(link.identifier.as_str())
    )
}

fn link_list(heading: &str, links: &[DocumentLink], context: &FeedContext) -> String {
    if links.is_empty() {
        return String::new();
    }
    let mut out = format!("<h3>{}</h3>\n<ul>\n", escape(heading));
    for link in links {
        out.push_str(&format!("<li>{}</li>\n", document_link(link, context)));
    }
    out.push_str("</ul>\n");
    out
}

fn pdf_link(path: &str, context: &FeedContext) -> String {
    format!(
        "<p class=\"dokument\"><a href=\"{}\">Dokument (PDF)</a></p>\n",
        escape(context.media_url(path).as_str())
    )
}
