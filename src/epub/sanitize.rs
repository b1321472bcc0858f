// document-toolkit/src/epub/sanitize.rs

use crate::epub::codec::{DocumentContainer, ItemKind};
use crate::error::DocumentError;
use kuchiki::traits::TendrilSink;
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use tracing::{debug, info, warn};

/// Elements removed from every markup document, subtree included.
pub const DISALLOWED_ELEMENTS: [&str; 2] = ["script", "style"];

#[derive(Debug, Default)]
pub struct SanitizeReport {
    /// Markup items that were parsed and rewritten.
    pub cleaned: Vec<String>,
    pub removed_elements: usize,
    /// Items left untouched because they could not be parsed.
    pub malformed: Vec<DocumentError>,
}

fn is_disallowed(local_name: &[u8]) -> bool {
    DISALLOWED_ELEMENTS
        .iter()
        .any(|tag| local_name.eq_ignore_ascii_case(tag.as_bytes()))
}

/// Streams well-formed XHTML through quick-xml, dropping disallowed
/// elements. Everything else (declaration, doctype, namespaces, self-closing
/// tags, entity references) is written back as it was read.
///
/// Fails if `markup` is not well-formed XML.
fn sanitize_xhtml(markup: &str) -> std::result::Result<(String, usize), String> {
    let mut reader = Reader::from_str(markup);
    reader.config_mut().trim_text(false);
    reader.config_mut().expand_empty_elements = false;

    let mut writer = Writer::new(Vec::with_capacity(markup.len()));
    let mut open = 0usize;
    let mut skip_depth = 0usize;
    let mut removed = 0;

    loop {
        let event = reader.read_event().map_err(|e| e.to_string())?;
        match &event {
            Event::Eof => break,
            Event::Start(e) => {
                open += 1;
                if skip_depth > 0 {
                    skip_depth += 1;
                    continue;
                }
                if is_disallowed(e.local_name().as_ref()) {
                    skip_depth = 1;
                    removed += 1;
                    continue;
                }
            }
            Event::End(_) => {
                open = open
                    .checked_sub(1)
                    .ok_or_else(|| "end tag without a matching start tag".to_string())?;
                if skip_depth > 0 {
                    skip_depth -= 1;
                    continue;
                }
            }
            Event::Empty(e) => {
                if skip_depth > 0 {
                    continue;
                }
                if is_disallowed(e.local_name().as_ref()) {
                    removed += 1;
                    continue;
                }
            }
            _ if skip_depth > 0 => continue,
            _ => {}
        }
        writer.write_event(event).map_err(|e| e.to_string())?;
    }

    if open != 0 {
        return Err(format!("{} element(s) left unclosed", open));
    }

    let cleaned = String::from_utf8(writer.into_inner()).map_err(|e| e.to_string())?;
    Ok((cleaned, removed))
}

/// Lenient HTML path for tag soup that is not well-formed XML.
fn sanitize_html(markup: &str) -> (String, usize) {
    let document = kuchiki::parse_html().one(markup);

    let doomed: Vec<_> = match document.select(&DISALLOWED_ELEMENTS.join(", ")) {
        Ok(selection) => selection.map(|element| element.as_node().clone()).collect(),
        Err(()) => Vec::new(),
    };
    for node in &doomed {
        node.detach();
    }

    (document.to_string(), doomed.len())
}

/// Drops disallowed elements from `markup` and returns the new markup plus
/// how many elements were removed.
///
/// Well-formed documents keep their XML serialization, so XHTML stays XHTML.
/// Anything else is parsed as HTML and re-serialized as HTML.
pub fn sanitize_markup(markup: &str) -> (String, usize) {
    match sanitize_xhtml(markup) {
        Ok(result) => result,
        Err(reason) => {
            debug!(reason = %reason, "Markup is not well-formed XML, using HTML parser");
            sanitize_html(markup)
        }
    }
}

/// Strips scripts and styles from every markup item of `container`, in place.
///
/// A malformed item is recorded in the report and skipped; its siblings are
/// still processed.
pub fn sanitize(container: &mut DocumentContainer) -> SanitizeReport {
    let mut report = SanitizeReport::default();

    for item in container.items_mut() {
        if item.kind != ItemKind::Markup {
            continue;
        }

        let markup = match std::str::from_utf8(&item.payload) {
            Ok(text) => text,
            Err(e) => {
                warn!(id = %item.id, path = %item.path, error = %e, "Skipping malformed markup item");
                report.malformed.push(DocumentError::MalformedItem {
                    id: item.id.clone(),
                    reason: format!("payload is not UTF-8 text: {}", e),
                });
                continue;
            }
        };

        let (cleaned, removed) = sanitize_markup(markup);
        debug!(id = %item.id, removed, "Sanitized markup item");
        item.payload = cleaned.into_bytes();
        report.removed_elements += removed;
        report.cleaned.push(item.id.clone());
    }

    info!(
        cleaned = report.cleaned.len(),
        removed_elements = report.removed_elements,
        malformed = report.malformed.len(),
        "Sanitized document container"
    );

    report
}
