// document-toolkit/src/epub/codec.rs

use crate::error::{DocumentError, Result};
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use tracing::{debug, info, instrument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const EPUB_MIMETYPE: &str = "application/epub+zip";
const MIMETYPE_ENTRY: &str = "mimetype";
const CONTAINER_ENTRY: &str = "META-INF/container.xml";
const MAX_SIZE_HINT: u64 = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// XHTML / HTML content document.
    Markup,
    Other,
}

impl ItemKind {
    fn from_media_type(media_type: &str) -> Self {
        match media_type.trim().to_ascii_lowercase().as_str() {
            "application/xhtml+xml" | "text/html" => ItemKind::Markup,
            _ => ItemKind::Other,
        }
    }
}

/// One manifest entry together with its archive payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub id: String,
    /// Path of the payload inside the archive.
    pub path: String,
    pub media_type: String,
    pub kind: ItemKind,
    pub payload: Vec<u8>,
}

/// Decoded ePub: manifest items in manifest order plus every other archive
/// entry (container.xml, the package document, encryption metadata, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentContainer {
    package_path: String,
    items: Vec<ContentItem>,
    entries: BTreeMap<String, Vec<u8>>,
}

impl DocumentContainer {
    pub fn package_path(&self) -> &str {
        &self.package_path
    }

    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    pub fn items_mut(&mut self) -> impl Iterator<Item = &mut ContentItem> {
        self.items.iter_mut()
    }

    pub fn item(&self, id: &str) -> Option<&ContentItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn markup_items(&self) -> impl Iterator<Item = &ContentItem> {
        self.items.iter().filter(|item| item.kind == ItemKind::Markup)
    }

    /// Archive paths of the markup documents, in manifest order.
    pub fn chapter_names(&self) -> Vec<String> {
        self.markup_items().map(|item| item.path.clone()).collect()
    }

    /// Archive entries that are not manifest items.
    pub fn entry(&self, path: &str) -> Option<&[u8]> {
        self.entries.get(path).map(Vec::as_slice)
    }
}

fn format_error(context: &str, err: impl std::fmt::Display) -> DocumentError {
    DocumentError::InvalidFormat(format!("{}: {}", context, err))
}

/// Joins a manifest href onto the package document's directory.
fn resolve_href(base_dir: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or(href);
    let mut segments: Vec<&str> = if href.starts_with('/') {
        Vec::new()
    } else {
        base_dir.split('/').filter(|s| !s.is_empty()).collect()
    };
    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

fn xml_text<'a>(bytes: &'a [u8], context: &str) -> Result<&'a str> {
    let text = std::str::from_utf8(bytes).map_err(|e| format_error(context, e))?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

fn package_path(container_xml: &[u8]) -> Result<String> {
    let text = xml_text(container_xml, CONTAINER_ENTRY)?;
    let doc = roxmltree::Document::parse(text).map_err(|e| format_error(CONTAINER_ENTRY, e))?;
    doc.descendants()
        .filter(|node| node.has_tag_name("rootfile"))
        .find_map(|node| node.attribute("full-path"))
        .map(str::to_string)
        .ok_or_else(|| DocumentError::InvalidFormat(format!("{} names no rootfile", CONTAINER_ENTRY)))
}

struct ManifestEntry {
    id: String,
    href: String,
    media_type: String,
}

fn manifest(package: &[u8], package_path: &str) -> Result<Vec<ManifestEntry>> {
    let text = xml_text(package, package_path)?;
    let doc = roxmltree::Document::parse(text).map_err(|e| format_error(package_path, e))?;
    let manifest = doc
        .descendants()
        .find(|node| node.has_tag_name("manifest"))
        .ok_or_else(|| DocumentError::InvalidFormat(format!("{} has no manifest", package_path)))?;

    manifest
        .children()
        .filter(|node| node.has_tag_name("item"))
        .map(|node| -> Result<ManifestEntry> {
            let attr = |name: &str| {
                node.attribute(name).map(str::to_string).ok_or_else(|| {
                    DocumentError::InvalidFormat(format!(
                        "manifest item in {} is missing '{}'",
                        package_path, name
                    ))
                })
            };
            Ok(ManifestEntry {
                id: attr("id")?,
                href: attr("href")?,
                media_type: attr("media-type")?,
            })
        })
        .collect()
}

/// Reads an ePub archive into a [`DocumentContainer`].
#[instrument(skip(bytes), fields(size_bytes = bytes.len()))]
pub fn decode(bytes: &[u8]) -> Result<DocumentContainer> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| format_error("not an ePub archive", e))?;

    let mut entries = BTreeMap::new();
    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|e| format_error("unreadable archive entry", e))?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        // Declared sizes come from the archive and are only a hint.
        let mut data = Vec::with_capacity(file.size().min(MAX_SIZE_HINT) as usize);
        file.read_to_end(&mut data)
            .map_err(|e| format_error(&format!("archive entry {}", name), e))?;
        entries.insert(name, data);
    }

    if let Some(mimetype) = entries.remove(MIMETYPE_ENTRY) {
        if String::from_utf8_lossy(&mimetype).trim() != EPUB_MIMETYPE {
            return Err(DocumentError::InvalidFormat(format!(
                "unexpected mimetype '{}'",
                String::from_utf8_lossy(&mimetype)
            )));
        }
    }

    let container_xml = entries
        .get(CONTAINER_ENTRY)
        .ok_or_else(|| DocumentError::InvalidFormat(format!("missing {}", CONTAINER_ENTRY)))?;
    let package_path = package_path(container_xml)?;
    let package = entries
        .get(&package_path)
        .ok_or_else(|| DocumentError::InvalidFormat(format!("missing package document {}", package_path)))?;

    let base_dir = package_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    let manifest = manifest(package, &package_path)?;

    let mut items = Vec::with_capacity(manifest.len());
    for entry in manifest {
        if entry.href.contains("://") {
            debug!(id = %entry.id, href = %entry.href, "Skipping remote manifest item");
            continue;
        }
        let path = resolve_href(base_dir, &entry.href);
        let payload = entries.remove(&path).ok_or_else(|| {
            DocumentError::InvalidFormat(format!(
                "manifest item '{}' points to missing entry {}",
                entry.id, path
            ))
        })?;
        items.push(ContentItem {
            kind: ItemKind::from_media_type(&entry.media_type),
            id: entry.id,
            path,
            media_type: entry.media_type,
            payload,
        });
    }

    info!(
        package = %package_path,
        items = items.len(),
        markup_items = items.iter().filter(|i| i.kind == ItemKind::Markup).count(),
        "Decoded ePub container"
    );

    Ok(DocumentContainer {
        package_path,
        items,
        entries,
    })
}

/// Fixed timestamps keep re-encoding deterministic.
fn entry_options(method: CompressionMethod) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(method)
        .last_modified_time(zip::DateTime::default())
}

fn deflated() -> SimpleFileOptions {
    entry_options(CompressionMethod::Deflated)
}

/// Writes the container back out as an ePub archive, `mimetype` first and stored.
#[instrument(skip(container), fields(items = container.items.len()))]
pub fn encode(container: &DocumentContainer) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    writer.start_file(MIMETYPE_ENTRY, entry_options(CompressionMethod::Stored))?;
    writer.write_all(EPUB_MIMETYPE.as_bytes())?;

    for (path, data) in &container.entries {
        writer.start_file(path.as_str(), deflated())?;
        writer.write_all(data)?;
    }
    for item in &container.items {
        writer.start_file(item.path.as_str(), deflated())?;
        writer.write_all(&item.payload)?;
    }

    let bytes = writer.finish()?.into_inner();
    info!(size_kb = bytes.len() / 1024, "Encoded ePub container");
    Ok(bytes)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    pub(crate) const PACKAGE_OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:uuid:1234</dc:identifier>
    <dc:title>Sample</dc:title>
  </metadata>
  <manifest>
    <item id="ch1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="text/ch2.xhtml" media-type="application/xhtml+xml"/>
    <item id="css" href="styles/book.css" media-type="text/css"/>
  </manifest>
  <spine>
    <itemref idref="ch1"/>
    <itemref idref="ch2"/>
  </spine>
</package>"#;

    pub(crate) const CHAPTER_ONE: &str = r#"<html><head><title>One</title><style>p { color: red; }</style></head><body><h1>Chapter One</h1><script>alert("x")</script><p>It was a dark night.</p></body></html>"#;

    pub(crate) const CHAPTER_TWO: &str =
        r#"<html><head><title>Two</title></head><body><p>Plain chapter.</p></body></html>"#;

    /// An ePub-style XHTML chapter: XML declaration, namespaces, self-closing
    /// void elements and a self-closing script.
    pub(crate) const CHAPTER_XHTML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head>
  <title>Ch</title>
  <link rel="stylesheet" type="text/css" href="../styles/book.css"/>
  <script type="text/javascript" src="a.js"/>
  <style type="text/css">p { color: red; }</style>
</head>
<body>
  <p>First paragraph.</p>
  <p>Line<br/>break &amp; more</p>
  <img src="x.png" alt=""/>
  <script><![CDATA[ track(1 < 2); ]]></script>
</body>
</html>"#;

    pub(crate) fn sample_epub(chapter_one: &[u8]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("mimetype", entry_options(CompressionMethod::Stored))
            .unwrap();
        writer.write_all(EPUB_MIMETYPE.as_bytes()).unwrap();
        for (name, data) in [
            ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
            ("OEBPS/content.opf", PACKAGE_OPF.as_bytes()),
            ("OEBPS/text/ch1.xhtml", chapter_one),
            ("OEBPS/text/ch2.xhtml", CHAPTER_TWO.as_bytes()),
            ("OEBPS/styles/book.css", b"body { margin: 0; }".as_slice()),
        ] {
            writer.start_file(name, deflated()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn decode_reads_manifest_in_order() {
        let container = decode(&sample_epub(CHAPTER_ONE.as_bytes())).unwrap();

        assert_eq!(container.package_path(), "OEBPS/content.opf");
        let ids: Vec<&str> = container.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["ch1", "ch2", "css"]);
        assert_eq!(
            container.chapter_names(),
            vec!["OEBPS/text/ch1.xhtml", "OEBPS/text/ch2.xhtml"]
        );
        assert_eq!(container.item("css").unwrap().kind, ItemKind::Other);
        assert!(container.entry("META-INF/container.xml").is_some());
    }

    #[test]
    fn round_trip_preserves_items() {
        let container = decode(&sample_epub(CHAPTER_ONE.as_bytes())).unwrap();
        let reencoded = decode(&encode(&container).unwrap()).unwrap();

        assert_eq!(reencoded, container);
    }

    #[test]
    fn encoded_archive_starts_with_stored_mimetype() {
        let container = decode(&sample_epub(CHAPTER_ONE.as_bytes())).unwrap();
        let bytes = encode(&container).unwrap();

        // Local file header, name "mimetype", then the uncompressed value.
        assert_eq!(&bytes[0..4], b"PK\x03\x04");
        assert_eq!(u16::from_le_bytes([bytes[8], bytes[9]]), 0, "mimetype must be stored");
        let name_len = u16::from_le_bytes([bytes[26], bytes[27]]) as usize;
        let extra_len = u16::from_le_bytes([bytes[28], bytes[29]]) as usize;
        assert_eq!(&bytes[30..30 + name_len], b"mimetype");
        let data = 30 + name_len + extra_len;
        assert_eq!(&bytes[data..data + EPUB_MIMETYPE.len()], EPUB_MIMETYPE.as_bytes());
    }

    #[test]
    fn xhtml_chapter_round_trips_byte_for_byte() {
        let container = decode(&sample_epub(CHAPTER_XHTML.as_bytes())).unwrap();
        let reencoded = decode(&encode(&container).unwrap()).unwrap();

        assert_eq!(
            reencoded.item("ch1").unwrap().payload,
            CHAPTER_XHTML.as_bytes().to_vec()
        );
    }

    #[test]
    fn entry_larger_than_size_hint_cap_is_read_in_full() {
        // Larger than the size hint cap; the entry must still be read in full.
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("mimetype", entry_options(CompressionMethod::Stored)).unwrap();
        writer.write_all(EPUB_MIMETYPE.as_bytes()).unwrap();
        for (name, data) in [
            ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
            ("OEBPS/content.opf", PACKAGE_OPF.as_bytes()),
            ("OEBPS/text/ch1.xhtml", CHAPTER_ONE.as_bytes()),
            ("OEBPS/text/ch2.xhtml", CHAPTER_TWO.as_bytes()),
        ] {
            writer.start_file(name, deflated()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.start_file("OEBPS/styles/book.css", deflated()).unwrap();
        writer.write_all(&vec![b' '; 4 << 20]).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let container = decode(&bytes).unwrap();
        assert_eq!(container.item("css").unwrap().payload.len(), 4 << 20);
    }

    #[test]
    fn non_archive_is_a_format_error() {
        let err = decode(b"this is not a zip file").unwrap_err();
        assert!(matches!(err, DocumentError::InvalidFormat(_)));
    }

    #[test]
    fn archive_without_container_xml_is_rejected() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("mimetype", deflated()).unwrap();
        writer.write_all(EPUB_MIMETYPE.as_bytes()).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        match decode(&bytes).unwrap_err() {
            DocumentError::InvalidFormat(message) => assert!(message.contains("container.xml")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn hrefs_resolve_against_package_directory() {
        assert_eq!(resolve_href("OEBPS", "text/ch1.xhtml"), "OEBPS/text/ch1.xhtml");
        assert_eq!(resolve_href("OEBPS/pkg", "../img/a.png"), "OEBPS/img/a.png");
        assert_eq!(resolve_href("", "./ch1.xhtml#top"), "ch1.xhtml");
    }
}
