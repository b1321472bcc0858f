// document-toolkit/src/renderers/canvas.rs

use crate::error::Result;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

/// US Letter in PDF points.
pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource_name(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

/// Axis-aligned box in page coordinates, origin bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A single positioned line of text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub font: Font,
    pub size: f32,
    pub x: f32,
    pub y: f32,
    pub text: String,
}

impl TextLine {
    pub fn regular(x: f32, y: f32, text: impl Into<String>) -> Self {
        Self {
            font: Font::Regular,
            size: 12.0,
            x,
            y,
            text: text.into(),
        }
    }

    pub fn bold(size: f32, x: f32, y: f32, text: impl Into<String>) -> Self {
        Self {
            font: Font::Bold,
            size,
            x,
            y,
            text: text.into(),
        }
    }
}

/// Image XObject waiting to be attached to the document when its page is finished.
pub(crate) struct PendingImage {
    pub name: String,
    pub image: Stream,
    pub soft_mask: Option<Stream>,
}

/// Drawing surface for one page. Owns its operations until handed back to
/// [`ReportDocument::finish_page`].
#[derive(Default)]
pub struct PageCanvas {
    operations: Vec<Operation>,
    pub(crate) images: Vec<PendingImage>,
}

impl PageCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&mut self, line: &TextLine) {
        self.operations.push(Operation::new("BT", vec![]));
        self.operations.push(Operation::new(
            "Tf",
            vec![line.font.resource_name().into(), Object::Real(line.size)],
        ));
        self.operations.push(Operation::new(
            "Td",
            vec![Object::Real(line.x), Object::Real(line.y)],
        ));
        self.operations.push(Operation::new(
            "Tj",
            vec![Object::String(
                encode_win_ansi(&line.text),
                StringFormat::Literal,
            )],
        ));
        self.operations.push(Operation::new("ET", vec![]));
    }

    /// Paints a registered image XObject into `rect`.
    pub(crate) fn draw_image(&mut self, image: PendingImage, rect: Rect) {
        self.operations.push(Operation::new("q", vec![]));
        self.operations.push(Operation::new(
            "cm",
            vec![
                Object::Real(rect.width),
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(rect.height),
                Object::Real(rect.x),
                Object::Real(rect.y),
            ],
        ));
        self.operations
            .push(Operation::new("Do", vec![Object::Name(image.name.clone().into_bytes())]));
        self.operations.push(Operation::new("Q", vec![]));
        self.images.push(image);
    }

    pub fn next_image_name(&self) -> String {
        format!("Im{}", self.images.len() + 1)
    }
}

/// In-progress PDF built page by page.
pub struct ReportDocument {
    doc: Document,
    pages_id: ObjectId,
    font_ids: [ObjectId; 2],
    page_ids: Vec<ObjectId>,
}

impl ReportDocument {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let bold = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });

        Self {
            doc,
            pages_id,
            font_ids: [regular, bold],
            page_ids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn finish_page(&mut self, canvas: PageCanvas) -> Result<()> {
        let PageCanvas { operations, images } = canvas;

        let mut xobjects = lopdf::Dictionary::new();
        for pending in images {
            let mut image = pending.image;
            if let Some(mask) = pending.soft_mask {
                let mask_id = self.doc.add_object(mask);
                image.dict.set("SMask", mask_id);
            }
            let image_id = self.doc.add_object(image);
            xobjects.set(pending.name, image_id);
        }

        let content = Content { operations }.encode()?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));

        let mut resources = dictionary! {
            "Font" => dictionary! {
                "F1" => self.font_ids[0],
                "F2" => self.font_ids[1],
            },
        };
        if !xobjects.is_empty() {
            resources.set("XObject", xobjects);
        }

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(PAGE_WIDTH),
                Object::Real(PAGE_HEIGHT),
            ],
            "Contents" => content_id,
            "Resources" => resources,
        });
        self.page_ids.push(page_id);
        Ok(())
    }

    /// Closes the page tree and serializes the document.
    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::Reference(*id)).collect();
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => self.page_ids.len() as i64,
        };
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        self.doc.save_to(&mut buffer)?;
        Ok(buffer)
    }
}

impl Default for ReportDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Glyphs WinAnsiEncoding places in 0x80..=0x9F, where Latin-1 has C1 controls.
const WIN_ANSI_HIGH: [(char, u8); 27] = [
    ('\u{20ac}', 0x80),
    ('\u{201a}', 0x82),
    ('\u{0192}', 0x83),
    ('\u{201e}', 0x84),
    ('\u{2026}', 0x85),
    ('\u{2020}', 0x86),
    ('\u{2021}', 0x87),
    ('\u{02c6}', 0x88),
    ('\u{2030}', 0x89),
    ('\u{0160}', 0x8a),
    ('\u{2039}', 0x8b),
    ('\u{0152}', 0x8c),
    ('\u{017d}', 0x8e),
    ('\u{2018}', 0x91),
    ('\u{2019}', 0x92),
    ('\u{201c}', 0x93),
    ('\u{201d}', 0x94),
    ('\u{2022}', 0x95),
    ('\u{2013}', 0x96),
    ('\u{2014}', 0x97),
    ('\u{02dc}', 0x98),
    ('\u{2122}', 0x99),
    ('\u{0161}', 0x9a),
    ('\u{203a}', 0x9b),
    ('\u{0153}', 0x9c),
    ('\u{017e}', 0x9e),
    ('\u{0178}', 0x9f),
];

/// Base-14 fonts only cover WinAnsi; anything it cannot express becomes `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x00..=0x7f | 0xa0..=0xff => c as u8,
            _ => WIN_ANSI_HIGH
                .iter()
                .find(|(glyph, _)| *glyph == c)
                .map_or(b'?', |(_, byte)| *byte),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_page_serializes_to_single_page_pdf() {
        let mut report = ReportDocument::new();
        report.finish_page(PageCanvas::new()).unwrap();
        let bytes = report.into_bytes().unwrap();

        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn text_is_written_into_page_content() {
        let mut report = ReportDocument::new();
        let mut canvas = PageCanvas::new();
        canvas.text(&TextLine::regular(50.0, 742.0, "Hello (world)"));
        report.finish_page(canvas).unwrap();
        let bytes = report.into_bytes().unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let content = doc.get_and_decode_page_content(page_id).unwrap();
        let tj = content
            .operations
            .iter()
            .find(|op| op.operator == "Tj")
            .unwrap();
        assert_eq!(tj.operands[0].as_str().unwrap(), b"Hello (world)");
    }

    #[test]
    fn unencodable_characters_are_replaced() {
        assert_eq!(encode_win_ansi("caf\u{e9} \u{4e2d}"), b"caf\xe9 ?".to_vec());
        // C1 control characters have no WinAnsi glyph.
        assert_eq!(encode_win_ansi("\u{80}\u{9d}"), b"??".to_vec());
    }

    #[test]
    fn win_ansi_punctuation_is_mapped() {
        assert_eq!(
            encode_win_ansi("\u{20ac}5 \u{2014} \u{201c}ok\u{201d} it\u{2019}s\u{2122}"),
            b"\x805 \x97 \x93ok\x94 it\x92s\x99".to_vec()
        );
    }
}
