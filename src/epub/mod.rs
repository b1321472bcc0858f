// document-toolkit/src/epub/mod.rs

mod codec;
mod sanitize;

pub use codec::{decode, encode, ContentItem, DocumentContainer, ItemKind, EPUB_MIMETYPE};
pub use sanitize::{sanitize, sanitize_markup, SanitizeReport, DISALLOWED_ELEMENTS};
