// document-toolkit/src/lib.rs

//! Invoice, stock-report and ePub tooling built around one document
//! assembly pipeline: render PDF pages, splice in external PDFs, or
//! decode/sanitize/re-encode an ePub, and hand back a single artifact.

pub mod config;
pub mod epub;
pub mod error;
pub mod handler;
pub mod merge;
pub mod models;
pub mod output;
pub mod renderers;
pub mod stock;

pub use error::{DocumentError, Result};
pub use handler::ToolHandler;
