// document-toolkit/src/renderers/mod.rs

mod canvas;
mod chart;
mod embed;
mod report;

pub use canvas::{Font, PageCanvas, Rect, ReportDocument, TextLine, PAGE_HEIGHT, PAGE_WIDTH};
pub use chart::LineChart;
pub use embed::{embed_image, fit_within};
pub use report::{format_money, ReportRenderer};
