// document-toolkit/src/renderers/report.rs

use crate::config::RenderConfig;
use crate::error::Result;
use crate::models::LineItem;
use crate::renderers::canvas::{PageCanvas, Rect, ReportDocument, TextLine};
use crate::renderers::embed::embed_image;
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, info};

const MARGIN_X: f32 = 50.0;
const HEADING_Y: f32 = 742.0;
const SEPARATOR_Y: f32 = 722.0;
const FIRST_ROW_Y: f32 = 692.0;
const ROW_HEIGHT: f32 = 20.0;
const BOTTOM_MARGIN: f32 = 50.0;
const SEPARATOR: &str = "----------------------------------------";

const STOCK_RANGE_Y: f32 = 712.0;
const STOCK_CLOSE_Y: f32 = 692.0;
const CHART_BOUNDS: Rect = Rect {
    x: 50.0,
    y: 392.0,
    width: 500.0,
    height: 300.0,
};

/// Formats `amount` with exactly two decimals behind the currency prefix.
pub fn format_money(currency: &str, amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    format!("{}{}", currency, rounded)
}

pub struct ReportRenderer {
    currency_symbol: String,
    paginate_overflow: bool,
}

impl ReportRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            currency_symbol: config.currency_symbol.clone(),
            paginate_overflow: config.paginate_overflow,
        }
    }

    /// Positions every text line of an invoice, grouped per page.
    pub fn invoice_layout(&self, title: &str, items: &[LineItem], total: Decimal) -> Vec<Vec<TextLine>> {
        let mut pages = Vec::new();
        let mut lines = vec![
            TextLine::regular(MARGIN_X, HEADING_Y, title),
            TextLine::regular(MARGIN_X, SEPARATOR_Y, SEPARATOR),
        ];
        let mut y = FIRST_ROW_Y;

        for (index, item) in items.iter().enumerate() {
            if self.paginate_overflow && y < BOTTOM_MARGIN {
                pages.push(std::mem::take(&mut lines));
                lines.push(TextLine::regular(
                    MARGIN_X,
                    HEADING_Y,
                    format!("{} (continued)", title),
                ));
                y = FIRST_ROW_Y;
            }
            lines.push(TextLine::regular(
                MARGIN_X,
                y,
                format!(
                    "{}. {} - {}",
                    index + 1,
                    item.description,
                    format_money(&self.currency_symbol, item.price)
                ),
            ));
            y -= ROW_HEIGHT;
        }

        let mut total_y = y - ROW_HEIGHT;
        if self.paginate_overflow && total_y < BOTTOM_MARGIN {
            pages.push(std::mem::take(&mut lines));
            lines.push(TextLine::regular(
                MARGIN_X,
                HEADING_Y,
                format!("{} (continued)", title),
            ));
            total_y = FIRST_ROW_Y;
        }
        lines.push(TextLine::regular(
            MARGIN_X,
            total_y,
            format!("Total: {}", format_money(&self.currency_symbol, total)),
        ));
        pages.push(lines);
        pages
    }

    pub fn render_invoice(&self, title: &str, items: &[LineItem], total: Decimal) -> Result<Vec<u8>> {
        info!(title = %title, items = items.len(), "Rendering invoice PDF");

        let mut report = ReportDocument::new();
        for page in self.invoice_layout(title, items, total) {
            let mut canvas = PageCanvas::new();
            for line in &page {
                canvas.text(line);
            }
            report.finish_page(canvas)?;
        }
        let pages = report.page_count();
        let pdf_bytes = report.into_bytes()?;

        info!(
            title = %title,
            pages,
            size_kb = pdf_bytes.len() / 1024,
            "Invoice PDF generated successfully"
        );

        Ok(pdf_bytes)
    }

    pub fn stock_layout(
        &self,
        ticker: &str,
        series_start: NaiveDate,
        series_end: NaiveDate,
        latest_close: Decimal,
    ) -> Vec<TextLine> {
        vec![
            TextLine::bold(14.0, MARGIN_X, HEADING_Y, format!("Stock Report: {}", ticker)),
            TextLine::regular(
                MARGIN_X,
                STOCK_RANGE_Y,
                format!("Data from {} to {}", series_start, series_end),
            ),
            TextLine::regular(
                MARGIN_X,
                STOCK_CLOSE_Y,
                format!(
                    "Latest Close: {}",
                    format_money(&self.currency_symbol, latest_close)
                ),
            ),
        ]
    }

    pub fn render_stock(
        &self,
        ticker: &str,
        series_start: NaiveDate,
        series_end: NaiveDate,
        latest_close: Decimal,
        chart_image: &[u8],
    ) -> Result<Vec<u8>> {
        info!(ticker = %ticker, "Rendering stock report PDF");

        let mut canvas = PageCanvas::new();
        for line in self.stock_layout(ticker, series_start, series_end, latest_close) {
            canvas.text(&line);
        }
        let placed = embed_image(&mut canvas, chart_image, CHART_BOUNDS)?;
        debug!(width = placed.width, height = placed.height, "Chart placed");

        let mut report = ReportDocument::new();
        report.finish_page(canvas)?;
        let pdf_bytes = report.into_bytes()?;

        info!(
            ticker = %ticker,
            size_kb = pdf_bytes.len() / 1024,
            "Stock report PDF generated successfully"
        );

        Ok(pdf_bytes)
    }
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self::new(&RenderConfig::default())
    }
}
