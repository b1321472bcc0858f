// document-toolkit/src/handler.rs

use crate::config::RenderConfig;
use crate::epub;
use crate::error::{DocumentError, Result};
use crate::merge;
use crate::models::{GeneratedArtifact, InvoiceRequest, ToolRequest, ToolResponse};
use crate::renderers::{LineChart, ReportRenderer};
use crate::stock::{Sample, StaticSeriesProvider, StockOutcome, StockReportPipeline, TimeSeriesProvider};
use base64::{engine::general_purpose, Engine as _};
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{error, info, warn};

const PDF_MIME: &str = "application/pdf";
const EPUB_MIME: &str = "application/epub+zip";

/// Runs CPU-bound document work on the blocking pool.
async fn run_blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| DocumentError::GenerationFailed(format!("worker task failed: {}", e)))?
}

fn artifact(filename: String, mime_type: &str, content: &[u8]) -> GeneratedArtifact {
    let mut hasher = Sha256::new();
    hasher.update(content);

    GeneratedArtifact {
        filename,
        mime_type: mime_type.to_string(),
        content_base64: general_purpose::STANDARD.encode(content),
        size_bytes: content.len(),
        sha256: hex::encode(hasher.finalize()),
    }
}

fn file_stem(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

struct EpubResult {
    bytes: Vec<u8>,
    chapters: Vec<String>,
    warnings: Vec<String>,
}

/// Dispatches a [`ToolRequest`] to the invoice, ePub or stock pipeline.
pub struct ToolHandler {
    renderer: Arc<ReportRenderer>,
    stock: Arc<StockReportPipeline>,
}

impl ToolHandler {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            renderer: Arc::new(ReportRenderer::new(config)),
            stock: Arc::new(StockReportPipeline::new(
                ReportRenderer::new(config),
                LineChart::default(),
            )),
        }
    }

    pub async fn handle_message(&self, data: &[u8]) -> ToolResponse {
        let request: ToolRequest = match serde_json::from_slice(data) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                return ToolResponse::error(
                    "unknown".to_string(),
                    "unknown",
                    format!("Invalid request format: {}", e),
                    "serialization_error",
                );
            }
        };

        self.handle_request(request).await
    }

    pub async fn handle_request(&self, request: ToolRequest) -> ToolResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        let tool = request.tool_name();

        info!(request_id = %request_id, tool, "Processing tool request");

        let result = match request {
            ToolRequest::Invoice {
                invoice,
                extra_pdfs_base64,
            } => self
                .invoice(&invoice, &extra_pdfs_base64)
                .await
                .map(|artifact| ToolResponse::success(request_id.clone(), tool, vec![artifact])),
            ToolRequest::Epub { epub_base64 } => self.epub(&epub_base64).await.map(|result| {
                let mut response = ToolResponse::success(
                    request_id.clone(),
                    tool,
                    vec![artifact("formatted_book.epub".to_string(), EPUB_MIME, &result.bytes)],
                );
                response.chapters = result.chapters;
                response.warnings = result.warnings;
                response
            }),
            ToolRequest::Stock {
                ticker,
                start,
                end,
                series,
                chart_png_base64,
            } => {
                self.stock(&request_id, &ticker, start, end, series, chart_png_base64.as_deref())
                    .await
            }
        };

        match result {
            Ok(response) => {
                info!(
                    request_id = %request_id,
                    status = %response.status,
                    artifacts = response.artifacts.len(),
                    "Tool request finished"
                );
                response
            }
            Err(e) => {
                error!(request_id = %request_id, error = %e, "Tool request failed");
                let failure = e.to_error_response();
                ToolResponse::error(request_id, tool, failure.error, &failure.error_type)
            }
        }
    }

    async fn invoice(
        &self,
        invoice: &InvoiceRequest,
        extra_pdfs_base64: &[String],
    ) -> Result<GeneratedArtifact> {
        let extras = extra_pdfs_base64
            .iter()
            .map(|encoded| general_purpose::STANDARD.decode(encoded))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let title = invoice.title();
        let items = invoice.items.clone();
        let total = invoice.total();
        let renderer = Arc::clone(&self.renderer);
        let merge_extras = !extras.is_empty();

        let pdf = run_blocking(move || {
            let invoice_pdf = renderer.render_invoice(&title, &items, total)?;
            if extras.is_empty() {
                Ok(invoice_pdf)
            } else {
                merge::merge(&invoice_pdf, &extras)
            }
        })
        .await?;

        let filename = if merge_extras { "merged_invoice.pdf" } else { "invoice.pdf" };
        Ok(artifact(filename.to_string(), PDF_MIME, &pdf))
    }

    async fn epub(&self, epub_base64: &str) -> Result<EpubResult> {
        let input = general_purpose::STANDARD.decode(epub_base64)?;

        run_blocking(move || {
            let mut container = epub::decode(&input)?;
            let chapters = container.chapter_names();
            for (index, chapter) in chapters.iter().enumerate() {
                info!(chapter = %chapter, position = index + 1, "Chapter found");
            }

            let report = epub::sanitize(&mut container);
            let warnings = report.malformed.iter().map(|e| e.to_string()).collect();
            let bytes = epub::encode(&container)?;

            Ok(EpubResult {
                bytes,
                chapters,
                warnings,
            })
        })
        .await
    }

    async fn stock(
        &self,
        request_id: &str,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        samples: Vec<Sample>,
        chart_png_base64: Option<&str>,
    ) -> Result<ToolResponse> {
        if start > end {
            return Err(DocumentError::InvalidData(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }

        let provider = StaticSeriesProvider::new(samples);
        let series = provider.closing_prices(ticker, start, end).await?;

        let chart = chart_png_base64
            .map(|encoded| general_purpose::STANDARD.decode(encoded))
            .transpose()?;
        let pipeline = Arc::clone(&self.stock);
        let symbol = ticker.to_string();

        let outcome =
            run_blocking(move || pipeline.build(&symbol, &series, chart.as_deref())).await?;

        match outcome {
            StockOutcome::Report(pdf) => Ok(ToolResponse::success(
                request_id.to_string(),
                "stock",
                vec![artifact(format!("{}_report.pdf", file_stem(ticker)), PDF_MIME, &pdf)],
            )),
            StockOutcome::NoData => {
                warn!(ticker = %ticker, %start, %end, "No data found for ticker and date range");
                Ok(ToolResponse::no_data(
                    request_id.to_string(),
                    "stock",
                    format!("No data found for {} between {} and {}", ticker, start, end),
                ))
            }
        }
    }
}

impl Default for ToolHandler {
    fn default() -> Self {
        Self::new(&RenderConfig::default())
    }
}
