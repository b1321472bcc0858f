// document-toolkit/src/models.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::stock::Sample;

/// One billable invoice row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub price: Decimal,
}

impl LineItem {
    pub fn new(description: impl Into<String>, price: Decimal) -> Self {
        Self {
            description: description.into(),
            price,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub client_name: String,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

impl InvoiceRequest {
    /// Sum of every item price. Always derived from `items`.
    pub fn total(&self) -> Decimal {
        self.items.iter().map(|item| item.price).sum()
    }

    pub fn title(&self) -> String {
        format!("Invoice for {}", self.client_name)
    }
}

/// Request accepted by the tool dispatcher, one variant per tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolRequest {
    Invoice {
        #[serde(flatten)]
        invoice: InvoiceRequest,
        /// Extra PDFs appended after the invoice page, base64 encoded.
        #[serde(default)]
        extra_pdfs_base64: Vec<String>,
    },
    Epub {
        epub_base64: String,
    },
    Stock {
        ticker: String,
        start: NaiveDate,
        end: NaiveDate,
        #[serde(default)]
        series: Vec<Sample>,
        /// Pre-rendered chart; the built-in line chart is drawn when absent.
        #[serde(default)]
        chart_png_base64: Option<String>,
    },
}

impl ToolRequest {
    pub fn tool_name(&self) -> &'static str {
        match self {
            ToolRequest::Invoice { .. } => "invoice",
            ToolRequest::Epub { .. } => "epub",
            ToolRequest::Stock { .. } => "stock",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub filename: String,
    pub mime_type: String,
    pub content_base64: String,
    pub size_bytes: usize,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    pub request_id: String,
    pub tool: String,
    pub status: String,
    pub artifacts: Vec<GeneratedArtifact>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chapters: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl ToolResponse {
    pub fn success(request_id: String, tool: &str, artifacts: Vec<GeneratedArtifact>) -> Self {
        Self {
            request_id,
            tool: tool.to_string(),
            status: "success".to_string(),
            artifacts,
            chapters: vec![],
            warnings: vec![],
            error: None,
            error_type: None,
            generated_at: Utc::now(),
        }
    }

    /// The query behind the request matched nothing; not a failure.
    pub fn no_data(request_id: String, tool: &str, message: String) -> Self {
        Self {
            request_id,
            tool: tool.to_string(),
            status: "no_data".to_string(),
            artifacts: vec![],
            chapters: vec![],
            warnings: vec![message],
            error: None,
            error_type: None,
            generated_at: Utc::now(),
        }
    }

    pub fn error(request_id: String, tool: &str, error: String, error_type: &str) -> Self {
        Self {
            request_id,
            tool: tool.to_string(),
            status: "error".to_string(),
            artifacts: vec![],
            chapters: vec![],
            warnings: vec![],
            error: Some(error),
            error_type: Some(error_type.to_string()),
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    #[test]
    fn total_follows_items() {
        let mut request = InvoiceRequest {
            client_name: "Acme".to_string(),
            items: vec![
                LineItem::new("Widget", dec("19.99")),
                LineItem::new("Gadget", dec("5.00")),
            ],
        };
        assert_eq!(request.total(), dec("24.99"));

        request.items.push(LineItem::new("Widget", dec("0.01")));
        assert_eq!(request.total(), dec("25.00"));
    }

    #[test]
    fn empty_invoice_totals_zero() {
        let request = InvoiceRequest {
            client_name: "Nobody".to_string(),
            items: vec![],
        };
        assert_eq!(request.total(), Decimal::ZERO);
    }

    #[test]
    fn invoice_request_parses_tagged_json() {
        let json = r#"{
            "tool": "invoice",
            "client_name": "Acme",
            "items": [{"description": "Widget", "price": "19.99"}]
        }"#;

        let request: ToolRequest = serde_json::from_str(json).unwrap();
        match request {
            ToolRequest::Invoice {
                invoice,
                extra_pdfs_base64,
            } => {
                assert_eq!(invoice.client_name, "Acme");
                assert_eq!(invoice.items.len(), 1);
                assert!(extra_pdfs_base64.is_empty());
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn stock_request_parses_dates_and_samples() {
        let json = r#"{
            "tool": "stock",
            "ticker": "MSFT",
            "start": "2024-01-01",
            "end": "2024-01-31",
            "series": [{"date": "2024-01-02", "close": "370.87"}]
        }"#;

        let request: ToolRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.tool_name(), "stock");
    }
}
