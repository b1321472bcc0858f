// document-toolkit/src/stock.rs

use crate::error::Result;
use crate::renderers::{LineChart, ReportRenderer};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub date: NaiveDate,
    pub close: Decimal,
}

/// Closing prices ordered by ascending date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    samples: Vec<Sample>,
}

impl TimeSeries {
    pub fn new(mut samples: Vec<Sample>) -> Self {
        samples.sort_by_key(|s| s.date);
        Self { samples }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.samples.first().map(|s| s.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.samples.last().map(|s| s.date)
    }

    pub fn latest_close(&self) -> Option<Decimal> {
        self.samples.last().map(|s| s.close)
    }

    /// Samples with `start <= date <= end`.
    pub fn within(&self, start: NaiveDate, end: NaiveDate) -> TimeSeries {
        TimeSeries {
            samples: self
                .samples
                .iter()
                .filter(|s| s.date >= start && s.date <= end)
                .copied()
                .collect(),
        }
    }
}

/// Source of market data. Implementations may hit the network and may
/// legitimately return an empty series.
#[async_trait]
pub trait TimeSeriesProvider: Send + Sync {
    async fn closing_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<TimeSeries>;
}

/// Provider backed by samples supplied with the request.
pub struct StaticSeriesProvider {
    series: TimeSeries,
}

impl StaticSeriesProvider {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self {
            series: TimeSeries::new(samples),
        }
    }
}

#[async_trait]
impl TimeSeriesProvider for StaticSeriesProvider {
    async fn closing_prices(
        &self,
        _ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<TimeSeries> {
        Ok(self.series.within(start, end))
    }
}

#[derive(Debug)]
pub enum StockOutcome {
    Report(Vec<u8>),
    /// The requested range holds no samples; nothing was rendered.
    NoData,
}

pub struct StockReportPipeline {
    renderer: ReportRenderer,
    chart: LineChart,
}

impl StockReportPipeline {
    pub fn new(renderer: ReportRenderer, chart: LineChart) -> Self {
        Self { renderer, chart }
    }

    /// Renders the one-page report, drawing the chart unless one is supplied.
    #[instrument(skip(self, series, chart_png), fields(samples = series.len()))]
    pub fn build(
        &self,
        ticker: &str,
        series: &TimeSeries,
        chart_png: Option<&[u8]>,
    ) -> Result<StockOutcome> {
        let (start, end, latest_close) =
            match (series.first_date(), series.last_date(), series.latest_close()) {
                (Some(start), Some(end), Some(close)) => (start, end, close),
                _ => {
                    info!(ticker = %ticker, "No samples in range, skipping report");
                    return Ok(StockOutcome::NoData);
                }
            };

        let drawn;
        let chart = match chart_png {
            Some(bytes) => bytes,
            None => {
                drawn = self.chart.render(ticker, series)?;
                drawn.as_slice()
            }
        };

        let pdf = self
            .renderer
            .render_stock(ticker, start, end, latest_close, chart)?;
        Ok(StockOutcome::Report(pdf))
    }
}

impl Default for StockReportPipeline {
    fn default() -> Self {
        Self::new(ReportRenderer::default(), LineChart::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample(date: &str, close: &str) -> Sample {
        Sample {
            date: NaiveDate::from_str(date).unwrap(),
            close: Decimal::from_str(close).unwrap(),
        }
    }

    fn day(date: &str) -> NaiveDate {
        NaiveDate::from_str(date).unwrap()
    }

    #[test]
    fn series_is_sorted_by_date() {
        let series = TimeSeries::new(vec![
            sample("2024-01-03", "12.00"),
            sample("2024-01-01", "10.00"),
            sample("2024-01-02", "11.00"),
        ]);

        assert_eq!(series.first_date(), Some(day("2024-01-01")));
        assert_eq!(series.last_date(), Some(day("2024-01-03")));
        assert_eq!(series.latest_close(), Some(Decimal::from_str("12.00").unwrap()));
    }

    #[test]
    fn range_filter_is_inclusive() {
        let series = TimeSeries::new(vec![
            sample("2024-01-01", "10.00"),
            sample("2024-01-02", "11.00"),
            sample("2024-01-03", "12.00"),
        ]);

        let window = series.within(day("2024-01-02"), day("2024-01-03"));
        assert_eq!(window.len(), 2);
    }

    #[tokio::test]
    async fn static_provider_returns_empty_for_disjoint_range() {
        let provider = StaticSeriesProvider::new(vec![sample("2024-01-01", "10.00")]);
        let series = provider
            .closing_prices("AAPL", day("2025-01-01"), day("2025-02-01"))
            .await
            .unwrap();

        assert!(series.is_empty());
    }

    #[test]
    fn empty_series_signals_no_data() {
        let pipeline = StockReportPipeline::default();
        let outcome = pipeline.build("AAPL", &TimeSeries::default(), None).unwrap();

        assert!(matches!(outcome, StockOutcome::NoData));
    }

    #[test]
    fn report_is_rendered_with_builtin_chart() {
        let pipeline = StockReportPipeline::default();
        let series = TimeSeries::new(vec![
            sample("2024-01-01", "10.00"),
            sample("2024-01-02", "11.50"),
            sample("2024-01-03", "10.75"),
        ]);

        match pipeline.build("AAPL", &series, None).unwrap() {
            StockOutcome::Report(pdf) => {
                let doc = lopdf::Document::load_mem(&pdf).unwrap();
                assert_eq!(doc.get_pages().len(), 1);
            }
            StockOutcome::NoData => panic!("expected a report"),
        }
    }
}
