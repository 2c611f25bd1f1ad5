// Report fetching: the boundary between the analytics backend and the rest
// of the pipeline. The backend hands back loosely typed rows; they are
// validated here, once, so schema drift surfaces as a single error instead
// of a panic deep inside a formatter.

use async_trait::async_trait;
use thiserror::Error;

use super::report_models::{MetricQuery, MetricValue, RawReport, ReportResult, ReportRow};
use crate::core::config::PropertyId;

/// Errors raised while fetching a report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Analytics API error: {0}")]
    Api(String),
    #[error("Analytics authentication failed: {0}")]
    Auth(String),
    #[error("Malformed analytics response: {0}")]
    MalformedResponse(String),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Read-only access to an analytics backend.
#[async_trait]
pub trait AnalyticsBackend: Send + Sync {
    /// Runs one report request. No pagination: the result must fit a single
    /// response.
    async fn run_report(
        &self,
        property: &PropertyId,
        query: &MetricQuery,
    ) -> Result<RawReport, ReportError>;
}

pub struct ReportService<A: AnalyticsBackend> {
    backend: A,
    property: PropertyId,
}

impl<A: AnalyticsBackend> ReportService<A> {
    pub fn new(backend: A, property: PropertyId) -> Self {
        Self { backend, property }
    }

    /// Runs `query` and validates the response into typed rows.
    pub async fn fetch(&self, query: &MetricQuery) -> Result<ReportResult, ReportError> {
        tracing::debug!(
            "Running report on {}: dimensions={:?} metrics={:?} ranges={}",
            self.property.resource_name(),
            query.dimensions(),
            query.metrics(),
            query.date_ranges().len()
        );

        let raw = self.backend.run_report(&self.property, query).await?;
        let result = validate_report(query, raw)?;

        tracing::debug!("Report returned {} row(s)", result.rows.len());
        Ok(result)
    }
}

/// Checks headers and every row against the query, rejecting the whole
/// response on the first mismatch.
pub fn validate_report(query: &MetricQuery, raw: RawReport) -> Result<ReportResult, ReportError> {
    if raw.metric_headers != query.metrics() {
        return Err(ReportError::MalformedResponse(format!(
            "expected metric headers {:?}, got {:?}",
            query.metrics(),
            raw.metric_headers
        )));
    }

    // GA4 appends a `dateRange` dimension when two ranges are requested.
    let requested = query.dimensions();
    if raw.dimension_headers.len() < requested.len()
        || raw.dimension_headers[..requested.len()] != *requested
    {
        return Err(ReportError::MalformedResponse(format!(
            "expected dimension headers {:?}, got {:?}",
            requested, raw.dimension_headers
        )));
    }

    let dimension_count = raw.dimension_headers.len();
    let metric_count = raw.metric_headers.len();

    let rows = raw
        .rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| {
            if row.dimension_values.len() != dimension_count
                || row.metric_values.len() != metric_count
            {
                return Err(ReportError::MalformedResponse(format!(
                    "row {} has {} dimension and {} metric value(s), headers have {} and {}",
                    index,
                    row.dimension_values.len(),
                    row.metric_values.len(),
                    dimension_count,
                    metric_count
                )));
            }

            let metric_values = row
                .metric_values
                .iter()
                .map(|raw_value| {
                    MetricValue::parse(raw_value).ok_or_else(|| {
                        ReportError::MalformedResponse(format!(
                            "row {} has non-numeric metric value '{}'",
                            index, raw_value
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            Ok(ReportRow {
                dimension_values: row.dimension_values,
                metric_values,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ReportResult {
        dimension_headers: raw.dimension_headers,
        metric_headers: raw.metric_headers,
        rows,
    })
}
