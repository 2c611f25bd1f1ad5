// =============================================================================
// GA4 DATA API CLIENT
// =============================================================================
//
// Implements `AnalyticsBackend` on top of the Google Analytics Data API v1beta
// (https://developers.google.com/analytics/devguides/reporting/data/v1).
// Only `properties/{id}:runReport` is used.
//
// **Wire format notes:**
// - All dimension and metric values come back as strings, even numbers.
// - `limit` is an int64 and is sent as a JSON string.
// - When a period has no data the `rows` field is omitted entirely.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::config::PropertyId;
use crate::core::reporting::{
    AnalyticsBackend, MetricQuery, OrderBy, RawReport, RawRow, ReportError,
};
use crate::infra::google_auth::ServiceAccountAuth;

pub const ANALYTICS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";
const GA4_DATA_API: &str = "https://analyticsdata.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// =============================================================================
// REQUEST STRUCTURES
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunReportRequest {
    date_ranges: Vec<ApiDateRange>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dimensions: Vec<NamedField>,
    metrics: Vec<NamedField>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    order_bys: Vec<ApiOrderBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiDateRange {
    start_date: String,
    end_date: String,
}

#[derive(Debug, Serialize)]
struct NamedField {
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiOrderBy {
    #[serde(skip_serializing_if = "Option::is_none")]
    metric: Option<MetricOrderBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimension: Option<DimensionOrderBy>,
    desc: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MetricOrderBy {
    metric_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DimensionOrderBy {
    dimension_name: String,
}

// =============================================================================
// RESPONSE STRUCTURES
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunReportResponse {
    #[serde(default)]
    dimension_headers: Vec<Header>,
    #[serde(default)]
    metric_headers: Vec<Header>,
    #[serde(default)]
    rows: Vec<ApiRow>,
    #[serde(default)]
    row_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiRow {
    #[serde(default)]
    dimension_values: Vec<ApiValue>,
    #[serde(default)]
    metric_values: Vec<ApiValue>,
}

#[derive(Debug, Deserialize)]
struct ApiValue {
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

// =============================================================================
// CLIENT
// =============================================================================

/// Read-only GA4 Data API client authenticated with a service account.
pub struct Ga4DataClient {
    client: Client,
    auth: ServiceAccountAuth,
    base_url: String,
}

impl Ga4DataClient {
    pub fn new(auth: ServiceAccountAuth) -> Self {
        Self {
            client: Client::new(),
            auth,
            base_url: GA4_DATA_API.to_string(),
        }
    }

    fn build_request(query: &MetricQuery) -> RunReportRequest {
        let order_bys = query
            .order_by()
            .map(|order| match order {
                OrderBy::Metric { name, descending } => ApiOrderBy {
                    metric: Some(MetricOrderBy {
                        metric_name: name.clone(),
                    }),
                    dimension: None,
                    desc: *descending,
                },
                OrderBy::Dimension { name, descending } => ApiOrderBy {
                    metric: None,
                    dimension: Some(DimensionOrderBy {
                        dimension_name: name.clone(),
                    }),
                    desc: *descending,
                },
            })
            .into_iter()
            .collect();

        RunReportRequest {
            date_ranges: query
                .date_ranges()
                .iter()
                .map(|range| ApiDateRange {
                    start_date: range.start_iso(),
                    end_date: range.end_iso(),
                })
                .collect(),
            dimensions: query
                .dimensions()
                .iter()
                .map(|name| NamedField { name: name.clone() })
                .collect(),
            metrics: query
                .metrics()
                .iter()
                .map(|name| NamedField { name: name.clone() })
                .collect(),
            order_bys,
            limit: query.limit().map(|l| l.to_string()),
        }
    }

    fn into_raw_report(response: RunReportResponse) -> RawReport {
        RawReport {
            dimension_headers: response
                .dimension_headers
                .into_iter()
                .map(|h| h.name)
                .collect(),
            metric_headers: response
                .metric_headers
                .into_iter()
                .map(|h| h.name)
                .collect(),
            rows: response
                .rows
                .into_iter()
                .map(|row| RawRow {
                    dimension_values: row.dimension_values.into_iter().map(|v| v.value).collect(),
                    metric_values: row.metric_values.into_iter().map(|v| v.value).collect(),
                })
                .collect(),
        }
    }

    fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
        match serde_json::from_str::<ApiErrorResponse>(body) {
            Ok(parsed) => format!(
                "GA4 returned {} {}: {}",
                status,
                parsed.error.status.unwrap_or_default(),
                parsed.error.message
            ),
            Err(_) => format!("GA4 returned {}: {}", status, body),
        }
    }
}

#[async_trait]
impl AnalyticsBackend for Ga4DataClient {
    async fn run_report(
        &self,
        property: &PropertyId,
        query: &MetricQuery,
    ) -> Result<RawReport, ReportError> {
        let token = self
            .auth
            .get_access_token()
            .await
            .map_err(|e| ReportError::Auth(e.to_string()))?;

        let url = format!("{}/{}:runReport", self.base_url, property.resource_name());
        let request = Self::build_request(query);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .timeout(REQUEST_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| ReportError::Api(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| ReportError::Api(e.to_string()))?;
            return Err(ReportError::Api(Self::describe_error(status, &body)));
        }

        let parsed: RunReportResponse = response
            .json()
            .await
            .map_err(|e| ReportError::MalformedResponse(e.to_string()))?;

        tracing::debug!(
            "runReport on {} returned {} row(s) (rowCount={:?})",
            property.resource_name(),
            parsed.rows.len(),
            parsed.row_count
        );

        Ok(Self::into_raw_report(parsed))
    }
}
