// Domain models for analytics reports.
//
// These are independent of the GA4 wire format. The infra client maps its
// JSON into `RawReport`; the report service validates that into
// `ReportResult`, which is what the formatters consume.

use super::date_ranges::DateRange;

/// How the backend should sort the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderBy {
    Metric { name: String, descending: bool },
    Dimension { name: String, descending: bool },
}

/// An immutable analytics query. Build it with [`MetricQuery::builder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricQuery {
    dimensions: Vec<String>,
    metrics: Vec<String>,
    date_ranges: Vec<DateRange>,
    order_by: Option<OrderBy>,
    limit: Option<u32>,
}

impl MetricQuery {
    pub fn builder() -> MetricQueryBuilder {
        MetricQueryBuilder::default()
    }

    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    pub fn date_ranges(&self) -> &[DateRange] {
        &self.date_ranges
    }

    pub fn order_by(&self) -> Option<&OrderBy> {
        self.order_by.as_ref()
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }
}

#[derive(Debug, Default)]
pub struct MetricQueryBuilder {
    dimensions: Vec<String>,
    metrics: Vec<String>,
    date_ranges: Vec<DateRange>,
    order_by: Option<OrderBy>,
    limit: Option<u32>,
}

impl MetricQueryBuilder {
    pub fn dimension(mut self, name: impl Into<String>) -> Self {
        self.dimensions.push(name.into());
        self
    }

    pub fn dimensions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dimensions.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn metric(mut self, name: impl Into<String>) -> Self {
        self.metrics.push(name.into());
        self
    }

    pub fn metrics<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_ranges.push(range);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by = Some(order);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Finishes the query. Needs at least one metric and one or two date
    /// ranges.
    pub fn build(self) -> Result<MetricQuery, String> {
        if self.metrics.is_empty() {
            return Err("a query needs at least one metric".to_string());
        }
        if self.date_ranges.is_empty() || self.date_ranges.len() > 2 {
            return Err(format!(
                "a query takes one or two date ranges, got {}",
                self.date_ranges.len()
            ));
        }

        Ok(MetricQuery {
            dimensions: self.dimensions,
            metrics: self.metrics,
            date_ranges: self.date_ranges,
            order_by: self.order_by,
            limit: self.limit,
        })
    }
}

/// Untyped report exactly as the backend returned it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawReport {
    pub dimension_headers: Vec<String>,
    pub metric_headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub dimension_values: Vec<String>,
    pub metric_values: Vec<String>,
}

/// A metric cell: the backend's string plus its parsed value.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricValue {
    raw: String,
    value: f64,
}

impl MetricValue {
    pub fn parse(raw: &str) -> Option<Self> {
        let value = raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
        Some(Self {
            raw: raw.to_string(),
            value,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

/// A validated report row. Values follow the header order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub dimension_values: Vec<String>,
    pub metric_values: Vec<MetricValue>,
}

/// Validated rows plus header names, in backend order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportResult {
    pub dimension_headers: Vec<String>,
    pub metric_headers: Vec<String>,
    pub rows: Vec<ReportRow>,
}

impl ReportResult {
    pub fn metric_index(&self, name: &str) -> Option<usize> {
        self.metric_headers.iter().position(|h| h == name)
    }

    /// Metric values of the first row, or zeros when the backend returned
    /// no rows (GA4 omits rows for periods without data).
    pub fn first_row_totals(&self) -> Vec<f64> {
        match self.rows.first() {
            Some(row) => row.metric_values.iter().map(MetricValue::value).collect(),
            None => vec![0.0; self.metric_headers.len()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn range() -> DateRange {
        let day = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        DateRange::new(day, day).unwrap()
    }

    #[test]
    fn test_builder_requires_metric() {
        let err = MetricQuery::builder().date_range(range()).build().unwrap_err();
        assert!(err.contains("metric"));
    }

    #[test]
    fn test_builder_limits_date_ranges() {
        assert!(MetricQuery::builder().metric("sessions").build().is_err());

        let three = MetricQuery::builder()
            .metric("sessions")
            .date_range(range())
            .date_range(range())
            .date_range(range())
            .build();
        assert!(three.is_err());

        let two = MetricQuery::builder()
            .metric("sessions")
            .date_range(range())
            .date_range(range())
            .build()
            .unwrap();
        assert_eq!(two.date_ranges().len(), 2);
    }

    #[test]
    fn test_builder_keeps_order() {
        let query = MetricQuery::builder()
            .dimensions(["b", "a"])
            .metrics(["sessions", "totalUsers"])
            .date_range(range())
            .limit(5)
            .build()
            .unwrap();

        assert_eq!(query.dimensions(), ["b", "a"]);
        assert_eq!(query.metrics(), ["sessions", "totalUsers"]);
        assert_eq!(query.limit(), Some(5));
        assert!(query.order_by().is_none());
    }

    #[test]
    fn test_metric_value_parse() {
        let value = MetricValue::parse("0.6523").unwrap();
        assert_eq!(value.raw(), "0.6523");
        assert!((value.value() - 0.6523).abs() < f64::EPSILON);

        assert!(MetricValue::parse("").is_none());
        assert!(MetricValue::parse("n/a").is_none());
        assert!(MetricValue::parse("NaN").is_none());
    }

    #[test]
    fn test_first_row_totals_defaults_to_zero() {
        let result = ReportResult {
            dimension_headers: vec![],
            metric_headers: vec!["sessions".into(), "totalUsers".into()],
            rows: vec![],
        };
        assert_eq!(result.first_row_totals(), vec![0.0, 0.0]);
        assert_eq!(result.metric_index("totalUsers"), Some(1));
        assert_eq!(result.metric_index("conversions"), None);
    }
}
