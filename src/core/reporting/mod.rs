pub mod csv_format;
pub mod date_ranges;
pub mod insight_format;
pub mod report_models;
pub mod report_service;

pub use report_models::{MetricQuery, OrderBy, RawReport, RawRow};
pub use report_service::{AnalyticsBackend, ReportError, ReportService};
