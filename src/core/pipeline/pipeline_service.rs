// The report pipeline: resolve dates, fetch, format, optionally narrate, write.
//
// Every step is awaited in order and the first error ends the run. The
// artifact is only handed to the store once everything before it has
// succeeded, so a failed run leaves the previous artifact untouched.

use chrono::NaiveDate;
use thiserror::Error;

use crate::core::config::{ConfigError, CsvColumns, ReportConfig, ReportFlavor};
use crate::core::narrative::{GenerationError, GenerativeBackend, NarrativeService};
use crate::core::output::{ArtifactStore, OutputArtifact, StoreError};
use crate::core::reporting::csv_format::to_csv;
use crate::core::reporting::date_ranges::{self, DateRange, TRAILING_WINDOW_DAYS};
use crate::core::reporting::insight_format::{breakdown_block, kpi_block, BREAKDOWNS, KPI_METRICS};
use crate::core::reporting::report_models::MetricQueryBuilder;
use crate::core::reporting::{AnalyticsBackend, MetricQuery, OrderBy, ReportError, ReportService};

/// Row cap for the single-day page table.
const YESTERDAY_ROW_LIMIT: u32 = 100;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error(transparent)]
    Analytics(#[from] ReportError),
    #[error(transparent)]
    Narrative(#[from] GenerationError),
    #[error(transparent)]
    Io(#[from] StoreError),
}

pub struct ReportPipeline<A: AnalyticsBackend, S: ArtifactStore> {
    config: ReportConfig,
    reports: ReportService<A>,
    store: S,
}

impl<A: AnalyticsBackend, S: ArtifactStore> ReportPipeline<A, S> {
    pub fn new(config: ReportConfig, backend: A, store: S) -> Self {
        let reports = ReportService::new(backend, config.property.clone());
        Self {
            config,
            reports,
            store,
        }
    }

    /// Runs the configured flavor for `today` and returns the written path.
    ///
    /// `narrative` is required by flavors that narrate and ignored otherwise.
    pub async fn run<G: GenerativeBackend>(
        &self,
        today: NaiveDate,
        narrative: Option<&NarrativeService<G>>,
    ) -> Result<std::path::PathBuf, PipelineError> {
        tracing::info!(
            "Running {} report for {} (run date {})",
            self.config.flavor.as_str(),
            self.config.property.resource_name(),
            today
        );

        let contents = match self.config.flavor {
            ReportFlavor::MonthlyInsights => {
                let narrative = narrative.ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;
                self.monthly_insights(today, narrative).await?
            }
            ReportFlavor::Trailing90Days | ReportFlavor::Yesterday => self.csv_table(today).await?,
        };

        let artifact = OutputArtifact {
            file_name: self.config.flavor.output_file_name(),
            contents,
        };
        let path = self.store.write(&artifact).await?;

        tracing::info!("Wrote {} ({} bytes)", path.display(), artifact.contents.len());
        Ok(path)
    }

    /// KPI comparison plus top-N breakdowns, narrated.
    async fn monthly_insights<G: GenerativeBackend>(
        &self,
        today: NaiveDate,
        narrative: &NarrativeService<G>,
    ) -> Result<String, PipelineError> {
        let months = date_ranges::month_over_month(today);
        tracing::info!("Comparing {} against {}", months.current, months.previous);

        let current = self.kpi_totals(months.current).await?;
        let previous = self.kpi_totals(months.previous).await?;
        let mut data_block = kpi_block(&months, &current, &previous);

        for breakdown in BREAKDOWNS.iter() {
            let query = build(
                MetricQuery::builder()
                    .dimension(breakdown.dimension)
                    .metric(breakdown.metric)
                    .date_range(months.current)
                    .order_by(OrderBy::Metric {
                        name: breakdown.metric.to_string(),
                        descending: true,
                    })
                    .limit(self.config.top_n as u32),
            )?;
            let result = self.reports.fetch(&query).await?;
            data_block.push_str(&breakdown_block(breakdown, &result, self.config.top_n));
        }

        tracing::debug!("Narrative data block:\n{}", data_block);

        let generated = narrative.generate(&data_block).await?;
        tracing::info!(
            "Narrative generated by {} ({} chars)",
            generated.model,
            generated.text.len()
        );
        Ok(generated.text)
    }

    async fn kpi_totals(&self, range: DateRange) -> Result<Vec<f64>, PipelineError> {
        let query = build(
            MetricQuery::builder()
                .metrics(KPI_METRICS.iter().map(|kpi| kpi.name))
                .date_range(range),
        )?;
        Ok(self.reports.fetch(&query).await?.first_row_totals())
    }

    /// One flat table for the CSV flavors.
    async fn csv_table(&self, today: NaiveDate) -> Result<String, PipelineError> {
        let columns = self
            .config
            .csv_columns
            .as_ref()
            .ok_or(ConfigError::Missing("GA4_CSV_METRICS"))?;

        let (range, order, limit) = match self.config.flavor {
            ReportFlavor::Yesterday => (
                date_ranges::yesterday(today),
                first_metric_descending(columns, "screenPageViews"),
                Some(YESTERDAY_ROW_LIMIT),
            ),
            _ => (
                date_ranges::trailing_days(today, TRAILING_WINDOW_DAYS),
                date_ascending(columns),
                None,
            ),
        };
        tracing::info!("Fetching {} for {}", columns.metrics.join(","), range);

        let mut builder = MetricQuery::builder()
            .dimensions(columns.dimensions.iter().cloned())
            .metrics(columns.metrics.iter().cloned())
            .date_range(range);
        if let Some(order) = order {
            builder = builder.order_by(order);
        }
        if let Some(limit) = limit {
            builder = builder.limit(limit);
        }

        let result = self.reports.fetch(&build(builder)?).await?;
        Ok(to_csv(&result))
    }
}

fn build(builder: MetricQueryBuilder) -> Result<MetricQuery, ReportError> {
    builder.build().map_err(ReportError::InvalidQuery)
}

/// Chronological order when the table has a `date` column.
fn date_ascending(columns: &CsvColumns) -> Option<OrderBy> {
    columns
        .dimensions
        .iter()
        .any(|d| d == "date")
        .then(|| OrderBy::Dimension {
            name: "date".to_string(),
            descending: false,
        })
}

/// Orders by `preferred` if selected, else by the first metric.
fn first_metric_descending(columns: &CsvColumns, preferred: &str) -> Option<OrderBy> {
    let name = if columns.metrics.iter().any(|m| m == preferred) {
        preferred
    } else {
        columns.metrics.first()?.as_str()
    };
    Some(OrderBy::Metric {
        name: name.to_string(),
        descending: true,
    })
}
