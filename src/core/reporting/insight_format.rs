// Narrative-text formatting: turns report results into the labeled data
// block that is embedded in the LLM prompt. The block is also readable on
// its own, so headings and units are spelled out.

use std::fmt::Write as _;

use super::date_ranges::MonthComparison;
use super::report_models::{ReportResult, ReportRow};

/// Shown instead of a ratio when the previous period is zero.
pub const NO_PRIOR_PERIOD: &str = "no prior-period data";

/// How a metric value is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Whole numbers (sessions, users, views).
    Count,
    /// Ratios in 0..1, shown as a percentage with one decimal.
    Percentage,
    /// Seconds, shown with one decimal and a unit suffix.
    Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct KpiMetric {
    /// GA4 API metric name.
    pub name: &'static str,
    pub label: &'static str,
    pub kind: MetricKind,
}

/// KPIs compared month over month, in report order.
pub const KPI_METRICS: [KpiMetric; 8] = [
    KpiMetric {
        name: "sessions",
        label: "Sessions",
        kind: MetricKind::Count,
    },
    KpiMetric {
        name: "totalUsers",
        label: "Total users",
        kind: MetricKind::Count,
    },
    KpiMetric {
        name: "newUsers",
        label: "New users",
        kind: MetricKind::Count,
    },
    KpiMetric {
        name: "screenPageViews",
        label: "Page views",
        kind: MetricKind::Count,
    },
    KpiMetric {
        name: "engagedSessions",
        label: "Engaged sessions",
        kind: MetricKind::Count,
    },
    KpiMetric {
        name: "averageSessionDuration",
        label: "Average engagement time (seconds)",
        kind: MetricKind::Duration,
    },
    KpiMetric {
        name: "engagementRate",
        label: "Engagement rate",
        kind: MetricKind::Percentage,
    },
    KpiMetric {
        name: "conversions",
        label: "Key events (CV)",
        kind: MetricKind::Count,
    },
];

/// A top-N breakdown of one dimension by one metric.
#[derive(Debug, Clone, Copy)]
pub struct Breakdown {
    pub title: &'static str,
    pub dimension: &'static str,
    pub metric: &'static str,
    pub unit: &'static str,
}

pub const BREAKDOWNS: [Breakdown; 2] = [
    Breakdown {
        title: "Landing pages",
        dimension: "landingPagePlusQueryString",
        metric: "sessions",
        unit: "sessions",
    },
    Breakdown {
        title: "Source / medium",
        dimension: "sessionSourceMedium",
        metric: "sessions",
        unit: "sessions",
    },
];

/// Current value as a percentage of the previous one, e.g. `120.0%`.
pub fn period_ratio(current: f64, previous: f64) -> String {
    if previous == 0.0 {
        return NO_PRIOR_PERIOD.to_string();
    }
    format!("{:.1}%", current / previous * 100.0)
}

pub fn render_value(kind: MetricKind, value: f64) -> String {
    match kind {
        MetricKind::Count => format!("{}", value.trunc() as i64),
        MetricKind::Percentage => format!("{:.1}%", value * 100.0),
        MetricKind::Duration => format!("{:.1}s", value),
    }
}

/// Month-over-month KPI block. `current` and `previous` hold one value per
/// entry of [`KPI_METRICS`]; missing values count as zero.
pub fn kpi_block(months: &MonthComparison, current: &[f64], previous: &[f64]) -> String {
    let mut out = format!(
        "## KPI comparison: last month ({}) vs previous month ({})\n",
        months.current.start().format("%B %Y"),
        months.previous.start().format("%B %Y")
    );

    for (i, metric) in KPI_METRICS.iter().enumerate() {
        let now = current.get(i).copied().unwrap_or(0.0);
        let before = previous.get(i).copied().unwrap_or(0.0);
        let _ = writeln!(
            out,
            "- {}: {} (MoM: {})",
            metric.label,
            render_value(metric.kind, now),
            period_ratio(now, before)
        );
    }

    out
}

/// The `limit` rows with the highest value of the metric at `metric_index`,
/// highest first. Rows with equal values keep their original order.
pub fn rank_top_n(rows: &[ReportRow], metric_index: usize, limit: usize) -> Vec<&ReportRow> {
    let value_of = |row: &ReportRow| {
        row.metric_values
            .get(metric_index)
            .map(|m| m.value())
            .unwrap_or(0.0)
    };

    let mut ranked: Vec<&ReportRow> = rows.iter().collect();
    // `sort_by` is stable, so ties stay in response order.
    ranked.sort_by(|a, b| value_of(b).total_cmp(&value_of(a)));
    ranked.truncate(limit);
    ranked
}

/// Numbered top-N list for one breakdown.
pub fn breakdown_block(breakdown: &Breakdown, result: &ReportResult, limit: usize) -> String {
    let mut out = format!("\n## Top {} {}\n", limit, breakdown.title.to_lowercase());

    let Some(metric_index) = result.metric_index(breakdown.metric) else {
        let _ = writeln!(out, "(no {} data)", breakdown.metric);
        return out;
    };

    let ranked = rank_top_n(&result.rows, metric_index, limit);
    if ranked.is_empty() {
        out.push_str("(no data for this period)\n");
    }

    for (i, row) in ranked.iter().enumerate() {
        let label = row
            .dimension_values
            .first()
            .map(String::as_str)
            .unwrap_or("(not set)");
        let _ = writeln!(
            out,
            "{}. {} ({} {})",
            i + 1,
            label,
            row.metric_values[metric_index].raw(),
            breakdown.unit
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reporting::date_ranges::month_over_month;
    use crate::core::reporting::report_models::MetricValue;
    use chrono::NaiveDate;

    fn row(label: &str, sessions: &str) -> ReportRow {
        ReportRow {
            dimension_values: vec![label.to_string()],
            metric_values: vec![MetricValue::parse(sessions).unwrap()],
        }
    }

    fn sessions_result(rows: Vec<ReportRow>) -> ReportResult {
        ReportResult {
            dimension_headers: vec!["sessionSourceMedium".into()],
            metric_headers: vec!["sessions".into()],
            rows,
        }
    }

    #[test]
    fn test_period_ratio() {
        assert_eq!(period_ratio(120.0, 100.0), "120.0%");
        assert_eq!(period_ratio(1.0, 3.0), "33.3%");
        assert_eq!(period_ratio(0.0, 10.0), "0.0%");
    }

    #[test]
    fn test_period_ratio_without_prior_data() {
        assert_eq!(period_ratio(50.0, 0.0), NO_PRIOR_PERIOD);
        assert_eq!(period_ratio(0.0, 0.0), NO_PRIOR_PERIOD);
    }

    #[test]
    fn test_render_value_by_kind() {
        assert_eq!(render_value(MetricKind::Count, 1234.9), "1234");
        assert_eq!(render_value(MetricKind::Percentage, 0.6523), "65.2%");
        assert_eq!(render_value(MetricKind::Duration, 87.26), "87.3s");
    }

    #[test]
    fn test_rank_top_n_keeps_response_order_for_ties() {
        let rows = vec![
            row("a", "30"),
            row("b", "50"),
            row("c", "10"),
            row("d", "50"),
            row("e", "5"),
        ];

        let ranked: Vec<&str> = rank_top_n(&rows, 0, 3)
            .iter()
            .map(|r| r.dimension_values[0].as_str())
            .collect();

        assert_eq!(ranked, vec!["b", "d", "a"]);
    }

    #[test]
    fn test_rank_top_n_with_fewer_rows_than_limit() {
        let rows = vec![row("a", "1"), row("b", "2")];
        assert_eq!(rank_top_n(&rows, 0, 5).len(), 2);
    }

    #[test]
    fn test_kpi_block() {
        let months = month_over_month(NaiveDate::from_ymd_opt(2025, 10, 18).unwrap());
        let current = [120.0, 90.0, 40.0, 300.0, 70.0, 95.5, 0.583, 6.0];
        let previous = [100.0, 90.0, 0.0, 250.0, 70.0, 100.0, 0.5, 3.0];

        let block = kpi_block(&months, &current, &previous);

        assert!(block.starts_with(
            "## KPI comparison: last month (September 2025) vs previous month (August 2025)\n"
        ));
        assert!(block.contains("- Sessions: 120 (MoM: 120.0%)\n"));
        assert!(block.contains("- New users: 40 (MoM: no prior-period data)\n"));
        assert!(block.contains("- Average engagement time (seconds): 95.5s (MoM: 95.5%)\n"));
        assert!(block.contains("- Engagement rate: 58.3% (MoM: 116.6%)\n"));
        assert!(block.contains("- Key events (CV): 6 (MoM: 200.0%)\n"));
        assert_eq!(block.lines().count(), 1 + KPI_METRICS.len());
    }

    #[test]
    fn test_kpi_block_with_empty_periods() {
        let months = month_over_month(NaiveDate::from_ymd_opt(2025, 1, 5).unwrap());
        let block = kpi_block(&months, &[], &[]);

        assert!(block.contains("December 2024"));
        assert!(block.contains("- Sessions: 0 (MoM: no prior-period data)"));
    }

    #[test]
    fn test_breakdown_block() {
        let result = sessions_result(vec![
            row("google / organic", "30"),
            row("t.co / referral", "50"),
            row("(direct) / (none)", "10"),
        ]);

        let block = breakdown_block(&BREAKDOWNS[1], &result, 2);

        assert_eq!(
            block,
            "\n## Top 2 source / medium\n1. t.co / referral (50 sessions)\n2. google / organic (30 sessions)\n"
        );
    }

    #[test]
    fn test_breakdown_block_without_rows() {
        let block = breakdown_block(&BREAKDOWNS[0], &sessions_result(vec![]), 5);
        assert!(block.contains("## Top 5 landing pages"));
        assert!(block.contains("(no data for this period)"));
    }
}
