use super::report_models::ReportResult;

/// Renders a report as CSV: one header line with the dimension then metric
/// names, then one line per row with the raw backend values.
pub fn to_csv(result: &ReportResult) -> String {
    let mut out = String::new();

    let header: Vec<String> = result
        .dimension_headers
        .iter()
        .chain(result.metric_headers.iter())
        .map(|name| csv_escape(name))
        .collect();
    out.push_str(&header.join(","));
    out.push('\n');

    for row in &result.rows {
        let fields: Vec<String> = row
            .dimension_values
            .iter()
            .map(|v| csv_escape(v))
            .chain(row.metric_values.iter().map(|m| csv_escape(m.raw())))
            .collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }

    out
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
