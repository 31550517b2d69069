// Table renderer - Tabular history for the detail view
use crate::domain::telemetry::{MetricSpec, Sample};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableView {
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub timestamp: String,
    pub cells: Vec<String>,
}

/// Newest reading first; one formatted cell per metric.
pub fn render_table(specs: &[MetricSpec], samples: &[Sample]) -> TableView {
    let mut columns = vec!["Timestamp".to_string()];
    columns.extend(specs.iter().map(MetricSpec::title));

    let rows = samples
        .iter()
        .rev()
        .map(|sample| TableRow {
            timestamp: sample.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            cells: specs
                .iter()
                .map(|spec| spec.format_value(sample.value(spec.key)))
                .collect(),
        })
        .collect();

    TableView { columns, rows }
}
