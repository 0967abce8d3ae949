//! Descriptive numbers over the raw training file.

use crate::dataset::{Table, Value};
use crate::schema;
use log::warn;
use std::collections::HashMap;

/// Headline figures for the raw dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub patients: usize,
    pub mean_weight_kg: Option<f64>,
    pub mean_age: Option<f64>,
    /// Label counts, most frequent first.
    pub label_counts: Vec<(String, usize)>,
}

impl DatasetSummary {
    /// Summarises a table with raw headers (`Weight`, `Age`, `Obesity`).
    /// Missing columns leave their figure empty; unparsable cells are skipped.
    pub fn from_raw(raw: &Table) -> Self {
        DatasetSummary {
            patients: raw.len(),
            mean_weight_kg: mean_of(raw, raw_header(schema::PESO_KG)),
            mean_age: mean_of(raw, raw_header(schema::IDADE)),
            label_counts: value_counts(raw, schema::RAW_LABEL),
        }
    }
}

fn raw_header(canonical: &str) -> &'static str {
    schema::feature(canonical)
        .and_then(|f| f.raw)
        .unwrap_or_default()
}

fn mean_of(raw: &Table, column: &str) -> Option<f64> {
    let cells = raw.column(column)?;
    let mut sum = 0.0;
    let mut n = 0usize;
    let mut skipped = 0usize;
    for cell in cells {
        let v = match cell {
            Value::Number(v) => Some(*v),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
        };
        match v.filter(|v| v.is_finite()) {
            Some(v) => {
                sum += v;
                n += 1;
            }
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!("skipped {skipped} non-numeric `{column}` cells");
    }
    (n > 0).then(|| sum / n as f64)
}

fn value_counts(raw: &Table, column: &str) -> Vec<(String, usize)> {
    let Some(cells) = raw.column(column) else {
        return Vec::new();
    };
    let mut counts: HashMap<String, usize> = HashMap::new();
    for cell in cells {
        let key = match cell {
            Value::Text(s) => s.clone(),
            Value::Number(v) => v.to_string(),
        };
        *counts.entry(key).or_insert(0) += 1;
    }
    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}
