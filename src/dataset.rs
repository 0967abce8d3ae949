//! Training-side data stages: load, rename, coerce, derive, split.

use crate::error::{ObesityError, Result};
use crate::predictor::derive_bmi;
use crate::schema::{self, FeatureKind};
use log::{debug, info};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
}

impl Value {
    /// The number held, `None` for text.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            Value::Text(_) => None,
        }
    }

    /// The text held, `None` for numbers.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Number(_) => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

/// Named columns over row-major cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Empty table with the given header.
    pub fn new(columns: Vec<String>) -> Self {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    /// Appends a row; its width must match the header.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(ObesityError::SchemaMismatch(format!(
                "row has {} values for {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cells of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| &r[idx]))
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Copies the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}

/// What to do with fractional values in nominally integer columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntCoercion {
    /// Drop the fractional part, `2.7` becomes `2`.
    #[default]
    Truncate,
    /// Refuse non-integral values with a coercion error.
    Strict,
}

/// Reads the raw training file. Every cell is kept as trimmed text.
pub fn load_dataset(path: &Path) -> Result<Table> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ObesityError::DatasetNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    let mut rdr = csv::Reader::from_reader(BufReader::new(file));

    let columns = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut table = Table::new(columns);

    for result in rdr.records() {
        let record = result?;
        table.push_row(record.iter().map(|c| Value::from(c.trim())).collect())?;
    }

    info!("loaded {} rows from {:?}", table.len(), path);
    Ok(table)
}

/// Projects the raw table onto canonical names. Unmapped raw columns are
/// dropped; a mapped raw column missing from the file is a schema mismatch.
pub fn rename_to_canonical(raw: &Table, column_map: &[(&str, &str)]) -> Result<Table> {
    let mut sources = Vec::with_capacity(column_map.len());
    for (raw_name, _) in column_map {
        let idx = raw.column_index(raw_name).ok_or_else(|| {
            ObesityError::SchemaMismatch(format!("raw column `{raw_name}` missing from dataset"))
        })?;
        sources.push(idx);
    }

    for col in &raw.columns {
        if !column_map.iter().any(|(r, _)| r == col) {
            debug!("dropping unmapped raw column `{col}`");
        }
    }

    Ok(Table {
        columns: column_map.iter().map(|(_, c)| c.to_string()).collect(),
        rows: raw
            .rows
            .iter()
            .map(|row| sources.iter().map(|&i| row[i].clone()).collect())
            .collect(),
    })
}

/// Parses every numeric feature present in `table`, and forces the columns in
/// `int_columns` to whole numbers according to `policy`.
pub fn coerce_numeric_types(
    mut table: Table,
    int_columns: &[&str],
    policy: IntCoercion,
) -> Result<Table> {
    let targets: Vec<(usize, &str, bool)> = table
        .columns
        .iter()
        .enumerate()
        .filter_map(|(i, name)| {
            let spec = schema::feature(name)?;
            (spec.kind == FeatureKind::Numeric)
                .then(|| (i, spec.name, int_columns.contains(&spec.name)))
        })
        .collect();

    let mut truncated = 0usize;
    for (row_idx, row) in table.rows.iter_mut().enumerate() {
        for &(i, column, integral) in &targets {
            let value = match &row[i] {
                Value::Number(v) => *v,
                Value::Text(s) => parse_number(s).ok_or_else(|| ObesityError::TypeCoercion {
                    column: column.to_string(),
                    row: row_idx,
                    value: s.clone(),
                })?,
            };
            let value = if integral && value.fract() != 0.0 {
                match policy {
                    IntCoercion::Truncate => {
                        truncated += 1;
                        value.trunc()
                    }
                    IntCoercion::Strict => {
                        return Err(ObesityError::TypeCoercion {
                            column: column.to_string(),
                            row: row_idx,
                            value: value.to_string(),
                        });
                    }
                }
            } else {
                value
            };
            row[i] = Value::Number(value);
        }
    }

    if truncated > 0 {
        debug!("truncated {truncated} fractional values in integer columns");
    }
    Ok(table)
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Appends (or recomputes) `imc` from the weight and height columns.
pub fn derive_features(mut table: Table) -> Result<Table> {
    let weight = required(&table, schema::PESO_KG)?;
    let height = required(&table, schema::ALTURA_M)?;

    let mut bmi = Vec::with_capacity(table.len());
    for (row_idx, row) in table.rows.iter().enumerate() {
        let w = numeric_cell(&row[weight], schema::PESO_KG, row_idx)?;
        let h = numeric_cell(&row[height], schema::ALTURA_M, row_idx)?;
        bmi.push(derive_bmi(w, h)?);
    }

    match table.column_index(schema::IMC) {
        Some(idx) => {
            for (row, v) in table.rows.iter_mut().zip(bmi) {
                row[idx] = Value::Number(v);
            }
        }
        None => {
            table.columns.push(schema::IMC.to_string());
            for (row, v) in table.rows.iter_mut().zip(bmi) {
                row.push(Value::Number(v));
            }
        }
    }
    Ok(table)
}

fn required(table: &Table, name: &str) -> Result<usize> {
    table
        .column_index(name)
        .ok_or_else(|| ObesityError::SchemaMismatch(format!("column `{name}` missing")))
}

fn numeric_cell(value: &Value, column: &str, row: usize) -> Result<f64> {
    value.as_number().ok_or_else(|| {
        ObesityError::SchemaMismatch(format!(
            "column `{column}` row {row} is not numeric; coerce types first"
        ))
    })
}

/// Separates the label column. `X` holds exactly the canonical features in
/// schema order.
pub fn split_features_label(table: &Table) -> Result<(Table, Vec<String>)> {
    let label_idx = required(table, schema::LABEL)?;
    let names = schema::feature_names();
    let sources = names
        .iter()
        .map(|n| required(table, n))
        .collect::<Result<Vec<_>>>()?;

    let mut x = Table::new(names);
    let mut y = Vec::with_capacity(table.len());
    for (row_idx, row) in table.rows.iter().enumerate() {
        let label = row[label_idx].as_text().ok_or_else(|| {
            ObesityError::SchemaMismatch(format!("label at row {row_idx} is not text"))
        })?;
        y.push(label.to_string());
        x.push_row(sources.iter().map(|&i| row[i].clone()).collect())?;
    }
    Ok((x, y))
}

/// A helper type for holding train/test splits.
#[derive(Debug)]
pub struct DatasetSplit {
    pub x_train: Table,
    pub y_train: Vec<String>,
    pub x_test: Table,
    pub y_test: Vec<String>,
}

/// Shuffles with a seeded RNG and holds out `ceil(n * test_ratio)` rows.
pub fn train_test_split(
    x: &Table,
    y: &[String],
    test_ratio: f64,
    seed: u64,
) -> Result<DatasetSplit> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(ObesityError::InvalidInput(format!(
            "test ratio must be in (0, 1), got {test_ratio}"
        )));
    }
    if x.len() != y.len() {
        return Err(ObesityError::SchemaMismatch(format!(
            "{} feature rows but {} labels",
            x.len(),
            y.len()
        )));
    }

    let n = x.len();
    let test_size = ((n as f64) * test_ratio).ceil() as usize;
    if test_size == 0 || test_size >= n {
        return Err(ObesityError::Training(format!(
            "{n} rows are not enough for a {test_ratio} hold-out"
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);
    let (test, train) = indices.split_at(test_size);

    Ok(DatasetSplit {
        x_train: x.select_rows(train),
        y_train: train.iter().map(|&i| y[i].clone()).collect(),
        x_test: x.select_rows(test),
        y_test: test.iter().map(|&i| y[i].clone()).collect(),
    })
}
