//! Column-wise preprocessing: standard scaling for numeric columns and
//! one-hot encoding for categorical ones, fitted on training rows only.

use crate::dataset::{Table, Value};
use crate::error::{ObesityError, Result};
use log::debug;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Zero mean, unit variance using the population standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: f64,
    pub scale: f64,
}

impl StandardScaler {
    /// Learns mean and spread of one column.
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(ObesityError::Training(
                "cannot fit a scaler on zero rows".into(),
            ));
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        // Constant columns pass through centred but unscaled.
        let scale = if std > f64::EPSILON { std } else { 1.0 };
        Ok(StandardScaler { mean, scale })
    }

    /// Centres and scales one value.
    pub fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }
}

/// One indicator per category seen in training. Values outside that
/// vocabulary encode as an all-zero row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    /// Sorted training vocabulary.
    pub categories: Vec<String>,
}

impl OneHotEncoder {
    /// Collects the distinct values of one column.
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let categories: BTreeSet<&str> = values.into_iter().collect();
        if categories.is_empty() {
            return Err(ObesityError::Training(
                "cannot fit an encoder on zero rows".into(),
            ));
        }
        Ok(OneHotEncoder {
            categories: categories.into_iter().map(str::to_string).collect(),
        })
    }

    /// Number of indicator columns.
    pub fn width(&self) -> usize {
        self.categories.len()
    }

    /// Writes the indicators for `value` into `out`. Returns false for an
    /// unseen category, leaving `out` zeroed.
    pub fn encode_into(&self, value: &str, out: &mut [f64]) -> bool {
        out.iter_mut().for_each(|v| *v = 0.0);
        match self.categories.binary_search_by(|c| c.as_str().cmp(value)) {
            Ok(i) => {
                out[i] = 1.0;
                true
            }
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct NumericStep {
    column: String,
    index: usize,
    scaler: StandardScaler,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CategoricalStep {
    column: String,
    index: usize,
    encoder: OneHotEncoder,
}

/// Unfitted preprocessor: which columns go through which transform.
#[derive(Debug, Clone)]
pub struct PreprocessorParams {
    categorical: Vec<String>,
    numeric: Vec<String>,
}

/// Builds the column-wise preprocessor. Numeric columns come first in the
/// output, then the one-hot blocks, each in the order given here.
pub fn build_preprocessor(categorical: &[&str], numeric: &[&str]) -> PreprocessorParams {
    PreprocessorParams {
        categorical: categorical.iter().map(|c| c.to_string()).collect(),
        numeric: numeric.iter().map(|c| c.to_string()).collect(),
    }
}

impl PreprocessorParams {
    /// Learns scaler and vocabulary parameters from `x`. The column list of
    /// `x` becomes the exact input contract of the fitted transform.
    pub fn fit(&self, x: &Table) -> Result<ColumnTransformer> {
        let mut numeric = Vec::with_capacity(self.numeric.len());
        for column in &self.numeric {
            let index = locate(x, column)?;
            let values = x
                .rows
                .iter()
                .enumerate()
                .map(|(row, r)| number_at(&r[index], column, row))
                .collect::<Result<Vec<_>>>()?;
            numeric.push(NumericStep {
                column: column.clone(),
                index,
                scaler: StandardScaler::fit(&values)?,
            });
        }

        let mut categorical = Vec::with_capacity(self.categorical.len());
        for column in &self.categorical {
            let index = locate(x, column)?;
            let values = x
                .rows
                .iter()
                .enumerate()
                .map(|(row, r)| text_at(&r[index], column, row))
                .collect::<Result<Vec<_>>>()?;
            let encoder = OneHotEncoder::fit(values)?;
            debug!("`{column}` vocabulary: {:?}", encoder.categories);
            categorical.push(CategoricalStep {
                column: column.clone(),
                index,
                encoder,
            });
        }

        Ok(ColumnTransformer {
            input_columns: x.columns.clone(),
            numeric,
            categorical,
        })
    }
}

/// Fitted preprocessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTransformer {
    input_columns: Vec<String>,
    numeric: Vec<NumericStep>,
    categorical: Vec<CategoricalStep>,
}

impl ColumnTransformer {
    /// Column names, in order, that [`transform`](Self::transform) accepts.
    pub fn input_columns(&self) -> &[String] {
        &self.input_columns
    }

    /// Width of the encoded matrix.
    pub fn n_output_features(&self) -> usize {
        self.numeric.len()
            + self
                .categorical
                .iter()
                .map(|c| c.encoder.width())
                .sum::<usize>()
    }

    /// `num__<column>` and `cat__<column>_<category>` names of the encoded
    /// matrix columns.
    pub fn output_feature_names(&self) -> Vec<String> {
        self.numeric
            .iter()
            .map(|s| format!("num__{}", s.column))
            .chain(self.categorical.iter().flat_map(|s| {
                s.encoder
                    .categories
                    .iter()
                    .map(move |c| format!("cat__{}_{}", s.column, c))
            }))
            .collect()
    }

    /// Vocabulary learned for a categorical column.
    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.categorical
            .iter()
            .find(|s| s.column == column)
            .map(|s| s.encoder.categories.as_slice())
    }

    /// Fails with a schema mismatch unless `columns` equals the fitted input
    /// columns, names and order.
    pub fn check_columns(&self, columns: &[String]) -> Result<()> {
        if columns == self.input_columns.as_slice() {
            return Ok(());
        }
        let missing: Vec<_> = self
            .input_columns
            .iter()
            .filter(|c| !columns.contains(c))
            .collect();
        let extra: Vec<_> = columns
            .iter()
            .filter(|c| !self.input_columns.contains(c))
            .collect();
        let detail = if missing.is_empty() && extra.is_empty() {
            "columns are out of order".to_string()
        } else {
            format!("missing {missing:?}, unexpected {extra:?}")
        };
        Err(ObesityError::SchemaMismatch(detail))
    }

    /// Encodes every row of `x`, numeric block first.
    pub fn transform(&self, x: &Table) -> Result<Array2<f64>> {
        self.check_columns(&x.columns)?;

        let width = self.n_output_features();
        let mut out = Array2::<f64>::zeros((x.len(), width));
        for (row_idx, row) in x.rows.iter().enumerate() {
            let mut dst = out.row_mut(row_idx);
            let dst = dst
                .as_slice_mut()
                .ok_or_else(|| ObesityError::Training("non-contiguous output row".into()))?;

            let mut offset = 0;
            for step in &self.numeric {
                let v = number_at(&row[step.index], &step.column, row_idx)?;
                dst[offset] = step.scaler.transform(v);
                offset += 1;
            }
            for step in &self.categorical {
                let v = text_at(&row[step.index], &step.column, row_idx)?;
                let w = step.encoder.width();
                if !step.encoder.encode_into(v, &mut dst[offset..offset + w]) {
                    debug!("unseen category `{v}` for `{}`", step.column);
                }
                offset += w;
            }
        }
        Ok(out)
    }
}

fn locate(x: &Table, column: &str) -> Result<usize> {
    x.column_index(column)
        .ok_or_else(|| ObesityError::SchemaMismatch(format!("column `{column}` missing")))
}

fn number_at(value: &Value, column: &str, row: usize) -> Result<f64> {
    value.as_number().ok_or_else(|| {
        ObesityError::SchemaMismatch(format!("`{column}` row {row}: expected a number"))
    })
}

fn text_at<'a>(value: &'a Value, column: &str, row: usize) -> Result<&'a str> {
    value.as_text().ok_or_else(|| {
        ObesityError::SchemaMismatch(format!("`{column}` row {row}: expected a category"))
    })
}
