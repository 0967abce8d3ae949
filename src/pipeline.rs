//! The fitted unit that gets persisted: preprocessor, forest and label
//! vocabulary, saved and loaded together.

use crate::dataset::Table;
use crate::error::{ObesityError, Result};
use crate::forest::{ForestParams, RandomForest, fit_classifier};
use crate::preprocess::{ColumnTransformer, build_preprocessor};
use crate::schema::{self, SCHEMA_VERSION};
use log::info;
use ndarray::{Array1, Array2};
use rmp_serde::{decode::from_read, encode::write_named};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Provenance stored next to the fitted parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub schema_version: u32,
    /// Assigned by [`ArtifactStore::publish`](crate::store::ArtifactStore::publish),
    /// zero for artifacts saved straight to a path.
    pub artifact_id: u64,
    pub created_unix_ms: u64,
    pub n_train: usize,
    pub n_test: usize,
    pub test_accuracy: Option<f64>,
    pub n_trees: usize,
    pub seed: u64,
}

/// Trained obesity-level classifier with its preprocessing.
#[derive(Debug, Serialize, Deserialize)]
pub struct ObesityPipeline {
    meta: ArtifactMeta,
    /// Sorted label vocabulary; forest class `i` is `classes[i]`.
    classes: Vec<String>,
    preprocessor: ColumnTransformer,
    classifier: RandomForest,
}

impl ObesityPipeline {
    /// Fits preprocessor and forest jointly on the training split. `x` must
    /// carry exactly the canonical features in schema order.
    pub fn fit(x: &Table, y: &[String], params: &ForestParams) -> Result<Self> {
        if x.columns != schema::feature_names() {
            return Err(ObesityError::SchemaMismatch(format!(
                "training columns {:?} differ from the canonical features",
                x.columns
            )));
        }
        if x.len() != y.len() {
            return Err(ObesityError::Training(format!(
                "{} rows for {} labels",
                x.len(),
                y.len()
            )));
        }

        let preprocessor =
            build_preprocessor(&schema::categorical_columns(), &schema::numeric_columns())
                .fit(x)?;
        let encoded = preprocessor.transform(x)?;

        let classes: Vec<String> = y
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let targets = encode_labels(&classes, y)?;

        let classifier = fit_classifier(&encoded, &targets, classes.len(), params)?;
        info!(
            "fitted {} trees over {} encoded features, {} classes",
            classifier.n_trees(),
            classifier.n_features(),
            classes.len()
        );

        Ok(ObesityPipeline {
            meta: ArtifactMeta {
                schema_version: SCHEMA_VERSION,
                artifact_id: 0,
                created_unix_ms: now_unix_ms(),
                n_train: x.len(),
                n_test: 0,
                test_accuracy: None,
                n_trees: params.n_trees,
                seed: params.seed,
            },
            classes,
            preprocessor,
            classifier,
        })
    }

    /// Provenance of this artifact.
    pub fn meta(&self) -> &ArtifactMeta {
        &self.meta
    }

    pub(crate) fn meta_mut(&mut self) -> &mut ArtifactMeta {
        &mut self.meta
    }

    /// The closed label set, sorted.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Feature columns, in order, the pipeline was fitted on.
    pub fn input_columns(&self) -> &[String] {
        self.preprocessor.input_columns()
    }

    /// The fitted column transform.
    pub fn preprocessor(&self) -> &ColumnTransformer {
        &self.preprocessor
    }

    /// Vote fractions per row, columns aligned with [`classes`](Self::classes).
    pub fn predict_proba_table(&self, x: &Table) -> Result<Array2<f64>> {
        let encoded = self.preprocessor.transform(x)?;
        self.classifier.predict_proba(encoded.view())
    }

    /// Top label per row.
    pub fn predict_table(&self, x: &Table) -> Result<Vec<String>> {
        let encoded = self.preprocessor.transform(x)?;
        let pred = self.classifier.predict(encoded.view())?;
        Ok(pred.iter().map(|&c| self.classes[c].clone()).collect())
    }

    /// Refuses artifacts written under another feature contract with
    /// [`ObesityError::ArtifactIncompatible`].
    pub fn check_schema(&self) -> Result<()> {
        if self.meta.schema_version != SCHEMA_VERSION {
            return Err(ObesityError::ArtifactIncompatible(format!(
                "artifact schema v{} but this build expects v{SCHEMA_VERSION}",
                self.meta.schema_version
            )));
        }
        self.preprocessor
            .check_columns(&schema::feature_names())
            .map_err(|e| match e {
                ObesityError::SchemaMismatch(detail) => {
                    ObesityError::ArtifactIncompatible(format!("artifact features: {detail}"))
                }
                other => other,
            })
    }
}

fn encode_labels(classes: &[String], y: &[String]) -> Result<Array1<usize>> {
    y.iter()
        .map(|label| {
            classes
                .binary_search(label)
                .map_err(|_| ObesityError::Training(format!("unknown label `{label}`")))
        })
        .collect()
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Share of held-out rows whose predicted label equals the true one.
pub fn evaluate(pipeline: &ObesityPipeline, x_test: &Table, y_test: &[String]) -> Result<f64> {
    if x_test.is_empty() || x_test.len() != y_test.len() {
        return Err(ObesityError::Training(format!(
            "cannot evaluate {} rows against {} labels",
            x_test.len(),
            y_test.len()
        )));
    }
    let pred = pipeline.predict_table(x_test)?;
    let correct = pred.iter().zip(y_test).filter(|(p, t)| p == t).count();
    Ok(correct as f64 / y_test.len() as f64)
}

/// Writes the pipeline as MessagePack next to `path`, then renames it into
/// place, so readers only ever see a complete artifact.
pub fn save_artifact(pipeline: &ObesityPipeline, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(&mut tmp);
        write_named(&mut writer, pipeline)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| ObesityError::Io(e.error))?;
    info!("saved model artifact to {:?}", path);
    Ok(())
}

/// Reads an artifact. A missing file is [`ObesityError::ArtifactUnavailable`].
pub fn load_artifact(path: &Path) -> Result<ObesityPipeline> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ObesityError::ArtifactUnavailable(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    let pipeline: ObesityPipeline = from_read(BufReader::new(file))?;
    pipeline.check_schema()?;
    info!(
        "loaded model artifact {:?} (id {}, {} classes)",
        path,
        pipeline.meta.artifact_id,
        pipeline.classes.len()
    );
    Ok(pipeline)
}
