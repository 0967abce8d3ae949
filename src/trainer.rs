//! Offline batch job: dataset in, artifact out.
//!
//! Stages run strictly in order, Load → Rename → Coerce → Derive → Split →
//! Fit → Evaluate → Save. Any failure returns before the save, and the save
//! itself is an atomic rename, so a failed run never touches the artifact
//! that serving is using.

use crate::dataset::{
    IntCoercion, coerce_numeric_types, derive_features, load_dataset, rename_to_canonical,
    split_features_label, train_test_split,
};
use crate::error::Result;
use crate::forest::ForestParams;
use crate::pipeline::{ObesityPipeline, evaluate, save_artifact};
use crate::schema;
use crate::store::ArtifactStore;
use log::info;
use std::path::PathBuf;

/// Paths, split ratio, forest settings and coercion policy of a run.
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub dataset_path: PathBuf,
    /// Where the artifact is written when no store is configured.
    pub artifact_path: PathBuf,
    /// Publish into a versioned store instead of overwriting `artifact_path`.
    pub store_dir: Option<PathBuf>,
    pub test_ratio: f64,
    pub forest: ForestParams,
    pub int_coercion: IntCoercion,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            dataset_path: PathBuf::from("Obesity.csv"),
            artifact_path: PathBuf::from("modelo_obesidade.msgpack"),
            store_dir: None,
            test_ratio: 0.2,
            forest: ForestParams::default(),
            int_coercion: IntCoercion::Truncate,
        }
    }
}

/// Outcome of a training run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub rows: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub accuracy: f64,
    pub classes: Vec<String>,
    pub artifact: PathBuf,
    /// Store version, when published to a store.
    pub version: Option<u64>,
}

/// Runs the training stages for one configuration.
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    /// Trainer for `config`.
    pub fn new(config: TrainerConfig) -> Self {
        Trainer { config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Runs every stage except the save and returns the fitted pipeline with
    /// its held-out accuracy recorded in the metadata.
    pub fn fit(&self) -> Result<ObesityPipeline> {
        let cfg = &self.config;

        let raw = load_dataset(&cfg.dataset_path)?;
        let table = rename_to_canonical(&raw, &schema::column_map())?;
        let table = coerce_numeric_types(table, &schema::integer_columns(), cfg.int_coercion)?;
        let table = derive_features(table)?;
        let (x, y) = split_features_label(&table)?;

        let split = train_test_split(&x, &y, cfg.test_ratio, cfg.forest.seed)?;
        info!(
            "training on {} rows, holding out {}",
            split.x_train.len(),
            split.x_test.len()
        );

        let mut pipeline = ObesityPipeline::fit(&split.x_train, &split.y_train, &cfg.forest)?;
        let accuracy = evaluate(&pipeline, &split.x_test, &split.y_test)?;
        info!("held-out accuracy: {:.2}%", accuracy * 100.0);

        let meta = pipeline.meta_mut();
        meta.n_test = split.x_test.len();
        meta.test_accuracy = Some(accuracy);
        Ok(pipeline)
    }

    /// Fits, then saves or publishes the artifact.
    pub fn run(&self) -> Result<TrainingReport> {
        let mut pipeline = self.fit()?;

        let (artifact, version) = match &self.config.store_dir {
            Some(dir) => {
                let store = ArtifactStore::open(dir)?;
                let id = store.publish(&mut pipeline)?;
                (store.path_for(id), Some(id))
            }
            None => {
                save_artifact(&pipeline, &self.config.artifact_path)?;
                (self.config.artifact_path.clone(), None)
            }
        };

        let meta = pipeline.meta();
        Ok(TrainingReport {
            rows: meta.n_train + meta.n_test,
            n_train: meta.n_train,
            n_test: meta.n_test,
            accuracy: meta.test_accuracy.unwrap_or_default(),
            classes: pipeline.classes().to_vec(),
            artifact,
            version,
        })
    }
}
