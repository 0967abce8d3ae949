//! # obesity-predictor 🏥
//!
//! Predict obesity level from lifestyle attributes with a random forest built
//! on [`linfa-trees`](https://crates.io/crates/linfa-trees).
//!
//! The crate has two halves that share one feature contract ([`schema`]):
//! the [`trainer`] reads the labelled CSV, renames its columns, derives the
//! body-mass index, fits scaling + one-hot encoding + a 100-tree forest and
//! writes a single artifact; the [`predictor`] loads that artifact once and
//! answers per-patient requests by rebuilding exactly the same feature row.
//!
//! ## Features
//! - One shared, versioned schema for training and serving
//! - Standard scaling and one-hot encoding that ignores unseen categories
//! - Seeded bagging of decision trees, label + vote-share prediction
//! - Model persistence with `rmp-serde` (MessagePack), atomic overwrite
//! - Versioned artifact store with pin and rollback
//! - Benchmarkable with [Criterion](https://crates.io/crates/criterion)
//!
//! ## Example
//! ```rust,no_run
//! use obesity_predictor::predictor::{PatientRecord, Predictor};
//! use obesity_predictor::trainer::{Trainer, TrainerConfig};
//! use std::path::Path;
//!
//! let report = Trainer::new(TrainerConfig::default()).run()?;
//! println!("accuracy: {:.2}%", report.accuracy * 100.0);
//!
//! let predictor = Predictor::load(Path::new("modelo_obesidade.msgpack"))?;
//! let record = PatientRecord {
//!     genero: "Female".into(),
//!     idade: 25,
//!     altura_m: 1.70,
//!     peso_kg: 70.0,
//!     historia_familiar_sobrepeso: "yes".into(),
//!     come_comida_calorica_freq: "yes".into(),
//!     freq_consumo_vegetais: 2,
//!     num_refeicoes_principais: 3,
//!     come_entre_refeicoes: "Sometimes".into(),
//!     fumante: "no".into(),
//!     consumo_agua_litros: 2,
//!     monitora_calorias: "no".into(),
//!     freq_atividade_fisica: 1,
//!     tempo_uso_dispositivos: 1,
//!     freq_consumo_alcool: "Sometimes".into(),
//!     meio_transporte: "Public_Transportation".into(),
//! };
//! let prediction = predictor.predict_with_proba(&record)?;
//! println!("{} ({:.0}%)", prediction.label, prediction.confidence() * 100.0);
//! # Ok::<(), obesity_predictor::ObesityError>(())
//! ```

pub mod dataset;
pub mod error;
pub mod forest;
pub mod pipeline;
pub mod predictor;
pub mod preprocess;
pub mod schema;
pub mod stats;
pub mod store;
pub mod trainer;

pub use error::{ObesityError, Result};
pub use pipeline::{ObesityPipeline, load_artifact, save_artifact};
pub use predictor::{ModelCache, PatientRecord, Prediction, Predictor, derive_bmi};
pub use trainer::{Trainer, TrainerConfig, TrainingReport};
