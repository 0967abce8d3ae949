//! Serving side: rebuilds the training feature space from one patient record
//! and runs it through a loaded pipeline.

use crate::dataset::{Table, Value};
use crate::error::{ObesityError, Result};
use crate::forest::argmax;
use crate::pipeline::{ObesityPipeline, load_artifact};
use crate::schema::{self, Domain};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Body-mass index, `weight / height²`. The trainer derives `imc` through
/// this same function.
pub fn derive_bmi(weight_kg: f64, height_m: f64) -> Result<f64> {
    if !weight_kg.is_finite() || weight_kg <= 0.0 {
        return Err(ObesityError::InvalidInput(format!(
            "weight must be a positive number of kg, got {weight_kg}"
        )));
    }
    if !height_m.is_finite() || height_m <= 0.0 {
        return Err(ObesityError::InvalidInput(format!(
            "height must be a positive number of metres, got {height_m}"
        )));
    }
    Ok(weight_kg / height_m.powi(2))
}

/// One patient, keyed by canonical feature names. `imc` is not a field: it is
/// always derived from weight and height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub genero: String,
    pub idade: u32,
    pub altura_m: f64,
    pub peso_kg: f64,
    pub historia_familiar_sobrepeso: String,
    pub come_comida_calorica_freq: String,
    pub freq_consumo_vegetais: u32,
    pub num_refeicoes_principais: u32,
    pub come_entre_refeicoes: String,
    pub fumante: String,
    pub consumo_agua_litros: u32,
    pub monitora_calorias: String,
    pub freq_atividade_fisica: u32,
    pub tempo_uso_dispositivos: u32,
    pub freq_consumo_alcool: String,
    pub meio_transporte: String,
}

impl PatientRecord {
    /// Checks every numeric field against its declared range. Categorical
    /// values are not checked here: unseen categories are the encoder's job.
    pub fn validate(&self) -> Result<()> {
        let numeric = [
            (schema::IDADE, self.idade as f64),
            (schema::ALTURA_M, self.altura_m),
            (schema::PESO_KG, self.peso_kg),
            (schema::FREQ_CONSUMO_VEGETAIS, self.freq_consumo_vegetais as f64),
            (
                schema::NUM_REFEICOES_PRINCIPAIS,
                self.num_refeicoes_principais as f64,
            ),
            (schema::CONSUMO_AGUA_LITROS, self.consumo_agua_litros as f64),
            (schema::FREQ_ATIVIDADE_FISICA, self.freq_atividade_fisica as f64),
            (
                schema::TEMPO_USO_DISPOSITIVOS,
                self.tempo_uso_dispositivos as f64,
            ),
        ];
        for (name, value) in numeric {
            if let Some(Domain::Range { min, max }) = schema::feature(name).map(|f| f.domain) {
                if !(value.is_finite() && (min..=max).contains(&value)) {
                    return Err(ObesityError::InvalidInput(format!(
                        "`{name}` must be between {min} and {max}, got {value}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// BMI from this record's weight and height.
    pub fn bmi(&self) -> Result<f64> {
        derive_bmi(self.peso_kg, self.altura_m)
    }

    /// Validates the record and lays it out as named features, `imc` included.
    pub fn to_feature_row(&self) -> Result<FeatureRow> {
        self.validate()?;
        let mut row = FeatureRow::default();
        row.insert(schema::GENERO, self.genero.as_str());
        row.insert(schema::IDADE, self.idade as f64);
        row.insert(schema::ALTURA_M, self.altura_m);
        row.insert(schema::PESO_KG, self.peso_kg);
        row.insert(
            schema::HISTORIA_FAMILIAR_SOBREPESO,
            self.historia_familiar_sobrepeso.as_str(),
        );
        row.insert(
            schema::COME_COMIDA_CALORICA_FREQ,
            self.come_comida_calorica_freq.as_str(),
        );
        row.insert(
            schema::FREQ_CONSUMO_VEGETAIS,
            self.freq_consumo_vegetais as f64,
        );
        row.insert(
            schema::NUM_REFEICOES_PRINCIPAIS,
            self.num_refeicoes_principais as f64,
        );
        row.insert(
            schema::COME_ENTRE_REFEICOES,
            self.come_entre_refeicoes.as_str(),
        );
        row.insert(schema::FUMANTE, self.fumante.as_str());
        row.insert(schema::CONSUMO_AGUA_LITROS, self.consumo_agua_litros as f64);
        row.insert(schema::MONITORA_CALORIAS, self.monitora_calorias.as_str());
        row.insert(
            schema::FREQ_ATIVIDADE_FISICA,
            self.freq_atividade_fisica as f64,
        );
        row.insert(
            schema::TEMPO_USO_DISPOSITIVOS,
            self.tempo_uso_dispositivos as f64,
        );
        row.insert(
            schema::FREQ_CONSUMO_ALCOOL,
            self.freq_consumo_alcool.as_str(),
        );
        row.insert(schema::MEIO_TRANSPORTE, self.meio_transporte.as_str());
        row.insert(schema::IMC, self.bmi()?);
        Ok(row)
    }
}

/// Named feature values for a single prediction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRow(BTreeMap<String, Value>);

impl FeatureRow {
    /// Sets a feature, replacing any previous value.
    pub fn insert(&mut self, name: &str, value: impl Into<Value>) {
        self.0.insert(name.to_string(), value.into());
    }

    /// Drops a feature, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    /// Value of a feature, if set.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Single-row table in exactly `columns` order. Missing or extra names
    /// fail; nothing is defaulted.
    pub fn to_table(&self, columns: &[String]) -> Result<Table> {
        let missing: Vec<_> = columns
            .iter()
            .filter(|c| !self.0.contains_key(*c))
            .collect();
        let extra: Vec<_> = self.0.keys().filter(|k| !columns.contains(*k)).collect();
        if !missing.is_empty() || !extra.is_empty() {
            return Err(ObesityError::SchemaMismatch(format!(
                "missing {missing:?}, unexpected {extra:?}"
            )));
        }

        let mut table = Table::new(columns.to_vec());
        table.push_row(columns.iter().map(|c| self.0[c].clone()).collect())?;
        Ok(table)
    }
}

/// Label with the vote share behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    /// `(label, fraction of trees)` for every class, in label order.
    pub probabilities: Vec<(String, f64)>,
    pub imc: Option<f64>,
}

impl Prediction {
    /// Vote share of the predicted label.
    pub fn confidence(&self) -> f64 {
        self.probabilities
            .iter()
            .find(|(l, _)| *l == self.label)
            .map(|(_, p)| *p)
            .unwrap_or_default()
    }
}

/// Read-only handle on a loaded pipeline. Cheap to clone and safe to share
/// across threads.
#[derive(Clone)]
pub struct Predictor {
    pipeline: Arc<ObesityPipeline>,
}

impl Predictor {
    /// Loads an artifact from disk, see [`load_artifact`].
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Predictor::from_pipeline(load_artifact(path)?))
    }

    /// Wraps an already fitted pipeline.
    pub fn from_pipeline(pipeline: ObesityPipeline) -> Self {
        Predictor {
            pipeline: Arc::new(pipeline),
        }
    }

    /// The shared fitted pipeline.
    pub fn pipeline(&self) -> &ObesityPipeline {
        &self.pipeline
    }

    /// Top label for one patient.
    pub fn predict(&self, record: &PatientRecord) -> Result<String> {
        Ok(self.predict_with_proba(record)?.label)
    }

    /// Label plus the vote share of every class.
    pub fn predict_with_proba(&self, record: &PatientRecord) -> Result<Prediction> {
        let row = record.to_feature_row()?;
        self.predict_row(&row)
    }

    /// Predicts from named features. The names must match the fitted columns
    /// exactly.
    pub fn predict_row(&self, row: &FeatureRow) -> Result<Prediction> {
        let table = row.to_table(self.pipeline.input_columns())?;
        let proba = self.pipeline.predict_proba_table(&table)?;

        let probabilities: Vec<(String, f64)> = self
            .pipeline
            .classes()
            .iter()
            .cloned()
            .zip(proba.row(0).iter().copied())
            .collect();
        let label = self.pipeline.classes()[argmax(proba.row(0).iter().copied())].clone();

        Ok(Prediction {
            label,
            probabilities,
            imc: row.get(schema::IMC).and_then(Value::as_number),
        })
    }
}

/// Loads the artifact on first use and hands out the same predictor for the
/// rest of the process. A missing artifact is reported on every call until
/// one appears; once loaded the handle never changes.
pub struct ModelCache {
    path: PathBuf,
    slot: OnceLock<Predictor>,
}

impl ModelCache {
    /// Cache that loads `path` on first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ModelCache {
            path: path.into(),
            slot: OnceLock::new(),
        }
    }

    /// Artifact path this cache reads.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cached predictor, loading it on first success.
    pub fn get_or_load(&self) -> Result<&Predictor> {
        if let Some(p) = self.slot.get() {
            return Ok(p);
        }
        let loaded = Predictor::load(&self.path)?;
        Ok(self.slot.get_or_init(|| loaded))
    }

    /// Whether an artifact has been loaded.
    pub fn is_ready(&self) -> bool {
        self.slot.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PatientRecord {
        PatientRecord {
            genero: "Female".into(),
            idade: 25,
            altura_m: 1.70,
            peso_kg: 70.0,
            historia_familiar_sobrepeso: "yes".into(),
            come_comida_calorica_freq: "yes".into(),
            freq_consumo_vegetais: 2,
            num_refeicoes_principais: 3,
            come_entre_refeicoes: "Sometimes".into(),
            fumante: "no".into(),
            consumo_agua_litros: 2,
            monitora_calorias: "no".into(),
            freq_atividade_fisica: 1,
            tempo_uso_dispositivos: 1,
            freq_consumo_alcool: "Sometimes".into(),
            meio_transporte: "Public_Transportation".into(),
        }
    }

    #[test]
    fn bmi_matches_formula() {
        for (w, h) in [(70.0, 1.70), (10.0, 0.5), (300.0, 2.5), (55.5, 1.62)] {
            let bmi = derive_bmi(w, h).unwrap();
            assert!((bmi - w / (h * h)).abs() < 1e-9);
        }
        let bmi = derive_bmi(70.0, 1.70).unwrap();
        assert_eq!(format!("{bmi:.2}"), "24.22");
    }

    #[test]
    fn bmi_rejects_non_positive_height() {
        assert!(matches!(
            derive_bmi(70.0, 0.0),
            Err(ObesityError::InvalidInput(_))
        ));
        assert!(matches!(
            derive_bmi(70.0, f64::NAN),
            Err(ObesityError::InvalidInput(_))
        ));
        assert!(matches!(
            derive_bmi(-1.0, 1.7),
            Err(ObesityError::InvalidInput(_))
        ));
    }

    #[test]
    fn record_out_of_range_is_invalid_input() {
        let mut r = sample();
        r.altura_m = 3.0;
        assert!(matches!(r.validate(), Err(ObesityError::InvalidInput(m)) if m.contains("altura_m")));
        let mut r = sample();
        r.num_refeicoes_principais = 5;
        assert!(matches!(r.validate(), Err(ObesityError::InvalidInput(_))));
    }

    #[test]
    fn feature_row_covers_every_canonical_feature() {
        let row = sample().to_feature_row().unwrap();
        let table = row.to_table(&schema::feature_names()).unwrap();
        assert_eq!(table.columns, schema::feature_names());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn missing_feature_is_schema_mismatch() {
        let mut row = sample().to_feature_row().unwrap();
        row.remove(schema::IMC);
        let err = row.to_table(&schema::feature_names()).unwrap_err();
        assert!(matches!(err, ObesityError::SchemaMismatch(m) if m.contains("imc")));
    }

    #[test]
    fn extra_feature_is_schema_mismatch() {
        let mut row = sample().to_feature_row().unwrap();
        row.insert("cintura_cm", 80.0);
        assert!(matches!(
            row.to_table(&schema::feature_names()),
            Err(ObesityError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn cache_reports_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ModelCache::new(dir.path().join("absent.msgpack"));
        assert!(matches!(
            cache.get_or_load(),
            Err(ObesityError::ArtifactUnavailable(_))
        ));
        assert!(!cache.is_ready());
    }
}
