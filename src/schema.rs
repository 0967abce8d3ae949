//! The feature contract shared by training and serving.
//!
//! Every column name, feature kind and input domain used anywhere in the crate
//! is declared here once. The trainer renames raw dataset headers through
//! [`FEATURES`], and the predictor rebuilds the very same column list from a
//! [`PatientRecord`](crate::predictor::PatientRecord). Changing anything in
//! this file must bump [`SCHEMA_VERSION`]: artifacts written under another
//! version are refused at load time.

/// Version of the feature contract stored inside every artifact.
pub const SCHEMA_VERSION: u32 = 1;

/// How a feature enters the preprocessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    /// One-hot encoded over the training vocabulary.
    Categorical,
    /// Standardised with training mean and variance.
    Numeric,
}

/// Accepted values for a feature at the prediction boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Domain {
    Choices(&'static [&'static str]),
    Range { min: f64, max: f64 },
    /// Computed by the crate, never supplied by a caller.
    Derived,
}

/// One canonical feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSpec {
    /// Canonical column name fed to the pipeline.
    pub name: &'static str,
    /// Header in the raw training file, `None` for derived features.
    pub raw: Option<&'static str>,
    pub kind: FeatureKind,
    /// Nominally integer column, coerced to whole numbers during training.
    pub integral: bool,
    pub domain: Domain,
    /// Short human description, used by the interactive prompt.
    pub label: &'static str,
}

/// Binary answers.
pub const YES_NO: &[&str] = &["yes", "no"];
/// Frequency answers for snacking and alcohol.
pub const FREQUENCY: &[&str] = &["Sometimes", "Frequently", "Always", "no"];
/// Accepted genders.
pub const GENDERS: &[&str] = &["Male", "Female"];
/// Main means of transport.
pub const TRANSPORT: &[&str] = &[
    "Public_Transportation",
    "Walking",
    "Automobile",
    "Motorbike",
    "Bike",
];

// Canonical column names.
pub const GENERO: &str = "genero";
pub const IDADE: &str = "idade";
pub const ALTURA_M: &str = "altura_m";
pub const PESO_KG: &str = "peso_kg";
pub const HISTORIA_FAMILIAR_SOBREPESO: &str = "historia_familiar_sobrepeso";
pub const COME_COMIDA_CALORICA_FREQ: &str = "come_comida_calorica_freq";
pub const FREQ_CONSUMO_VEGETAIS: &str = "freq_consumo_vegetais";
pub const NUM_REFEICOES_PRINCIPAIS: &str = "num_refeicoes_principais";
pub const COME_ENTRE_REFEICOES: &str = "come_entre_refeicoes";
pub const FUMANTE: &str = "fumante";
pub const CONSUMO_AGUA_LITROS: &str = "consumo_agua_litros";
pub const MONITORA_CALORIAS: &str = "monitora_calorias";
pub const FREQ_ATIVIDADE_FISICA: &str = "freq_atividade_fisica";
pub const TEMPO_USO_DISPOSITIVOS: &str = "tempo_uso_dispositivos";
pub const FREQ_CONSUMO_ALCOOL: &str = "freq_consumo_alcool";
pub const MEIO_TRANSPORTE: &str = "meio_transporte";
pub const IMC: &str = "imc";

/// Raw header of the label column.
pub const RAW_LABEL: &str = "Obesity";
/// Canonical name of the label column.
pub const LABEL: &str = "nivel_obesidade";

const fn categorical(
    name: &'static str,
    raw: &'static str,
    choices: &'static [&'static str],
    label: &'static str,
) -> FeatureSpec {
    FeatureSpec {
        name,
        raw: Some(raw),
        kind: FeatureKind::Categorical,
        integral: false,
        domain: Domain::Choices(choices),
        label,
    }
}

const fn numeric(
    name: &'static str,
    raw: &'static str,
    integral: bool,
    min: f64,
    max: f64,
    label: &'static str,
) -> FeatureSpec {
    FeatureSpec {
        name,
        raw: Some(raw),
        kind: FeatureKind::Numeric,
        integral,
        domain: Domain::Range { min, max },
        label,
    }
}

/// Canonical features in pipeline input order.
pub const FEATURES: [FeatureSpec; 17] = [
    categorical(GENERO, "Gender", GENDERS, "Gender"),
    numeric(IDADE, "Age", false, 1.0, 120.0, "Age"),
    numeric(ALTURA_M, "Height", false, 0.5, 2.5, "Height (m)"),
    numeric(PESO_KG, "Weight", false, 10.0, 300.0, "Weight (kg)"),
    categorical(
        HISTORIA_FAMILIAR_SOBREPESO,
        "family_history",
        YES_NO,
        "Family history of overweight",
    ),
    categorical(
        COME_COMIDA_CALORICA_FREQ,
        "FAVC",
        YES_NO,
        "Frequently eats high-calorie food",
    ),
    numeric(
        FREQ_CONSUMO_VEGETAIS,
        "FCVC",
        true,
        1.0,
        3.0,
        "Vegetable consumption frequency (1-3)",
    ),
    numeric(
        NUM_REFEICOES_PRINCIPAIS,
        "NCP",
        true,
        1.0,
        4.0,
        "Number of main meals (1-4)",
    ),
    categorical(
        COME_ENTRE_REFEICOES,
        "CAEC",
        FREQUENCY,
        "Eats between meals",
    ),
    categorical(FUMANTE, "SMOKE", YES_NO, "Smoker"),
    numeric(
        CONSUMO_AGUA_LITROS,
        "CH2O",
        true,
        1.0,
        3.0,
        "Daily water intake in litres (1-3)",
    ),
    categorical(MONITORA_CALORIAS, "SCC", YES_NO, "Monitors calorie intake"),
    numeric(
        FREQ_ATIVIDADE_FISICA,
        "FAF",
        true,
        0.0,
        3.0,
        "Physical activity frequency (0-3)",
    ),
    numeric(
        TEMPO_USO_DISPOSITIVOS,
        "TUE",
        true,
        0.0,
        2.0,
        "Time using electronic devices (0-2)",
    ),
    categorical(FREQ_CONSUMO_ALCOOL, "CALC", FREQUENCY, "Alcohol consumption"),
    categorical(
        MEIO_TRANSPORTE,
        "MTRANS",
        TRANSPORT,
        "Main means of transport",
    ),
    FeatureSpec {
        name: IMC,
        raw: None,
        kind: FeatureKind::Numeric,
        integral: false,
        domain: Domain::Derived,
        label: "Body-mass index",
    },
];

/// Looks up a canonical feature by name.
pub fn feature(name: &str) -> Option<&'static FeatureSpec> {
    FEATURES.iter().find(|f| f.name == name)
}

/// Canonical feature names, in pipeline input order.
pub fn feature_names() -> Vec<String> {
    FEATURES.iter().map(|f| f.name.to_string()).collect()
}

/// Raw header to canonical name, label column included.
pub fn column_map() -> Vec<(&'static str, &'static str)> {
    FEATURES
        .iter()
        .filter_map(|f| f.raw.map(|raw| (raw, f.name)))
        .chain(std::iter::once((RAW_LABEL, LABEL)))
        .collect()
}

/// Features one-hot encoded by the preprocessor.
pub fn categorical_columns() -> Vec<&'static str> {
    FEATURES
        .iter()
        .filter(|f| f.kind == FeatureKind::Categorical)
        .map(|f| f.name)
        .collect()
}

/// Features standardised by the preprocessor, `imc` included.
pub fn numeric_columns() -> Vec<&'static str> {
    FEATURES
        .iter()
        .filter(|f| f.kind == FeatureKind::Numeric)
        .map(|f| f.name)
        .collect()
}

/// Columns truncated to whole numbers while training.
pub fn integer_columns() -> Vec<&'static str> {
    FEATURES
        .iter()
        .filter(|f| f.integral)
        .map(|f| f.name)
        .collect()
}
