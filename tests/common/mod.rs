#![allow(dead_code)]

use obesity_predictor::forest::ForestParams;
use obesity_predictor::{PatientRecord, TrainerConfig};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const LABELS: [(&str, f64); 7] = [
    ("Insufficient_Weight", 17.0),
    ("Normal_Weight", 22.0),
    ("Overweight_Level_I", 26.0),
    ("Overweight_Level_II", 28.5),
    ("Obesity_Type_I", 32.0),
    ("Obesity_Type_II", 37.0),
    ("Obesity_Type_III", 43.0),
];

const GENDERS: [&str; 2] = ["Male", "Female"];
const YES_NO: [&str; 2] = ["yes", "no"];
const FREQUENCY: [&str; 4] = ["Sometimes", "Frequently", "Always", "no"];
const TRANSPORT: [&str; 5] = [
    "Public_Transportation",
    "Walking",
    "Automobile",
    "Motorbike",
    "Bike",
];

const HEADER: &str = "Gender,Age,Height,Weight,family_history,FAVC,FCVC,NCP,CAEC,SMOKE,CH2O,SCC,FAF,TUE,CALC,MTRANS,Obesity,source";

/// Synthetic rows whose label follows the BMI band, cycling through every
/// categorical value. Some integer columns carry fractional values.
pub fn dataset_csv(rows: usize, replace_transport: Option<(&str, &str)>) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for i in 0..rows {
        let (label, bmi) = LABELS[i % LABELS.len()];
        let height = 1.50 + ((i / LABELS.len()) % 5) as f64 * 0.07;
        let weight = bmi * height * height + (i % 3) as f64 * 0.3;
        let mut transport = TRANSPORT[i % TRANSPORT.len()];
        if let Some((from, to)) = replace_transport {
            if transport == from {
                transport = to;
            }
        }
        let fcvc = if i % 10 == 3 {
            "2.45".to_string()
        } else {
            format!("{}", 1 + i % 3)
        };
        writeln!(
            out,
            "{},{:.1},{:.2},{:.2},{},{},{},{},{},{},{},{},{},{},{},{},{},synthetic",
            GENDERS[i % 2],
            18.0 + (i % 40) as f64,
            height,
            weight,
            YES_NO[(i / 2) % 2],
            YES_NO[(i / 3) % 2],
            fcvc,
            1 + i % 4,
            FREQUENCY[i % 4],
            YES_NO[(i / 5) % 2],
            1 + (i / 2) % 3,
            YES_NO[(i / 7) % 2],
            i % 4,
            i % 3,
            FREQUENCY[(i / 4) % 4],
            transport,
            label,
        )
        .unwrap();
    }
    out
}

pub fn write_dataset(dir: &Path, rows: usize) -> PathBuf {
    let path = dir.join("Obesity.csv");
    std::fs::write(&path, dataset_csv(rows, None)).unwrap();
    path
}

pub fn config(dir: &Path, data: PathBuf, n_trees: usize) -> TrainerConfig {
    TrainerConfig {
        dataset_path: data,
        artifact_path: dir.join("modelo_obesidade.msgpack"),
        forest: ForestParams {
            n_trees,
            ..ForestParams::default()
        },
        ..TrainerConfig::default()
    }
}

pub fn sample_record() -> PatientRecord {
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

/// A handful of patients spread over the BMI range.
pub fn spread_records() -> Vec<PatientRecord> {
    [(1.60, 45.0), (1.70, 70.0), (1.75, 85.0), (1.65, 95.0), (1.80, 140.0)]
        .into_iter()
        .enumerate()
        .map(|(i, (h, w))| PatientRecord {
            altura_m: h,
            peso_kg: w,
            genero: if i % 2 == 0 { "Male" } else { "Female" }.into(),
            ..sample_record()
        })
        .collect()
}
