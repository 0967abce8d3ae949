use criterion::{Criterion, criterion_group, criterion_main};
use obesity_predictor::{PatientRecord, Predictor};
use std::path::Path;

fn record(i: usize) -> PatientRecord {
    PatientRecord {
        genero: if i % 2 == 0 { "Female" } else { "Male" }.into(),
        idade: 18 + (i % 40) as u32,
        altura_m: 1.50 + (i % 40) as f64 / 100.0,
        peso_kg: 45.0 + (i % 90) as f64,
        historia_familiar_sobrepeso: "yes".into(),
        come_comida_calorica_freq: "yes".into(),
        freq_consumo_vegetais: 1 + (i % 3) as u32,
        num_refeicoes_principais: 1 + (i % 4) as u32,
        come_entre_refeicoes: "Sometimes".into(),
        fumante: "no".into(),
        consumo_agua_litros: 1 + (i % 3) as u32,
        monitora_calorias: "no".into(),
        freq_atividade_fisica: (i % 4) as u32,
        tempo_uso_dispositivos: (i % 3) as u32,
        freq_consumo_alcool: "Sometimes".into(),
        meio_transporte: "Public_Transportation".into(),
    }
}

fn bench_predict_single(c: &mut Criterion) {
    let predictor = Predictor::load(Path::new("modelo_obesidade.msgpack")).unwrap();
    let patient = record(0);

    c.bench_function("predict single patient", |b| {
        b.iter(|| {
            let _ = predictor.predict(&patient);
        })
    });
}

fn bench_bulk_prediction(c: &mut Criterion) {
    let predictor = Predictor::load(Path::new("modelo_obesidade.msgpack")).unwrap();
    let patients: Vec<_> = (0..1_000).map(record).collect();

    c.bench_function("bulk predict 1k patients", |b| {
        b.iter(|| {
            for p in &patients {
                let _ = predictor.predict(p);
            }
        });
    });
}

criterion_group!(benches, bench_predict_single, bench_bulk_prediction);
criterion_main!(benches);
