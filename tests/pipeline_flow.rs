mod common;

use common::{LABELS, config, dataset_csv, spread_records, sample_record, write_dataset};
use obesity_predictor::dataset::IntCoercion;
use obesity_predictor::predictor::FeatureRow;
use obesity_predictor::{
    ModelCache, ObesityError, Predictor, Trainer, load_artifact, save_artifact, schema,
};

#[test]
fn end_to_end_prediction_on_reference_patient() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let data = write_dataset(dir.path(), 140);
    let cfg = config(dir.path(), data, 100);

    let report = Trainer::new(cfg.clone()).run().unwrap();
    assert_eq!(report.n_train + report.n_test, 140);
    assert_eq!(report.n_test, 28);
    assert!((0.0..=1.0).contains(&report.accuracy));
    assert!(cfg.artifact_path.is_file());

    let predictor = Predictor::load(&cfg.artifact_path).unwrap();
    let prediction = predictor.predict_with_proba(&sample_record()).unwrap();

    let labels: Vec<_> = LABELS.iter().map(|(l, _)| l.to_string()).collect();
    assert!(labels.contains(&prediction.label));
    assert_eq!(format!("{:.2}", prediction.imc.unwrap()), "24.22");
    let total: f64 = prediction.probabilities.iter().map(|(_, p)| p).sum();
    assert!((total - 1.0).abs() < 1e-9);
}

#[test]
fn saved_pipeline_predicts_like_the_fitted_one() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_dataset(dir.path(), 140);
    let cfg = config(dir.path(), data, 20);

    let fitted = Predictor::from_pipeline(Trainer::new(cfg.clone()).fit().unwrap());
    save_artifact(fitted.pipeline(), &cfg.artifact_path).unwrap();
    let loaded = Predictor::load(&cfg.artifact_path).unwrap();

    assert_eq!(loaded.pipeline().meta(), fitted.pipeline().meta());
    for record in spread_records() {
        assert_eq!(
            fitted.predict_with_proba(&record).unwrap(),
            loaded.predict_with_proba(&record).unwrap()
        );
    }
}

#[test]
fn retraining_with_same_seed_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_dataset(dir.path(), 140);
    let cfg = config(dir.path(), data, 20);

    let a = Predictor::from_pipeline(Trainer::new(cfg.clone()).fit().unwrap());
    let b = Predictor::from_pipeline(Trainer::new(cfg).fit().unwrap());

    assert_eq!(a.pipeline().meta().test_accuracy, b.pipeline().meta().test_accuracy);
    for record in spread_records() {
        assert_eq!(a.predict(&record).unwrap(), b.predict(&record).unwrap());
    }
}

#[test]
fn unseen_category_still_gets_a_label() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("Obesity.csv");
    std::fs::write(&data, dataset_csv(140, Some(("Bike", "Walking")))).unwrap();
    let cfg = config(dir.path(), data, 20);

    let pipeline = Trainer::new(cfg).fit().unwrap();
    let vocab = pipeline
        .preprocessor()
        .categories(schema::MEIO_TRANSPORTE)
        .unwrap()
        .to_vec();
    assert!(!vocab.contains(&"Bike".to_string()));

    let predictor = Predictor::from_pipeline(pipeline);
    for transport in ["Bike", "Hoverboard"] {
        let mut record = sample_record();
        record.meio_transporte = transport.into();
        let label = predictor.predict(&record).unwrap();
        assert!(predictor.pipeline().classes().contains(&label));
    }
}

#[test]
fn missing_feature_fails_and_leaves_predictor_usable() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_dataset(dir.path(), 140);
    let predictor =
        Predictor::from_pipeline(Trainer::new(config(dir.path(), data, 10)).fit().unwrap());

    let mut row: FeatureRow = sample_record().to_feature_row().unwrap();
    row.remove(schema::IMC);
    let err = predictor.predict_row(&row).unwrap_err();
    assert!(matches!(err, ObesityError::SchemaMismatch(_)));
    assert!(err.is_request_error());

    assert!(predictor.predict(&sample_record()).is_ok());
}

#[test]
fn out_of_domain_record_is_invalid_input() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_dataset(dir.path(), 140);
    let predictor =
        Predictor::from_pipeline(Trainer::new(config(dir.path(), data, 10)).fit().unwrap());

    let mut record = sample_record();
    record.altura_m = 0.0;
    assert!(matches!(
        predictor.predict(&record),
        Err(ObesityError::InvalidInput(_))
    ));
}

#[test]
fn failed_runs_never_touch_the_existing_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_dataset(dir.path(), 140);
    let cfg = config(dir.path(), data.clone(), 10);
    Trainer::new(cfg.clone()).run().unwrap();
    let before = std::fs::read(&cfg.artifact_path).unwrap();

    let mut missing = cfg.clone();
    missing.dataset_path = dir.path().join("absent.csv");
    assert!(matches!(
        Trainer::new(missing).run(),
        Err(ObesityError::DatasetNotFound(_))
    ));

    let mut text = dataset_csv(140, None);
    text.push_str("Male,30,1.80,heavy,yes,yes,2,3,Sometimes,no,2,no,1,1,no,Walking,Normal_Weight,x\n");
    let bad = dir.path().join("bad.csv");
    std::fs::write(&bad, text).unwrap();
    let mut malformed = cfg.clone();
    malformed.dataset_path = bad;
    match Trainer::new(malformed).run() {
        Err(ObesityError::TypeCoercion { column, row, value }) => {
            assert_eq!(column, schema::PESO_KG);
            assert_eq!(row, 140);
            assert_eq!(value, "heavy");
        }
        other => panic!("expected coercion error, got {other:?}"),
    }

    assert_eq!(std::fs::read(&cfg.artifact_path).unwrap(), before);
}

#[test]
fn strict_integer_policy_rejects_fractional_source_values() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_dataset(dir.path(), 140);
    let mut cfg = config(dir.path(), data, 10);
    cfg.int_coercion = IntCoercion::Strict;

    let err = Trainer::new(cfg.clone()).run().unwrap_err();
    assert!(matches!(err, ObesityError::TypeCoercion { ref column, .. } if column == schema::FREQ_CONSUMO_VEGETAIS));
    assert!(!cfg.artifact_path.exists());
}

#[test]
fn dataset_missing_a_raw_column_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let text = dataset_csv(20, None).replace("MTRANS", "TRANSPORT");
    let data = dir.path().join("Obesity.csv");
    std::fs::write(&data, text).unwrap();

    let err = Trainer::new(config(dir.path(), data, 5)).run().unwrap_err();
    assert!(matches!(err, ObesityError::SchemaMismatch(m) if m.contains("MTRANS")));
}

#[test]
fn absent_artifact_is_unavailable_not_a_crash() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_artifact(&dir.path().join("modelo_obesidade.msgpack")).unwrap_err();
    assert!(matches!(err, ObesityError::ArtifactUnavailable(_)));
    assert!(!err.is_request_error());
}

#[test]
fn corrupt_artifact_is_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("modelo_obesidade.msgpack");
    std::fs::write(&path, b"not a model").unwrap();
    assert!(matches!(load_artifact(&path), Err(ObesityError::Decode(_))));
}

#[test]
fn cache_loads_once_and_keeps_serving() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_dataset(dir.path(), 140);
    let cfg = config(dir.path(), data, 10);

    let cache = ModelCache::new(&cfg.artifact_path);
    assert!(matches!(
        cache.get_or_load(),
        Err(ObesityError::ArtifactUnavailable(_))
    ));

    Trainer::new(cfg.clone()).run().unwrap();
    let first = cache.get_or_load().unwrap().predict(&sample_record()).unwrap();
    assert!(cache.is_ready());

    std::fs::remove_file(&cfg.artifact_path).unwrap();
    let second = cache.get_or_load().unwrap().predict(&sample_record()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn concurrent_predictions_share_one_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_dataset(dir.path(), 140);
    let predictor =
        Predictor::from_pipeline(Trainer::new(config(dir.path(), data, 10)).fit().unwrap());
    let expected = predictor.predict(&sample_record()).unwrap();

    std::thread::scope(|s| {
        for _ in 0..4 {
            let p = predictor.clone();
            let expected = expected.clone();
            s.spawn(move || assert_eq!(p.predict(&sample_record()).unwrap(), expected));
        }
    });
}
