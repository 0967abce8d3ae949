use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use obesity_predictor::dataset::{IntCoercion, load_dataset};
use obesity_predictor::forest::ForestParams;
use obesity_predictor::predictor::{ModelCache, PatientRecord, Prediction};
use obesity_predictor::schema::{self, Domain, FeatureKind, FeatureSpec};
use obesity_predictor::stats::DatasetSummary;
use obesity_predictor::store::ArtifactStore;
use obesity_predictor::{ObesityError, Trainer, TrainerConfig};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "obesity-predictor",
    version,
    about = "Train and serve an obesity-level classifier"
)]
struct Cli {
    /// Increase verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fit the pipeline on the labelled CSV and save the artifact
    Train(TrainArgs),
    /// Predict the obesity level of one patient
    Predict(PredictArgs),
    /// Print descriptive figures for the raw dataset
    Stats {
        #[arg(long, default_value = "Obesity.csv")]
        data: PathBuf,
    },
    /// List artifact versions in a store
    Versions {
        #[arg(long)]
        store: PathBuf,
    },
    /// Point a store back at an older version
    Rollback {
        #[arg(long)]
        store: PathBuf,
        /// Version to pin; defaults to the one before the current
        #[arg(long)]
        to: Option<u64>,
    },
}

#[derive(Debug, Args)]
struct TrainArgs {
    #[arg(long, default_value = "Obesity.csv")]
    data: PathBuf,
    #[arg(long, default_value = "modelo_obesidade.msgpack")]
    model: PathBuf,
    /// Publish into a versioned store directory instead of --model
    #[arg(long)]
    store: Option<PathBuf>,
    #[arg(long, default_value_t = 100)]
    trees: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, default_value_t = 0.2)]
    test_ratio: f64,
    #[arg(long)]
    max_depth: Option<usize>,
    /// Reject fractional values in integer columns instead of truncating
    #[arg(long)]
    strict_ints: bool,
}

#[derive(Debug, Args)]
struct PredictArgs {
    #[arg(long, default_value = "modelo_obesidade.msgpack")]
    model: PathBuf,
    /// Serve the current version of a store instead of --model
    #[arg(long)]
    store: Option<PathBuf>,
    /// Prompt for each field, repeatedly, until `exit`
    #[arg(short, long)]
    interactive: bool,
    #[command(flatten)]
    record: RecordArgs,
}

#[derive(Debug, Args)]
struct RecordArgs {
    #[arg(long, default_value = "Male", value_parser = ["Male", "Female"])]
    genero: String,
    #[arg(long, default_value_t = 25, value_parser = clap::value_parser!(u32).range(1..=120))]
    idade: u32,
    #[arg(long, default_value_t = 1.70)]
    altura_m: f64,
    #[arg(long, default_value_t = 70.0)]
    peso_kg: f64,
    #[arg(long, default_value = "yes", value_parser = ["yes", "no"])]
    historia_familiar_sobrepeso: String,
    #[arg(long, default_value = "yes", value_parser = ["yes", "no"])]
    come_comida_calorica_freq: String,
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..=3))]
    freq_consumo_vegetais: u32,
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..=4))]
    num_refeicoes_principais: u32,
    #[arg(long, default_value = "Sometimes", value_parser = ["Sometimes", "Frequently", "Always", "no"])]
    come_entre_refeicoes: String,
    #[arg(long, default_value = "yes", value_parser = ["yes", "no"])]
    fumante: String,
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..=3))]
    consumo_agua_litros: u32,
    #[arg(long, default_value = "yes", value_parser = ["yes", "no"])]
    monitora_calorias: String,
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(0..=3))]
    freq_atividade_fisica: u32,
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(0..=2))]
    tempo_uso_dispositivos: u32,
    #[arg(long, default_value = "Sometimes", value_parser = ["Sometimes", "Frequently", "Always", "no"])]
    freq_consumo_alcool: String,
    #[arg(long, default_value = "Public_Transportation", value_parser = ["Public_Transportation", "Walking", "Automobile", "Motorbike", "Bike"])]
    meio_transporte: String,
}

impl From<RecordArgs> for PatientRecord {
    fn from(a: RecordArgs) -> Self {
        PatientRecord {
            genero: a.genero,
            idade: a.idade,
            altura_m: a.altura_m,
            peso_kg: a.peso_kg,
            historia_familiar_sobrepeso: a.historia_familiar_sobrepeso,
            come_comida_calorica_freq: a.come_comida_calorica_freq,
            freq_consumo_vegetais: a.freq_consumo_vegetais,
            num_refeicoes_principais: a.num_refeicoes_principais,
            come_entre_refeicoes: a.come_entre_refeicoes,
            fumante: a.fumante,
            consumo_agua_litros: a.consumo_agua_litros,
            monitora_calorias: a.monitora_calorias,
            freq_atividade_fisica: a.freq_atividade_fisica,
            tempo_uso_dispositivos: a.tempo_uso_dispositivos,
            freq_consumo_alcool: a.freq_consumo_alcool,
            meio_transporte: a.meio_transporte,
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Command::Train(args) => train(args),
        Command::Predict(args) => predict(args),
        Command::Stats { data } => stats(data),
        Command::Versions { store } => versions(store),
        Command::Rollback { store, to } => rollback(store, to),
    }
}

fn train(args: TrainArgs) -> anyhow::Result<ExitCode> {
    let config = TrainerConfig {
        dataset_path: args.data,
        artifact_path: args.model,
        store_dir: args.store,
        test_ratio: args.test_ratio,
        forest: ForestParams {
            n_trees: args.trees,
            seed: args.seed,
            max_depth: args.max_depth,
        },
        int_coercion: if args.strict_ints {
            IntCoercion::Strict
        } else {
            IntCoercion::Truncate
        },
    };

    println!("🧠 Training model from {:?}...", config.dataset_path);
    let report = Trainer::new(config).run().context("training failed")?;
    println!(
        "✅ Model trained on {} rows ({} held out). Held-out accuracy: {:.2}%",
        report.n_train,
        report.n_test,
        report.accuracy * 100.0
    );
    println!("   Classes: {}", report.classes.join(", "));
    match report.version {
        Some(v) => println!("💾 Published v{v} at {:?}", report.artifact),
        None => println!("💾 Saved model to {:?}", report.artifact),
    }
    Ok(ExitCode::SUCCESS)
}

fn predict(args: PredictArgs) -> anyhow::Result<ExitCode> {
    let path = match &args.store {
        Some(dir) => match ArtifactStore::open_existing(dir).and_then(|s| s.current_path()) {
            Ok(p) => p,
            Err(e) => return Ok(report_error(&e)),
        },
        None => args.model.clone(),
    };
    let cache = ModelCache::new(path);
    let predictor = match cache.get_or_load() {
        Ok(p) => p,
        Err(e @ ObesityError::ArtifactUnavailable(_))
        | Err(e @ ObesityError::ArtifactIncompatible(_)) => {
            return Ok(report_error(&e));
        }
        Err(e) => return Err(e).context("failed to load model"),
    };

    if !args.interactive {
        let record = PatientRecord::from(args.record);
        return Ok(match predictor.predict_with_proba(&record) {
            Ok(p) => {
                print_prediction(&p);
                ExitCode::SUCCESS
            }
            Err(e) => report_error(&e),
        });
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        let Some(record) = prompt_record(&mut lines)? else {
            break;
        };
        match predictor.predict_with_proba(&record) {
            Ok(p) => print_prediction(&p),
            Err(e) => {
                report_error(&e);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn report_error(e: &ObesityError) -> ExitCode {
    eprintln!("❌ {}", e.user_message());
    if e.is_request_error() {
        ExitCode::from(1)
    } else {
        ExitCode::from(2)
    }
}

fn print_prediction(p: &Prediction) {
    println!("Predicted level: {}", p.label);
    if let Some(imc) = p.imc {
        println!("Computed BMI: {imc:.2}");
    }
    for (label, share) in &p.probabilities {
        println!("{:>25} | {:>6.2}%", label, share * 100.0);
    }
}

/// Asks for every caller-supplied feature. `None` on `exit` or end of input.
fn prompt_record(
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> anyhow::Result<Option<PatientRecord>> {
    let mut answers = Vec::with_capacity(schema::FEATURES.len());
    for spec in schema::FEATURES.iter() {
        let hint = match spec.domain {
            Domain::Choices(c) => c.join("/"),
            Domain::Range { min, max } => format!("{min}-{max}"),
            Domain::Derived => continue,
        };
        loop {
            print!("{} [{}] (or 'exit'): ", spec.label, hint);
            io::stdout().flush()?;
            let Some(line) = lines.next().transpose()? else {
                return Ok(None);
            };
            let answer = line.trim().to_string();
            if answer.eq_ignore_ascii_case("exit") {
                return Ok(None);
            }
            if accept(spec, &answer) {
                answers.push(answer);
                break;
            }
            println!("  expected one of: {hint}");
        }
    }

    let num = |i: usize| -> anyhow::Result<f64> {
        answers[i]
            .parse::<f64>()
            .with_context(|| format!("`{}` is not a number", answers[i]))
    };
    let int = |i: usize| -> anyhow::Result<u32> {
        answers[i]
            .parse::<u32>()
            .with_context(|| format!("`{}` is not a whole number", answers[i]))
    };
    Ok(Some(PatientRecord {
        genero: answers[0].clone(),
        idade: int(1)?,
        altura_m: num(2)?,
        peso_kg: num(3)?,
        historia_familiar_sobrepeso: answers[4].clone(),
        come_comida_calorica_freq: answers[5].clone(),
        freq_consumo_vegetais: int(6)?,
        num_refeicoes_principais: int(7)?,
        come_entre_refeicoes: answers[8].clone(),
        fumante: answers[9].clone(),
        consumo_agua_litros: int(10)?,
        monitora_calorias: answers[11].clone(),
        freq_atividade_fisica: int(12)?,
        tempo_uso_dispositivos: int(13)?,
        freq_consumo_alcool: answers[14].clone(),
        meio_transporte: answers[15].clone(),
    }))
}

/// Whether a prompt answer lies in the feature's domain. Fields stored as
/// whole numbers must parse as integers.
fn accept(spec: &FeatureSpec, answer: &str) -> bool {
    match (spec.kind, spec.domain) {
        (FeatureKind::Categorical, Domain::Choices(c)) => c.contains(&answer),
        (_, Domain::Range { min, max }) => {
            let value = if spec.integral || spec.name == schema::IDADE {
                answer.parse::<u32>().ok().map(f64::from)
            } else {
                answer.parse::<f64>().ok().filter(|v| v.is_finite())
            };
            value.is_some_and(|v| (min..=max).contains(&v))
        }
        _ => false,
    }
}

fn stats(data: PathBuf) -> anyhow::Result<ExitCode> {
    let raw = match load_dataset(&data) {
        Ok(t) => t,
        Err(e @ ObesityError::DatasetNotFound(_)) => {
            eprintln!("⚠️  {e}");
            return Ok(ExitCode::from(2));
        }
        Err(e) => return Err(e).context("failed to read dataset"),
    };
    let s = DatasetSummary::from_raw(&raw);
    println!("Total patients: {}", s.patients);
    if let Some(w) = s.mean_weight_kg {
        println!("Mean weight: {w:.1} kg");
    }
    if let Some(a) = s.mean_age {
        println!("Mean age: {a:.1} years");
    }
    println!("Obesity level distribution:");
    for (label, count) in &s.label_counts {
        println!("{label:>25} | {count}");
    }
    Ok(ExitCode::SUCCESS)
}

fn versions(dir: PathBuf) -> anyhow::Result<ExitCode> {
    let store = ArtifactStore::open_existing(&dir)?;
    let current = store.current()?;
    for id in store.versions()? {
        let marker = if Some(id) == current { "*" } else { " " };
        match store.load_version(id) {
            Ok(p) => {
                let meta = p.meta();
                let acc = meta
                    .test_accuracy
                    .map(|a| format!("{:.2}%", a * 100.0))
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{marker} v{id}  trees={} seed={} rows={} accuracy={acc}",
                    meta.n_trees,
                    meta.seed,
                    meta.n_train + meta.n_test
                );
            }
            Err(e) => println!("{marker} v{id}  unreadable: {e}"),
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn rollback(dir: PathBuf, to: Option<u64>) -> anyhow::Result<ExitCode> {
    let store = ArtifactStore::open_existing(&dir)?;
    let id = match to {
        Some(id) => {
            store.pin(id)?;
            id
        }
        None => store.rollback()?,
    };
    println!("📌 Serving v{id}");
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> &'static FeatureSpec {
        schema::feature(name).unwrap()
    }

    fn answers(values: &[&str]) -> Vec<io::Result<String>> {
        values.iter().map(|v| Ok(v.to_string())).collect()
    }

    #[test]
    fn whole_number_fields_reject_fractions_and_negatives() {
        assert!(!accept(spec(schema::FREQ_ATIVIDADE_FISICA), "-1"));
        assert!(!accept(spec(schema::FREQ_CONSUMO_VEGETAIS), "3.9"));
        assert!(!accept(spec(schema::IDADE), "25.9"));
        assert!(!accept(spec(schema::FREQ_CONSUMO_VEGETAIS), "4"));
        assert!(accept(spec(schema::FREQ_CONSUMO_VEGETAIS), "3"));
        assert!(accept(spec(schema::IDADE), "25"));
    }

    #[test]
    fn measurements_accept_decimals_within_range() {
        assert!(accept(spec(schema::ALTURA_M), "1.75"));
        assert!(!accept(spec(schema::ALTURA_M), "NaN"));
        assert!(!accept(spec(schema::PESO_KG), "-70"));
        assert!(!accept(spec(schema::GENERO), "male"));
        assert!(accept(spec(schema::GENERO), "Female"));
    }

    #[test]
    fn prompt_asks_again_after_a_rejected_answer() {
        let mut lines = answers(&[
            "Female", "-1", "30", "1.65", "60", "yes", "no", "3.9", "2", "3", "Sometimes", "no",
            "2", "no", "-1", "1", "0", "no", "Walking",
        ])
        .into_iter();
        let record = prompt_record(&mut lines).unwrap().unwrap();
        assert_eq!(record.idade, 30);
        assert_eq!(record.freq_consumo_vegetais, 2);
        assert_eq!(record.freq_atividade_fisica, 1);
        assert_eq!(record.tempo_uso_dispositivos, 0);
        assert_eq!(record.meio_transporte, "Walking");
        assert!(lines.next().is_none());
    }

    #[test]
    fn prompt_stops_on_exit() {
        let mut lines = answers(&["Male", "exit"]).into_iter();
        assert!(prompt_record(&mut lines).unwrap().is_none());
    }
}
