// ml_examples/src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use iris_mlp::{ConsoleReporter, FileSource, LogReporter, Reporter, RunOutcome, Session, TrainConfig};
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Train a flower classifier from a CSV file and predict species", long_about = None)]
struct Args {
    /// CSV with columns Id, four measurements, species
    #[arg(short, long, default_value = "Iris.csv")]
    data: PathBuf,

    /// JSON file overriding training settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    epochs: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Measurements to classify: sepal length, sepal width, petal length, petal width
    #[arg(short, long, value_name = "SL,SW,PL,PW")]
    predict: Vec<String>,

    /// Also classify a random row of the dataset
    #[arg(long)]
    random_example: bool,

    /// Print the dataset summary, training history and evaluation as JSON
    #[arg(long)]
    json: bool,

    /// Send progress to the logger (`RUST_LOG=info`) instead of stdout
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => TrainConfig::from_json_file(path)?,
        None => TrainConfig::default(),
    };
    if let Some(epochs) = args.epochs {
        config.epochs = epochs;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.validate().context("invalid training configuration")?;

    let session = Session::new(config);
    let source = FileSource::new(&args.data);
    let mut reporter: Box<dyn Reporter> = if args.quiet {
        Box::new(LogReporter)
    } else {
        Box::new(ConsoleReporter)
    };

    let report = match session.load_and_train(&source, reporter.as_mut())? {
        RunOutcome::Trained(report) => report,
        RunOutcome::Ignored => return Ok(()),
    };
    let evaluation = session.evaluate()?;
    info!("Accuracy over the full dataset: {:.1}%", evaluation.accuracy * 100.0);

    if args.json {
        let doc = serde_json::json!({
            "summary": session.summary(),
            "training": report,
            "evaluation": evaluation,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        println!("Confusion matrix (rows: actual, columns: predicted)");
        for (label, row) in evaluation.labels.iter().zip(&evaluation.confusion) {
            println!("  {:>12} {:?}", label, row);
        }
    }

    for raw in &args.predict {
        let fields: Vec<&str> = raw.split(',').collect();
        match session.predict(&fields) {
            Ok(prediction) => println!("\n{}\n{}", raw, prediction),
            Err(e) => eprintln!("{}: {}", raw, e),
        }
    }

    if args.random_example {
        let sample = session.random_example(&mut rand::thread_rng())?;
        let prediction = session.predict_values(&sample.features)?;
        println!(
            "\nRandom example {:?} (actual: {})\n{}",
            sample.features, sample.label, prediction
        );
    }

    Ok(())
}
