//! Command-line entry point: train a named-entity model from a JSON corpus.

use std::path::PathBuf;

use clap::Parser;

use kotoha_trainer::{TrainConfig, train};

/// CLI arguments
#[derive(Parser)]
#[command(name = "train")]
#[command(about = "Train a named-entity model from a span-annotated JSON corpus")]
#[command(version)]
struct Cli {
    /// Path to the training data JSON file
    #[arg(default_value = "training_file.json")]
    input_filepath: PathBuf,

    /// Saved model to fine-tune; a blank 'en' pipeline is used if omitted
    #[arg(short, long)]
    model: Option<String>,

    /// Directory to write the trained model to; kept in memory if omitted
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Number of training iterations
    #[arg(short = 'n', long, default_value_t = 100)]
    n_iter: usize,

    /// RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = TrainConfig {
        input: &cli.input_filepath,
        output_dir: cli.output_dir.as_deref(),
        base_model: cli.model.as_deref(),
        n_iter: cli.n_iter,
        seed: cli.seed,
    };

    if let Err(e) = train(&config) {
        eprintln!("Training failed: {e:#}");
        std::process::exit(1);
    }
}
