// File: src/bin/main.rs
use clap::{Parser, Subcommand};
use slang_core::batcher::{stream_files, WindowedBatcher};
use slang_core::config::PipelineConfig;
use slang_core::core::tokenizer::TextProcessor;
use slang_core::dictionary::ReferenceDictionary;
use slang_core::persistence::{load_model, save_model, StorageLayout};
use slang_core::{EmbeddingModel, Orchestrator, Result, SlangError};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, Level};

#[derive(Parser)]
#[command(name = "slang_pipeline")]
#[command(about = "Windowed word-embedding training and slang glossary generation", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON config file; missing fields use defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Storage root (overrides the config file).
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Window width in hours (overrides the config file).
    #[arg(long, global = true)]
    window_hours: Option<f64>,
    /// Retention horizon in windows (overrides the config file).
    #[arg(long, global = true)]
    retention: Option<usize>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train the base model from an initialization stream.
    Init {
        /// JSON-lines comment files, in time order.
        #[arg(long, required = true, num_args = 1..)]
        stream: Vec<PathBuf>,
        /// Reference word list, one word per line.
        #[arg(long)]
        dictionary: Option<PathBuf>,
        /// Only learn words the reference dictionary knows.
        #[arg(long, requires = "dictionary")]
        restrict: bool,
    },
    /// Run the windowed update pipeline on top of the base model.
    Run {
        #[arg(long, required = true, num_args = 1..)]
        stream: Vec<PathBuf>,
        #[arg(long)]
        dictionary: PathBuf,
        /// Base snapshot directory. Default: <root>/models/init
        #[arg(long)]
        base: Option<PathBuf>,
    },
    /// Print the nearest neighbours of a word from a saved snapshot.
    Neighbors {
        #[arg(long)]
        snapshot: PathBuf,
        word: String,
        #[arg(long, default_value_t = 10)]
        top_n: usize,
    },
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.storage_root = root.clone();
    }
    if let Some(hours) = cli.window_hours {
        config.window_hours = hours;
    }
    if let Some(k) = cli.retention {
        config.retention_windows = k;
    }
    config.validate()?;
    Ok(config)
}

fn init(config: &PipelineConfig, stream: &[PathBuf], dictionary: Option<&Path>, restrict: bool) -> Result<()> {
    let processor = TextProcessor::new();
    let reference = dictionary
        .map(|path| ReferenceDictionary::from_word_list(path, &processor))
        .transpose()?;

    let records = stream_files(stream)?;
    let mut batcher = WindowedBatcher::from_config(records, config);
    let restrict_to = reference.as_ref().filter(|_| restrict);
    let model = EmbeddingModel::initialize(batcher.by_ref(), &config.trainer, restrict_to);
    info!(stats = ?batcher.stats(), vocabulary = model.vocabulary_size(), "initialization stream consumed");

    let layout = StorageLayout::new(config.storage_root.clone());
    save_model(&model, &layout.init_snapshot_dir())?;
    info!(path = %layout.init_snapshot_dir().display(), "saved base model");

    if let Some(reference) = &reference {
        let unknown = model.unfamiliar_words(reference, 1);
        info!(unknown = unknown.len(), "words in the base model unknown to the dictionary");
    }
    Ok(())
}

fn run(config: PipelineConfig, stream: &[PathBuf], dictionary: &Path, base: Option<PathBuf>) -> Result<()> {
    let processor = TextProcessor::new();
    let reference = ReferenceDictionary::from_word_list(dictionary, &processor)?;
    let layout = StorageLayout::new(config.storage_root.clone());
    let base_dir = base.unwrap_or_else(|| layout.init_snapshot_dir());
    let stable = load_model(&base_dir)?;
    info!(path = %base_dir.display(), vocabulary = stable.vocabulary_size(), "loaded base model");

    let records = stream_files(stream)?;
    let mut batcher = WindowedBatcher::from_config(records, &config);
    let mut orchestrator = Orchestrator::new(config, stable, reference)?;
    let reports = orchestrator.run(batcher.by_ref())?;

    info!(stats = ?batcher.stats(), "stream consumed");
    for report in &reports {
        println!(
            "{}  comments={:<6} replayed={} evicted={} vocabulary={:<7} glossary={}",
            report.window,
            report.comments,
            report.replayed,
            report.evicted.len(),
            report.vocabulary,
            report.glossary_entries
        );
    }
    Ok(())
}

fn neighbors(snapshot: &Path, word: &str, top_n: usize) -> Result<()> {
    let model = load_model(snapshot)?;
    match model.nearest_neighbors(word, top_n) {
        Ok(neighbors) => {
            for (other, score) in neighbors {
                println!("{other:<24} {score:.4}");
            }
            Ok(())
        }
        Err(SlangError::UnknownWord(w)) => {
            println!("'{w}' is not in this snapshot's vocabulary");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let outcome = load_config(&cli).and_then(|config| match cli.command {
        Command::Init { ref stream, ref dictionary, restrict } => {
            init(&config, stream, dictionary.as_deref(), restrict)
        }
        Command::Run { ref stream, ref dictionary, ref base } => {
            run(config, stream, dictionary, base.clone())
        }
        Command::Neighbors { ref snapshot, ref word, top_n } => neighbors(snapshot, word, top_n),
    });

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
