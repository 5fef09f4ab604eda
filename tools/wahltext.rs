//! wahltext: render an election text from a results file.
//!
//! Usage:
//!   wahltext --file ergebnis.json
//!   wahltext --variables variablen.json --format json --seed 7
//!   wahltext --file ergebnis.json --data wahl_data/kommunalwahl -v

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use wahltext_engine::schema::election::ElectionRecord;
use wahltext_engine::schema::variables::Variables;
use wahltext_engine::{PipelineError, WahltextEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "wahltext")]
#[command(about = "Generate German election texts from structured results")]
struct Cli {
    /// Raw election results (JSON)
    #[arg(short, long, value_name = "FILE", conflicts_with = "variables")]
    file: Option<PathBuf>,

    /// Ready-made variable mapping (JSON object of scalars)
    #[arg(long, value_name = "FILE")]
    variables: Option<PathBuf>,

    /// Data set directory with templates, corrections, parties and layout
    #[arg(long, value_name = "DIR", default_value = "wahl_data/kommunalwahl")]
    data: PathBuf,

    /// Seed for choosing between template variants
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: Format,

    /// Print status messages
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("ERROR: {}", e);
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let engine = WahltextEngine::builder()
        .data_dir(&cli.data)
        .seed(cli.seed)
        .build()?;
    info!(data = %cli.data.display(), "engine ready");

    let vars = match (&cli.file, &cli.variables) {
        (Some(path), _) => {
            let record = ElectionRecord::load_json(path).map_err(PipelineError::from)?;
            engine.variables_for(&record)?
        }
        (None, Some(path)) => Variables::load_json(path)?,
        (None, None) => return Err("either --file or --variables is required".into()),
    };
    debug!(variables = vars.len(), "variables loaded");

    let article = engine.compose(&vars)?;
    match cli.format {
        Format::Text => println!("{}", article),
        Format::Json => println!("{}", article.to_json()?),
    }
    info!("done");
    Ok(())
}
