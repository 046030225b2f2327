//! Binary entry point for the binlog-to-unified-log converter.
#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, warn};

use tessera::convert::{BinlogTranslator, TranslatorOptions};
use tessera::schema::rgmapping::RgMapping;
use tessera::{Config, GraphError};

#[derive(Parser, Debug)]
#[command(
    name = "convert",
    version,
    about = "Translate relational change events into unified-log records"
)]
struct Cli {
    /// RGMapping JSON file describing table-to-label projection.
    #[arg(long)]
    rg_mapping: PathBuf,

    /// Change-event source (JSON lines); stdin when omitted.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Unified-log sink; stdout when omitted.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Optional TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Partition count; overrides the config file.
    #[arg(long)]
    subgraphs: Option<u32>,

    /// Epoch boundary every N accepted messages; overrides the config file.
    #[arg(long)]
    logs_per_epoch: Option<u64>,
}

fn main() -> ExitCode {
    tessera::logging::init_tracing();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "converter failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> tessera::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::from_toml_path(path)?,
        None => Config::default(),
    };
    if let Some(subgraphs) = cli.subgraphs {
        config.partitions = subgraphs;
    }
    if let Some(logs_per_epoch) = cli.logs_per_epoch {
        config.logs_per_epoch = logs_per_epoch;
    }
    config.validate()?;

    let mapping = RgMapping::from_file(&cli.rg_mapping)?;
    let mut translator = BinlogTranslator::new(&mapping, TranslatorOptions::from_config(&config))?;

    let source: Box<dyn BufRead> = match &cli.input {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let mut sink: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    for line in source.lines() {
        let line = line?;
        match translator.translate(&line) {
            Ok(Some(record)) => writeln!(sink, "{record}")?,
            Ok(None) => {}
            // Per-message parse failures drop the message and keep going.
            Err(err @ GraphError::Parse(_)) | Err(err @ GraphError::Serialization(_)) => {
                warn!(%err, "dropped malformed change event");
            }
            Err(err @ GraphError::Unsupported(_)) => {
                error!(%err, "rejected change event");
            }
            // Anything else (unknown OIDs above all) would corrupt the graph
            // if skipped; stop and surface it.
            Err(err) => return Err(err),
        }
    }
    sink.flush()?;
    Ok(())
}
