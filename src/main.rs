use std::fs;
use std::fs::File;
use std::io::{stdout, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn, Level};

use poabatch::batch::{Batch, WindowId};
use poabatch::config::{BatchConfig, OutputMode};
use poabatch::io::fasta::{read_window, OutputWriter, WindowReads};
use poabatch::io::graph_to_dot;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct CliArgs {
    /// Set verbosity level. Use multiple times to increase the verbosity level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<CliSubcommand>,
}

#[derive(Subcommand, Debug)]
enum CliSubcommand {
    /// Compute a consensus sequence and/or MSA for each window
    Consensus(ConsensusArgs),
}

#[derive(Args, Debug)]
struct ConsensusArgs {
    /// FASTA files (optionally gzipped), each containing the reads of a single window
    #[arg(required = true)]
    #[clap(help_heading = "Inputs")]
    windows: Vec<PathBuf>,

    /// Batch configuration in JSON format. Command line options take precedence.
    #[arg(short, long)]
    #[clap(help_heading = "Inputs")]
    config: Option<PathBuf>,

    /// Output filename. If not given, defaults to stdout
    #[arg(short, long)]
    #[clap(help_heading = "Outputs")]
    output: Option<PathBuf>,

    /// Which outputs to generate for each window
    #[arg(value_enum, short = 'O', long)]
    #[clap(help_heading = "Outputs")]
    output_mode: Option<OutputMode>,

    /// Write the graph of each window in DOT format to the given directory
    #[arg(short, long)]
    #[clap(help_heading = "Outputs")]
    debug_output: Option<PathBuf>,

    /// Number of worker threads
    #[arg(short = 'j', long)]
    #[clap(help_heading = "Processing")]
    num_threads: Option<usize>,

    /// Maximum read length
    #[arg(long)]
    #[clap(help_heading = "Processing")]
    max_sequence_size: Option<usize>,

    /// Maximum number of reads per window
    #[arg(long)]
    #[clap(help_heading = "Processing")]
    max_sequences_per_poa: Option<usize>,

    /// Maximum number of windows processed together
    #[arg(long)]
    #[clap(help_heading = "Processing")]
    max_poas_per_batch: Option<usize>,

    /// Score for matching bases
    #[arg(short = 'm', allow_negative_numbers = true)]
    #[clap(help_heading = "Alignment configuration")]
    match_score: Option<i32>,

    /// Score for mismatching bases
    #[arg(short = 'n', allow_negative_numbers = true)]
    #[clap(help_heading = "Alignment configuration")]
    mismatch_score: Option<i32>,

    /// Score for each gap position
    #[arg(short = 'g', allow_negative_numbers = true)]
    #[clap(help_heading = "Alignment configuration")]
    gap_score: Option<i32>,
}

impl ConsensusArgs {
    fn batch_config(&self) -> Result<BatchConfig> {
        let mut config = if let Some(path) = &self.config {
            BatchConfig::load(path)
                .with_context(|| format!("Could not load configuration from {}", path.display()))?
        } else {
            BatchConfig::default()
        };

        if let Some(v) = self.output_mode { config.output_mode = v; }
        if let Some(v) = self.num_threads { config.num_threads = v; }
        if let Some(v) = self.max_sequence_size { config.max_sequence_size = v; }
        if let Some(v) = self.max_sequences_per_poa { config.max_sequences_per_poa = v; }
        if let Some(v) = self.max_poas_per_batch { config.max_poas_per_batch = v; }
        if let Some(v) = self.match_score { config.scoring.match_score = v; }
        if let Some(v) = self.mismatch_score { config.scoring.mismatch_score = v; }
        if let Some(v) = self.gap_score { config.scoring.gap_score = v; }

        config.validate()?;

        Ok(config)
    }
}

fn write_debug_graph(dir: &Path, window: &WindowReads, batch: &Batch, id: WindowId) -> Result<()> {
    let Some(graph) = batch.graph(id) else {
        return Ok(());
    };

    let path = dir.join(format!("{}.dot", window.name));
    let mut file = BufWriter::new(File::create(&path)?);
    graph_to_dot(&mut file, graph)
        .with_context(|| format!("Could not write graph to {}", path.display()))?;

    Ok(())
}

fn consensus_subcommand(args: &ConsensusArgs) -> Result<()> {
    let config = args.batch_config()?;
    let output_mode = config.output_mode;
    let chunk_size = config.max_poas_per_batch;

    if let Some(dir) = &args.debug_output {
        fs::create_dir_all(dir)?;
    }

    // Determine where to write the outputs to
    let output: Box<dyn Write> = if let Some(path) = &args.output {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?
        }

        Box::new(File::create(path)?)
    } else {
        Box::new(stdout())
    };
    let mut writer = OutputWriter::new(BufWriter::new(output));

    let mut batch = Batch::new(config)?;
    let mut num_failed = 0;

    for (batch_ix, chunk) in args.windows.chunks(chunk_size).enumerate() {
        let windows = chunk.iter()
            .map(|path| read_window(path)
                .with_context(|| format!("Could not read window from {}", path.display())))
            .collect::<Result<Vec<WindowReads>>>()?;

        batch.reset();
        let ids: Vec<Option<WindowId>> = windows.iter()
            .map(|window| match batch.add_window(window.reads.as_slice()) {
                Ok(id) => Some(id),
                Err(status) => {
                    warn!(window = %window.name, %status, "Could not add window to batch, skipping.");
                    None
                }
            })
            .collect();

        info!(batch = batch_ix, windows = batch.window_count(), "Processing batch");
        batch.process()?;

        for (window, id) in windows.iter().zip(ids) {
            let Some(id) = id else {
                num_failed += 1;
                continue;
            };

            if let Some(dir) = &args.debug_output {
                write_debug_graph(dir, window, &batch, id)?;
            }

            if let Some(status) = batch.window_status(id).filter(|s| !s.is_success()) {
                warn!(window = %window.name, %status, "Window failed, skipping.");
                num_failed += 1;
                continue;
            }

            if output_mode.has_consensus() {
                writer.write_consensus(&window.name, batch.consensus(id)?)?;
            }

            if output_mode.has_msa() {
                writer.write_msa(window, batch.msa(id)?)?;
            }
        }
    }

    info!(windows = args.windows.len(), num_failed, "Done.");

    Ok(())
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    let level = match args.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    poabatch::init_with_level(level)?;

    match &args.command {
        Some(CliSubcommand::Consensus(v)) => consensus_subcommand(v)?,
        None => anyhow::bail!("No subcommand given."),
    };

    Ok(())
}
