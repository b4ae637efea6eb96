//! Batched partial order alignment.
//!
//! Reads are grouped into independent windows. For each window, a partial order graph is
//! built by aligning every read to the graph of the reads before it, after which a
//! consensus sequence and/or a multiple sequence alignment is extracted. Windows are
//! collected in a [`Batch`](batch::Batch) and processed in parallel.

use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing::Level;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry};

use crate::errors::StatusType;

pub mod errors;
pub mod config;
pub mod graphs;
pub mod aligner;
pub mod output;
pub mod batch;
pub mod io;

pub use batch::{Batch, WindowId};
pub use config::{BatchConfig, OutputMode};

static INIT: OnceLock<Result<(), StatusType>> = OnceLock::new();

/// Process-wide initialization: installs the logging subscriber (stderr, filtered by
/// `RUST_LOG`, `info` by default). Must be called before creating batches to get any log
/// output. Calling it again returns the outcome of the first call.
pub fn init() -> Result<(), StatusType> {
    init_with_level(Level::INFO)
}

/// Like [`init`], but with the given default log level when `RUST_LOG` is not set
pub fn init_with_level(default_level: Level) -> Result<(), StatusType> {
    *INIT.get_or_init(|| {
        let filter_layer = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_level.as_str()))
            .map_err(|_| StatusType::GenericError)?;

        let stderr_log = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_file(false)
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .with_filter(filter_layer);

        Registry::default()
            .with(stderr_log)
            .try_init()
            .map_err(|_| StatusType::GenericError)
    })
}
