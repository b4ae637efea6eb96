use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::aligner::scoring::GapLinear;
use crate::errors::PoaBatchError;

/// Which outputs are computed for each window
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Only the consensus sequence
    #[default]
    Consensus,

    /// Only the multiple sequence alignment
    Msa,

    /// Consensus and multiple sequence alignment
    Both,
}

impl OutputMode {
    pub fn has_consensus(&self) -> bool {
        matches!(self, Self::Consensus | Self::Both)
    }

    pub fn has_msa(&self) -> bool {
        matches!(self, Self::Msa | Self::Both)
    }
}

/// Limits and settings fixed for the lifetime of a [`Batch`](crate::batch::Batch).
///
/// All storage of a batch is sized from these values when the batch is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_poas_per_batch: usize,
    pub max_sequence_size: usize,
    pub max_sequences_per_poa: usize,

    /// Maximum number of symbol nodes, the synthetic start and end nodes are not counted
    pub max_nodes_per_window: usize,

    /// Maximum number of edges, including edges from the start node and to the end node
    pub max_edges_per_window: usize,

    /// Upper bound on the number of steps of a single traceback or consensus traversal
    pub loop_count_upper_bound: usize,

    pub output_mode: OutputMode,
    pub scoring: GapLinear,
    pub num_threads: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        let max_sequence_size = 1024;
        let max_nodes_per_window = 3 * max_sequence_size;

        BatchConfig {
            max_poas_per_batch: 64,
            max_sequence_size,
            max_sequences_per_poa: 100,
            max_nodes_per_window,
            max_edges_per_window: 4 * max_nodes_per_window,
            loop_count_upper_bound: 4 * (max_nodes_per_window + max_sequence_size),
            output_mode: OutputMode::Consensus,
            scoring: GapLinear::default(),
            num_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

impl BatchConfig {
    pub fn from_json_reader(reader: impl Read) -> Result<Self, PoaBatchError> {
        let config: BatchConfig = serde_json::from_reader(reader)?;
        config.validate()?;

        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PoaBatchError> {
        let file = File::open(path.as_ref())
            .map_err(|source| PoaBatchError::FileReadError { source })?;

        Self::from_json_reader(BufReader::new(file))
    }

    pub fn validate(&self) -> Result<(), PoaBatchError> {
        let limits = [
            ("max_poas_per_batch", self.max_poas_per_batch),
            ("max_sequence_size", self.max_sequence_size),
            ("max_sequences_per_poa", self.max_sequences_per_poa),
            ("max_nodes_per_window", self.max_nodes_per_window),
            ("max_edges_per_window", self.max_edges_per_window),
            ("loop_count_upper_bound", self.loop_count_upper_bound),
            ("num_threads", self.num_threads),
        ];

        if let Some((name, _)) = limits.iter().find(|(_, value)| *value == 0) {
            return Err(PoaBatchError::InvalidConfig(format!("{name} must be larger than zero")));
        }

        // Node handles are u32, and the edge arena uses non-max u32 handles
        if self.max_nodes_per_window >= u32::MAX as usize - 2 {
            return Err(PoaBatchError::InvalidConfig("max_nodes_per_window is too large".to_string()));
        }

        if self.max_edges_per_window >= u32::MAX as usize {
            return Err(PoaBatchError::InvalidConfig("max_edges_per_window is too large".to_string()));
        }

        Ok(())
    }

    /// Number of rows of the alignment score matrix, i.e., symbol nodes plus start and end.
    pub(crate) fn max_graph_rows(&self) -> usize {
        self.max_nodes_per_window + 2
    }
}
