//! Extraction of the final per-window outputs from a finished graph

pub mod consensus;
pub mod msa;

pub use consensus::{heaviest_path_consensus, ConsensusBuffers};
pub use msa::{generate_msa, MsaBuffers};
