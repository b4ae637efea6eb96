pub mod dot;
pub mod fasta;

pub use dot::graph_to_dot;
pub use fasta::{read_window, OutputWriter, WindowReads};
