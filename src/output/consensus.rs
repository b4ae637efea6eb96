use std::cmp::Reverse;

use tracing::debug;

use crate::errors::StatusType;
use crate::graphs::poa::POAGraph;
use crate::graphs::{AlignableGraph, NodeIndex};

/// Scratch space for consensus generation, reused between windows
#[derive(Debug, Clone, Default)]
pub struct ConsensusBuffers {
    suffix: Vec<usize>,
    path: Vec<NodeIndex>,
}

impl ConsensusBuffers {
    /// Buffers for graphs of up to `max_rows` nodes, including start and end
    pub fn with_capacity(max_rows: usize) -> Self {
        Self {
            suffix: Vec::with_capacity(max_rows),
            path: Vec::with_capacity(max_rows),
        }
    }
}

/// For each node, the maximum total edge weight of any path from that node to the end node.
///
/// Computed with a single pass over the nodes in reverse topological order.
fn best_suffix_weights(graph: &POAGraph, suffix: &mut Vec<usize>) {
    suffix.clear();
    suffix.resize(graph.node_count_with_start_and_end(), 0);

    for node in graph.topological_order().iter().rev() {
        suffix[node.index()] = graph.out_edges(*node)
            .map(|(_, e)| e.weight + suffix[e.target.index()])
            .max()
            .unwrap_or(0);
    }
}

/// Find the path from start to end with the largest total edge weight, and store its symbol
/// nodes in `buffers.path`.
///
/// Walks from the start node along the out-edge maximizing the edge weight plus the best
/// suffix weight of its target. Ties prefer the heavier edge, then the lower node index. Each
/// step counts towards `loop_bound`.
fn heaviest_path(graph: &POAGraph, loop_bound: usize, buffers: &mut ConsensusBuffers) -> Result<(), StatusType> {
    best_suffix_weights(graph, &mut buffers.suffix);
    buffers.path.clear();

    let suffix = &buffers.suffix;
    let mut curr = graph.start_node();
    let mut loop_count = 0;
    loop {
        loop_count += 1;
        if loop_count > loop_bound {
            return Err(StatusType::LoopCountExceededUpperBound);
        }

        let next: Option<NodeIndex> = graph.out_edges(curr)
            .max_by_key(|(_, e)| (e.weight + suffix[e.target.index()], e.weight, Reverse(e.target)))
            .map(|(_, e)| e.target);

        match next {
            Some(node) if node != graph.end_node() => {
                buffers.path.push(node);
                curr = node;
            },
            _ => break,
        }
    }

    Ok(())
}

/// Total weight of the edges along a read's node path, including the edges from the start
/// node and into the end node.
fn path_weight(graph: &POAGraph, path: &[NodeIndex]) -> usize {
    if path.is_empty() {
        return 0;
    }

    let inner = std::iter::once(graph.start_node())
        .chain(path.iter().copied())
        .chain(std::iter::once(graph.end_node()));

    inner.clone()
        .zip(inner.skip(1))
        .filter_map(|(s, t)| graph.find_edge(s, t))
        .map(|e| graph.edge(e).weight)
        .sum()
}

/// Generate the consensus of a window from its graph and the node paths of its reads.
///
/// The consensus is the heaviest path through the graph. If its length is not between the
/// shortest and the longest read, the read whose path has the largest total edge weight is
/// used instead (the first one on ties).
pub fn heaviest_path_consensus<'a, I>(
    graph: &POAGraph,
    read_paths: I,
    loop_bound: usize,
    buffers: &mut ConsensusBuffers,
    consensus: &mut Vec<u8>,
) -> Result<(), StatusType>
where
    I: IntoIterator<Item=&'a [NodeIndex]>,
{
    consensus.clear();
    heaviest_path(graph, loop_bound, buffers)?;

    let mut min_len = usize::MAX;
    let mut max_len = 0;
    let mut heaviest_read: Option<(usize, &[NodeIndex])> = None;
    for path in read_paths {
        min_len = min_len.min(path.len());
        max_len = max_len.max(path.len());

        let weight = path_weight(graph, path);
        if heaviest_read.map_or(true, |(best, _)| weight > best) {
            heaviest_read = Some((weight, path));
        }
    }

    let len = buffers.path.len();
    let path = match heaviest_read {
        Some((_, read_path)) if len < min_len || len > max_len => {
            debug!(len, min_len, max_len, "Heaviest path length out of read length range, using heaviest read");
            read_path
        },
        _ => buffers.path.as_slice(),
    };

    consensus.extend(path.iter().map(|node| graph.symbol(*node)));

    Ok(())
}
