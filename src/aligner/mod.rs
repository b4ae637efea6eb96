pub mod alignment;
pub mod scoring;
pub mod utils;

use tracing::trace;

use crate::errors::StatusType;
use crate::graphs::{AlignableGraph, NodeIndex};
use crate::aligner::scoring::GapLinear;

pub use alignment::{AlignedPair, Alignment};

/// Score used for unreachable cells, far enough from `i32::MIN` to not overflow when adding a penalty
const NEG_INF: i32 = i32::MIN / 2;

/// Global sequence-to-graph aligner.
///
/// Holds the dynamic programming score matrix (one row per graph node, in topological rank
/// order, one column per query prefix length) and the alignment of the last query. Both are
/// allocated once and reused for each alignment.
pub struct PoaAligner {
    costs: GapLinear,
    scores: Vec<i32>,
    num_cols: usize,
    alignment: Alignment,
}

/// Traceback move, in order of preference when scores are tied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    Diagonal(NodeIndex),
    Deletion(NodeIndex),
    Insertion,
}

impl PoaAligner {
    pub fn new(costs: GapLinear) -> Self {
        Self {
            costs,
            scores: Vec::new(),
            num_cols: 0,
            alignment: Alignment::new(),
        }
    }

    /// Create an aligner with a score matrix large enough for graphs with `max_rows` nodes
    /// (including start and end) and queries of length `max_query_len`.
    pub fn with_capacity(costs: GapLinear, max_rows: usize, max_query_len: usize) -> Self {
        Self {
            costs,
            scores: vec![NEG_INF; max_rows * (max_query_len + 1)],
            num_cols: max_query_len + 1,
            alignment: Alignment::with_capacity(max_rows + max_query_len),
        }
    }

    pub fn costs(&self) -> &GapLinear {
        &self.costs
    }

    /// Align `seq` end-to-end to a path from start to end through `graph`, and return the
    /// alignment score. The alignment itself is available through [`PoaAligner::alignment`]
    /// until the next call.
    ///
    /// The traceback is bounded by `loop_bound` steps.
    pub fn align<G>(&mut self, graph: &G, seq: &[u8], loop_bound: usize) -> Result<i32, StatusType>
    where
        G: AlignableGraph<NodeIndex = NodeIndex>,
    {
        self.prepare_matrix(graph.node_count_with_start_and_end(), seq.len());
        self.fill(graph, seq);

        let score = self.get(graph.rank(graph.end_node()), seq.len());

        let mut alignment = std::mem::take(&mut self.alignment);
        alignment.clear();
        let result = self.traceback(graph, seq, loop_bound, &mut alignment);
        self.alignment = alignment;
        result?;

        trace!(score, aln_len = self.alignment.len(), "Aligned sequence to graph");

        Ok(score)
    }

    /// Alignment produced by the last successful call to [`PoaAligner::align`]
    pub fn alignment(&self) -> &[AlignedPair] {
        &self.alignment
    }

    /// Alignment of a query of length `len` against an empty graph, where every query
    /// symbol is an insertion. Used to seed a graph with its first sequence.
    pub fn align_to_empty_graph(&mut self, len: usize) -> &[AlignedPair] {
        self.alignment.clear();
        self.alignment.extend((0..len).map(|qpos| AlignedPair::new(None, Some(qpos))));

        &self.alignment
    }

    fn prepare_matrix(&mut self, num_rows: usize, seq_len: usize) {
        let required_cols = seq_len + 1;
        if required_cols > self.num_cols {
            self.num_cols = required_cols;
        }

        let required = num_rows * self.num_cols;
        if required > self.scores.len() {
            self.scores.resize(required, NEG_INF);
        }
    }

    #[inline(always)]
    fn get(&self, rank: usize, j: usize) -> i32 {
        self.scores[rank * self.num_cols + j]
    }

    #[inline(always)]
    fn set(&mut self, rank: usize, j: usize, score: i32) {
        self.scores[rank * self.num_cols + j] = score;
    }

    /// Compute all cells in topological layer order. Every predecessor of a node lies in an
    /// earlier layer, so its row is final by the time the node's row is computed.
    fn fill<G>(&mut self, graph: &G, seq: &[u8])
    where
        G: AlignableGraph<NodeIndex = NodeIndex>,
    {
        let n = seq.len();
        let gap = self.costs.gap();
        let end = graph.end_node();

        for layer in graph.layers() {
            for node in layer {
                let row = graph.rank(*node);

                if *node == graph.start_node() {
                    for j in 0..=n {
                        self.set(row, j, self.costs.gap_cost(j));
                    }

                    continue;
                }

                for j in 0..=n {
                    self.set(row, j, NEG_INF);
                }

                let symbol = graph.symbol(*node);
                for (pred, _) in graph.predecessors(*node) {
                    let pred_row = graph.rank(pred);

                    for j in 0..=n {
                        let mut best = self.get(row, j);

                        if *node == end {
                            // The end node does not consume any query symbol
                            best = best.max(self.get(pred_row, j));
                        } else {
                            best = best.max(self.get(pred_row, j) + gap);

                            if j > 0 {
                                let diag = self.get(pred_row, j - 1) + self.costs.substitution(symbol, seq[j - 1]);
                                best = best.max(diag);
                            }
                        }

                        self.set(row, j, best);
                    }
                }

                if *node != end {
                    for j in 1..=n {
                        let ins = self.get(row, j - 1) + gap;
                        if ins > self.get(row, j) {
                            self.set(row, j, ins);
                        }
                    }
                }
            }
        }
    }

    /// Among the predecessors of `node` for which `cond` holds, choose the one with the
    /// highest edge weight, breaking ties by lowest node index.
    fn best_predecessor<G, F>(graph: &G, node: NodeIndex, cond: F) -> Option<NodeIndex>
    where
        G: AlignableGraph<NodeIndex = NodeIndex>,
        F: Fn(NodeIndex) -> bool,
    {
        graph.predecessors(node)
            .filter(|(pred, _)| cond(*pred))
            .min_by(|(p1, w1), (p2, w2)| w2.cmp(w1).then(p1.cmp(p2)))
            .map(|(pred, _)| pred)
    }

    fn choose_move<G>(&self, graph: &G, seq: &[u8], node: NodeIndex, j: usize) -> Option<Move>
    where
        G: AlignableGraph<NodeIndex = NodeIndex>,
    {
        let row = graph.rank(node);
        let current = self.get(row, j);
        let gap = self.costs.gap();

        if node == graph.start_node() {
            return (j > 0).then_some(Move::Insertion);
        }

        if node == graph.end_node() {
            return Self::best_predecessor(graph, node, |p| self.get(graph.rank(p), j) == current)
                .map(Move::Deletion);
        }

        if j > 0 {
            let sub = self.costs.substitution(graph.symbol(node), seq[j - 1]);
            let diag = Self::best_predecessor(graph, node, |p| {
                self.get(graph.rank(p), j - 1) + sub == current
            });

            if let Some(pred) = diag {
                return Some(Move::Diagonal(pred));
            }
        }

        let del = Self::best_predecessor(graph, node, |p| self.get(graph.rank(p), j) + gap == current);
        if let Some(pred) = del {
            return Some(Move::Deletion(pred));
        }

        (j > 0 && self.get(row, j - 1) + gap == current).then_some(Move::Insertion)
    }

    fn traceback<G>(&self, graph: &G, seq: &[u8], loop_bound: usize, alignment: &mut Alignment) -> Result<(), StatusType>
    where
        G: AlignableGraph<NodeIndex = NodeIndex>,
    {
        let mut node = graph.end_node();
        let mut j = seq.len();
        let mut loop_count = 0;

        while node != graph.start_node() || j > 0 {
            loop_count += 1;
            if loop_count > loop_bound {
                return Err(StatusType::LoopCountExceededUpperBound);
            }

            let Some(mv) = self.choose_move(graph, seq, node, j) else {
                // No move reproduces the cell score, only possible if the graph changed under us
                return Err(StatusType::GenericError);
            };

            let is_end = node == graph.end_node();
            match mv {
                Move::Diagonal(pred) => {
                    alignment.push(AlignedPair::new(Some(node), Some(j - 1)));
                    node = pred;
                    j -= 1;
                },
                Move::Deletion(pred) => {
                    if !is_end {
                        alignment.push(AlignedPair::new(Some(node), None));
                    }
                    node = pred;
                },
                Move::Insertion => {
                    alignment.push(AlignedPair::new(None, Some(j - 1)));
                    j -= 1;
                },
            }
        }

        alignment.reverse();
        Ok(())
    }
}
