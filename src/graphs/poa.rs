use std::fmt::{Display, Formatter};

use smallvec::SmallVec;
use tracing::trace;

use crate::aligner::alignment::AlignedPair;
use crate::errors::StatusType;
use crate::graphs::{AlignableGraph, EdgeIndex, NodeIndex};
use crate::graphs::tools::topological_layers;
use crate::io::dot::format_as_dot;

pub const START_SYMBOL: u8 = b'#';
pub const END_SYMBOL: u8 = b'$';

#[derive(Debug, Clone)]
pub struct POANodeData {
    pub symbol: u8,

    /// Nodes with a different symbol occupying the same alignment column
    pub aligned_nodes: SmallVec<[NodeIndex; 4]>,

    first_in: Option<EdgeIndex>,
    first_out: Option<EdgeIndex>,
}

impl POANodeData {
    fn new(symbol: u8) -> Self {
        POANodeData {
            symbol,
            aligned_nodes: SmallVec::new(),
            first_in: None,
            first_out: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct POAEdgeData {
    pub source: NodeIndex,
    pub target: NodeIndex,

    /// Number of reads that traversed this edge
    pub weight: usize,

    next_in: Option<EdgeIndex>,
    next_out: Option<EdgeIndex>,
}

/// Where a read symbol ends up when an alignment is committed to the graph
#[derive(Debug, Clone, Copy)]
enum PlannedNode {
    Existing(NodeIndex),

    /// A new node, optionally aligned to an existing node with a different symbol
    New { symbol: u8, aligned_to: Option<NodeIndex> },
}

/// Partial order graph of a single window.
///
/// Nodes and edges live in fixed-capacity arenas sized at construction. Edges form intrusive
/// singly linked in- and out-lists per node. Node 0 is the synthetic start node, node 1 the
/// synthetic end node.
#[derive(Debug, Clone)]
pub struct POAGraph {
    nodes: Vec<POANodeData>,
    edges: Vec<POAEdgeData>,
    max_nodes: usize,
    max_edges: usize,

    topological_sorted: Vec<NodeIndex>,
    layer_starts: Vec<usize>,
    ranks: Vec<usize>,

    // Scratch space reused between updates
    planned: Vec<PlannedNode>,
    in_degree: Vec<u32>,
}

impl POAGraph {
    /// Create an empty graph that can hold `max_nodes` symbol nodes and `max_edges` edges
    pub fn with_capacity(max_nodes: usize, max_edges: usize) -> Self {
        let mut graph = POAGraph {
            nodes: Vec::with_capacity(max_nodes + 2),
            edges: Vec::with_capacity(max_edges),
            max_nodes,
            max_edges,
            topological_sorted: Vec::with_capacity(max_nodes + 2),
            layer_starts: Vec::with_capacity(max_nodes + 2),
            ranks: Vec::with_capacity(max_nodes + 2),
            planned: Vec::new(),
            in_degree: Vec::with_capacity(max_nodes + 2),
        };

        graph.clear();
        graph
    }

    /// Reserve the scratch space needed to add sequences of up to `max_len` symbols
    pub fn reserve_sequence_capacity(&mut self, max_len: usize) {
        self.planned.reserve(max_len.saturating_sub(self.planned.len()));
    }

    /// Remove all symbol nodes and edges, keeping the allocated storage
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.nodes.push(POANodeData::new(START_SYMBOL));
        self.nodes.push(POANodeData::new(END_SYMBOL));

        self.topological_sorted.clear();
        self.topological_sorted.extend([NodeIndex::new(0), NodeIndex::new(1)]);
        self.layer_starts.clear();
        self.layer_starts.extend([0, 1]);
        self.ranks.clear();
        self.ranks.extend([0, 1]);
    }

    /// True if no sequence has been added yet
    pub fn is_empty(&self) -> bool {
        self.node_count() == 0
    }

    /// Number of symbol nodes, excluding start and end
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 2
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    pub fn max_edges(&self) -> usize {
        self.max_edges
    }

    pub fn node(&self, node: NodeIndex) -> &POANodeData {
        &self.nodes[node.index()]
    }

    pub fn edge(&self, edge: EdgeIndex) -> &POAEdgeData {
        &self.edges[edge.index()]
    }

    pub fn get_aligned_nodes(&self, node: NodeIndex) -> &[NodeIndex] {
        &self.nodes[node.index()].aligned_nodes
    }

    pub fn out_edges(&self, node: NodeIndex) -> OutEdges<'_> {
        OutEdges { graph: self, next: self.nodes[node.index()].first_out }
    }

    pub fn in_edges(&self, node: NodeIndex) -> InEdges<'_> {
        InEdges { graph: self, next: self.nodes[node.index()].first_in }
    }

    pub fn successors(&self, node: NodeIndex) -> impl Iterator<Item=NodeIndex> + '_ {
        self.out_edges(node).map(|(_, e)| e.target)
    }

    pub fn all_nodes(&self) -> impl Iterator<Item=NodeIndex> {
        (0..self.nodes.len()).map(NodeIndex::new)
    }

    pub fn find_edge(&self, source: NodeIndex, target: NodeIndex) -> Option<EdgeIndex> {
        self.out_edges(source)
            .find(|(_, e)| e.target == target)
            .map(|(ix, _)| ix)
    }

    /// Fold an aligned sequence into the graph.
    ///
    /// Symbols aligned to a node with the same symbol reuse that node; otherwise a new node
    /// is created, either aligned to the mismatching node or unaligned in case of an
    /// insertion. Every consecutive pair of nodes on the sequence's path, including the
    /// start and end nodes, gets its edge weight incremented.
    ///
    /// The update is checked against the node and edge limits before anything is modified,
    /// and undone if it would introduce a cycle: on error the graph is left untouched. On
    /// success the node path of the sequence is written to `path`.
    pub fn add_alignment(
        &mut self,
        seq: &[u8],
        alignment: &[AlignedPair],
        path: &mut Vec<NodeIndex>,
    ) -> Result<(), StatusType> {
        path.clear();
        if seq.is_empty() {
            return Ok(());
        }

        let new_nodes = self.plan_update(seq, alignment)?;
        if self.node_count() + new_nodes > self.max_nodes {
            return Err(StatusType::NodeCountExceededMaximumGraphSize);
        }

        let new_edges = self.count_new_edges();
        if self.edge_count() + new_edges > self.max_edges {
            return Err(StatusType::EdgeCountExceededMaximumGraphSize);
        }

        trace!(new_nodes, new_edges, "Committing alignment to graph");

        let (old_nodes, old_edges) = (self.nodes.len(), self.edges.len());
        let mut prev = self.start_node();
        for i in 0..self.planned.len() {
            let curr = match self.planned[i] {
                PlannedNode::Existing(node) => node,
                PlannedNode::New { symbol, aligned_to } => self.add_node(symbol, aligned_to),
            };

            self.add_or_increment_edge(prev, curr);
            path.push(curr);
            prev = curr;
        }

        self.add_or_increment_edge(prev, self.end_node());

        if let Err(status) = self.update_topology() {
            trace!(%status, "Alignment introduces a cycle, rolling back");
            self.rollback(old_nodes, old_edges, path);
            path.clear();

            // The graph before this update was acyclic
            self.update_topology()?;
            return Err(status);
        }

        Ok(())
    }

    /// Undo a committed update along `path`, given the node and edge counts from before.
    ///
    /// New edges are always prepended to the adjacency lists, so every list starts with the
    /// edges added by the update.
    fn rollback(&mut self, old_nodes: usize, old_edges: usize, path: &[NodeIndex]) {
        let mut prev = self.start_node();
        for curr in path.iter().copied().chain(std::iter::once(self.end_node())) {
            if let Some(e) = self.find_edge(prev, curr).filter(|e| e.index() < old_edges) {
                self.edges[e.index()].weight -= 1;
            }

            prev = curr;
        }

        for node in self.nodes[..old_nodes].iter_mut() {
            while let Some(e) = node.first_out.filter(|e| e.index() >= old_edges) {
                node.first_out = self.edges[e.index()].next_out;
            }

            while let Some(e) = node.first_in.filter(|e| e.index() >= old_edges) {
                node.first_in = self.edges[e.index()].next_in;
            }

            node.aligned_nodes.retain(|other| other.index() < old_nodes);
        }

        self.nodes.truncate(old_nodes);
        self.edges.truncate(old_edges);
    }

    /// Resolve each sequence position to an existing or a new node. Returns the number of
    /// new nodes needed.
    fn plan_update(&mut self, seq: &[u8], alignment: &[AlignedPair]) -> Result<usize, StatusType> {
        self.planned.clear();
        let mut new_nodes = 0;

        for AlignedPair { rpos, qpos } in alignment {
            let Some(q) = *qpos else {
                continue;
            };

            let symbol = *seq.get(q).ok_or(StatusType::GenericError)?;
            let planned = match *rpos {
                Some(r) if self.nodes[r.index()].symbol == symbol => PlannedNode::Existing(r),
                Some(r) => {
                    self.nodes[r.index()].aligned_nodes.iter()
                        .find(|other| self.nodes[other.index()].symbol == symbol)
                        .map(|other| PlannedNode::Existing(*other))
                        .unwrap_or(PlannedNode::New { symbol, aligned_to: Some(r) })
                },
                None => PlannedNode::New { symbol, aligned_to: None },
            };

            if matches!(planned, PlannedNode::New { .. }) {
                new_nodes += 1;
            }

            self.planned.push(planned);
        }

        if self.planned.len() != seq.len() {
            return Err(StatusType::GenericError);
        }

        Ok(new_nodes)
    }

    fn count_new_edges(&self) -> usize {
        let path = self.planned.iter()
            .map(|p| match p {
                PlannedNode::Existing(node) => Some(*node),
                PlannedNode::New { .. } => None,
            });

        let mut prev = Some(self.start_node());
        let mut new_edges = 0;
        for curr in path.chain(std::iter::once(Some(self.end_node()))) {
            match (prev, curr) {
                (Some(s), Some(t)) if self.find_edge(s, t).is_some() => (),
                _ => new_edges += 1,
            }

            prev = curr;
        }

        new_edges
    }

    fn add_node(&mut self, symbol: u8, aligned_to: Option<NodeIndex>) -> NodeIndex {
        let new_node = NodeIndex::new(self.nodes.len());
        self.nodes.push(POANodeData::new(symbol));

        if let Some(other) = aligned_to {
            let others: SmallVec<[NodeIndex; 4]> = self.nodes[other.index()].aligned_nodes.clone();
            for other_ix in &others {
                self.nodes[other_ix.index()].aligned_nodes.push(new_node);
                self.nodes[new_node.index()].aligned_nodes.push(*other_ix);
            }

            self.nodes[other.index()].aligned_nodes.push(new_node);
            self.nodes[new_node.index()].aligned_nodes.push(other);
        }

        new_node
    }

    fn add_or_increment_edge(&mut self, source: NodeIndex, target: NodeIndex) {
        if let Some(e) = self.find_edge(source, target) {
            self.edges[e.index()].weight += 1;
            return;
        }

        // Edge capacity is checked before committing, and fits in a non-max u32
        let Some(new_edge) = EdgeIndex::new(self.edges.len()) else {
            return;
        };

        self.edges.push(POAEdgeData {
            source,
            target,
            weight: 1,
            next_in: self.nodes[target.index()].first_in,
            next_out: self.nodes[source.index()].first_out,
        });

        self.nodes[source.index()].first_out = Some(new_edge);
        self.nodes[target.index()].first_in = Some(new_edge);
    }

    fn update_topology(&mut self) -> Result<(), StatusType> {
        let mut order = std::mem::take(&mut self.topological_sorted);
        let mut layer_starts = std::mem::take(&mut self.layer_starts);
        let mut in_degree = std::mem::take(&mut self.in_degree);

        let is_dag = topological_layers(
            self.nodes.len(),
            |n| self.successors(n),
            &mut in_degree,
            &mut order,
            &mut layer_starts,
        );

        self.ranks.clear();
        self.ranks.resize(self.nodes.len(), 0);
        for (rank, node) in order.iter().enumerate() {
            self.ranks[node.index()] = rank;
        }

        self.topological_sorted = order;
        self.layer_starts = layer_starts;
        self.in_degree = in_degree;

        if is_dag { Ok(()) } else { Err(StatusType::GenericError) }
    }
}

pub struct OutEdges<'a> {
    graph: &'a POAGraph,
    next: Option<EdgeIndex>,
}

impl<'a> Iterator for OutEdges<'a> {
    type Item = (EdgeIndex, &'a POAEdgeData);

    fn next(&mut self) -> Option<Self::Item> {
        let ix = self.next?;
        let edge = &self.graph.edges[ix.index()];
        self.next = edge.next_out;

        Some((ix, edge))
    }
}

pub struct InEdges<'a> {
    graph: &'a POAGraph,
    next: Option<EdgeIndex>,
}

impl<'a> Iterator for InEdges<'a> {
    type Item = (EdgeIndex, &'a POAEdgeData);

    fn next(&mut self) -> Option<Self::Item> {
        let ix = self.next?;
        let edge = &self.graph.edges[ix.index()];
        self.next = edge.next_in;

        Some((ix, edge))
    }
}

pub struct Predecessors<'a>(InEdges<'a>);

impl Iterator for Predecessors<'_> {
    type Item = (NodeIndex, usize);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(_, e)| (e.source, e.weight))
    }
}

impl AlignableGraph for POAGraph {
    type NodeIndex = NodeIndex;
    type PredecessorIterator<'a> = Predecessors<'a>;

    fn node_count_with_start_and_end(&self) -> usize {
        self.nodes.len()
    }

    fn start_node(&self) -> NodeIndex {
        NodeIndex::new(0)
    }

    fn end_node(&self) -> NodeIndex {
        NodeIndex::new(1)
    }

    fn topological_order(&self) -> &[NodeIndex] {
        &self.topological_sorted
    }

    fn layer_starts(&self) -> &[usize] {
        &self.layer_starts
    }

    fn rank(&self, node: NodeIndex) -> usize {
        self.ranks[node.index()]
    }

    fn predecessors(&self, node: NodeIndex) -> Self::PredecessorIterator<'_> {
        Predecessors(self.in_edges(node))
    }

    fn symbol(&self, node: NodeIndex) -> u8 {
        self.nodes[node.index()].symbol
    }
}

impl Display for POAGraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        format_as_dot(f, self)
    }
}

#[cfg(test)]
mod tests {
    use super::POAGraph;
    use crate::aligner::alignment::{AlignedPair, Alignment};
    use crate::errors::StatusType;
    use crate::graphs::{AlignableGraph, NodeIndex};

    fn unaligned(len: usize) -> Alignment {
        (0..len).map(|q| AlignedPair::new(None, Some(q))).collect()
    }

    fn seeded(seq: &[u8], max_nodes: usize, max_edges: usize) -> (POAGraph, Vec<NodeIndex>) {
        let mut graph = POAGraph::with_capacity(max_nodes, max_edges);
        let mut path = Vec::new();
        graph.add_alignment(seq, &unaligned(seq.len()), &mut path).unwrap();

        (graph, path)
    }

    #[test]
    fn test_seed_graph() {
        let (graph, path) = seeded(b"ACGT", 10, 10);

        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 5);
        assert_eq!(path.len(), 4);

        let symbols: Vec<u8> = graph.topological_order().iter()
            .map(|n| graph.symbol(*n))
            .collect();
        assert_eq!(symbols, b"#ACGT$".to_vec());
        assert_eq!(graph.rank(graph.end_node()), 5);
        assert_eq!(graph.layer_starts().len(), 6);
    }

    #[test]
    fn test_add_mismatch_and_insertion() {
        let (mut graph, first) = seeded(b"ACGT", 10, 20);

        // A C G->T mismatch, then an inserted A, then T
        let aln = vec![
            AlignedPair::new(Some(first[0]), Some(0)),
            AlignedPair::new(Some(first[1]), Some(1)),
            AlignedPair::new(Some(first[2]), Some(2)),
            AlignedPair::new(None, Some(3)),
            AlignedPair::new(Some(first[3]), Some(4)),
        ];

        let mut path = Vec::new();
        graph.add_alignment(b"ACTAT", &aln, &mut path).unwrap();

        assert_eq!(graph.node_count(), 6);
        assert_eq!(&path[..2], &first[..2]);
        assert_eq!(path[4], first[3]);
        assert_eq!(graph.get_aligned_nodes(first[2]), &[path[2]]);
        assert_eq!(graph.get_aligned_nodes(path[2]), &[first[2]]);

        let ac = graph.find_edge(first[0], first[1]).unwrap();
        assert_eq!(graph.edge(ac).weight, 2);

        let start_edge = graph.find_edge(graph.start_node(), first[0]).unwrap();
        assert_eq!(graph.edge(start_edge).weight, 2);

        for (rank, node) in graph.topological_order().iter().enumerate() {
            for (pred, _) in graph.predecessors(*node) {
                assert!(graph.rank(pred) < rank);
            }
        }
    }

    #[test]
    fn test_mismatch_reuses_aligned_node() {
        let (mut graph, first) = seeded(b"AC", 10, 20);
        let aln = vec![
            AlignedPair::new(Some(first[0]), Some(0)),
            AlignedPair::new(Some(first[1]), Some(1)),
        ];

        let mut p1 = Vec::new();
        graph.add_alignment(b"AG", &aln, &mut p1).unwrap();
        let mut p2 = Vec::new();
        graph.add_alignment(b"AG", &aln, &mut p2).unwrap();

        assert_eq!(p1, p2);
        assert_eq!(graph.node_count(), 3);
    }

    #[test]
    fn test_node_limit_leaves_graph_unchanged() {
        let (mut graph, _) = seeded(b"ACGT", 6, 100);
        let before = format!("{graph}");

        let mut path = Vec::new();
        let result = graph.add_alignment(b"TTT", &unaligned(3), &mut path);

        assert_eq!(result, Err(StatusType::NodeCountExceededMaximumGraphSize));
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 5);
        assert!(path.is_empty());
        assert_eq!(format!("{graph}"), before);
    }

    #[test]
    fn test_edge_limit_leaves_graph_unchanged() {
        let (mut graph, first) = seeded(b"ACGT", 100, 6);

        // Skipping C and G needs the new edge A -> T
        let aln = vec![
            AlignedPair::new(Some(first[0]), Some(0)),
            AlignedPair::new(Some(first[1]), None),
            AlignedPair::new(Some(first[2]), None),
            AlignedPair::new(Some(first[3]), Some(1)),
        ];

        let mut path = Vec::new();
        assert!(graph.add_alignment(b"AT", &aln, &mut path).is_ok());
        assert_eq!(graph.edge_count(), 6);

        let aln = vec![
            AlignedPair::new(Some(first[0]), Some(0)),
            AlignedPair::new(Some(first[1]), None),
            AlignedPair::new(Some(first[2]), Some(1)),
            AlignedPair::new(Some(first[3]), None),
        ];
        let result = graph.add_alignment(b"AG", &aln, &mut path);

        assert_eq!(result, Err(StatusType::EdgeCountExceededMaximumGraphSize));
        assert_eq!(graph.edge_count(), 6);
        let ag = graph.find_edge(first[0], first[2]);
        assert!(ag.is_none());
    }

    #[test]
    fn test_cycle_leaves_graph_unchanged() {
        let (mut graph, first) = seeded(b"ACGT", 100, 100);
        let before = format!("{graph}");
        let order_before = graph.topological_order().to_vec();

        // T followed by A, while A already precedes T
        let aln = vec![
            AlignedPair::new(Some(first[3]), Some(0)),
            AlignedPair::new(Some(first[0]), Some(1)),
        ];

        let mut path = Vec::new();
        let result = graph.add_alignment(b"TA", &aln, &mut path);

        assert_eq!(result, Err(StatusType::GenericError));
        assert!(path.is_empty());
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 5);
        assert_eq!(format!("{graph}"), before);
        assert_eq!(graph.topological_order(), order_before.as_slice());

        let start_edge = graph.find_edge(graph.start_node(), first[0]).unwrap();
        assert_eq!(graph.edge(start_edge).weight, 1);
        assert!(graph.find_edge(first[3], first[0]).is_none());

        // The graph is still usable afterwards
        let aln = vec![
            AlignedPair::new(Some(first[0]), Some(0)),
            AlignedPair::new(Some(first[1]), Some(1)),
            AlignedPair::new(Some(first[2]), Some(2)),
            AlignedPair::new(Some(first[3]), Some(3)),
        ];
        graph.add_alignment(b"ACGA", &aln, &mut path).unwrap();
        assert_eq!(graph.node_count(), 5);
        assert_eq!(graph.get_aligned_nodes(first[3]), &[path[3]]);
    }

    #[test]
    fn test_cycle_with_new_aligned_node_is_rolled_back() {
        let (mut graph, first) = seeded(b"ACGT", 100, 100);
        let before = format!("{graph}");

        // G mismatching A creates a new node aligned to A, then C is reused after T
        let aln = vec![
            AlignedPair::new(Some(first[0]), Some(0)),
            AlignedPair::new(Some(first[3]), Some(1)),
            AlignedPair::new(Some(first[1]), Some(2)),
        ];

        let mut path = Vec::new();
        let result = graph.add_alignment(b"GTC", &aln, &mut path);

        assert_eq!(result, Err(StatusType::GenericError));
        assert_eq!(graph.node_count(), 4);
        assert!(graph.get_aligned_nodes(first[0]).is_empty());
        assert_eq!(format!("{graph}"), before);
    }

    #[test]
    fn test_clear() {
        let (mut graph, _) = seeded(b"ACGT", 10, 10);
        graph.clear();

        assert!(graph.is_empty());
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.topological_order().len(), 2);
    }
}
