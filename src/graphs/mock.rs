//! A module containing a mock graph struct useful for creating
//! test graphs in unit tests

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use petgraph::visit::EdgeRef;
use petgraph::Incoming;

use crate::graphs::{AlignableGraph, NodeIndex};

pub(crate) type NIx = u32;

/// Small DAG backed by petgraph. Node 0 is the start node, node 1 the end node.
pub(crate) struct MockGraph {
    graph: DiGraph<u8, usize, NIx>,
    order: Vec<NodeIndex>,
    layer_starts: Vec<usize>,
    ranks: Vec<usize>,
}

impl MockGraph {
    pub(crate) fn new(symbols: &[u8], edges: &[(usize, usize, usize)]) -> Self {
        let mut graph = DiGraph::<u8, usize, NIx>::default();
        graph.add_node(b'#');
        graph.add_node(b'$');
        for s in symbols {
            graph.add_node(*s);
        }

        for (s, t, w) in edges {
            graph.add_edge((*s as NIx).into(), (*t as NIx).into(), *w);
        }

        // Every node is its own layer, the aligner only relies on predecessors being in earlier layers
        let order: Vec<NodeIndex> = toposort(&graph, None)
            .unwrap()
            .into_iter()
            .map(|n| NodeIndex::new(n.index()))
            .collect();

        let mut ranks = vec![0; order.len()];
        for (rank, n) in order.iter().enumerate() {
            ranks[n.index()] = rank;
        }

        MockGraph {
            graph,
            layer_starts: (0..order.len()).collect(),
            order,
            ranks,
        }
    }
}

impl AlignableGraph for MockGraph {
    type NodeIndex = NodeIndex;
    type PredecessorIterator<'a> = std::vec::IntoIter<(NodeIndex, usize)>
        where Self: 'a;

    fn node_count_with_start_and_end(&self) -> usize {
        self.graph.node_count()
    }

    fn start_node(&self) -> NodeIndex {
        NodeIndex::new(0)
    }

    fn end_node(&self) -> NodeIndex {
        NodeIndex::new(1)
    }

    fn topological_order(&self) -> &[NodeIndex] {
        &self.order
    }

    fn layer_starts(&self) -> &[usize] {
        &self.layer_starts
    }

    fn rank(&self, node: NodeIndex) -> usize {
        self.ranks[node.index()]
    }

    fn predecessors(&self, node: NodeIndex) -> Self::PredecessorIterator<'_> {
        self.graph.edges_directed((node.index() as NIx).into(), Incoming)
            .map(|e| (NodeIndex::new(e.source().index()), *e.weight()))
            .collect::<Vec<_>>()
            .into_iter()
    }

    fn symbol(&self, node: NodeIndex) -> u8 {
        self.graph[petgraph::graph::NodeIndex::<NIx>::new(node.index())]
    }
}

/// Linear graph start -> seq[0] -> ... -> seq[n-1] -> end, symbol nodes start at index 2
pub(crate) fn create_chain_graph(seq: &[u8]) -> MockGraph {
    let n = seq.len();
    let mut edges = vec![(0, 2, 1), (n + 1, 1, 1)];
    edges.extend((2..n + 1).map(|i| (i, i + 1, 1)));

    MockGraph::new(seq, &edges)
}

/// A -> {C, T} -> G, where the path through T is supported by `t_weight` sequences and the
/// path through C by `c_weight` sequences.
///
/// Node indices: A=2, C=3, T=4, G=5
pub(crate) fn create_bubble_graph(c_weight: usize, t_weight: usize) -> MockGraph {
    let total = c_weight + t_weight;
    let edges = [
        (0, 2, total),
        (2, 3, c_weight),
        (2, 4, t_weight),
        (3, 5, c_weight),
        (4, 5, t_weight),
        (5, 1, total),
    ];

    MockGraph::new(b"ACTG", &edges)
}
