pub mod poa;
pub mod tools;

#[cfg(test)]
pub(crate) mod mock;

use std::fmt::Debug;
use std::hash::Hash;

use nonmax::NonMaxU32;
use serde::{Deserialize, Serialize};

/// Handle of a node in a window graph arena
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeIndex(u32);

impl NodeIndex {
    #[inline(always)]
    pub fn new(ix: usize) -> Self {
        NodeIndex(ix as u32)
    }

    #[inline(always)]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Handle of an edge in a window graph arena. Non-max, such that `Option<EdgeIndex>` stays 32 bits.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeIndex(NonMaxU32);

impl EdgeIndex {
    #[inline(always)]
    pub(crate) fn new(ix: usize) -> Option<Self> {
        NonMaxU32::new(ix as u32).map(EdgeIndex)
    }

    #[inline(always)]
    pub fn index(&self) -> usize {
        self.0.get() as usize
    }
}

pub trait NodeIndexType: Copy + Hash + PartialOrd + Ord + PartialEq + Eq + Debug + Default {
    fn index(&self) -> usize;
}

impl NodeIndexType for NodeIndex {
    #[inline(always)]
    fn index(&self) -> usize {
        NodeIndex::index(self)
    }
}

/// A DAG with dedicated start and end nodes that sequences can be aligned to.
///
/// Nodes are visited by the aligner in topological order, one layer at a time; every
/// predecessor of a node lives in an earlier layer.
pub trait AlignableGraph {
    type NodeIndex: NodeIndexType;
    type PredecessorIterator<'a>: Iterator<Item=(Self::NodeIndex, usize)> + 'a
        where Self: 'a;

    /// Number of nodes, including start and end
    fn node_count_with_start_and_end(&self) -> usize;

    fn start_node(&self) -> Self::NodeIndex;
    fn end_node(&self) -> Self::NodeIndex;

    /// All nodes in topological order. The position of a node in this slice is its rank.
    fn topological_order(&self) -> &[Self::NodeIndex];

    /// Offsets into [`AlignableGraph::topological_order`] where each layer begins
    fn layer_starts(&self) -> &[usize];

    fn rank(&self, node: Self::NodeIndex) -> usize;

    /// Predecessors of a node together with the weight of the connecting edge
    fn predecessors(&self, node: Self::NodeIndex) -> Self::PredecessorIterator<'_>;

    fn symbol(&self, node: Self::NodeIndex) -> u8;

    fn layers(&self) -> impl Iterator<Item=&[Self::NodeIndex]> + '_ {
        let order = self.topological_order();
        let starts = self.layer_starts();

        starts.iter().enumerate()
            .map(move |(i, start)| {
                let end = starts.get(i + 1).copied().unwrap_or(order.len());
                &order[*start..end]
            })
    }
}
