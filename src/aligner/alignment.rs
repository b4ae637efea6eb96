use crate::graphs::NodeIndex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlignedPair {
    /// Node in the graph, `None` for an insertion
    pub rpos: Option<NodeIndex>,

    /// Query sequence position, `None` for a deletion
    pub qpos: Option<usize>
}

impl AlignedPair {
    pub fn new(rpos: Option<NodeIndex>, qpos: Option<usize>) -> Self {
        Self { rpos, qpos }
    }

    pub fn is_aligned(&self) -> bool {
        matches!((self.rpos, self.qpos), (Some(_), Some(_)))
    }
}

pub type Alignment = Vec<AlignedPair>;

