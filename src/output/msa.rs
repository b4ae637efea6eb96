use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::errors::StatusType;
use crate::graphs::poa::POAGraph;
use crate::graphs::{AlignableGraph, NodeIndex};

pub const GAP_SYMBOL: u8 = b'-';

const UNASSIGNED: usize = usize::MAX;

/// Scratch space for column assignment, reused between windows.
///
/// Node indices are dense, so every per-node and per-group table is a plain vector.
#[derive(Debug, Clone, Default)]
pub struct MsaBuffers {
    node_group: Vec<usize>,
    group_rank: Vec<usize>,

    /// Edges between groups, sorted by source group
    group_edges: Vec<(usize, usize)>,
    edge_starts: Vec<usize>,
    in_degree: Vec<u32>,
    queue: BinaryHeap<Reverse<(usize, usize)>>,
    group_column: Vec<usize>,
}

impl MsaBuffers {
    /// Buffers for graphs of up to `max_rows` nodes (including start and end) and `max_edges`
    /// edges
    pub fn with_capacity(max_rows: usize, max_edges: usize) -> Self {
        Self {
            node_group: Vec::with_capacity(max_rows),
            group_rank: Vec::with_capacity(max_rows),
            group_edges: Vec::with_capacity(max_edges),
            edge_starts: Vec::with_capacity(max_rows + 1),
            in_degree: Vec::with_capacity(max_rows),
            queue: BinaryHeap::with_capacity(max_rows),
            group_column: Vec::with_capacity(max_rows),
        }
    }

    /// MSA column of a symbol node, after [`assign_columns`]
    pub fn column(&self, node: NodeIndex) -> Option<usize> {
        let group = *self.node_group.get(node.index())?;
        self.group_column.get(group).copied()
    }
}

/// Assign each symbol node to an MSA column, and return the number of columns.
///
/// Nodes aligned to each other are contracted to a single group. Groups are ordered
/// topologically, with ties between groups that are ready at the same time broken by the
/// smallest topological rank of their members. Each group becomes one column.
pub fn assign_columns(graph: &POAGraph, buffers: &mut MsaBuffers) -> Result<usize, StatusType> {
    buffers.node_group.clear();
    buffers.node_group.resize(graph.node_count_with_start_and_end(), UNASSIGNED);
    buffers.group_rank.clear();

    // Visiting in topological order means the first member seen has the smallest rank
    for node in graph.topological_order() {
        if *node == graph.start_node() || *node == graph.end_node()
            || buffers.node_group[node.index()] != UNASSIGNED
        {
            continue;
        }

        let group = buffers.group_rank.len();
        buffers.node_group[node.index()] = group;
        for member in graph.get_aligned_nodes(*node) {
            buffers.node_group[member.index()] = group;
        }

        buffers.group_rank.push(graph.rank(*node));
    }

    let num_groups = buffers.group_rank.len();
    buffers.group_edges.clear();
    for node in graph.all_nodes() {
        let group = buffers.node_group[node.index()];
        if group == UNASSIGNED {
            continue;
        }

        for succ in graph.successors(node) {
            let succ_group = buffers.node_group[succ.index()];
            if succ_group != UNASSIGNED && succ_group != group {
                buffers.group_edges.push((group, succ_group));
            }
        }
    }

    buffers.group_edges.sort_unstable();
    buffers.group_edges.dedup();

    buffers.edge_starts.clear();
    buffers.edge_starts.resize(num_groups + 1, 0);
    buffers.in_degree.clear();
    buffers.in_degree.resize(num_groups, 0);
    for (source, target) in &buffers.group_edges {
        buffers.edge_starts[source + 1] += 1;
        buffers.in_degree[*target] += 1;
    }

    for group in 0..num_groups {
        buffers.edge_starts[group + 1] += buffers.edge_starts[group];
    }

    buffers.queue.clear();
    for group in 0..num_groups {
        if buffers.in_degree[group] == 0 {
            buffers.queue.push(Reverse((buffers.group_rank[group], group)));
        }
    }

    buffers.group_column.clear();
    buffers.group_column.resize(num_groups, UNASSIGNED);
    let mut num_columns = 0;
    while let Some(Reverse((_, group))) = buffers.queue.pop() {
        buffers.group_column[group] = num_columns;
        num_columns += 1;

        let succ_edges = &buffers.group_edges[buffers.edge_starts[group]..buffers.edge_starts[group + 1]];
        for (_, succ) in succ_edges {
            buffers.in_degree[*succ] -= 1;
            if buffers.in_degree[*succ] == 0 {
                buffers.queue.push(Reverse((buffers.group_rank[*succ], *succ)));
            }
        }
    }

    if num_columns != num_groups {
        // Contracting aligned nodes introduced a cycle
        return Err(StatusType::GenericError);
    }

    Ok(num_columns)
}

/// Lay out each read's node path as a row of the multiple sequence alignment, and return the
/// number of rows. Columns not visited by a read are filled with `-`.
///
/// Rows are written to the front of `msa`, reusing the storage of rows already present.
/// Entries past the returned row count are left as they are.
pub fn generate_msa<'a, I>(
    graph: &POAGraph,
    paths: I,
    buffers: &mut MsaBuffers,
    msa: &mut Vec<Vec<u8>>,
) -> Result<usize, StatusType>
where
    I: IntoIterator<Item=&'a [NodeIndex]>,
{
    let num_columns = assign_columns(graph, buffers)?;

    let mut num_rows = 0;
    for path in paths {
        if num_rows == msa.len() {
            msa.push(Vec::with_capacity(num_columns));
        }

        let row = &mut msa[num_rows];
        row.clear();
        row.resize(num_columns, GAP_SYMBOL);
        for node in path {
            let column = buffers.column(*node).ok_or(StatusType::GenericError)?;
            row[column] = graph.symbol(*node);
        }

        num_rows += 1;
    }

    Ok(num_rows)
}

#[cfg(test)]
mod tests {
    use super::{generate_msa, MsaBuffers};
    use crate::aligner::alignment::{AlignedPair, Alignment};
    use crate::graphs::poa::POAGraph;
    use crate::graphs::NodeIndex;

    fn msa_of(first: &[u8], others: &[(&[u8], Alignment)]) -> Vec<Vec<u8>> {
        let mut graph = POAGraph::with_capacity(100, 100);
        let mut paths = Vec::new();

        let mut path = Vec::new();
        let aln: Alignment = (0..first.len()).map(|q| AlignedPair::new(None, Some(q))).collect();
        graph.add_alignment(first, &aln, &mut path).unwrap();
        paths.push(path.clone());

        for (seq, aln) in others {
            graph.add_alignment(seq, aln, &mut path).unwrap();
            paths.push(path.clone());
        }

        let mut buffers = MsaBuffers::default();
        let mut msa = Vec::new();
        let num_rows = generate_msa(&graph, paths.iter().map(|p| p.as_slice()), &mut buffers, &mut msa).unwrap();
        assert_eq!(num_rows, paths.len());

        msa
    }

    fn pair(node: Option<usize>, qpos: Option<usize>) -> AlignedPair {
        AlignedPair::new(node.map(NodeIndex::new), qpos)
    }

    #[test]
    fn test_mismatch_shares_column() {
        let matched: Alignment = (0..4).map(|i| pair(Some(i + 2), Some(i))).collect();
        let msa = msa_of(b"ACGT", &[
            (b"ACGT", matched.clone()),
            (b"ACGG", matched),
        ]);

        assert_eq!(msa, vec![b"ACGT".to_vec(), b"ACGT".to_vec(), b"ACGG".to_vec()]);
    }

    #[test]
    fn test_deletion_gets_gap() {
        let msa = msa_of(b"ACGT", &[
            (b"ACT", vec![
                pair(Some(2), Some(0)),
                pair(Some(3), Some(1)),
                pair(Some(4), None),
                pair(Some(5), Some(2)),
            ]),
        ]);

        assert_eq!(msa, vec![b"ACGT".to_vec(), b"AC-T".to_vec()]);
    }

    #[test]
    fn test_insertion_adds_column() {
        let msa = msa_of(b"ACGT", &[
            (b"ACTAT", vec![
                pair(Some(2), Some(0)),
                pair(Some(3), Some(1)),
                pair(Some(4), Some(2)),
                pair(None, Some(3)),
                pair(Some(5), Some(4)),
            ]),
        ]);

        assert_eq!(msa, vec![b"ACG-T".to_vec(), b"ACTAT".to_vec()]);
    }

    #[test]
    fn test_empty_read_is_all_gaps() {
        let msa = msa_of(b"ACG", &[(b"", vec![])]);
        assert_eq!(msa, vec![b"ACG".to_vec(), b"---".to_vec()]);
    }

    #[test]
    fn test_rows_have_equal_length() {
        let msa = msa_of(b"ACGTAC", &[
            (b"AGTTAC", vec![
                pair(Some(2), Some(0)),
                pair(Some(3), None),
                pair(Some(4), Some(1)),
                pair(Some(5), Some(2)),
                pair(None, Some(3)),
                pair(Some(6), Some(4)),
                pair(Some(7), Some(5)),
            ]),
        ]);

        assert_eq!(msa[0].len(), msa[1].len());
        for row in &msa {
            let ungapped: Vec<u8> = row.iter().copied().filter(|c| *c != b'-').collect();
            assert!(ungapped == b"ACGTAC".to_vec() || ungapped == b"AGTTAC".to_vec());
        }
    }

    #[test]
    fn test_row_storage_is_reused() {
        let mut graph = POAGraph::with_capacity(100, 100);
        let mut path = Vec::new();
        let aln: Alignment = (0..3).map(|q| AlignedPair::new(None, Some(q))).collect();
        graph.add_alignment(b"ACG", &aln, &mut path).unwrap();

        let mut buffers = MsaBuffers::with_capacity(102, 100);
        let mut msa = vec![Vec::with_capacity(16), vec![b'X'; 8]];
        let first_row = msa[0].as_ptr();

        let num_rows = generate_msa(&graph, [path.as_slice()], &mut buffers, &mut msa).unwrap();
        assert_eq!(num_rows, 1);
        assert_eq!(msa[0], b"ACG".to_vec());
        assert_eq!(msa[0].as_ptr(), first_row);

        // A second window with more reads than rows available grows the row storage
        let num_rows = generate_msa(&graph, [path.as_slice(); 3], &mut buffers, &mut msa).unwrap();
        assert_eq!(num_rows, 3);
        assert_eq!(msa.len(), 3);
        assert!(msa.iter().all(|row| row == b"ACG"));
    }
}
