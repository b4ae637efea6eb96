use crate::graphs::NodeIndex;

/// Layered topological sort (Kahn's algorithm, processed one frontier at a time).
///
/// Layer `k` holds the nodes whose longest path from a source has `k` edges, so every
/// predecessor of a node lives in an earlier layer. Within a layer, nodes are ordered by
/// index. The result is written to `order` and `layer_starts`, reusing their allocations;
/// `in_degree` is scratch space.
///
/// Returns `false` if not all nodes could be ordered, i.e., the graph has a cycle.
pub fn topological_layers<F, I>(
    node_count: usize,
    successors: F,
    in_degree: &mut Vec<u32>,
    order: &mut Vec<NodeIndex>,
    layer_starts: &mut Vec<usize>,
) -> bool
where
    F: Fn(NodeIndex) -> I,
    I: Iterator<Item=NodeIndex>,
{
    order.clear();
    layer_starts.clear();
    in_degree.clear();
    in_degree.resize(node_count, 0);

    for ix in 0..node_count {
        for succ in successors(NodeIndex::new(ix)) {
            in_degree[succ.index()] += 1;
        }
    }

    order.extend((0..node_count)
        .filter(|ix| in_degree[*ix] == 0)
        .map(NodeIndex::new));

    let mut layer_start = 0;
    while layer_start < order.len() {
        let layer_end = order.len();
        layer_starts.push(layer_start);

        for i in layer_start..layer_end {
            for succ in successors(order[i]) {
                in_degree[succ.index()] -= 1;
                if in_degree[succ.index()] == 0 {
                    order.push(succ);
                }
            }
        }

        order[layer_end..].sort_unstable();
        layer_start = layer_end;
    }

    order.len() == node_count
}

#[cfg(test)]
mod tests {
    use super::topological_layers;
    use crate::graphs::NodeIndex;

    fn run(node_count: usize, edges: &[(usize, usize)]) -> Option<(Vec<usize>, Vec<usize>)> {
        let succ = |n: NodeIndex| {
            edges.iter()
                .filter(move |(s, _)| *s == n.index())
                .map(|(_, t)| NodeIndex::new(*t))
        };

        let mut in_degree = Vec::new();
        let mut order = Vec::new();
        let mut starts = Vec::new();

        topological_layers(node_count, succ, &mut in_degree, &mut order, &mut starts)
            .then(|| (order.iter().map(|n| n.index()).collect(), starts))
    }

    #[test]
    fn test_layers() {
        // 0 -> 2 -> 3 -> 1, 0 -> 4 -> 1, 2 -> 4
        let (order, starts) = run(5, &[(0, 2), (2, 3), (3, 1), (0, 4), (4, 1), (2, 4)]).unwrap();

        assert_eq!(order, vec![0, 2, 3, 4, 1]);
        assert_eq!(starts, vec![0, 1, 2, 4]);
    }

    #[test]
    fn test_cycle() {
        assert!(run(3, &[(0, 1), (1, 2), (2, 1)]).is_none());
    }
}
