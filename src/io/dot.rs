//! DOT rendering of window graphs for debugging

use std::fmt;
use std::io::Write;

use petgraph::dot::Dot;
use petgraph::graph::DiGraph;

use crate::errors::PoaBatchError;
use crate::graphs::poa::POAGraph;

/// Render the graph in DOT format. Nodes are labeled with their symbol and index, edges with
/// their weight. Aligned nodes are connected with unlabeled edges in both directions.
pub fn format_as_dot(
    writer: &mut impl fmt::Write,
    graph: &POAGraph,
) -> fmt::Result {
    let mut transformed = DiGraph::<String, String, u32>::with_capacity(
        graph.node_count() + 2, graph.edge_count());

    for node in graph.all_nodes() {
        let data = graph.node(node);
        transformed.add_node(format!("{:?} ({:?})", char::from(data.symbol), node.index()));
    }

    for node in graph.all_nodes() {
        for (_, edge) in graph.out_edges(node) {
            transformed.add_edge(
                (edge.source.index() as u32).into(),
                (edge.target.index() as u32).into(),
                edge.weight.to_string(),
            );
        }

        for aligned in graph.get_aligned_nodes(node) {
            transformed.add_edge(
                (node.index() as u32).into(),
                (aligned.index() as u32).into(),
                String::new(),
            );
        }
    }

    let dot = Dot::new(&transformed);

    writeln!(writer, "{}", dot)?;

    Ok(())
}

pub fn graph_to_dot(writer: &mut impl Write, graph: &POAGraph) -> Result<(), PoaBatchError> {
    write!(writer, "{graph}")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::graph_to_dot;
    use crate::aligner::alignment::AlignedPair;
    use crate::graphs::poa::POAGraph;

    #[test]
    fn test_dot_output() {
        let mut graph = POAGraph::with_capacity(10, 10);
        let aln: Vec<_> = (0..2).map(|q| AlignedPair::new(None, Some(q))).collect();
        let mut path = Vec::new();
        graph.add_alignment(b"AC", &aln, &mut path).unwrap();
        graph.add_alignment(b"AC", &vec![
            AlignedPair::new(Some(path[0]), Some(0)),
            AlignedPair::new(Some(path[1]), Some(1)),
        ], &mut Vec::new()).unwrap();

        let mut out = Vec::new();
        graph_to_dot(&mut out, &graph).unwrap();
        let dot = String::from_utf8(out).unwrap();

        assert!(dot.starts_with("digraph {"));
        assert!(dot.contains("'A' (2)"));
        assert!(dot.contains("'C' (3)"));
        assert!(dot.contains("'$' (1)"));
        assert!(dot.contains("label = \"2\""));

        let mut again = Vec::new();
        graph_to_dot(&mut again, &graph).unwrap();
        assert_eq!(dot.as_bytes(), &again[..]);
    }
}
