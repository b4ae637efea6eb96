use itertools::Itertools;

use crate::aligner::alignment::AlignedPair;
use crate::graphs::AlignableGraph;
use crate::graphs::NodeIndex;

/// Render an alignment as three lines: graph symbols, match markers, and query symbols.
pub fn print_alignment<G>(graph: &G, seq: &[u8], aln: &[AlignedPair]) -> String
where
    G: AlignableGraph<NodeIndex = NodeIndex>,
{
    let (graph_chars, aln_chars, query_chars): (Vec<char>, Vec<char>, Vec<char>) = aln.iter()
        .map(|pair| match (pair.rpos, pair.qpos) {
            (Some(node), Some(qpos)) => {
                let (gsym, qsym) = (graph.symbol(node), seq[qpos]);
                let marker = if gsym == qsym { '|' } else { '*' };

                (char::from(gsym), marker, char::from(qsym))
            },
            (Some(node), None) => (char::from(graph.symbol(node)), ' ', '-'),
            (None, Some(qpos)) => ('-', ' ', char::from(seq[qpos])),
            (None, None) => (' ', ' ', ' '),
        })
        .multiunzip();

    [graph_chars, aln_chars, query_chars].iter()
        .map(|line| line.iter().collect::<String>())
        .join("\n")
}
