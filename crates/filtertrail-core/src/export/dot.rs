// ABOUTME: Renders a FlowGraph as a Graphviz DOT digraph for external renderers and saved reports.
// ABOUTME: Node fill and edge colors come from the graph's bands and severities.

use std::fmt::{self, Write};

use super::flow::{FlowGraph, LinkSeverity, NodeBand};

fn node_color(band: NodeBand) -> &'static str {
    match band {
        NodeBand::Origin => "#1f77b4",
        NodeBand::High => "#329632",
        NodeBand::Medium => "#c89600",
        NodeBand::Low => "#c83232",
    }
}

fn link_color(severity: LinkSeverity) -> &'static str {
    match severity {
        LinkSeverity::Severe => "#ff0000",
        LinkSeverity::Heavy => "#ffa500",
        LinkSeverity::Moderate => "#e6c800",
        LinkSeverity::Light => "#008000",
        LinkSeverity::Neutral => "#646464",
    }
}

fn escape_dot_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

fn write_dot(out: &mut String, graph: &FlowGraph) -> fmt::Result {
    writeln!(out, "digraph filter_flow {{")?;
    writeln!(out, "rankdir=LR;")?;
    writeln!(
        out,
        "label=\"{}\\n{}\";",
        escape_dot_string(&graph.title),
        escape_dot_string(&graph.subtitle)
    )?;
    writeln!(out, "labelloc=t;")?;
    writeln!(out, "node [shape=box, style=\"rounded,filled\", fontcolor=white];")?;
    writeln!(out)?;

    for node in &graph.nodes {
        writeln!(
            out,
            "n{} [label=\"{}\", fillcolor=\"{}\"];",
            node.id,
            escape_dot_string(&node.label),
            node_color(node.band)
        )?;
    }
    writeln!(out)?;

    for link in &graph.links {
        // Edge width grows with the share of rows flowing through it.
        let origin = graph.nodes.first().map_or(1, |n| n.row_count.max(1));
        let width = 1.0 + 4.0 * (link.value as f64 / origin as f64).min(1.0);
        writeln!(
            out,
            "n{} -> n{} [label=\"{}\", color=\"{}\", penwidth={:.1}];",
            link.source,
            link.target,
            escape_dot_string(&link.label),
            link_color(link.severity),
            width
        )?;
    }
    writeln!(out, "}}")
}

/// Render the graph as DOT source.
pub fn render_dot(graph: &FlowGraph) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_dot(&mut out, graph);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::FilterEvent;
    use crate::export::flow::build_flow_graph;
    use chrono::Utc;

    #[test]
    fn renders_nodes_and_edges() {
        let mut removal = FilterEvent::initial_connection(100, Utc::now());
        removal.filter_column = "Remove \"Region\"".to_string();
        removal.current_row_count = 20;
        let events = vec![FilterEvent::initial_connection(100, Utc::now()), removal];
        let dot = render_dot(&build_flow_graph(&events, 0, "Id"));

        assert!(dot.starts_with("digraph filter_flow {"));
        assert!(dot.contains("n0 [label=\"All Data\", fillcolor=\"#1f77b4\"];"));
        assert!(dot.contains("n2 [label=\"Remove \\\"Region\\\" (20, 20.0%)\""));
        assert!(dot.contains("n0 -> n1"));
        assert!(dot.contains("n1 -> n2"));
        assert!(dot.contains("Showing non-empty rows in Id"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn escape_handles_special_chars() {
        assert_eq!(escape_dot_string("say \"hi\""), "say \\\"hi\\\"");
        assert_eq!(escape_dot_string("a\nb"), "a\\nb");
        assert_eq!(escape_dot_string("a\\b"), "a\\\\b");
    }
}
