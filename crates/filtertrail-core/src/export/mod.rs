// ABOUTME: Module root for the derived views of the trail: flow graph and table projection.
// ABOUTME: Also re-exports the DOT and Markdown renderers used for saved reports.

pub mod dot;
pub mod flow;
pub mod markdown;
pub mod table;

pub use dot::render_dot;
pub use flow::{FlowGraph, FlowLink, FlowNode, FlowStep, LinkSeverity, NodeBand, build_flow_graph, flow_steps};
pub use markdown::render_markdown;
pub use table::{FilterTable, TableColumn, TableRow, build_filter_table};
