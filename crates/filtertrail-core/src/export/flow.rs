// ABOUTME: Flow graph builder projecting the event log into origin-rooted nodes and weighted links.
// ABOUTME: Steps are produced lazily by a restartable iterator; nothing is cached between calls.

use serde::Serialize;

use crate::event::{ALL_DATA, FilterEvent};

/// Visible-share bands for node coloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeBand {
    Origin,
    High,
    Medium,
    Low,
}

impl NodeBand {
    pub fn for_ratio(ratio: f64) -> Self {
        if ratio > 0.7 {
            NodeBand::High
        } else if ratio > 0.3 {
            NodeBand::Medium
        } else {
            NodeBand::Low
        }
    }
}

/// How hard a step cut the rows that reached it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkSeverity {
    Severe,
    Heavy,
    Moderate,
    Light,
    /// The previous count was zero, so no reduction can be computed.
    Neutral,
}

impl LinkSeverity {
    pub fn for_counts(previous: u64, flow_value: u64) -> Self {
        if previous == 0 {
            return LinkSeverity::Neutral;
        }
        let reduction = 1.0 - flow_value as f64 / previous as f64;
        if reduction > 0.7 {
            LinkSeverity::Severe
        } else if reduction > 0.4 {
            LinkSeverity::Heavy
        } else if reduction > 0.1 {
            LinkSeverity::Moderate
        } else {
            LinkSeverity::Light
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowNode {
    pub id: usize,
    /// Absolute index of the event behind this node; `None` for the origin.
    pub event_index: Option<usize>,
    pub label: String,
    pub filter_column: String,
    pub row_count: u64,
    pub percent_of_total: f64,
    pub band: NodeBand,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowLink {
    pub source: usize,
    pub target: usize,
    /// Never zero.
    pub value: u64,
    pub label: String,
    pub severity: LinkSeverity,
}

/// One event's node together with the link that leads into it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowStep {
    pub node: FlowNode,
    pub link: FlowLink,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowGraph {
    pub title: String,
    pub subtitle: String,
    pub nodes: Vec<FlowNode>,
    pub links: Vec<FlowLink>,
}

/// Format an integer with comma thousands separators.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn link_label(event: &FilterEvent, position: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    for entry in &event.added_filters {
        lines.push(format!("{}: {}", entry.column, entry.values.join(", ")));
    }
    for entry in &event.removed_filters {
        lines.push(format!("Remove {} filter", entry.column));
    }
    if lines.is_empty() {
        lines.push(format!("Filter change {}", position + 1));
    }

    let previous = event.previous_row_count;
    let current = event.current_row_count;
    let change = if previous > 0 && previous != current {
        let pct = (current as f64 - previous as f64) / previous as f64 * 100.0;
        format!(" ({:+.1}%)", pct)
    } else {
        String::new()
    };
    lines.push(format!(
        "Rows: {} → {}{}",
        group_thousands(previous),
        group_thousands(current),
        change
    ));
    lines.join("\n")
}

/// Lazy iterator over the steps of a flow graph. Cloning it restarts from
/// the current position; calling [`flow_steps`] again starts over.
#[derive(Debug, Clone)]
pub struct FlowSteps<'a> {
    events: &'a [FilterEvent],
    first_index: usize,
    reference_total: u64,
    position: usize,
}

impl Iterator for FlowSteps<'_> {
    type Item = FlowStep;

    fn next(&mut self) -> Option<FlowStep> {
        let event = self.events.get(self.position)?;
        let i = self.position;
        self.position += 1;

        let row_count = event.current_row_count;
        let percent_of_total = event.percent_of_total();
        let band = NodeBand::for_ratio(row_count as f64 / self.reference_total as f64);
        let node = FlowNode {
            id: i + 1,
            event_index: Some(self.first_index + i),
            label: format!(
                "{} ({}, {:.1}%)",
                event.filter_column,
                group_thousands(row_count),
                percent_of_total
            ),
            filter_column: event.filter_column.clone(),
            row_count,
            percent_of_total,
            band,
        };

        let value = row_count.max(1);
        let link = FlowLink {
            source: i,
            target: i + 1,
            value,
            label: link_label(event, i),
            severity: LinkSeverity::for_counts(event.previous_row_count, value),
        };

        Some(FlowStep { node, link })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.events.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FlowSteps<'_> {}

/// Steps for `events`, whose first element sits at `first_index` in the full log.
pub fn flow_steps(events: &[FilterEvent], first_index: usize) -> FlowSteps<'_> {
    let reference_total = events.first().map_or(1, |e| e.total_rows).max(1);
    FlowSteps {
        events,
        first_index,
        reference_total,
        position: 0,
    }
}

/// Build the full graph: the origin node followed by one node and link per event.
pub fn build_flow_graph(events: &[FilterEvent], first_index: usize, primary_key_name: &str) -> FlowGraph {
    let origin_total = events.first().map_or(0, |e| e.total_rows);
    let mut nodes = vec![FlowNode {
        id: 0,
        event_index: None,
        label: ALL_DATA.to_string(),
        filter_column: ALL_DATA.to_string(),
        row_count: origin_total,
        percent_of_total: if origin_total > 0 { 100.0 } else { 0.0 },
        band: NodeBand::Origin,
    }];
    let mut links = Vec::with_capacity(events.len());

    for step in flow_steps(events, first_index) {
        nodes.push(step.node);
        links.push(step.link);
    }

    FlowGraph {
        title: "Filter Flow Visualization".to_string(),
        subtitle: format!("Showing non-empty rows in {}", primary_key_name),
        nodes,
        links,
    }
}
