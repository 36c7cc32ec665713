// ABOUTME: Renders a FilterTable as a Markdown document for saved reports.
// ABOUTME: Column order matches the table projection; pipes in cells are escaped.

use std::fmt::{self, Write};

use super::table::FilterTable;

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

fn write_markdown(out: &mut String, table: &FilterTable, title: &str) -> fmt::Result {
    writeln!(out, "# {}", title)?;
    writeln!(out)?;

    if table.rows.is_empty() {
        writeln!(out, "_No filter changes recorded._")?;
        return Ok(());
    }

    let header: Vec<String> = table.columns.iter().map(|c| escape_cell(&c.name)).collect();
    writeln!(out, "| {} |", header.join(" | "))?;
    writeln!(out, "|{}", "---|".repeat(header.len()))?;

    for row in &table.rows {
        let mut cells = vec![
            escape_cell(&row.step),
            row.timestamp.clone(),
            row.row_count.to_string(),
            row.percent_of_total.clone(),
        ];
        for column in table.dynamic_columns() {
            let cell = row.filters.get(column).map(String::as_str).unwrap_or("");
            cells.push(escape_cell(cell));
        }
        writeln!(out, "| {} |", cells.join(" | "))?;
    }
    Ok(())
}

/// Render the table as a Markdown document headed by `title`.
pub fn render_markdown(table: &FilterTable, title: &str) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_markdown(&mut out, table, title);
    out
}
