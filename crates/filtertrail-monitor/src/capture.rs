// ABOUTME: Reads one complete Snapshot from a SnapshotSource.
// ABOUTME: Caps the header row, drops filters without values, and attaches the reported total.

use filtertrail_core::snapshot::{FilterMap, FilterPredicate, Snapshot};

use crate::source::{SnapshotSource, SourceError};

/// Read headers, filters, estimates and the total in one pass. Any read
/// failure aborts the whole snapshot so no partial data reaches the trail.
pub async fn capture_snapshot(
    source: &dyn SnapshotSource,
    max_columns: usize,
) -> Result<Snapshot, SourceError> {
    let mut headers = source.read_headers().await?;
    headers.retain(|index, _| *index >= 1 && *index <= max_columns);

    let filters: FilterMap = source
        .read_filters()
        .await?
        .into_iter()
        .filter(|(_, raw)| !raw.values.is_empty())
        .map(|(column, raw)| (column, FilterPredicate::new(raw.values, raw.column_index)))
        .collect();

    let row_count_estimates = source.read_row_count_estimates().await?;
    let total_rows = source.read_total_rows().await?;

    Ok(Snapshot {
        headers,
        filters,
        row_count_estimates,
        total_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{ScriptFrame, ScriptedSource};
    use crate::source::RawFilter;

    #[tokio::test]
    async fn capture_caps_headers_and_skips_empty_filters() {
        let mut frame = ScriptFrame::new(&["Id", "Region", "Year"], &[40, 42]);
        frame.total_rows = Some(100);
        frame.filters.insert(
            "Region".to_string(),
            RawFilter {
                values: vec!["East".to_string()],
                column_index: 2,
            },
        );
        frame.filters.insert(
            "Year".to_string(),
            RawFilter {
                values: Vec::new(),
                column_index: 3,
            },
        );
        let source = ScriptedSource::new(vec![frame]);

        let snapshot = capture_snapshot(&source, 2).await.unwrap();

        assert_eq!(snapshot.headers.len(), 2);
        assert_eq!(snapshot.headers.get(&2).map(String::as_str), Some("Region"));
        assert_eq!(snapshot.filters.len(), 1);
        assert_eq!(snapshot.filters["Region"].column_index, 2);
        assert_eq!(snapshot.row_count_estimates, vec![40, 42]);
        assert_eq!(snapshot.total_rows, Some(100));
    }

    #[tokio::test]
    async fn capture_fails_when_source_is_down() {
        let source = ScriptedSource::new(vec![ScriptFrame::offline()]);
        assert!(matches!(
            capture_snapshot(&source, 200).await,
            Err(SourceError::Unavailable(_))
        ));
    }
}
