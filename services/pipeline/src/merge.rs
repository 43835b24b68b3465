//! Fusion of per-source statistics into one dataset.

use std::collections::BTreeMap;

use tracing::debug;
use wave_common::{AggregatedStat, FusedDataset, FusedRow, SourceId, StatKey};

/// Merge per-source statistics keyed by (cell, window).
///
/// For each key the highest-precedence source with data is kept; a gap row
/// is only kept when no source has data for the key. Provenance lists the
/// sources with data for the key, or every reporting source for a gap
/// row, in precedence order. Sources missing from `ranks` rank last, by id.
pub fn merge_sources(
    contributions: &[(SourceId, Vec<AggregatedStat>)],
    ranks: &BTreeMap<SourceId, usize>,
) -> FusedDataset {
    let mut by_key: BTreeMap<StatKey, Vec<(usize, &SourceId, &AggregatedStat)>> = BTreeMap::new();
    for (source_id, stats) in contributions {
        let rank = ranks.get(source_id).copied().unwrap_or(usize::MAX);
        for stat in stats {
            by_key.entry(stat.key()).or_default().push((rank, source_id, stat));
        }
    }

    let mut contested = 0usize;
    let rows: Vec<FusedRow> = by_key
        .into_values()
        .filter_map(|mut candidates| {
            candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

            let with_data: Vec<_> = candidates.iter().filter(|(_, _, s)| s.has_data()).collect();
            if with_data.len() > 1 {
                contested += 1;
            }
            let reporting: Vec<_> = if with_data.is_empty() {
                candidates.iter().collect()
            } else {
                with_data
            };

            let (_, selected, stat) = reporting.first()?;
            Some(FusedRow {
                stat: (*stat).clone(),
                selected_source: (*selected).clone(),
                provenance: reporting.iter().map(|(_, id, _)| (*id).clone()).collect(),
            })
        })
        .collect();

    debug!(rows = rows.len(), contested, "Merged source statistics");
    FusedDataset::from_rows(rows)
}
