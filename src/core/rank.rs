use crate::domain::model::{RankedEntry, TallyTable};
use crate::utils::error::{Result, TallyError};

/// Orders the tally by count descending, name ascending on ties, then
/// truncates to `limit` entries. A limit of -1 means the whole ranking;
/// anything below that is rejected before the sort. Pure: consumes the
/// table, shares nothing.
pub fn rank_and_truncate(table: TallyTable, limit: i64) -> Result<Vec<RankedEntry>> {
    if limit < -1 {
        return Err(TallyError::InvalidLimit {
            value: limit,
            reason: "limit must be -1 (unlimited) or non-negative".to_string(),
        });
    }

    let mut entries: Vec<RankedEntry> = table
        .into_counts()
        .into_iter()
        .map(|(name, count)| RankedEntry { name, count })
        .collect();

    // The name tiebreak makes repeated runs byte-identical.
    entries.sort_unstable_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));

    if limit >= 0 {
        entries.truncate(limit as usize);
    }

    Ok(entries)
}
