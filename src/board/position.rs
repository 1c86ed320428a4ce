//! Position allocation within a column.
//!
//! Positions are sort hints, not a dense index. New and appended tasks go
//! after everything already in the column; full-column reorders rewrite
//! positions as `0..n`.

/// Position that sorts after every existing entry: `max + 1`, or `0` for an
/// empty column. Negative entries are ignored.
pub fn allocate<I>(existing: I) -> i64
where
    I: IntoIterator<Item = i64>,
{
    existing
        .into_iter()
        .filter(|p| *p >= 0)
        .max()
        .map_or(0, |max| max.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_column_starts_at_zero() {
        assert_eq!(allocate(Vec::new()), 0);
    }

    #[test]
    fn appends_after_max_with_gaps_and_duplicates() {
        assert_eq!(allocate([0, 5, 5, 2]), 6);
        assert_eq!(allocate([3]), 4);
    }

    #[test]
    fn ignores_negative_entries() {
        assert_eq!(allocate([-4, -1]), 0);
        assert_eq!(allocate([-4, 1]), 2);
    }
}
