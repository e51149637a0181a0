//! Row formatting for the aggregate table

use retail_types::AggregateRecord;

/// Format a combiner snapshot, one row per key
pub fn format_rows(snapshot: Vec<(String, f64)>) -> Vec<AggregateRecord> {
    snapshot
        .into_iter()
        .map(|(user_id, total)| AggregateRecord::new(user_id, total))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_rows() {
        let rows = format_rows(vec![("A".to_string(), 50.0), ("B".to_string(), 25.0)]);
        assert_eq!(rows, vec![AggregateRecord::new("A", 50.0), AggregateRecord::new("B", 25.0)]);
    }
}
