use crate::types::{ChangeKind, ChangeRecord, Snapshot};

/// Minimum primary-measure delta treated as a real change, in GB.
pub const DEFAULT_EPSILON: f64 = 0.01;

/// Compare two snapshots of the same domain and classify every difference.
///
/// A count change wins over a value change for the same item; a value-only
/// change must exceed `epsilon` to produce a record. Items identical in
/// both measures are omitted entirely.
///
/// The output order is a contract: records sort by kind priority
/// (`NEW < COUNT_INCREASED < VALUE_CHANGED < COUNT_DECREASED < REMOVED`),
/// then by descending absolute value delta, then by id.
pub fn diff(previous: &Snapshot, current: &Snapshot, epsilon: f64) -> Vec<ChangeRecord> {
    let mut records: Vec<ChangeRecord> = Vec::new();

    for (id, cur) in current.iter() {
        let Some(prev) = previous.get(id) else {
            records.push(ChangeRecord {
                id: id.clone(),
                kind: ChangeKind::New,
                previous_value: None,
                current_value: Some(cur.value),
                previous_count: None,
                current_count: cur.count,
            });
            continue;
        };

        let count_delta = cur.count.unwrap_or(0) as i64 - prev.count.unwrap_or(0) as i64;
        let value_delta = cur.value - prev.value;

        let kind = if count_delta > 0 {
            ChangeKind::CountIncreased
        } else if count_delta < 0 {
            ChangeKind::CountDecreased
        } else if value_delta.abs() > epsilon {
            ChangeKind::ValueChanged
        } else {
            continue;
        };

        records.push(ChangeRecord {
            id: id.clone(),
            kind,
            previous_value: Some(prev.value),
            current_value: Some(cur.value),
            previous_count: prev.count,
            current_count: cur.count,
        });
    }

    for (id, prev) in previous.iter() {
        if !current.contains(id) {
            records.push(ChangeRecord {
                id: id.clone(),
                kind: ChangeKind::Removed,
                previous_value: Some(prev.value),
                current_value: None,
                previous_count: prev.count,
                current_count: None,
            });
        }
    }

    records.sort_by(|a, b| {
        a.kind
            .priority()
            .cmp(&b.kind.priority())
            .then_with(|| {
                b.value_delta()
                    .abs()
                    .total_cmp(&a.value_delta().abs())
            })
            .then_with(|| a.id.cmp(&b.id))
    });

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemState;
    use chrono::Utc;

    fn state(value: f64, count: Option<u64>) -> ItemState {
        ItemState {
            value,
            count,
            group: None,
            last_updated: Utc::now(),
        }
    }

    fn snapshot(entries: &[(&str, f64, Option<u64>)]) -> Snapshot {
        let mut s = Snapshot::new();
        for (id, value, count) in entries {
            s.insert(*id, state(*value, *count));
        }
        s
    }

    #[test]
    fn identical_snapshots_produce_no_records() {
        let s = snapshot(&[("A", 10.0, Some(3)), ("B", 5.5, None)]);
        assert!(diff(&s, &s, DEFAULT_EPSILON).is_empty());
    }

    #[test]
    fn added_item_is_new() {
        let prev = snapshot(&[("A", 10.0, None)]);
        let cur = snapshot(&[("A", 10.0, None), ("B", 5.0, None)]);

        let records = diff(&prev, &cur, DEFAULT_EPSILON);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "B");
        assert_eq!(records[0].kind, ChangeKind::New);
        assert_eq!(records[0].current_value, Some(5.0));
        assert_eq!(records[0].previous_value, None);
    }

    #[test]
    fn missing_item_is_removed_without_current_value() {
        let prev = snapshot(&[("A", 10.0, None)]);
        let cur = snapshot(&[]);

        let records = diff(&prev, &cur, DEFAULT_EPSILON);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "A");
        assert_eq!(records[0].kind, ChangeKind::Removed);
        assert_eq!(records[0].previous_value, Some(10.0));
        assert_eq!(records[0].current_value, None);
    }

    #[test]
    fn count_change_wins_over_value_change() {
        let prev = snapshot(&[("A", 10.0, Some(12))]);
        let cur = snapshot(&[("A", 10.5, Some(13))]);

        let records = diff(&prev, &cur, DEFAULT_EPSILON);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ChangeKind::CountIncreased);
        assert_eq!(records[0].count_delta(), 1);
    }

    #[test]
    fn value_change_must_exceed_epsilon() {
        let prev = snapshot(&[("A", 10.0, None), ("B", 10.0, None)]);
        let cur = snapshot(&[("A", 10.01, None), ("B", 10.011, None)]);

        let records = diff(&prev, &cur, DEFAULT_EPSILON);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "B");
        assert_eq!(records[0].kind, ChangeKind::ValueChanged);
    }

    #[test]
    fn missing_count_is_treated_as_zero() {
        let prev = snapshot(&[("A", 10.0, None)]);
        let cur = snapshot(&[("A", 10.0, Some(4))]);

        let records = diff(&prev, &cur, DEFAULT_EPSILON);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ChangeKind::CountIncreased);
        assert_eq!(records[0].count_delta(), 4);
    }

    #[test]
    fn records_sort_by_priority_then_magnitude_then_id() {
        let prev = snapshot(&[
            ("quality", 10.0, None),
            ("gone", 3.0, None),
            ("shrunk", 8.0, Some(10)),
        ]);
        let cur = snapshot(&[
            ("quality", 12.0, None),
            ("shrunk", 7.0, Some(9)),
            ("big-new", 50.0, None),
            ("small-new", 1.0, None),
        ]);

        let kinds: Vec<(String, ChangeKind)> = diff(&prev, &cur, DEFAULT_EPSILON)
            .into_iter()
            .map(|r| (r.id, r.kind))
            .collect();

        assert_eq!(
            kinds,
            vec![
                ("big-new".to_string(), ChangeKind::New),
                ("small-new".to_string(), ChangeKind::New),
                ("quality".to_string(), ChangeKind::ValueChanged),
                ("shrunk".to_string(), ChangeKind::CountDecreased),
                ("gone".to_string(), ChangeKind::Removed),
            ]
        );
    }
}
