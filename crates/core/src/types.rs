use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hard limits of the outbound delivery protocol. These are external
/// contract numbers and must not be changed.
pub mod limits {
    pub const MAX_FIELD_NAME: usize = 256;
    pub const MAX_FIELD_VALUE: usize = 1024;
    pub const MAX_FIELDS_PER_BATCH: usize = 25;
    pub const MAX_CHARS_PER_BATCH: usize = 6000;
    pub const MAX_BATCHES_PER_RUN: usize = 10;
    pub const MAX_TITLE: usize = 256;
    pub const MAX_DESCRIPTION: usize = 4096;
}

/// Tracked state of a single library item at one point in time.
///
/// `group` records the originating library so items that disappear from a
/// later observation can still be placed in the right report section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemState {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub last_updated: DateTime<Utc>,
}

/// The complete keyed state of a tracked domain at one point in time.
///
/// Backed by a `BTreeMap` so iteration order (and therefore diff input
/// order) is deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, ItemState>);

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, state: ItemState) {
        self.0.insert(id.into(), state);
    }

    pub fn get(&self, id: &str) -> Option<&ItemState> {
        self.0.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ItemState)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    New,
    CountIncreased,
    ValueChanged,
    CountDecreased,
    Removed,
}

impl ChangeKind {
    /// Fixed presentation rank: most interesting kinds sort first.
    pub fn priority(self) -> u8 {
        match self {
            ChangeKind::New => 0,
            ChangeKind::CountIncreased => 1,
            ChangeKind::ValueChanged => 2,
            ChangeKind::CountDecreased => 3,
            ChangeKind::Removed => 4,
        }
    }
}

/// One classified difference between two snapshots for a single item.
///
/// `previous_value` is absent only for `New`; `current_value` is absent
/// only for `Removed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub id: String,
    pub kind: ChangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_count: Option<u64>,
}

impl ChangeRecord {
    /// Signed primary-measure delta. Removals count as losing the whole
    /// previous value, additions as gaining the whole current value.
    pub fn value_delta(&self) -> f64 {
        match (self.previous_value, self.current_value) {
            (Some(prev), Some(cur)) => cur - prev,
            (None, Some(cur)) => cur,
            (Some(prev), None) => -prev,
            (None, None) => 0.0,
        }
    }

    /// Signed secondary-measure delta; a missing count on either side is
    /// treated as zero.
    pub fn count_delta(&self) -> i64 {
        self.current_count.unwrap_or(0) as i64 - self.previous_count.unwrap_or(0) as i64
    }
}

/// A named section of the rendered report before any size limiting.
/// `lines` may collectively exceed every delivery-unit capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedBlock {
    pub name: String,
    pub lines: Vec<String>,
}

impl NamedBlock {
    pub fn new(name: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            name: name.into(),
            lines,
        }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
}

/// One size-bounded delivery unit handed to the external transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub fields: Vec<Field>,
    pub chars_used: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn snapshot_serializes_as_flat_map() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(
            "Movies/Alpha",
            ItemState {
                value: 12.5,
                count: None,
                group: Some("Movies".to_string()),
                last_updated: Utc::now(),
            },
        );

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.is_object());
        assert_eq!(json["Movies/Alpha"]["value"], 12.5);
        assert!(json["Movies/Alpha"].get("count").is_none());
    }

    #[test]
    fn change_kind_priorities_are_strictly_ordered() {
        let kinds = [
            ChangeKind::New,
            ChangeKind::CountIncreased,
            ChangeKind::ValueChanged,
            ChangeKind::CountDecreased,
            ChangeKind::Removed,
        ];
        for pair in kinds.windows(2) {
            assert!(pair[0].priority() < pair[1].priority());
        }
    }

    #[test]
    fn value_delta_covers_new_and_removed() {
        let new = ChangeRecord {
            id: "a".to_string(),
            kind: ChangeKind::New,
            previous_value: None,
            current_value: Some(5.0),
            previous_count: None,
            current_count: None,
        };
        assert_eq!(new.value_delta(), 5.0);

        let removed = ChangeRecord {
            id: "b".to_string(),
            kind: ChangeKind::Removed,
            previous_value: Some(10.0),
            current_value: None,
            previous_count: Some(3),
            current_count: None,
        };
        assert_eq!(removed.value_delta(), -10.0);
        assert_eq!(removed.count_delta(), -3);
    }
}
