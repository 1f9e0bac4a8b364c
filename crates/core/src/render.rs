use serde::{Deserialize, Serialize};

use crate::types::{ChangeKind, ChangeRecord, NamedBlock};

#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Noun used for the secondary measure in report lines, e.g.
    /// "episodes" for show libraries or "tracks" for music.
    pub count_label: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            count_label: "episodes".to_string(),
        }
    }
}

/// Per-library totals for the report overview block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibrarySummary {
    pub library: String,
    pub total_value: f64,
    pub item_count: usize,
    /// Present for show-style libraries that track a secondary count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_count: Option<u64>,
}

/// Human-readable size. Libraries are tracked in GB; anything at a
/// terabyte scale reads better converted.
pub fn format_size(gb: f64) -> String {
    if gb >= 1000.0 {
        format!("{:.2} TB", gb / 1024.0)
    } else {
        format!("{:.2} GB", gb)
    }
}

fn format_transition(prev: f64, cur: f64) -> String {
    let delta = cur - prev;
    let sign = if delta > 0.0 { "+" } else { "" };
    format!("{prev:.2} GB → {cur:.2} GB ({sign}{delta:.2} GB)")
}

/// Item title for display: the part of the id after the library prefix.
fn display_title(id: &str) -> &str {
    id.split_once('/').map(|(_, title)| title).unwrap_or(id)
}

/// One report line per record, in the report dialect the notification
/// channel has always used.
pub fn record_line(record: &ChangeRecord, opts: &RenderOptions) -> String {
    let title = display_title(&record.id);
    let label = &opts.count_label;

    match record.kind {
        ChangeKind::New => {
            let note = match record.current_count {
                Some(n) => format!(" ({n} {label})"),
                None => String::new(),
            };
            let size = format_size(record.current_value.unwrap_or(0.0));
            format!("• NEW: {title}{note} - {size}")
        }
        ChangeKind::CountIncreased => {
            let cur_count = record.current_count.unwrap_or(0);
            let added = record.count_delta();
            format!(
                "• NEW EPISODES: {title} ({cur_count} {label}, +{added} new) - {}",
                format_transition(
                    record.previous_value.unwrap_or(0.0),
                    record.current_value.unwrap_or(0.0)
                )
            )
        }
        ChangeKind::ValueChanged => {
            let note = match record.current_count {
                Some(n) => format!(" ({n} {label})"),
                None => String::new(),
            };
            format!(
                "• QUALITY CHANGE: {title}{note} - {}",
                format_transition(
                    record.previous_value.unwrap_or(0.0),
                    record.current_value.unwrap_or(0.0)
                )
            )
        }
        ChangeKind::CountDecreased => {
            let cur_count = record.current_count.unwrap_or(0);
            let removed = -record.count_delta();
            format!(
                "• REMOVED EPISODES: {title} ({cur_count} {label}, {removed} removed) - {}",
                format_transition(
                    record.previous_value.unwrap_or(0.0),
                    record.current_value.unwrap_or(0.0)
                )
            )
        }
        ChangeKind::Removed => {
            let note = match record.previous_count {
                Some(n) => format!(" ({n} {label})"),
                None => String::new(),
            };
            let size = format_size(record.previous_value.unwrap_or(0.0));
            format!("• REMOVED: {title}{note} - {size}")
        }
    }
}

/// Group records into named report sections. Groups appear in first-seen
/// order; within a group the diff order is preserved, which is how "most
/// important first" presentation survives into the report. Performs no
/// size limiting; an oversized group stays one long block.
pub fn render(
    records: &[ChangeRecord],
    group_by: impl Fn(&str) -> String,
    opts: &RenderOptions,
) -> Vec<NamedBlock> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();

    for record in records {
        let key = group_by(&record.id);
        let line = record_line(record, opts);
        match groups.iter_mut().find(|(name, _)| *name == key) {
            Some((_, lines)) => lines.push(line),
            None => groups.push((key, vec![line])),
        }
    }

    groups
        .into_iter()
        .map(|(name, lines)| NamedBlock::new(format!("{} ({})", name, lines.len()), lines))
        .collect()
}

/// The "Media Libraries" overview block carried by every report.
pub fn library_summary(libraries: &[LibrarySummary], opts: &RenderOptions) -> NamedBlock {
    let lines = libraries
        .iter()
        .map(|lib| match lib.episode_count {
            Some(episodes) => format!(
                "• {}: {} - {} shows ({} {})",
                lib.library,
                format_size(lib.total_value),
                lib.item_count,
                episodes,
                opts.count_label
            ),
            None => format!(
                "• {}: {} - {} movies",
                lib.library,
                format_size(lib.total_value),
                lib.item_count
            ),
        })
        .collect();
    NamedBlock::new("Media Libraries", lines)
}
