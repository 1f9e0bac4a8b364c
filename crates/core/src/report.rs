use serde::{Deserialize, Serialize};

use crate::render::{format_size, LibrarySummary, RenderOptions};
use crate::types::{Batch, ChangeKind, ChangeRecord};

/// Per-kind change tally for one run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ChangeCounts {
    pub new: usize,
    pub count_increased: usize,
    pub value_changed: usize,
    pub count_decreased: usize,
    pub removed: usize,
}

impl ChangeCounts {
    pub fn from_records(records: &[ChangeRecord]) -> Self {
        let mut counts = Self::default();
        for record in records {
            match record.kind {
                ChangeKind::New => counts.new += 1,
                ChangeKind::CountIncreased => counts.count_increased += 1,
                ChangeKind::ValueChanged => counts.value_changed += 1,
                ChangeKind::CountDecreased => counts.count_decreased += 1,
                ChangeKind::Removed => counts.removed += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.new + self.count_increased + self.value_changed + self.count_decreased + self.removed
    }

    /// Report title suffix derived from the change mix, most newsworthy
    /// first.
    pub fn headline(&self) -> &'static str {
        if self.new > 0 && self.count_increased > 0 {
            "New Media and Episodes"
        } else if self.new > 0 {
            "New Media Added"
        } else if self.count_increased > 0 {
            "New Episodes Added"
        } else if self.removed > 0 || self.count_decreased > 0 {
            "Media Removed"
        } else if self.value_changed > 0 {
            "Quality Changes"
        } else {
            "Media Changes Detected"
        }
    }

    /// One-sentence report description, e.g. "Detected 3 new items and
    /// 1 quality change. Total change: +12.34 GB".
    pub fn describe(&self, total_delta: f64) -> String {
        let mut parts: Vec<String> = Vec::new();
        if self.new > 0 {
            parts.push(format!(
                "{} new {}",
                self.new,
                if self.new != 1 { "items" } else { "item" }
            ));
        }
        if self.count_increased > 0 {
            parts.push(format!(
                "{} {} with new episodes",
                self.count_increased,
                if self.count_increased != 1 { "shows" } else { "show" }
            ));
        }
        if self.count_decreased > 0 {
            parts.push(format!(
                "{} {} with removed episodes",
                self.count_decreased,
                if self.count_decreased != 1 { "shows" } else { "show" }
            ));
        }
        if self.value_changed > 0 {
            parts.push(format!(
                "{} quality {}",
                self.value_changed,
                if self.value_changed != 1 { "changes" } else { "change" }
            ));
        }
        if self.removed > 0 {
            parts.push(format!(
                "{} removed {}",
                self.removed,
                if self.removed != 1 { "items" } else { "item" }
            ));
        }

        let joined = match parts.len() {
            0 => "changes".to_string(),
            1 => parts.remove(0),
            _ => {
                let last = parts.pop().unwrap_or_default();
                format!("{}, and {}", parts.join(", "), last)
            }
        };

        let sign = if total_delta > 0.0 { "+" } else { "" };
        format!(
            "Detected {}. Total change: {}{}",
            joined,
            sign,
            format_size(total_delta)
        )
    }
}

/// Library and grand totals observed this run, plus the change tally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub libraries: Vec<LibrarySummary>,
    pub total_value: f64,
    pub movie_count: usize,
    pub show_count: usize,
    pub episode_count: u64,
    pub change_counts: ChangeCounts,
    pub value_delta_total: f64,
}

impl RunSummary {
    /// Grand-total line carried by every report.
    pub fn totals_line(&self, opts: &RenderOptions) -> String {
        format!(
            "{} across {} movies and {} shows with {} {}.",
            format_size(self.total_value),
            self.movie_count,
            self.show_count,
            self.episode_count,
            opts.count_label
        )
    }
}

/// Everything one engine invocation produced. Failures that the engine
/// recovers from (unreadable previous snapshot, failed persistence,
/// dropped report tail) surface here as flags, never as errors.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub first_run: bool,
    pub truncated: bool,
    pub snapshot_persisted: bool,
    pub changes: Vec<ChangeRecord>,
    pub batches: Vec<Batch>,
    pub summary: RunSummary,
}

impl RunReport {
    pub fn to_markdown(&self) -> String {
        let mut s = String::new();
        s.push_str("# mediadrift report\n\n");
        s.push_str(&format!("- first_run: `{}`\n", self.first_run));
        s.push_str(&format!("- changes: `{}`\n", self.changes.len()));
        s.push_str(&format!("- batches: `{}`\n", self.batches.len()));
        s.push_str(&format!("- truncated: `{}`\n", self.truncated));
        s.push_str(&format!(
            "- snapshot_persisted: `{}`\n",
            self.snapshot_persisted
        ));
        s.push('\n');

        s.push_str("## Libraries\n\n");
        if self.summary.libraries.is_empty() {
            s.push_str("- (none)\n");
        } else {
            for lib in &self.summary.libraries {
                match lib.episode_count {
                    Some(episodes) => s.push_str(&format!(
                        "- {}: `{}` across {} items ({} episodes)\n",
                        lib.library,
                        format_size(lib.total_value),
                        lib.item_count,
                        episodes
                    )),
                    None => s.push_str(&format!(
                        "- {}: `{}` across {} items\n",
                        lib.library,
                        format_size(lib.total_value),
                        lib.item_count
                    )),
                }
            }
        }
        s.push('\n');

        s.push_str("## Batches\n\n");
        if self.batches.is_empty() {
            s.push_str("- (nothing to deliver)\n");
        } else {
            for batch in &self.batches {
                s.push_str(&format!(
                    "### {}\n\n{} fields, {} chars used\n\n",
                    batch.title,
                    batch.fields.len(),
                    batch.chars_used
                ));
                for field in &batch.fields {
                    s.push_str(&format!("**{}**\n\n{}\n\n", field.name, field.value));
                }
            }
        }

        s
    }
}
