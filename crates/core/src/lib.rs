pub mod batch;
pub mod config;
pub mod diff;
pub mod render;
pub mod report;
pub mod snapshot;
pub mod types;

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::batch::Packed;
use crate::render::RenderOptions;
use crate::report::{ChangeCounts, RunReport, RunSummary};
use crate::snapshot::{LoadedSnapshot, SnapshotStore};
use crate::types::{ItemState, NamedBlock, Snapshot};

pub use crate::diff::DEFAULT_EPSILON;
pub use crate::render::LibrarySummary;

const DEFAULT_REPORT_TITLE: &str = "Media Size Report";

/// One item as handed over by the retrieval layer: library it belongs
/// to, display title, total size in GB, and an optional episode count
/// for show-style items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedItem {
    pub library: String,
    pub title: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl ObservedItem {
    /// Snapshot key. The library prefix keeps titles unique across
    /// libraries and lets removed items fall back to a grouped section.
    pub fn id(&self) -> String {
        format!("{}/{}", self.library, self.title)
    }
}

/// What the first observed run of a domain should report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirstRunPolicy {
    /// Emit a single coarse "Initial Scan" summary batch; never
    /// synthesize per-item records.
    #[default]
    Summary,
    /// Emit nothing at all.
    Suppress,
}

impl std::str::FromStr for FirstRunPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(FirstRunPolicy::Summary),
            "suppress" | "none" => Ok(FirstRunPolicy::Suppress),
            _ => Err(format!("unknown first-run policy: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub epsilon: f64,
    /// Where the previous snapshot lives. `None` runs stateless, which
    /// behaves like a first run and persists nothing.
    pub snapshot_path: Option<PathBuf>,
    pub first_run_policy: FirstRunPolicy,
    pub count_label: String,
    /// Base title for every outbound batch; a per-run suffix is derived
    /// from the change mix.
    pub report_title: Option<String>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            snapshot_path: None,
            first_run_policy: FirstRunPolicy::default(),
            count_label: "episodes".to_string(),
            report_title: None,
        }
    }
}

/// Run the engine once: load the previous snapshot, diff it against the
/// current observation, render and pack the change report, and persist
/// the observation as the next run's baseline.
///
/// Recoverable failures never bubble out: an unreadable previous
/// snapshot becomes a first run, a failed snapshot write becomes
/// `snapshot_persisted == false`, and an over-budget report becomes
/// `truncated == true`.
pub fn build_report(
    observed: &[ObservedItem],
    opts: &ReportOptions,
) -> anyhow::Result<RunReport> {
    let render_opts = RenderOptions {
        count_label: opts.count_label.clone(),
    };

    let store = opts.snapshot_path.as_ref().map(SnapshotStore::new);
    let loaded = match &store {
        Some(store) => store.load(),
        None => LoadedSnapshot {
            snapshot: Snapshot::new(),
            first_run: true,
        },
    };

    let now = Utc::now();
    let mut current = Snapshot::new();
    for item in observed {
        current.insert(
            item.id(),
            ItemState {
                value: item.value,
                count: item.count,
                group: Some(item.library.clone()),
                last_updated: now,
            },
        );
    }

    let changes = if loaded.first_run {
        Vec::new()
    } else {
        diff::diff(&loaded.snapshot, &current, opts.epsilon)
    };
    info!(
        items = current.len(),
        first_run = loaded.first_run,
        changes = changes.len(),
        "observation diffed"
    );

    let summary = summarize(observed, &changes);

    // Group lookup for the renderer: current items know their library,
    // removed items fall back to the group recorded in the previous
    // snapshot, then to the id prefix.
    let mut groups: HashMap<String, String> = HashMap::new();
    for (id, state) in loaded.snapshot.iter() {
        if let Some(group) = &state.group {
            groups.insert(id.clone(), group.clone());
        }
    }
    for item in observed {
        groups.insert(item.id(), item.library.clone());
    }
    let group_by = |id: &str| {
        groups.get(id).cloned().unwrap_or_else(|| {
            id.split_once('/')
                .map(|(group, _)| group.to_string())
                .unwrap_or_else(|| "Library".to_string())
        })
    };

    let base_title = opts
        .report_title
        .clone()
        .unwrap_or_else(|| DEFAULT_REPORT_TITLE.to_string());

    let (title, description, blocks) = if loaded.first_run {
        match opts.first_run_policy {
            FirstRunPolicy::Suppress => (String::new(), String::new(), Vec::new()),
            FirstRunPolicy::Summary => (
                format!("{base_title} - Initial Scan"),
                format!(
                    "Recorded {} items across {} libraries.",
                    observed.len(),
                    summary.libraries.len()
                ),
                vec![
                    render::library_summary(&summary.libraries, &render_opts),
                    NamedBlock::new(
                        "Total Media Size",
                        vec![summary.totals_line(&render_opts)],
                    ),
                ],
            ),
        }
    } else if changes.is_empty() {
        (String::new(), String::new(), Vec::new())
    } else {
        let title = format!("{base_title} - {}", summary.change_counts.headline());
        let description = summary
            .change_counts
            .describe(summary.value_delta_total);
        let mut blocks = vec![
            render::library_summary(&summary.libraries, &render_opts),
            NamedBlock::new(
                "Total Media Size",
                vec![summary.totals_line(&render_opts)],
            ),
        ];
        blocks.extend(render::render(&changes, group_by, &render_opts));
        (title, description, blocks)
    };

    let packed = if blocks.is_empty() {
        Packed {
            batches: Vec::new(),
            truncated: false,
        }
    } else {
        batch::pack(&blocks, &title, &description)
    };

    let mut snapshot_persisted = true;
    if let Some(store) = &store {
        if let Err(e) = store.save(&current) {
            warn!(
                error = %format!("{e:#}"),
                "failed to persist snapshot; next run will re-detect these changes"
            );
            snapshot_persisted = false;
        }
    }

    Ok(RunReport {
        first_run: loaded.first_run,
        truncated: packed.truncated,
        snapshot_persisted,
        changes,
        batches: packed.batches,
        summary,
    })
}

fn summarize(observed: &[ObservedItem], changes: &[types::ChangeRecord]) -> RunSummary {
    let mut libraries: Vec<LibrarySummary> = Vec::new();
    for item in observed {
        match libraries.iter_mut().find(|l| l.library == item.library) {
            Some(lib) => {
                lib.total_value += item.value;
                lib.item_count += 1;
                if let Some(count) = item.count {
                    *lib.episode_count.get_or_insert(0) += count;
                }
            }
            None => libraries.push(LibrarySummary {
                library: item.library.clone(),
                total_value: item.value,
                item_count: 1,
                episode_count: item.count,
            }),
        }
    }

    let total_value = libraries.iter().map(|l| l.total_value).sum();
    let movie_count = libraries
        .iter()
        .filter(|l| l.episode_count.is_none())
        .map(|l| l.item_count)
        .sum();
    let show_count = libraries
        .iter()
        .filter(|l| l.episode_count.is_some())
        .map(|l| l.item_count)
        .sum();
    let episode_count = libraries.iter().filter_map(|l| l.episode_count).sum();

    RunSummary {
        libraries,
        total_value,
        movie_count,
        show_count,
        episode_count,
        change_counts: ChangeCounts::from_records(changes),
        value_delta_total: changes.iter().map(|r| r.value_delta()).sum(),
    }
}
