//! Periodic textual status dump. Grounded on
//! `original_source/output/monitors.go::PrintMonitors` — same sections
//! (search/validate counts, per-stage hash-group counts, duplicate summary,
//! error tally), colorized with `colored` like the teacher's CLI output.
//! The original's per-group size quantile histogram (`gonum`) is dropped in
//! favor of plain totals (unique/total/reclaimable bytes) so this crate
//! doesn't pick up a statistics dependency neither the teacher nor the rest
//! of the pack carries.
//!
//! Reads are always through each registry's `snapshot`/`counter` surface,
//! never a live reference while the pipeline is active, per spec.md §5's
//! reader-writer discipline ("live reference is returned only after
//! completion").

use colored::Colorize;

use crate::error::ErrStatKeySnapshot;
use crate::pipeline::DuplicateGroup;
use crate::registry::{MetaRegister, StageRegister};
use crate::stats::Encounter;
use std::path::PathBuf;

/// One textual render of the pipeline's progress. Produced on each monitor
/// tick and once more at shutdown with `completed: true`.
pub fn render(
    completed: bool,
    elapsed: std::time::Duration,
    found_paths: &Encounter<PathBuf>,
    meta_register: &MetaRegister,
    stage_registers: &[&StageRegister],
) -> String {
    let mut out = String::new();
    if completed {
        out.push_str(&format!("{}\n", "========== Final stats ==========".green().bold()));
    } else {
        out.push_str(&format!("{}\n", "---------- Processing stats ----------".dimmed()));
    }
    out.push_str(&format!("Time elapsed: {:.1?}\n", elapsed));

    out.push_str(&format!("{}\n", "Search & validation:".blue()));
    out.push_str(&format!(
        "  {:>12}/{} files (found/unique)\n",
        found_paths.total_count(),
        found_paths.keys_count()
    ));
    out.push_str(&format!(
        "  {:>8}(groups) validated by metadata\n",
        meta_register.groups_count()
    ));

    out.push_str(&format!("\n{}\n", "Hash filters:".green()));
    for (i, stage) in stage_registers.iter().enumerate() {
        out.push_str(&format!(
            "  [{i:>2}]: {:>8}(groups)\n",
            stage.keys_counter().keys_count()
        ));
    }
    out
}

/// Lightweight heartbeat for a periodic CLI loop that only has access to
/// `MetaRegister` (the handle `run_pipeline` hands back), not the internal
/// per-stage registers. Used by `src/main.rs`'s redraw loop; `render` above
/// stays available for an embedder with deeper pipeline access.
pub fn render_heartbeat(elapsed: std::time::Duration, meta_register: &MetaRegister) -> String {
    format!(
        "{} elapsed {:.1?}, {:>8} meta groups seen so far\n",
        "---------- Processing stats ----------".dimmed(),
        elapsed,
        meta_register.groups_count()
    )
}

/// The "Duplicates found" section, computed from the final join result
/// rather than a registry (only available once the aggregator has
/// materialized groups).
pub fn render_duplicates_summary(groups: &[DuplicateGroup]) -> String {
    let mut out = String::new();
    let group_count = groups.len();
    let mut total_files = 0usize;
    let mut unique_bytes: u64 = 0;
    let mut total_bytes: u64 = 0;
    for g in groups {
        total_files += g.files.len();
        if let Some(first) = g.files.first() {
            unique_bytes += first.size;
        }
        total_bytes += g.files.iter().map(|f| f.size).sum::<u64>();
    }
    out.push_str(&format!("\n{}\n", "Duplicates found:".purple()));
    out.push_str(&format!(
        "  {:>10}(groups) {:>8}(files) {:>14}(unique) {:>14}(total) {:>14}(reclaimable)\n",
        group_count,
        total_files,
        human_bytes(unique_bytes),
        human_bytes(total_bytes),
        human_bytes(total_bytes.saturating_sub(unique_bytes)),
    ));
    out
}

pub fn render_error_summary(counts: &[ErrStatKeySnapshot]) -> String {
    if counts.is_empty() {
        return String::new();
    }
    let mut out = format!("\n{}\n", "Errors:".red());
    for c in counts {
        out.push_str(&format!(
            "  *{:<8}: {:<40} # {:>4} - {:?}\n",
            c.severity.to_string(),
            c.operation_path,
            c.count,
            c.kind
        ));
    }
    out
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes}B")
    } else {
        format!("{size:.1}{}", UNITS[unit])
    }
}
