//! Wires the five stages into the topology spec.md §2 describes:
//!
//! ```text
//! searcher -> validator -> metafilter -> contentfilter -> final aggregator
//!    \            \            \              /
//!     `------------`------------`-- error_moderator
//! ```
//!
//! Grounded on `original_source/main.go`'s top-level wiring (`NewSearcher`,
//! `NewValidator`, `NewMetaFilter`, `NewContentFilter`,
//! `errflow.NewErrorModerator`, then `PrintMonitors`/`SaveDupsResults`) —
//! those last two are the CLI's job (`src/main.rs`), not the library's.

use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::config::Config;
use crate::error::ErrStatKeySnapshot;
use crate::pipeline::contentfilter::{ContentFilterHandles, DuplicateGroup, spawn_content_filter};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::error_moderator::spawn_error_moderator;
use crate::pipeline::metafilter::spawn_metafilter;
use crate::pipeline::searcher::spawn_searcher;
use crate::pipeline::validator::spawn_validator;
use crate::registry::MetaRegister;

/// Everything a caller needs once the pipeline has run to completion:
/// the duplicate groups, and a snapshot of error counts by `(severity,
/// kind, operation_path)` for the monitor/report to render.
pub struct PipelineOutcome {
    pub groups: Vec<DuplicateGroup>,
    pub error_counts: Vec<ErrStatKeySnapshot>,
    /// `true` unless the run was cut short by cancellation, mirroring the
    /// report writer's `_p_`/`_f_` filename distinction.
    pub completed: bool,
}

/// Runs every stage to completion (or until `cancel` fires) and returns the
/// joined duplicate groups. `meta_register` is exposed separately so a
/// caller (the monitor) can take snapshot reads of it while the pipeline is
/// still running, per spec.md §5's reader-writer discipline.
pub fn run_pipeline(config: Arc<Config>, cancel: CancellationToken) -> (Arc<MetaRegister>, std::thread::JoinHandle<PipelineOutcome>) {
    let ctx = PipelineContext::new(config.clone(), cancel.clone());
    let meta_register = Arc::new(MetaRegister::new());

    let searcher = spawn_searcher(&ctx);
    let validator = spawn_validator(&ctx, searcher.paths);
    let metafilter = spawn_metafilter(&ctx, validator.stats, meta_register.clone());

    let ContentFilterHandles {
        errors: content_errors,
        aggregator,
        ..
    } = spawn_content_filter(&ctx, metafilter.duplicates, meta_register.clone());

    let moderator = spawn_error_moderator(
        vec![
            searcher.errors,
            validator.errors,
            metafilter.errors,
            content_errors,
        ],
        cancel.clone(),
        config.cancel_on_critical,
    );

    let handle = std::thread::spawn(move || {
        let groups = aggregator.join().unwrap_or_default();
        moderator.done.join().ok();
        let error_counts = crate::pipeline::error_moderator::sorted_counts(&moderator.stats)
            .into_iter()
            .map(|(key, count)| ErrStatKeySnapshot {
                severity: key.severity,
                kind: key.kind,
                operation_path: key.operation_path,
                count,
            })
            .collect();
        let completed = !cancel.is_cancelled();
        PipelineOutcome {
            groups,
            error_counts,
            completed,
        }
    });

    (meta_register, handle)
}
