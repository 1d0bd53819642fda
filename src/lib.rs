//! dupfinder: a concurrent, priority-ranked duplicate file finder built as
//! a five-stage streaming pipeline (search -> validate -> meta-bucket ->
//! hash cascade -> join), with single-flight hashing per inode and
//! multiplexed error handling. See `README.md` for the CLI; this crate
//! also exposes the pipeline as a library for embedding.

pub mod cancel;
pub mod cli;
pub mod config;
pub mod error;
pub mod hashing;
pub mod model;
pub mod monitor;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod stats;
pub mod utils;

use std::sync::Arc;

use cancel::CancellationToken;
use config::Config;
use pipeline::PipelineOutcome;
use registry::MetaRegister;

/// Runs the full pipeline to completion (or until `cancel` fires) and
/// returns the joined duplicate groups plus error statistics. This is the
/// library's single entry point; `src/main.rs` layers config loading, a
/// periodic monitor and the report writer on top of it.
pub fn find_duplicates(config: Arc<Config>, cancel: CancellationToken) -> PipelineOutcome {
    let (_meta_register, handle) = pipeline::run_pipeline(config, cancel);
    handle.join().expect("pipeline thread panicked")
}

/// Runs the pipeline while also handing the caller `MetaRegister` access for
/// live progress reporting (e.g. a monitor loop ticking against a snapshot
/// while `handle` is still running). Prefer [`find_duplicates`] when no
/// progress reporting is needed.
pub fn find_duplicates_with_handle(
    config: Arc<Config>,
    cancel: CancellationToken,
) -> (Arc<MetaRegister>, std::thread::JoinHandle<PipelineOutcome>) {
    pipeline::run_pipeline(config, cancel)
}
