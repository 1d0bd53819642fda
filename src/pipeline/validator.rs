//! Validator: turns candidate paths into `FileStat`s, filtering out
//! everything that isn't a regular file within the configured size bounds.
//! Grounded on the teacher's `pipeline::metadata::spawn_metadata_workers`
//! worker-pool shape, generalized from "stat + optional hash" to
//! "stat + validate + meta-key", with stat failures routed to the error
//! channel instead of silently dropped.

use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::cancel::{recv_cancelable, send_cancelable};
use crate::error::{Error, Kind, OperationPath, Severity};
use crate::model::{FileStat, MetaKeyBuilder, build_file_stat};
use crate::pipeline::context::PipelineContext;

pub struct ValidatorHandles {
    pub stats: Receiver<FileStat>,
    pub errors: Receiver<Error>,
}

/// Spawns `ctx.cpu_count` workers, each pulling paths from `paths`,
/// building and validating a `FileStat`, and forwarding survivors. The
/// caller's clone of `paths`'s sender must be dropped for workers to ever
/// see the channel close.
pub fn spawn_validator(ctx: &PipelineContext, paths: Receiver<PathBuf>) -> ValidatorHandles {
    let worker_count = ctx.cpu_count.max(1);
    // spec.md §5: "Validator output: |input|·cpu_count" — |input| is the
    // searcher output queue's own capacity, read straight off the channel
    // rather than re-derived, so it stays correct under brace expansion.
    let input_capacity = paths.capacity().unwrap_or(1).max(1);
    let out_capacity = input_capacity * worker_count;
    let (stat_tx, stat_rx) = crossbeam_channel::bounded::<FileStat>(out_capacity);
    let (err_tx, err_rx) = crossbeam_channel::bounded::<Error>(2 * out_capacity);

    let meta_key = MetaKeyBuilder::from_groups(&ctx.config.meta_groups);
    let roots = ctx.config.roots.clone();
    let slink_enabled = ctx.config.slink_enabled;
    let min_size = ctx.config.min_size;
    let max_size = ctx.config.max_size;

    let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let paths = paths.clone();
        let stat_tx = stat_tx.clone();
        let err_tx = err_tx.clone();
        let cancel = ctx.cancel.clone();
        let meta_key = meta_key;
        let roots = roots.clone();

        handles.push(thread::spawn(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                while let Some(path) = recv_cancelable(&paths, &cancel) {
                    match build_file_stat(&path, slink_enabled, &meta_key, &roots) {
                        Ok(fs) => {
                            if crate::model::filestat::validate_regular_size(&fs, min_size, max_size)
                                && send_cancelable(&stat_tx, fs, &cancel).is_err()
                            {
                                break;
                            }
                        }
                        Err(e) => {
                            if send_cancelable(&err_tx, e, &cancel).is_err() {
                                break;
                            }
                        }
                    }
                }
            }));
            if let Err(payload) = result {
                let op = OperationPath::new().push("validator").push("panic");
                let _ = send_cancelable(
                    &err_tx,
                    Error::new(
                        Kind::Internal,
                        Severity::Critical,
                        op,
                        format!("worker panicked: {}", crate::error::panic_message(payload)),
                    ),
                    &cancel,
                );
            }
        }));
    }
    drop(stat_tx);
    drop(err_tx);

    // Detach a joiner so the handles vec doesn't need to outlive this call;
    // the channels themselves carry the results, matching the teacher's
    // fire-and-forget worker pool.
    thread::spawn(move || {
        for h in handles {
            let _ = h.join();
        }
    });

    ValidatorHandles {
        stats: stat_rx,
        errors: err_rx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use crate::config::Config;
    use crate::pipeline::context::PipelineContext;
    use std::io::Write;
    use std::sync::Arc;

    #[test]
    fn valid_regular_file_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("a.txt");
        std::fs::File::create(&file_path)
            .unwrap()
            .write_all(b"hello")
            .unwrap();

        let mut config = Config::default();
        config.roots = vec![dir.path().to_path_buf()];
        let ctx = PipelineContext::new(Arc::new(config), CancellationToken::new());

        let (path_tx, path_rx) = crossbeam_channel::unbounded();
        path_tx.send(file_path.clone()).unwrap();
        drop(path_tx);

        let handles = spawn_validator(&ctx, path_rx);
        let fs = handles.stats.recv().unwrap();
        assert_eq!(fs.path, file_path);
        assert!(handles.stats.recv().is_err());
    }

    #[test]
    fn directory_is_filtered_out_not_errored() {
        let dir = tempfile::tempdir().unwrap();

        let mut config = Config::default();
        config.roots = vec![dir.path().to_path_buf()];
        let ctx = PipelineContext::new(Arc::new(config), CancellationToken::new());

        let (path_tx, path_rx) = crossbeam_channel::unbounded();
        path_tx.send(dir.path().to_path_buf()).unwrap();
        drop(path_tx);

        let handles = spawn_validator(&ctx, path_rx);
        assert!(handles.stats.recv().is_err());
        assert!(handles.errors.recv().is_err());
    }
}
