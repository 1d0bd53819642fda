//! MetaFilter: buckets FileStats by `meta_key` and forwards candidate
//! duplicates (the bucket's second entry onward) to the hash cascade.
//! Single worker, guarded by `MetaRegister`'s own write lock, grounded on
//! `original_source/workflow/filtering/metafilter.go`.
//!
//! Deviation from the Go source: the emission gate there is keyed on
//! *distinct inode count* (`len(inodes) > 1`), which means a pure hardlink
//! duplicate — one inode, two paths inserted under the same map key — never
//! crosses the threshold and is silently dropped. spec.md's S3 scenario
//! requires exactly that case to form a group of size 2 with the full hash
//! computed once, which only holds if both hardlink paths actually reach
//! the content cascade (where single-flight collapses the redundant
//! computation). This implementation therefore gates on the bucket's total
//! FileStat *entry* count, not its distinct inode count — identical to the
//! Go behavior whenever every inode in a bucket has exactly one path, and a
//! strict generalization of it otherwise.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::Receiver;

use crate::cancel::{recv_cancelable, send_cancelable};
use crate::error::{Error, Kind, OperationPath, Severity};
use crate::model::FileStat;
use crate::pipeline::content_id::ContentId;
use crate::pipeline::context::PipelineContext;
use crate::registry::MetaRegister;

pub struct MetaFilterHandles {
    pub duplicates: Receiver<ContentId>,
    /// MetaFilter performs no fallible I/O of its own (spec.md §4.3 names no
    /// error kind for it), so in ordinary operation this channel only ever
    /// closes empty. It exists so a panic in the worker still has somewhere
    /// to report, per spec.md:142.
    pub errors: Receiver<Error>,
}

/// Spawns the single MetaFilter worker over `stats`, sharing `register`
/// with whoever performs the final join against it once the cascade
/// completes.
pub fn spawn_metafilter(
    ctx: &PipelineContext,
    stats: Receiver<FileStat>,
    register: Arc<MetaRegister>,
) -> MetaFilterHandles {
    let worker_count = ctx.cpu_count.max(1);
    let (dup_tx, dup_rx) = crossbeam_channel::bounded::<ContentId>(2 * worker_count);
    let (err_tx, err_rx) = crossbeam_channel::bounded::<Error>(2);
    let cancel = ctx.cancel.clone();

    thread::spawn(move || {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            while let Some(fs) = recv_cancelable(&stats, &cancel) {
                let bucket = register.check_in(fs.clone());
                let total_entries: usize = bucket.values().map(|entries| entries.len()).sum();
                if total_entries <= 1 {
                    continue;
                }
                if total_entries == 2 {
                    let mut sent = false;
                    'outer: for entries in bucket.values() {
                        for entry in entries {
                            if !Arc::ptr_eq(entry, &fs) {
                                if send_cancelable(
                                    &dup_tx,
                                    ContentId {
                                        acc_checksum: String::new(),
                                        fs: entry.clone(),
                                    },
                                    &cancel,
                                )
                                .is_err()
                                {
                                    sent = true;
                                    break 'outer;
                                }
                            }
                        }
                    }
                    if sent {
                        break;
                    }
                }
                if send_cancelable(
                    &dup_tx,
                    ContentId {
                        acc_checksum: String::new(),
                        fs: fs.clone(),
                    },
                    &cancel,
                )
                .is_err()
                {
                    break;
                }
            }
        }));
        if let Err(payload) = result {
            let op = OperationPath::new().push("metafilter").push("panic");
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
    });

    MetaFilterHandles {
        duplicates: dup_rx,
        errors: err_rx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use crate::config::Config;
    use std::path::PathBuf;
    use std::time::UNIX_EPOCH;

    fn fs(meta_key: &str, inode: u64, path: &str) -> FileStat {
        Arc::new(crate::model::FileStatData {
            path: PathBuf::from(path),
            base_name: path.to_string(),
            inode,
            size: 10,
            blksize: 4096,
            blocks: 1,
            perm: 0o644,
            uid: 0,
            gid: 0,
            user: "root".into(),
            group: "root".into(),
            mtime: UNIX_EPOCH,
            is_regular: true,
            nlink: 2,
            symlink: None,
            meta_key: meta_key.to_string(),
            priority_tag: "00".into(),
            sort_key: String::new(),
        })
    }

    #[test]
    fn solitary_entry_emits_nothing() {
        let ctx = PipelineContext::new(Arc::new(Config::default()), CancellationToken::new());
        let register = Arc::new(MetaRegister::new());
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(fs("k", 1, "/a")).unwrap();
        drop(tx);
        let handles = spawn_metafilter(&ctx, rx, register);
        assert!(handles.duplicates.recv_timeout(std::time::Duration::from_millis(200)).is_err());
    }

    #[test]
    fn hardlink_pair_same_inode_emits_both_paths() {
        let ctx = PipelineContext::new(Arc::new(Config::default()), CancellationToken::new());
        let register = Arc::new(MetaRegister::new());
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(fs("k", 1, "/a")).unwrap();
        tx.send(fs("k", 1, "/b")).unwrap();
        drop(tx);
        let handles = spawn_metafilter(&ctx, rx, register);
        let first = handles.duplicates.recv().unwrap();
        let second = handles.duplicates.recv().unwrap();
        assert_eq!(first.fs.path, PathBuf::from("/a"));
        assert_eq!(second.fs.path, PathBuf::from("/b"));
    }

    #[test]
    fn third_arrival_to_emitted_bucket_sends_only_newcomer() {
        let ctx = PipelineContext::new(Arc::new(Config::default()), CancellationToken::new());
        let register = Arc::new(MetaRegister::new());
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(fs("k", 1, "/a")).unwrap();
        tx.send(fs("k", 2, "/b")).unwrap();
        tx.send(fs("k", 3, "/c")).unwrap();
        drop(tx);
        let handles = spawn_metafilter(&ctx, rx, register);
        let _a = handles.duplicates.recv().unwrap();
        let _b = handles.duplicates.recv().unwrap();
        let third = handles.duplicates.recv().unwrap();
        assert_eq!(third.fs.path, PathBuf::from("/c"));
        assert!(handles.duplicates.recv_timeout(std::time::Duration::from_millis(200)).is_err());
    }
}
