//! ContentFilter: the head/tail/full hash cascade, single-flight hashing
//! per (inode, stage), and the final join against `MetaRegister`. Grounded
//! on `original_source/workflow/filtering/contentfilter.go` and
//! `registrator/{mcifs,mcifs_register,inode_checksums}.go`.
//!
//! Bypass target: the Go source pushes a small file straight to
//! `contentIds[lastIndex-1]`. Under that source's own channel-indexing
//! convention (`contentIds[i]` is stage `i`'s *output*, which doubles as
//! stage `i+1`'s *input*), `contentIds[lastIndex-1]` already denotes the
//! last stage's input queue — so the expression is not actually the
//! off-by-one the REDESIGN FLAG suspects it of being. This implementation
//! still names the target explicitly (`bypass_target`, built once from the
//! channel that feeds the last stage) rather than via an arithmetic index,
//! so the bypass destination is correct regardless of how many prefilter
//! stages are configured — see the `bypass_skips_every_intermediate_stage`
//! test below.
//!
//! The same `total entries, not distinct inodes` emission gate used in
//! `metafilter` is applied at each stage's `StageRegister` too, for the
//! same reason: a pure hardlink pair must keep flowing through the cascade
//! for S3 to hold.

use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, bounded};

use crate::cancel::{recv_cancelable, send_cancelable};
use crate::error::{Error, Kind, OperationPath, Severity};
use crate::hashing::{extend_checksum, hash_range};
use crate::model::filestat::below_prefilter_threshold;
use crate::pipeline::content_id::ContentId;
use crate::pipeline::context::PipelineContext;
use crate::registry::{CheckIn, InodeChecksumTable, McKey, MetaRegister, StageRegister};

pub struct DuplicateGroup {
    pub mckey: McKey,
    pub files: Vec<crate::model::FileStat>,
}

pub struct ContentFilterHandles {
    pub errors: Receiver<Error>,
    pub stage_registers: Vec<Arc<StageRegister>>,
    pub content_register: Arc<StageRegister>,
    /// Resolves once the last stage's output queue closes and the final
    /// join against `MetaRegister` has run, per spec.md's "atomically
    /// marks the pipeline completed" aggregator contract.
    pub aggregator: JoinHandle<Vec<DuplicateGroup>>,
}

pub fn spawn_content_filter(
    ctx: &PipelineContext,
    duplicates: Receiver<ContentId>,
    meta_register: Arc<MetaRegister>,
) -> ContentFilterHandles {
    let stages = ctx.config.hash_stages.clone();
    let n = stages.len();
    assert!(n > 0, "full is always a configured stage");
    let workers_per_stage = ctx.cpu_count.max(1);

    let mut senders: Vec<Sender<ContentId>> = Vec::with_capacity(n);
    let mut receivers: Vec<Receiver<ContentId>> = Vec::with_capacity(n);
    for _ in 0..n {
        let (tx, rx) = bounded::<ContentId>(2 * workers_per_stage);
        senders.push(tx);
        receivers.push(rx);
    }
    let last_index = n - 1;
    let bypass_target = senders[last_index.saturating_sub(1).min(last_index)].clone();

    let (err_tx, err_rx) = bounded::<Error>(workers_per_stage * n * 2 + 1);

    let min_bypass_size = ctx.config.prefilter_window_sum();
    let size_in_blocks = ctx.config.size_in_blocks;

    let mut stage_registers: Vec<Arc<StageRegister>> = Vec::with_capacity(n);

    for index in 0..n {
        let spec = stages[index].clone();
        let input = if index == 0 {
            duplicates.clone()
        } else {
            receivers[index - 1].clone()
        };
        let output = senders[index].clone();
        let bypass_target = bypass_target.clone();
        let stage_register = Arc::new(StageRegister::new());
        stage_registers.push(stage_register.clone());
        let inode_table = Arc::new(InodeChecksumTable::new());
        let op = OperationPath::new()
            .push("contentfilter")
            .push(format!("stage_{index}"));

        let mut workers = Vec::with_capacity(workers_per_stage);
        for _ in 0..workers_per_stage {
            let input = input.clone();
            let output = output.clone();
            let bypass_target = bypass_target.clone();
            let stage_register = stage_register.clone();
            let inode_table = inode_table.clone();
            let cancel = ctx.cancel.clone();
            let err_tx = err_tx.clone();
            let spec = spec.clone();
            let op = op.clone();

            workers.push(thread::spawn(move || {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    'items: while let Some(cid) = recv_cancelable(&input, &cancel) {
                        if index < last_index
                            && below_prefilter_threshold(&cid.fs, min_bypass_size, size_in_blocks)
                        {
                            let _ = send_cancelable(&bypass_target, cid, &cancel);
                            continue 'items;
                        }

                        let inode = cid.fs.inode;
                        let digest = loop {
                            match inode_table.check_in(inode) {
                                CheckIn::Poisoned => continue 'items,
                                CheckIn::Hit { digest, .. } => break digest,
                                CheckIn::Waiter(latch) => {
                                    latch.wait(&cancel);
                                    if cancel.is_cancelled() {
                                        continue 'items;
                                    }
                                    continue;
                                }
                                CheckIn::Computer => {
                                    match hash_range(&cid.fs.path, spec.kind, spec.algo) {
                                        Ok((digest, bytes_read)) => {
                                            inode_table.update(inode, digest.clone(), bytes_read);
                                            break digest;
                                        }
                                        Err(e) => {
                                            inode_table.poison(inode);
                                            let _ = send_cancelable(
                                                &err_tx,
                                                Error::new(
                                                    Kind::Io,
                                                    Severity::Warning,
                                                    op.push("hash"),
                                                    format!(
                                                        "stage {} hashing {} failed: {e}",
                                                        spec.name,
                                                        cid.fs.path.display()
                                                    ),
                                                ),
                                                &cancel,
                                            );
                                            continue 'items;
                                        }
                                    }
                                }
                            }
                        };

                        let new_checksum = extend_checksum(&cid.acc_checksum, &digest);
                        let bucket = stage_register.check_in(cid.fs.clone(), &new_checksum);
                        let total_entries: usize = bucket.values().map(|v| v.len()).sum();
                        if total_entries <= 1 {
                            continue 'items;
                        }
                        if total_entries == 2 {
                            for entries in bucket.values() {
                                for entry in entries {
                                    if !Arc::ptr_eq(entry, &cid.fs) {
                                        let emitted = ContentId {
                                            acc_checksum: new_checksum.clone(),
                                            fs: entry.clone(),
                                        };
                                        if send_cancelable(&output, emitted, &cancel).is_err() {
                                            continue 'items;
                                        }
                                    }
                                }
                            }
                        }
                        let _ = send_cancelable(
                            &output,
                            ContentId {
                                acc_checksum: new_checksum,
                                fs: cid.fs.clone(),
                            },
                            &cancel,
                        );
                    }
                }));
                if let Err(payload) = result {
                    let _ = send_cancelable(
                        &err_tx,
                        Error::new(
                            Kind::Internal,
                            Severity::Critical,
                            op.push("panic"),
                            format!("worker panicked: {}", crate::error::panic_message(payload)),
                        ),
                        &cancel,
                    );
                }
            }));
        }

        // `output`'s last live clone outside the workers themselves; dropped
        // once every worker exits so the next stage (or the aggregator) sees
        // the channel close.
        thread::spawn(move || {
            for w in workers {
                let _ = w.join();
            }
            drop(output);
        });
    }
    drop(err_tx);

    let final_rx = receivers[last_index].clone();
    let content_register = Arc::new(StageRegister::new());
    let aggregator = {
        let content_register = content_register.clone();
        let cancel = ctx.cancel.clone();
        thread::spawn(move || {
            while let Some(cid) = recv_cancelable(&final_rx, &cancel) {
                content_register.check_in(cid.fs, &cid.acc_checksum);
            }
            let mut groups = Vec::new();
            for (mckey, inodes) in content_register.snapshot() {
                let mut files = Vec::new();
                for inode in inodes.keys() {
                    files.extend(meta_register.links_for(&mckey.meta_key, *inode));
                }
                files.sort_by(|a, b| a.sort_key.cmp(&b.sort_key));
                groups.push(DuplicateGroup { mckey, files });
            }
            groups
        })
    };

    ContentFilterHandles {
        errors: err_rx,
        stage_registers,
        content_register,
        aggregator,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use crate::config::Config;
    use crate::hashing::{HashAlgo, HashStageSpec, StageKind};
    use crate::model::FileStatData;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn cid_for(path: PathBuf, inode: u64, size: u64) -> ContentId {
        let meta = std::fs::metadata(&path).unwrap();
        use std::os::unix::fs::MetadataExt;
        ContentId {
            acc_checksum: String::new(),
            fs: Arc::new(FileStatData {
                path,
                base_name: "f".into(),
                inode,
                size,
                blksize: meta.blksize() as i64,
                blocks: 1,
                perm: 0o644,
                uid: 0,
                gid: 0,
                user: "root".into(),
                group: "root".into(),
                mtime: std::time::UNIX_EPOCH,
                is_regular: true,
                nlink: 1,
                symlink: None,
                meta_key: "k".into(),
                priority_tag: "00".into(),
                sort_key: format!("{inode:020}"),
            }),
        }
    }

    #[test]
    fn bypass_skips_every_intermediate_stage() {
        let dir = tempfile::tempdir().unwrap();
        let small = dir.path().join("small.bin");
        std::fs::File::create(&small).unwrap().write_all(b"x").unwrap();

        let mut config = Config::default();
        config.roots = vec![dir.path().to_path_buf()];
        config.hash_stages = vec![
            HashStageSpec { name: "head".into(), kind: StageKind::Head(512), algo: HashAlgo::Sha256 },
            HashStageSpec { name: "tail".into(), kind: StageKind::Tail(512), algo: HashAlgo::Sha256 },
            HashStageSpec { name: "dummy".into(), kind: StageKind::Head(256), algo: HashAlgo::Blake3 },
            HashStageSpec { name: "full".into(), kind: StageKind::Full, algo: HashAlgo::Sha256 },
        ];
        let ctx = PipelineContext::new(Arc::new(config), CancellationToken::new());
        let meta_register = Arc::new(MetaRegister::new());

        let (dup_tx, dup_rx) = crossbeam_channel::unbounded();
        dup_tx.send(cid_for(small.clone(), 1, 1)).unwrap();
        dup_tx.send(cid_for(small, 2, 1)).unwrap();
        drop(dup_tx);

        let handles = spawn_content_filter(&ctx, dup_rx, meta_register);
        let groups = handles.aggregator.join().unwrap();

        assert_eq!(handles.stage_registers[0].keys_counter().keys_count(), 0);
        assert_eq!(handles.stage_registers[1].keys_counter().keys_count(), 0);
        assert_eq!(handles.stage_registers[2].keys_counter().keys_count(), 0);
        assert_eq!(handles.stage_registers[3].keys_counter().keys_count(), 1);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].files.len(), 0); // meta_register was never populated in this unit test
    }

    #[test]
    fn single_stage_never_bypasses() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("a.bin");
        std::fs::File::create(&f).unwrap().write_all(b"hello").unwrap();

        let mut config = Config::default();
        config.roots = vec![dir.path().to_path_buf()];
        config.hash_stages = vec![HashStageSpec {
            name: "full".into(),
            kind: StageKind::Full,
            algo: HashAlgo::Sha256,
        }];
        let ctx = PipelineContext::new(Arc::new(config), CancellationToken::new());
        let meta_register = Arc::new(MetaRegister::new());

        let (dup_tx, dup_rx) = crossbeam_channel::unbounded();
        dup_tx.send(cid_for(f.clone(), 1, 5)).unwrap();
        dup_tx.send(cid_for(f, 2, 5)).unwrap();
        drop(dup_tx);

        let handles = spawn_content_filter(&ctx, dup_rx, meta_register);
        let groups = handles.aggregator.join().unwrap();
        assert_eq!(handles.stage_registers[0].keys_counter().keys_count(), 1);
        assert_eq!(groups.len(), 1);
    }
}
