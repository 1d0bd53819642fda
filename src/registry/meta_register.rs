//! MetaKey → Inode → [FileStat] registry, written by MetaFilter and read by
//! ContentFilter's final join and by reporting. Grounded on
//! `original_source/registrator/{mifs,mifs_register}.go`. Owns its map
//! behind `check_in`/`snapshot`, never exposed as an ambient mutex, per
//! spec.md's DESIGN NOTES.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::model::{FileStat, Inode};
use crate::stats::Encounter;

#[derive(Default)]
struct Inner {
    buckets: HashMap<String, HashMap<Inode, Vec<FileStat>>>,
}

pub struct MetaRegister {
    inner: RwLock<Inner>,
    size_counter: Encounter<u64>,
}

impl Default for MetaRegister {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaRegister {
    pub fn new() -> Self {
        MetaRegister {
            inner: RwLock::new(Inner::default()),
            size_counter: Encounter::new(),
        }
    }

    /// Inserts `fs` into its meta_key bucket and returns a snapshot of that
    /// bucket *after* the insert, so the caller can decide whether the
    /// distinct-inode count just crossed 1 -> 2 (first emit) or sits at
    /// >= 3 (emit newcomer only).
    pub fn check_in(&self, fs: FileStat) -> HashMap<Inode, Vec<FileStat>> {
        self.size_counter.check_in(fs.size);
        let mut guard = self.inner.write().unwrap();
        let bucket = guard.buckets.entry(fs.meta_key.clone()).or_default();
        bucket.entry(fs.inode).or_default().push(fs);
        bucket.clone()
    }

    /// All FileStats sharing `meta_key` and `inode`, used by ContentFilter's
    /// final join to restore every hardlink path for a duplicate group.
    pub fn links_for(&self, meta_key: &str, inode: Inode) -> Vec<FileStat> {
        self.inner
            .read()
            .unwrap()
            .buckets
            .get(meta_key)
            .and_then(|bucket| bucket.get(&inode))
            .cloned()
            .unwrap_or_default()
    }

    pub fn groups_count(&self) -> usize {
        self.inner.read().unwrap().buckets.len()
    }

    pub fn size_counter(&self) -> &Encounter<u64> {
        &self.size_counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::filestat::FileStatData;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::UNIX_EPOCH;

    fn fs(meta_key: &str, inode: u64) -> FileStat {
        Arc::new(FileStatData {
            path: PathBuf::from(format!("/tmp/{inode}")),
            base_name: inode.to_string(),
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
            nlink: 1,
            symlink: None,
            meta_key: meta_key.to_string(),
            priority_tag: "00".into(),
            sort_key: String::new(),
        })
    }

    #[test]
    fn bucket_groups_by_meta_key_and_inode() {
        let reg = MetaRegister::new();
        let after_first = reg.check_in(fs("k", 1));
        assert_eq!(after_first.len(), 1);
        let after_second = reg.check_in(fs("k", 2));
        assert_eq!(after_second.len(), 2);
        let links = reg.links_for("k", 1);
        assert_eq!(links.len(), 1);
    }
}
