//! MCKey → Inode → [FileStat] registry, one instance per hash stage (and a
//! final instance doubling as the ContentRegister). Grounded on
//! `original_source/registrator/{mcifs,mcifs_register}.go`.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use crate::model::{FileStat, Inode};
use crate::stats::Encounter;

/// (MetaKey, accumulated content checksum) pair identifying a content-level
/// duplicate group at a particular point in the hash cascade.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct McKey {
    pub meta_key: String,
    pub checksum: String,
}

impl fmt::Display for McKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.meta_key, self.checksum)
    }
}

#[derive(Default)]
struct Inner {
    buckets: HashMap<McKey, HashMap<Inode, Vec<FileStat>>>,
}

pub struct StageRegister {
    inner: RwLock<Inner>,
    keys_counter: Encounter<McKey>,
}

impl Default for StageRegister {
    fn default() -> Self {
        Self::new()
    }
}

impl StageRegister {
    pub fn new() -> Self {
        StageRegister {
            inner: RwLock::new(Inner::default()),
            keys_counter: Encounter::new(),
        }
    }

    /// Inserts `fs` under `(meta_key, checksum)` and returns a snapshot of
    /// the bucket after the insert.
    pub fn check_in(&self, fs: FileStat, checksum: &str) -> HashMap<Inode, Vec<FileStat>> {
        let key = McKey {
            meta_key: fs.meta_key.clone(),
            checksum: checksum.to_string(),
        };
        self.keys_counter.check_in(key.clone());
        let mut guard = self.inner.write().unwrap();
        let bucket = guard.buckets.entry(key).or_default();
        bucket.entry(fs.inode).or_default().push(fs);
        bucket.clone()
    }

    pub fn snapshot(&self) -> HashMap<McKey, HashMap<Inode, Vec<FileStat>>> {
        self.inner.read().unwrap().buckets.clone()
    }

    pub fn keys_counter(&self) -> &Encounter<McKey> {
        &self.keys_counter
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
    fn distinct_inodes_accumulate_under_same_mckey() {
        let reg = StageRegister::new();
        reg.check_in(fs("k", 1), "abc");
        let bucket = reg.check_in(fs("k", 2), "abc");
        assert_eq!(bucket.len(), 2);
        assert_eq!(reg.keys_counter().keys_count(), 1);
    }
}
