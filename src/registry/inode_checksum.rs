//! Per-stage single-flight coordination: at most one hash computation per
//! (inode, stage). Grounded on
//! `original_source/registrator/inode_checksums.go`'s `CheckIn`/`Update`/
//! `Delete` trio, reshaped into the `acquire_or_wait` capability spec.md's
//! DESIGN NOTES calls for.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::model::Inode;
use crate::registry::latch::Latch;

/// Outcome of `check_in`: exactly one caller per inode becomes the
/// computer; everyone else waits or reuses.
pub enum CheckIn {
    /// This inode has no recorded outcome yet; caller must compute the hash
    /// and report back via `update`/`poison`.
    Computer,
    /// Someone else is computing; wait on the latch, then `check_in` again.
    Waiter(Arc<Latch>),
    Hit { digest: String, bytes_read: u64 },
    Poisoned,
}

struct Inner {
    computed: HashMap<Inode, (String, u64)>,
    pending: HashMap<Inode, Arc<Latch>>,
    poisoned: HashSet<Inode>,
    total_bytes: u64,
}

pub struct InodeChecksumTable {
    inner: Mutex<Inner>,
}

impl Default for InodeChecksumTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeChecksumTable {
    pub fn new() -> Self {
        InodeChecksumTable {
            inner: Mutex::new(Inner {
                computed: HashMap::new(),
                pending: HashMap::new(),
                poisoned: HashSet::new(),
                total_bytes: 0,
            }),
        }
    }

    pub fn check_in(&self, inode: Inode) -> CheckIn {
        let mut guard = self.inner.lock().unwrap();
        if guard.poisoned.contains(&inode) {
            return CheckIn::Poisoned;
        }
        if let Some((digest, bytes_read)) = guard.computed.get(&inode) {
            return CheckIn::Hit {
                digest: digest.clone(),
                bytes_read: *bytes_read,
            };
        }
        if let Some(latch) = guard.pending.get(&inode) {
            return CheckIn::Waiter(latch.clone());
        }
        guard.pending.insert(inode, Latch::new());
        CheckIn::Computer
    }

    /// Called by the computer on success: records the digest, releases
    /// every waiter, and folds `bytes_read` into the stage's running total.
    pub fn update(&self, inode: Inode, digest: String, bytes_read: u64) {
        let latch = {
            let mut guard = self.inner.lock().unwrap();
            guard.computed.insert(inode, (digest, bytes_read));
            guard.total_bytes += bytes_read;
            guard.pending.remove(&inode)
        };
        if let Some(latch) = latch {
            latch.signal();
        }
    }

    /// Called by the computer on failure: the inode is permanently
    /// unavailable at this stage; every waiter wakes to observe `Poisoned`.
    pub fn poison(&self, inode: Inode) {
        let latch = {
            let mut guard = self.inner.lock().unwrap();
            guard.poisoned.insert(inode);
            guard.pending.remove(&inode)
        };
        if let Some(latch) = latch {
            latch.signal();
        }
    }

    /// `(distinct inodes computed, total bytes read)` for this stage.
    pub fn stats(&self) -> (usize, u64) {
        let guard = self.inner.lock().unwrap();
        (guard.computed.len(), guard.total_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn second_check_in_waits_then_reuses() {
        let table = Arc::new(InodeChecksumTable::new());
        assert!(matches!(table.check_in(1), CheckIn::Computer));

        let t2 = table.clone();
        let handle = thread::spawn(move || {
            let cancel = CancellationToken::new();
            match t2.check_in(1) {
                CheckIn::Waiter(latch) => {
                    latch.wait(&cancel);
                    t2.check_in(1)
                }
                other => other,
            }
        });

        thread::sleep(Duration::from_millis(20));
        table.update(1, "digest".to_string(), 42);

        match handle.join().unwrap() {
            CheckIn::Hit { digest, bytes_read } => {
                assert_eq!(digest, "digest");
                assert_eq!(bytes_read, 42);
            }
            _ => panic!("expected a hit after the computer finished"),
        }
    }

    #[test]
    fn poison_propagates_to_waiters() {
        let table = InodeChecksumTable::new();
        assert!(matches!(table.check_in(7), CheckIn::Computer));
        table.poison(7);
        assert!(matches!(table.check_in(7), CheckIn::Poisoned));
    }
}
