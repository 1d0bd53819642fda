//! One-shot broadcast wait-handle used to implement single-flight hashing.
//! The Rust analogue of the Go original's `close(pending chan struct{})`
//! idiom: whichever worker becomes the computer for an inode hands every
//! waiter a `Latch`; `signal` is idempotent and wakes every waiter exactly
//! once.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::cancel::CancellationToken;

pub struct Latch {
    signalled: Mutex<bool>,
    cv: Condvar,
}

impl Latch {
    pub fn new() -> Arc<Latch> {
        Arc::new(Latch {
            signalled: Mutex::new(false),
            cv: Condvar::new(),
        })
    }

    pub fn signal(&self) {
        let mut guard = self.signalled.lock().unwrap();
        *guard = true;
        self.cv.notify_all();
    }

    /// Blocks until signalled, polling the cancellation token so a waiter
    /// never outlives a pipeline shutdown.
    pub fn wait(&self, cancel: &CancellationToken) {
        let mut guard = self.signalled.lock().unwrap();
        while !*guard {
            if cancel.is_cancelled() {
                return;
            }
            let (g, _timeout) = self
                .cv
                .wait_timeout(guard, Duration::from_millis(50))
                .unwrap();
            guard = g;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration as StdDuration;

    #[test]
    fn waiters_wake_after_signal() {
        let latch = Latch::new();
        let cancel = CancellationToken::new();
        let l2 = latch.clone();
        let handle = thread::spawn(move || {
            thread::sleep(StdDuration::from_millis(20));
            l2.signal();
        });
        latch.wait(&cancel);
        handle.join().unwrap();
    }

    #[test]
    fn wait_returns_on_cancellation() {
        let latch = Latch::new();
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();
        thread::spawn(move || {
            thread::sleep(StdDuration::from_millis(20));
            cancel2.cancel();
        });
        latch.wait(&cancel);
    }
}
