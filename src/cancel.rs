//! Shared cancellation signal checked at every queue send/receive and
//! wait-handle await. Grounded on the teacher's
//! `engine::tools::{setup_ctrlc_handler, check_for_cancel}` — same
//! `Arc<AtomicBool>` mechanism, generalized into its own type so every
//! pipeline stage can share one token.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};

/// How often a blocked send/receive re-checks the token. Short enough that
/// Ctrl-C feels instant, long enough not to spin.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Installs a Ctrl-C handler that cancels this token, the same wiring
    /// as the teacher's `setup_ctrlc_handler`.
    pub fn install_ctrlc(&self) -> anyhow::Result<()> {
        let token = self.clone();
        ctrlc::set_handler(move || token.cancel())?;
        Ok(())
    }
}

/// Send with interleaved cancellation checks. Returns `Err(value)` on
/// cancellation or disconnect so the caller can decide whether to drop or
/// salvage the value.
pub fn send_cancelable<T>(
    tx: &Sender<T>,
    mut value: T,
    cancel: &CancellationToken,
) -> Result<(), T> {
    loop {
        if cancel.is_cancelled() {
            return Err(value);
        }
        match tx.send_timeout(value, POLL_INTERVAL) {
            Ok(()) => return Ok(()),
            Err(SendTimeoutError::Timeout(v)) => value = v,
            Err(SendTimeoutError::Disconnected(v)) => return Err(v),
        }
    }
}

/// Receive with interleaved cancellation checks. Returns `None` on
/// cancellation or channel closure.
pub fn recv_cancelable<T>(rx: &Receiver<T>, cancel: &CancellationToken) -> Option<T> {
    loop {
        if cancel.is_cancelled() {
            return None;
        }
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(v) => return Some(v),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return None,
        }
    }
}
