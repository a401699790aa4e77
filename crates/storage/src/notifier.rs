//! Block-arrival change notification.
//!
//! [`ChangeNotifier`] is a single shared flag. The ledger's block listener
//! raises it whenever a new block is committed; callers poll it with
//! [`take`](ChangeNotifier::take) to decide whether cached reads need a
//! refresh. Any number of raises between two polls coalesce into one
//! pending notification.
//!
//! The flag starts raised so the first poll after construction always
//! triggers an initial refresh.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::{sync::broadcast, task::JoinHandle};

use crate::backend::BlockEvent;

/// Shared "new blocks arrived" flag.
///
/// Cheaply cloneable; all clones share the same flag. Raising and taking
/// are serialized by a single lock, so a raise racing with a take is
/// either observed by that take or left pending for the next one.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    pending: Arc<Mutex<bool>>,
}

impl ChangeNotifier {
    /// Creates a notifier with a pending notification.
    #[must_use]
    pub fn new() -> Self {
        Self { pending: Arc::new(Mutex::new(true)) }
    }

    /// Marks that a new block has arrived.
    pub fn notify(&self) {
        *self.pending.lock() = true;
    }

    /// Returns whether a notification was pending and clears it.
    #[must_use]
    pub fn take(&self) -> bool {
        std::mem::replace(&mut *self.pending.lock(), false)
    }

    /// Spawns a task that raises this notifier for every block event.
    ///
    /// A lagged receiver still raises the flag: missed events coalesce into
    /// the single pending notification anyway. The task ends when the
    /// sender side closes; abort the returned handle to stop it earlier.
    pub fn listen(&self, mut events: broadcast::Receiver<BlockEvent>) -> JoinHandle<()> {
        let notifier = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        tracing::trace!(block_number = event.block_number, "block received");
                        notifier.notify();
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "block listener lagged");
                        notifier.notify();
                    },
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!("block event stream closed");
                        return;
                    },
                }
            }
        })
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
