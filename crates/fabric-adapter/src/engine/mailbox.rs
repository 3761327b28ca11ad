//! Single-slot coalescing mailbox.
//!
//! Holds at most one pending item. Posting while an item is pending replaces
//! it, so a slow consumer only ever sees the newest state. The consumer marks
//! the item it received as running until it calls [`Mailbox::complete`];
//! pending and running are tracked under one lock so [`Mailbox::is_busy`]
//! never misses a hand-off.

use parking_lot::Mutex;
use tokio::sync::Notify;

#[derive(Debug)]
struct Slot<T> {
    pending: Option<T>,
    running: bool,
    closed: bool,
}

/// Depth-1, replace-on-post mailbox with a single consumer.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Slot<T>>,
    notify: Notify,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(Slot {
                pending: None,
                running: false,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }
}

impl<T> Mailbox<T> {
    /// Creates an empty mailbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `item`, returning the pending item it replaced.
    pub fn post(&self, item: T) -> Option<T> {
        let replaced = self.slot.lock().pending.replace(item);
        self.notify.notify_one();
        replaced
    }

    /// Removes the pending item without marking anything running.
    pub fn take(&self) -> Option<T> {
        self.slot.lock().pending.take()
    }

    /// Waits for the next item and marks it running.
    ///
    /// Returns `None` once the mailbox is closed and empty.
    pub async fn recv(&self) -> Option<T> {
        loop {
            {
                let mut slot = self.slot.lock();
                if let Some(item) = slot.pending.take() {
                    slot.running = true;
                    return Some(item);
                }
                if slot.closed {
                    return None;
                }
            }
            // notify_one stores a permit, so a post between unlock and here
            // is not lost.
            self.notify.notified().await;
        }
    }

    /// Marks the running item finished.
    pub fn complete(&self) {
        self.slot.lock().running = false;
    }

    /// Returns true if an item is waiting.
    pub fn has_pending(&self) -> bool {
        self.slot.lock().pending.is_some()
    }

    /// Returns true if the consumer holds an item.
    pub fn is_running(&self) -> bool {
        self.slot.lock().running
    }

    /// Returns true if an item is waiting or running.
    pub fn is_busy(&self) -> bool {
        let slot = self.slot.lock();
        slot.pending.is_some() || slot.running
    }

    /// Stops the consumer once the pending item, if any, is drained.
    pub fn close(&self) {
        self.slot.lock().closed = true;
        self.notify.notify_one();
    }

    /// Returns true after [`Mailbox::close`].
    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }
}
