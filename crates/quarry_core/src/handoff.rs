use std::mem;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// A bounded vector shared between two threads. Producers push single items,
/// consumers take the whole contents by swapping with their own vector so the
/// lock is only held for a pointer exchange.
pub struct HandoffBuffer<T> {
    name: &'static str,
    capacity: usize,
    slot: Mutex<Vec<T>>,
}

impl<T> HandoffBuffer<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity,
            slot: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Appends one item, handing it back when the buffer is already full.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        let mut slot = self.lock();
        if slot.len() >= self.capacity {
            return Err(item);
        }
        slot.push(item);
        Ok(())
    }

    /// Exchanges the shared contents with `local`. `local` should be empty on
    /// entry; whatever it held becomes the new shared contents.
    pub fn swap(&self, local: &mut Vec<T>) {
        let mut slot = self.lock();
        mem::swap(&mut *slot, local);
    }

    /// Moves items from the front of `local` into the shared buffer, behind
    /// the ones the consumer has not collected yet, until the buffer is full.
    /// Whatever does not fit stays in `local` in order. Returns how many items
    /// moved.
    pub fn publish(&self, local: &mut Vec<T>) -> usize {
        let mut slot = self.lock();
        let count = self.capacity.saturating_sub(slot.len()).min(local.len());
        if slot.is_empty() && count == local.len() {
            mem::swap(&mut *slot, local);
        } else {
            slot.extend(local.drain(..count));
        }
        count
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        // Poisoning cannot leave the vector half-written.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Wakes a sleeping worker when new work is queued.
#[derive(Default)]
pub struct WakeSignal {
    pending: Mutex<bool>,
    cvar: Condvar,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *pending = true;
        self.cvar.notify_one();
    }

    /// Blocks until notified or until `timeout` elapses. Returns whether a
    /// notification was consumed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let (mut pending, _) = self
            .cvar
            .wait_timeout_while(pending, timeout, |pending| !*pending)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let woke = *pending;
        *pending = false;
        woke
    }
}
