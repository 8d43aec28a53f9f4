use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Creates a single-slot handoff: the writer overwrites any unread value,
/// the reader always gets the most recent one.
pub fn latest_slot<T>() -> (SlotWriter<T>, SlotReader<T>) {
    let (tx, rx) = bounded(1);
    (
        SlotWriter {
            tx,
            evict: rx.clone(),
        },
        SlotReader { rx },
    )
}

pub struct SlotWriter<T> {
    tx: Sender<T>,
    evict: Receiver<T>,
}

impl<T> SlotWriter<T> {
    /// Stores `value`, discarding an unread predecessor. Returns `true` when
    /// a value was discarded.
    pub fn publish(&self, value: T) -> bool {
        let mut value = value;
        let mut replaced = false;
        loop {
            match self.tx.try_send(value) {
                Ok(()) => return replaced,
                Err(TrySendError::Full(v)) => {
                    // The reader may win the race; either way the slot frees up.
                    if self.evict.try_recv().is_ok() {
                        replaced = true;
                    }
                    value = v;
                }
                Err(TrySendError::Disconnected(_)) => return replaced,
            }
        }
    }
}

pub struct SlotReader<T> {
    rx: Receiver<T>,
}

impl<T> SlotReader<T> {
    /// Blocks until a value is available. `None` once the writer is gone and
    /// the slot is empty.
    pub fn take(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    pub fn try_take(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}
