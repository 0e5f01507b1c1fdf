use crate::futex::Mutex;
use crate::WaiterPtr;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

/// Verdict published to a waiter: the slot was handed to it.
const GRANTED: u32 = 1;
/// Verdict published to a waiter: the slot was removed while it waited.
const REMOVED: u32 = 2;

/// Mutable state of a [`Slot`], guarded by the slot's own mutex.
struct SlotState<V> {
    /// The stored value, boxed so its address stays stable while loaned out.
    /// Taken on removal.
    value: Box<Option<V>>,
    /// Generation counter, bumped on every free-to-held transition. 64 bits
    /// make wraparound a non-concern.
    token: u64,
    /// True exactly while a valid loan is outstanding.
    held: bool,
    /// Permanent tombstone; once set the slot is inert.
    removed: bool,
    /// FIFO queue of acquirers. Invariant: the front entry is the current
    /// holder; everyone behind it is parked.
    queue: VecDeque<WaiterPtr>,
}

/// Per-key container holding one value and its exclusivity state.
///
/// A slot serializes access to its value: callers [`acquire`](Slot::acquire)
/// it one at a time, in arrival order, and [`release`](Slot::release) it with
/// the token they were granted. [`tombstone`](Slot::tombstone) retires the
/// slot for good and fails out every queued waiter.
///
/// All transitions run under the slot's own lock, so a release hand-off and a
/// tombstone can never interleave.
pub struct Slot<V> {
    state: Mutex<SlotState<V>>,
}

impl<V> Slot<V> {
    pub fn new(value: V) -> Self {
        Self {
            state: Mutex::new(SlotState {
                value: Box::new(Some(value)),
                token: 0,
                held: false,
                removed: false,
                queue: VecDeque::new(),
            }),
        }
    }

    /// Waits for exclusive ownership of the slot.
    ///
    /// Joins the queue and parks until at the front; the sole blocking point
    /// of the crate. On success returns the freshly bumped token together
    /// with a pointer to the value cell, valid until the matching
    /// [`release`](Slot::release). Returns `None` if the slot is removed, or
    /// becomes removed while waiting.
    pub fn acquire(&self) -> Option<(u64, *mut Option<V>)> {
        let waiter = AtomicU32::new(0);
        {
            let mut state = self.state.lock();
            if state.removed {
                return None;
            }
            if state.queue.is_empty() {
                // Front of an empty queue: ownership is immediate.
                waiter.store(GRANTED, Ordering::Release);
            }
            state.queue.push_back(WaiterPtr::new(&waiter));
        }

        if WaiterPtr::wait(&waiter) == REMOVED {
            // The tombstoning caller already unlinked us from the queue.
            return None;
        }

        let mut state = self.state.lock();
        // A tombstone requires ownership, and ownership was just handed to
        // us, so the slot cannot have been removed in between.
        debug_assert!(!state.removed);
        debug_assert!(!state.held);
        state.held = true;
        state.token += 1;
        Some((state.token, state.value.as_mut() as *mut _))
    }

    /// Returns ownership of the slot and hands it to the next waiter.
    ///
    /// Fails without touching any state when the slot is removed, not held,
    /// or `token` is not the current generation.
    pub fn release(&self, token: u64) -> bool {
        let mut state = self.state.lock();
        if state.removed || !state.held || state.token != token {
            return false;
        }
        state.held = false;
        // Unlink ourselves; whoever is next in line becomes the holder.
        state.queue.pop_front();
        if let Some(next) = state.queue.front() {
            next.wake(GRANTED);
        }
        true
    }

    /// Retires the slot permanently, failing out every queued waiter.
    ///
    /// The caller must currently own the slot (via [`acquire`](Slot::acquire)),
    /// which is what keeps a removal from racing an outstanding loan. Returns
    /// the stored value.
    pub fn tombstone(&self) -> Option<V> {
        let mut state = self.state.lock();
        debug_assert!(state.held && !state.removed);
        state.removed = true;
        let value = state.value.take();
        // Drop our own front entry, then wake everyone still queued; each
        // observes the tombstone instead of a grant.
        state.queue.pop_front();
        while let Some(waiter) = state.queue.pop_front() {
            waiter.wake(REMOVED);
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_slot_tokens() {
        let slot = Slot::new(7u32);

        let (t1, ptr) = slot.acquire().unwrap();
        assert_eq!(t1, 1);
        unsafe {
            assert_eq!(*ptr, Some(7));
            *ptr = Some(8);
        }

        assert!(!slot.release(t1 + 1)); // stale token
        assert!(slot.release(t1));
        assert!(!slot.release(t1)); // not held anymore

        let (t2, ptr) = slot.acquire().unwrap();
        assert_eq!(t2, 2);
        unsafe {
            assert_eq!(*ptr, Some(8));
        }
        assert!(slot.release(t2));
    }

    #[test]
    fn test_slot_tombstone() {
        let slot = Slot::new(1u32);
        let (token, _) = slot.acquire().unwrap();
        assert_eq!(slot.tombstone(), Some(1));

        // inert from now on
        assert!(slot.acquire().is_none());
        assert!(!slot.release(token));
    }

    #[test]
    fn test_slot_handoff_order() {
        let slot = Arc::new(Slot::new(Vec::<u32>::new()));
        let (token, _) = slot.acquire().unwrap();

        let waiters = (0..4u32)
            .map(|i| {
                let slot = slot.clone();
                let handle = std::thread::spawn(move || {
                    let (token, ptr) = slot.acquire().unwrap();
                    unsafe { (*ptr).as_mut().unwrap().push(i) };
                    assert!(slot.release(token));
                });
                // serialize arrival so the queue order is deterministic
                std::thread::sleep(Duration::from_millis(100));
                handle
            })
            .collect::<Vec<_>>();

        assert!(slot.release(token));
        waiters.into_iter().for_each(|t| t.join().unwrap());

        let (token, ptr) = slot.acquire().unwrap();
        unsafe {
            assert_eq!(*ptr, Some(vec![0, 1, 2, 3]));
        }
        assert!(slot.release(token));
    }

    #[test]
    fn test_slot_tombstone_wakes_waiters() {
        let slot = Arc::new(Slot::new(0u32));
        let (_, _) = slot.acquire().unwrap();

        let waiters = (0..4)
            .map(|_| {
                let slot = slot.clone();
                std::thread::spawn(move || slot.acquire().is_none())
            })
            .collect::<Vec<_>>();
        std::thread::sleep(Duration::from_millis(200));

        assert_eq!(slot.tombstone(), Some(0));
        for waiter in waiters {
            assert!(waiter.join().unwrap());
        }
    }
}
