use std::sync::atomic::{AtomicU32, Ordering};

/// A pointer type used for thread synchronization that provides waiting and
/// waking capabilities.
///
/// Each thread waiting for a slot parks on an `AtomicU32` on its own stack;
/// the slot's queue stores a `WaiterPtr` to it. Waking a waiter publishes a
/// verdict (granted or removed) and unparks it.
///
/// # Safety
/// The wrapped `AtomicU32` must outlive the `WaiterPtr`. This holds because
/// the waiting thread cannot leave its stack frame before a verdict is
/// published, and a verdict is published exactly once.
pub struct WaiterPtr(*const AtomicU32);

impl WaiterPtr {
    /// Creates a new `WaiterPtr` from a reference to an `AtomicU32`.
    pub fn new(w: &AtomicU32) -> Self {
        Self(w as *const _)
    }

    /// Publishes `verdict` (must be nonzero) and wakes the parked thread.
    pub fn wake(&self, verdict: u32) {
        let waiter = unsafe { &*self.0 };
        waiter.store(verdict, Ordering::Release);
        atomic_wait::wake_one(self.0);
    }

    /// Parks the current thread until a nonzero verdict is published to `w`,
    /// then returns it.
    pub fn wait(w: &AtomicU32) -> u32 {
        loop {
            let verdict = w.load(Ordering::Acquire);
            if verdict != 0 {
                return verdict;
            }
            atomic_wait::wait(w, 0);
        }
    }
}

// Safety: WaiterPtr only provides controlled access to an atomic value.
unsafe impl Sync for WaiterPtr {}
unsafe impl Send for WaiterPtr {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waiter_handoff() {
        let waiter = AtomicU32::new(0);
        let ptr = WaiterPtr::new(&waiter);
        std::thread::scope(|s| {
            s.spawn(|| {
                std::thread::sleep(std::time::Duration::from_millis(50));
                ptr.wake(2);
            });
            assert_eq!(WaiterPtr::wait(&waiter), 2);
        });
    }

    #[test]
    fn test_waiter_no_park_on_published_verdict() {
        let waiter = AtomicU32::new(1);
        assert_eq!(WaiterPtr::wait(&waiter), 1);
    }
}
