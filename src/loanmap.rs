use crate::{ShardsMap, Slot};
use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::{Arc, OnceLock};

/// Capability every storable value must provide: a pure, stable key.
///
/// The same logical instance must always report the same key; behaviour is
/// unspecified otherwise. The map never touches the value beyond this.
pub trait Keyed {
    type Key: Eq + Hash + Clone;

    /// Returns the key of the value.
    fn key(&self) -> Self::Key;
}

/// Returns the default number of shards to use for the `LoanMap`.
fn default_shard_amount() -> usize {
    static DEFAULT_SHARD_AMOUNT: OnceLock<usize> = OnceLock::new();
    *DEFAULT_SHARD_AMOUNT.get_or_init(|| {
        (std::thread::available_parallelism().map_or(1, usize::from) * 4).next_power_of_two()
    })
}

/// A thread-safe map that loans out exclusive per-key access to its values.
///
/// Entries are added with [`add`](LoanMap::add) and read or mutated through
/// [`lock`](LoanMap::lock)/[`unlock`](LoanMap::unlock) cycles; while a
/// [`Loan`] is outstanding no other caller can reach the value.
/// [`delete`](LoanMap::delete) waits for the current holder, then retires the
/// key and wakes every remaining waiter empty-handed.
///
/// Key lookups are sharded, and no shard lock is held while waiting for an
/// entry, so a blocked `lock` never delays operations on other keys.
pub struct LoanMap<V: Keyed> {
    map: ShardsMap<V::Key, Arc<Slot<V>>>,
}

impl<V: Keyed> Default for LoanMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Keyed> LoanMap<V> {
    /// Creates a new `LoanMap` with the default number of shards.
    pub fn new() -> Self {
        Self {
            map: ShardsMap::with_capacity_and_shard_amount(0, default_shard_amount()),
        }
    }

    /// Creates a new `LoanMap` with the specified initial capacity and the
    /// default number of shards.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: ShardsMap::with_capacity_and_shard_amount(capacity, default_shard_amount()),
        }
    }

    /// Creates a new `LoanMap` with the specified initial capacity and number
    /// of shards.
    pub fn with_capacity_and_shard_amount(capacity: usize, shard_amount: usize) -> Self {
        Self {
            map: ShardsMap::with_capacity_and_shard_amount(capacity, shard_amount),
        }
    }

    /// Adds a value under its own key. Never blocks.
    ///
    /// Returns `true` if the value was inserted, `false` if the key is
    /// already live (the stored value is left untouched and the offered one
    /// is dropped).
    ///
    /// # Examples
    /// ```
    /// # use loanmap::{Keyed, LoanMap};
    /// # struct Item(u32);
    /// # impl Keyed for Item {
    /// #     type Key = u32;
    /// #     fn key(&self) -> u32 { self.0 }
    /// # }
    /// let map = LoanMap::new();
    /// assert!(map.add(Item(1)));
    /// assert!(!map.add(Item(1)));
    /// ```
    pub fn add(&self, value: V) -> bool {
        let key = value.key();
        self.map.insert_with(key, || Arc::new(Slot::new(value)))
    }

    /// Takes an exclusive loan on the value stored at `key`.
    ///
    /// If the key is absent this returns `None` immediately. Otherwise the
    /// call blocks until every earlier acquirer of the same key has released
    /// it; waiters are served in arrival order. If the key is deleted while
    /// waiting, every queued waiter gets `None` instead of hanging.
    ///
    /// The returned [`Loan`] grants exclusive access to the value until it is
    /// passed to [`unlock`](LoanMap::unlock) (or dropped).
    ///
    /// **Locking behaviour:** Deadlock if called while already holding a loan
    /// on the same key.
    ///
    /// # Examples
    /// ```
    /// # use loanmap::{Keyed, LoanMap};
    /// # struct Item(u32, u32);
    /// # impl Keyed for Item {
    /// #     type Key = u32;
    /// #     fn key(&self) -> u32 { self.0 }
    /// # }
    /// let map = LoanMap::new();
    /// map.add(Item(1, 10));
    ///
    /// let mut loan = map.lock(&1).unwrap();
    /// loan.value_mut().unwrap().1 += 1;
    /// assert!(map.unlock(&mut loan));
    ///
    /// assert!(map.lock(&2).is_none());
    /// ```
    pub fn lock<Q>(&self, key: &Q) -> Option<Loan<V>>
    where
        V::Key: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let slot = self.map.get_cloned(key)?;
        let (token, value) = slot.acquire()?;
        Some(Loan { slot, token, value })
    }

    /// Returns a loan taken with [`lock`](LoanMap::lock). Never blocks.
    ///
    /// Succeeds only if the loan is still live and its token matches the
    /// entry's current generation; a released, stale or otherwise invalid
    /// loan yields `false` and mutates nothing. Either way the loan's value
    /// reference is cleared, so a loan can never be used after release.
    pub fn unlock(&self, loan: &mut Loan<V>) -> bool {
        loan.release()
    }

    /// Deletes the entry at `key`, waiting for the current holder first.
    ///
    /// The value is removed only once it is not loaned out, so a holder can
    /// never have its value ripped out from under it. Callers still queued on
    /// the key observe `None` from their `lock`. Returns `false` if the key
    /// was absent, or was deleted by somebody else while this call waited.
    ///
    /// **Locking behaviour:** Deadlock if called while already holding a loan
    /// on the same key.
    pub fn delete<Q>(&self, key: &Q) -> bool
    where
        V::Key: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let slot = match self.map.get_cloned(key) {
            Some(slot) => slot,
            None => return false,
        };
        // Own the slot before removing it; a racing delete loses here.
        if slot.acquire().is_none() {
            return false;
        }
        // Nobody else can pass acquire until the tombstone, so the entry at
        // `key` is still `slot`.
        let removed = self.map.remove(key);
        debug_assert!(removed.is_some_and(|s| Arc::ptr_eq(&s, &slot)));
        let _value = slot.tombstone();
        true
    }

    /// Returns the number of live keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// An exclusive loan of one value in a [`LoanMap`].
///
/// While the loan is live, [`value`](Loan::value)/[`value_mut`](Loan::value_mut)
/// give access to the stored value and no other caller can reach it. The loan
/// is single-use: after [`unlock`](LoanMap::unlock) both accessors return
/// `None` and a second unlock reports `false`. Dropping a live loan releases
/// it.
pub struct Loan<V> {
    slot: Arc<Slot<V>>,
    /// Generation this loan was granted at; proves ownership on release.
    token: u64,
    /// Pointer into the slot's value cell; nulled on release.
    value: *mut Option<V>,
}

// Safety: a live loan is the sole accessor of the pointed-to value (the slot
// hand-off protocol guarantees it), the cell's address is stable, and the
// `Arc` keeps the slot alive.
unsafe impl<V: Send> Send for Loan<V> {}
unsafe impl<V: Sync> Sync for Loan<V> {}

impl<V> Loan<V> {
    /// Returns the loaned value, or `None` if the loan has been released.
    pub fn value(&self) -> Option<&V> {
        if self.value.is_null() {
            return None;
        }
        unsafe { (*self.value).as_ref() }
    }

    /// Returns the loaned value mutably, or `None` if the loan has been
    /// released.
    pub fn value_mut(&mut self) -> Option<&mut V> {
        if self.value.is_null() {
            return None;
        }
        unsafe { (*self.value).as_mut() }
    }

    fn release(&mut self) -> bool {
        if self.value.is_null() {
            return false;
        }
        // Clear the reference whether or not the slot accepts the token.
        self.value = std::ptr::null_mut();
        self.slot.release(self.token)
    }
}

impl<V> Drop for Loan<V> {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
