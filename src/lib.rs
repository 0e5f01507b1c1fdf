//! A thread-safe map that loans out exclusive per-key access for safe
//! read-modify-write cycles.
//!
//! # Overview
//! `loanmap` goes one step further than a plain concurrent hashmap: besides
//! thread-safe insert and remove, it lets a caller take an exclusive [`Loan`]
//! on the value stored at a key, mutate it in place, and return it, with the
//! guarantee that no other caller observes or mutates the value in between.
//!
//! # Features
//! - Exclusive per-key access through single-use, token-validated loans
//! - FIFO hand-off between waiters on the same key
//! - Deleting a key wakes every pending waiter instead of leaving it blocked
//! - Sharded key lookup for concurrency across different keys
//! - All failure modes are ordinary `bool`/`Option` results, never panics
//!
//! # Examples
//! ```
//! use loanmap::{Keyed, LoanMap};
//!
//! struct Account {
//!     id: u32,
//!     balance: i64,
//! }
//!
//! impl Keyed for Account {
//!     type Key = u32;
//!     fn key(&self) -> u32 {
//!         self.id
//!     }
//! }
//!
//! let map = LoanMap::new();
//! assert!(map.add(Account { id: 7, balance: 100 }));
//!
//! // Exclusive read-modify-write cycle.
//! let mut loan = map.lock(&7).unwrap();
//! loan.value_mut().unwrap().balance -= 25;
//! assert!(map.unlock(&mut loan));
//!
//! let loan = map.lock(&7).unwrap();
//! assert_eq!(loan.value().unwrap().balance, 75);
//! drop(loan); // dropping a live loan also returns it
//!
//! assert!(map.delete(&7));
//! assert!(map.lock(&7).is_none());
//! ```
mod futex;
#[doc = include_str!("../README.md")]
mod loanmap;
mod shards_map;
mod slot;
mod waiter;

pub use loanmap::*;
use shards_map::*;
use slot::*;
use waiter::*;
