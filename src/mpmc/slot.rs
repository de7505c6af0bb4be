// src/mpmc/slot.rs

//! The slot store: the buffer underneath a channel.
//!
//! Bounded channels use a fixed-capacity ring (a `VecDeque` that is never
//! grown past `capacity`); unbounded channels let the deque grow freely.
//! The store answers full/empty queries in O(1) and resolves at-capacity
//! writes according to the channel's `FullPolicy`. It carries no
//! synchronization of its own: the channel core guards it with its mutex.

use crate::policy::FullPolicy;

use std::collections::VecDeque;

/// Sentinel capacity for unbounded mode.
pub(crate) const UNBOUNDED: usize = usize::MAX;

/// Outcome of a single enqueue attempt, reported back to the channel core.
#[derive(Debug)]
pub(crate) enum Enqueue<T> {
  /// The item entered the buffer.
  Stored,
  /// The buffer is at capacity and the policy does not evict. The item is
  /// handed back.
  Full(T),
  /// `DropOldest`: the head of the buffer was evicted to make room; the new
  /// item entered the buffer. The evicted item is handed back for disposal.
  Evicted(T),
  /// `DropNewest`: the buffer is untouched and the incoming item is handed
  /// back for disposal.
  Rejected(T),
}

#[derive(Debug)]
pub(crate) struct SlotStore<T> {
  queue: VecDeque<T>,
  capacity: usize,
  policy: FullPolicy,
}

impl<T> SlotStore<T> {
  pub(crate) fn bounded(capacity: usize, policy: FullPolicy) -> Self {
    assert!(capacity >= 1, "bounded channel capacity must be at least 1");
    assert!(capacity < UNBOUNDED, "bounded channel capacity is out of range");
    SlotStore {
      queue: VecDeque::with_capacity(capacity),
      capacity,
      policy,
    }
  }

  pub(crate) fn unbounded() -> Self {
    SlotStore {
      queue: VecDeque::with_capacity(32),
      capacity: UNBOUNDED,
      policy: FullPolicy::Wait,
    }
  }

  #[inline]
  pub(crate) fn capacity(&self) -> usize {
    self.capacity
  }

  #[inline]
  pub(crate) fn policy(&self) -> FullPolicy {
    self.policy
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.queue.len()
  }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.queue.is_empty()
  }

  #[inline]
  pub(crate) fn is_full(&self) -> bool {
    self.capacity != UNBOUNDED && self.queue.len() >= self.capacity
  }

  pub(crate) fn enqueue(&mut self, item: T) -> Enqueue<T> {
    if !self.is_full() {
      self.queue.push_back(item);
      return Enqueue::Stored;
    }
    match self.policy {
      FullPolicy::Wait | FullPolicy::Fail => Enqueue::Full(item),
      FullPolicy::DropNewest => Enqueue::Rejected(item),
      FullPolicy::DropOldest => match self.queue.pop_front() {
        Some(evicted) => {
          self.queue.push_back(item);
          Enqueue::Evicted(evicted)
        }
        None => {
          self.queue.push_back(item);
          Enqueue::Stored
        }
      },
    }
  }

  #[inline]
  pub(crate) fn dequeue(&mut self) -> Option<T> {
    self.queue.pop_front()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bounded_respects_capacity() {
    let mut store = SlotStore::bounded(2, FullPolicy::Wait);
    assert!(matches!(store.enqueue(1), Enqueue::Stored));
    assert!(matches!(store.enqueue(2), Enqueue::Stored));
    assert!(store.is_full());
    assert!(matches!(store.enqueue(3), Enqueue::Full(3)));
    assert_eq!(store.len(), 2);
  }

  #[test]
  fn drop_oldest_evicts_head() {
    let mut store = SlotStore::bounded(1, FullPolicy::DropOldest);
    assert!(matches!(store.enqueue(1), Enqueue::Stored));
    assert!(matches!(store.enqueue(2), Enqueue::Evicted(1)));
    assert_eq!(store.dequeue(), Some(2));
    assert_eq!(store.dequeue(), None);
  }

  #[test]
  fn drop_newest_rejects_incoming() {
    let mut store = SlotStore::bounded(1, FullPolicy::DropNewest);
    assert!(matches!(store.enqueue(1), Enqueue::Stored));
    assert!(matches!(store.enqueue(2), Enqueue::Rejected(2)));
    assert_eq!(store.dequeue(), Some(1));
  }

  #[test]
  fn unbounded_always_stores() {
    let mut store = SlotStore::unbounded();
    for i in 0..1000 {
      assert!(matches!(store.enqueue(i), Enqueue::Stored));
    }
    assert!(!store.is_full());
    assert_eq!(store.len(), 1000);
    for i in 0..1000 {
      assert_eq!(store.dequeue(), Some(i));
    }
  }

  #[test]
  fn fifo_order_preserved() {
    let mut store = SlotStore::bounded(4, FullPolicy::Wait);
    for i in 0..4 {
      store.enqueue(i);
    }
    for i in 0..4 {
      assert_eq!(store.dequeue(), Some(i));
    }
  }
}
