// src/mpmc/core.rs

//! The shared state and state machine of the general channel.
//!
//! A single `parking_lot::Mutex` per channel guards the slot store, the
//! lifecycle, the waiter queues, and the handle counts. To support mixed
//! synchronous and asynchronous usage (a sync producer feeding an async
//! consumer, and every other combination), waiters are kept in separate
//! queues per paradigm, so the wake path always knows whether to
//! `thread::unpark` or `waker.wake`.
//!
//! Wake order is FIFO within each queue (push-back, pop-front); when one item
//! or one slot frees up, async waiters are woken before sync waiters of the
//! same side, since wakes on them are cheaper.
//!
//! Lifecycle: `Open` until completion is requested, then `Completing` while
//! buffered items drain, then `Terminal` once a reader observes the empty
//! buffer. The transition is one-way and the carried fault is decided by the
//! first `complete` call.

use crate::error::{CompleteError, Fault, ReadError, TryReadError, TryWriteError};
use crate::policy::FullPolicy;
use crate::telemetry;

use super::slot::{Enqueue, SlotStore};

use core::task::{Context, Poll};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::Waker;
use std::thread::Thread;

/// Where the channel is in its life.
#[derive(Debug, Clone)]
pub(crate) enum Lifecycle {
  /// Accepting writes.
  Open,
  /// Completion requested; no new writes, buffered items still drain.
  Completing(Option<Fault>),
  /// Fully drained. `None` is a clean end of stream, `Some` is a fault.
  Terminal(Option<Fault>),
}

impl Lifecycle {
  #[inline]
  pub(crate) fn is_open(&self) -> bool {
    matches!(self, Lifecycle::Open)
  }
}

/// A parked synchronous thread.
///
/// `done` doubles as the wake token and the abandonment marker: a waker sets
/// it before unparking, and a waiter that gives up (timeout) sets it so the
/// stale queue entry is skipped instead of consuming a wake.
#[derive(Debug)]
pub(crate) struct SyncWaiter {
  pub(crate) thread: Thread,
  pub(crate) done: Arc<AtomicBool>,
}

/// A parked asynchronous task.
///
/// `done` is the same claim token the sync waiter carries: the wake path
/// claims the entry before waking, and a dropped (cancelled) future claims it
/// from the other side, so a stale entry never soaks up a wake meant for a
/// live waiter.
#[derive(Debug)]
pub(crate) struct AsyncWaiter {
  pub(crate) waker: Waker,
  pub(crate) done: Arc<AtomicBool>,
}

#[derive(Debug)]
pub(crate) struct ChannelInternal<T> {
  pub(crate) slots: SlotStore<T>,
  pub(crate) lifecycle: Lifecycle,
  pub(crate) waiting_sync_writers: VecDeque<SyncWaiter>,
  pub(crate) waiting_async_writers: VecDeque<AsyncWaiter>,
  pub(crate) waiting_sync_readers: VecDeque<SyncWaiter>,
  pub(crate) waiting_async_readers: VecDeque<AsyncWaiter>,
  pub(crate) writer_count: usize,
  pub(crate) reader_count: usize,
}

/// The shared owner of the channel state, wrapped in an `Arc` by the handles.
#[derive(Debug)]
pub(crate) struct ChannelShared<T> {
  pub(crate) internal: Mutex<ChannelInternal<T>>,
  pub(crate) capacity: usize,
  pub(crate) policy: FullPolicy,
}

unsafe impl<T: Send> Send for ChannelShared<T> {}
unsafe impl<T: Send> Sync for ChannelShared<T> {}

/// Waiters collected under the lock, to be woken after it is released.
#[derive(Debug, Default)]
pub(crate) struct WakeSet {
  sync: Vec<SyncWaiter>,
  asynchronous: Vec<AsyncWaiter>,
}

impl WakeSet {
  pub(crate) fn wake_all(self) {
    for waiter in self.asynchronous {
      if !waiter.done.swap(true, Ordering::AcqRel) {
        waiter.waker.wake();
      }
    }
    for waiter in self.sync {
      // swap(true) also claims the entry against a concurrently abandoning
      // timed waiter.
      if !waiter.done.swap(true, Ordering::AcqRel) {
        waiter.thread.unpark();
      }
    }
  }
}

impl<T: Send> ChannelShared<T> {
  pub(crate) fn new(slots: SlotStore<T>) -> Self {
    let capacity = slots.capacity();
    let policy = slots.policy();
    ChannelShared {
      internal: Mutex::new(ChannelInternal {
        slots,
        lifecycle: Lifecycle::Open,
        waiting_sync_writers: VecDeque::new(),
        waiting_async_writers: VecDeque::new(),
        waiting_sync_readers: VecDeque::new(),
        waiting_async_readers: VecDeque::new(),
        writer_count: 1,
        reader_count: 1,
      }),
      capacity,
      policy,
    }
  }

  /// Wakes one parked reader: async first, then sync, FIFO within each queue.
  /// Entries abandoned by cancelled futures or timed-out threads are skipped
  /// so they cannot consume the wake.
  pub(crate) fn wake_one_reader(guard: &mut ChannelInternal<T>) {
    while let Some(waiter) = guard.waiting_async_readers.pop_front() {
      if waiter.done.swap(true, Ordering::AcqRel) {
        continue;
      }
      waiter.waker.wake();
      return;
    }
    while let Some(waiter) = guard.waiting_sync_readers.pop_front() {
      if waiter.done.swap(true, Ordering::AcqRel) {
        continue;
      }
      waiter.thread.unpark();
      return;
    }
  }

  /// Wakes one parked writer: async first, then sync, FIFO within each queue.
  pub(crate) fn wake_one_writer(guard: &mut ChannelInternal<T>) {
    while let Some(waiter) = guard.waiting_async_writers.pop_front() {
      if waiter.done.swap(true, Ordering::AcqRel) {
        continue;
      }
      waiter.waker.wake();
      return;
    }
    while let Some(waiter) = guard.waiting_sync_writers.pop_front() {
      if waiter.done.swap(true, Ordering::AcqRel) {
        continue;
      }
      waiter.thread.unpark();
      return;
    }
  }

  fn take_all_waiters(guard: &mut ChannelInternal<T>) -> WakeSet {
    let mut set = WakeSet::default();
    set.sync.extend(guard.waiting_sync_writers.drain(..));
    set.sync.extend(guard.waiting_sync_readers.drain(..));
    set
      .asynchronous
      .extend(guard.waiting_async_writers.drain(..));
    set
      .asynchronous
      .extend(guard.waiting_async_readers.drain(..));
    set
  }

  /// Non-suspending write. Never parks the caller.
  pub(crate) fn try_write_core(&self, item: T) -> Result<(), TryWriteError<T>> {
    let discarded;
    {
      let mut guard = self.internal.lock();

      if !guard.lifecycle.is_open() {
        return Err(TryWriteError::Closed(item));
      }
      if guard.reader_count == 0 {
        return Err(TryWriteError::Closed(item));
      }

      match guard.slots.enqueue(item) {
        Enqueue::Stored => {
          Self::wake_one_reader(&mut guard);
          return Ok(());
        }
        Enqueue::Full(item) => return Err(TryWriteError::Full(item)),
        Enqueue::Evicted(old) => {
          Self::wake_one_reader(&mut guard);
          discarded = old;
        }
        Enqueue::Rejected(item) => {
          discarded = item;
        }
      }
    }
    // Lossy policies resolve a full buffer by discarding an item. Drop it
    // outside the lock; its Drop impl is arbitrary user code.
    telemetry::increment_counter("mpmc::core", "items_dropped");
    drop(discarded);
    Ok(())
  }

  /// Non-suspending read. Drains buffered items before reporting a terminal
  /// outcome; once the buffer is empty and completion was requested, the
  /// lifecycle latches to `Terminal` and every subsequent read observes the
  /// same outcome.
  pub(crate) fn try_read_core(&self) -> Result<T, TryReadError> {
    let mut guard = self.internal.lock();

    if let Some(item) = guard.slots.dequeue() {
      Self::wake_one_writer(&mut guard);
      return Ok(item);
    }

    match guard.lifecycle {
      Lifecycle::Open => Err(TryReadError::Empty),
      Lifecycle::Completing(ref fault) | Lifecycle::Terminal(ref fault) => {
        let fault = fault.clone();
        guard.lifecycle = Lifecycle::Terminal(fault.clone());
        match fault {
          Some(cause) => Err(TryReadError::Faulted(cause)),
          None => Err(TryReadError::EndOfStream),
        }
      }
    }
  }

  /// Requests completion. First caller wins and decides the terminal fault;
  /// later calls are rejected and change nothing. Every parked writer and
  /// reader is woken so it can observe the new state.
  pub(crate) fn complete_core(&self, fault: Option<Fault>) -> Result<(), CompleteError> {
    let wake_set;
    {
      let mut guard = self.internal.lock();
      if !guard.lifecycle.is_open() {
        return Err(CompleteError);
      }
      guard.lifecycle = if guard.slots.is_empty() {
        Lifecycle::Terminal(fault)
      } else {
        Lifecycle::Completing(fault)
      };
      wake_set = Self::take_all_waiters(&mut guard);
    }
    telemetry::increment_counter("mpmc::core", "completions");
    wake_set.wake_all();
    Ok(())
  }

  /// Called when a writer handle goes away. Dropping the last writer without
  /// an explicit `complete` completes the channel cleanly, so readers never
  /// hang on a producer that simply went out of scope.
  pub(crate) fn release_writer(&self) {
    let wake_set;
    {
      let mut guard = self.internal.lock();
      guard.writer_count -= 1;
      if guard.writer_count > 0 || !guard.lifecycle.is_open() {
        return;
      }
      guard.lifecycle = if guard.slots.is_empty() {
        Lifecycle::Terminal(None)
      } else {
        Lifecycle::Completing(None)
      };
      wake_set = Self::take_all_waiters(&mut guard);
    }
    wake_set.wake_all();
  }

  /// Called when a reader handle goes away. Once the last reader is gone,
  /// writes can never be observed, so parked writers are woken to fail with
  /// `Closed`.
  pub(crate) fn release_reader(&self) {
    let wake_set;
    {
      let mut guard = self.internal.lock();
      guard.reader_count -= 1;
      if guard.reader_count > 0 {
        return;
      }
      let mut set = WakeSet::default();
      set.sync.extend(guard.waiting_sync_writers.drain(..));
      set
        .asynchronous
        .extend(guard.waiting_async_writers.drain(..));
      wake_set = set;
    }
    wake_set.wake_all();
  }

  /// Poll-based read used by `ReadFuture`, the `Stream` impl, and `read_all`.
  ///
  /// `entry` is the caller's handle on its queued waiter: it is retired and
  /// replaced on every park (so re-polls under `select!` never leave
  /// duplicates) and retired on every `Ready`. The caller must pass the same
  /// slot to [`Self::cancel_read_wait`] when the future is dropped.
  pub(crate) fn poll_read_internal(
    &self,
    cx: &mut Context<'_>,
    entry: &mut Option<Arc<AtomicBool>>,
  ) -> Poll<Result<T, ReadError>> {
    loop {
      // --- Phase 1: Try to receive without parking ---
      let outcome = match self.try_read_core() {
        Ok(item) => Some(Ok(item)),
        Err(TryReadError::EndOfStream) => Some(Err(ReadError::EndOfStream)),
        Err(TryReadError::Faulted(cause)) => Some(Err(ReadError::Faulted(cause))),
        Err(TryReadError::Empty) => None, /* Proceed to park */
      };
      if let Some(result) = outcome {
        retire_entry(entry);
        return Poll::Ready(result);
      }

      // --- Phase 2: Lock, re-check, and commit to parking ---
      {
        let mut guard = self.internal.lock();

        // An item may have arrived, or completion may have been requested,
        // between the try and taking the lock.
        if !guard.slots.is_empty() || !guard.lifecycle.is_open() {
          drop(guard);
          continue;
        }

        retire_entry(entry);
        let flag = Arc::new(AtomicBool::new(false));
        guard.waiting_async_readers.push_back(AsyncWaiter {
          waker: cx.waker().clone(),
          done: flag.clone(),
        });
        *entry = Some(flag);
        return Poll::Pending;
      }
    }
  }

  /// Retires a queued read waiter whose future was dropped. If the wake path
  /// claimed the entry first, the wake was spent on a future that no longer
  /// exists; pass it on so the next parked reader is not starved.
  pub(crate) fn cancel_read_wait(&self, entry: Option<Arc<AtomicBool>>) {
    if let Some(flag) = entry {
      if flag.swap(true, Ordering::AcqRel) {
        let mut guard = self.internal.lock();
        Self::wake_one_reader(&mut guard);
      }
    }
  }

  /// Writer-side counterpart of [`Self::cancel_read_wait`].
  pub(crate) fn cancel_write_wait(&self, entry: Option<Arc<AtomicBool>>) {
    if let Some(flag) = entry {
      if flag.swap(true, Ordering::AcqRel) {
        let mut guard = self.internal.lock();
        Self::wake_one_writer(&mut guard);
      }
    }
  }
}

/// Marks the caller's queued waiter entry, if any, as no longer waiting.
#[inline]
pub(crate) fn retire_entry(entry: &mut Option<Arc<AtomicBool>>) {
  if let Some(flag) = entry.take() {
    flag.store(true, Ordering::Release);
  }
}
