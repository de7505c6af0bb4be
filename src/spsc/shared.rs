// src/spsc/shared.rs

//! Internal shared state for the SPSC channel.
//!
//! A lock-free ring indexed by monotonically increasing head (producer) and
//! tail (consumer) counters, with one sync parking slot and one async waker
//! per side. Completion is published by the single producer: the fault slot
//! is written first, then the `completing` flag is released, so a consumer
//! that observes the flag also observes the fault and every item published
//! before it.

use crate::error::{CompleteError, Fault, ReadError, TryReadError, TryWriteError, WriteError};
use crate::internal::cache_padded::CachePadded;

use core::task::{Context, Poll};
use futures_util::task::AtomicWaker;
use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{fence, AtomicBool, AtomicUsize, Ordering};
use std::thread::Thread;

pub(crate) struct SpscShared<T> {
  pub(crate) buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
  pub(crate) capacity: usize,
  pub(crate) head: CachePadded<AtomicUsize>, // Write index (producer)
  pub(crate) tail: CachePadded<AtomicUsize>, // Read index (consumer)

  // --- Producer waiting state ---
  pub(crate) producer_parked: CachePadded<AtomicBool>,
  pub(crate) producer_thread: CachePadded<UnsafeCell<Option<Thread>>>,
  pub(crate) producer_waker: CachePadded<AtomicWaker>,

  // --- Consumer waiting state ---
  pub(crate) consumer_parked: CachePadded<AtomicBool>,
  pub(crate) consumer_thread: CachePadded<UnsafeCell<Option<Thread>>>,
  pub(crate) consumer_waker: CachePadded<AtomicWaker>,

  // --- Completion state machine ---
  // `complete_claimed` makes completion first-wins; `fault` is written before
  // `completing` is released and never mutated afterwards.
  pub(crate) complete_claimed: AtomicBool,
  pub(crate) completing: AtomicBool,
  pub(crate) fault: UnsafeCell<Option<Fault>>,

  /// Set when the consumer handle goes away; writes then fail with `Closed`.
  pub(crate) consumer_dropped: AtomicBool,
}

unsafe impl<T: Send> Send for SpscShared<T> {}
unsafe impl<T: Send> Sync for SpscShared<T> {}

impl<T> fmt::Debug for SpscShared<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SpscShared")
      .field("capacity", &self.capacity)
      .field("head", &self.head.load(Ordering::Relaxed))
      .field("tail", &self.tail.load(Ordering::Relaxed))
      .field("completing", &self.completing.load(Ordering::Relaxed))
      .field(
        "consumer_dropped",
        &self.consumer_dropped.load(Ordering::Relaxed),
      )
      .finish_non_exhaustive()
  }
}

impl<T> SpscShared<T> {
  pub(crate) fn new_internal(capacity: usize) -> Self {
    assert!(capacity >= 1, "spsc channel capacity must be at least 1");
    let mut buffer = Vec::with_capacity(capacity);
    for _ in 0..capacity {
      buffer.push(UnsafeCell::new(MaybeUninit::uninit()));
    }
    SpscShared {
      buffer: buffer.into_boxed_slice(),
      capacity,
      head: CachePadded::new(AtomicUsize::new(0)),
      tail: CachePadded::new(AtomicUsize::new(0)),
      producer_parked: CachePadded::new(AtomicBool::new(false)),
      producer_thread: CachePadded::new(UnsafeCell::new(None)),
      producer_waker: CachePadded::new(AtomicWaker::new()),
      consumer_parked: CachePadded::new(AtomicBool::new(false)),
      consumer_thread: CachePadded::new(UnsafeCell::new(None)),
      consumer_waker: CachePadded::new(AtomicWaker::new()),
      complete_claimed: AtomicBool::new(false),
      completing: AtomicBool::new(false),
      fault: UnsafeCell::new(None),
      consumer_dropped: AtomicBool::new(false),
    }
  }

  #[inline]
  pub(crate) fn current_len(&self, head: usize, tail: usize) -> usize {
    head.wrapping_sub(tail)
  }

  #[inline]
  pub(crate) fn is_full(&self, head: usize, tail: usize) -> bool {
    self.current_len(head, tail) == self.capacity
  }

  #[inline]
  pub(crate) fn is_empty(&self, head: usize, tail: usize) -> bool {
    head == tail
  }

  #[inline]
  pub(crate) fn wake_consumer(&self) {
    if self.consumer_parked.load(Ordering::Relaxed) {
      if self
        .consumer_parked
        .compare_exchange(true, false, Ordering::AcqRel, Ordering::Relaxed)
        .is_ok()
      {
        if let Some(thread_handle) = unsafe { (*self.consumer_thread.get()).take() } {
          thread_handle.unpark();
        }
      }
    }
    // The async waker is idempotent and manages its own state.
    self.consumer_waker.wake();
  }

  #[inline]
  pub(crate) fn wake_producer(&self) {
    if self.producer_parked.load(Ordering::Relaxed) {
      if self
        .producer_parked
        .compare_exchange(true, false, Ordering::AcqRel, Ordering::Relaxed)
        .is_ok()
      {
        if let Some(thread_handle) = unsafe { (*self.producer_thread.get()).take() } {
          thread_handle.unpark();
        }
      }
    }
    self.producer_waker.wake();
  }

  /// Undo a sync producer park commitment after waking or backing out.
  #[inline]
  pub(crate) fn cancel_producer_park(&self) {
    if self
      .producer_parked
      .compare_exchange(true, false, Ordering::AcqRel, Ordering::Relaxed)
      .is_ok()
    {
      unsafe {
        *self.producer_thread.get() = None;
      }
    }
  }

  /// Undo a sync consumer park commitment after waking or backing out.
  #[inline]
  pub(crate) fn cancel_consumer_park(&self) {
    if self
      .consumer_parked
      .compare_exchange(true, false, Ordering::AcqRel, Ordering::Relaxed)
      .is_ok()
    {
      unsafe {
        *self.consumer_thread.get() = None;
      }
    }
  }

  /// Requests completion. First caller wins; the fault slot is published
  /// before the flag so any observer of `completing` sees the final fault.
  pub(crate) fn complete_raw(&self, fault: Option<Fault>) -> Result<(), CompleteError> {
    if self.complete_claimed.swap(true, Ordering::AcqRel) {
      return Err(CompleteError);
    }
    unsafe {
      *self.fault.get() = fault;
    }
    self.completing.store(true, Ordering::Release);
    // Full barrier between the flag store and the parked-flag read in the
    // wake path, so a consumer committing to park cannot be missed.
    fence(Ordering::SeqCst);
    self.wake_consumer();
    Ok(())
  }

  /// Marks the consumer side gone and wakes a parked producer so it can fail
  /// with `Closed`.
  pub(crate) fn consumer_closed_raw(&self) {
    self.consumer_dropped.store(true, Ordering::Release);
    fence(Ordering::SeqCst);
    self.wake_producer();
  }

  pub(crate) fn try_write_raw(&self, item: T) -> Result<(), TryWriteError<T>> {
    if self.completing.load(Ordering::Acquire) || self.consumer_dropped.load(Ordering::Acquire) {
      return Err(TryWriteError::Closed(item));
    }

    let head = self.head.load(Ordering::Relaxed);
    let tail = self.tail.load(Ordering::Acquire);

    if self.is_full(head, tail) {
      return Err(TryWriteError::Full(item));
    }

    let slot_idx = head % self.capacity;
    unsafe {
      (*self.buffer[slot_idx].get()).write(item);
    }
    self.head.store(head.wrapping_add(1), Ordering::Release);

    self.wake_consumer();
    Ok(())
  }

  pub(crate) fn try_read_raw(&self) -> Result<T, TryReadError> {
    loop {
      let tail = self.tail.load(Ordering::Relaxed);
      let head = self.head.load(Ordering::Acquire);

      if !self.is_empty(head, tail) {
        let slot_idx = tail % self.capacity;
        let item = unsafe { (*self.buffer[slot_idx].get()).assume_init_read() };
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        self.wake_producer();
        return Ok(item);
      }

      if self.completing.load(Ordering::Acquire) {
        // Items published before completion drain first.
        let final_head = self.head.load(Ordering::Acquire);
        if !self.is_empty(final_head, tail) {
          continue;
        }
        let fault = unsafe { (*self.fault.get()).clone() };
        return match fault {
          Some(cause) => Err(TryReadError::Faulted(cause)),
          None => Err(TryReadError::EndOfStream),
        };
      }

      return Err(TryReadError::Empty);
    }
  }

  pub(crate) fn poll_read_internal(&self, cx: &mut Context<'_>) -> Poll<Result<T, ReadError>> {
    loop {
      match self.try_read_raw() {
        Ok(item) => return Poll::Ready(Ok(item)),
        Err(TryReadError::EndOfStream) => return Poll::Ready(Err(ReadError::EndOfStream)),
        Err(TryReadError::Faulted(cause)) => return Poll::Ready(Err(ReadError::Faulted(cause))),
        Err(TryReadError::Empty) => {}
      }

      self.consumer_waker.register(cx.waker());

      // Critical re-check after registration.
      let tail = self.tail.load(Ordering::Relaxed);
      let head = self.head.load(Ordering::Acquire);
      if !self.is_empty(head, tail) || self.completing.load(Ordering::Acquire) {
        continue;
      }

      return Poll::Pending;
    }
  }

  pub(crate) fn poll_write_internal(
    &self,
    cx: &mut Context<'_>,
    slot: &mut Option<T>,
  ) -> Poll<Result<(), WriteError<T>>> {
    loop {
      let item = match slot.take() {
        Some(item) => item,
        // Polled again after completing.
        None => return Poll::Ready(Ok(())),
      };

      match self.try_write_raw(item) {
        Ok(()) => return Poll::Ready(Ok(())),
        Err(TryWriteError::Closed(item)) => {
          return Poll::Ready(Err(WriteError::Closed(item)));
        }
        Err(TryWriteError::Full(item)) => {
          *slot = Some(item);
        }
      }

      self.producer_waker.register(cx.waker());

      // Critical re-check after registration.
      let head = self.head.load(Ordering::Relaxed);
      let tail = self.tail.load(Ordering::Acquire);
      if !self.is_full(head, tail)
        || self.completing.load(Ordering::Acquire)
        || self.consumer_dropped.load(Ordering::Acquire)
      {
        continue;
      }

      return Poll::Pending;
    }
  }
}

impl<T> Drop for SpscShared<T> {
  fn drop(&mut self) {
    // Called when the last handle goes away. Drop whatever is still queued.
    let head = *self.head.get_mut();
    let mut tail = *self.tail.get_mut();

    while tail != head {
      let slot_idx = tail % self.capacity;
      unsafe {
        (*self.buffer[slot_idx].get()).assume_init_drop();
      }
      tail = tail.wrapping_add(1);
    }
  }
}
