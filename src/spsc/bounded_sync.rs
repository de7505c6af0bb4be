// src/spsc/bounded_sync.rs

use crate::error::{
  CloseError, CompleteError, Fault, ReadError, TryReadError, TryWriteError, WriteError,
};
use crate::spsc::shared::SpscShared;

use std::marker::PhantomData;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use super::bounded_async::{AsyncConsumer, AsyncProducer};

/// The synchronous writing end of a bounded SPSC channel.
///
/// Not cloneable: the single-producer contract is enforced by the type.
#[derive(Debug)]
pub struct Producer<T> {
  pub(crate) shared: Arc<SpscShared<T>>,
  // Makes Producer<T> !Sync; only one thread may use the producer.
  pub(crate) _phantom: PhantomData<*mut ()>,
}

/// The synchronous reading end of a bounded SPSC channel.
///
/// Not cloneable: the single-consumer contract is enforced by the type.
#[derive(Debug)]
pub struct Consumer<T> {
  pub(crate) shared: Arc<SpscShared<T>>,
  pub(crate) closed: AtomicBool,
  // Makes Consumer<T> !Sync.
  pub(crate) _phantom: PhantomData<*mut ()>,
}

unsafe impl<T: Send> Send for Producer<T> {}
unsafe impl<T: Send> Send for Consumer<T> {}

impl<T: Send> Producer<T> {
  pub(crate) fn from_shared(shared: Arc<SpscShared<T>>) -> Self {
    Self {
      shared,
      _phantom: PhantomData,
    }
  }

  /// Converts this synchronous producer into an asynchronous one.
  /// Zero-cost; the handle keeps counting as the same producer.
  pub fn to_async(self) -> AsyncProducer<T> {
    let shared = unsafe { std::ptr::read(&self.shared) };
    mem::forget(self);
    AsyncProducer::from_shared(shared)
  }

  /// Attempts to write an item without blocking.
  pub fn try_write(&self, item: T) -> Result<(), TryWriteError<T>> {
    self.shared.try_write_raw(item)
  }

  /// Writes an item, blocking the current thread while the ring is full.
  pub fn write(&self, mut item: T) -> Result<(), WriteError<T>> {
    loop {
      match self.shared.try_write_raw(item) {
        Ok(()) => return Ok(()),
        Err(TryWriteError::Closed(returned)) => return Err(WriteError::Closed(returned)),
        Err(TryWriteError::Full(returned)) => {
          item = returned;

          // Commit to parking, then re-check to avoid a lost wakeup.
          unsafe {
            *self.shared.producer_thread.get() = Some(thread::current());
          }
          self.shared.producer_parked.store(true, Ordering::Release);

          let head = self.shared.head.load(Ordering::Relaxed);
          let tail = self.shared.tail.load(Ordering::Acquire);
          if !self.shared.is_full(head, tail)
            || self.shared.completing.load(Ordering::Acquire)
            || self.shared.consumer_dropped.load(Ordering::Acquire)
          {
            self.shared.cancel_producer_park();
            continue;
          }

          thread::park();
          self.shared.cancel_producer_park();
        }
      }
    }
  }

  /// Requests completion, optionally with a terminal error. First-wins: a
  /// later call returns `Err(CompleteError)` and changes nothing. The
  /// consumer drains every buffered item before it observes the outcome.
  pub fn complete(&self, fault: Option<Fault>) -> Result<(), CompleteError> {
    self.shared.complete_raw(fault)
  }

  /// Returns `true` if writes can no longer be accepted.
  pub fn is_closed(&self) -> bool {
    self.shared.completing.load(Ordering::Acquire)
      || self.shared.consumer_dropped.load(Ordering::Acquire)
  }

  /// Returns the total capacity of the channel.
  pub fn capacity(&self) -> usize {
    self.shared.capacity
  }

  /// Returns the number of buffered items. Advisory under concurrency.
  #[inline]
  pub fn len(&self) -> usize {
    let head = self.shared.head.load(Ordering::Acquire);
    let tail = self.shared.tail.load(Ordering::Acquire);
    self.shared.current_len(head, tail)
  }

  /// Returns `true` if the ring is empty.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Returns `true` if the ring is full.
  #[inline]
  pub fn is_full(&self) -> bool {
    let head = self.shared.head.load(Ordering::Acquire);
    let tail = self.shared.tail.load(Ordering::Acquire);
    self.shared.is_full(head, tail)
  }
}

impl<T> Drop for Producer<T> {
  fn drop(&mut self) {
    // A producer that goes away without completing completes cleanly on the
    // channel's behalf; first-wins makes this a no-op after an explicit call.
    let _ = self.shared.complete_raw(None);
  }
}

impl<T: Send> Consumer<T> {
  pub(crate) fn from_shared(shared: Arc<SpscShared<T>>) -> Self {
    Self {
      shared,
      closed: AtomicBool::new(false),
      _phantom: PhantomData,
    }
  }

  /// Converts this synchronous consumer into an asynchronous one.
  pub fn to_async(self) -> AsyncConsumer<T> {
    let shared = unsafe { std::ptr::read(&self.shared) };
    mem::forget(self);
    AsyncConsumer::from_shared(shared)
  }

  /// Attempts to read an item without blocking.
  pub fn try_read(&self) -> Result<T, TryReadError> {
    if self.closed.load(Ordering::Relaxed) {
      return Err(TryReadError::EndOfStream);
    }
    self.shared.try_read_raw()
  }

  /// Reads an item, blocking the current thread while the ring is empty and
  /// the channel is still open. Returns the terminal outcome once drained.
  pub fn read(&self) -> Result<T, ReadError> {
    if self.closed.load(Ordering::Relaxed) {
      return Err(ReadError::EndOfStream);
    }
    loop {
      match self.shared.try_read_raw() {
        Ok(item) => return Ok(item),
        Err(TryReadError::EndOfStream) => return Err(ReadError::EndOfStream),
        Err(TryReadError::Faulted(cause)) => return Err(ReadError::Faulted(cause)),
        Err(TryReadError::Empty) => {
          unsafe {
            *self.shared.consumer_thread.get() = Some(thread::current());
          }
          self.shared.consumer_parked.store(true, Ordering::Release);

          let tail = self.shared.tail.load(Ordering::Relaxed);
          let head = self.shared.head.load(Ordering::Acquire);
          if !self.shared.is_empty(head, tail) || self.shared.completing.load(Ordering::Acquire) {
            self.shared.cancel_consumer_park();
            continue;
          }

          thread::park();
          self.shared.cancel_consumer_park();
        }
      }
    }
  }

  /// Closes this handle, an explicit alternative to `drop`. A blocked
  /// producer wakes and fails with `Closed`.
  pub fn close(&self) -> Result<(), CloseError> {
    if self
      .closed
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
      .is_ok()
    {
      self.shared.consumer_closed_raw();
      Ok(())
    } else {
      Err(CloseError)
    }
  }

  /// Returns `true` once the channel can never yield another item.
  pub fn is_closed(&self) -> bool {
    let tail = self.shared.tail.load(Ordering::Acquire);
    let head = self.shared.head.load(Ordering::Acquire);
    self.shared.completing.load(Ordering::Acquire) && self.shared.is_empty(head, tail)
  }

  /// Returns the total capacity of the channel.
  pub fn capacity(&self) -> usize {
    self.shared.capacity
  }

  /// Returns the number of buffered items. Advisory under concurrency.
  #[inline]
  pub fn len(&self) -> usize {
    let head = self.shared.head.load(Ordering::Acquire);
    let tail = self.shared.tail.load(Ordering::Acquire);
    self.shared.current_len(head, tail)
  }

  /// Returns `true` if the ring is empty.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Returns `true` if the ring is full.
  #[inline]
  pub fn is_full(&self) -> bool {
    let head = self.shared.head.load(Ordering::Acquire);
    let tail = self.shared.tail.load(Ordering::Acquire);
    self.shared.is_full(head, tail)
  }
}

impl<T> Drop for Consumer<T> {
  fn drop(&mut self) {
    if !self.closed.swap(true, Ordering::AcqRel) {
      self.shared.consumer_closed_raw();
    }
  }
}
