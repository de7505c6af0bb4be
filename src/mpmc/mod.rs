// src/mpmc/mod.rs

//! The general multi-writer, multi-reader channel.
//!
//! This channel arbitrates access through a single `parking_lot::Mutex` per
//! channel instance and supports mixed-paradigm usage: synchronous and
//! asynchronous handles created over the same channel interoperate, which is
//! achieved by keeping separate queues for sync and async waiters internally.
//!
//! Unlike a plain disconnect-on-drop channel, completion here is an explicit,
//! first-wins operation that may carry a terminal error. Readers drain every
//! buffered item before they observe the terminal outcome, and a faulted
//! channel replays the same cause to every reader that reaches the end.
//!
//! ### Choosing a flavor
//!
//! - Use this channel when producer/consumer counts are unknown or variable,
//!   for fan-out worker groups, or whenever drop policies are needed.
//! - Use [`crate::spsc`] when there is exactly one writer and one reader and
//!   throughput matters; it avoids the mutex entirely.

use crate::error::{
  CloseError, CompleteError, Fault, ReadError, ReadTimeoutError, TryReadError, TryWriteError,
  WriteError, WriteTimeoutError,
};
use crate::policy::FullPolicy;

// Re-export the futures and the drain stream for the public API.
pub use async_impl::{ReadAll, ReadFuture, WriteFuture};

mod async_impl;
mod backoff;
mod core;
mod slot;
mod sync_impl;

pub(crate) use self::core::ChannelShared;

use self::slot::{SlotStore, UNBOUNDED};
use ::core::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// --- Public Structs (Sync) ---

/// A synchronous writing handle.
///
/// Writers can be cloned to create multiple producers. Dropping the last
/// writer without an explicit [`Writer::complete`] completes the channel
/// cleanly on its behalf.
#[derive(Debug)]
pub struct Writer<T: Send> {
  shared: Arc<ChannelShared<T>>,
}

/// A synchronous reading handle.
///
/// Readers can be cloned to create multiple consumers; concurrent readers
/// race for items and no ordering is promised across them. When all readers
/// are dropped, subsequent writes fail with `Closed`.
#[derive(Debug)]
pub struct Reader<T: Send> {
  shared: Arc<ChannelShared<T>>,
  closed: AtomicBool,
}

// --- Public Structs (Async) ---

/// An asynchronous writing handle. See [`Writer`] for the semantics.
#[derive(Debug)]
pub struct AsyncWriter<T: Send> {
  shared: Arc<ChannelShared<T>>,
}

/// An asynchronous reading handle. See [`Reader`] for the semantics.
#[derive(Debug)]
pub struct AsyncReader<T: Send> {
  shared: Arc<ChannelShared<T>>,
  closed: AtomicBool,
  // Claim flag for the waiter entry queued by the `Stream` impl, retired on
  // drop so a half-polled stream cannot soak up a wake.
  stream_entry: Option<Arc<AtomicBool>>,
}

// --- Channel Constructors ---

/// Creates a synchronous bounded channel.
///
/// `capacity` must be at least 1. `policy` decides what a write does when the
/// buffer is at capacity; see [`FullPolicy`].
pub fn bounded<T: Send>(capacity: usize, policy: FullPolicy) -> (Writer<T>, Reader<T>) {
  let shared = Arc::new(ChannelShared::new(SlotStore::bounded(capacity, policy)));
  (
    Writer {
      shared: Arc::clone(&shared),
    },
    Reader {
      shared,
      closed: AtomicBool::new(false),
    },
  )
}

/// Creates a synchronous unbounded channel. Writes never suspend; memory is
/// the only limit.
pub fn unbounded<T: Send>() -> (Writer<T>, Reader<T>) {
  let shared = Arc::new(ChannelShared::new(SlotStore::unbounded()));
  (
    Writer {
      shared: Arc::clone(&shared),
    },
    Reader {
      shared,
      closed: AtomicBool::new(false),
    },
  )
}

/// Creates an asynchronous bounded channel.
pub fn bounded_async<T: Send>(capacity: usize, policy: FullPolicy) -> (AsyncWriter<T>, AsyncReader<T>) {
  let shared = Arc::new(ChannelShared::new(SlotStore::bounded(capacity, policy)));
  (
    AsyncWriter {
      shared: Arc::clone(&shared),
    },
    AsyncReader {
      shared,
      closed: AtomicBool::new(false),
      stream_entry: None,
    },
  )
}

/// Creates an asynchronous unbounded channel.
pub fn unbounded_async<T: Send>() -> (AsyncWriter<T>, AsyncReader<T>) {
  let shared = Arc::new(ChannelShared::new(SlotStore::unbounded()));
  (
    AsyncWriter {
      shared: Arc::clone(&shared),
    },
    AsyncReader {
      shared,
      closed: AtomicBool::new(false),
      stream_entry: None,
    },
  )
}

// --- Clone ---

impl<T: Send> Clone for Writer<T> {
  fn clone(&self) -> Self {
    self.shared.internal.lock().writer_count += 1;
    Writer {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<T: Send> Clone for Reader<T> {
  fn clone(&self) -> Self {
    self.shared.internal.lock().reader_count += 1;
    Reader {
      shared: Arc::clone(&self.shared),
      closed: AtomicBool::new(false),
    }
  }
}

impl<T: Send> Clone for AsyncWriter<T> {
  fn clone(&self) -> Self {
    self.shared.internal.lock().writer_count += 1;
    AsyncWriter {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<T: Send> Clone for AsyncReader<T> {
  fn clone(&self) -> Self {
    self.shared.internal.lock().reader_count += 1;
    AsyncReader {
      shared: Arc::clone(&self.shared),
      closed: AtomicBool::new(false),
      stream_entry: None,
    }
  }
}

// --- Introspection shared by all handles ---

macro_rules! impl_introspection {
  ($handle:ident) => {
    impl<T: Send> $handle<T> {
      /// Returns the capacity of the channel. `None` for unbounded channels.
      pub fn capacity(&self) -> Option<usize> {
        if self.shared.capacity == UNBOUNDED {
          None
        } else {
          Some(self.shared.capacity)
        }
      }

      /// Returns the full-buffer policy the channel was created with.
      pub fn policy(&self) -> FullPolicy {
        self.shared.policy
      }

      /// Returns the number of buffered items. Advisory only: the value may
      /// be stale the instant after it is read under concurrent access.
      #[inline]
      pub fn len(&self) -> usize {
        self.shared.internal.lock().slots.len()
      }

      /// Returns `true` if the buffer is empty. Advisory, like [`Self::len`].
      #[inline]
      pub fn is_empty(&self) -> bool {
        self.len() == 0
      }

      /// Returns `true` if the buffer is at capacity. Always `false` for
      /// unbounded channels. Advisory, like [`Self::len`].
      #[inline]
      pub fn is_full(&self) -> bool {
        self.shared.internal.lock().slots.is_full()
      }
    }
  };
}

impl_introspection!(Writer);
impl_introspection!(Reader);
impl_introspection!(AsyncWriter);
impl_introspection!(AsyncReader);

// --- Public API Method Implementations (Sync) ---

impl<T: Send> Writer<T> {
  /// Writes a value, blocking the current thread while the channel is full
  /// under the `Wait` policy.
  pub fn write(&self, item: T) -> Result<(), WriteError<T>> {
    sync_impl::write_sync(self, item)
  }

  /// Attempts to write a value without blocking.
  pub fn try_write(&self, item: T) -> Result<(), TryWriteError<T>> {
    self.shared.try_write_core(item)
  }

  /// Writes a value, blocking for at most `timeout`. On timeout the item is
  /// handed back and nothing was queued.
  pub fn write_timeout(&self, item: T, timeout: Duration) -> Result<(), WriteTimeoutError<T>> {
    sync_impl::write_timeout_sync(self, item, timeout)
  }

  /// Requests completion of the channel, optionally with a terminal error.
  ///
  /// No write is accepted after this returns. Buffered items remain readable;
  /// once they drain, readers observe end-of-stream (or the fault). The first
  /// completion wins: a second call returns `Err(CompleteError)` and changes
  /// nothing, including the carried error.
  pub fn complete(&self, fault: Option<Fault>) -> Result<(), CompleteError> {
    self.shared.complete_core(fault)
  }

  /// Returns `true` if writes can no longer be accepted, either because
  /// completion was requested or because every reader has been dropped.
  pub fn is_closed(&self) -> bool {
    let guard = self.shared.internal.lock();
    guard.reader_count == 0 || !guard.lifecycle.is_open()
  }

  /// Converts this synchronous `Writer` into an [`AsyncWriter`].
  ///
  /// This is a zero-cost conversion; the handle keeps counting as the same
  /// producer.
  pub fn to_async(self) -> AsyncWriter<T> {
    let shared = unsafe { std::ptr::read(&self.shared) };
    mem::forget(self);
    AsyncWriter { shared }
  }
}

impl<T: Send> Drop for Writer<T> {
  fn drop(&mut self) {
    self.shared.release_writer();
  }
}

impl<T: Send> Reader<T> {
  /// Reads a value, blocking the current thread while the channel is empty
  /// and still open. Returns the terminal outcome once the buffer drains.
  pub fn read(&self) -> Result<T, ReadError> {
    if self.closed.load(Ordering::Relaxed) {
      return Err(ReadError::EndOfStream);
    }
    sync_impl::read_sync(self)
  }

  /// Attempts to read a value without blocking.
  pub fn try_read(&self) -> Result<T, TryReadError> {
    if self.closed.load(Ordering::Relaxed) {
      return Err(TryReadError::EndOfStream);
    }
    self.shared.try_read_core()
  }

  /// Reads a value, blocking for at most `timeout`. A timed-out read consumes
  /// nothing.
  pub fn read_timeout(&self, timeout: Duration) -> Result<T, ReadTimeoutError> {
    if self.closed.load(Ordering::Relaxed) {
      return Err(ReadTimeoutError::EndOfStream);
    }
    sync_impl::read_timeout_sync(self, timeout)
  }

  /// Drains the channel to exhaustion as a blocking iterator.
  ///
  /// Yields `Ok(item)` for every item this reader receives; if the channel
  /// faulted, the final element is `Err(cause)`, yielded strictly after all
  /// buffered items. A clean completion simply ends the iteration.
  pub fn drain(&self) -> Drain<'_, T> {
    Drain {
      reader: self,
      finished: false,
    }
  }

  /// Closes this handle, an explicit alternative to `drop`. Subsequent reads
  /// through this handle behave as if the stream had ended. If this was the
  /// last reader, blocked writers are woken and fail with `Closed`.
  ///
  /// # Errors
  ///
  /// Returns `Err(CloseError)` if this handle has already been closed.
  pub fn close(&self) -> Result<(), CloseError> {
    if self
      .closed
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
      .is_ok()
    {
      self.shared.release_reader();
      Ok(())
    } else {
      Err(CloseError)
    }
  }

  /// Returns `true` once the channel can never yield another item: completion
  /// was requested and the buffer is drained.
  pub fn is_closed(&self) -> bool {
    let guard = self.shared.internal.lock();
    !guard.lifecycle.is_open() && guard.slots.is_empty()
  }

  /// Converts this synchronous `Reader` into an [`AsyncReader`].
  pub fn to_async(self) -> AsyncReader<T> {
    let closed = self.closed.load(Ordering::Relaxed);
    let shared = unsafe { std::ptr::read(&self.shared) };
    mem::forget(self);
    AsyncReader {
      shared,
      closed: AtomicBool::new(closed),
      stream_entry: None,
    }
  }
}

impl<T: Send> Drop for Reader<T> {
  fn drop(&mut self) {
    let _ = self.close();
  }
}

/// Blocking draining iterator returned by [`Reader::drain`].
#[derive(Debug)]
pub struct Drain<'a, T: Send> {
  reader: &'a Reader<T>,
  finished: bool,
}

impl<'a, T: Send> Iterator for Drain<'a, T> {
  type Item = Result<T, Fault>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.finished {
      return None;
    }
    match self.reader.read() {
      Ok(item) => Some(Ok(item)),
      Err(ReadError::EndOfStream) => {
        self.finished = true;
        None
      }
      Err(ReadError::Faulted(cause)) => {
        self.finished = true;
        Some(Err(cause))
      }
    }
  }
}

// --- Public API Method Implementations (Async) ---

impl<T: Send> AsyncWriter<T> {
  /// Writes a value asynchronously. The returned future completes once the
  /// value is accepted, or fails once the channel closes. Dropping the future
  /// before it completes leaves the channel untouched.
  pub fn write(&self, item: T) -> WriteFuture<'_, T> {
    async_impl::WriteFuture::new(self, item)
  }

  /// Attempts to write a value without awaiting.
  pub fn try_write(&self, item: T) -> Result<(), TryWriteError<T>> {
    self.shared.try_write_core(item)
  }

  /// Requests completion of the channel. See [`Writer::complete`].
  pub fn complete(&self, fault: Option<Fault>) -> Result<(), CompleteError> {
    self.shared.complete_core(fault)
  }

  /// Returns `true` if writes can no longer be accepted.
  pub fn is_closed(&self) -> bool {
    let guard = self.shared.internal.lock();
    guard.reader_count == 0 || !guard.lifecycle.is_open()
  }

  /// Converts this asynchronous `AsyncWriter` into a synchronous [`Writer`].
  pub fn to_sync(self) -> Writer<T> {
    let shared = unsafe { std::ptr::read(&self.shared) };
    mem::forget(self);
    Writer { shared }
  }
}

impl<T: Send> Drop for AsyncWriter<T> {
  fn drop(&mut self) {
    self.shared.release_writer();
  }
}

impl<T: Send> AsyncReader<T> {
  /// Reads a value asynchronously. Resolves with the next item, or with the
  /// terminal outcome once the buffer has drained. Dropping the future never
  /// consumes an item.
  pub fn read(&self) -> ReadFuture<'_, T> {
    async_impl::ReadFuture::new(self)
  }

  /// Attempts to read a value without awaiting.
  pub fn try_read(&self) -> Result<T, TryReadError> {
    if self.closed.load(Ordering::Relaxed) {
      return Err(TryReadError::EndOfStream);
    }
    self.shared.try_read_core()
  }

  /// Drains the channel to exhaustion as a stream. See [`Reader::drain`] for
  /// the terminal-element contract.
  pub fn read_all(&self) -> ReadAll<'_, T> {
    async_impl::ReadAll::new(self)
  }

  /// Closes this handle. See [`Reader::close`].
  pub fn close(&self) -> Result<(), CloseError> {
    if self
      .closed
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
      .is_ok()
    {
      self.shared.release_reader();
      Ok(())
    } else {
      Err(CloseError)
    }
  }

  /// Returns `true` once the channel can never yield another item.
  pub fn is_closed(&self) -> bool {
    let guard = self.shared.internal.lock();
    !guard.lifecycle.is_open() && guard.slots.is_empty()
  }

  /// Converts this asynchronous `AsyncReader` into a synchronous [`Reader`].
  pub fn to_sync(mut self) -> Reader<T> {
    let closed = self.closed.load(Ordering::Relaxed);
    let entry = self.stream_entry.take();
    let shared = unsafe { std::ptr::read(&self.shared) };
    mem::forget(self);
    shared.cancel_read_wait(entry);
    Reader {
      shared,
      closed: AtomicBool::new(closed),
    }
  }
}

impl<T: Send> Drop for AsyncReader<T> {
  fn drop(&mut self) {
    self.shared.cancel_read_wait(self.stream_entry.take());
    let _ = self.close();
  }
}
