// src/mpmc/async_impl.rs

//! The asynchronous, future-based write and read paths.
//!
//! Cancellation is dropping the future. Both futures are all-or-nothing with
//! respect to the buffer: a write future owns its item until the core accepts
//! it, and a read future never takes an item without immediately resolving
//! with it. Each future tracks its queued waiter entry through a claim flag
//! shared with the wake path; on drop the entry is retired, and if a wake was
//! already spent on it, the wake is passed on to the next parked waiter, so a
//! cancelled future never strands a live one.

use futures_core::Stream;

use super::core::{retire_entry, AsyncWaiter};
use super::{AsyncReader, AsyncWriter};
use crate::error::{Fault, ReadError, TryWriteError, WriteError};
use crate::policy::FullPolicy;

use core::marker::PhantomPinned;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::task::{Context, Poll};

// --- WriteFuture ---

/// A future that completes when the item has been accepted by the channel.
#[must_use = "futures do nothing unless you .await or poll them"]
#[derive(Debug)]
pub struct WriteFuture<'a, T: Send> {
  writer: &'a AsyncWriter<T>,
  // Wrapped in an Option so the item can be taken during the poll.
  item: Option<T>,
  waker_entry: Option<Arc<AtomicBool>>,
  _phantom: PhantomPinned,
}

impl<'a, T: Send> WriteFuture<'a, T> {
  pub(super) fn new(writer: &'a AsyncWriter<T>, item: T) -> Self {
    Self {
      writer,
      item: Some(item),
      waker_entry: None,
      _phantom: PhantomPinned,
    }
  }
}

impl<'a, T: Send> Future for WriteFuture<'a, T> {
  type Output = Result<(), WriteError<T>>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = unsafe { self.as_mut().get_unchecked_mut() };
    loop {
      // Polled again after completing.
      if this.item.is_none() {
        retire_entry(&mut this.waker_entry);
        return Poll::Ready(Ok(()));
      }

      // --- Phase 1: Try to write without parking ---
      let item = this.item.take().expect("checked for Some above");
      match this.writer.shared.try_write_core(item) {
        Ok(()) => {
          retire_entry(&mut this.waker_entry);
          return Poll::Ready(Ok(()));
        }
        Err(TryWriteError::Closed(item)) => {
          retire_entry(&mut this.waker_entry);
          return Poll::Ready(Err(WriteError::Closed(item)));
        }
        Err(TryWriteError::Full(item)) => {
          if this.writer.shared.policy == FullPolicy::Fail {
            retire_entry(&mut this.waker_entry);
            return Poll::Ready(Err(WriteError::Full(item)));
          }
          this.item = Some(item);
        }
      }

      // --- Phase 2: Lock, re-check, and commit to parking ---
      {
        let mut guard = this.writer.shared.internal.lock();

        if !guard.slots.is_full() || !guard.lifecycle.is_open() || guard.reader_count == 0 {
          drop(guard);
          continue;
        }

        // Retire the entry from a previous poll so a re-poll under `select!`
        // never leaves duplicates behind.
        retire_entry(&mut this.waker_entry);
        let flag = Arc::new(AtomicBool::new(false));
        guard.waiting_async_writers.push_back(AsyncWaiter {
          waker: cx.waker().clone(),
          done: flag.clone(),
        });
        this.waker_entry = Some(flag);
        return Poll::Pending;
      }
    }
  }
}

impl<'a, T: Send> Drop for WriteFuture<'a, T> {
  fn drop(&mut self) {
    let entry = self.waker_entry.take();
    self.writer.shared.cancel_write_wait(entry);
  }
}

// --- ReadFuture ---

/// A future that resolves with the next item, or with the channel's terminal
/// outcome once the buffer has drained.
#[must_use = "futures do nothing unless you .await or poll them"]
#[derive(Debug)]
pub struct ReadFuture<'a, T: Send> {
  reader: &'a AsyncReader<T>,
  waker_entry: Option<Arc<AtomicBool>>,
}

impl<'a, T: Send> ReadFuture<'a, T> {
  pub(super) fn new(reader: &'a AsyncReader<T>) -> Self {
    Self {
      reader,
      waker_entry: None,
    }
  }
}

impl<'a, T: Send> Future for ReadFuture<'a, T> {
  type Output = Result<T, ReadError>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    if this.reader.closed.load(std::sync::atomic::Ordering::Relaxed) {
      retire_entry(&mut this.waker_entry);
      return Poll::Ready(Err(ReadError::EndOfStream));
    }
    this
      .reader
      .shared
      .poll_read_internal(cx, &mut this.waker_entry)
  }
}

impl<'a, T: Send> Drop for ReadFuture<'a, T> {
  fn drop(&mut self) {
    let entry = self.waker_entry.take();
    self.reader.shared.cancel_read_wait(entry);
  }
}

// --- ReadAll ---

/// The drain-to-exhaustion stream returned by [`AsyncReader::read_all`].
///
/// Yields every item exactly once, in arrival order for this reader. If the
/// channel faulted, the fault is yielded as the final `Err` element, strictly
/// after all buffered items; a clean completion just ends the stream. After
/// the terminal element the stream is fused.
#[must_use = "streams do nothing unless polled"]
#[derive(Debug)]
pub struct ReadAll<'a, T: Send> {
  reader: &'a AsyncReader<T>,
  finished: bool,
  waker_entry: Option<Arc<AtomicBool>>,
}

impl<'a, T: Send> ReadAll<'a, T> {
  pub(super) fn new(reader: &'a AsyncReader<T>) -> Self {
    Self {
      reader,
      finished: false,
      waker_entry: None,
    }
  }
}

impl<'a, T: Send> Stream for ReadAll<'a, T> {
  type Item = Result<T, Fault>;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let this = self.get_mut();
    if this.finished || this.reader.closed.load(std::sync::atomic::Ordering::Relaxed) {
      retire_entry(&mut this.waker_entry);
      return Poll::Ready(None);
    }
    match this
      .reader
      .shared
      .poll_read_internal(cx, &mut this.waker_entry)
    {
      Poll::Ready(Ok(item)) => Poll::Ready(Some(Ok(item))),
      Poll::Ready(Err(ReadError::EndOfStream)) => {
        this.finished = true;
        Poll::Ready(None)
      }
      Poll::Ready(Err(ReadError::Faulted(cause))) => {
        this.finished = true;
        Poll::Ready(Some(Err(cause)))
      }
      Poll::Pending => Poll::Pending,
    }
  }
}

impl<'a, T: Send> Drop for ReadAll<'a, T> {
  fn drop(&mut self) {
    let entry = self.waker_entry.take();
    self.reader.shared.cancel_read_wait(entry);
  }
}

/// Item-only stream view. A terminal outcome ends the stream, and so does
/// closing the handle; use [`AsyncReader::read_all`] when the fault itself
/// matters.
impl<T: Send> Stream for AsyncReader<T> {
  type Item = T;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let this = self.get_mut();
    if this.closed.load(std::sync::atomic::Ordering::Relaxed) {
      retire_entry(&mut this.stream_entry);
      return Poll::Ready(None);
    }
    match this.shared.poll_read_internal(cx, &mut this.stream_entry) {
      Poll::Ready(Ok(item)) => Poll::Ready(Some(item)),
      Poll::Ready(Err(_)) => Poll::Ready(None),
      Poll::Pending => Poll::Pending,
    }
  }
}
