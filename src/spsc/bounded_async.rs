// src/spsc/bounded_async.rs

use crate::error::{
  CloseError, CompleteError, Fault, ReadError, TryReadError, TryWriteError, WriteError,
};
use crate::spsc::shared::SpscShared;

use futures_core::Stream;
use std::future::Future;
use std::marker::PhantomData;
use std::mem;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use super::bounded_sync::{Consumer, Producer};

/// The asynchronous writing end of a bounded SPSC channel. See
/// [`Producer`] for the semantics; not cloneable.
#[derive(Debug)]
pub struct AsyncProducer<T> {
  pub(crate) shared: Arc<SpscShared<T>>,
  pub(crate) _phantom: PhantomData<T>,
}

/// The asynchronous reading end of a bounded SPSC channel. See
/// [`Consumer`] for the semantics; not cloneable.
#[derive(Debug)]
pub struct AsyncConsumer<T> {
  pub(crate) shared: Arc<SpscShared<T>>,
  pub(crate) closed: AtomicBool,
  pub(crate) _phantom: PhantomData<T>,
}

impl<T: Send> AsyncProducer<T> {
  pub(crate) fn from_shared(shared: Arc<SpscShared<T>>) -> Self {
    Self {
      shared,
      _phantom: PhantomData,
    }
  }

  /// Converts this asynchronous producer into a synchronous one. Zero-cost.
  pub fn to_sync(self) -> Producer<T> {
    let shared = unsafe { std::ptr::read(&self.shared) };
    mem::forget(self);
    Producer::from_shared(shared)
  }

  /// Attempts to write an item without awaiting.
  pub fn try_write(&self, item: T) -> Result<(), TryWriteError<T>> {
    self.shared.try_write_raw(item)
  }

  /// Writes an item asynchronously, suspending while the ring is full.
  /// Dropping the future before it completes leaves the channel untouched.
  pub fn write(&self, item: T) -> WriteFuture<'_, T> {
    WriteFuture {
      producer: self,
      item: Some(item),
    }
  }

  /// Requests completion. See [`Producer::complete`].
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
}

impl<T> Drop for AsyncProducer<T> {
  fn drop(&mut self) {
    let _ = self.shared.complete_raw(None);
  }
}

impl<T: Send> AsyncConsumer<T> {
  pub(crate) fn from_shared(shared: Arc<SpscShared<T>>) -> Self {
    Self {
      shared,
      closed: AtomicBool::new(false),
      _phantom: PhantomData,
    }
  }

  /// Converts this asynchronous consumer into a synchronous one. Zero-cost.
  pub fn to_sync(self) -> Consumer<T> {
    let shared = unsafe { std::ptr::read(&self.shared) };
    mem::forget(self);
    Consumer::from_shared(shared)
  }

  /// Attempts to read an item without awaiting.
  pub fn try_read(&self) -> Result<T, TryReadError> {
    if self.closed.load(Ordering::Relaxed) {
      return Err(TryReadError::EndOfStream);
    }
    self.shared.try_read_raw()
  }

  /// Reads an item asynchronously, suspending while the ring is empty and
  /// the channel is still open. Dropping the future never consumes an item.
  pub fn read(&self) -> ReadFuture<'_, T> {
    ReadFuture { consumer: self }
  }

  /// Closes this handle. See [`Consumer::close`].
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
}

impl<T> Drop for AsyncConsumer<T> {
  fn drop(&mut self) {
    if !self.closed.swap(true, Ordering::AcqRel) {
      self.shared.consumer_closed_raw();
    }
  }
}

// --- Futures ---

/// A future that completes when the item has been accepted by the ring.
#[must_use = "futures do nothing unless you .await or poll them"]
#[derive(Debug)]
pub struct WriteFuture<'a, T> {
  producer: &'a AsyncProducer<T>,
  item: Option<T>,
}

impl<'a, T> Unpin for WriteFuture<'a, T> {}

impl<'a, T: Send> Future for WriteFuture<'a, T> {
  type Output = Result<(), WriteError<T>>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    this.producer.shared.poll_write_internal(cx, &mut this.item)
  }
}

/// A future that resolves with the next item, or with the terminal outcome
/// once the ring has drained.
#[must_use = "futures do nothing unless you .await or poll them"]
#[derive(Debug)]
pub struct ReadFuture<'a, T> {
  consumer: &'a AsyncConsumer<T>,
}

impl<'a, T: Send> Future for ReadFuture<'a, T> {
  type Output = Result<T, ReadError>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    if self.consumer.closed.load(Ordering::Relaxed) {
      return Poll::Ready(Err(ReadError::EndOfStream));
    }
    self.consumer.shared.poll_read_internal(cx)
  }
}

/// Item-only stream view. A terminal outcome ends the stream; use explicit
/// reads when the fault itself matters.
impl<T: Send> Stream for AsyncConsumer<T> {
  type Item = T;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    match self.shared.poll_read_internal(cx) {
      Poll::Ready(Ok(item)) => Poll::Ready(Some(item)),
      Poll::Ready(Err(_)) => Poll::Ready(None),
      Poll::Pending => Poll::Pending,
    }
  }
}
