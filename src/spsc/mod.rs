// src/spsc/mod.rs

//! A bounded single-producer, single-consumer channel.
//!
//! The fast path for the common one-in, one-out pipeline stage: a lock-free
//! ring buffer with one atomic index per side, no mutex anywhere. The
//! single-handle contract is enforced statically; [`Producer`] and
//! [`Consumer`] are not cloneable, so misuse does not compile.
//!
//! Semantics match the MPMC channel where the shapes overlap: explicit
//! completion with an optional terminal [`Fault`](crate::error::Fault),
//! drain-before-fault on the consumer side, and zero-cost conversion
//! between sync and async handles. Only the `Wait` full-policy is offered
//! here; lossy policies need the buffered channel.

mod bounded_async;
mod bounded_sync;
mod shared;

pub use bounded_async::{AsyncConsumer, AsyncProducer, ReadFuture, WriteFuture};
pub use bounded_sync::{Consumer, Producer};

use shared::SpscShared;
use std::sync::Arc;

/// Creates a bounded SPSC channel with synchronous handles.
///
/// # Panics
/// Panics if `capacity` is zero.
pub fn bounded<T: Send>(capacity: usize) -> (Producer<T>, Consumer<T>) {
  let shared = Arc::new(SpscShared::new_internal(capacity));
  (
    Producer::from_shared(shared.clone()),
    Consumer::from_shared(shared),
  )
}

/// Creates a bounded SPSC channel with asynchronous handles.
///
/// # Panics
/// Panics if `capacity` is zero.
pub fn bounded_async<T: Send>(capacity: usize) -> (AsyncProducer<T>, AsyncConsumer<T>) {
  let shared = Arc::new(SpscShared::new_internal(capacity));
  (
    AsyncProducer::from_shared(shared.clone()),
    AsyncConsumer::from_shared(shared),
  )
}
