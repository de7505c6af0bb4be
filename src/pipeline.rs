// src/pipeline.rs

//! Helpers for composing channels into processing pipelines.
//!
//! These are patterns, not machinery: each helper is a plain async function
//! over the channel handles and holds no state of its own. The shutdown
//! contract is one-directional. A stage completes its outbound channel after
//! its upstream reports a terminal outcome; completion never propagates
//! upstream automatically, so an upstream producer keeps running until its
//! own writes start failing with `Closed`.

use crate::error::{Fault, ReadError};
use crate::mpmc::{AsyncReader, AsyncWriter};

use futures_util::future::join_all;
use std::future::Future;

/// Drives one pipeline stage: reads from `input`, applies `transform`, and
/// writes the results to `output` in order.
///
/// Terminal handling:
/// - upstream end-of-stream completes `output` cleanly;
/// - an upstream fault, or an `Err` from `transform`, completes `output`
///   with that error, so faults flow downstream with their original cause;
/// - if `output` closes (all downstream readers gone), the stage stops early
///   and the unwritten item is discarded.
///
/// The stage owns completion of `output` via first-wins semantics; if some
/// other writer completed the channel first this function simply returns.
pub async fn run_stage<T, U, F, Fut>(input: AsyncReader<T>, output: AsyncWriter<U>, mut transform: F)
where
  T: Send,
  U: Send,
  F: FnMut(T) -> Fut,
  Fut: Future<Output = Result<U, Fault>>,
{
  loop {
    match input.read().await {
      Ok(item) => match transform(item).await {
        Ok(mapped) => {
          if output.write(mapped).await.is_err() {
            // Downstream is gone; nothing left to do.
            return;
          }
        }
        Err(cause) => {
          let _ = output.complete(Some(cause));
          return;
        }
      },
      Err(ReadError::EndOfStream) => {
        let _ = output.complete(None);
        return;
      }
      Err(ReadError::Faulted(cause)) => {
        let _ = output.complete(Some(cause));
        return;
      }
    }
  }
}

/// Fans `input` out to `workers` concurrent consumers of `handler`.
///
/// Workers race on the shared reader, so each item is handled exactly once
/// but no ordering is promised across workers. Resolves once every worker
/// has drained to the terminal outcome: `Ok(())` on clean completion, or the
/// channel's fault. At least one worker always runs.
pub async fn fan_out<T, F, Fut>(
  input: AsyncReader<T>,
  workers: usize,
  handler: F,
) -> Result<(), Fault>
where
  T: Send,
  F: Fn(T) -> Fut + Clone,
  Fut: Future<Output = ()>,
{
  let workers = workers.max(1);
  let mut drains = Vec::with_capacity(workers);

  for _ in 0..workers {
    let reader = input.clone();
    let handler = handler.clone();
    drains.push(async move {
      loop {
        match reader.read().await {
          Ok(item) => handler(item).await,
          Err(ReadError::EndOfStream) => return None,
          Err(ReadError::Faulted(cause)) => return Some(cause),
        }
      }
    });
  }
  // The clones keep the channel alive; the original can go.
  drop(input);

  let outcomes = join_all(drains).await;
  // Every worker that reaches the end of a faulted channel sees the same
  // cause, so taking the first reported fault loses nothing.
  match outcomes.into_iter().flatten().next() {
    Some(cause) => Err(cause),
    None => Ok(()),
  }
}
