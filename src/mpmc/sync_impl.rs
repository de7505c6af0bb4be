// src/mpmc/sync_impl.rs

//! The synchronous, thread-parking write and read paths.
//!
//! Every operation follows the same shape: try the non-blocking core op,
//! re-check state under the lock, commit to parking, wait, retry. The
//! re-check under the lock is what prevents lost wakeups.

use super::backoff;
use super::core::SyncWaiter;
use super::{Reader, Writer};
use crate::error::{
  ReadError, ReadTimeoutError, TryReadError, TryWriteError, WriteError, WriteTimeoutError,
};
use crate::policy::FullPolicy;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Blocking write. Parks the calling thread when the channel is bounded,
/// full, and the policy is `Wait`; under `Fail` the full buffer is an
/// immediate error, and the drop policies never report a full buffer at all.
pub(crate) fn write_sync<T: Send>(writer: &Writer<T>, item: T) -> Result<(), WriteError<T>> {
  let mut pending = Some(item);

  loop {
    let item = pending
      .take()
      .expect("item must be present at the top of the write loop");

    // --- Phase 1: Attempt a non-blocking write ---
    match writer.shared.try_write_core(item) {
      Ok(()) => return Ok(()),
      Err(TryWriteError::Closed(item)) => return Err(WriteError::Closed(item)),
      Err(TryWriteError::Full(item)) => {
        if writer.shared.policy == FullPolicy::Fail {
          return Err(WriteError::Full(item));
        }
        pending = Some(item);
      }
    }

    // --- Phase 2: Lock, re-check, and commit to parking ---
    let done_flag = Arc::new(AtomicBool::new(false));
    {
      let mut guard = writer.shared.internal.lock();

      // Space may have freed up, or the channel may have closed, between the
      // try and taking the lock. Either way, retry instead of parking.
      if !guard.slots.is_full() || !guard.lifecycle.is_open() || guard.reader_count == 0 {
        continue;
      }

      guard.waiting_sync_writers.push_back(SyncWaiter {
        thread: thread::current(),
        done: done_flag.clone(),
      });
    }

    // --- Phase 3: Wait ---
    backoff::adaptive_wait(|| done_flag.load(Ordering::Acquire));

    // Woken: space probably freed up, or the channel reached a terminal
    // state. The item is still in `pending`; loop and retry.
  }
}

/// Blocking write with a deadline. All-or-nothing: on timeout the item is
/// handed back and the channel is untouched.
pub(crate) fn write_timeout_sync<T: Send>(
  writer: &Writer<T>,
  item: T,
  timeout: Duration,
) -> Result<(), WriteTimeoutError<T>> {
  let start_time = Instant::now();
  let mut pending = Some(item);

  loop {
    let item = pending
      .take()
      .expect("item must be present at the top of the write loop");

    match writer.shared.try_write_core(item) {
      Ok(()) => return Ok(()),
      Err(TryWriteError::Closed(item)) => return Err(WriteTimeoutError::Closed(item)),
      Err(TryWriteError::Full(item)) => {
        if writer.shared.policy == FullPolicy::Fail {
          return Err(WriteTimeoutError::Full(item));
        }
        pending = Some(item);
      }
    }

    let elapsed = start_time.elapsed();
    if elapsed >= timeout {
      return Err(WriteTimeoutError::Timeout(
        pending
          .take()
          .expect("item must be present after a full buffer"),
      ));
    }
    let remaining = timeout - elapsed;

    let done_flag = Arc::new(AtomicBool::new(false));
    {
      let mut guard = writer.shared.internal.lock();
      if !guard.slots.is_full() || !guard.lifecycle.is_open() || guard.reader_count == 0 {
        continue;
      }
      guard.waiting_sync_writers.push_back(SyncWaiter {
        thread: thread::current(),
        done: done_flag.clone(),
      });
    }

    thread::park_timeout(remaining);

    // Claim our queue entry. If a waker got there first we consumed a wake
    // and must retry promptly; if we got there first the stale entry will be
    // skipped by the wake path.
    let _ = done_flag.swap(true, Ordering::AcqRel);
  }
}

/// Blocking read. Parks when the channel is empty and still open; terminal
/// outcomes are reported only once the buffer has drained.
pub(crate) fn read_sync<T: Send>(reader: &Reader<T>) -> Result<T, ReadError> {
  loop {
    // --- Phase 1: Attempt a non-blocking read ---
    match reader.shared.try_read_core() {
      Ok(item) => return Ok(item),
      Err(TryReadError::EndOfStream) => return Err(ReadError::EndOfStream),
      Err(TryReadError::Faulted(cause)) => return Err(ReadError::Faulted(cause)),
      Err(TryReadError::Empty) => { /* Prepare to park */ }
    }

    // --- Phase 2: Lock, re-check, and commit to parking ---
    let done_flag = Arc::new(AtomicBool::new(false));
    {
      let mut guard = reader.shared.internal.lock();

      if !guard.slots.is_empty() || !guard.lifecycle.is_open() {
        continue;
      }

      guard.waiting_sync_readers.push_back(SyncWaiter {
        thread: thread::current(),
        done: done_flag.clone(),
      });
    }

    // --- Phase 3: Wait ---
    backoff::adaptive_wait(|| done_flag.load(Ordering::Acquire));
  }
}

/// Blocking read with a deadline. All-or-nothing: a timed-out read consumes
/// nothing.
pub(crate) fn read_timeout_sync<T: Send>(
  reader: &Reader<T>,
  timeout: Duration,
) -> Result<T, ReadTimeoutError> {
  let start_time = Instant::now();

  loop {
    match reader.shared.try_read_core() {
      Ok(item) => return Ok(item),
      Err(TryReadError::EndOfStream) => return Err(ReadTimeoutError::EndOfStream),
      Err(TryReadError::Faulted(cause)) => return Err(ReadTimeoutError::Faulted(cause)),
      Err(TryReadError::Empty) => { /* Continue to the timed path */ }
    }

    let elapsed = start_time.elapsed();
    if elapsed >= timeout {
      return Err(ReadTimeoutError::Timeout);
    }
    let remaining = timeout - elapsed;

    let done_flag = Arc::new(AtomicBool::new(false));
    {
      let mut guard = reader.shared.internal.lock();
      if !guard.slots.is_empty() || !guard.lifecycle.is_open() {
        continue;
      }
      guard.waiting_sync_readers.push_back(SyncWaiter {
        thread: thread::current(),
        done: done_flag.clone(),
      });
    }

    thread::park_timeout(remaining);

    // Claim or acknowledge the queue entry, as in `write_timeout_sync`.
    let _ = done_flag.swap(true, Ordering::AcqRel);
  }
}
