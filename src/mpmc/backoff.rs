// src/mpmc/backoff.rs

use std::thread;

/// An adaptive wait: spin briefly, then yield, then park until the condition
/// holds. The parked phase relies on the waker setting the condition before
/// calling `unpark`, so a spurious unpark simply re-parks.
pub(crate) fn adaptive_wait<F>(cond: F)
where
  F: Fn() -> bool,
{
  for _ in 0..16 {
    if cond() {
      return;
    }
    std::hint::spin_loop();
  }

  for _ in 0..8 {
    if cond() {
      return;
    }
    thread::yield_now();
  }

  while !cond() {
    thread::park();
  }
}
