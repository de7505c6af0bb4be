// src/policy.rs

//! The capacity policy applied to bounded channels.

/// What a bounded channel does with an incoming item when the buffer is at
/// capacity.
///
/// This is a closed set: the four behaviors are exhaustively defined and each
/// is individually testable. `Wait` is the only policy under which a write
/// can suspend; the two drop policies are lossy by design and never block,
/// which suits telemetry-style streams where throughput outranks
/// completeness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FullPolicy {
  /// Suspend the writer until space frees up, the channel completes, or the
  /// write is cancelled. `try_write` reports `Full` instead of suspending.
  #[default]
  Wait,
  /// Discard the incoming item. The write reports success; the item never
  /// enters the buffer.
  DropNewest,
  /// Evict the oldest buffered item to make room for the incoming one. The
  /// evicted item is never observed by any reader.
  DropOldest,
  /// Fail the write immediately with `Full`. Blocking and awaiting writes
  /// behave like `try_write` under this policy.
  Fail,
}

impl FullPolicy {
  /// Returns `true` for the policies that resolve a full buffer by losing an
  /// item instead of blocking or failing.
  #[inline]
  pub fn is_lossy(&self) -> bool {
    matches!(self, FullPolicy::DropNewest | FullPolicy::DropOldest)
  }
}
