//! Completion-aware sync/async channels for Rust.
//!
//! Sluice provides an in-process producer/consumer channel with bounded or
//! unbounded capacity, configurable full-buffer policies, explicit completion,
//! and terminal-error propagation. A channel is completed exactly once by its
//! producer side, optionally carrying an error; readers drain every buffered
//! item before they observe the terminal outcome.
//!
//! Two channel flavors are offered:
//!
//! - [`mpmc`]: the general multi-writer/multi-reader channel. Handles are
//!   cloneable, and synchronous (thread-parking) and asynchronous
//!   (waker-based) handles interoperate on the same channel.
//! - [`spsc`]: a single-writer/single-reader fast path over a lock-free ring.
//!   The single-endpoint contract is enforced statically: the handles are not
//!   cloneable.
//!
//! [`pipeline`] contains the composition helpers for chaining channels into
//! multi-stage pipelines and fanning one reader out across worker tasks.

pub mod error;
pub mod mpmc;
pub mod pipeline;
pub mod policy;
pub mod spsc;
pub mod telemetry;

// Internal utilities - not part of public API but exposed for crate use
mod internal;

// Public re-exports for convenience
pub use error::{
  CloseError, CompleteError, Fault, ReadError, ReadTimeoutError, TryReadError, TryWriteError,
  WriteError, WriteTimeoutError,
};
pub use policy::FullPolicy;
