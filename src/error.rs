// src/error.rs

use core::fmt;
use std::sync::Arc;

/// The terminal error carried by a faulted channel.
///
/// The channel never inspects or interprets the error; it stores it once at
/// completion time and replays the same shared cause to every reader that
/// drains to the end of the stream.
pub type Fault = Arc<dyn std::error::Error + Send + Sync + 'static>;

// Helper macro for the write-side errors that hand the item back to the
// caller: generates `into_inner` plus the Display/Error impls.
macro_rules! impl_error_for_enum_with_inner {
    (
        $enum_name:ident < $generic_param:ident >,
        $($variant:ident ( $message:expr ) ),+
        $(,)?
    ) => {
        impl<$generic_param> $enum_name<$generic_param> {
            /// Consumes the error, returning the item that could not be written.
            #[inline]
            pub fn into_inner(self) -> $generic_param {
                match self {
                    $( $enum_name::$variant(v) => v, )+
                }
            }
        }

        impl<$generic_param> fmt::Display for $enum_name<$generic_param> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $( $enum_name::$variant(_) => f.write_str($message), )+
                }
            }
        }

        impl<$generic_param> fmt::Debug for $enum_name<$generic_param> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $( $enum_name::$variant(_) =>
                        write!(f, concat!(stringify!($enum_name), "::", stringify!($variant), "(..)")), )+
                }
            }
        }

        impl<$generic_param> std::error::Error for $enum_name<$generic_param> {}
    };
}

/// Error returned by `try_write` when the item could not be accepted
/// immediately. The rejected item is returned to the caller.
#[derive(PartialEq, Eq, Clone)]
pub enum TryWriteError<T> {
  /// The channel is bounded, at capacity, and the policy does not evict.
  /// Recoverable: retry later or fall back to a blocking/awaiting write.
  Full(T),
  /// Completion has begun, or every reader handle has been dropped. No write
  /// is ever queued once the channel starts completing.
  Closed(T),
}

impl_error_for_enum_with_inner!(
  TryWriteError<T>,
  Full("channel full"),
  Closed("channel closed"),
);

/// Error returned by blocking and awaiting `write` operations.
#[derive(PartialEq, Eq, Clone)]
pub enum WriteError<T> {
  /// Completion has begun or all readers are gone.
  Closed(T),
  /// The channel is at capacity under the `Fail` policy, which turns every
  /// write into a non-suspending attempt.
  Full(T),
}

impl_error_for_enum_with_inner!(
  WriteError<T>,
  Closed("channel closed"),
  Full("channel full"),
);

/// Error returned by `write_timeout`.
#[derive(PartialEq, Eq, Clone)]
pub enum WriteTimeoutError<T> {
  /// The deadline elapsed before space freed up. The item is handed back
  /// untouched; nothing was queued.
  Timeout(T),
  /// Completion has begun or all readers are gone.
  Closed(T),
  /// The channel is at capacity under the `Fail` policy.
  Full(T),
}

impl_error_for_enum_with_inner!(
  WriteTimeoutError<T>,
  Timeout("write timed out"),
  Closed("channel closed"),
  Full("channel full"),
);

/// Error returned by `try_read` when an item could not be received
/// immediately.
#[derive(Clone)]
pub enum TryReadError {
  /// The channel is temporarily empty but has not completed.
  Empty,
  /// The channel completed cleanly and every item has been drained. This is a
  /// sentinel outcome, not a failure.
  EndOfStream,
  /// The channel completed with an error and every item has been drained.
  Faulted(Fault),
}

/// Terminal outcome returned by blocking and awaiting `read` operations.
#[derive(Clone)]
pub enum ReadError {
  /// Clean end of stream: the channel completed and is fully drained.
  EndOfStream,
  /// The channel completed with an error and is fully drained. The carried
  /// cause is shared by every reader that reaches the end.
  Faulted(Fault),
}

/// Error returned by `read_timeout`.
#[derive(Clone)]
pub enum ReadTimeoutError {
  /// The deadline elapsed before an item arrived. No item was consumed.
  Timeout,
  /// Clean end of stream.
  EndOfStream,
  /// The channel completed with an error and is fully drained.
  Faulted(Fault),
}

impl ReadError {
  /// Returns `true` for the clean end-of-stream outcome.
  #[inline]
  pub fn is_end_of_stream(&self) -> bool {
    matches!(self, ReadError::EndOfStream)
  }

  /// Returns the carried fault, if the channel faulted.
  #[inline]
  pub fn fault(&self) -> Option<&Fault> {
    match self {
      ReadError::Faulted(fault) => Some(fault),
      ReadError::EndOfStream => None,
    }
  }
}

// The read-side errors carry a shared `Fault`, which has no meaningful
// structural equality. Two faulted outcomes compare equal when they carry the
// same cause, in the pointer-identity sense.
macro_rules! impl_read_error_traits {
    (
        $enum_name:ident,
        $( $plain:ident ( $message:expr ) ),*
        $(,)?
    ) => {
        impl PartialEq for $enum_name {
            fn eq(&self, other: &Self) -> bool {
                match (self, other) {
                    $( ($enum_name::$plain, $enum_name::$plain) => true, )*
                    ($enum_name::Faulted(a), $enum_name::Faulted(b)) => Arc::ptr_eq(a, b),
                    _ => false,
                }
            }
        }

        impl fmt::Debug for $enum_name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $( $enum_name::$plain =>
                        write!(f, concat!(stringify!($enum_name), "::", stringify!($plain))), )*
                    $enum_name::Faulted(cause) =>
                        write!(f, concat!(stringify!($enum_name), "::Faulted({})"), cause),
                }
            }
        }

        impl fmt::Display for $enum_name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $( $enum_name::$plain => f.write_str($message), )*
                    $enum_name::Faulted(cause) => write!(f, "channel faulted: {}", cause),
                }
            }
        }

        impl std::error::Error for $enum_name {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                match self {
                    $enum_name::Faulted(cause) => Some(&**cause),
                    _ => None,
                }
            }
        }
    };
}

impl_read_error_traits!(
  TryReadError,
  Empty("channel empty"),
  EndOfStream("channel completed"),
);

impl_read_error_traits!(ReadError, EndOfStream("channel completed"),);

impl_read_error_traits!(
  ReadTimeoutError,
  Timeout("read timed out"),
  EndOfStream("channel completed"),
);

/// Error returned when completion has already been requested. The first call
/// to `complete` wins; the terminal error it carried (or did not carry) is
/// the one every reader observes.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct CompleteError;
impl std::error::Error for CompleteError {}
impl fmt::Display for CompleteError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "channel completion already requested")
  }
}

/// Error returned when attempting to close an already closed handle.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct CloseError;
impl std::error::Error for CloseError {}
impl fmt::Display for CloseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "handle is already closed")
  }
}
