use sluice::error::Fault;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const SHORT_TIMEOUT: Duration = Duration::from_millis(500);
pub const LONG_TIMEOUT: Duration = Duration::from_secs(3);
pub const ITEMS_LOW: usize = 50;
pub const ITEMS_HIGH: usize = 1000;

/// Minimal error type for driving the fault paths in tests.
#[derive(Debug)]
pub struct StageFailure(pub &'static str);

impl fmt::Display for StageFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "stage failure: {}", self.0)
  }
}

impl std::error::Error for StageFailure {}

pub fn fault(msg: &'static str) -> Fault {
  Arc::new(StageFailure(msg))
}
