// Run with: cargo test --features sluice_telemetry --test telemetry
#![cfg(feature = "sluice_telemetry")]

use serial_test::serial;
use sluice::{mpmc, telemetry, FullPolicy};

// The collector is a process-wide global, so these tests must not interleave.

#[test]
#[serial]
fn lossy_policy_drops_are_counted() {
  telemetry::clear_telemetry();

  let (tx, _rx) = mpmc::bounded(1, FullPolicy::DropNewest);
  tx.write(1).unwrap();
  tx.write(2).unwrap();
  tx.write(3).unwrap();

  assert_eq!(telemetry::counter_value("mpmc::core", "items_dropped"), 2);
}

#[test]
#[serial]
fn completions_are_counted_once() {
  telemetry::clear_telemetry();

  let (tx, _rx) = mpmc::bounded::<u32>(1, FullPolicy::Wait);
  let tx2 = tx.clone();
  tx.complete(None).unwrap();
  assert!(tx2.complete(None).is_err());

  assert_eq!(telemetry::counter_value("mpmc::core", "completions"), 1);
}
