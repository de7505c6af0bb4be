mod common;
use common::*;

use sluice::error::{ReadError, ReadTimeoutError, TryReadError, TryWriteError, WriteTimeoutError};
use sluice::mpmc;
use sluice::FullPolicy;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn sync_smoke_fifo() {
  let (tx, rx) = mpmc::bounded(8, FullPolicy::Wait);
  for i in 0..5 {
    tx.write(i).unwrap();
  }
  for i in 0..5 {
    assert_eq!(rx.read().unwrap(), i);
  }
}

#[test]
fn try_ops_report_full_and_empty() {
  let (tx, rx) = mpmc::bounded(1, FullPolicy::Wait);
  assert!(matches!(rx.try_read(), Err(TryReadError::Empty)));
  tx.try_write(1).unwrap();
  assert!(matches!(tx.try_write(2), Err(TryWriteError::Full(2))));
  assert_eq!(rx.try_read().unwrap(), 1);
}

#[test]
fn blocked_writer_unblocks_on_read() {
  let (tx, rx) = mpmc::bounded(2, FullPolicy::Wait);
  tx.write("a").unwrap();
  tx.write("b").unwrap();

  let writer_handle = thread::spawn(move || {
    // Buffer is full; this parks until the main thread reads.
    tx.write("c").unwrap();
  });

  thread::sleep(Duration::from_millis(50));
  assert_eq!(rx.read().unwrap(), "a");

  writer_handle.join().unwrap();
  assert_eq!(rx.read().unwrap(), "b");
  assert_eq!(rx.read().unwrap(), "c");
}

#[test]
fn drop_oldest_evicts_head() {
  let (tx, rx) = mpmc::bounded(1, FullPolicy::DropOldest);
  tx.write(1).unwrap();
  tx.write(2).unwrap();
  tx.write(3).unwrap();
  // Only the most recent write survives.
  assert_eq!(rx.read().unwrap(), 3);
  assert!(matches!(rx.try_read(), Err(TryReadError::Empty)));
}

#[test]
fn drop_newest_discards_incoming() {
  let (tx, rx) = mpmc::bounded(2, FullPolicy::DropNewest);
  tx.write(1).unwrap();
  tx.write(2).unwrap();
  tx.write(3).unwrap();
  assert_eq!(rx.read().unwrap(), 1);
  assert_eq!(rx.read().unwrap(), 2);
  assert!(matches!(rx.try_read(), Err(TryReadError::Empty)));
}

#[test]
fn fail_policy_surfaces_full_from_blocking_write() {
  let (tx, rx) = mpmc::bounded(1, FullPolicy::Fail);
  tx.write(1).unwrap();
  match tx.write(2) {
    Err(sluice::WriteError::Full(item)) => assert_eq!(item, 2),
    other => panic!("expected Full, got {:?}", other),
  }
  assert_eq!(rx.read().unwrap(), 1);
}

#[test]
fn write_timeout_returns_item_and_leaves_channel_untouched() {
  let (tx, rx) = mpmc::bounded(1, FullPolicy::Wait);
  tx.write(10).unwrap();

  match tx.write_timeout(20, Duration::from_millis(20)) {
    Err(WriteTimeoutError::Timeout(item)) => assert_eq!(item, 20),
    other => panic!("expected Timeout, got {:?}", other),
  }

  // The timed-out write queued nothing.
  assert_eq!(tx.len(), 1);
  assert_eq!(rx.read().unwrap(), 10);
  assert!(matches!(rx.try_read(), Err(TryReadError::Empty)));
}

#[test]
fn read_timeout_consumes_nothing() {
  let (tx, rx) = mpmc::bounded::<u32>(4, FullPolicy::Wait);
  assert!(matches!(
    rx.read_timeout(Duration::from_millis(20)),
    Err(ReadTimeoutError::Timeout)
  ));
  tx.write(5).unwrap();
  assert_eq!(rx.read_timeout(SHORT_TIMEOUT).unwrap(), 5);
}

#[test]
fn completion_is_first_wins_and_terminal_state_is_stable() {
  let (tx, rx) = mpmc::bounded::<u32>(4, FullPolicy::Wait);
  let tx2 = tx.clone();

  assert!(tx.complete(None).is_ok());
  // The losing completion changes nothing, fault or not.
  assert!(tx2.complete(Some(fault("too late"))).is_err());

  assert!(matches!(tx.try_write(1), Err(TryWriteError::Closed(1))));
  assert_eq!(rx.read(), Err(ReadError::EndOfStream));
  // Terminal outcome repeats on every subsequent read.
  assert_eq!(rx.read(), Err(ReadError::EndOfStream));
}

#[test]
fn buffered_items_drain_before_fault() {
  let (tx, rx) = mpmc::unbounded::<u32>();
  for i in 0..3 {
    tx.write(i).unwrap();
  }
  let cause = fault("upstream exploded");
  tx.complete(Some(cause.clone())).unwrap();

  for i in 0..3 {
    assert_eq!(rx.read().unwrap(), i);
  }
  match rx.read() {
    Err(ReadError::Faulted(seen)) => assert!(Arc::ptr_eq(&seen, &cause)),
    other => panic!("expected Faulted, got {:?}", other),
  }
  // The fault replays, it does not get consumed.
  assert!(matches!(rx.read(), Err(ReadError::Faulted(_))));
}

#[test]
fn drain_iterator_ends_with_fault() {
  let (tx, rx) = mpmc::unbounded::<u32>();
  tx.write(1).unwrap();
  tx.write(2).unwrap();
  tx.complete(Some(fault("boom"))).unwrap();

  let collected: Vec<_> = rx.drain().collect();
  assert_eq!(collected.len(), 3);
  assert_eq!(*collected[0].as_ref().unwrap(), 1);
  assert_eq!(*collected[1].as_ref().unwrap(), 2);
  assert!(collected[2].is_err());

  // A fresh drain replays the terminal outcome.
  let mut again = rx.drain();
  assert!(matches!(again.next(), Some(Err(_))));
  assert!(again.next().is_none());
}

#[test]
fn last_writer_drop_completes_cleanly() {
  let (tx, rx) = mpmc::bounded(4, FullPolicy::Wait);
  let tx2 = tx.clone();
  tx.write(7).unwrap();
  drop(tx);
  // One writer remains; the channel is still open.
  assert!(!tx2.is_closed());
  drop(tx2);

  assert_eq!(rx.read().unwrap(), 7);
  assert_eq!(rx.read(), Err(ReadError::EndOfStream));
}

#[test]
fn last_reader_drop_fails_blocked_writer() {
  let (tx, rx) = mpmc::bounded(1, FullPolicy::Wait);
  tx.write(1).unwrap();

  let writer_handle = thread::spawn(move || tx.write(2));

  thread::sleep(Duration::from_millis(50));
  drop(rx);

  match writer_handle.join().unwrap() {
    Err(sluice::WriteError::Closed(item)) => assert_eq!(item, 2),
    other => panic!("expected Closed, got {:?}", other),
  }
}

#[test]
fn reader_close_is_explicit_and_idempotent() {
  let (tx, rx) = mpmc::bounded::<u32>(4, FullPolicy::Wait);
  tx.write(1).unwrap();
  assert!(rx.close().is_ok());
  assert!(rx.close().is_err());
  assert!(matches!(rx.try_read(), Err(TryReadError::EndOfStream)));
  assert!(matches!(tx.try_write(2), Err(TryWriteError::Closed(2))));
}

#[test]
fn introspection_reports_capacity_and_len() {
  let (tx, rx) = mpmc::bounded::<u32>(2, FullPolicy::DropOldest);
  assert_eq!(tx.capacity(), Some(2));
  assert_eq!(rx.policy(), FullPolicy::DropOldest);
  assert!(tx.is_empty());
  tx.write(1).unwrap();
  tx.write(2).unwrap();
  assert!(rx.is_full());
  assert_eq!(rx.len(), 2);

  let (utx, _urx) = mpmc::unbounded::<u32>();
  assert_eq!(utx.capacity(), None);
  assert!(!utx.is_full());
}

#[test]
fn bounded_len_never_exceeds_capacity_under_contention() {
  const CAPACITY: usize = 8;
  let (tx, rx) = mpmc::bounded(CAPACITY, FullPolicy::Wait);

  let mut writer_handles = Vec::new();
  for _ in 0..4 {
    let tx = tx.clone();
    writer_handles.push(thread::spawn(move || {
      for i in 0..ITEMS_LOW {
        tx.write(i).unwrap();
      }
    }));
  }
  drop(tx);

  // Sample the advisory length while writers contend on the bound.
  let sampler_rx = rx.clone();
  let sampler = thread::spawn(move || {
    loop {
      let len = sampler_rx.len();
      assert!(len <= CAPACITY, "len {} exceeded capacity {}", len, CAPACITY);
      if sampler_rx.is_closed() {
        return;
      }
      thread::yield_now();
    }
  });

  let mut count = 0usize;
  for entry in rx.drain() {
    entry.unwrap();
    count += 1;
  }
  assert_eq!(count, 4 * ITEMS_LOW);

  for handle in writer_handles {
    handle.join().unwrap();
  }
  sampler.join().unwrap();
}

#[test]
fn multi_reader_items_delivered_exactly_once() {
  let (tx, rx) = mpmc::unbounded::<usize>();
  let mut handles = Vec::new();
  for _ in 0..4 {
    let rx = rx.clone();
    handles.push(thread::spawn(move || {
      let mut sum = 0usize;
      loop {
        match rx.read() {
          Ok(item) => sum += item,
          Err(ReadError::EndOfStream) => return sum,
          Err(ReadError::Faulted(_)) => panic!("unexpected fault"),
        }
      }
    }));
  }
  drop(rx);

  for i in 1..=ITEMS_HIGH {
    tx.write(i).unwrap();
  }
  drop(tx);

  let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
  assert_eq!(total, ITEMS_HIGH * (ITEMS_HIGH + 1) / 2);
}
