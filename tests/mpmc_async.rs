mod common;
use common::*;

use sluice::error::{ReadError, TryReadError, TryWriteError};
use sluice::mpmc;
use sluice::FullPolicy;

use futures_util::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn async_smoke() {
  let (tx, rx) = mpmc::bounded_async(4, FullPolicy::Wait);
  tx.write(10).await.unwrap();
  assert_eq!(rx.read().await.unwrap(), 10);
}

#[tokio::test]
async fn bounded_write_waits_for_reader() {
  let (tx, rx) = mpmc::bounded_async(1, FullPolicy::Wait);
  tx.write("a").await.unwrap();

  let writer_handle = tokio::spawn(async move {
    tx.write("b").await.unwrap();
  });

  tokio::time::sleep(std::time::Duration::from_millis(50)).await;
  assert_eq!(rx.read().await.unwrap(), "a");
  writer_handle.await.unwrap();
  assert_eq!(rx.read().await.unwrap(), "b");
}

#[tokio::test]
async fn dropped_write_future_leaves_channel_untouched() {
  let (tx, rx) = mpmc::bounded_async(1, FullPolicy::Wait);
  tx.write(1).await.unwrap();

  // The channel is full, so this future cannot complete in time. Dropping
  // it must not queue the item or disturb what is buffered.
  let attempt = tokio::time::timeout(std::time::Duration::from_millis(50), tx.write(2)).await;
  assert!(attempt.is_err());

  assert_eq!(tx.len(), 1);
  assert_eq!(rx.read().await.unwrap(), 1);
  assert!(matches!(rx.try_read(), Err(TryReadError::Empty)));
}

#[tokio::test]
async fn cancelled_write_passes_its_wake_to_the_next_writer() {
  let (tx, rx) = mpmc::bounded_async(1, FullPolicy::Wait);
  tx.write(1).await.unwrap();

  // Writer A parks on the full channel, then is cancelled while queued.
  let attempt = tokio::time::timeout(std::time::Duration::from_millis(50), tx.write(2)).await;
  assert!(attempt.is_err());

  // Writer B parks behind A's retired entry.
  let tx_b = tx.clone();
  let writer_b = tokio::spawn(async move {
    tx_b.write(3).await.unwrap();
  });
  tokio::time::sleep(std::time::Duration::from_millis(50)).await;

  // Freeing the slot must wake B even though A's entry is still queued
  // ahead of it.
  assert_eq!(rx.read().await.unwrap(), 1);
  let followup = tokio::time::timeout(SHORT_TIMEOUT, rx.read())
    .await
    .expect("waiting writer was never woken although a slot freed");
  assert_eq!(followup.unwrap(), 3);
  writer_b.await.unwrap();
}

#[tokio::test]
async fn cancelled_read_passes_its_wake_to_the_next_reader() {
  let (tx, rx) = mpmc::bounded_async(4, FullPolicy::Wait);

  // Reader A parks on the empty channel, then is cancelled while queued.
  let attempt = tokio::time::timeout(std::time::Duration::from_millis(50), rx.read()).await;
  assert!(attempt.is_err());

  let rx_b = rx.clone();
  let reader_b = tokio::spawn(async move { rx_b.read().await });
  tokio::time::sleep(std::time::Duration::from_millis(50)).await;

  tx.write(9).await.unwrap();
  let received = tokio::time::timeout(SHORT_TIMEOUT, reader_b)
    .await
    .expect("waiting reader was never woken although an item arrived")
    .unwrap();
  assert_eq!(received.unwrap(), 9);
}

#[tokio::test]
async fn closed_stream_view_stops_yielding() {
  let (tx, mut rx) = mpmc::unbounded_async::<u32>();
  tx.write(1).await.unwrap();
  tx.write(2).await.unwrap();

  assert_eq!(rx.next().await, Some(1));
  rx.close().unwrap();
  // The remaining item is off limits to this handle; its writers were just
  // told the channel closed.
  assert_eq!(rx.next().await, None);
  assert!(matches!(rx.try_read(), Err(TryReadError::EndOfStream)));
}

#[tokio::test]
async fn read_all_yields_items_then_fault() {
  let (tx, rx) = mpmc::unbounded_async::<u32>();
  for i in 0..3 {
    tx.write(i).await.unwrap();
  }
  let cause = fault("source died");
  tx.complete(Some(cause.clone())).unwrap();

  let collected: Vec<_> = rx.read_all().collect().await;
  assert_eq!(collected.len(), 4);
  for (i, entry) in collected.iter().take(3).enumerate() {
    assert_eq!(*entry.as_ref().unwrap(), i as u32);
  }
  match &collected[3] {
    Err(seen) => assert!(Arc::ptr_eq(seen, &cause)),
    Ok(_) => panic!("expected trailing fault"),
  }

  // A fresh stream replays the terminal outcome.
  assert!(matches!(rx.read_all().next().await, Some(Err(_))));
}

#[tokio::test]
async fn read_all_clean_completion_just_ends() {
  let (tx, rx) = mpmc::unbounded_async::<u32>();
  tx.write(1).await.unwrap();
  tx.write(2).await.unwrap();
  drop(tx);

  let collected: Vec<_> = rx.read_all().collect().await;
  assert_eq!(collected.len(), 2);
  assert!(collected.iter().all(|entry| entry.is_ok()));
}

#[tokio::test]
async fn reader_is_an_item_stream() {
  let (tx, rx) = mpmc::unbounded_async::<u32>();
  for i in 0..5 {
    tx.write(i).await.unwrap();
  }
  tx.complete(Some(fault("swallowed by the stream view"))).unwrap();

  // The Stream impl drops the terminal outcome.
  let items: Vec<u32> = rx.collect().await;
  assert_eq!(items, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn sync_writer_converts_to_async() {
  let (tx, rx) = mpmc::bounded::<i32>(4, FullPolicy::Wait);
  let rx = rx.to_async();

  let producer_handle = tokio::task::spawn_blocking(move || {
    tx.write(123).unwrap();
    let tx = tx.to_async();
    // The conversion preserves the handle; completion still works.
    tx.complete(None).unwrap();
  });

  assert_eq!(rx.read().await.unwrap(), 123);
  assert_eq!(rx.read().await, Err(ReadError::EndOfStream));
  producer_handle.await.unwrap();
}

#[tokio::test]
async fn writes_fail_after_completion() {
  let (tx, _rx) = mpmc::bounded_async(4, FullPolicy::Wait);
  tx.complete(None).unwrap();
  assert!(matches!(tx.try_write(1), Err(TryWriteError::Closed(1))));
  match tx.write(2).await {
    Err(sluice::WriteError::Closed(item)) => assert_eq!(item, 2),
    other => panic!("expected Closed, got {:?}", other),
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn multi_producer_multi_consumer_stress() {
  let (tx, rx) = mpmc::bounded_async(16, FullPolicy::Wait);
  let num_producers = 4;
  let num_consumers = 4;
  let total_items = num_producers * ITEMS_HIGH;
  let received = Arc::new(AtomicUsize::new(0));

  let mut producer_handles = Vec::new();
  for _ in 0..num_producers {
    let tx = tx.clone();
    producer_handles.push(tokio::spawn(async move {
      for i in 0..ITEMS_HIGH {
        tx.write(i).await.unwrap();
      }
    }));
  }
  drop(tx);

  let mut consumer_handles = Vec::new();
  for _ in 0..num_consumers {
    let rx = rx.clone();
    let received = received.clone();
    consumer_handles.push(tokio::spawn(async move {
      loop {
        match rx.read().await {
          Ok(_) => {
            received.fetch_add(1, Ordering::Relaxed);
          }
          Err(ReadError::EndOfStream) => return,
          Err(ReadError::Faulted(_)) => panic!("unexpected fault"),
        }
      }
    }));
  }
  drop(rx);

  for handle in producer_handles {
    handle.await.unwrap();
  }
  for handle in consumer_handles {
    handle.await.unwrap();
  }
  assert_eq!(received.load(Ordering::Relaxed), total_items);
}

#[tokio::test]
async fn every_reader_sees_the_same_fault() {
  let (tx, rx) = mpmc::unbounded_async::<u32>();
  let rx2 = rx.clone();
  let cause = fault("shared cause");
  tx.complete(Some(cause.clone())).unwrap();

  for reader in [rx, rx2] {
    match reader.read().await {
      Err(ReadError::Faulted(seen)) => assert!(Arc::ptr_eq(&seen, &cause)),
      other => panic!("expected Faulted, got {:?}", other),
    }
  }
}
