mod common;
use common::*;

use sluice::error::ReadError;
use sluice::pipeline::{fan_out, run_stage};
use sluice::{mpmc, FullPolicy};

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn single_stage_transforms_in_order() {
  let (src_tx, src_rx) = mpmc::bounded_async(4, FullPolicy::Wait);
  let (out_tx, out_rx) = mpmc::bounded_async(4, FullPolicy::Wait);

  let stage_handle = tokio::spawn(run_stage(src_rx, out_tx, |n: u32| async move {
    Ok(n * 10)
  }));

  for i in 0..5 {
    src_tx.write(i).await.unwrap();
  }
  src_tx.complete(None).unwrap();

  for i in 0..5 {
    assert_eq!(out_rx.read().await.unwrap(), i * 10);
  }
  assert_eq!(out_rx.read().await, Err(ReadError::EndOfStream));
  stage_handle.await.unwrap();
}

#[tokio::test]
async fn stages_chain_and_faults_flow_downstream() {
  let (src_tx, src_rx) = mpmc::bounded_async(4, FullPolicy::Wait);
  let (mid_tx, mid_rx) = mpmc::bounded_async(4, FullPolicy::Wait);
  let (out_tx, out_rx) = mpmc::bounded_async(4, FullPolicy::Wait);

  let first = tokio::spawn(run_stage(src_rx, mid_tx, |n: u32| async move {
    Ok(n + 1)
  }));
  let second = tokio::spawn(run_stage(mid_rx, out_tx, |n: u32| async move {
    Ok(n * 2)
  }));

  src_tx.write(1).await.unwrap();
  src_tx.write(2).await.unwrap();
  let cause = fault("upstream fault");
  src_tx.complete(Some(cause.clone())).unwrap();

  assert_eq!(out_rx.read().await.unwrap(), 4);
  assert_eq!(out_rx.read().await.unwrap(), 6);
  // The original cause crosses both stages untouched.
  match out_rx.read().await {
    Err(ReadError::Faulted(seen)) => assert!(Arc::ptr_eq(&seen, &cause)),
    other => panic!("expected Faulted, got {:?}", other),
  }

  first.await.unwrap();
  second.await.unwrap();
}

#[tokio::test]
async fn transform_error_completes_downstream_with_fault() {
  let (src_tx, src_rx) = mpmc::bounded_async(4, FullPolicy::Wait);
  let (out_tx, out_rx) = mpmc::bounded_async::<u32>(4, FullPolicy::Wait);

  let cause = fault("bad item");
  let cause_for_stage = cause.clone();
  let stage_handle = tokio::spawn(run_stage(src_rx, out_tx, move |n: u32| {
    let cause = cause_for_stage.clone();
    async move {
      if n == 3 {
        Err(cause)
      } else {
        Ok(n)
      }
    }
  }));

  for i in 0..5 {
    src_tx.write(i).await.unwrap();
  }

  assert_eq!(out_rx.read().await.unwrap(), 0);
  assert_eq!(out_rx.read().await.unwrap(), 1);
  assert_eq!(out_rx.read().await.unwrap(), 2);
  match out_rx.read().await {
    Err(ReadError::Faulted(seen)) => assert!(Arc::ptr_eq(&seen, &cause)),
    other => panic!("expected Faulted, got {:?}", other),
  }
  stage_handle.await.unwrap();
}

#[tokio::test]
async fn stage_stops_when_downstream_closes() {
  let (src_tx, src_rx) = mpmc::bounded_async(2, FullPolicy::Wait);
  let (out_tx, out_rx) = mpmc::bounded_async::<u32>(2, FullPolicy::Wait);

  let stage_handle = tokio::spawn(run_stage(src_rx, out_tx, |n: u32| async move { Ok(n) }));

  src_tx.write(1).await.unwrap();
  assert_eq!(out_rx.read().await.unwrap(), 1);
  drop(out_rx);

  // With no downstream reader the stage returns instead of spinning.
  src_tx.write(2).await.unwrap();
  src_tx.write(3).await.unwrap();
  stage_handle.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fan_out_handles_every_item_exactly_once() {
  let (tx, rx) = mpmc::bounded_async(16, FullPolicy::Wait);

  let seen = Arc::new(Mutex::new(HashSet::new()));
  let handled = Arc::new(AtomicUsize::new(0));
  let seen_for_handler = seen.clone();
  let handled_for_handler = handled.clone();

  let workers = tokio::spawn(fan_out(rx, 4, move |item: usize| {
    let seen = seen_for_handler.clone();
    let handled = handled_for_handler.clone();
    async move {
      assert!(seen.lock().unwrap().insert(item), "duplicate delivery");
      handled.fetch_add(1, Ordering::Relaxed);
    }
  }));

  for i in 0..ITEMS_HIGH {
    tx.write(i).await.unwrap();
  }
  drop(tx);

  workers.await.unwrap().unwrap();
  assert_eq!(handled.load(Ordering::Relaxed), ITEMS_HIGH);
  assert_eq!(seen.lock().unwrap().len(), ITEMS_HIGH);
}

#[tokio::test]
async fn fan_out_surfaces_the_channel_fault() {
  let (tx, rx) = mpmc::unbounded_async::<u32>();
  tx.write(1).await.unwrap();
  let cause = fault("fan-out fault");
  tx.complete(Some(cause.clone())).unwrap();

  let outcome = fan_out(rx, 3, |_item| async {}).await;
  match outcome {
    Err(seen) => assert!(Arc::ptr_eq(&seen, &cause)),
    Ok(()) => panic!("expected the fault to surface"),
  }
}
