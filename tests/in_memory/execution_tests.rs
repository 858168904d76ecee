//! End-to-end scheduling and execution over the in-memory adapters.

use std::sync::Arc;

use crate::test_helpers::{Engine, MAX_ROWS, TARGET_URL, test_settings};
use chrono::TimeDelta;
use pinboard::execution::{
    adapters::memory::ScriptedResponse,
    ports::PinQueue,
    services::{ExecutionReport, PinExecutionError},
};
use pinboard::pin::{
    domain::{Pin, PinResults, messages},
    services::CreatePinRequest,
};
use pinboard::target::{
    domain::{Target, TargetUrl},
    services::CreateTargetRequest,
};
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use tokio::sync::watch;

#[fixture]
fn engine() -> Engine {
    Engine::new(test_settings())
}

async fn warehouse(engine: &Engine) -> Target {
    engine
        .targets
        .create(CreateTargetRequest::new("warehouse", TARGET_URL))
        .await
        .expect("target create should succeed")
}

async fn pinned(engine: &Engine, target: &Target, name: &str, query: &str) -> Pin {
    engine
        .pins
        .create(CreatePinRequest::new(target.id(), name, query))
        .await
        .expect("pin create should succeed")
}

async fn stored(engine: &Engine, pin: &Pin) -> Pin {
    engine
        .pins
        .get_live(pin.id())
        .await
        .expect("pin should still exist")
}

fn rows(count: usize) -> Vec<Vec<Value>> {
    (0..count).map(|index| vec![json!(index)]).collect()
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn new_pin_runs_then_waits_for_the_scheduler(engine: Engine) {
    let target = warehouse(&engine).await;
    let pin = pinned(&engine, &target, "totals", "select sum(amount) from orders").await;
    engine
        .runner
        .respond(
            "select sum(amount) from orders",
            ScriptedResponse::rows(["sum"], vec![vec![json!("1250.00")]]),
        )
        .expect("script");

    let first = engine.worker.run_once().await.expect("first run");
    assert!(matches!(first, Some(ExecutionReport::Committed(_))));
    assert!(
        engine
            .worker
            .run_once()
            .await
            .expect("idle poll")
            .is_none(),
        "a freshly run pin is not claimable again"
    );

    engine.clock.advance(TimeDelta::minutes(21));
    let tick = engine.scheduler.tick().await.expect("tick");
    assert_eq!(tick.enqueued, vec![pin.id()]);
    let delivered = engine
        .queue
        .dequeue(std::time::Duration::from_millis(10))
        .await
        .expect("dequeue")
        .expect("scheduled pin should be queued");
    let second = engine
        .worker
        .on_message(delivered)
        .await
        .expect("queued run");

    assert!(matches!(second, Some(ExecutionReport::Committed(_))));
    assert_eq!(engine.runner.calls().expect("calls").len(), 2);
    let after = stored(&engine, &pin).await;
    assert_eq!(
        after.results().and_then(PinResults::rows),
        Some(&[vec![json!("1250.00")]][..])
    );
    assert!(after.reserved_at().is_none());
}

#[rstest]
#[case::at_cap(MAX_ROWS, None)]
#[case::over_cap(MAX_ROWS + 1, Some(messages::TOO_MANY_ROWS))]
#[tokio::test(flavor = "multi_thread")]
async fn row_cap_is_inclusive(
    engine: Engine,
    #[case] row_count: usize,
    #[case] expected_error: Option<&str>,
) {
    let target = warehouse(&engine).await;
    let pin = pinned(&engine, &target, "capped", "select n from numbers").await;
    engine
        .runner
        .respond(
            "select n from numbers",
            ScriptedResponse::rows(["n"], rows(row_count)),
        )
        .expect("script");

    engine.worker.run_once().await.expect("execution");
    let after = stored(&engine, &pin).await;
    let results = after.results().expect("results recorded");

    assert_eq!(results.error_message(), expected_error);
    if expected_error.is_none() {
        assert_eq!(results.rows().map(<[_]>::len), Some(MAX_ROWS));
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unreachable_target_is_recorded_on_the_pin(engine: Engine) {
    let target = warehouse(&engine).await;
    let pin = pinned(&engine, &target, "remote", "select 1").await;
    engine
        .runner
        .refuse_connections_to(&TargetUrl::new(TARGET_URL).expect("url should be valid"))
        .expect("script");

    engine.worker.run_once().await.expect("execution");

    let after = stored(&engine, &pin).await;
    assert_eq!(
        after.results(),
        Some(&PinResults::error(messages::CONNECTION_FAILED))
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn repeated_deliveries_execute_once(engine: Engine) {
    let target = warehouse(&engine).await;
    let pin = pinned(&engine, &target, "dupes", "select 1").await;
    engine
        .runner
        .respond("select 1", ScriptedResponse::rows(["?column?"], rows(1)))
        .expect("script");
    for _ in 0..3 {
        engine.queue.enqueue(pin.id()).await.expect("enqueue");
    }

    let mut committed = 0;
    while let Some(delivered) = engine
        .queue
        .dequeue(std::time::Duration::from_millis(10))
        .await
        .expect("dequeue")
    {
        if engine
            .worker
            .on_message(delivered)
            .await
            .expect("delivery")
            .is_some()
        {
            committed += 1;
        }
    }

    assert_eq!(committed, 1);
    assert_eq!(engine.runner.calls().expect("calls").len(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn abandoned_reservation_is_taken_over_after_timeout(engine: Engine) {
    let target = warehouse(&engine).await;
    let pin = pinned(&engine, &target, "orphan", "select 1").await;
    engine
        .runner
        .respond("select 1", ScriptedResponse::rows(["?column?"], rows(1)))
        .expect("script");

    let orphaned = engine
        .worker
        .claim_next()
        .await
        .expect("claim")
        .expect("pin should be claimable");
    assert_eq!(orphaned.pin().id(), pin.id());
    assert!(engine.worker.claim(pin.id()).await.expect("claim").is_none());

    engine.clock.advance(TimeDelta::minutes(6));
    let report = engine.worker.run_once().await.expect("takeover");

    assert!(matches!(report, Some(ExecutionReport::Committed(_))));
    assert!(stored(&engine, &pin).await.reserved_at().is_none());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn runner_fault_leaves_no_outcome(engine: Engine) {
    let target = warehouse(&engine).await;
    let pin = pinned(&engine, &target, "faulty", "select 1").await;
    engine
        .runner
        .respond("select 1", ScriptedResponse::Fault("pool exhausted".to_owned()))
        .expect("script");

    let err = engine
        .worker
        .run_once()
        .await
        .expect_err("runtime faults abort the execution");

    assert!(matches!(err, PinExecutionError::Runner(_)));
    let after = stored(&engine, &pin).await;
    assert!(after.results().is_none());
    assert!(after.query_started_at().is_some());
    assert!(after.reserved_at().is_none());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn scheduler_skips_recent_pins(engine: Engine) {
    let target = warehouse(&engine).await;
    let pin = pinned(&engine, &target, "fresh", "select 1").await;
    let before = stored(&engine, &pin).await;

    let report = engine.scheduler.tick().await.expect("tick");

    assert!(report.is_empty());
    assert_eq!(stored(&engine, &pin).await, before);
    assert!(engine.queue.drain().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn worker_service_drains_queue_until_shutdown() {
    let engine = Engine::new(test_settings());
    let target = warehouse(&engine).await;
    let first = pinned(&engine, &target, "one", "select 1").await;
    let second = pinned(&engine, &target, "two", "select 2").await;
    engine
        .runner
        .respond("select 1", ScriptedResponse::rows(["a"], rows(1)))
        .expect("script");
    engine
        .runner
        .respond("select 2", ScriptedResponse::rows(["b"], rows(2)))
        .expect("script");
    engine.queue.enqueue(first.id()).await.expect("enqueue");

    let Engine {
        worker,
        pins,
        runner,
        ..
    } = engine;
    let (stop, shutdown) = watch::channel(false);
    let service = tokio::spawn(Arc::new(worker).run(shutdown));

    let mut attempts = 0;
    while runner.calls().expect("calls").len() < 2 && attempts < 200 {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        attempts += 1;
    }
    stop.send(true).expect("service should still be listening");
    service.await.expect("service should stop cleanly");

    for pin in [first, second] {
        let after = pins.get_live(pin.id()).await.expect("pin should exist");
        assert!(after.results().is_some(), "{} should have run", pin.name());
        assert!(after.reserved_at().is_none());
    }
}
