//! `PostgresPinQueue` against a real server.

use std::time::Duration;

use super::helpers::TestDatabase;
use pinboard::execution::{adapters::postgres::PostgresPinQueue, ports::PinQueue};
use pinboard::pin::domain::PinId;
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deliveries_come_out_in_order() {
    let Some(database) = TestDatabase::provision().expect("provision") else {
        return;
    };
    let queue = PostgresPinQueue::new(database.pool());
    let first = PinId::new();
    let second = PinId::new();

    queue.enqueue(first).await.expect("enqueue");
    queue.enqueue(second).await.expect("enqueue");

    let wait = Duration::from_millis(50);
    assert_eq!(queue.dequeue(wait).await.expect("dequeue"), Some(first));
    assert_eq!(queue.dequeue(wait).await.expect("dequeue"), Some(second));
    assert_eq!(queue.dequeue(wait).await.expect("dequeue"), None);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn competing_consumers_each_take_one_delivery() {
    let Some(database) = TestDatabase::provision().expect("provision") else {
        return;
    };
    let queue = PostgresPinQueue::new(database.pool());
    let pin_id = PinId::new();
    queue.enqueue(pin_id).await.expect("enqueue");

    let wait = Duration::from_millis(200);
    let (left, right) = tokio::join!(queue.dequeue(wait), queue.dequeue(wait));
    let delivered: Vec<PinId> = [left, right]
        .into_iter()
        .filter_map(|outcome| outcome.expect("dequeue"))
        .collect();

    assert_eq!(delivered, vec![pin_id]);
}
