//! The worker driving real registry, queue, and runner adapters.

use std::time::Duration;

use super::helpers::TestDatabase;
use pinboard::execution::{
    domain::{ExecutionSettings, QueryLimits},
    services::ExecutionReport,
};
use pinboard::pin::{domain::PinResults, services::CreatePinRequest};
use pinboard::target::services::CreateTargetRequest;
use rstest::{fixture, rstest};
use serde_json::json;

#[fixture]
fn settings() -> ExecutionSettings {
    ExecutionSettings {
        limits: QueryLimits {
            connect_timeout: Duration::from_secs(5),
            statement_timeout: Duration::from_secs(5),
            max_rows: 10,
        },
        ..ExecutionSettings::default()
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn delivered_pin_commits_results_and_releases_its_reservation(
    settings: ExecutionSettings,
) {
    let Some(database) = TestDatabase::provision().expect("provision") else {
        return;
    };
    let registries = database.registries();
    let target = registries
        .targets
        .create(CreateTargetRequest::new("registry", database.url()))
        .await
        .expect("target create should succeed");
    let pin = registries
        .pins
        .create(CreatePinRequest::new(
            target.id(),
            "pin-count",
            "select count(*) from pins",
        ))
        .await
        .expect("pin create should succeed");
    let worker = database.worker(settings);

    let report = worker
        .on_message(pin.id())
        .await
        .expect("execution should succeed");
    assert!(matches!(report, Some(ExecutionReport::Committed(_))));

    let stored = registries
        .pins
        .get_live(pin.id())
        .await
        .expect("pin should still exist");
    assert_eq!(stored.reserved_at(), None);
    assert_eq!(stored.version().value(), 5);
    assert_eq!(
        stored.results(),
        Some(&PinResults::Rows {
            fields: vec!["count".to_owned()],
            rows: vec![vec![json!(1)]],
        })
    );
    let started = stored.query_started_at().expect("start should be recorded");
    let finished = stored.query_finished_at().expect("finish should be recorded");
    assert!(finished >= started);

    let again = worker
        .on_message(pin.id())
        .await
        .expect("redelivery should not fail");
    assert!(again.is_none());
}
