//! Registry behaviour observed through the public services.

use crate::test_helpers::{Engine, TARGET_URL, test_settings};
use pinboard::error::{ErrorKind, RegistryFailure, codes};
use pinboard::pin::{domain::PinQuery, ports::PinFilter, services::CreatePinRequest};
use pinboard::target::{ports::TargetFilter, services::CreateTargetRequest};
use rstest::{fixture, rstest};

#[fixture]
fn engine() -> Engine {
    Engine::new(test_settings())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn target_lifecycle_follows_pin_references(engine: Engine) {
    let target = engine
        .targets
        .create(CreateTargetRequest::new("warehouse", TARGET_URL))
        .await
        .expect("target create should succeed");
    let pin = engine
        .pins
        .create(CreatePinRequest::new(target.id(), "orders", "select 1"))
        .await
        .expect("pin create should succeed");

    let blocked = engine
        .targets
        .soft_delete(target.id())
        .await
        .expect_err("target with live pins should not be deleted");
    assert_eq!(blocked.code(), codes::REMOVING_DB_WITH_PINS);
    assert_eq!(blocked.kind(), ErrorKind::Conflict);

    engine
        .pins
        .soft_delete(pin.id())
        .await
        .expect("pin delete should succeed");
    let deleted = engine
        .targets
        .soft_delete(target.id())
        .await
        .expect("target delete should succeed once its pins are gone");
    assert!(deleted.is_deleted());

    let reused = engine
        .targets
        .create(CreateTargetRequest::new("warehouse", TARGET_URL))
        .await
        .expect("deleted names should be reusable");
    assert_ne!(reused.id(), target.id());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn lookups_accept_identifier_or_name(engine: Engine) {
    let target = engine
        .targets
        .create(CreateTargetRequest::new("reporting", TARGET_URL))
        .await
        .expect("target create should succeed");
    let pin = engine
        .pins
        .create(CreatePinRequest::new(target.id(), "signups", "select 2"))
        .await
        .expect("pin create should succeed");

    let by_id = engine
        .pins
        .get(&pin.id().to_string())
        .await
        .expect("lookup by id should succeed");
    let by_name = engine
        .pins
        .get("signups")
        .await
        .expect("lookup by name should succeed");
    assert_eq!(by_id, by_name);

    let found = engine
        .targets
        .get("reporting")
        .await
        .expect("target lookup should succeed");
    assert_eq!(found.url().expose(), TARGET_URL);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn racing_edits_from_one_copy_produce_one_winner(engine: Engine) {
    let target = engine
        .targets
        .create(CreateTargetRequest::new("shared", TARGET_URL))
        .await
        .expect("target create should succeed");
    let pin = engine
        .pins
        .create(CreatePinRequest::new(target.id(), "racy", "select 1"))
        .await
        .expect("pin create should succeed");

    let mut first = pin.clone();
    first.set_query(PinQuery::new("select 10").expect("query should be valid"));
    let mut second = pin;
    second.set_query(PinQuery::new("select 20").expect("query should be valid"));

    let (left, right) = tokio::join!(engine.pins.update(first), engine.pins.update(second));
    let outcomes = [left, right];
    let winners = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    let losers: Vec<_> = outcomes
        .iter()
        .filter_map(|outcome| outcome.as_ref().err())
        .collect();

    assert_eq!(winners, 1);
    assert_eq!(losers.len(), 1);
    assert!(
        losers
            .iter()
            .all(|err| err.code() == codes::PIN_CONCURRENT_UPDATE)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn listings_hide_deleted_entries(engine: Engine) {
    let target = engine
        .targets
        .create(CreateTargetRequest::new("listing", TARGET_URL))
        .await
        .expect("target create should succeed");
    for name in ["alpha", "beta", "gamma"] {
        engine
            .pins
            .create(CreatePinRequest::new(target.id(), name, "select 1"))
            .await
            .expect("pin create should succeed");
    }
    let beta = engine.pins.get("beta").await.expect("beta should exist");
    engine
        .pins
        .soft_delete(beta.id())
        .await
        .expect("pin delete should succeed");

    let filter = PinFilter {
        target_id: Some(target.id()),
        ..PinFilter::default()
    };
    let live = engine.pins.list(&filter).await.expect("list should succeed");
    let names: Vec<&str> = live.iter().map(|pin| pin.name().as_str()).collect();
    assert_eq!(names.len(), 2);
    assert!(!names.contains(&"beta"));

    let targets = engine
        .targets
        .list(&TargetFilter::default())
        .await
        .expect("target list should succeed");
    assert_eq!(targets.len(), 1);
}
