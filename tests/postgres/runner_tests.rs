//! `PostgresQueryRunner` against a real server.

use std::time::Duration;

use super::helpers::TestDatabase;
use pinboard::execution::{
    adapters::postgres::PostgresQueryRunner,
    domain::{QueryLimits, QueryRunError, classify},
    ports::QueryRunner,
};
use pinboard::pin::domain::{PinQuery, PinResults, messages};
use pinboard::target::domain::TargetUrl;
use rstest::rstest;
use serde_json::json;

const LIMITS: QueryLimits = QueryLimits {
    connect_timeout: Duration::from_secs(5),
    statement_timeout: Duration::from_secs(5),
    max_rows: 3,
};

async fn run(
    database: &TestDatabase,
    sql: &str,
    limits: QueryLimits,
) -> Result<PinResults, QueryRunError> {
    let url = TargetUrl::new(database.url()).expect("url should be valid");
    let query = PinQuery::new(sql).expect("query should be valid");
    classify(PostgresQueryRunner::new().run(&url, &query, limits).await)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn aggregate_returns_named_column() {
    let Some(database) = TestDatabase::provision().expect("provision") else {
        return;
    };

    let results = run(&database, "select count(*) from pins", LIMITS)
        .await
        .expect("runner should not fault");

    assert_eq!(
        results,
        PinResults::Rows {
            fields: vec!["count".to_owned()],
            rows: vec![vec![json!(0)]],
        }
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn url_session_options_survive_the_statement_timeout() {
    let Some(database) = TestDatabase::provision().expect("provision") else {
        return;
    };

    let results = run(
        &database,
        "select current_schema() as schema, current_setting('statement_timeout') as timeout",
        LIMITS,
    )
    .await
    .expect("runner should not fault");

    assert_eq!(
        results.rows(),
        Some(&[vec![json!(database.schema()), json!("5s")]][..])
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn values_keep_their_json_shape() {
    let Some(database) = TestDatabase::provision().expect("provision") else {
        return;
    };

    let results = run(
        &database,
        "select 1::int4 as a, 'x'::text as b, true as c, null::int8 as d, 12.50::numeric as e",
        LIMITS,
    )
    .await
    .expect("runner should not fault");

    assert_eq!(
        results.rows(),
        Some(&[vec![json!(1), json!("x"), json!(true), json!(null), json!("12.50")]][..])
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn types_without_native_json_render_as_server_text() {
    let Some(database) = TestDatabase::provision().expect("provision") else {
        return;
    };

    let results = run(
        &database,
        "select interval '1 day', '127.0.0.1'::inet, '10.0.0.0/8'::cidr, \
         '08:00:2b:01:02:03'::macaddr, 12.5::money, interval '-1 mon 2 days 03:04:05.5'",
        LIMITS,
    )
    .await
    .expect("runner should not fault");

    assert_eq!(
        results.rows(),
        Some(
            &[vec![
                json!("1 day"),
                json!("127.0.0.1"),
                json!("10.0.0.0/8"),
                json!("08:00:2b:01:02:03"),
                json!("$12.50"),
                json!("-1 mons +2 days 03:04:05.5"),
            ]][..]
        )
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn several_statements_are_rejected_by_the_server() {
    let Some(database) = TestDatabase::provision().expect("provision") else {
        return;
    };

    let results = run(&database, "select 1; select 2", LIMITS)
        .await
        .expect("runner should not fault");

    assert_eq!(
        results.error_message(),
        Some("cannot insert multiple commands into a prepared statement")
    );
}

#[rstest]
#[case::unknown_column("select wat", "column \"wat\" does not exist")]
#[case::division("select 1 / 0", "division by zero")]
#[tokio::test(flavor = "multi_thread")]
async fn server_errors_are_recorded_verbatim(#[case] sql: &str, #[case] expected: &str) {
    let Some(database) = TestDatabase::provision().expect("provision") else {
        return;
    };

    let results = run(&database, sql, LIMITS)
        .await
        .expect("runner should not fault");

    assert_eq!(results.error_message(), Some(expected));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn statement_timeout_cancels_slow_queries() {
    let Some(database) = TestDatabase::provision().expect("provision") else {
        return;
    };
    let limits = QueryLimits {
        statement_timeout: Duration::from_millis(100),
        ..LIMITS
    };

    let results = run(&database, "select pg_sleep(5)", limits)
        .await
        .expect("runner should not fault");

    assert_eq!(
        results.error_message(),
        Some("canceling statement due to statement timeout")
    );
}

#[rstest]
#[case::at_cap(3, None)]
#[case::over_cap(4, Some(messages::TOO_MANY_ROWS))]
#[tokio::test(flavor = "multi_thread")]
async fn row_cap_applies_to_streamed_rows(#[case] count: u32, #[case] expected: Option<&str>) {
    let Some(database) = TestDatabase::provision().expect("provision") else {
        return;
    };

    let results = run(
        &database,
        &format!("select generate_series(1, {count}) as n"),
        LIMITS,
    )
    .await
    .expect("runner should not fault");

    assert_eq!(results.error_message(), expected);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unreachable_server_is_a_connection_failure() {
    let limits = QueryLimits {
        connect_timeout: Duration::from_secs(1),
        ..LIMITS
    };
    let url = TargetUrl::new("postgres://nobody@127.0.0.1:1/none").expect("url should be valid");
    let query = PinQuery::new("select 1").expect("query should be valid");

    let outcome = PostgresQueryRunner::new().run(&url, &query, limits).await;

    assert!(matches!(outcome, Err(QueryRunError::Connection { .. })));
    assert_eq!(
        classify(outcome).expect("connection failures are recorded"),
        PinResults::error(messages::CONNECTION_FAILED)
    );
}
