//! Embedded registry schema migrations.
//!
//! Applied migrations are recorded in `pinboard_migrations`, so [`apply`]
//! can run on every start.

use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use tracing::info;

/// One forward migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    /// Unique, ordered migration name.
    pub name: &'static str,
    /// SQL applied in one batch.
    pub up: &'static str,
}

/// Every migration, oldest first.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "2026-10-01-000000_create_targets_and_pins",
        up: include_str!("../migrations/2026-10-01-000000_create_targets_and_pins/up.sql"),
    },
    Migration {
        name: "2026-10-01-000001_create_pin_queue",
        up: include_str!("../migrations/2026-10-01-000001_create_pin_queue/up.sql"),
    },
];

diesel::table! {
    /// Applied migration log.
    pinboard_migrations (name) {
        /// Migration name.
        name -> Text,
        /// When it was applied.
        applied_at -> Timestamptz,
    }
}

const CREATE_LOG_SQL: &str = concat!(
    "CREATE TABLE IF NOT EXISTS pinboard_migrations (",
    "name TEXT PRIMARY KEY, ",
    "applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW())",
);

/// Applies pending migrations in one transaction and returns their names.
///
/// # Errors
///
/// Returns the database error of the first failing statement; nothing is
/// applied in that case.
pub fn apply(connection: &mut PgConnection) -> QueryResult<Vec<&'static str>> {
    connection.transaction(|conn| {
        conn.batch_execute(CREATE_LOG_SQL)?;
        let mut applied = Vec::new();
        for migration in MIGRATIONS {
            let recorded = pinboard_migrations::table
                .find(migration.name)
                .select(pinboard_migrations::name)
                .first::<String>(conn)
                .optional()?;
            if recorded.is_some() {
                continue;
            }
            conn.batch_execute(migration.up)?;
            diesel::insert_into(pinboard_migrations::table)
                .values((
                    pinboard_migrations::name.eq(migration.name),
                    pinboard_migrations::applied_at.eq(diesel::dsl::now),
                ))
                .execute(conn)?;
            info!(migration = migration.name, "applied migration");
            applied.push(migration.name);
        }
        Ok(applied)
    })
}
