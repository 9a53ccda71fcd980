//! Schema bootstrap executed at startup.
//!
//! Applies embedded DDL in stages so a fresh database is usable without any
//! external migration tooling. Every statement is idempotent.

use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

const STAGES: &[(&str, &[&str])] = &[
    (
        "schema",
        &[
            "CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                username TEXT NOT NULL UNIQUE
            )",
            "CREATE TABLE IF NOT EXISTS rooms (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                name TEXT NOT NULL,
                owner_username TEXT NOT NULL,
                participant_usernames TEXT[] NOT NULL DEFAULT '{}',
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            "CREATE TABLE IF NOT EXISTS messages (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                room_id UUID NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                sender_username TEXT NOT NULL,
                text TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )",
        ],
    ),
    (
        "indexes",
        &[
            "CREATE INDEX IF NOT EXISTS rooms_participants_idx
                ON rooms USING GIN (participant_usernames)",
            "CREATE INDEX IF NOT EXISTS messages_room_id_idx ON messages (room_id)",
            "CREATE INDEX IF NOT EXISTS messages_created_at_idx ON messages (created_at)",
        ],
    ),
];

/// Errors raised while bootstrapping the schema.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// A DDL statement failed.
    #[error("database error during bootstrap stage '{stage}': {source}")]
    Sql {
        /// Stage whose statement failed.
        stage: &'static str,
        /// Underlying database failure.
        #[source]
        source: sqlx::Error,
    },
}

/// Execute all bootstrap DDL in stage order.
///
/// # Errors
/// Returns the first statement failure; later stages are not attempted.
pub async fn run(pool: &PgPool) -> Result<(), BootstrapError> {
    for (stage, statements) in STAGES {
        info!(stage, count = statements.len(), "applying bootstrap statements");
        for statement in *statements {
            sqlx::query(statement)
                .execute(pool)
                .await
                .map_err(|source| BootstrapError::Sql { stage, source })?;
        }
    }
    Ok(())
}
