use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking, no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "-- Migration 1: device credentials

CREATE TABLE device_credentials (
    device_id TEXT PRIMARY KEY,
    token TEXT NOT NULL,
    expires_at_ms INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX idx_device_credentials_expiry ON device_credentials(expires_at_ms);
",
    )])
}
