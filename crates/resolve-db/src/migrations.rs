use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::models::format_ts;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);",
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                full_name   TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password    TEXT NOT NULL,
                role        TEXT NOT NULL DEFAULT 'USER',
                created_at  TEXT NOT NULL
            );

            CREATE TABLE complaints (
                id              TEXT PRIMARY KEY,
                user_id         TEXT REFERENCES users(id) ON DELETE SET NULL,
                category        TEXT NOT NULL,
                title           TEXT NOT NULL,
                description     TEXT NOT NULL,
                priority        TEXT NOT NULL DEFAULT 'MEDIUM',
                status          TEXT NOT NULL DEFAULT 'NEW',
                is_anonymous    INTEGER NOT NULL DEFAULT 0,
                anonymous_email TEXT,
                assigned_to     TEXT REFERENCES users(id) ON DELETE SET NULL,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                resolved_at     TEXT
            );

            CREATE INDEX idx_complaints_status_created
                ON complaints(status, created_at);
            CREATE INDEX idx_complaints_user
                ON complaints(user_id);

            CREATE TABLE complaint_timeline (
                id              TEXT PRIMARY KEY,
                complaint_id    TEXT NOT NULL REFERENCES complaints(id) ON DELETE CASCADE,
                status          TEXT NOT NULL,
                comment         TEXT NOT NULL,
                is_public       INTEGER NOT NULL DEFAULT 1,
                updated_by      TEXT REFERENCES users(id) ON DELETE SET NULL,
                timestamp       TEXT NOT NULL
            );

            CREATE INDEX idx_timeline_complaint
                ON complaint_timeline(complaint_id, timestamp);

            CREATE TABLE notifications (
                id                  TEXT PRIMARY KEY,
                user_id             TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                complaint_id        TEXT REFERENCES complaints(id) ON DELETE SET NULL,
                title               TEXT NOT NULL,
                message             TEXT NOT NULL,
                notification_type   TEXT NOT NULL,
                is_read             INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_user
                ON notifications(user_id, created_at);

            CREATE TABLE attachments (
                id              TEXT PRIMARY KEY,
                complaint_id    TEXT NOT NULL REFERENCES complaints(id) ON DELETE CASCADE,
                file_name       TEXT NOT NULL,
                file_path       TEXT NOT NULL,
                file_type       TEXT,
                file_size       INTEGER NOT NULL,
                sha256          TEXT NOT NULL,
                uploaded_at     TEXT NOT NULL
            );

            CREATE TABLE data_repairs (
                name        TEXT PRIMARY KEY,
                detail      TEXT NOT NULL,
                applied_at  TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

/// Promote the account registered under `email` to ADMIN, once.
///
/// The repair is keyed by email in `data_repairs`, so later runs are no-ops
/// even if the role is changed back by hand. Returns `true` when the role was
/// changed by this call. An email with no account records nothing so the
/// repair can apply after the account registers.
pub fn promote_admin(conn: &Connection, email: &str, now: DateTime<Utc>) -> Result<bool> {
    let name = format!("promote_admin:{}", email.to_ascii_lowercase());

    let already: Option<String> = conn
        .query_row(
            "SELECT applied_at FROM data_repairs WHERE name = ?1",
            [&name],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(applied_at) = already {
        info!("Data repair {} already applied at {}", name, applied_at);
        return Ok(false);
    }

    let role: Option<String> = conn
        .query_row(
            "SELECT role FROM users WHERE email = ?1 COLLATE NOCASE",
            [email],
            |row| row.get(0),
        )
        .optional()?;

    let Some(role) = role else {
        info!("Data repair {} skipped: no such account yet", name);
        return Ok(false);
    };

    let changed = role == "USER";
    if changed {
        conn.execute(
            "UPDATE users SET role = 'ADMIN' WHERE email = ?1 COLLATE NOCASE",
            [email],
        )?;
    }

    conn.execute(
        "INSERT INTO data_repairs (name, detail, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![&name, format!("role {} -> ADMIN", role), format_ts(now)],
    )?;

    info!("Data repair {} applied (previous role {})", name, role);
    Ok(changed)
}
