use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, events, registrations)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                role        TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE events (
                id                  TEXT PRIMARY KEY,
                name                TEXT NOT NULL,
                description         TEXT NOT NULL DEFAULT '',
                starts_at           TEXT NOT NULL,
                duration_minutes    INTEGER NOT NULL CHECK (duration_minutes >= 1),
                location            TEXT NOT NULL,
                capacity            INTEGER NOT NULL CHECK (capacity >= 1),
                waitlist_capacity   INTEGER NOT NULL DEFAULT 0 CHECK (waitlist_capacity >= 0),
                status              TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'published')),
                created_at          TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_events_starts_at ON events(starts_at);
            CREATE INDEX idx_events_status_starts_at ON events(status, starts_at);

            CREATE TABLE registrations (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id        TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                status          TEXT NOT NULL CHECK (status IN ('confirmed', 'waitlist')),
                registered_at   TEXT NOT NULL,
                UNIQUE(event_id, user_id)
            );

            CREATE INDEX idx_registrations_queue
                ON registrations(event_id, status, registered_at, id);
            CREATE INDEX idx_registrations_user ON registrations(user_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (reminders_sent)");
        conn.execute_batch(
            "
            CREATE TABLE reminders_sent (
                event_id    TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                sent_at     TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (event_id, user_id)
            );

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
