use std::time::Duration;

use rusqlite::Connection;

use crate::error::Result;

/// Open a database file and apply the connection settings the engine
/// relies on (WAL, busy timeout, foreign keys for mark cascade-delete).
pub fn open(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    Ok(conn)
}

/// Per-connection settings. Call on every connection, including in-memory
/// test databases — foreign keys are off by default in SQLite.
pub fn configure(conn: &Connection) -> Result<()> {
    conn.busy_timeout(Duration::from_millis(5000))?;
    // journal_mode returns the resulting mode as a row, so query it.
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

/// Initialise the reminder schema in `conn`. Idempotent; safe on every
/// startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS settings (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS reminders (
            id           TEXT    NOT NULL PRIMARY KEY,
            message      TEXT    NOT NULL,
            targets      TEXT    NOT NULL DEFAULT '',
            recurrence   TEXT    NOT NULL DEFAULT '',
            scheduled_at TEXT    NOT NULL,   -- RFC 3339 UTC
            is_active    INTEGER NOT NULL DEFAULT 1
        );

        -- The due scan: WHERE is_active = 1 AND scheduled_at <= ? ORDER BY scheduled_at
        CREATE INDEX IF NOT EXISTS idx_reminders_active_scheduled
            ON reminders(is_active, scheduled_at);
        CREATE INDEX IF NOT EXISTS idx_reminders_scheduled_at
            ON reminders(scheduled_at);
        -- Sortable listing columns
        CREATE INDEX IF NOT EXISTS idx_reminders_message
            ON reminders(message);
        CREATE INDEX IF NOT EXISTS idx_reminders_targets
            ON reminders(targets);
        CREATE INDEX IF NOT EXISTS idx_reminders_recurrence
            ON reminders(recurrence);

        -- Occurrence-level dispatch marks: existence means this occurrence
        -- was fully delivered. Keyed by (reminder, scheduled time).
        CREATE TABLE IF NOT EXISTS reminder_dispatch_marks (
            reminder_id  TEXT NOT NULL,
            scheduled_at TEXT NOT NULL,
            created_at   TEXT NOT NULL,
            PRIMARY KEY (reminder_id, scheduled_at),
            FOREIGN KEY (reminder_id) REFERENCES reminders(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_dispatch_marks_created_at
            ON reminder_dispatch_marks(created_at);

        -- Per-target marks: one row per target already delivered for an
        -- occurrence. What makes repeated ticks idempotent.
        CREATE TABLE IF NOT EXISTS reminder_target_dispatch_marks (
            reminder_id  TEXT NOT NULL,
            scheduled_at TEXT NOT NULL,
            target       TEXT NOT NULL,
            created_at   TEXT NOT NULL,
            PRIMARY KEY (reminder_id, scheduled_at, target),
            FOREIGN KEY (reminder_id) REFERENCES reminders(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_target_dispatch_marks_created_at
            ON reminder_target_dispatch_marks(created_at);
        ",
    )?;
    Ok(())
}
