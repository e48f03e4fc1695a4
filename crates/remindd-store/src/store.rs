use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use remindd_core::config::MAX_MESSAGE_CHARS;
use remindd_core::{next_run, normalize_targets};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use tracing::info;
use uuid::Uuid;

use crate::db::init_db;
use crate::error::{Result, StoreError};
use crate::types::{ListPage, ListQuery, Order, Reminder, ReminderInput, SortBy};

const LINKED_IDENTITY_KEY: &str = "linked_identity";
const COUNT_CACHE_MAX_ENTRIES: usize = 256;

#[derive(Debug, Clone, Copy)]
struct CountCacheEntry {
    version: u64,
    total: u64,
}

/// Thread-safe reminder store over a single SQLite connection.
///
/// The version counter is bumped on every successful mutation to reminders
/// or the linked-identity setting; the listing layer uses it to gate the
/// total-count cache and to derive ETags. It carries no meaning beyond
/// "changed since last observed value".
pub struct ReminderStore {
    db: Mutex<Connection>,
    version: AtomicU64,
    count_cache: Mutex<HashMap<String, CountCacheEntry>>,
}

impl ReminderStore {
    /// Wrap an already-configured connection, initialising the schema.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            version: AtomicU64::new(0),
            count_cache: Mutex::new(HashMap::new()),
        })
    }

    /// Open (or create) the database file at `path`.
    pub fn open(path: &str) -> Result<Self> {
        Self::new(crate::db::open(path)?)
    }

    // --- settings ----------------------------------------------------------

    /// The configured delivery identity, `None` when nothing is linked.
    pub fn linked_identity(&self) -> Result<Option<String>> {
        let db = self.db.lock().unwrap();
        let val: Option<String> = db
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                [LINKED_IDENTITY_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(val.filter(|v| !v.is_empty()))
    }

    /// Link (or with an empty string, unlink) the delivery identity.
    pub fn set_linked_identity(&self, identity: &str) -> Result<()> {
        {
            let db = self.db.lock().unwrap();
            db.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                rusqlite::params![LINKED_IDENTITY_KEY, identity],
            )?;
        }
        self.bump_version();
        Ok(())
    }

    // --- CRUD --------------------------------------------------------------

    /// Validate and persist a new reminder. Returns the stored row.
    ///
    /// Empty targets fall back to the linked identity at creation time, so
    /// the row records where it will actually be delivered.
    pub fn create(&self, input: ReminderInput) -> Result<Reminder> {
        let now = Utc::now();
        let (message, mut targets, recurrence, scheduled_at) = self.validate(input, now)?;
        if targets.is_empty() {
            targets = self.linked_identity()?.unwrap_or_default();
        }

        let id = Uuid::now_v7().to_string();
        {
            let db = self.db.lock().unwrap();
            db.execute(
                "INSERT INTO reminders (id, message, targets, recurrence, scheduled_at, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1)",
                rusqlite::params![id, message, targets, recurrence, fmt_ts(scheduled_at)],
            )?;
        }
        self.bump_version();
        info!(reminder_id = %id, %targets, "reminder created");

        Ok(Reminder {
            id,
            message,
            targets,
            recurrence,
            scheduled_at,
            is_active: true,
        })
    }

    /// Full replace of the mutable fields. The active flag is untouched
    /// (use [`toggle_active`](Self::toggle_active)).
    pub fn update(&self, id: &str, input: ReminderInput) -> Result<()> {
        let now = Utc::now();
        let (message, targets, recurrence, scheduled_at) = self.validate(input, now)?;

        let n = {
            let db = self.db.lock().unwrap();
            db.execute(
                "UPDATE reminders SET message = ?1, targets = ?2, recurrence = ?3, scheduled_at = ?4
                 WHERE id = ?5",
                rusqlite::params![message, targets, recurrence, fmt_ts(scheduled_at), id],
            )?
        };
        if n == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        self.bump_version();
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let n = {
            let db = self.db.lock().unwrap();
            db.execute("DELETE FROM reminders WHERE id = ?1", [id])?
        };
        if n == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        self.bump_version();
        info!(reminder_id = %id, "reminder deleted");
        Ok(())
    }

    pub fn delete_all(&self) -> Result<()> {
        {
            let db = self.db.lock().unwrap();
            db.execute("DELETE FROM reminders", [])?;
        }
        self.bump_version();
        Ok(())
    }

    pub fn toggle_active(&self, id: &str) -> Result<()> {
        let n = {
            let db = self.db.lock().unwrap();
            db.execute(
                "UPDATE reminders SET is_active = NOT is_active WHERE id = ?1",
                [id],
            )?
        };
        if n == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        self.bump_version();
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Reminder> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, message, targets, recurrence, scheduled_at, is_active
             FROM reminders WHERE id = ?1",
            [id],
            row_to_reminder,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    // --- listing -----------------------------------------------------------

    /// Cursor-based forward pagination with substring search and a
    /// version-gated total-count cache. Fetches `limit + 1` rows to detect
    /// the next page without a second query.
    pub fn list(&self, query: &ListQuery) -> Result<ListPage> {
        let limit = query.effective_limit();

        let mut where_clause = String::new();
        let mut args: Vec<Value> = Vec::new();
        if !query.search.is_empty() {
            where_clause.push_str(" WHERE (message LIKE ? OR targets LIKE ?)");
            let like = format!("%{}%", query.search);
            args.push(Value::Text(like.clone()));
            args.push(Value::Text(like));
        }

        let version = self.version();
        let total = match self.cached_total(&query.search, version) {
            Some(total) => total,
            None => {
                let total = {
                    let db = self.db.lock().unwrap();
                    let count_sql = format!("SELECT COUNT(*) FROM reminders{where_clause}");
                    db.query_row(&count_sql, params_from_iter(args.iter()), |row| {
                        row.get::<_, i64>(0)
                    })? as u64
                };
                self.put_cached_total(&query.search, version, total);
                total
            }
        };

        // Insertion order without an explicit sort lists newest first.
        let (sort_col, order) = match query.sort_by {
            None => (SortBy::Insertion.column(), Order::Desc),
            Some(sort_by) => (sort_by.column(), query.order),
        };

        let mut full_where = where_clause;
        if let Some(cursor) = query.cursor.as_deref() {
            if let Some((clause, cursor_args)) = self.cursor_clause(cursor, sort_col, order)? {
                if full_where.is_empty() {
                    full_where = format!(" WHERE {clause}");
                } else {
                    full_where.push_str(&format!(" AND {clause}"));
                }
                args.extend(cursor_args);
            }
        }

        let sql = format!(
            "SELECT id, message, targets, recurrence, scheduled_at, is_active
             FROM reminders{full_where} ORDER BY {} LIMIT ?",
            order_clause(sort_col, order),
        );
        args.push(Value::Integer(limit as i64 + 1));

        let mut data = {
            let db = self.db.lock().unwrap();
            let mut stmt = db.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(args.iter()), row_to_reminder)?;
            rows.collect::<rusqlite::Result<Vec<Reminder>>>()?
        };

        let next_cursor = if data.len() > limit {
            data.truncate(limit);
            data.last().map(|r| r.id.clone())
        } else {
            None
        };

        Ok(ListPage {
            data,
            next_cursor,
            total,
        })
    }

    /// Translate a cursor id into a comparison predicate against the sort
    /// column, with an id tiebreak for deterministic ordering on collisions.
    /// Unknown cursor ids are ignored (first page).
    fn cursor_clause(
        &self,
        cursor: &str,
        sort_col: &str,
        order: Order,
    ) -> Result<Option<(String, Vec<Value>)>> {
        let cmp = match order {
            Order::Asc => ">",
            Order::Desc => "<",
        };

        let exists: Option<i64> = {
            let db = self.db.lock().unwrap();
            db.query_row("SELECT 1 FROM reminders WHERE id = ?1", [cursor], |row| {
                row.get(0)
            })
            .optional()?
        };
        if exists.is_none() {
            return Ok(None);
        }

        let c = Value::Text(cursor.to_string());
        if sort_col == "rowid" {
            let clause = format!("rowid {cmp} (SELECT rowid FROM reminders WHERE id = ?)");
            return Ok(Some((clause, vec![c])));
        }

        let clause = format!(
            "({sort_col} {cmp} (SELECT {sort_col} FROM reminders WHERE id = ?) \
             OR ({sort_col} = (SELECT {sort_col} FROM reminders WHERE id = ?) AND id {cmp} ?))"
        );
        Ok(Some((clause, vec![c.clone(), c.clone(), c])))
    }

    // --- version counter & count cache -------------------------------------

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Record that persisted state changed. CRUD ops call this themselves;
    /// the dispatch engine calls it once per tick after advancing reminders.
    pub fn bump_version(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    fn cached_total(&self, search: &str, version: u64) -> Option<u64> {
        let cache = self.count_cache.lock().unwrap();
        cache
            .get(search)
            .filter(|entry| entry.version == version)
            .map(|entry| entry.total)
    }

    fn put_cached_total(&self, search: &str, version: u64, total: u64) {
        let mut cache = self.count_cache.lock().unwrap();
        if cache.len() >= COUNT_CACHE_MAX_ENTRIES && !cache.contains_key(search) {
            cache.clear();
        }
        cache.insert(search.to_string(), CountCacheEntry { version, total });
    }

    // --- due scan & dispatch marks -----------------------------------------

    /// Active reminders whose fire time has arrived, oldest first, bounded.
    pub fn due_reminders(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Reminder>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare_cached(
            "SELECT id, message, targets, recurrence, scheduled_at, is_active
             FROM reminders WHERE is_active = 1 AND scheduled_at <= ?1
             ORDER BY scheduled_at ASC LIMIT ?2",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![fmt_ts(now), limit as i64],
            row_to_reminder,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<Reminder>>>()?)
    }

    pub fn has_dispatch_mark(&self, id: &str, occurrence: DateTime<Utc>) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let found: Option<i64> = db
            .query_row(
                "SELECT 1 FROM reminder_dispatch_marks WHERE reminder_id = ?1 AND scheduled_at = ?2",
                rusqlite::params![id, fmt_ts(occurrence)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn put_dispatch_mark(
        &self,
        id: &str,
        occurrence: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT OR IGNORE INTO reminder_dispatch_marks (reminder_id, scheduled_at, created_at)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![id, fmt_ts(occurrence), fmt_ts(now)],
        )?;
        Ok(())
    }

    pub fn delete_dispatch_mark(&self, id: &str, occurrence: DateTime<Utc>) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "DELETE FROM reminder_dispatch_marks WHERE reminder_id = ?1 AND scheduled_at = ?2",
            rusqlite::params![id, fmt_ts(occurrence)],
        )?;
        Ok(())
    }

    pub fn has_target_dispatch_mark(
        &self,
        id: &str,
        occurrence: DateTime<Utc>,
        target: &str,
    ) -> Result<bool> {
        let target = target.trim();
        if target.is_empty() {
            return Err(StoreError::InvalidInput("target is required".to_string()));
        }
        let db = self.db.lock().unwrap();
        let found: Option<i64> = db
            .query_row(
                "SELECT 1 FROM reminder_target_dispatch_marks
                 WHERE reminder_id = ?1 AND scheduled_at = ?2 AND target = ?3",
                rusqlite::params![id, fmt_ts(occurrence), target],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Written only after the delivery callback reports success — the mark
    /// is the durable record that a send happened, never a promise.
    pub fn put_target_dispatch_mark(
        &self,
        id: &str,
        occurrence: DateTime<Utc>,
        target: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let target = target.trim();
        if target.is_empty() {
            return Err(StoreError::InvalidInput("target is required".to_string()));
        }
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT OR IGNORE INTO reminder_target_dispatch_marks
             (reminder_id, scheduled_at, target, created_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![id, fmt_ts(occurrence), target, fmt_ts(now)],
        )?;
        Ok(())
    }

    pub fn delete_target_dispatch_marks(&self, id: &str, occurrence: DateTime<Utc>) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "DELETE FROM reminder_target_dispatch_marks
             WHERE reminder_id = ?1 AND scheduled_at = ?2",
            rusqlite::params![id, fmt_ts(occurrence)],
        )?;
        Ok(())
    }

    /// Purge marks older than the retention cutoff from both tables.
    /// Catches orphans whose owning reminder's processing never completed.
    pub fn cleanup_marks(&self, older_than: DateTime<Utc>) -> Result<usize> {
        let db = self.db.lock().unwrap();
        let cutoff = fmt_ts(older_than);
        let a = db.execute(
            "DELETE FROM reminder_dispatch_marks WHERE created_at < ?1",
            [&cutoff],
        )?;
        let b = db.execute(
            "DELETE FROM reminder_target_dispatch_marks WHERE created_at < ?1",
            [&cutoff],
        )?;
        Ok(a + b)
    }

    // --- schedule advance (dispatch engine) --------------------------------

    /// Deactivate a reminder iff it is still active. Returns whether a row
    /// changed — false means someone else got there first.
    pub fn deactivate_if_active(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE reminders SET is_active = 0 WHERE id = ?1 AND is_active = 1",
            [id],
        )?;
        Ok(n > 0)
    }

    /// Advance a recurring reminder to its next occurrence iff still active.
    pub fn reschedule_if_active(&self, id: &str, next: DateTime<Utc>) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE reminders SET scheduled_at = ?1 WHERE id = ?2 AND is_active = 1",
            rusqlite::params![fmt_ts(next), id],
        )?;
        Ok(n > 0)
    }

    // --- validation --------------------------------------------------------

    /// Shared create/update validation. Everything is rejected before any
    /// persistence: the whole operation is atomic with respect to input
    /// errors.
    fn validate(
        &self,
        input: ReminderInput,
        now: DateTime<Utc>,
    ) -> Result<(String, String, String, DateTime<Utc>)> {
        let message = input.message.trim().to_string();
        if message.is_empty() {
            return Err(StoreError::InvalidInput("message is required".to_string()));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(StoreError::InvalidInput("message is too long".to_string()));
        }

        let targets = normalize_targets(&input.targets)?;
        let recurrence = input.recurrence.trim().to_string();

        let scheduled_at = if recurrence.is_empty() {
            if input.scheduled_at <= now {
                return Err(StoreError::InvalidInput(
                    "scheduled time must be in the future".to_string(),
                ));
            }
            input.scheduled_at
        } else {
            next_run(&recurrence, input.scheduled_at, now)?
        };

        Ok((message, targets, recurrence, scheduled_at))
    }
}

fn fmt_ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339()
}

fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn row_to_reminder(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reminder> {
    let scheduled_raw: String = row.get(4)?;
    let scheduled_at = parse_ts(&scheduled_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("bad timestamp: {scheduled_raw}").into(),
        )
    })?;
    Ok(Reminder {
        id: row.get(0)?,
        message: row.get(1)?,
        targets: row.get(2)?,
        recurrence: row.get(3)?,
        scheduled_at,
        is_active: row.get::<_, i64>(5)? != 0,
    })
}

fn order_clause(sort_col: &str, order: Order) -> String {
    let dir = order.sql();
    if sort_col == "rowid" {
        format!("rowid {dir}")
    } else {
        format!("{sort_col} {dir}, id {dir}")
    }
}
