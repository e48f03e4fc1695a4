use chrono::{DateTime, Utc};
use remindd_core::config::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use serde::{Deserialize, Serialize};

/// A persisted reminder row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    /// UUIDv7 string — time-sortable primary key.
    pub id: String,
    /// Text to deliver. Non-empty, at most 4000 characters.
    pub message: String,
    /// Canonical comma-joined target list. Empty means "deliver to the
    /// linked identity".
    pub targets: String,
    /// Five-field cron expression; empty for one-shot reminders.
    pub recurrence: String,
    /// Next fire time (UTC). For recurring reminders, always the
    /// calculator's next occurrence at the time it was set.
    pub scheduled_at: DateTime<Utc>,
    pub is_active: bool,
}

/// Mutable reminder fields, shared by create and update (update is a full
/// replace). Validation happens in the store, before any persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderInput {
    pub message: String,
    #[serde(default)]
    pub targets: String,
    #[serde(default)]
    pub recurrence: String,
    pub scheduled_at: DateTime<Utc>,
}

/// Listing sort column. `None` in [`ListQuery::sort_by`] means insertion
/// order, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Insertion,
    Message,
    Target,
    Time,
    Recurrence,
}

impl SortBy {
    pub(crate) fn column(self) -> &'static str {
        match self {
            SortBy::Insertion => "rowid",
            SortBy::Message => "message",
            SortBy::Target => "targets",
            SortBy::Time => "scheduled_at",
            SortBy::Recurrence => "recurrence",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortBy::Insertion => "insertion",
            SortBy::Message => "message",
            SortBy::Target => "target",
            SortBy::Time => "time",
            SortBy::Recurrence => "recurrence",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Order::Asc => "asc",
            Order::Desc => "desc",
        }
    }
}

/// Cursor-based forward pagination request.
#[derive(Debug, Clone)]
pub struct ListQuery {
    /// Id of the last row of the previous page; unknown ids are ignored.
    pub cursor: Option<String>,
    /// Clamped to 1..=100; 0 means the default of 50.
    pub limit: usize,
    /// Substring match over message and targets. Empty matches everything.
    pub search: String,
    /// `None` lists by insertion order, newest first.
    pub sort_by: Option<SortBy>,
    pub order: Order,
}

impl ListQuery {
    /// Page size with clamping applied: 0 means the default, anything above
    /// the cap is reduced to it. Both the page fetch and the ETag use this,
    /// so equivalent limits produce equivalent tags.
    pub fn effective_limit(&self) -> usize {
        if self.limit == 0 {
            DEFAULT_PAGE_LIMIT
        } else {
            self.limit.min(MAX_PAGE_LIMIT)
        }
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            cursor: None,
            limit: 0,
            search: String::new(),
            sort_by: None,
            order: Order::Asc,
        }
    }
}

/// One page of listing results.
#[derive(Debug, Clone, Serialize)]
pub struct ListPage {
    pub data: Vec<Reminder>,
    /// Opaque token for the next page; `None` on the last page.
    pub next_cursor: Option<String>,
    /// Total rows matching the search, from the version-gated cache.
    pub total: u64,
}
