//! Due-reminder processing: delivery, idempotency marks, and advancing.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use remindd_core::config::SchedulerConfig;
use remindd_core::cron::CronExpr;
use remindd_core::target::split_targets;
use remindd_store::{Reminder, ReminderStore};
use tracing::{debug, warn};

use crate::error::Result;
use crate::messenger::Messenger;

/// One pass over the due set. Stateless between ticks; everything durable
/// lives in the store's mark tables.
pub struct DispatchEngine {
    store: Arc<ReminderStore>,
    messenger: Arc<dyn Messenger>,
    batch_limit: usize,
    retention: Duration,
}

impl DispatchEngine {
    pub fn new(
        store: Arc<ReminderStore>,
        messenger: Arc<dyn Messenger>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            store,
            messenger,
            batch_limit: config.effective_batch_limit(),
            retention: Duration::days(config.mark_retention_days.max(1)),
        }
    }

    /// Process every reminder that is due right now.
    ///
    /// A failure on one reminder is logged and skipped; it never blocks the
    /// rest of the batch. The store version is bumped at most once per tick,
    /// after the batch, and only if some reminder actually advanced.
    pub async fn tick(&self) -> Result<()> {
        let now = Utc::now();

        let Some(identity) = self.store.linked_identity()? else {
            debug!("skipping tick: no linked identity");
            return Ok(());
        };
        if !self.messenger.is_connected(&identity).await {
            debug!("skipping tick: messenger not connected");
            return Ok(());
        }

        let due = self.store.due_reminders(now, self.batch_limit)?;
        if !due.is_empty() {
            debug!(count = due.len(), "processing due reminders");
        }

        // Cron parse results are shared across the batch; a distinct bad
        // expression is warned about once per tick.
        let mut parsed: HashMap<String, CronExpr> = HashMap::new();
        let mut invalid: HashSet<String> = HashSet::new();

        let mut changed = false;
        for reminder in &due {
            match self
                .process_one(reminder, &identity, now, &mut parsed, &mut invalid)
                .await
            {
                Ok(advanced) => changed |= advanced,
                Err(e) => {
                    warn!(id = %reminder.id, error = %e, "failed to process reminder");
                }
            }
        }
        if changed {
            self.store.bump_version();
        }

        match self.store.cleanup_marks(now - self.retention) {
            Ok(0) => {}
            Ok(purged) => debug!(purged, "purged expired dispatch marks"),
            Err(e) => warn!(error = %e, "dispatch mark cleanup failed"),
        }

        Ok(())
    }

    /// Deliver one reminder's current occurrence, then advance it.
    ///
    /// Returns whether the reminder row itself changed. Partial delivery
    /// leaves the occurrence unmarked so a later tick retries the failed
    /// targets only.
    async fn process_one(
        &self,
        reminder: &Reminder,
        identity: &str,
        now: DateTime<Utc>,
        parsed: &mut HashMap<String, CronExpr>,
        invalid: &mut HashSet<String>,
    ) -> Result<bool> {
        let occurrence = reminder.scheduled_at;

        if !self.store.has_dispatch_mark(&reminder.id, occurrence)? {
            if !self.deliver_all(reminder, identity, occurrence, now).await? {
                return Ok(false);
            }
            self.store.put_dispatch_mark(&reminder.id, occurrence, now)?;
        }

        let advanced = if reminder.recurrence.is_empty() {
            self.store.deactivate_if_active(&reminder.id)?
        } else {
            match self.next_occurrence(&reminder.recurrence, now, parsed, invalid) {
                Some(next) => self.store.reschedule_if_active(&reminder.id, next)?,
                None => self.store.deactivate_if_active(&reminder.id)?,
            }
        };

        // Marks are deleted only once the advance actually applied. If the
        // reminder was deactivated mid-tick, the occurrence stays marked so
        // a later reactivation does not resend it; the retention sweep
        // collects marks that never get this far.
        if advanced {
            self.store.delete_dispatch_mark(&reminder.id, occurrence)?;
            self.store
                .delete_target_dispatch_marks(&reminder.id, occurrence)?;
        }

        Ok(advanced)
    }

    /// Send to every not-yet-delivered target, marking each success as it
    /// lands. Returns true only when every target is now marked.
    async fn deliver_all(
        &self,
        reminder: &Reminder,
        identity: &str,
        occurrence: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut targets = split_targets(&reminder.targets);
        if targets.is_empty() {
            targets.push(identity.to_string());
        }

        let mut failures = 0usize;
        for target in &targets {
            if self
                .store
                .has_target_dispatch_mark(&reminder.id, occurrence, target)?
            {
                continue;
            }
            match self
                .messenger
                .send(identity, target, &reminder.message)
                .await
            {
                Ok(()) => {
                    self.store
                        .put_target_dispatch_mark(&reminder.id, occurrence, target, now)?;
                }
                Err(e) => {
                    warn!(id = %reminder.id, target = %target, error = %e, "delivery failed");
                    failures += 1;
                }
            }
        }

        if failures > 0 {
            warn!(
                id = %reminder.id,
                failures,
                total = targets.len(),
                "occurrence partially delivered, will retry failed targets"
            );
        }
        Ok(failures == 0)
    }

    fn next_occurrence(
        &self,
        expression: &str,
        now: DateTime<Utc>,
        parsed: &mut HashMap<String, CronExpr>,
        invalid: &mut HashSet<String>,
    ) -> Option<DateTime<Utc>> {
        if invalid.contains(expression) {
            return None;
        }
        let expr = match parsed.entry(expression.to_string()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => match CronExpr::parse(expression) {
                Ok(expr) => e.insert(expr),
                Err(err) => {
                    warn!(expression, error = %err, "unusable recurrence, deactivating");
                    invalid.insert(expression.to_string());
                    return None;
                }
            },
        };
        let next = expr.next_after(now);
        if next.is_none() {
            warn!(expression, "recurrence has no future occurrence, deactivating");
            invalid.insert(expression.to_string());
        }
        next
    }
}
