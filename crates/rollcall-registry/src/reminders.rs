use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rollcall_db::Database;
use rollcall_types::notifications::Notification;
use tracing::{debug, info, warn};

use crate::conflict::day_bounds;
use crate::notify::PostCommitHooks;

/// Background task that reminds attendees of events happening later today.
pub async fn run_reminder_loop(db: Arc<Database>, hooks: PostCommitHooks, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let db = db.clone();
        let hooks = hooks.clone();
        let result = tokio::task::spawn_blocking(move || send_reminders(&db, &hooks, Utc::now())).await;

        match result {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Reminders: sent {} notification(s)", count);
                }
            }
            Ok(Err(e)) => warn!("Reminder run failed: {:#}", e),
            Err(e) => warn!("Reminder task join error: {}", e),
        }
    }
}

/// Notify everyone registered for a published event that starts after `now`
/// on the same date. Each (event, user) pair is reminded at most once; a
/// pair whose delivery failed is retried on the next run.
pub fn send_reminders(db: &Database, hooks: &PostCommitHooks, now: DateTime<Utc>) -> Result<usize> {
    let (_, end_of_day) = day_bounds(now);
    let events = db.published_events_between(now, end_of_day)?;

    if events.is_empty() {
        debug!("Event reminders: no events today");
        return Ok(0);
    }

    let mut sent = 0;
    for event in &events {
        let attendees = db.unreminded_attendees(event.id)?;
        if attendees.is_empty() {
            debug!(event_id = %event.id, "No one left to remind for '{}'", event.name);
            continue;
        }

        for user_id in attendees {
            let delivered = hooks.dispatch(&Notification::EventReminder {
                user_id,
                event_id: event.id,
                event_name: event.name.clone(),
                starts_at: event.starts_at,
                location: event.location.clone(),
            });
            if delivered {
                db.mark_reminded(event.id, user_id, now)?;
                sent += 1;
            }
        }
    }

    info!(events_count = events.len(), notifications_sent = sent, "Event reminders sent");
    Ok(sent)
}
