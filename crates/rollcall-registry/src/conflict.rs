use anyhow::Result;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use rollcall_types::api::ConflictingEvent;
use rollcall_types::models::Event;
use uuid::Uuid;

use crate::store::RegistrationStore;

/// `[start, end)` of the UTC calendar day containing `ts`.
pub fn day_bounds(ts: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = ts.date_naive().and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

/// Half-open interval overlap: an event ending exactly when the other
/// starts does not overlap it.
pub fn overlaps(a: &Event, b: &Event) -> bool {
    a.starts_at < b.ends_at() && b.starts_at < a.ends_at()
}

/// Events from `registered` that start on the candidate's date and overlap it.
pub fn find_conflicts<'a, I>(candidate: &Event, registered: I) -> Vec<ConflictingEvent>
where
    I: IntoIterator<Item = &'a Event>,
{
    let date = candidate.starts_at.date_naive();
    registered
        .into_iter()
        .filter(|e| e.id != candidate.id && e.starts_at.date_naive() == date)
        .filter(|e| overlaps(candidate, e))
        .map(|e| ConflictingEvent {
            id: e.id,
            name: e.name.clone(),
            date_time: e.starts_at,
            end_time: e.ends_at(),
        })
        .collect()
}

/// Conflicting events for `user_id` joining `candidate`. Empty means no conflict.
pub fn check_conflicts<S: RegistrationStore>(
    store: &S,
    user_id: Uuid,
    candidate: &Event,
) -> Result<Vec<ConflictingEvent>> {
    let (from, to) = day_bounds(candidate.starts_at);
    let registered = store.active_events_between(user_id, from, to)?;
    Ok(find_conflicts(candidate, &registered))
}

pub fn has_conflict<S: RegistrationStore>(store: &S, user_id: Uuid, candidate: &Event) -> Result<bool> {
    Ok(!check_conflicts(store, user_id, candidate)?.is_empty())
}
