use anyhow::Result;
use chrono::{DateTime, Utc};
use rollcall_db::StoreTx;
use rollcall_types::models::{Event, Registration, RegistrationStatus};
use uuid::Uuid;

use crate::capacity::EventCapacity;

/// Persistence operations the engine performs inside one transaction.
pub trait RegistrationStore {
    fn event(&self, event_id: Uuid) -> Result<Option<Event>>;

    /// Returns false when the event does not exist.
    fn update_event(&self, event: &Event) -> Result<bool>;

    fn registration(&self, user_id: Uuid, event_id: Uuid) -> Result<Option<Registration>>;

    fn count_by_status(&self, event_id: Uuid, status: RegistrationStatus) -> Result<u32>;

    fn insert_registration(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        status: RegistrationStatus,
        registered_at: DateTime<Utc>,
    ) -> Result<Registration>;

    fn delete_registration(&self, registration_id: i64) -> Result<()>;

    fn earliest_waitlisted(&self, event_id: Uuid) -> Result<Option<Registration>>;

    fn update_status(&self, registration_id: i64, status: RegistrationStatus) -> Result<()>;

    /// Events the user is registered for (any status) starting in `[from, to)`.
    fn active_events_between(&self, user_id: Uuid, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Event>>;

    fn capacity(&self, event: &Event) -> Result<EventCapacity> {
        let confirmed = self.count_by_status(event.id, RegistrationStatus::Confirmed)?;
        let waitlisted = self.count_by_status(event.id, RegistrationStatus::Waitlisted)?;
        Ok(EventCapacity::new(event, confirmed, waitlisted))
    }
}

impl RegistrationStore for StoreTx<'_> {
    fn event(&self, event_id: Uuid) -> Result<Option<Event>> {
        StoreTx::event(self, event_id)
    }

    fn update_event(&self, event: &Event) -> Result<bool> {
        StoreTx::update_event(self, event)
    }

    fn registration(&self, user_id: Uuid, event_id: Uuid) -> Result<Option<Registration>> {
        StoreTx::registration(self, user_id, event_id)
    }

    fn count_by_status(&self, event_id: Uuid, status: RegistrationStatus) -> Result<u32> {
        StoreTx::count_by_status(self, event_id, status)
    }

    fn insert_registration(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        status: RegistrationStatus,
        registered_at: DateTime<Utc>,
    ) -> Result<Registration> {
        StoreTx::insert_registration(self, user_id, event_id, status, registered_at)
    }

    fn delete_registration(&self, registration_id: i64) -> Result<()> {
        StoreTx::delete_registration(self, registration_id)
    }

    fn earliest_waitlisted(&self, event_id: Uuid) -> Result<Option<Registration>> {
        StoreTx::earliest_waitlisted(self, event_id)
    }

    fn update_status(&self, registration_id: i64, status: RegistrationStatus) -> Result<()> {
        StoreTx::update_status(self, registration_id, status)
    }

    fn active_events_between(&self, user_id: Uuid, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Event>> {
        StoreTx::active_events_between(self, user_id, from, to)
    }
}
