use anyhow::Result;
use chrono::{DateTime, Utc};
use rollcall_types::models::{Event, Registration, RegistrationStatus};
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::models::{EVENT_COLUMNS, EventRow, REGISTRATION_COLUMNS, RegistrationRow, format_timestamp};

/// Registration reads and writes scoped to one open transaction.
/// Obtained from [`crate::Database::transaction`].
pub struct StoreTx<'c> {
    conn: &'c Connection,
}

impl<'c> StoreTx<'c> {
    pub(crate) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Raw connection for statements not covered below.
    pub fn conn(&self) -> &Connection {
        self.conn
    }

    pub fn event(&self, event_id: Uuid) -> Result<Option<Event>> {
        let sql = format!("SELECT {} FROM events e WHERE e.id = ?1", EVENT_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, [event_id.to_string()], |row| EventRow::from_row(row, 0))
            .optional()?;
        row.map(EventRow::into_event).transpose()
    }

    /// Overwrite every editable field of the event. Returns false when no
    /// event has the given id.
    pub fn update_event(&self, event: &Event) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE events SET
                name = ?2, description = ?3, starts_at = ?4, duration_minutes = ?5,
                location = ?6, capacity = ?7, waitlist_capacity = ?8, status = ?9
             WHERE id = ?1",
            params![
                event.id.to_string(),
                event.name,
                event.description,
                format_timestamp(event.starts_at),
                event.duration_minutes,
                event.location,
                event.capacity,
                event.waitlist_capacity,
                event.status.as_str(),
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn registration(&self, user_id: Uuid, event_id: Uuid) -> Result<Option<Registration>> {
        let sql = format!(
            "SELECT {} FROM registrations r WHERE r.user_id = ?1 AND r.event_id = ?2",
            REGISTRATION_COLUMNS
        );
        let row = self
            .conn
            .query_row(&sql, [user_id.to_string(), event_id.to_string()], |row| {
                RegistrationRow::from_row(row, 0)
            })
            .optional()?;
        row.map(RegistrationRow::into_registration).transpose()
    }

    pub fn count_by_status(&self, event_id: Uuid, status: RegistrationStatus) -> Result<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM registrations WHERE event_id = ?1 AND status = ?2",
            params![event_id.to_string(), status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn insert_registration(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        status: RegistrationStatus,
        registered_at: DateTime<Utc>,
    ) -> Result<Registration> {
        self.conn.execute(
            "INSERT INTO registrations (event_id, user_id, status, registered_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                event_id.to_string(),
                user_id.to_string(),
                status.as_str(),
                format_timestamp(registered_at)
            ],
        )?;

        Ok(Registration {
            id: self.conn.last_insert_rowid(),
            user_id,
            event_id,
            status,
            registered_at,
        })
    }

    pub fn delete_registration(&self, registration_id: i64) -> Result<()> {
        self.conn.execute("DELETE FROM registrations WHERE id = ?1", [registration_id])?;
        Ok(())
    }

    /// Head of the waitlist: earliest `registered_at`, then lowest id.
    pub fn earliest_waitlisted(&self, event_id: Uuid) -> Result<Option<Registration>> {
        let sql = format!(
            "SELECT {} FROM registrations r
             WHERE r.event_id = ?1 AND r.status = ?2
             ORDER BY r.registered_at ASC, r.id ASC
             LIMIT 1",
            REGISTRATION_COLUMNS
        );
        let row = self
            .conn
            .query_row(
                &sql,
                params![event_id.to_string(), RegistrationStatus::Waitlisted.as_str()],
                |row| RegistrationRow::from_row(row, 0),
            )
            .optional()?;
        row.map(RegistrationRow::into_registration).transpose()
    }

    pub fn update_status(&self, registration_id: i64, status: RegistrationStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE registrations SET status = ?1 WHERE id = ?2",
            params![status.as_str(), registration_id],
        )?;
        Ok(())
    }

    /// Events the user holds any registration for that start in `[from, to)`.
    pub fn active_events_between(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        let sql = format!(
            "SELECT {} FROM registrations r
             JOIN events e ON e.id = r.event_id
             WHERE r.user_id = ?1 AND e.starts_at >= ?2 AND e.starts_at < ?3
             ORDER BY e.starts_at ASC",
            EVENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![user_id.to_string(), format_timestamp(from), format_timestamp(to)],
                |row| EventRow::from_row(row, 0),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(EventRow::into_event).collect()
    }
}
