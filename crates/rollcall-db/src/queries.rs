use crate::Database;
use crate::models::{
    EVENT_COLUMNS, EventListing, EventRow, REGISTRATION_COLUMNS, RegistrationRow, UserRegistration, UserRow,
    format_timestamp,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rollcall_types::models::{Event, EventStatus, Role};
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

/// Optional filters for [`Database::list_events`].
#[derive(Debug, Default, Clone, Copy)]
pub struct EventFilter {
    pub published_only: bool,
    /// Only events starting in `[from, until)`.
    pub window: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, password_hash: &str, role: Role) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password, role) VALUES (?1, ?2, ?3, ?4)",
                (id, username, password_hash, role.as_str()),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Events --

    pub fn insert_event(&self, event: &Event) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO events
                    (id, name, description, starts_at, duration_minutes, location, capacity, waitlist_capacity, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
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
            Ok(())
        })
    }

    /// Returns false when no event has the given id.
    pub fn set_event_status(&self, id: Uuid, status: EventStatus) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE events SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }

    /// Registrations and reminder records go with the event. Returns false
    /// when no event has the given id.
    pub fn delete_event(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM events WHERE id = ?1", [id.to_string()])?;
            Ok(changed > 0)
        })
    }

    pub fn get_event(&self, id: Uuid) -> Result<Option<EventListing>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE e.id = ?1", listing_select());
            let row = conn
                .query_row(&sql, [id.to_string()], listing_from_row)
                .optional()?;
            row.map(into_listing).transpose()
        })
    }

    /// Events ordered by start time, with seat usage.
    pub fn list_events(&self, filter: EventFilter) -> Result<Vec<EventListing>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE (?1 = 0 OR e.status = 'published')
                   AND (?2 IS NULL OR (e.starts_at >= ?2 AND e.starts_at < ?3))
                 ORDER BY e.starts_at ASC",
                listing_select()
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![
                        filter.published_only,
                        filter.window.map(|(from, _)| format_timestamp(from)),
                        filter.window.map(|(_, until)| format_timestamp(until)),
                    ],
                    listing_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(into_listing).collect()
        })
    }

    // -- Registrations --

    /// Ids of every event the user holds a registration for.
    pub fn registered_event_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT event_id FROM registrations WHERE user_id = ?1")?;
            let ids = stmt
                .query_map([user_id.to_string()], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            ids.iter().map(|id| crate::models::parse_uuid(id)).collect()
        })
    }

    pub fn user_registrations(&self, user_id: Uuid) -> Result<Vec<UserRegistration>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}, {} FROM registrations r
                 JOIN events e ON e.id = r.event_id
                 WHERE r.user_id = ?1
                 ORDER BY e.starts_at ASC",
                EVENT_COLUMNS, REGISTRATION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id.to_string()], |row| {
                    Ok((EventRow::from_row(row, 0)?, RegistrationRow::from_row(row, 9)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(event, registration)| {
                    Ok(UserRegistration {
                        event: event.into_event()?,
                        registration: registration.into_registration()?,
                    })
                })
                .collect()
        })
    }

    // -- Reminders --

    /// Published events starting in `(after, until)`.
    pub fn published_events_between(&self, after: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<Event>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM events e
                 WHERE e.status = 'published' AND e.starts_at > ?1 AND e.starts_at < ?2
                 ORDER BY e.starts_at ASC",
                EVENT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![format_timestamp(after), format_timestamp(until)], |row| {
                    EventRow::from_row(row, 0)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(EventRow::into_event).collect()
        })
    }

    /// Registered users of an event who have not been reminded yet.
    pub fn unreminded_attendees(&self, event_id: Uuid) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.user_id FROM registrations r
                 LEFT JOIN reminders_sent s ON s.event_id = r.event_id AND s.user_id = r.user_id
                 WHERE r.event_id = ?1 AND s.user_id IS NULL
                 ORDER BY r.registered_at ASC, r.id ASC",
            )?;
            let ids = stmt
                .query_map([event_id.to_string()], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            ids.iter().map(|id| crate::models::parse_uuid(id)).collect()
        })
    }

    pub fn mark_reminded(&self, event_id: Uuid, user_id: Uuid, sent_at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO reminders_sent (event_id, user_id, sent_at) VALUES (?1, ?2, ?3)",
                params![event_id.to_string(), user_id.to_string(), format_timestamp(sent_at)],
            )?;
            Ok(())
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, username, password, role, created_at FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                role: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn listing_select() -> String {
    format!(
        "SELECT {},
            (SELECT COUNT(*) FROM registrations r WHERE r.event_id = e.id AND r.status = 'confirmed'),
            (SELECT COUNT(*) FROM registrations r WHERE r.event_id = e.id AND r.status = 'waitlist')
         FROM events e",
        EVENT_COLUMNS
    )
}

fn listing_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(EventRow, u32, u32)> {
    Ok((EventRow::from_row(row, 0)?, row.get(9)?, row.get(10)?))
}

fn into_listing((row, confirmed, waitlisted): (EventRow, u32, u32)) -> Result<EventListing> {
    Ok(EventListing {
        event: row.into_event()?,
        confirmed,
        waitlisted,
    })
}
