/// Database row types. These map directly to SQLite rows and are converted
/// into `rollcall-types` models once read, so parse failures surface as
/// errors instead of panics inside rusqlite's row callbacks.
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rollcall_types::models::{Event, EventStatus, Registration, RegistrationStatus, Role, User};
use rusqlite::Row;
use uuid::Uuid;

pub const EVENT_COLUMNS: &str = "e.id, e.name, e.description, e.starts_at, e.duration_minutes, \
     e.location, e.capacity, e.waitlist_capacity, e.status";

pub const REGISTRATION_COLUMNS: &str = "r.id, r.event_id, r.user_id, r.status, r.registered_at";

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub role: String,
    pub created_at: String,
}

impl UserRow {
    pub fn into_user(self) -> Result<User> {
        Ok(User {
            id: parse_uuid(&self.id)?,
            role: Role::parse(&self.role).ok_or_else(|| anyhow!("Corrupt role '{}' on user {}", self.role, self.id))?,
            created_at: parse_timestamp(&self.created_at)?,
            username: self.username,
        })
    }
}

pub struct EventRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub starts_at: String,
    pub duration_minutes: i64,
    pub location: String,
    pub capacity: i64,
    pub waitlist_capacity: i64,
    pub status: String,
}

impl EventRow {
    /// Reads `EVENT_COLUMNS` starting at column `base`.
    pub fn from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(base)?,
            name: row.get(base + 1)?,
            description: row.get(base + 2)?,
            starts_at: row.get(base + 3)?,
            duration_minutes: row.get(base + 4)?,
            location: row.get(base + 5)?,
            capacity: row.get(base + 6)?,
            waitlist_capacity: row.get(base + 7)?,
            status: row.get(base + 8)?,
        })
    }

    pub fn into_event(self) -> Result<Event> {
        let context = || format!("Corrupt event row {}", self.id);
        Ok(Event {
            id: parse_uuid(&self.id)?,
            starts_at: parse_timestamp(&self.starts_at)?,
            duration_minutes: u32::try_from(self.duration_minutes).with_context(context)?,
            capacity: u32::try_from(self.capacity).with_context(context)?,
            waitlist_capacity: u32::try_from(self.waitlist_capacity).with_context(context)?,
            status: EventStatus::parse(&self.status).ok_or_else(|| anyhow!("{}: status '{}'", context(), self.status))?,
            name: self.name,
            description: self.description,
            location: self.location,
        })
    }
}

pub struct RegistrationRow {
    pub id: i64,
    pub event_id: String,
    pub user_id: String,
    pub status: String,
    pub registered_at: String,
}

impl RegistrationRow {
    /// Reads `REGISTRATION_COLUMNS` starting at column `base`.
    pub fn from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(base)?,
            event_id: row.get(base + 1)?,
            user_id: row.get(base + 2)?,
            status: row.get(base + 3)?,
            registered_at: row.get(base + 4)?,
        })
    }

    pub fn into_registration(self) -> Result<Registration> {
        Ok(Registration {
            id: self.id,
            event_id: parse_uuid(&self.event_id)?,
            user_id: parse_uuid(&self.user_id)?,
            status: RegistrationStatus::parse(&self.status)
                .ok_or_else(|| anyhow!("Corrupt status '{}' on registration {}", self.status, self.id))?,
            registered_at: parse_timestamp(&self.registered_at)?,
        })
    }
}

/// An event together with its current seat usage.
#[derive(Debug, Clone)]
pub struct EventListing {
    pub event: Event,
    pub confirmed: u32,
    pub waitlisted: u32,
}

/// One of a user's registrations joined with its event.
#[derive(Debug, Clone)]
pub struct UserRegistration {
    pub event: Event,
    pub registration: Registration,
}

/// Fixed-width RFC 3339 in UTC, so stored timestamps sort lexically.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite defaults (datetime('now')) have no timezone; they are UTC.
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("Corrupt timestamp '{}'", s))
}

pub fn parse_uuid(s: &str) -> Result<Uuid> {
    s.parse().with_context(|| format!("Corrupt id '{}'", s))
}
