use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Publication state of an event. Only admins move events between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    Published,
}

impl EventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            _ => None,
        }
    }
}

/// Where a registration is counted: against the main capacity or the waitlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistrationStatus {
    #[serde(rename = "confirmed")]
    Confirmed,
    #[serde(rename = "waitlist")]
    Waitlisted,
}

impl RegistrationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Waitlisted => "waitlist",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "confirmed" => Some(Self::Confirmed),
            "waitlist" => Some(Self::Waitlisted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub location: String,
    pub capacity: u32,
    pub waitlist_capacity: u32,
    pub status: EventStatus,
}

impl Event {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.starts_at + Duration::minutes(i64::from(self.duration_minutes))
    }

    pub fn is_published(&self) -> bool {
        self.status == EventStatus::Published
    }
}

/// A user's seat (or waitlist slot) in an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    /// Insertion order; breaks ties between equal `registered_at` values.
    pub id: i64,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub status: RegistrationStatus,
    pub registered_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn end_time_adds_duration() {
        let event = Event {
            id: Uuid::new_v4(),
            name: "Standup".into(),
            description: String::new(),
            starts_at: Utc.with_ymd_and_hms(2025, 10, 6, 10, 0, 0).unwrap(),
            duration_minutes: 90,
            location: "Room 1".into(),
            capacity: 5,
            waitlist_capacity: 0,
            status: EventStatus::Published,
        };
        assert_eq!(event.ends_at(), Utc.with_ymd_and_hms(2025, 10, 6, 11, 30, 0).unwrap());
    }

    #[test]
    fn waitlist_status_uses_short_wire_name() {
        assert_eq!(RegistrationStatus::Waitlisted.as_str(), "waitlist");
        assert_eq!(
            serde_json::to_string(&RegistrationStatus::Waitlisted).unwrap(),
            "\"waitlist\""
        );
        assert_eq!(RegistrationStatus::parse("pending"), None);
    }
}
