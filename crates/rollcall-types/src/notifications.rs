use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::RegistrationStatus;

/// Notifications emitted after a registration change has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Notification {
    /// The user joined an event, either with a seat or on the waitlist
    RegistrationConfirmed {
        user_id: Uuid,
        event_id: Uuid,
        event_name: String,
        status: RegistrationStatus,
    },

    /// A seat freed up and the user moved off the waitlist
    WaitlistPromoted {
        user_id: Uuid,
        event_id: Uuid,
        event_name: String,
    },

    /// The event starts later today
    EventReminder {
        user_id: Uuid,
        event_id: Uuid,
        event_name: String,
        starts_at: chrono::DateTime<chrono::Utc>,
        location: String,
    },
}

impl Notification {
    /// The user this notification is addressed to.
    pub fn recipient(&self) -> Uuid {
        match self {
            Self::RegistrationConfirmed { user_id, .. }
            | Self::WaitlistPromoted { user_id, .. }
            | Self::EventReminder { user_id, .. } => *user_id,
        }
    }

    pub fn event_id(&self) -> Uuid {
        match self {
            Self::RegistrationConfirmed { event_id, .. }
            | Self::WaitlistPromoted { event_id, .. }
            | Self::EventReminder { event_id, .. } => *event_id,
        }
    }

    /// Short mail-style subject line.
    pub fn subject(&self) -> String {
        match self {
            Self::RegistrationConfirmed { event_name, status: RegistrationStatus::Confirmed, .. } => {
                format!("Registration confirmed: {}", event_name)
            }
            Self::RegistrationConfirmed { event_name, status: RegistrationStatus::Waitlisted, .. } => {
                format!("You're on the waitlist: {}", event_name)
            }
            Self::WaitlistPromoted { event_name, .. } => {
                format!("Good news! You're in: {}", event_name)
            }
            Self::EventReminder { event_name, .. } => format!("Reminder: {} is today", event_name),
        }
    }
}
