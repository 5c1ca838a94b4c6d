use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{EventStatus, RegistrationStatus, Role};

// -- JWT Claims --

/// JWT claims shared by token issuance and the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

// -- Events --

#[derive(Debug, Serialize, Deserialize)]
pub struct EventResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub date_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: u32,
    pub location: String,
    pub capacity: u32,
    pub waitlist_capacity: u32,
    pub status: EventStatus,
    pub registered_count: u32,
    pub waitlist_count: u32,
    pub available_spots: u32,
    pub available_waitlist_spots: u32,
    pub is_full: bool,
    pub is_joined: bool,
}

/// Body for creating or editing an event. A new event without a status
/// starts as a draft; an edit without one keeps the current status.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub date_time: DateTime<Utc>,
    pub duration: u32,
    pub location: String,
    pub capacity: u32,
    #[serde(default)]
    pub waitlist_capacity: u32,
    #[serde(default)]
    pub status: Option<EventStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateEventStatusRequest {
    pub status: EventStatus,
}

// -- Registration --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictingEvent {
    pub id: Uuid,
    pub name: String,
    pub date_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: Uuid,
    pub name: String,
    pub date_time: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinResponse {
    pub message: String,
    pub registration_status: RegistrationStatus,
    pub event: EventSummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MyEventResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub date_time: DateTime<Utc>,
    pub duration: u32,
    pub location: String,
    pub capacity: u32,
    pub registration_status: RegistrationStatus,
    pub registered_at: DateTime<Utc>,
}
