use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use rollcall_db::models::EventListing;
use rollcall_db::queries::EventFilter;
use rollcall_registry::capacity::EventCapacity;
use rollcall_registry::conflict::day_bounds;
use rollcall_registry::{JoinOutcome, LeaveOutcome};
use rollcall_types::api::{Claims, EventResponse, EventSummary, JoinResponse, MyEventResponse};
use rollcall_types::models::{RegistrationStatus, Role};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};
use crate::extract::{ApiPath, ApiQuery};
use crate::middleware::actor;

/// `start_date` and `end_date` take a plain date (`2030-01-31`, whole day
/// included) or an RFC 3339 timestamp. The range only applies when both are
/// present.
#[derive(Debug, Deserialize)]
pub struct EventQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl EventQuery {
    fn window(&self) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, ApiError> {
        let (Some(start), Some(end)) = (&self.start_date, &self.end_date) else {
            return Ok(None);
        };
        Ok(Some((range_start(start)?, range_end(end)?)))
    }
}

fn range_start(value: &str) -> Result<DateTime<Utc>, ApiError> {
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => Ok(day_bounds(date.and_time(NaiveTime::MIN).and_utc()).0),
        Err(_) => parse_instant(value),
    }
}

/// Exclusive upper bound that still includes `value` itself.
fn range_end(value: &str) -> Result<DateTime<Utc>, ApiError> {
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => Ok(day_bounds(date.and_time(NaiveTime::MIN).and_utc()).1),
        Err(_) => Ok(parse_instant(value)? + Duration::microseconds(1)),
    }
}

fn parse_instant(value: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| ApiError::BadRequest("Dates must be YYYY-MM-DD or RFC 3339 timestamps"))
}

/// GET /events: published events for users, every event for admins.
pub async fn list_events(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EventQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = EventFilter {
        published_only: claims.role != Role::Admin,
        window: query.window()?,
    };

    let db = state.db.clone();
    let (listings, joined) = blocking(move || {
        let listings = db.list_events(filter)?;
        let joined: HashSet<Uuid> = db.registered_event_ids(claims.sub)?.into_iter().collect();
        Ok((listings, joined))
    })
    .await?;

    let events: Vec<EventResponse> = listings
        .into_iter()
        .map(|listing| {
            let is_joined = joined.contains(&listing.event.id);
            event_response(listing, is_joined)
        })
        .collect();

    Ok(Json(events))
}

/// GET /events/{event_id}: drafts are only visible to admins.
pub async fn get_event(
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let (listing, joined) = blocking(move || {
        let listing = db.get_event(event_id)?.ok_or(ApiError::NotFound)?;
        let joined = db.registered_event_ids(claims.sub)?.contains(&event_id);
        Ok((listing, joined))
    })
    .await?;

    if claims.role != Role::Admin && !listing.event.is_published() {
        return Err(ApiError::NotFound);
    }

    Ok(Json(event_response(listing, joined)))
}

/// POST /events/{event_id}/join
pub async fn join_event(
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = state.engine.clone();
    let actor = actor(&claims);
    let outcome = blocking(move || Ok(engine.join(&actor, event_id)?)).await?;

    let (registration, event) = match outcome {
        JoinOutcome::Registered { registration, event } => (registration, event),
        JoinOutcome::Rejected(rejection) => return Err(ApiError::Join(rejection)),
    };

    let message = match registration.status {
        RegistrationStatus::Confirmed => "Successfully registered for event. Confirmation email sent.",
        RegistrationStatus::Waitlisted => {
            "Event is full. You have been added to the waitlist. Confirmation email sent."
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(JoinResponse {
            message: message.to_string(),
            registration_status: registration.status,
            event: EventSummary {
                id: event.id,
                name: event.name,
                date_time: event.starts_at,
            },
        }),
    ))
}

/// POST /events/{event_id}/leave
pub async fn leave_event(
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = state.engine.clone();
    let actor = actor(&claims);
    let outcome = blocking(move || Ok(engine.leave(&actor, event_id)?)).await?;

    match outcome {
        LeaveOutcome::Left { .. } => Ok(Json(json!({ "message": "Successfully left the event" }))),
        LeaveOutcome::Rejected(rejection) => Err(ApiError::Leave(rejection)),
    }
}

/// GET /my-events: the caller's registrations, soonest first.
pub async fn my_events(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let rows = blocking(move || Ok(db.user_registrations(claims.sub)?)).await?;

    let events: Vec<MyEventResponse> = rows
        .into_iter()
        .map(|row| MyEventResponse {
            id: row.event.id,
            name: row.event.name,
            description: row.event.description,
            date_time: row.event.starts_at,
            duration: row.event.duration_minutes,
            location: row.event.location,
            capacity: row.event.capacity,
            registration_status: row.registration.status,
            registered_at: row.registration.registered_at,
        })
        .collect();

    Ok(Json(events))
}

pub(crate) fn event_response(listing: EventListing, is_joined: bool) -> EventResponse {
    let capacity = EventCapacity::new(&listing.event, listing.confirmed, listing.waitlisted);
    let end_time = listing.event.ends_at();
    let event = listing.event;

    EventResponse {
        id: event.id,
        name: event.name,
        description: event.description,
        date_time: event.starts_at,
        end_time,
        duration: event.duration_minutes,
        location: event.location,
        capacity: event.capacity,
        waitlist_capacity: event.waitlist_capacity,
        status: event.status,
        registered_count: capacity.confirmed_count(),
        waitlist_count: capacity.waitlist_count(),
        available_spots: capacity.available_spots(),
        available_waitlist_spots: capacity.available_waitlist_spots(),
        is_full: capacity.is_full(),
        is_joined,
    }
}
