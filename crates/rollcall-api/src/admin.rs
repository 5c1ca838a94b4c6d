use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;
use uuid::Uuid;

use rollcall_db::models::EventListing;
use rollcall_types::api::{Claims, EventRequest, UpdateEventStatusRequest};
use rollcall_types::models::{Event, EventStatus, Role};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};
use crate::events::event_response;
use crate::extract::{ApiJson, ApiPath};

fn require_admin(claims: &Claims) -> Result<(), ApiError> {
    if claims.role == Role::Admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

fn validate(req: &EventRequest) -> Result<(), ApiError> {
    if req.name.trim().is_empty() || req.name.chars().count() > 255 {
        return Err(ApiError::BadRequest("Name must be 1 to 255 characters"));
    }
    if req.location.trim().is_empty() {
        return Err(ApiError::BadRequest("Location is required"));
    }
    if req.duration < 1 {
        return Err(ApiError::BadRequest("Duration must be at least 1 minute"));
    }
    if req.capacity < 1 {
        return Err(ApiError::BadRequest("Capacity must be at least 1"));
    }
    Ok(())
}

fn build_event(id: Uuid, req: EventRequest, status: EventStatus) -> Event {
    Event {
        id,
        name: req.name,
        description: req.description,
        starts_at: req.date_time,
        duration_minutes: req.duration,
        location: req.location,
        capacity: req.capacity,
        waitlist_capacity: req.waitlist_capacity,
        status,
    }
}

/// POST /admin/events
pub async fn create_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<EventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&claims)?;
    validate(&req)?;

    let status = req.status.unwrap_or(EventStatus::Draft);
    let event = build_event(Uuid::new_v4(), req, status);

    let db = state.db.clone();
    let stored = event.clone();
    blocking(move || Ok(db.insert_event(&stored)?)).await?;

    info!(event_id = %event.id, admin_id = %claims.sub, "Event created");

    let listing = EventListing {
        event,
        confirmed: 0,
        waitlisted: 0,
    };
    Ok((StatusCode::CREATED, Json(event_response(listing, false))))
}

/// PUT /admin/events/{event_id}
///
/// Seats opened by a larger capacity go to the waitlist, oldest first.
pub async fn update_event(
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<EventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&claims)?;
    validate(&req)?;

    let db = state.db.clone();
    let engine = state.engine.clone();
    let (listing, promoted) = blocking(move || {
        let current = db.get_event(event_id)?.ok_or(ApiError::NotFound)?;
        let status = req.status.unwrap_or(current.event.status);
        let update = engine
            .update_event(build_event(event_id, req, status))?
            .ok_or(ApiError::NotFound)?;
        let listing = db.get_event(event_id)?.ok_or(ApiError::NotFound)?;
        Ok((listing, update.promoted.len()))
    })
    .await?;

    info!(event_id = %event_id, admin_id = %claims.sub, promoted, "Event edited");

    Ok(Json(event_response(listing, false)))
}

/// DELETE /admin/events/{event_id}
pub async fn delete_event(
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&claims)?;

    let db = state.db.clone();
    let deleted = blocking(move || Ok(db.delete_event(event_id)?)).await?;
    if !deleted {
        return Err(ApiError::NotFound);
    }

    info!(event_id = %event_id, admin_id = %claims.sub, "Event deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /admin/events/{event_id}/status
pub async fn update_event_status(
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateEventStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&claims)?;

    let db = state.db.clone();
    let listing = blocking(move || {
        if !db.set_event_status(event_id, req.status)? {
            return Err(ApiError::NotFound);
        }
        db.get_event(event_id)?.ok_or(ApiError::NotFound)
    })
    .await?;

    info!(
        event_id = %event_id,
        admin_id = %claims.sub,
        status = listing.event.status.as_str(),
        "Event status updated"
    );

    Ok(Json(event_response(listing, false)))
}
