use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rollcall_db::Database;
use rollcall_types::api::ConflictingEvent;
use rollcall_types::models::{Event, Registration, RegistrationStatus, Role};
use rollcall_types::notifications::Notification;
use tracing::{error, info};
use uuid::Uuid;

use crate::conflict::check_conflicts;
use crate::error::RegistrationError;
use crate::notify::PostCommitHooks;
use crate::store::RegistrationStore;

/// The user a join or leave acts on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Why a join was refused. Checked in declaration order; the first failing
/// check wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinRejection {
    /// Admins manage events, they never hold registrations
    AdminForbidden,
    EventNotFound,
    NotPublished,
    AlreadyRegistered { status: RegistrationStatus },
    Conflict { conflicting_events: Vec<ConflictingEvent> },
    EventFull { available_spots: u32, available_waitlist_spots: u32 },
}

impl JoinRejection {
    pub fn code(&self) -> &'static str {
        match self {
            Self::AdminForbidden => "admin_forbidden",
            Self::EventNotFound => "event_not_found",
            Self::NotPublished => "not_published",
            Self::AlreadyRegistered { .. } => "already_registered",
            Self::Conflict { .. } => "conflict",
            Self::EventFull { .. } => "event_full",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::AdminForbidden => "Admins cannot join events",
            Self::EventNotFound | Self::NotPublished => "Event not found",
            Self::AlreadyRegistered { .. } => "You are already registered for this event",
            Self::Conflict { .. } => "You have a scheduling conflict with another event",
            Self::EventFull { .. } => "Event is full and waitlist is also full",
        }
    }
}

#[derive(Debug, Clone)]
pub enum JoinOutcome {
    Registered { registration: Registration, event: Event },
    Rejected(JoinRejection),
}

impl JoinOutcome {
    pub fn rejected(self) -> Option<JoinRejection> {
        match self {
            Self::Rejected(r) => Some(r),
            Self::Registered { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveRejection {
    NotRegistered,
}

impl LeaveRejection {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotRegistered => "not_registered",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::NotRegistered => "You are not registered for this event",
        }
    }
}

#[derive(Debug, Clone)]
pub enum LeaveOutcome {
    Left {
        event: Event,
        previous: RegistrationStatus,
        /// The waitlisted registration moved into the freed seat, if any.
        promoted: Option<Registration>,
    },
    Rejected(LeaveRejection),
}

/// Result of an admin edit. Raising the capacity moves waitlisted
/// registrations into the new seats, oldest first.
#[derive(Debug, Clone)]
pub struct EventUpdate {
    pub event: Event,
    pub promoted: Vec<Registration>,
}

/// Runs join and leave transitions against the database and fires
/// notifications once they have committed.
#[derive(Clone)]
pub struct RegistrationEngine {
    db: Arc<Database>,
    hooks: PostCommitHooks,
}

impl RegistrationEngine {
    pub fn new(db: Arc<Database>, hooks: PostCommitHooks) -> Self {
        Self { db, hooks }
    }

    pub fn join(&self, actor: &Actor, event_id: Uuid) -> Result<JoinOutcome, RegistrationError> {
        self.join_at(actor, event_id, Utc::now())
    }

    pub fn join_at(
        &self,
        actor: &Actor,
        event_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<JoinOutcome, RegistrationError> {
        // Admins never touch the store.
        if actor.is_admin() {
            return Ok(JoinOutcome::Rejected(JoinRejection::AdminForbidden));
        }

        let outcome = self
            .db
            .transaction(|tx| decide_join(tx, actor, event_id, now))
            .map_err(|e| {
                error!(user_id = %actor.id, event_id = %event_id, "Event registration failed: {:#}", e);
                RegistrationError::from(e)
            })?;

        if let JoinOutcome::Registered { registration, event } = &outcome {
            info!(
                user_id = %actor.id,
                event_id = %event.id,
                event_name = %event.name,
                status = registration.status.as_str(),
                "User registered for event"
            );
            self.hooks.dispatch(&Notification::RegistrationConfirmed {
                user_id: actor.id,
                event_id: event.id,
                event_name: event.name.clone(),
                status: registration.status,
            });
        }

        Ok(outcome)
    }

    pub fn leave(&self, actor: &Actor, event_id: Uuid) -> Result<LeaveOutcome, RegistrationError> {
        let outcome = self
            .db
            .transaction(|tx| decide_leave(tx, actor, event_id))
            .map_err(|e| {
                error!(user_id = %actor.id, event_id = %event_id, "Failed to leave event: {:#}", e);
                RegistrationError::from(e)
            })?;

        if let LeaveOutcome::Left { event, previous, promoted } = &outcome {
            info!(
                user_id = %actor.id,
                event_id = %event.id,
                status = previous.as_str(),
                "User left event"
            );
            if let Some(promoted) = promoted {
                info!(
                    promoted_user_id = %promoted.user_id,
                    event_id = %event.id,
                    event_name = %event.name,
                    "User promoted from waitlist"
                );
                self.hooks.dispatch(&Notification::WaitlistPromoted {
                    user_id: promoted.user_id,
                    event_id: event.id,
                    event_name: event.name.clone(),
                });
            }
        }

        Ok(outcome)
    }

    /// Save an edited event. Returns `None` when the event does not exist.
    ///
    /// Lowering the capacity never demotes confirmed registrations; the
    /// surplus drains as confirmed users leave.
    pub fn update_event(&self, event: Event) -> Result<Option<EventUpdate>, RegistrationError> {
        let event_id = event.id;
        let update = self
            .db
            .transaction(|tx| decide_update(tx, event))
            .map_err(|e| {
                error!(event_id = %event_id, "Event update failed: {:#}", e);
                RegistrationError::from(e)
            })?;

        if let Some(EventUpdate { event, promoted }) = &update {
            info!(event_id = %event.id, promoted = promoted.len(), "Event updated");
            for registration in promoted {
                info!(
                    promoted_user_id = %registration.user_id,
                    event_id = %event.id,
                    event_name = %event.name,
                    "User promoted from waitlist"
                );
                self.hooks.dispatch(&Notification::WaitlistPromoted {
                    user_id: registration.user_id,
                    event_id: event.id,
                    event_name: event.name.clone(),
                });
            }
        }

        Ok(update)
    }
}

/// Join preconditions and insert. Must run inside one transaction so the
/// capacity read is the state the insert commits against.
pub fn decide_join<S: RegistrationStore>(
    store: &S,
    actor: &Actor,
    event_id: Uuid,
    now: DateTime<Utc>,
) -> Result<JoinOutcome> {
    let reject = |r: JoinRejection| -> Result<JoinOutcome> { Ok(JoinOutcome::Rejected(r)) };

    if actor.is_admin() {
        return reject(JoinRejection::AdminForbidden);
    }

    let Some(event) = store.event(event_id)? else {
        return reject(JoinRejection::EventNotFound);
    };
    if !event.is_published() {
        return reject(JoinRejection::NotPublished);
    }

    if let Some(existing) = store.registration(actor.id, event.id)? {
        return reject(JoinRejection::AlreadyRegistered { status: existing.status });
    }

    let conflicting_events = check_conflicts(store, actor.id, &event)?;
    if !conflicting_events.is_empty() {
        return reject(JoinRejection::Conflict { conflicting_events });
    }

    let capacity = store.capacity(&event)?;
    let Some(status) = capacity.next_status() else {
        return reject(JoinRejection::EventFull {
            available_spots: 0,
            available_waitlist_spots: 0,
        });
    };

    let registration = store.insert_registration(actor.id, event.id, status, now)?;
    Ok(JoinOutcome::Registered { registration, event })
}

/// Delete the actor's registration and, if it held a seat, promote the head
/// of the waitlist. Must run inside one transaction.
pub fn decide_leave<S: RegistrationStore>(store: &S, actor: &Actor, event_id: Uuid) -> Result<LeaveOutcome> {
    let Some(registration) = store.registration(actor.id, event_id)? else {
        return Ok(LeaveOutcome::Rejected(LeaveRejection::NotRegistered));
    };
    let event = store
        .event(event_id)?
        .ok_or_else(|| anyhow!("Registration {} points at missing event {}", registration.id, event_id))?;

    store.delete_registration(registration.id)?;

    let promoted = match registration.status {
        RegistrationStatus::Confirmed => promote_next(store, &event)?,
        RegistrationStatus::Waitlisted => None,
    };

    Ok(LeaveOutcome::Left {
        event,
        previous: registration.status,
        promoted,
    })
}

/// Write the edited event, then fill any seats it opened from the waitlist.
pub fn decide_update<S: RegistrationStore>(store: &S, event: Event) -> Result<Option<EventUpdate>> {
    if !store.update_event(&event)? {
        return Ok(None);
    }

    let mut promoted = Vec::new();
    while let Some(registration) = promote_next(store, &event)? {
        promoted.push(registration);
    }
    Ok(Some(EventUpdate { event, promoted }))
}

fn promote_next<S: RegistrationStore>(store: &S, event: &Event) -> Result<Option<Registration>> {
    // Seats may already be over-subscribed if an admin lowered the capacity.
    if store.capacity(event)?.is_full() {
        return Ok(None);
    }

    let Some(mut next) = store.earliest_waitlisted(event.id)? else {
        return Ok(None);
    };
    store.update_status(next.id, RegistrationStatus::Confirmed)?;
    next.status = RegistrationStatus::Confirmed;
    Ok(Some(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::has_conflict;
    use crate::notify::RecordingNotifier;
    use chrono::{Duration, TimeZone};
    use rollcall_types::models::EventStatus;

    struct Fixture {
        db: Arc<Database>,
        engine: RegistrationEngine,
        recorder: RecordingNotifier,
    }

    impl Fixture {
        fn new() -> Self {
            let db = Arc::new(Database::open_in_memory().unwrap());
            let recorder = RecordingNotifier::new();
            let engine = RegistrationEngine::new(db.clone(), PostCommitHooks::new().with(recorder.clone()));
            Self { db, engine, recorder }
        }

        fn user(&self, name: &str) -> Actor {
            self.actor(name, Role::User)
        }

        fn actor(&self, name: &str, role: Role) -> Actor {
            let id = Uuid::new_v4();
            self.db.create_user(&id.to_string(), name, "hash", role).unwrap();
            Actor::new(id, role)
        }

        fn event(&self, capacity: u32, waitlist_capacity: u32) -> Event {
            self.event_at(base_time(), 120, capacity, waitlist_capacity)
        }

        fn event_at(&self, starts_at: DateTime<Utc>, duration_minutes: u32, capacity: u32, waitlist_capacity: u32) -> Event {
            let event = Event {
                id: Uuid::new_v4(),
                name: format!("Event at {}", starts_at.format("%H:%M")),
                description: String::new(),
                starts_at,
                duration_minutes,
                location: "Main hall".into(),
                capacity,
                waitlist_capacity,
                status: EventStatus::Published,
            };
            self.db.insert_event(&event).unwrap();
            event
        }

        fn join(&self, actor: &Actor, event: &Event) -> JoinOutcome {
            self.engine.join(actor, event.id).unwrap()
        }

        fn status(&self, actor: &Actor, event: &Event) -> Option<RegistrationStatus> {
            self.db
                .transaction(|tx| tx.registration(actor.id, event.id))
                .unwrap()
                .map(|r| r.status)
        }

        fn counts(&self, event: &Event) -> (u32, u32) {
            let listing = self.db.get_event(event.id).unwrap().unwrap();
            (listing.confirmed, listing.waitlisted)
        }
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 6, 10, 0, 0).unwrap()
    }

    fn registered_status(outcome: &JoinOutcome) -> RegistrationStatus {
        match outcome {
            JoinOutcome::Registered { registration, .. } => registration.status,
            JoinOutcome::Rejected(r) => panic!("expected registration, got {:?}", r),
        }
    }

    fn rejection(outcome: JoinOutcome) -> JoinRejection {
        match outcome {
            JoinOutcome::Rejected(r) => r,
            JoinOutcome::Registered { .. } => panic!("expected rejection"),
        }
    }

    #[test]
    fn capacity_then_waitlist_then_full_then_promotion() {
        let f = Fixture::new();
        let event = f.event(2, 1);
        let (a, b, c, d) = (f.user("a"), f.user("b"), f.user("c"), f.user("d"));

        assert_eq!(registered_status(&f.join(&a, &event)), RegistrationStatus::Confirmed);
        assert_eq!(registered_status(&f.join(&b, &event)), RegistrationStatus::Confirmed);
        assert_eq!(registered_status(&f.join(&c, &event)), RegistrationStatus::Waitlisted);
        assert_eq!(
            rejection(f.join(&d, &event)),
            JoinRejection::EventFull { available_spots: 0, available_waitlist_spots: 0 }
        );
        assert_eq!(f.counts(&event), (2, 1));

        let outcome = f.engine.leave(&a, event.id).unwrap();
        let LeaveOutcome::Left { previous, promoted, .. } = outcome else {
            panic!("leave rejected");
        };
        assert_eq!(previous, RegistrationStatus::Confirmed);
        assert_eq!(promoted.map(|r| r.user_id), Some(c.id));
        assert_eq!(f.status(&c, &event), Some(RegistrationStatus::Confirmed));
        assert_eq!(f.counts(&event), (2, 0));

        let promotions: Vec<_> = f
            .recorder
            .sent()
            .into_iter()
            .filter(|n| matches!(n, Notification::WaitlistPromoted { .. }))
            .collect();
        assert_eq!(
            promotions,
            vec![Notification::WaitlistPromoted {
                user_id: c.id,
                event_id: event.id,
                event_name: event.name.clone(),
            }]
        );
    }

    #[test]
    fn join_sends_confirmation_with_status() {
        let f = Fixture::new();
        let event = f.event(1, 1);
        let (a, b) = (f.user("a"), f.user("b"));
        f.join(&a, &event);
        f.join(&b, &event);

        let statuses: Vec<_> = f
            .recorder
            .sent()
            .into_iter()
            .map(|n| match n {
                Notification::RegistrationConfirmed { user_id, status, .. } => (user_id, status),
                other => panic!("unexpected notification {:?}", other),
            })
            .collect();
        assert_eq!(
            statuses,
            vec![(a.id, RegistrationStatus::Confirmed), (b.id, RegistrationStatus::Waitlisted)]
        );
    }

    #[test]
    fn promotion_follows_registration_order() {
        let f = Fixture::new();
        let event = f.event(1, 2);
        let (owner, first, second) = (f.user("owner"), f.user("first"), f.user("second"));
        let t0 = base_time() - Duration::days(3);

        f.engine.join_at(&owner, event.id, t0).unwrap();
        // Registered out of insertion order: `first` has the earlier timestamp.
        f.engine.join_at(&second, event.id, t0 + Duration::minutes(10)).unwrap();
        f.engine.join_at(&first, event.id, t0 + Duration::minutes(5)).unwrap();

        let LeaveOutcome::Left { promoted, .. } = f.engine.leave(&owner, event.id).unwrap() else {
            panic!("leave rejected");
        };
        assert_eq!(promoted.map(|r| r.user_id), Some(first.id));
        assert_eq!(f.status(&second, &event), Some(RegistrationStatus::Waitlisted));
    }

    #[test]
    fn equal_timestamps_promote_earliest_insert() {
        let f = Fixture::new();
        let event = f.event(1, 2);
        let (owner, first, second) = (f.user("owner"), f.user("first"), f.user("second"));
        let t0 = base_time() - Duration::days(1);

        for actor in [&owner, &first, &second] {
            f.engine.join_at(actor, event.id, t0).unwrap();
        }

        let LeaveOutcome::Left { promoted, .. } = f.engine.leave(&owner, event.id).unwrap() else {
            panic!("leave rejected");
        };
        assert_eq!(promoted.map(|r| r.user_id), Some(first.id));
    }

    #[test]
    fn leaving_waitlist_promotes_nobody() {
        let f = Fixture::new();
        let event = f.event(1, 2);
        let (a, b, c) = (f.user("a"), f.user("b"), f.user("c"));
        for actor in [&a, &b, &c] {
            f.join(actor, &event);
        }

        let LeaveOutcome::Left { previous, promoted, .. } = f.engine.leave(&b, event.id).unwrap() else {
            panic!("leave rejected");
        };
        assert_eq!(previous, RegistrationStatus::Waitlisted);
        assert!(promoted.is_none());
        assert_eq!(f.status(&a, &event), Some(RegistrationStatus::Confirmed));
        assert_eq!(f.status(&c, &event), Some(RegistrationStatus::Waitlisted));
        assert_eq!(f.counts(&event), (1, 1));
    }

    #[test]
    fn leave_without_registration_is_rejected() {
        let f = Fixture::new();
        let event = f.event(1, 0);
        let (a, stranger) = (f.user("a"), f.user("stranger"));
        f.join(&a, &event);

        let outcome = f.engine.leave(&stranger, event.id).unwrap();
        assert!(matches!(outcome, LeaveOutcome::Rejected(LeaveRejection::NotRegistered)));
        assert_eq!(f.counts(&event), (1, 0));
        assert_eq!(f.status(&a, &event), Some(RegistrationStatus::Confirmed));
    }

    #[test]
    fn join_then_leave_leaves_no_row() {
        let f = Fixture::new();
        let event = f.event(3, 0);
        let a = f.user("a");

        f.join(&a, &event);
        assert!(matches!(f.engine.leave(&a, event.id).unwrap(), LeaveOutcome::Left { .. }));
        assert_eq!(f.status(&a, &event), None);
        assert_eq!(f.counts(&event), (0, 0));
        assert!(f.db.registered_event_ids(a.id).unwrap().is_empty());

        // And the user can come back.
        assert_eq!(registered_status(&f.join(&a, &event)), RegistrationStatus::Confirmed);
    }

    #[test]
    fn preconditions_are_checked_in_order() {
        let f = Fixture::new();
        let admin = f.actor("root", Role::Admin);
        let a = f.user("a");

        // Admin wins over everything, even a missing event.
        assert_eq!(
            f.engine.join(&admin, Uuid::new_v4()).unwrap().rejected(),
            Some(JoinRejection::AdminForbidden)
        );
        assert_eq!(
            f.engine.join(&a, Uuid::new_v4()).unwrap().rejected(),
            Some(JoinRejection::EventNotFound)
        );

        let draft = f.event(1, 0);
        f.db.set_event_status(draft.id, EventStatus::Draft).unwrap();
        assert_eq!(rejection(f.join(&a, &draft)), JoinRejection::NotPublished);

        // Already registered is reported before the event being full.
        let tiny = f.event_at(base_time() + Duration::days(2), 60, 1, 0);
        f.join(&a, &tiny);
        assert_eq!(
            rejection(f.join(&a, &tiny)),
            JoinRejection::AlreadyRegistered { status: RegistrationStatus::Confirmed }
        );
    }

    #[test]
    fn conflict_is_reported_before_capacity() {
        let f = Fixture::new();
        let a = f.user("a");
        let x = f.event_at(base_time(), 120, 5, 0);
        let filler = f.user("filler");
        let z = f.event_at(base_time() + Duration::minutes(119), 61, 1, 0);
        f.join(&filler, &z);

        f.join(&a, &x);
        let JoinRejection::Conflict { conflicting_events } = rejection(f.join(&a, &z)) else {
            panic!("expected conflict");
        };
        assert_eq!(conflicting_events.len(), 1);
        assert_eq!(conflicting_events[0].id, x.id);
        assert_eq!(conflicting_events[0].name, x.name);
        assert_eq!(conflicting_events[0].end_time, x.ends_at());
    }

    #[test]
    fn waitlisted_events_count_for_conflicts() {
        let f = Fixture::new();
        let (holder, a) = (f.user("holder"), f.user("a"));
        let x = f.event_at(base_time(), 120, 1, 1);
        f.join(&holder, &x);
        assert_eq!(registered_status(&f.join(&a, &x)), RegistrationStatus::Waitlisted);

        let overlapping = f.event_at(base_time() + Duration::minutes(30), 30, 5, 0);
        assert!(f.db.transaction(|tx| has_conflict(tx, a.id, &overlapping)).unwrap());
        assert!(matches!(rejection(f.join(&a, &overlapping)), JoinRejection::Conflict { .. }));
    }

    #[test]
    fn lowering_capacity_keeps_seats_until_they_drain() {
        let f = Fixture::new();
        let mut event = f.event(2, 1);
        let (a, b, c) = (f.user("a"), f.user("b"), f.user("c"));
        f.join(&a, &event);
        f.join(&b, &event);
        f.join(&c, &event);

        event.capacity = 1;
        let update = f.engine.update_event(event.clone()).unwrap().unwrap();
        assert!(update.promoted.is_empty());
        assert_eq!(f.counts(&event), (2, 1));
        assert_eq!(f.status(&a, &event), Some(RegistrationStatus::Confirmed));

        // Still at capacity after the first leave, so nobody moves up.
        let LeaveOutcome::Left { promoted, .. } = f.engine.leave(&a, event.id).unwrap() else {
            panic!("leave rejected");
        };
        assert!(promoted.is_none());
        assert_eq!(f.counts(&event), (1, 1));

        let LeaveOutcome::Left { promoted, .. } = f.engine.leave(&b, event.id).unwrap() else {
            panic!("leave rejected");
        };
        assert_eq!(promoted.map(|r| r.user_id), Some(c.id));
        assert_eq!(f.counts(&event), (1, 0));
    }

    #[test]
    fn raising_capacity_promotes_the_waitlist_in_order() {
        let f = Fixture::new();
        let mut event = f.event(1, 3);
        let (a, b, c, d) = (f.user("a"), f.user("b"), f.user("c"), f.user("d"));
        for user in [&a, &b, &c, &d] {
            f.join(user, &event);
        }
        assert_eq!(f.counts(&event), (1, 3));

        event.capacity = 3;
        let update = f.engine.update_event(event.clone()).unwrap().unwrap();
        let promoted: Vec<Uuid> = update.promoted.iter().map(|r| r.user_id).collect();
        assert_eq!(promoted, vec![b.id, c.id]);
        assert_eq!(f.counts(&event), (3, 1));
        assert_eq!(f.status(&d, &event), Some(RegistrationStatus::Waitlisted));

        let notified: Vec<Uuid> = f
            .recorder
            .sent()
            .into_iter()
            .filter_map(|n| match n {
                Notification::WaitlistPromoted { user_id, .. } => Some(user_id),
                _ => None,
            })
            .collect();
        assert_eq!(notified, vec![b.id, c.id]);
    }

    #[test]
    fn updating_a_missing_event_changes_nothing() {
        let f = Fixture::new();
        let event = Event {
            id: Uuid::new_v4(),
            name: "Ghost".into(),
            description: String::new(),
            starts_at: base_time(),
            duration_minutes: 60,
            location: "Nowhere".into(),
            capacity: 1,
            waitlist_capacity: 0,
            status: EventStatus::Published,
        };
        assert!(f.engine.update_event(event).unwrap().is_none());
        assert!(f.recorder.sent().is_empty());
    }

    #[test]
    fn back_to_back_join_is_allowed() {
        let f = Fixture::new();
        let a = f.user("a");
        let x = f.event_at(base_time(), 120, 5, 0);
        let y = f.event_at(base_time() + Duration::hours(2), 60, 5, 0);

        f.join(&a, &x);
        assert_eq!(registered_status(&f.join(&a, &y)), RegistrationStatus::Confirmed);
    }

    #[test]
    fn concurrent_joins_never_overfill() {
        let f = Fixture::new();
        let event = f.event(3, 0);
        let holders: Vec<Actor> = (0..2).map(|i| f.user(&format!("holder{}", i))).collect();
        for h in &holders {
            f.join(h, &event);
        }

        let racers: Vec<Actor> = (0..16).map(|i| f.user(&format!("racer{}", i))).collect();
        let outcomes: Vec<JoinOutcome> = std::thread::scope(|s| {
            let handles: Vec<_> = racers
                .iter()
                .map(|actor| {
                    let engine = f.engine.clone();
                    let event_id = event.id;
                    s.spawn(move || engine.join(actor, event_id).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let successes = outcomes
            .iter()
            .filter(|o| matches!(o, JoinOutcome::Registered { .. }))
            .count();
        let full = outcomes
            .iter()
            .filter(|o| matches!(o, JoinOutcome::Rejected(JoinRejection::EventFull { .. })))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(full, racers.len() - 1);
        assert_eq!(f.counts(&event), (3, 0));
    }

    #[test]
    fn concurrent_leaves_promote_each_waitlister_once() {
        let f = Fixture::new();
        let event = f.event(4, 4);
        let confirmed: Vec<Actor> = (0..4).map(|i| f.user(&format!("c{}", i))).collect();
        let waiting: Vec<Actor> = (0..4).map(|i| f.user(&format!("w{}", i))).collect();
        for actor in confirmed.iter().chain(&waiting) {
            f.join(actor, &event);
        }
        assert_eq!(f.counts(&event), (4, 4));

        let promoted: Vec<Uuid> = std::thread::scope(|s| {
            let handles: Vec<_> = confirmed
                .iter()
                .map(|actor| {
                    let engine = f.engine.clone();
                    let event_id = event.id;
                    s.spawn(move || match engine.leave(actor, event_id).unwrap() {
                        LeaveOutcome::Left { promoted, .. } => promoted.map(|r| r.user_id),
                        LeaveOutcome::Rejected(r) => panic!("leave rejected: {:?}", r),
                    })
                })
                .collect();
            handles.into_iter().filter_map(|h| h.join().unwrap()).collect()
        });

        let mut promoted_sorted = promoted.clone();
        promoted_sorted.sort();
        promoted_sorted.dedup();
        assert_eq!(promoted_sorted.len(), 4);
        assert_eq!(f.counts(&event), (4, 0));
    }

    #[test]
    fn storage_failure_is_a_fault_and_changes_nothing() {
        let f = Fixture::new();
        let event = f.event(2, 0);
        let a = f.user("a");
        f.join(&a, &event);

        f.db
            .with_conn(|conn| {
                conn.execute_batch("CREATE TRIGGER block_deletes BEFORE DELETE ON registrations BEGIN SELECT RAISE(ABORT, 'disk on fire'); END;")?;
                Ok(())
            })
            .unwrap();

        let sent_before = f.recorder.sent().len();
        let err = f.engine.leave(&a, event.id).unwrap_err();
        assert!(matches!(err, RegistrationError::Storage(_)));
        assert_eq!(f.status(&a, &event), Some(RegistrationStatus::Confirmed));
        assert_eq!(f.recorder.sent().len(), sent_before);
    }

    #[test]
    fn admins_never_hold_registrations() {
        let f = Fixture::new();
        let event = f.event(5, 5);
        let admin = f.actor("root", Role::Admin);

        assert_eq!(rejection(f.join(&admin, &event)), JoinRejection::AdminForbidden);
        assert!(matches!(
            f.engine.leave(&admin, event.id).unwrap(),
            LeaveOutcome::Rejected(LeaveRejection::NotRegistered)
        ));
        assert!(f.recorder.sent().is_empty());
    }
}
