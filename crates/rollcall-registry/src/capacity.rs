use rollcall_types::models::{Event, RegistrationStatus};

/// Seat usage of one event at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventCapacity {
    pub capacity: u32,
    pub waitlist_capacity: u32,
    confirmed: u32,
    waitlisted: u32,
}

impl EventCapacity {
    pub fn new(event: &Event, confirmed: u32, waitlisted: u32) -> Self {
        Self {
            capacity: event.capacity,
            waitlist_capacity: event.waitlist_capacity,
            confirmed,
            waitlisted,
        }
    }

    pub fn confirmed_count(&self) -> u32 {
        self.confirmed
    }

    pub fn waitlist_count(&self) -> u32 {
        self.waitlisted
    }

    pub fn is_full(&self) -> bool {
        self.confirmed >= self.capacity
    }

    pub fn is_waitlist_full(&self) -> bool {
        self.waitlisted >= self.waitlist_capacity
    }

    pub fn available_spots(&self) -> u32 {
        self.capacity.saturating_sub(self.confirmed)
    }

    pub fn available_waitlist_spots(&self) -> u32 {
        self.waitlist_capacity.saturating_sub(self.waitlisted)
    }

    pub fn can_accept_registrations(&self) -> bool {
        !self.is_full() || !self.is_waitlist_full()
    }

    /// Status a new registration would get, or `None` when both the event
    /// and its waitlist are full.
    pub fn next_status(&self) -> Option<RegistrationStatus> {
        if !self.is_full() {
            Some(RegistrationStatus::Confirmed)
        } else if !self.is_waitlist_full() {
            Some(RegistrationStatus::Waitlisted)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rollcall_types::models::EventStatus;
    use uuid::Uuid;

    fn event(capacity: u32, waitlist_capacity: u32) -> Event {
        Event {
            id: Uuid::new_v4(),
            name: "Workshop".into(),
            description: String::new(),
            starts_at: Utc::now(),
            duration_minutes: 60,
            location: "Lab".into(),
            capacity,
            waitlist_capacity,
            status: EventStatus::Published,
        }
    }

    #[test]
    fn open_event_confirms() {
        let cap = EventCapacity::new(&event(2, 1), 1, 0);
        assert!(!cap.is_full());
        assert_eq!(cap.available_spots(), 1);
        assert_eq!(cap.next_status(), Some(RegistrationStatus::Confirmed));
    }

    #[test]
    fn full_event_falls_back_to_waitlist() {
        let cap = EventCapacity::new(&event(2, 1), 2, 0);
        assert!(cap.is_full());
        assert!(!cap.is_waitlist_full());
        assert!(cap.can_accept_registrations());
        assert_eq!(cap.next_status(), Some(RegistrationStatus::Waitlisted));
    }

    #[test]
    fn full_event_and_waitlist_rejects() {
        let cap = EventCapacity::new(&event(2, 1), 2, 1);
        assert!(!cap.can_accept_registrations());
        assert_eq!(cap.next_status(), None);
        assert_eq!(cap.available_spots(), 0);
        assert_eq!(cap.available_waitlist_spots(), 0);
    }

    #[test]
    fn zero_waitlist_is_always_full() {
        let cap = EventCapacity::new(&event(1, 0), 0, 0);
        assert!(cap.is_waitlist_full());
        assert!(cap.can_accept_registrations());
    }

    #[test]
    fn counts_above_capacity_do_not_underflow() {
        // Capacity can be lowered by an admin after seats were taken.
        let cap = EventCapacity::new(&event(1, 0), 3, 2);
        assert_eq!(cap.available_spots(), 0);
        assert_eq!(cap.available_waitlist_spots(), 0);
        assert_eq!(cap.confirmed_count(), 3);
        assert_eq!(cap.waitlist_count(), 2);
    }
}
