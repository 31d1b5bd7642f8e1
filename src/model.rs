use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::calendar::DayKey;

/// The two fixed on-site cohorts of the weekly rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Batch {
    One,
    Two,
}

impl std::fmt::Display for Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Batch::One => write!(f, "1"),
            Batch::Two => write!(f, "2"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Employee,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeatType {
    /// Bookable only by the on-site batch for that day.
    Designated,
    /// Bookable only by the off-site batch, behind the daily unlock gate.
    Floating,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: Ulid,
    pub name: String,
    /// Stable external badge id, unique across the population.
    pub employee_id: String,
    pub batch: Batch,
    /// Informational grouping (1..=8); never consulted by booking rules.
    pub squad: u8,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: Ulid,
    pub seat_number: String,
    pub seat_type: SeatType,
    /// Soft-disable: inactive seats are invisible to availability and booking.
    pub is_active: bool,
}

/// Monotonic lifecycle: Confirmed → Released | Completed; both terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Confirmed,
    Released,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub employee: Ulid,
    pub seat: Ulid,
    /// Canonical day-key — never a sub-day timestamp.
    pub day: DayKey,
    /// Seat type frozen at booking time.
    pub booking_type: SeatType,
    pub status: BookingStatus,
    pub booked_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

/// Per-ISO-week administrative override, upserted by an admin and read-only
/// to the rule engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleOverride {
    pub week: u32,
    pub extra_floating_seats: u32,
    /// Reserved for future rule extensions; currently capacity-only.
    pub is_team_day: bool,
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    EmployeeAdded {
        id: Ulid,
        name: String,
        employee_id: String,
        batch: Batch,
        squad: u8,
        role: Role,
    },
    SeatAdded {
        id: Ulid,
        seat_number: String,
        seat_type: SeatType,
        is_active: bool,
    },
    SeatUpdated {
        id: Ulid,
        seat_type: SeatType,
        is_active: bool,
    },
    BookingConfirmed {
        id: Ulid,
        employee: Ulid,
        seat: Ulid,
        day: DayKey,
        booking_type: SeatType,
        booked_at: DateTime<Utc>,
    },
    BookingReleased {
        id: Ulid,
        released_at: DateTime<Utc>,
    },
    /// Bulk end-of-day finalization: every booking still confirmed for `day`
    /// becomes completed. Re-applying is a no-op.
    DayFinalized {
        day: DayKey,
    },
    OverrideUpserted {
        week: u32,
        extra_floating_seats: u32,
        is_team_day: bool,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counts {
    pub total: u32,
    pub booked: u32,
    pub available: u32,
}

impl Counts {
    pub fn new(total: u32, booked: u32) -> Self {
        Self {
            total,
            booked,
            // Display floor only — the accept decision never reads this.
            available: total.saturating_sub(booked),
        }
    }
}

/// Seat-type-partitioned availability for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Availability {
    pub designated: Counts,
    pub floating: Counts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_never_go_negative() {
        let c = Counts::new(10, 3);
        assert_eq!(c.available, 7);
        // Admin shrank the pool below the booked count: tolerated, floored.
        let over = Counts::new(2, 5);
        assert_eq!(over.available, 0);
        assert_eq!(over.booked, 5);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::BookingConfirmed {
            id: Ulid::new(),
            employee: Ulid::new(),
            seat: Ulid::new(),
            day: "2025-06-09".parse().unwrap(),
            booking_type: SeatType::Floating,
            booked_at: "2025-06-08T15:04:05Z".parse().unwrap(),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
