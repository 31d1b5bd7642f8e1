//! The booking rule engine: a pure decision function over a state snapshot.
//!
//! Nothing here reads the clock or touches storage — the caller supplies
//! `now` and a [`BookingSnapshot`], which keeps every rule unit-testable and
//! makes the evaluation order explicit. The snapshot is best-effort: the
//! authoritative uniqueness check happens again under the day ledger lock at
//! commit time (see `mutations.rs`).

use chrono::{DateTime, Utc};

use crate::calendar::DayKey;
use crate::model::{Employee, Seat, SeatType};
use crate::policy::DESIGNATED_HORIZON_DAYS;
use crate::rotation;

use super::RejectReason;

/// What the engine saw when the request arrived.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookingSnapshot {
    /// Employee already has a confirmed booking for the target day.
    pub employee_booked: bool,
    /// Seat already has a confirmed booking for the target day.
    pub seat_taken: bool,
    /// Floating seats left for the target day (total minus booked).
    pub floating_available: u32,
}

/// Decide whether a booking may be created. Short-circuits on the first
/// failing rule; the order is part of the contract because the rejection
/// reason surfaces to the requester.
///
/// Returns the booking type (mirrored from the seat) on acceptance.
pub fn decide(
    employee: &Employee,
    seat: Option<&Seat>,
    day: DayKey,
    now: DateTime<Utc>,
    snapshot: &BookingSnapshot,
) -> Result<SeatType, RejectReason> {
    // 1. Seat must exist and be active.
    let seat = match seat {
        Some(s) if s.is_active => s,
        _ => return Err(RejectReason::SeatUnavailable),
    };

    // 2./3. Uniqueness pre-checks (fast feedback; re-enforced at commit).
    if snapshot.employee_booked {
        return Err(RejectReason::AlreadyBookedDay);
    }
    if snapshot.seat_taken {
        return Err(RejectReason::SeatTaken);
    }

    // 4. Rotation.
    let is_batch_day = rotation::is_batch_day(employee.batch, day);

    match seat.seat_type {
        // 5. Designated seats belong to the on-site batch, inside the horizon.
        SeatType::Designated => {
            if !is_batch_day {
                return Err(RejectReason::UseFloatingSeat);
            }
            if DayKey::normalize(now).days_until(day) > DESIGNATED_HORIZON_DAYS {
                return Err(RejectReason::HorizonExceeded);
            }
        }
        // 6. Floating seats are for the off-site batch only — the inversion
        // is intentional: on-site members must take designated seats.
        SeatType::Floating => {
            if is_batch_day {
                return Err(RejectReason::UseDesignatedSeat);
            }
            floating_gate(day, now)?;
            if snapshot.floating_available == 0 {
                return Err(RejectReason::NoFloatingSeats);
            }
        }
    }

    Ok(seat.seat_type)
}

/// Floating unlock gate: booking for day D opens at 15:00 UTC on D-1
/// (inclusive) and closes once D has fully elapsed. Administrative overrides
/// never open the gate early.
pub fn floating_gate(target: DayKey, now: DateTime<Utc>) -> Result<(), RejectReason> {
    if now < target.unlock_instant() {
        return Err(RejectReason::NotYetOpen);
    }
    if now > target.end() {
        return Err(RejectReason::PastDate);
    }
    Ok(())
}
