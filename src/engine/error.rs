use ulid::Ulid;

/// The fixed vocabulary of booking rejections, in rule-evaluation order.
///
/// These are surfaced verbatim to the request layer and double as the error
/// path for commit-time uniqueness conflicts: a lost race reports the same
/// reason the pre-check would have produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Seat does not exist or has been soft-disabled.
    SeatUnavailable,
    /// Employee already holds a confirmed booking for the day.
    AlreadyBookedDay,
    /// Seat already holds a confirmed booking for the day.
    SeatTaken,
    /// Designated seat requested outside the employee's batch day.
    UseFloatingSeat,
    /// Designated seat requested beyond the advance-booking horizon.
    HorizonExceeded,
    /// Floating seat requested on the employee's own batch day.
    UseDesignatedSeat,
    /// Floating gate has not opened yet for the target day.
    NotYetOpen,
    /// Target day has fully elapsed.
    PastDate,
    /// Floating pool for the day is exhausted.
    NoFloatingSeats,
}

impl RejectReason {
    /// Short stable label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::SeatUnavailable => "seat_unavailable",
            RejectReason::AlreadyBookedDay => "already_booked_day",
            RejectReason::SeatTaken => "seat_taken",
            RejectReason::UseFloatingSeat => "use_floating_seat",
            RejectReason::HorizonExceeded => "horizon_exceeded",
            RejectReason::UseDesignatedSeat => "use_designated_seat",
            RejectReason::NotYetOpen => "not_yet_open",
            RejectReason::PastDate => "past_date",
            RejectReason::NoFloatingSeats => "no_floating_seats",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            RejectReason::SeatUnavailable => "Seat not found or inactive.",
            RejectReason::AlreadyBookedDay => {
                "You already have a confirmed booking for this day."
            }
            RejectReason::SeatTaken => "This seat is already booked for the selected date.",
            RejectReason::UseFloatingSeat => {
                "This is a Designated seat. Since it is not your batch day, \
                 please pick a Floating seat after 3 PM."
            }
            RejectReason::HorizonExceeded => {
                "Designated seats can only be booked up to 2 weeks in advance."
            }
            RejectReason::UseDesignatedSeat => {
                "Floating seats are reserved for remote batch members. \
                 Use a Designated seat instead."
            }
            RejectReason::NotYetOpen => {
                "Floating seats for tomorrow only open at 3:00 PM today."
            }
            RejectReason::PastDate => "Cannot book for a past date.",
            RejectReason::NoFloatingSeats => "No floating seats available for this date.",
        };
        f.write_str(msg)
    }
}

#[derive(Debug)]
pub enum EngineError {
    /// Referenced employee, seat, or booking does not exist.
    NotFound(Ulid),
    /// A registry entry with this id or unique key already exists.
    AlreadyExists(String),
    /// Booking denied by the rule engine, or by the commit-time uniqueness
    /// re-check. The caller cannot tell the two apart.
    Rejected(RejectReason),
    /// Release attempted by neither the owner nor an admin.
    NotAuthorized,
    /// Status change violating the monotonic booking lifecycle.
    InvalidTransition { from: crate::model::BookingStatus },
    LimitExceeded(&'static str),
    /// Infrastructure failure — distinct from rule violations, never
    /// translated into a rejection.
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(key) => write!(f, "already exists: {key}"),
            EngineError::Rejected(reason) => write!(f, "{reason}"),
            EngineError::NotAuthorized => write!(f, "not authorized"),
            EngineError::InvalidTransition { from } => {
                write!(f, "booking is not confirmed (status: {from:?})")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_text_is_stable() {
        // The request layer surfaces these verbatim; changing them is a
        // breaking change for clients.
        assert_eq!(
            RejectReason::AlreadyBookedDay.to_string(),
            "You already have a confirmed booking for this day."
        );
        assert_eq!(
            RejectReason::PastDate.to_string(),
            "Cannot book for a past date."
        );
        assert_eq!(
            EngineError::Rejected(RejectReason::SeatTaken).to_string(),
            "This seat is already booked for the selected date."
        );
    }
}
