use ulid::Ulid;

use crate::calendar::DayKey;
use crate::model::*;
use crate::policy::BASE_FLOATING_SEATS;

use super::Engine;

impl Engine {
    /// Seat-type-partitioned availability for a day.
    ///
    /// Counts are a display snapshot: stale the moment they are read, and
    /// never the authoritative gate for an accept (that is the per-seat and
    /// per-employee uniqueness constraint at commit time). `available` is
    /// floored at zero even when admin changes shrink the pool below the
    /// booked count.
    pub async fn availability(&self, day: DayKey) -> Availability {
        let designated_total = self
            .seats
            .iter()
            .filter(|s| s.value().is_active && s.value().seat_type == SeatType::Designated)
            .count() as u32;
        let floating_total = BASE_FLOATING_SEATS
            + self
                .overrides
                .get(&day.iso_week())
                .map(|o| o.extra_floating_seats)
                .unwrap_or(0);

        let (mut designated_booked, mut floating_booked) = (0u32, 0u32);
        let ledger = self.day_ledger(day);
        let guard = ledger.read().await;
        for booking_id in guard.by_seat.values() {
            if let Some(booking) = self.bookings.get(booking_id) {
                match booking.booking_type {
                    SeatType::Designated => designated_booked += 1,
                    SeatType::Floating => floating_booked += 1,
                }
            }
        }

        Availability {
            designated: Counts::new(designated_total, designated_booked),
            floating: Counts::new(floating_total, floating_booked),
        }
    }

    /// The employee's confirmed booking for a day, if any.
    pub async fn find_confirmed_by_employee(
        &self,
        day: DayKey,
        employee: Ulid,
    ) -> Option<Booking> {
        let ledger = self.day_ledger(day);
        let guard = ledger.read().await;
        let id = guard.by_employee.get(&employee)?;
        self.bookings.get(id).map(|b| b.clone())
    }

    /// The seat's confirmed booking for a day, if any.
    pub async fn find_confirmed_by_seat(&self, day: DayKey, seat: Ulid) -> Option<Booking> {
        let ledger = self.day_ledger(day);
        let guard = ledger.read().await;
        let id = guard.by_seat.get(&seat)?;
        self.bookings.get(id).map(|b| b.clone())
    }

    /// All confirmed bookings for a day.
    pub async fn bookings_for_day(&self, day: DayKey) -> Vec<Booking> {
        let ledger = self.day_ledger(day);
        let guard = ledger.read().await;
        let mut bookings: Vec<Booking> = guard
            .by_seat
            .values()
            .filter_map(|id| self.bookings.get(id).map(|b| b.clone()))
            .collect();
        bookings.sort_by_key(|b| b.id);
        bookings
    }

    /// Full booking history for an employee, newest day first.
    pub fn bookings_for_employee(&self, employee: Ulid) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|b| b.value().employee == employee)
            .map(|b| b.value().clone())
            .collect();
        bookings.sort_by(|a, b| b.day.cmp(&a.day).then(a.id.cmp(&b.id)));
        bookings
    }

    /// Active seats with no confirmed booking on `day`.
    pub async fn available_seats(&self, day: DayKey) -> Vec<Seat> {
        let ledger = self.day_ledger(day);
        let guard = ledger.read().await;
        let mut seats: Vec<Seat> = self
            .seats
            .iter()
            .filter(|s| s.value().is_active && !guard.by_seat.contains_key(&s.value().id))
            .map(|s| s.value().clone())
            .collect();
        seats.sort_by(|a, b| a.seat_number.cmp(&b.seat_number));
        seats
    }

    pub fn list_seats(&self, seat_type: Option<SeatType>) -> Vec<Seat> {
        let mut seats: Vec<Seat> = self
            .seats
            .iter()
            .filter(|s| seat_type.is_none_or(|t| s.value().seat_type == t))
            .map(|s| s.value().clone())
            .collect();
        seats.sort_by(|a, b| a.seat_number.cmp(&b.seat_number));
        seats
    }

    pub fn list_employees(&self) -> Vec<Employee> {
        let mut employees: Vec<Employee> = self
            .employees
            .iter()
            .map(|e| e.value().clone())
            .collect();
        employees.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));
        employees
    }

    pub fn employees_in_batch(&self, batch: Batch) -> Vec<Employee> {
        let mut employees: Vec<Employee> = self
            .employees
            .iter()
            .filter(|e| e.value().batch == batch)
            .map(|e| e.value().clone())
            .collect();
        employees.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));
        employees
    }

    pub fn get_employee(&self, id: Ulid) -> Option<Employee> {
        self.employees.get(&id).map(|e| e.clone())
    }

    pub fn get_seat(&self, id: Ulid) -> Option<Seat> {
        self.seats.get(&id).map(|s| s.clone())
    }

    pub fn get_booking(&self, id: Ulid) -> Option<Booking> {
        self.bookings.get(&id).map(|b| b.clone())
    }

    pub fn get_override(&self, week: u32) -> Option<ScheduleOverride> {
        self.overrides.get(&week).map(|o| *o)
    }
}
