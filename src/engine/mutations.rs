use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ulid::Ulid;

use crate::calendar::DayKey;
use crate::model::*;
use crate::notify::Notice;
use crate::observability;
use crate::policy::*;

use super::rules::{self, BookingSnapshot};
use super::{Engine, EngineError, RejectReason};

impl Engine {
    // ── Registries ───────────────────────────────────────────────

    pub async fn add_employee(
        &self,
        name: String,
        employee_id: String,
        batch: Batch,
        squad: u8,
        role: Role,
    ) -> Result<Employee, EngineError> {
        if self.employees.len() >= MAX_EMPLOYEES {
            return Err(EngineError::LimitExceeded("too many employees"));
        }
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("employee name length"));
        }
        if !(1..=8).contains(&squad) {
            return Err(EngineError::LimitExceeded("squad out of range"));
        }
        if self.employee_ids.contains_key(&employee_id) {
            return Err(EngineError::AlreadyExists(employee_id));
        }

        let id = Ulid::new();
        let event = Event::EmployeeAdded {
            id,
            name,
            employee_id,
            batch,
            squad,
            role,
        };
        let wal = self.wal_append(&event).await?;
        self.apply_registry_event(&event);
        drop(wal);
        Ok(self.employees.get(&id).expect("just inserted").clone())
    }

    pub async fn add_seat(
        &self,
        seat_number: String,
        seat_type: SeatType,
        is_active: bool,
    ) -> Result<Seat, EngineError> {
        if self.seats.len() >= MAX_SEATS {
            return Err(EngineError::LimitExceeded("too many seats"));
        }
        if seat_number.is_empty() || seat_number.len() > MAX_SEAT_NUMBER_LEN {
            return Err(EngineError::LimitExceeded("seat number length"));
        }
        if self.seat_numbers.contains_key(&seat_number) {
            return Err(EngineError::AlreadyExists(seat_number));
        }

        let id = Ulid::new();
        let event = Event::SeatAdded {
            id,
            seat_number,
            seat_type,
            is_active,
        };
        let wal = self.wal_append(&event).await?;
        self.apply_registry_event(&event);
        drop(wal);
        Ok(self.seats.get(&id).expect("just inserted").clone())
    }

    /// Retype or soft-disable a seat. Existing confirmed bookings are left
    /// untouched: shrinking the pool below the booked count is tolerated.
    pub async fn update_seat(
        &self,
        id: Ulid,
        seat_type: SeatType,
        is_active: bool,
    ) -> Result<Seat, EngineError> {
        if !self.seats.contains_key(&id) {
            return Err(EngineError::NotFound(id));
        }
        let event = Event::SeatUpdated {
            id,
            seat_type,
            is_active,
        };
        let wal = self.wal_append(&event).await?;
        self.apply_registry_event(&event);
        drop(wal);
        Ok(self.seats.get(&id).expect("checked above").clone())
    }

    /// Admin upsert of the weekly capacity override.
    pub async fn upsert_override(
        &self,
        week: u32,
        extra_floating_seats: u32,
        is_team_day: bool,
    ) -> Result<ScheduleOverride, EngineError> {
        if !(1..=53).contains(&week) {
            return Err(EngineError::LimitExceeded("ISO week out of range"));
        }
        if extra_floating_seats > MAX_EXTRA_FLOATING_SEATS {
            return Err(EngineError::LimitExceeded("extra floating seats"));
        }
        let event = Event::OverrideUpserted {
            week,
            extra_floating_seats,
            is_team_day,
        };
        let wal = self.wal_append(&event).await?;
        self.apply_registry_event(&event);
        drop(wal);
        Ok(*self.overrides.get(&week).expect("just inserted"))
    }

    // ── Booking lifecycle ────────────────────────────────────────

    /// Book a seat for an employee on a target date.
    ///
    /// Two phases: an optimistic rule evaluation over a read snapshot for
    /// fast rejection, then a re-check of both
    /// uniqueness constraints under the day ledger's write lock before the
    /// WAL commit. A request that loses the race gets the same rejection the
    /// pre-check would have produced — the slot is genuinely taken, so there
    /// is nothing to retry.
    pub async fn book_seat(
        &self,
        employee_id: Ulid,
        seat_id: Ulid,
        date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Booking, EngineError> {
        let started = std::time::Instant::now();
        let result = self.book_seat_inner(employee_id, seat_id, date, now).await;

        let outcome = match &result {
            Ok(_) => "accepted",
            Err(EngineError::Rejected(reason)) => reason.label(),
            Err(_) => "error",
        };
        metrics::counter!(observability::DECISIONS_TOTAL, "outcome" => outcome).increment(1);
        metrics::histogram!(observability::DECISION_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn book_seat_inner(
        &self,
        employee_id: Ulid,
        seat_id: Ulid,
        date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Booking, EngineError> {
        let day = DayKey::normalize(date);
        let employee = self
            .employees
            .get(&employee_id)
            .ok_or(EngineError::NotFound(employee_id))?
            .clone();
        let seat = self.seats.get(&seat_id).map(|s| s.clone());

        // Phase 1: optimistic evaluation over a read snapshot.
        let snapshot = self.booking_snapshot(employee_id, seat_id, day).await;
        let booking_type = rules::decide(&employee, seat.as_ref(), day, now, &snapshot)
            .map_err(EngineError::Rejected)?;

        // Phase 2: the constraint. Re-validate under the day write lock so
        // the check and the insert are atomic.
        let mut guard = self.day_ledger_write(day).await;
        if guard.by_employee.contains_key(&employee_id) {
            return Err(EngineError::Rejected(RejectReason::AlreadyBookedDay));
        }
        if guard.by_seat.contains_key(&seat_id) {
            return Err(EngineError::Rejected(RejectReason::SeatTaken));
        }

        let booking = Booking {
            id: Ulid::new(),
            employee: employee_id,
            seat: seat_id,
            day,
            booking_type,
            status: BookingStatus::Confirmed,
            booked_at: now,
            released_at: None,
        };
        let event = Event::BookingConfirmed {
            id: booking.id,
            employee: employee_id,
            seat: seat_id,
            day,
            booking_type,
            booked_at: now,
        };
        let wal = self.wal_append(&event).await?;
        self.apply_confirm(&mut guard, booking.clone());
        drop(wal);
        drop(guard);

        self.notify.send(
            employee_id,
            Notice::BookingUpdate {
                booking: booking.id,
                day,
                status: BookingStatus::Confirmed,
            },
        );
        tracing::debug!(%day, booking = %booking.id, "booking confirmed");

        self.maybe_compact().await;
        Ok(booking)
    }

    async fn booking_snapshot(
        &self,
        employee_id: Ulid,
        seat_id: Ulid,
        day: DayKey,
    ) -> BookingSnapshot {
        let availability = self.availability(day).await;
        let ledger = self.day_ledger(day);
        let guard = ledger.read().await;
        BookingSnapshot {
            employee_booked: guard.by_employee.contains_key(&employee_id),
            seat_taken: guard.by_seat.contains_key(&seat_id),
            floating_available: availability.floating.available,
        }
    }

    /// Release a confirmed booking, freeing its seat and employee for the
    /// day immediately. Only the owning employee or an admin may do this.
    pub async fn release_booking(
        &self,
        booking_id: Ulid,
        actor_id: Ulid,
        now: DateTime<Utc>,
    ) -> Result<Booking, EngineError> {
        let booking = self
            .bookings
            .get(&booking_id)
            .ok_or(EngineError::NotFound(booking_id))?
            .clone();
        let actor = self
            .employees
            .get(&actor_id)
            .ok_or(EngineError::NotFound(actor_id))?
            .clone();
        if actor.id != booking.employee && actor.role != Role::Admin {
            metrics::counter!(observability::RELEASES_TOTAL, "status" => "denied").increment(1);
            return Err(EngineError::NotAuthorized);
        }

        let mut guard = self.day_ledger_write(booking.day).await;
        // Status may have moved since the unlocked read.
        let status = self
            .bookings
            .get(&booking_id)
            .map(|b| b.status)
            .ok_or(EngineError::NotFound(booking_id))?;
        if status != BookingStatus::Confirmed {
            return Err(EngineError::InvalidTransition { from: status });
        }

        let event = Event::BookingReleased {
            id: booking_id,
            released_at: now,
        };
        let wal = self.wal_append(&event).await?;
        self.apply_release(&mut guard, booking_id, now);
        drop(wal);
        drop(guard);

        metrics::counter!(observability::RELEASES_TOTAL, "status" => "ok").increment(1);
        self.notify.send(
            booking.employee,
            Notice::BookingUpdate {
                booking: booking_id,
                day: booking.day,
                status: BookingStatus::Released,
            },
        );
        tracing::debug!(day = %booking.day, booking = %booking_id, "booking released");

        Ok(self.bookings.get(&booking_id).expect("checked above").clone())
    }

    /// Complete every confirmed booking whose day is strictly before
    /// `normalize(now)`. Idempotent: finalized days are pruned from the day
    /// map, so a re-run transitions nothing. Returns the number of
    /// completions.
    pub async fn finalize_before(&self, now: DateTime<Utc>) -> Result<u64, EngineError> {
        let today = DayKey::normalize(now);
        let elapsed: Vec<DayKey> = self
            .days
            .iter()
            .filter(|entry| *entry.key() < today)
            .map(|entry| *entry.key())
            .collect();

        let mut total = 0;
        for day in elapsed {
            let mut guard = self.day_ledger_write(day).await;
            if guard.by_employee.is_empty() {
                // Nothing to finalize; drop the entry so the day map does
                // not accumulate one ledger per day forever.
                guard.retired = true;
                self.days.remove(&day);
                continue;
            }
            let wal = self.wal_append(&Event::DayFinalized { day }).await?;
            let completed = self.apply_finalize(&mut guard);
            guard.retired = true;
            self.days.remove(&day);
            drop(wal);
            drop(guard);
            total += completed;
            tracing::info!(%day, completed, "finalized bookings");
        }
        if total > 0 {
            metrics::counter!(observability::BOOKINGS_FINALIZED_TOTAL).increment(total);
        }
        Ok(total)
    }

    // ── WAL compaction ───────────────────────────────────────────

    async fn maybe_compact(&self) {
        if !self.wal_due_for_rewrite().await {
            return;
        }
        if let Err(e) = self.compact().await {
            // Compaction failure is not fatal: the log keeps growing and the
            // next append retriggers it.
            tracing::error!("WAL compaction failed: {e}");
        }
    }

    /// Rewrite the WAL as the minimal event sequence recreating current
    /// state, including booking history.
    pub async fn compact(&self) -> Result<(), EngineError> {
        // Hold the WAL lock for the whole collect-and-rewrite. Commit paths
        // finish their in-memory apply before releasing this lock, so the
        // snapshot below covers every event in the log being replaced.
        let mut wal = self.wal.lock().await;
        let mut events = Vec::new();

        for entry in self.employees.iter() {
            let e = entry.value();
            events.push(Event::EmployeeAdded {
                id: e.id,
                name: e.name.clone(),
                employee_id: e.employee_id.clone(),
                batch: e.batch,
                squad: e.squad,
                role: e.role,
            });
        }
        for entry in self.seats.iter() {
            let s = entry.value();
            events.push(Event::SeatAdded {
                id: s.id,
                seat_number: s.seat_number.clone(),
                seat_type: s.seat_type,
                is_active: s.is_active,
            });
        }
        for entry in self.overrides.iter() {
            let o = entry.value();
            events.push(Event::OverrideUpserted {
                week: o.week,
                extra_floating_seats: o.extra_floating_seats,
                is_team_day: o.is_team_day,
            });
        }

        // Bookings grouped per day. A day can hold completed bookings next
        // to a later confirmed one (a designated booking for an elapsed
        // batch day), so settled bookings replay first, then one bulk
        // DayFinalized, and only then the still-confirmed ones. Replaying
        // in that order reconstructs each status exactly.
        fn confirm_event(b: &Booking) -> Event {
            Event::BookingConfirmed {
                id: b.id,
                employee: b.employee,
                seat: b.seat,
                day: b.day,
                booking_type: b.booking_type,
                booked_at: b.booked_at,
            }
        }

        let mut by_day: BTreeMap<DayKey, Vec<Booking>> = BTreeMap::new();
        for entry in self.bookings.iter() {
            by_day
                .entry(entry.value().day)
                .or_default()
                .push(entry.value().clone());
        }
        for (day, mut bookings) in by_day {
            bookings.sort_by_key(|b| b.booked_at);
            let mut finalized = false;
            for b in bookings.iter().filter(|b| b.status != BookingStatus::Confirmed) {
                events.push(confirm_event(b));
                match b.status {
                    BookingStatus::Released => events.push(Event::BookingReleased {
                        id: b.id,
                        released_at: b.released_at.unwrap_or(b.booked_at),
                    }),
                    BookingStatus::Completed => finalized = true,
                    BookingStatus::Confirmed => {}
                }
            }
            if finalized {
                events.push(Event::DayFinalized { day });
            }
            for b in bookings.iter().filter(|b| b.status == BookingStatus::Confirmed) {
                events.push(confirm_event(b));
            }
        }

        wal.rewrite(&events)
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        metrics::counter!(observability::WAL_REWRITES_TOTAL).increment(1);
        Ok(())
    }
}
