mod error;
mod mutations;
mod queries;
pub mod rules;

pub use error::{EngineError, RejectReason};

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard, OwnedRwLockWriteGuard, RwLock};
use ulid::Ulid;

use crate::calendar::DayKey;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedDayLedger = Arc<RwLock<DayLedger>>;

/// Confirmed-booking indexes for one day. These maps are the uniqueness
/// constraints: at most one confirmed booking per employee and per seat.
/// Writes happen only under this ledger's write lock, which makes the
/// constraint check and the insert atomic.
#[derive(Debug, Default)]
pub struct DayLedger {
    pub by_employee: HashMap<Ulid, Ulid>,
    pub by_seat: HashMap<Ulid, Ulid>,
    /// Set when finalization pruned this ledger out of the day map. A writer
    /// that acquired the lock through a stale `Arc` must re-fetch the live
    /// entry instead of committing into an orphan.
    pub retired: bool,
}

pub struct Engine {
    pub(super) employees: DashMap<Ulid, Employee>,
    pub(super) seats: DashMap<Ulid, Seat>,
    pub(super) bookings: DashMap<Ulid, Booking>,
    /// Per-day confirmed ledgers.
    pub(super) days: DashMap<DayKey, SharedDayLedger>,
    /// Weekly capacity overrides, keyed by ISO week number.
    pub(super) overrides: DashMap<u32, ScheduleOverride>,
    /// Unique-key indexes for the registries.
    pub(super) employee_ids: DashMap<String, Ulid>,
    pub(super) seat_numbers: DashMap<String, Ulid>,
    wal: Mutex<Wal>,
    compact_threshold: u64,
    pub notify: Arc<NotifyHub>,
}

impl Engine {
    /// Replay the WAL and rebuild in-memory state, then hold the log open
    /// for appends. The storage handle lives inside the engine — opened
    /// here, closed when the engine drops.
    pub fn open(
        wal_path: &Path,
        notify: Arc<NotifyHub>,
        compact_threshold: u64,
    ) -> io::Result<Self> {
        let events = Wal::replay(wal_path)?;
        let engine = Self {
            employees: DashMap::new(),
            seats: DashMap::new(),
            bookings: DashMap::new(),
            days: DashMap::new(),
            overrides: DashMap::new(),
            employee_ids: DashMap::new(),
            seat_numbers: DashMap::new(),
            wal: Mutex::new(Wal::open(wal_path)?),
            compact_threshold,
            notify,
        };

        // Replay — we're the sole owner of the ledger Arcs here, so try_write
        // always succeeds instantly. Never block: open() may run inside an
        // async context.
        for event in &events {
            match event {
                Event::BookingConfirmed {
                    id,
                    employee,
                    seat,
                    day,
                    booking_type,
                    booked_at,
                } => {
                    let ledger = engine.day_ledger(*day);
                    let mut guard = ledger.try_write().expect("replay: uncontended write");
                    engine.apply_confirm(
                        &mut guard,
                        Booking {
                            id: *id,
                            employee: *employee,
                            seat: *seat,
                            day: *day,
                            booking_type: *booking_type,
                            status: BookingStatus::Confirmed,
                            booked_at: *booked_at,
                            released_at: None,
                        },
                    );
                }
                Event::BookingReleased { id, released_at } => {
                    if let Some(day) = engine.bookings.get(id).map(|b| b.day) {
                        let ledger = engine.day_ledger(day);
                        let mut guard = ledger.try_write().expect("replay: uncontended write");
                        engine.apply_release(&mut guard, *id, *released_at);
                    }
                }
                Event::DayFinalized { day } => {
                    let ledger = engine.day_ledger(*day);
                    let mut guard = ledger.try_write().expect("replay: uncontended write");
                    engine.apply_finalize(&mut guard);
                    guard.retired = true;
                    drop(guard);
                    engine.days.remove(day);
                }
                other => engine.apply_registry_event(other),
            }
        }

        Ok(engine)
    }

    /// Ledger for a day, created on first touch.
    pub(super) fn day_ledger(&self, day: DayKey) -> SharedDayLedger {
        self.days.entry(day).or_default().clone()
    }

    /// Write lock on the day's live ledger. Loops past ledgers retired by
    /// finalization pruning, so the returned guard always covers the entry
    /// currently in the map.
    pub(super) async fn day_ledger_write(&self, day: DayKey) -> OwnedRwLockWriteGuard<DayLedger> {
        loop {
            let guard = self.day_ledger(day).write_owned().await;
            if !guard.retired {
                return guard;
            }
        }
    }

    /// Durably append an event, returning the held WAL lock. Commit paths
    /// keep the guard until the in-memory apply is done, so anyone holding
    /// the WAL lock sees state reflecting every event in the log.
    /// Infrastructure failures surface as `WalError`, never as a rejection.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<MutexGuard<'_, Wal>, EngineError> {
        let mut wal = self.wal.lock().await;
        wal.append(event)
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        metrics::counter!(crate::observability::WAL_APPENDS_TOTAL).increment(1);
        Ok(wal)
    }

    pub(super) async fn wal_due_for_rewrite(&self) -> bool {
        self.wal.lock().await.appends_since_rewrite() >= self.compact_threshold
    }

    // ── Event application (shared by replay and live commits) ──

    /// Registry events touch only the DashMap level; no ledger lock needed.
    pub(super) fn apply_registry_event(&self, event: &Event) {
        match event {
            Event::EmployeeAdded {
                id,
                name,
                employee_id,
                batch,
                squad,
                role,
            } => {
                self.employee_ids.insert(employee_id.clone(), *id);
                self.employees.insert(
                    *id,
                    Employee {
                        id: *id,
                        name: name.clone(),
                        employee_id: employee_id.clone(),
                        batch: *batch,
                        squad: *squad,
                        role: *role,
                    },
                );
            }
            Event::SeatAdded {
                id,
                seat_number,
                seat_type,
                is_active,
            } => {
                self.seat_numbers.insert(seat_number.clone(), *id);
                self.seats.insert(
                    *id,
                    Seat {
                        id: *id,
                        seat_number: seat_number.clone(),
                        seat_type: *seat_type,
                        is_active: *is_active,
                    },
                );
            }
            Event::SeatUpdated {
                id,
                seat_type,
                is_active,
            } => {
                if let Some(mut seat) = self.seats.get_mut(id) {
                    seat.seat_type = *seat_type;
                    seat.is_active = *is_active;
                }
            }
            Event::OverrideUpserted {
                week,
                extra_floating_seats,
                is_team_day,
            } => {
                self.overrides.insert(
                    *week,
                    ScheduleOverride {
                        week: *week,
                        extra_floating_seats: *extra_floating_seats,
                        is_team_day: *is_team_day,
                    },
                );
            }
            Event::BookingConfirmed { .. }
            | Event::BookingReleased { .. }
            | Event::DayFinalized { .. } => {
                unreachable!("booking events are applied under the day ledger lock")
            }
        }
    }

    /// Caller holds the ledger write lock for `booking.day`.
    pub(super) fn apply_confirm(&self, ledger: &mut DayLedger, booking: Booking) {
        ledger.by_employee.insert(booking.employee, booking.id);
        ledger.by_seat.insert(booking.seat, booking.id);
        self.bookings.insert(booking.id, booking);
    }

    /// Caller holds the ledger write lock for the booking's day.
    pub(super) fn apply_release(
        &self,
        ledger: &mut DayLedger,
        booking_id: Ulid,
        released_at: DateTime<Utc>,
    ) {
        if let Some(mut booking) = self.bookings.get_mut(&booking_id) {
            booking.status = BookingStatus::Released;
            booking.released_at = Some(released_at);
            ledger.by_employee.remove(&booking.employee);
            ledger.by_seat.remove(&booking.seat);
        }
    }

    /// Caller holds the ledger write lock. Every booking still confirmed in
    /// the ledger becomes completed; re-applying on an empty ledger is a no-op.
    pub(super) fn apply_finalize(&self, ledger: &mut DayLedger) -> u64 {
        let mut completed = 0;
        for booking_id in ledger.by_employee.values() {
            if let Some(mut booking) = self.bookings.get_mut(booking_id) {
                booking.status = BookingStatus::Completed;
                completed += 1;
            }
        }
        ledger.by_employee.clear();
        ledger.by_seat.clear();
        completed
    }
}
