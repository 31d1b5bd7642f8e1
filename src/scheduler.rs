//! Time-triggered lifecycle transitions.
//!
//! Each transition is a pure function of "injected now + engine state" so it
//! can be tested without a timer, and each is idempotent so a crashed or
//! re-fired run cannot duplicate effects. The timer loop below only decides
//! *when* to invoke them, once per civil day each.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use tracing::{error, info};

use crate::calendar::DayKey;
use crate::engine::{Engine, EngineError};
use crate::model::Role;
use crate::notify::Notice;
use crate::observability;
use crate::policy::{FLOATING_UNLOCK_HOUR, REMINDER_HOUR, REMINDER_MINUTE};
use crate::rotation;

/// End-of-day finalization: complete every confirmed booking whose day has
/// fully elapsed. Safe against live traffic — same-day bookings are never
/// touched.
pub async fn finalize_elapsed(engine: &Engine, now: DateTime<Utc>) -> Result<u64, EngineError> {
    engine.finalize_before(now).await
}

/// Day-before reminders: for each active-batch employee without a confirmed
/// booking tomorrow, emit one reminder. Entirely a no-op on non-working days.
pub async fn send_reminders(engine: &Engine, now: DateTime<Utc>) -> u64 {
    let tomorrow = DayKey::normalize(now).succ();
    let rotation = rotation::resolve(tomorrow);
    let Some(batch) = rotation.active_batch else {
        return 0;
    };

    let mut sent = 0;
    for employee in engine.employees_in_batch(batch) {
        if engine
            .find_confirmed_by_employee(tomorrow, employee.id)
            .await
            .is_none()
        {
            engine.notify.send(
                employee.id,
                Notice::Reminder {
                    day: tomorrow,
                    batch,
                },
            );
            sent += 1;
        }
    }
    if sent > 0 {
        metrics::counter!(observability::NOTICES_TOTAL, "kind" => "reminder").increment(sent);
    }
    sent
}

/// Unlock announcement: tell every employee that floating booking for
/// tomorrow has opened. Purely informational — the gate itself is evaluated
/// from the clock at request time, never from this notice.
pub fn announce_unlock(engine: &Engine, now: DateTime<Utc>) -> u64 {
    let tomorrow = DayKey::normalize(now).succ();
    let mut sent = 0;
    for employee in engine.list_employees() {
        if employee.role == Role::Employee {
            engine
                .notify
                .send(employee.id, Notice::FloatingUnlocked { day: tomorrow });
            sent += 1;
        }
    }
    if sent > 0 {
        metrics::counter!(observability::NOTICES_TOTAL, "kind" => "unlock").increment(sent);
    }
    sent
}

/// Last day each job ran successfully. A failed run leaves its marker unset
/// so the next tick retries it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JobMarkers {
    pub finalized: Option<DayKey>,
    pub reminded: Option<DayKey>,
    pub announced: Option<DayKey>,
}

fn past_time_of_day(now: DateTime<Utc>, hour: u32, minute: u32) -> bool {
    let trigger = NaiveTime::from_hms_opt(hour, minute, 0).expect("valid trigger time");
    now.time() >= trigger
}

/// One scheduler pass: fire each job whose daily trigger instant has passed
/// and which has not yet succeeded today.
pub async fn tick(engine: &Engine, now: DateTime<Utc>, markers: &mut JobMarkers) {
    let today = DayKey::normalize(now);

    // Finalization fires at day start (00:00), covering all elapsed days.
    if markers.finalized != Some(today) {
        match finalize_elapsed(engine, now).await {
            Ok(completed) => {
                if completed > 0 {
                    info!(completed, "daily finalization done");
                }
                metrics::counter!(observability::SCHEDULER_RUNS_TOTAL,
                    "job" => "finalize", "status" => "ok")
                .increment(1);
                markers.finalized = Some(today);
            }
            Err(e) => {
                // Leave the marker unset: state is untouched and the next
                // tick re-triggers the run.
                error!("finalization failed: {e}");
                metrics::counter!(observability::SCHEDULER_RUNS_TOTAL,
                    "job" => "finalize", "status" => "error")
                .increment(1);
            }
        }
    }

    if markers.reminded != Some(today) && past_time_of_day(now, REMINDER_HOUR, REMINDER_MINUTE) {
        let sent = send_reminders(engine, now).await;
        info!(sent, "booking reminders sent");
        metrics::counter!(observability::SCHEDULER_RUNS_TOTAL,
            "job" => "remind", "status" => "ok")
        .increment(1);
        markers.reminded = Some(today);
    }

    if markers.announced != Some(today) && now.hour() >= FLOATING_UNLOCK_HOUR {
        let sent = announce_unlock(engine, now);
        info!(sent, "floating unlock announced");
        metrics::counter!(observability::SCHEDULER_RUNS_TOTAL,
            "job" => "unlock", "status" => "ok")
        .increment(1);
        markers.announced = Some(today);
    }
}

/// Background task driving the three daily jobs off the wall clock.
pub async fn run(engine: Arc<Engine>) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    let mut markers = JobMarkers::default();
    loop {
        interval.tick().await;
        tick(&engine, Utc::now(), &mut markers).await;
    }
}
