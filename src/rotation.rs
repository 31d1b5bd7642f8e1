use chrono::Weekday;

use crate::calendar::DayKey;
use crate::model::Batch;

/// Which batch is on-site for a given day, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation {
    pub active_batch: Option<Batch>,
    pub is_working_day: bool,
}

/// Fixed weekly rotation: Mon-Wed batch 1, Thu-Fri batch 2, weekend closed.
/// Pure calendar policy — no state, no storage.
pub fn resolve(day: DayKey) -> Rotation {
    let active_batch = match day.weekday() {
        Weekday::Mon | Weekday::Tue | Weekday::Wed => Some(Batch::One),
        Weekday::Thu | Weekday::Fri => Some(Batch::Two),
        Weekday::Sat | Weekday::Sun => None,
    };
    Rotation {
        active_batch,
        is_working_day: active_batch.is_some(),
    }
}

/// True when `day` is a working day and `batch` is the on-site batch.
pub fn is_batch_day(batch: Batch, day: DayKey) -> bool {
    resolve(day).active_batch == Some(batch)
}
