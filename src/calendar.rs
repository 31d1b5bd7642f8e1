use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::FLOATING_UNLOCK_HOUR;

/// A civil day in UTC — the only unit of date comparison and storage keying.
///
/// Every timestamp entering the system is collapsed to a `DayKey` before any
/// comparison or lookup, so two requests on the same UTC day can never produce
/// two distinct keys for the same physical day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayKey(NaiveDate);

impl DayKey {
    /// Collapse any timestamp to its UTC civil day. Idempotent by construction:
    /// normalizing midnight of a day yields that same day.
    pub fn normalize(at: DateTime<Utc>) -> Self {
        Self(at.date_naive())
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// The canonical wire instant for this key: UTC midnight of the day.
    pub fn midnight(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.0.and_time(NaiveTime::MIN))
    }

    /// First instant of the following day; the day has fully elapsed once
    /// `now` reaches this.
    pub fn end(&self) -> DateTime<Utc> {
        self.succ().midnight()
    }

    pub fn succ(&self) -> Self {
        Self(self.0 + Days::new(1))
    }

    pub fn pred(&self) -> Self {
        Self(self.0 - Days::new(1))
    }

    /// Signed whole days from `self` to `other`.
    pub fn days_until(&self, other: DayKey) -> i64 {
        (other.0 - self.0).num_days()
    }

    pub fn weekday(&self) -> chrono::Weekday {
        self.0.weekday()
    }

    /// ISO-8601 week number (Thursday-anchored). The single algorithm keying
    /// the weekly schedule override, used on both the write and read side.
    pub fn iso_week(&self) -> u32 {
        self.0.iso_week().week()
    }

    /// Instant at which floating-seat booking opens for this target day:
    /// 15:00 UTC on the preceding calendar day.
    pub fn unlock_instant(&self) -> DateTime<Utc> {
        let open = self.pred().0.and_hms_opt(FLOATING_UNLOCK_HOUR, 0, 0);
        Utc.from_utc_datetime(&open.expect("unlock hour is a valid time of day"))
    }
}

impl std::fmt::Display for DayKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl std::str::FromStr for DayKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<NaiveDate>().map(Self)
    }
}
