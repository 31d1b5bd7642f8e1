//! Fixed rotation policy and resource limits.
//!
//! These are compile-time policy, not data: the weekly rotation, the unlock
//! hour, the designated horizon, and the base floating pool come from the
//! office charter and are deliberately not configurable yet.

/// Base floating seat pool per day, before any weekly override.
pub const BASE_FLOATING_SEATS: u32 = 10;

/// Designated seats can be booked at most this many calendar days ahead.
pub const DESIGNATED_HORIZON_DAYS: i64 = 14;

/// Hour of day (UTC) on D-1 at which floating booking for day D opens.
pub const FLOATING_UNLOCK_HOUR: u32 = 15;

/// Hour and minute (UTC) at which the day-before reminder job fires.
pub const REMINDER_HOUR: u32 = 14;
pub const REMINDER_MINUTE: u32 = 30;

// ── Hard resource limits ────────────────────────────────────────

pub const MAX_EMPLOYEES: usize = 10_000;
pub const MAX_SEATS: usize = 5_000;
pub const MAX_NAME_LEN: usize = 256;
pub const MAX_SEAT_NUMBER_LEN: usize = 32;
pub const MAX_EXTRA_FLOATING_SEATS: u32 = 1_000;

/// Compact the WAL once this many appends have accumulated.
pub const DEFAULT_COMPACT_THRESHOLD: u64 = 1_000;
