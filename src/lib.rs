//! deskrota — booking core for a rotating two-batch office.
//!
//! A fixed seat pool is shared by a fixed employee population on a weekly
//! rotation: batch 1 is on-site Monday–Wednesday, batch 2 Thursday–Friday.
//! Designated seats go to the on-site batch; floating seats serve the remote
//! batch behind a 15:00-the-day-before unlock gate. The engine guarantees at
//! most one confirmed booking per employee per day and per seat per day,
//! enforced under a per-day ledger lock and made durable through an
//! append-only WAL.
//!
//! Request routing, authentication, and notification delivery live outside
//! this crate; it exposes the decision/consistency core and the three daily
//! lifecycle jobs.

pub mod calendar;
pub mod engine;
pub mod model;
pub mod notify;
pub mod observability;
pub mod policy;
pub mod rotation;
pub mod scheduler;
pub mod wal;
