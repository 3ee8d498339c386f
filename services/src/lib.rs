//! Attendance engine: turns kiosk and terminal scans into graded sessions.
//!
//! [`router::AttendanceEngine`] is the entry point. It resolves who scanned
//! ([`identity`]), writes through the [`ledger`], grades against the class
//! timetable ([`grading`]) and, once a write has committed, fans out to the
//! [`side_effects`] collaborators.

pub mod actor;
pub mod collaborators;
pub mod correction;
pub mod error;
pub mod grading;
pub mod identity;
pub mod ledger;
pub mod router;
pub mod side_effects;

#[cfg(test)]
mod test_support;

pub use actor::Actor;
pub use error::AttendanceError;
pub use router::{AttendanceEngine, ScanEvent, ScanFailure, ScanOutcome};
