//! Pure status grading against a class timetable.
//!
//! Every comparison happens in minutes on the campus clock: an instant is
//! converted to the configured fixed offset and measured from local midnight of
//! the session's day. A check-out that lands after midnight therefore reads as
//! more than 1440 minutes into the day instead of wrapping around.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Timelike, Utc};
use db::models::attendance_session::{AttendanceStatus, Model as Session};
use db::models::class;
use serde::Serialize;
use strum::Display;

use crate::error::AttendanceError;

/// Arrivals up to this many minutes after start are on time.
pub const ON_TIME_GRACE_MINUTES: i64 = 15;
/// Arrivals up to this many minutes after start are late; later ones absent.
pub const LATE_CUTOFF_MINUTES: i64 = 30;
/// Leaving more than this many minutes before the end is cutting class.
pub const EARLY_DEPARTURE_MINUTES: i64 = 15;
/// Checking out more than this many minutes after the end is ghosting.
pub const OVERSTAY_MINUTES: i64 = 60;
/// Check-ins earlier than this many minutes before start are not counted.
pub const EARLY_ARRIVAL_MINUTES: i64 = 20;

/// The slice of a class row grading needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub class_id: i64,
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
}

impl From<&class::Model> for Schedule {
    fn from(class: &class::Model) -> Self {
        Self {
            class_id: class.id,
            start: class.start_time,
            end: class.end_time,
        }
    }
}

/// Calendar day of `at` on the campus clock.
pub fn local_day(at: DateTime<Utc>, tz: FixedOffset) -> NaiveDate {
    at.with_timezone(&tz).date_naive()
}

/// Minutes from local midnight of `day` to `at`.
pub fn minutes_into_day(at: DateTime<Utc>, day: NaiveDate, tz: FixedOffset) -> i64 {
    let local = at.with_timezone(&tz).naive_local();
    (local - day.and_time(NaiveTime::MIN)).num_minutes()
}

fn minute_of(t: NaiveTime) -> i64 {
    i64::from(t.hour() * 60 + t.minute())
}

/// Grades an arrival.
///
/// Late arrivals past the cutoff are still recorded, as `Absent`.
pub fn grade_check_in(
    at: DateTime<Utc>,
    schedule: &Schedule,
    tz: FixedOffset,
) -> Result<AttendanceStatus, AttendanceError> {
    let start = schedule.start.ok_or(AttendanceError::ScheduleUnavailable {
        class_id: schedule.class_id,
    })?;

    let delta = minutes_into_day(at, local_day(at, tz), tz) - minute_of(start);
    Ok(if delta <= ON_TIME_GRACE_MINUTES {
        AttendanceStatus::Present
    } else if delta <= LATE_CUTOFF_MINUTES {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Absent
    })
}

/// Grades the departure that closes `session`.
///
/// Starts from the status given at check-in; an `Absent` arrival stays absent.
pub fn grade_check_out(
    session: &Session,
    at: DateTime<Utc>,
    schedule: &Schedule,
    tz: FixedOffset,
) -> Result<AttendanceStatus, AttendanceError> {
    if session.status == AttendanceStatus::Absent {
        return Ok(AttendanceStatus::Absent);
    }
    let end = schedule.end.ok_or(AttendanceError::ScheduleUnavailable {
        class_id: schedule.class_id,
    })?;

    let out = minutes_into_day(at, session.session_day, tz);
    let end = minute_of(end);
    if end - out > EARLY_DEPARTURE_MINUTES || out - end > OVERSTAY_MINUTES {
        return Ok(AttendanceStatus::Absent);
    }
    Ok(session.status)
}

/// [`grade_check_in`], falling back to `Present` when the class has no start time.
pub fn check_in_status(
    at: DateTime<Utc>,
    schedule: &Schedule,
    tz: FixedOffset,
) -> AttendanceStatus {
    grade_check_in(at, schedule, tz).unwrap_or_else(|err| {
        tracing::warn!(class_id = schedule.class_id, error = %err, "grading check-in as present");
        AttendanceStatus::Present
    })
}

/// [`grade_check_out`], keeping the session's status when the class has no end time.
pub fn check_out_status(
    session: &Session,
    at: DateTime<Utc>,
    schedule: &Schedule,
    tz: FixedOffset,
) -> AttendanceStatus {
    grade_check_out(session, at, schedule, tz).unwrap_or_else(|err| {
        tracing::warn!(
            class_id = schedule.class_id,
            error = %err,
            "keeping carried status on check-out"
        );
        session.status
    })
}

/// Status as shown on dashboards. Only the four base variants are ever stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DisplayStatus {
    Present,
    Late,
    Absent,
    ManuallyVerified,
    /// Absent because the student left well before the end.
    CutClass,
    /// Absent because the check-out came long after the end.
    Ghosting,
    /// Checked in too early to count.
    Invalid,
}

pub fn display_status(session: &Session, schedule: &Schedule, tz: FixedOffset) -> DisplayStatus {
    if session.status == AttendanceStatus::ManuallyVerified {
        return DisplayStatus::ManuallyVerified;
    }

    if let Some(start) = schedule.start {
        let arrived = minutes_into_day(session.check_in_at, session.session_day, tz);
        if arrived < minute_of(start) - EARLY_ARRIVAL_MINUTES {
            return DisplayStatus::Invalid;
        }
    }

    if session.status == AttendanceStatus::Absent {
        if let (Some(out), Some(end)) = (session.check_out_at, schedule.end) {
            let out = minutes_into_day(out, session.session_day, tz);
            let end = minute_of(end);
            if end - out > EARLY_DEPARTURE_MINUTES {
                return DisplayStatus::CutClass;
            }
            if out - end > OVERSTAY_MINUTES {
                return DisplayStatus::Ghosting;
            }
        }
    }

    match session.status {
        AttendanceStatus::Present => DisplayStatus::Present,
        AttendanceStatus::Late => DisplayStatus::Late,
        AttendanceStatus::Absent => DisplayStatus::Absent,
        AttendanceStatus::ManuallyVerified => DisplayStatus::ManuallyVerified,
    }
}

/// Per-class, per-day tallies.
///
/// `Invalid` sessions only count towards `invalid` and `total`. Cut-class and
/// ghosting sessions are counted as absent and additionally broken out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceSummary {
    pub total: usize,
    pub present: usize,
    pub late: usize,
    pub absent: usize,
    pub manually_verified: usize,
    pub cut_class: usize,
    pub ghosting: usize,
    pub invalid: usize,
    /// Sessions still waiting for a check-out.
    pub open: usize,
}

pub fn summarize(sessions: &[Session], schedule: &Schedule, tz: FixedOffset) -> AttendanceSummary {
    let mut summary = AttendanceSummary::default();
    for session in sessions.iter().filter(|s| !s.is_voided()) {
        summary.total += 1;
        if session.is_open() {
            summary.open += 1;
        }
        match display_status(session, schedule, tz) {
            DisplayStatus::Present => summary.present += 1,
            DisplayStatus::Late => summary.late += 1,
            DisplayStatus::Absent => summary.absent += 1,
            DisplayStatus::ManuallyVerified => summary.manually_verified += 1,
            DisplayStatus::CutClass => {
                summary.absent += 1;
                summary.cut_class += 1;
            }
            DisplayStatus::Ghosting => {
                summary.absent += 1;
                summary.ghosting += 1;
            }
            DisplayStatus::Invalid => summary.invalid += 1,
        }
    }
    summary
}
