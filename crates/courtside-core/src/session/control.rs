//! Control surface: Start, Pause, Resume, Reset.
//!
//! Every operation is a pure function of the current record and `now` that
//! returns the patch to write, or `None` when the transition does not apply
//! from the current state. A `None` is not an error: duplicate or stale
//! commands from a reconnecting admin client are dropped.
//!
//! ```text
//! Idle ──start──> Running ──pause──> Paused ──resume──> Running
//!   ^                │ (derived Done) ──start──> Running
//!   └────reset───────┴──────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::patch::{CircuitPatch, ClockPatch, StretchPatch, TrackPatch};
use super::record::{
    CircuitSession, SessionClock, SessionStatus, StretchSession, TrackKind, TrackSettings,
};
use crate::error::ValidationError;
use crate::timer::{DerivedPhaseState, Phase};

/// The admin's current circuit selection, snapshotted into the record at Start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitSelection {
    pub work: u64,
    pub rest: u64,
    pub rounds: u32,
    pub stations: Vec<String>,
}

impl CircuitSelection {
    /// # Errors
    /// Rejects zero rounds, zero work and an empty station list.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stations.is_empty() {
            return Err(ValidationError::EmptyCollection("stations".into()));
        }
        if self.rounds == 0 {
            return Err(ValidationError::InvalidValue {
                field: "rounds".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.work == 0 {
            return Err(ValidationError::InvalidValue {
                field: "work".into(),
                message: "must be at least 1 second".into(),
            });
        }
        Ok(())
    }
}

// ── Clock transitions shared by both timer families ──────────────────

fn can_start(clock: &SessionClock, derived: &DerivedPhaseState) -> bool {
    match clock.status {
        SessionStatus::Idle | SessionStatus::Done => true,
        SessionStatus::Running | SessionStatus::Paused => derived.phase == Phase::Done,
    }
}

fn start_clock(now: DateTime<Utc>) -> ClockPatch {
    ClockPatch {
        status: Some(SessionStatus::Running),
        start_time: Some(Some(now)),
        elapsed_at_pause: Some(0),
    }
}

fn pause_clock(clock: &SessionClock, now: DateTime<Utc>) -> Option<ClockPatch> {
    if clock.status != SessionStatus::Running {
        return None;
    }
    // start_time stays: it is ignored while paused and rewritten on resume.
    Some(ClockPatch {
        status: Some(SessionStatus::Paused),
        start_time: None,
        elapsed_at_pause: Some(clock.elapsed(now)),
    })
}

fn resume_clock(clock: &SessionClock, now: DateTime<Utc>) -> Option<ClockPatch> {
    if clock.status != SessionStatus::Paused {
        return None;
    }
    let Some(back_dated) = i64::try_from(clock.elapsed_at_pause)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|elapsed| now.checked_sub_signed(elapsed))
    else {
        warn!(
            elapsed_at_pause = clock.elapsed_at_pause,
            "paused elapsed time is out of range, ignoring resume"
        );
        return None;
    };
    Some(ClockPatch {
        status: Some(SessionStatus::Running),
        start_time: Some(Some(back_dated)),
        elapsed_at_pause: None,
    })
}

fn reset_clock() -> ClockPatch {
    ClockPatch {
        status: Some(SessionStatus::Idle),
        start_time: Some(None),
        elapsed_at_pause: Some(0),
    }
}

// ── Circuit ──────────────────────────────────────────────────────────

/// Valid from Idle, or from a session whose derived phase is Done (restart).
pub fn start(
    record: &CircuitSession,
    selection: &CircuitSelection,
    now: DateTime<Utc>,
) -> Option<CircuitPatch> {
    if !can_start(&record.clock, &record.derive(now)) {
        return None;
    }
    Some(CircuitPatch {
        clock: start_clock(now),
        work: Some(selection.work),
        rest: Some(selection.rest),
        rounds: Some(selection.rounds),
        stations: Some(selection.stations.clone()),
    })
}

pub fn pause(record: &CircuitSession, now: DateTime<Utc>) -> Option<CircuitPatch> {
    pause_clock(&record.clock, now).map(CircuitPatch::from)
}

/// Back-dates `start_time` by the paused elapsed amount so the next
/// derivation continues exactly where the pause left off. A paused elapsed
/// time too large to subtract from `now` is ignored like any other invalid
/// transition.
pub fn resume(record: &CircuitSession, now: DateTime<Utc>) -> Option<CircuitPatch> {
    resume_clock(&record.clock, now).map(CircuitPatch::from)
}

/// Valid from any state. Work, rest, rounds and stations are kept.
pub fn reset(_record: &CircuitSession) -> CircuitPatch {
    CircuitPatch::from(reset_clock())
}

// ── Stretch ──────────────────────────────────────────────────────────

/// Snapshots `settings` and the list's `item_count` into the track. Validity
/// is judged against the count stored by the previous Start.
pub fn start_track(
    record: &StretchSession,
    kind: TrackKind,
    settings: TrackSettings,
    item_count: usize,
    now: DateTime<Utc>,
) -> Option<StretchPatch> {
    let track = record.track(kind);
    if !can_start(&track.clock, &track.derive(now)) {
        return None;
    }
    Some(StretchPatch::for_track(
        kind,
        TrackPatch {
            clock: start_clock(now),
            duration: Some(settings.duration),
            rest: Some(settings.rest),
            items: Some(item_count),
        },
    ))
}

pub fn pause_track(
    record: &StretchSession,
    kind: TrackKind,
    now: DateTime<Utc>,
) -> Option<StretchPatch> {
    pause_clock(&record.track(kind).clock, now)
        .map(|clock| StretchPatch::for_track(kind, TrackPatch::from(clock)))
}

pub fn resume_track(
    record: &StretchSession,
    kind: TrackKind,
    now: DateTime<Utc>,
) -> Option<StretchPatch> {
    resume_clock(&record.track(kind).clock, now)
        .map(|clock| StretchPatch::for_track(kind, TrackPatch::from(clock)))
}

/// Resets one track and re-snapshots its duration/rest from `settings`.
pub fn reset_track(
    _record: &StretchSession,
    kind: TrackKind,
    settings: TrackSettings,
) -> StretchPatch {
    StretchPatch::for_track(
        kind,
        TrackPatch {
            clock: reset_clock(),
            duration: Some(settings.duration),
            rest: Some(settings.rest),
            items: None,
        },
    )
}

/// Rewrites the durations of tracks that are Idle or Done. A running or
/// paused track keeps the durations it started with until its next Start or
/// Reset. Returns `None` when no track is eligible.
pub fn update_stretch_settings(
    record: &StretchSession,
    dynamic: TrackSettings,
    stat: TrackSettings,
) -> Option<StretchPatch> {
    let settings_only = |kind: TrackKind, s: TrackSettings| {
        match record.track(kind).clock.status {
            SessionStatus::Idle | SessionStatus::Done => Some(TrackPatch {
                duration: Some(s.duration),
                rest: Some(s.rest),
                ..TrackPatch::default()
            }),
            SessionStatus::Running | SessionStatus::Paused => None,
        }
    };
    let patch = StretchPatch {
        dynamic: settings_only(TrackKind::Dynamic, dynamic),
        stat: settings_only(TrackKind::Static, stat),
    };
    if patch.dynamic.is_none() && patch.stat.is_none() {
        return None;
    }
    Some(patch)
}
