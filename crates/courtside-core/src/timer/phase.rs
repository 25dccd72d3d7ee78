//! Phase derivation.
//!
//! Maps a session clock, the session's static parameters and `now` to the
//! phase, remaining seconds, station and round every viewer should show.
//! Nothing here reads a clock or mutates a record, so any number of viewers
//! can call it at any frequency and agree.
//!
//! A session is `station_count * rounds` slots laid end to end. Each slot is
//! `work` seconds of work followed by `rest` seconds of rest, except the final
//! slot of the whole session, which has no trailing rest:
//!
//! ```text
//! |-- work --|- rest -|-- work --|- rest -| ... |-- work --|
//!   slot 0              slot 1                  last slot
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{SessionClock, SessionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Work,
    Rest,
    Done,
}

/// Static timing parameters of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerParams {
    pub work: u64,
    pub rest: u64,
    pub rounds: u32,
    pub station_count: usize,
}

impl TimerParams {
    pub fn new(work: u64, rest: u64, rounds: u32, station_count: usize) -> Self {
        Self {
            work,
            rest,
            rounds,
            station_count,
        }
    }

    /// Work seconds, clamped to at least one.
    pub fn work_secs(&self) -> u64 {
        self.work.max(1)
    }

    /// One slot including its trailing rest.
    pub fn unit(&self) -> u64 {
        self.work_secs().saturating_add(self.rest)
    }

    pub fn total_slots(&self) -> u64 {
        (self.station_count as u64).saturating_mul(self.rounds as u64)
    }

    /// Whole-session duration in seconds. The last slot contributes no rest.
    pub fn total_duration(&self) -> u64 {
        match self.total_slots() {
            0 => 0,
            slots => (slots - 1)
                .saturating_mul(self.unit())
                .saturating_add(self.work_secs()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_slots() == 0
    }

    /// 0.0 .. 1.0 progress across the whole session.
    pub fn progress(&self, elapsed: u64) -> f64 {
        let total = self.total_duration();
        if total == 0 {
            return 0.0;
        }
        (elapsed as f64 / total as f64).min(1.0)
    }
}

/// What a viewer shows. Recomputed on demand, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedPhaseState {
    pub phase: Phase,
    /// Set when the session is paused in Work or Rest.
    pub paused: bool,
    /// Seconds left in the current phase.
    pub remaining: u64,
    pub station_index: usize,
    /// 1-based.
    pub round: u32,
}

impl DerivedPhaseState {
    pub const IDLE: DerivedPhaseState = DerivedPhaseState {
        phase: Phase::Idle,
        paused: false,
        remaining: 0,
        station_index: 0,
        round: 1,
    };

    fn done(params: &TimerParams) -> Self {
        Self {
            phase: Phase::Done,
            paused: false,
            remaining: 0,
            station_index: params.station_count.saturating_sub(1),
            round: params.rounds.max(1),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Work | Phase::Rest)
    }

    /// Whether the state changes with the passage of time alone.
    pub fn needs_ticking(&self) -> bool {
        self.is_active() && !self.paused
    }

    /// The station that follows the current one, wrapping into the next round.
    pub fn next_station_index(&self, station_count: usize) -> usize {
        if station_count == 0 {
            return 0;
        }
        (self.station_index + 1) % station_count
    }
}

/// Derive the viewer state for `clock` at `now`.
pub fn derive(clock: &SessionClock, params: &TimerParams, now: DateTime<Utc>) -> DerivedPhaseState {
    match clock.status {
        SessionStatus::Idle => DerivedPhaseState::IDLE,
        _ if params.is_empty() || params.rounds == 0 => DerivedPhaseState::IDLE,
        SessionStatus::Done => DerivedPhaseState::done(params),
        SessionStatus::Paused => derive_at_elapsed(params, clock.elapsed_at_pause, true),
        SessionStatus::Running => derive_at_elapsed(params, clock.elapsed(now), false),
    }
}

/// Derive the viewer state `elapsed` whole seconds into a session.
pub fn derive_at_elapsed(params: &TimerParams, elapsed: u64, paused: bool) -> DerivedPhaseState {
    if params.is_empty() {
        return DerivedPhaseState::IDLE;
    }

    let work = params.work_secs();
    let unit = params.unit();
    let slots = params.total_slots();
    if elapsed >= params.total_duration() {
        return DerivedPhaseState::done(params);
    }

    let last_slot_start = (slots - 1).saturating_mul(unit);
    let (block, time_in_block) = if elapsed >= last_slot_start {
        (slots - 1, elapsed - last_slot_start)
    } else {
        (elapsed / unit, elapsed % unit)
    };

    let count = params.station_count as u64;
    let station_index = (block % count) as usize;
    let round = (block / count + 1) as u32;

    let (phase, remaining) = if time_in_block < work {
        (Phase::Work, work - time_in_block)
    } else {
        (Phase::Rest, unit - time_in_block)
    };

    DerivedPhaseState {
        phase,
        paused,
        remaining,
        station_index,
        round,
    }
}
