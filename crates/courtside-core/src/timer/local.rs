//! Standalone circuit timer.
//!
//! Used when no shared session is available: the caller drives it with one
//! `tick()` per second instead of replaying from a stored start time. After
//! `k` unpaused ticks from `start()` its [`state`](LocalCircuitTimer::state)
//! equals `derive_at_elapsed(params, k, false)`.
//!
//! ```ignore
//! let mut timer = LocalCircuitTimer::new(TimerParams::new(45, 15, 3, 6));
//! timer.start();
//! // Once per second:
//! if let Some(cue) = timer.tick() { /* play sound */ }
//! ```

use serde::{Deserialize, Serialize};

use super::phase::{DerivedPhaseState, Phase, TimerParams};
use crate::events::{countdown_warning, Event};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalCircuitTimer {
    params: TimerParams,
    phase: Phase,
    paused: bool,
    /// Seconds spent in the current phase.
    time_in_phase: u64,
    station_index: usize,
    round: u32,
}

impl LocalCircuitTimer {
    pub fn new(params: TimerParams) -> Self {
        Self {
            params,
            phase: Phase::Idle,
            paused: false,
            time_in_phase: 0,
            station_index: 0,
            round: 1,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn params(&self) -> &TimerParams {
        &self.params
    }

    pub fn state(&self) -> DerivedPhaseState {
        match self.phase {
            Phase::Idle => DerivedPhaseState::IDLE,
            Phase::Done => DerivedPhaseState {
                phase: Phase::Done,
                paused: false,
                remaining: 0,
                station_index: self.station_index,
                round: self.round,
            },
            Phase::Work | Phase::Rest => DerivedPhaseState {
                phase: self.phase,
                paused: self.paused,
                remaining: self.phase_duration().saturating_sub(self.time_in_phase),
                station_index: self.station_index,
                round: self.round,
            },
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Valid from Idle or Done. Empty circuits stay idle.
    pub fn start(&mut self) -> Option<Event> {
        if !matches!(self.phase, Phase::Idle | Phase::Done) || self.params.is_empty() {
            return None;
        }
        self.phase = Phase::Work;
        self.paused = false;
        self.time_in_phase = 0;
        self.station_index = 0;
        self.round = 1;
        Some(self.phase_started())
    }

    pub fn pause(&mut self) -> bool {
        if self.is_running() {
            self.paused = true;
            return true;
        }
        false
    }

    pub fn resume(&mut self) -> bool {
        if self.paused && matches!(self.phase, Phase::Work | Phase::Rest) {
            self.paused = false;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.params);
    }

    /// Replace the parameters; like any configuration change this resets.
    pub fn set_params(&mut self, params: TimerParams) {
        *self = Self::new(params);
    }

    /// Advance one second. Returns the cue for this second, if any.
    pub fn tick(&mut self) -> Option<Event> {
        if !self.is_running() {
            return None;
        }
        let duration = self.phase_duration();
        if self.time_in_phase + 1 >= duration {
            return Some(self.finish_phase());
        }
        self.time_in_phase += 1;
        countdown_warning(duration - self.time_in_phase + 1, duration - self.time_in_phase)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn is_running(&self) -> bool {
        !self.paused && matches!(self.phase, Phase::Work | Phase::Rest)
    }

    fn phase_duration(&self) -> u64 {
        match self.phase {
            Phase::Work => self.params.work_secs(),
            Phase::Rest => self.params.rest,
            Phase::Idle | Phase::Done => 0,
        }
    }

    fn is_last_slot(&self) -> bool {
        self.station_index + 1 >= self.params.station_count && self.round >= self.params.rounds
    }

    fn finish_phase(&mut self) -> Event {
        self.time_in_phase = 0;
        match self.phase {
            Phase::Work if self.is_last_slot() => {
                self.phase = Phase::Done;
                Event::SessionCompleted {
                    rounds: self.round,
                }
            }
            // A zero-length rest is skipped outright.
            Phase::Work if self.params.rest > 0 => {
                self.phase = Phase::Rest;
                self.phase_started()
            }
            _ => {
                self.advance_station();
                self.phase = Phase::Work;
                self.phase_started()
            }
        }
    }

    fn advance_station(&mut self) {
        self.station_index += 1;
        if self.station_index >= self.params.station_count {
            self.station_index = 0;
            self.round += 1;
        }
    }

    fn phase_started(&self) -> Event {
        Event::PhaseStarted {
            phase: self.phase,
            station_index: self.station_index,
            round: self.round,
        }
    }
}
