//! Persisted session records.
//!
//! One singleton document per timer family lives in the session store. The
//! shape mirrors the stored JSON: the circuit record is flat, the stretch
//! record nests one object per track (`dyn`, `stat`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::patch::{CircuitPatch, ClockPatch, StretchPatch, TrackPatch};
use crate::timer::{derive, DerivedPhaseState, TimerParams};

/// Store id of the one circuit session.
pub const CIRCUIT_SESSION_ID: &str = "circuit_session";
/// Store id of the one stretch session.
pub const STRETCH_SESSION_ID: &str = "stretch_session";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    Paused,
    /// Normally derived from elapsed time; accepted when a writer stores it.
    Done,
}

/// The `(status, start_time, elapsed_at_pause)` triple every timer replays from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionClock {
    #[serde(default)]
    pub status: SessionStatus,
    /// Back-dated start of the current running interval.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// Whole seconds elapsed when the session was last paused.
    #[serde(default)]
    pub elapsed_at_pause: u64,
}

impl SessionClock {
    /// Whole seconds elapsed at `now`.
    ///
    /// Running sessions replay from `start_time` (clamped at zero for clock
    /// skew), paused sessions report the snapshot, anything else is zero.
    pub fn elapsed(&self, now: DateTime<Utc>) -> u64 {
        match self.status {
            SessionStatus::Paused => self.elapsed_at_pause,
            SessionStatus::Running => match self.start_time {
                Some(start) => {
                    let ms = (now - start).num_milliseconds();
                    ms.div_euclid(1000).max(0) as u64
                }
                None => 0,
            },
            SessionStatus::Idle | SessionStatus::Done => 0,
        }
    }

    pub fn apply(&mut self, patch: &ClockPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(start_time) = patch.start_time {
            self.start_time = start_time;
        }
        if let Some(elapsed) = patch.elapsed_at_pause {
            self.elapsed_at_pause = elapsed;
        }
    }
}

/// Work/rest seconds for one stretch track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSettings {
    pub duration: u64,
    pub rest: u64,
}

impl TrackSettings {
    pub const DYNAMIC: TrackSettings = TrackSettings {
        duration: 30,
        rest: 5,
    };
    pub const STATIC: TrackSettings = TrackSettings {
        duration: 20,
        rest: 5,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    #[serde(rename = "dyn")]
    Dynamic,
    #[serde(rename = "stat")]
    Static,
}

impl TrackKind {
    pub fn key(self) -> &'static str {
        match self {
            TrackKind::Dynamic => "dyn",
            TrackKind::Static => "stat",
        }
    }

    pub fn default_settings(self) -> TrackSettings {
        match self {
            TrackKind::Dynamic => TrackSettings::DYNAMIC,
            TrackKind::Static => TrackSettings::STATIC,
        }
    }
}

impl std::str::FromStr for TrackKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dyn" | "dynamic" => Ok(TrackKind::Dynamic),
            "stat" | "static" => Ok(TrackKind::Static),
            other => Err(format!("unknown stretch track: {other}")),
        }
    }
}

/// The shared circuit session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitSession {
    #[serde(flatten)]
    pub clock: SessionClock,
    #[serde(default = "default_work")]
    pub work: u64,
    #[serde(default = "default_rest")]
    pub rest: u64,
    #[serde(default = "default_rounds")]
    pub rounds: u32,
    /// Station ids snapshotted at Start.
    #[serde(default)]
    pub stations: Vec<String>,
}

fn default_work() -> u64 {
    45
}
fn default_rest() -> u64 {
    15
}
fn default_rounds() -> u32 {
    3
}

impl Default for CircuitSession {
    fn default() -> Self {
        Self {
            clock: SessionClock::default(),
            work: default_work(),
            rest: default_rest(),
            rounds: default_rounds(),
            stations: Vec::new(),
        }
    }
}

impl CircuitSession {
    /// Decode a store document. Missing or malformed documents read as idle.
    pub fn from_document(doc: Option<&Value>) -> Self {
        decode_or_default(CIRCUIT_SESSION_ID, doc)
    }

    pub fn params(&self) -> TimerParams {
        TimerParams::new(self.work, self.rest, self.rounds, self.stations.len())
    }

    pub fn derive(&self, now: DateTime<Utc>) -> DerivedPhaseState {
        derive(&self.clock, &self.params(), now)
    }

    /// Station id currently on screen, if any.
    pub fn station_at(&self, state: &DerivedPhaseState) -> Option<&str> {
        if state.phase == crate::timer::Phase::Idle {
            return None;
        }
        self.stations.get(state.station_index).map(String::as_str)
    }

    pub fn apply(&mut self, patch: &CircuitPatch) {
        self.clock.apply(&patch.clock);
        if let Some(work) = patch.work {
            self.work = work;
        }
        if let Some(rest) = patch.rest {
            self.rest = rest;
        }
        if let Some(rounds) = patch.rounds {
            self.rounds = rounds;
        }
        if let Some(ref stations) = patch.stations {
            self.stations = stations.clone();
        }
    }
}

/// One independently controlled stretch track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StretchTrack {
    #[serde(flatten)]
    pub clock: SessionClock,
    pub duration: u64,
    pub rest: u64,
    /// Number of stretches in the list, snapshotted at Start.
    #[serde(default)]
    pub items: usize,
}

impl StretchTrack {
    pub fn idle(settings: TrackSettings) -> Self {
        Self {
            clock: SessionClock::default(),
            duration: settings.duration,
            rest: settings.rest,
            items: 0,
        }
    }

    pub fn settings(&self) -> TrackSettings {
        TrackSettings {
            duration: self.duration,
            rest: self.rest,
        }
    }

    /// Stretch items are a single round over the track's item list.
    pub fn params(&self) -> TimerParams {
        TimerParams::new(self.duration, self.rest, 1, self.items)
    }

    pub fn derive(&self, now: DateTime<Utc>) -> DerivedPhaseState {
        derive(&self.clock, &self.params(), now)
    }

    pub fn apply(&mut self, patch: &TrackPatch) {
        self.clock.apply(&patch.clock);
        if let Some(duration) = patch.duration {
            self.duration = duration;
        }
        if let Some(rest) = patch.rest {
            self.rest = rest;
        }
        if let Some(items) = patch.items {
            self.items = items;
        }
    }
}

/// The shared stretch session: two tracks, each with its own clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StretchSession {
    #[serde(rename = "dyn", default = "dynamic_track")]
    pub dynamic: StretchTrack,
    #[serde(default = "static_track")]
    pub stat: StretchTrack,
}

fn dynamic_track() -> StretchTrack {
    StretchTrack::idle(TrackSettings::DYNAMIC)
}
fn static_track() -> StretchTrack {
    StretchTrack::idle(TrackSettings::STATIC)
}

impl Default for StretchSession {
    fn default() -> Self {
        Self {
            dynamic: dynamic_track(),
            stat: static_track(),
        }
    }
}

impl StretchSession {
    pub fn from_document(doc: Option<&Value>) -> Self {
        decode_or_default(STRETCH_SESSION_ID, doc)
    }

    pub fn track(&self, kind: TrackKind) -> &StretchTrack {
        match kind {
            TrackKind::Dynamic => &self.dynamic,
            TrackKind::Static => &self.stat,
        }
    }

    pub fn track_mut(&mut self, kind: TrackKind) -> &mut StretchTrack {
        match kind {
            TrackKind::Dynamic => &mut self.dynamic,
            TrackKind::Static => &mut self.stat,
        }
    }

    pub fn apply(&mut self, patch: &StretchPatch) {
        if let Some(ref p) = patch.dynamic {
            self.dynamic.apply(p);
        }
        if let Some(ref p) = patch.stat {
            self.stat.apply(p);
        }
    }
}

fn decode_or_default<T>(id: &str, doc: Option<&Value>) -> T
where
    T: Default + for<'de> Deserialize<'de>,
{
    match doc {
        None | Some(Value::Null) => T::default(),
        Some(value) => match T::deserialize(value) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(id, error = %e, "malformed session record, treating as idle");
                T::default()
            }
        },
    }
}
