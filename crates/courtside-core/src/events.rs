use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::TrackKind;
use crate::timer::{DerivedPhaseState, Phase};

/// Which shared timer a control event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerFamily {
    Circuit,
    Stretch(TrackKind),
}

/// Every control operation and every cue-worthy transition produces an Event.
/// Presentation layers map cue events to sounds; the core never plays them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        family: TimerFamily,
        at: DateTime<Utc>,
    },
    SessionPaused {
        family: TimerFamily,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    SessionResumed {
        family: TimerFamily,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    SessionReset {
        family: TimerFamily,
        at: DateTime<Utc>,
    },
    /// A Work or Rest phase began (the "go" and "rest" cues).
    PhaseStarted {
        phase: Phase,
        station_index: usize,
        round: u32,
    },
    /// The last three seconds of a phase.
    CountdownWarning {
        remaining: u64,
    },
    SessionCompleted {
        rounds: u32,
    },
    DrillCompleted {
        duration_secs: u64,
    },
    StateSnapshot {
        family: TimerFamily,
        derived: DerivedPhaseState,
        progress: f64,
        at: DateTime<Utc>,
    },
}

const WARNING_SECS: u64 = 3;

/// The cue implied by moving from `prev` to `next`, if any.
///
/// Shared viewers diff consecutive derived states with this; the local
/// timer emits the same events from its own transitions.
pub fn transition_cue(prev: &DerivedPhaseState, next: &DerivedPhaseState) -> Option<Event> {
    if next.paused {
        return None;
    }
    let moved = prev.phase != next.phase
        || prev.station_index != next.station_index
        || prev.round != next.round;
    match next.phase {
        Phase::Idle => None,
        Phase::Done if prev.phase != Phase::Done => Some(Event::SessionCompleted {
            rounds: next.round,
        }),
        Phase::Done => None,
        Phase::Work | Phase::Rest if moved => Some(Event::PhaseStarted {
            phase: next.phase,
            station_index: next.station_index,
            round: next.round,
        }),
        Phase::Work | Phase::Rest => countdown_warning(prev.remaining, next.remaining),
    }
}

pub(crate) fn countdown_warning(prev_remaining: u64, remaining: u64) -> Option<Event> {
    if remaining != prev_remaining && (1..=WARNING_SECS).contains(&remaining) {
        Some(Event::CountdownWarning { remaining })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{derive_at_elapsed, TimerParams};

    #[test]
    fn cues_follow_the_session() {
        let params = TimerParams::new(5, 2, 1, 2);
        let cues: Vec<Option<Event>> = (1..=12)
            .map(|e| {
                transition_cue(
                    &derive_at_elapsed(&params, e - 1, false),
                    &derive_at_elapsed(&params, e, false),
                )
            })
            .collect();

        assert_eq!(cues[1], Some(Event::CountdownWarning { remaining: 3 }));
        assert_eq!(
            cues[4],
            Some(Event::PhaseStarted {
                phase: Phase::Rest,
                station_index: 0,
                round: 1
            })
        );
        assert_eq!(
            cues[6],
            Some(Event::PhaseStarted {
                phase: Phase::Work,
                station_index: 1,
                round: 1
            })
        );
        assert_eq!(cues[11], Some(Event::SessionCompleted { rounds: 1 }));
    }

    #[test]
    fn paused_states_cue_nothing() {
        let params = TimerParams::new(5, 2, 1, 2);
        let prev = derive_at_elapsed(&params, 1, false);
        let next = derive_at_elapsed(&params, 2, true);
        assert_eq!(transition_cue(&prev, &next), None);
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let json = serde_json::to_value(Event::CountdownWarning { remaining: 2 }).unwrap();
        assert_eq!(json["type"], "CountdownWarning");
    }
}
