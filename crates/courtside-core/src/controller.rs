//! Admin-side controllers.
//!
//! A controller keeps the last known record, turns control commands into
//! patches, applies them locally and writes them through the store. Write
//! failures are reported but not rolled back; the next record update from
//! the store reconciles the local copy.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{CoreError, Result};
use crate::events::{Event, TimerFamily};
use crate::session::control;
use crate::session::{
    CircuitPatch, CircuitSelection, CircuitSession, StretchPatch, StretchSession, TrackKind,
    TrackSettings, CIRCUIT_SESSION_ID, STRETCH_SESSION_ID,
};
use crate::store::{load_circuit, load_stretch, write_patch, SessionStore, SessionUpdate};
use crate::timer::DerivedPhaseState;

pub struct CircuitController<S: SessionStore, C: Clock> {
    store: Arc<S>,
    clock: C,
    record: CircuitSession,
}

impl<S: SessionStore, C: Clock> CircuitController<S, C> {
    /// Read the current circuit record from `store`.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub fn load(store: Arc<S>, clock: C) -> Result<Self> {
        let record = load_circuit(store.as_ref())?;
        Ok(Self {
            store,
            clock,
            record,
        })
    }

    pub fn record(&self) -> &CircuitSession {
        &self.record
    }

    pub fn derived(&self) -> DerivedPhaseState {
        self.record.derive(self.clock.now())
    }

    pub fn snapshot(&self) -> Event {
        let now = self.clock.now();
        let params = self.record.params();
        Event::StateSnapshot {
            family: TimerFamily::Circuit,
            derived: self.record.derive(now),
            progress: params.progress(self.record.clock.elapsed(now)),
            at: now,
        }
    }

    /// Replace the local record with a committed update.
    pub fn observe(&mut self, update: &SessionUpdate) {
        if update.id == CIRCUIT_SESSION_ID {
            self.record = CircuitSession::from_document(Some(&update.document));
        }
    }

    /// Re-read the record from the store.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub fn reload(&mut self) -> Result<()> {
        self.record = load_circuit(self.store.as_ref())?;
        Ok(())
    }

    /// Start a session with `selection`.
    ///
    /// Returns `Ok(None)` when a session is already running or paused.
    ///
    /// # Errors
    /// Returns a validation error for an unusable selection, or a store
    /// error if the write fails.
    pub fn start(&mut self, selection: &CircuitSelection) -> Result<Option<Event>> {
        selection.validate()?;
        let now = self.clock.now();
        let Some(patch) = control::start(&self.record, selection, now) else {
            debug!(status = ?self.record.clock.status, "circuit start ignored");
            return Ok(None);
        };
        self.commit(&patch)?;
        info!(
            stations = selection.stations.len(),
            rounds = selection.rounds,
            work = selection.work,
            rest = selection.rest,
            "circuit started"
        );
        Ok(Some(Event::SessionStarted {
            family: TimerFamily::Circuit,
            at: now,
        }))
    }

    /// # Errors
    /// Returns a store error if the write fails.
    pub fn pause(&mut self) -> Result<Option<Event>> {
        let now = self.clock.now();
        let Some(patch) = control::pause(&self.record, now) else {
            debug!(status = ?self.record.clock.status, "circuit pause ignored");
            return Ok(None);
        };
        self.commit(&patch)?;
        let elapsed_secs = self.record.clock.elapsed_at_pause;
        info!(elapsed_secs, "circuit paused");
        Ok(Some(Event::SessionPaused {
            family: TimerFamily::Circuit,
            elapsed_secs,
            at: now,
        }))
    }

    /// # Errors
    /// Returns a store error if the write fails.
    pub fn resume(&mut self) -> Result<Option<Event>> {
        let now = self.clock.now();
        let Some(patch) = control::resume(&self.record, now) else {
            debug!(status = ?self.record.clock.status, "circuit resume ignored");
            return Ok(None);
        };
        let elapsed_secs = self.record.clock.elapsed_at_pause;
        self.commit(&patch)?;
        info!(elapsed_secs, "circuit resumed");
        Ok(Some(Event::SessionResumed {
            family: TimerFamily::Circuit,
            elapsed_secs,
            at: now,
        }))
    }

    /// # Errors
    /// Returns a store error if the write fails.
    pub fn reset(&mut self) -> Result<Event> {
        let now = self.clock.now();
        let patch = control::reset(&self.record);
        self.commit(&patch)?;
        info!("circuit reset");
        Ok(Event::SessionReset {
            family: TimerFamily::Circuit,
            at: now,
        })
    }

    fn commit(&mut self, patch: &CircuitPatch) -> Result<u64> {
        self.record.apply(patch);
        write_patch(self.store.as_ref(), CIRCUIT_SESSION_ID, patch).map_err(|e| {
            warn!(error = %e, "circuit write failed");
            CoreError::Store(e)
        })
    }
}

pub struct StretchController<S: SessionStore, C: Clock> {
    store: Arc<S>,
    clock: C,
    record: StretchSession,
}

impl<S: SessionStore, C: Clock> StretchController<S, C> {
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub fn load(store: Arc<S>, clock: C) -> Result<Self> {
        let record = load_stretch(store.as_ref())?;
        Ok(Self {
            store,
            clock,
            record,
        })
    }

    pub fn record(&self) -> &StretchSession {
        &self.record
    }

    pub fn derived(&self, kind: TrackKind) -> DerivedPhaseState {
        self.record.track(kind).derive(self.clock.now())
    }

    pub fn snapshot(&self, kind: TrackKind) -> Event {
        let now = self.clock.now();
        let track = self.record.track(kind);
        Event::StateSnapshot {
            family: TimerFamily::Stretch(kind),
            derived: track.derive(now),
            progress: track.params().progress(track.clock.elapsed(now)),
            at: now,
        }
    }

    pub fn observe(&mut self, update: &SessionUpdate) {
        if update.id == STRETCH_SESSION_ID {
            self.record = StretchSession::from_document(Some(&update.document));
        }
    }

    /// # Errors
    /// Returns an error if the store cannot be read.
    pub fn reload(&mut self) -> Result<()> {
        self.record = load_stretch(self.store.as_ref())?;
        Ok(())
    }

    /// Start one track over `item_count` stretches. The count is stored on
    /// the track so every viewer derives the same schedule.
    ///
    /// # Errors
    /// Returns a validation error when there is nothing to stretch, or a
    /// store error if the write fails.
    pub fn start(
        &mut self,
        kind: TrackKind,
        settings: TrackSettings,
        item_count: usize,
    ) -> Result<Option<Event>> {
        if item_count == 0 {
            return Err(crate::error::ValidationError::EmptyCollection(format!(
                "{} stretches",
                kind.key()
            ))
            .into());
        }
        let now = self.clock.now();
        let Some(patch) = control::start_track(&self.record, kind, settings, item_count, now)
        else {
            debug!(track = kind.key(), "stretch start ignored");
            return Ok(None);
        };
        self.commit(&patch)?;
        info!(
            track = kind.key(),
            items = item_count,
            duration = settings.duration,
            rest = settings.rest,
            "stretch track started"
        );
        Ok(Some(Event::SessionStarted {
            family: TimerFamily::Stretch(kind),
            at: now,
        }))
    }

    /// # Errors
    /// Returns a store error if the write fails.
    pub fn pause(&mut self, kind: TrackKind) -> Result<Option<Event>> {
        let now = self.clock.now();
        let Some(patch) = control::pause_track(&self.record, kind, now) else {
            debug!(track = kind.key(), "stretch pause ignored");
            return Ok(None);
        };
        self.commit(&patch)?;
        let elapsed_secs = self.record.track(kind).clock.elapsed_at_pause;
        info!(track = kind.key(), elapsed_secs, "stretch track paused");
        Ok(Some(Event::SessionPaused {
            family: TimerFamily::Stretch(kind),
            elapsed_secs,
            at: now,
        }))
    }

    /// # Errors
    /// Returns a store error if the write fails.
    pub fn resume(&mut self, kind: TrackKind) -> Result<Option<Event>> {
        let now = self.clock.now();
        let Some(patch) = control::resume_track(&self.record, kind, now) else {
            debug!(track = kind.key(), "stretch resume ignored");
            return Ok(None);
        };
        let elapsed_secs = self.record.track(kind).clock.elapsed_at_pause;
        self.commit(&patch)?;
        info!(track = kind.key(), elapsed_secs, "stretch track resumed");
        Ok(Some(Event::SessionResumed {
            family: TimerFamily::Stretch(kind),
            elapsed_secs,
            at: now,
        }))
    }

    /// # Errors
    /// Returns a store error if the write fails.
    pub fn reset(&mut self, kind: TrackKind, settings: TrackSettings) -> Result<Event> {
        let now = self.clock.now();
        let patch = control::reset_track(&self.record, kind, settings);
        self.commit(&patch)?;
        info!(track = kind.key(), "stretch track reset");
        Ok(Event::SessionReset {
            family: TimerFamily::Stretch(kind),
            at: now,
        })
    }

    /// Rewrite the durations of idle or finished tracks. Returns `false`
    /// when both tracks are running or paused and nothing was written.
    ///
    /// # Errors
    /// Returns a store error if the write fails.
    pub fn update_settings(&mut self, dynamic: TrackSettings, stat: TrackSettings) -> Result<bool> {
        let Some(patch) = control::update_stretch_settings(&self.record, dynamic, stat) else {
            debug!("stretch settings update ignored, both tracks active");
            return Ok(false);
        };
        self.commit(&patch)?;
        info!(
            dynamic = patch.dynamic.is_some(),
            stat = patch.stat.is_some(),
            "stretch settings updated"
        );
        Ok(true)
    }

    fn commit(&mut self, patch: &StretchPatch) -> Result<u64> {
        self.record.apply(patch);
        write_patch(self.store.as_ref(), STRETCH_SESSION_ID, patch).map_err(|e| {
            warn!(error = %e, "stretch write failed");
            CoreError::Store(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::session::SessionStatus;
    use crate::store::MemoryStore;
    use crate::timer::Phase;
    use chrono::{TimeZone, Utc};

    fn setup() -> (Arc<MemoryStore>, ManualClock) {
        let store = Arc::new(MemoryStore::provisioned().unwrap());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap());
        (store, clock)
    }

    fn selection() -> CircuitSelection {
        CircuitSelection {
            work: 30,
            rest: 10,
            rounds: 2,
            stations: vec!["a".into(), "b".into(), "c".into()],
        }
    }

    #[test]
    fn start_writes_through_the_store() {
        let (store, clock) = setup();
        let mut ctl = CircuitController::load(store.clone(), clock.clone()).unwrap();
        let event = ctl.start(&selection()).unwrap();
        assert!(matches!(event, Some(Event::SessionStarted { .. })));

        let stored = load_circuit(store.as_ref()).unwrap();
        assert_eq!(stored.clock.status, SessionStatus::Running);
        assert_eq!(stored.stations, selection().stations);
        assert_eq!(&stored, ctl.record());
    }

    #[test]
    fn empty_selection_is_rejected_before_writing() {
        let (store, clock) = setup();
        let mut ctl = CircuitController::load(store.clone(), clock).unwrap();
        let empty = CircuitSelection {
            stations: vec![],
            ..selection()
        };
        assert!(matches!(ctl.start(&empty), Err(CoreError::Validation(_))));
        assert_eq!(
            load_circuit(store.as_ref()).unwrap().clock.status,
            SessionStatus::Idle
        );
    }

    #[test]
    fn pause_and_resume_report_elapsed() {
        let (store, clock) = setup();
        let mut ctl = CircuitController::load(store, clock.clone()).unwrap();
        ctl.start(&selection()).unwrap();
        clock.advance_secs(35);
        match ctl.pause().unwrap() {
            Some(Event::SessionPaused { elapsed_secs, .. }) => assert_eq!(elapsed_secs, 35),
            other => panic!("unexpected {other:?}"),
        }
        assert!(ctl.pause().unwrap().is_none());
        clock.advance_secs(300);
        assert!(ctl.derived().paused);
        match ctl.resume().unwrap() {
            Some(Event::SessionResumed { elapsed_secs, .. }) => assert_eq!(elapsed_secs, 35),
            other => panic!("unexpected {other:?}"),
        }
        let derived = ctl.derived();
        assert_eq!(derived.phase, Phase::Rest);
        assert_eq!(derived.remaining, 5);
    }

    #[test]
    fn write_failure_keeps_optimistic_record() {
        let (store, clock) = setup();
        let mut ctl = CircuitController::load(store.clone(), clock).unwrap();
        store.set_fail_writes(true);
        assert!(matches!(ctl.start(&selection()), Err(CoreError::Store(_))));
        assert_eq!(ctl.record().clock.status, SessionStatus::Running);
        assert_eq!(
            load_circuit(store.as_ref()).unwrap().clock.status,
            SessionStatus::Idle
        );
        ctl.reload().unwrap();
        assert_eq!(ctl.record().clock.status, SessionStatus::Idle);
    }

    #[test]
    fn observe_ignores_other_sessions() {
        let (store, clock) = setup();
        let mut ctl = CircuitController::load(store, clock).unwrap();
        ctl.observe(&SessionUpdate {
            id: STRETCH_SESSION_ID.into(),
            revision: 9,
            document: serde_json::json!({"status": "running"}),
        });
        assert_eq!(ctl.record().clock.status, SessionStatus::Idle);
    }

    #[test]
    fn stretch_tracks_run_independently() {
        let (store, clock) = setup();
        let mut ctl = StretchController::load(store.clone(), clock.clone()).unwrap();
        ctl.start(TrackKind::Dynamic, TrackSettings::DYNAMIC, 4).unwrap().unwrap();
        clock.advance_secs(10);
        ctl.pause(TrackKind::Dynamic).unwrap().unwrap();
        assert!(ctl.pause(TrackKind::Static).unwrap().is_none());

        let stored = load_stretch(store.as_ref()).unwrap();
        assert_eq!(stored.dynamic.clock.status, SessionStatus::Paused);
        assert_eq!(stored.dynamic.clock.elapsed_at_pause, 10);
        assert_eq!(stored.stat.clock.status, SessionStatus::Idle);
    }

    #[test]
    fn stretch_start_needs_items() {
        let (store, clock) = setup();
        let mut ctl = StretchController::load(store, clock).unwrap();
        assert!(matches!(
            ctl.start(TrackKind::Static, TrackSettings::STATIC, 0),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn stretch_reset_applies_new_settings() {
        let (store, clock) = setup();
        let mut ctl = StretchController::load(store.clone(), clock).unwrap();
        let settings = TrackSettings {
            duration: 60,
            rest: 0,
        };
        ctl.start(TrackKind::Static, TrackSettings::STATIC, 2).unwrap();
        ctl.reset(TrackKind::Static, settings).unwrap();
        let stored = load_stretch(store.as_ref()).unwrap();
        assert_eq!(stored.stat.clock.status, SessionStatus::Idle);
        assert_eq!(stored.stat.settings(), settings);
    }

    #[test]
    fn stretch_settings_wait_for_running_track() {
        let (store, clock) = setup();
        let mut ctl = StretchController::load(store.clone(), clock.clone()).unwrap();
        ctl.start(TrackKind::Dynamic, TrackSettings::DYNAMIC, 4).unwrap().unwrap();
        clock.advance_secs(40);
        let before = ctl.derived(TrackKind::Dynamic);

        let short = TrackSettings {
            duration: 5,
            rest: 0,
        };
        assert!(ctl.update_settings(short, short).unwrap());
        assert_eq!(ctl.derived(TrackKind::Dynamic), before);
        let stored = load_stretch(store.as_ref()).unwrap();
        assert_eq!(stored.dynamic.settings(), TrackSettings::DYNAMIC);
        assert_eq!(stored.dynamic.items, 4);
        assert_eq!(stored.stat.settings(), short);

        ctl.start(TrackKind::Static, short, 1).unwrap().unwrap();
        assert!(!ctl.update_settings(short, short).unwrap());
    }
}
