//! Clock-driven refresh of a shared timer view.
//!
//! A [`TimerView`] recomputes its derived state immediately on every record
//! change and, only while the derived state moves with time, once per tick.
//! The periodic trigger is an owned [`Ticker`]: created when the view starts
//! needing ticks and dropped (which aborts its task) the moment it stops.

use std::ops::ControlFlow;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::Clock;
use crate::events::{transition_cue, Event};
use crate::session::{
    CircuitSession, StretchSession, TrackKind, CIRCUIT_SESSION_ID, STRETCH_SESSION_ID,
};
use crate::store::{SessionUpdate, Subscription};
use crate::timer::DerivedPhaseState;

/// Owned periodic trigger. Dropping it stops the ticks.
#[derive(Debug)]
pub struct Ticker {
    task: JoinHandle<()>,
    rx: mpsc::Receiver<()>,
}

impl Ticker {
    /// Must be called from within a tokio runtime.
    pub fn start(every: Duration) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the caller has just refreshed.
            interval.tick().await;
            loop {
                interval.tick().await;
                if tx.send(()).await.is_err() {
                    break;
                }
            }
        });
        Self { task, rx }
    }

    pub async fn tick(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// How a timer family turns a store document into derived state.
pub trait TimerSource: Send {
    type Record: Clone + Send + Serialize;

    fn session_id(&self) -> &'static str;
    fn decode(&self, doc: Option<&Value>) -> Self::Record;
    fn derive(&self, record: &Self::Record, now: DateTime<Utc>) -> DerivedPhaseState;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CircuitSource;

impl TimerSource for CircuitSource {
    type Record = CircuitSession;

    fn session_id(&self) -> &'static str {
        CIRCUIT_SESSION_ID
    }

    fn decode(&self, doc: Option<&Value>) -> CircuitSession {
        CircuitSession::from_document(doc)
    }

    fn derive(&self, record: &CircuitSession, now: DateTime<Utc>) -> DerivedPhaseState {
        record.derive(now)
    }
}

/// One stretch track. Its item count is the one snapshotted at Start.
#[derive(Debug, Clone, Copy)]
pub struct StretchTrackSource {
    pub kind: TrackKind,
}

impl TimerSource for StretchTrackSource {
    type Record = StretchSession;

    fn session_id(&self) -> &'static str {
        STRETCH_SESSION_ID
    }

    fn decode(&self, doc: Option<&Value>) -> StretchSession {
        StretchSession::from_document(doc)
    }

    fn derive(&self, record: &StretchSession, now: DateTime<Utc>) -> DerivedPhaseState {
        record.track(self.kind).derive(now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateReason {
    Initial,
    Record,
    Tick,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewUpdate {
    pub reason: UpdateReason,
    pub derived: DerivedPhaseState,
    /// Cue implied by the change since the previous update.
    pub cue: Option<Event>,
}

pub struct TimerView<T: TimerSource, C: Clock> {
    source: T,
    clock: C,
    record: T::Record,
    derived: DerivedPhaseState,
    tick_every: Duration,
}

impl<T: TimerSource, C: Clock> TimerView<T, C> {
    pub fn new(source: T, clock: C, initial: Option<&Value>) -> Self {
        let record = source.decode(initial);
        let derived = source.derive(&record, clock.now());
        Self {
            source,
            clock,
            record,
            derived,
            tick_every: Duration::from_secs(1),
        }
    }

    pub fn with_tick_interval(mut self, every: Duration) -> Self {
        self.tick_every = every;
        self
    }

    pub fn record(&self) -> &T::Record {
        &self.record
    }

    pub fn derived(&self) -> DerivedPhaseState {
        self.derived
    }

    /// Replace the record and recompute right away.
    pub fn apply_update(&mut self, update: &SessionUpdate) -> ViewUpdate {
        self.record = self.source.decode(Some(&update.document));
        self.recompute(UpdateReason::Record)
    }

    /// Recompute against the clock without a record change.
    pub fn refresh(&mut self) -> ViewUpdate {
        self.recompute(UpdateReason::Tick)
    }

    fn recompute(&mut self, reason: UpdateReason) -> ViewUpdate {
        let next = self.source.derive(&self.record, self.clock.now());
        let cue = transition_cue(&self.derived, &next);
        self.derived = next;
        ViewUpdate {
            reason,
            derived: next,
            cue,
        }
    }

    /// Drive the view until the subscription ends or `on_update` breaks.
    ///
    /// `on_update` sees the initial state first, then every record change and
    /// every tick while the session is running.
    pub async fn run<F>(&mut self, mut subscription: Subscription, mut on_update: F)
    where
        F: FnMut(&ViewUpdate) -> ControlFlow<()>,
    {
        let initial = ViewUpdate {
            reason: UpdateReason::Initial,
            derived: self.derived,
            cue: None,
        };
        if on_update(&initial).is_break() {
            return;
        }

        let mut ticker: Option<Ticker> = None;
        loop {
            if self.derived.needs_ticking() {
                if ticker.is_none() {
                    tracing::debug!(id = self.source.session_id(), "ticker started");
                    ticker = Some(Ticker::start(self.tick_every));
                }
            } else if ticker.take().is_some() {
                tracing::debug!(id = self.source.session_id(), "ticker stopped");
            }

            let update = tokio::select! {
                received = subscription.next() => match received {
                    Some(received) => self.apply_update(&received),
                    None => break,
                },
                Some(()) = next_tick(&mut ticker) => self.refresh(),
            };
            if on_update(&update).is_break() {
                break;
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<Ticker>) -> Option<()> {
    match ticker {
        Some(ticker) => ticker.tick().await,
        None => std::future::pending().await,
    }
}
