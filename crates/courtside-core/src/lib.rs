//! # Courtside Core Library
//!
//! This library provides the timing logic for Courtside, a coach-operated
//! countdown for circuit and stretch sessions that many screens follow at once.
//! One admin client drives the session; every viewer derives the same phase
//! from the shared record and its own wall clock, so no tick is ever sent
//! over the wire.
//!
//! ## Architecture
//!
//! - **Phase Engine**: A pure function from (record, parameters, now) to the
//!   current phase, station, round and remaining seconds
//! - **Control Surface**: Start/Pause/Resume/Reset as pure patch builders
//! - **Session Store**: Merge-patch documents with ordered push updates
//!   (in-memory and SQLite adapters)
//! - **Refresh Loop**: Re-derives on record change and on a 1 Hz tick while
//!   a session is running
//!
//! ## Key Components
//!
//! - [`derive`]: Phase derivation from a shared session record
//! - [`LocalCircuitTimer`]: Tick-driven standalone timer with the same output
//! - [`CircuitController`] / [`StretchController`]: Admin-side control
//! - [`TimerView`]: Viewer-side refresh loop
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod controller;
pub mod error;
pub mod events;
pub mod refresh;
pub mod session;
pub mod storage;
pub mod store;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{CircuitController, StretchController};
pub use error::{ConfigError, CoreError, StoreError, ValidationError};
pub use events::{transition_cue, Event, TimerFamily};
pub use refresh::{
    CircuitSource, StretchTrackSource, Ticker, TimerSource, TimerView, UpdateReason, ViewUpdate,
};
pub use session::{
    CircuitSelection, CircuitSession, SessionClock, SessionStatus, StretchSession, StretchTrack,
    TrackKind, TrackSettings, CIRCUIT_SESSION_ID, STRETCH_SESSION_ID,
};
pub use storage::Config;
pub use store::{MemoryStore, SessionStore, SessionUpdate, SqliteStore, Subscription};
pub use timer::{
    derive, derive_at_elapsed, DerivedPhaseState, DrillTimer, LocalCircuitTimer, Phase,
    TimerParams,
};
