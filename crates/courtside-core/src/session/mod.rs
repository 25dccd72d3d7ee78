pub mod control;
mod patch;
mod record;

pub use control::CircuitSelection;
pub use patch::{CircuitPatch, ClockPatch, MergePatch, StretchPatch, TrackPatch};
pub use record::{
    CircuitSession, SessionClock, SessionStatus, StretchSession, StretchTrack, TrackKind,
    TrackSettings, CIRCUIT_SESSION_ID, STRETCH_SESSION_ID,
};
