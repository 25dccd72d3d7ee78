mod drill;
mod local;
mod phase;

pub use drill::DrillTimer;
pub use local::LocalCircuitTimer;
pub use phase::{derive, derive_at_elapsed, DerivedPhaseState, Phase, TimerParams};
