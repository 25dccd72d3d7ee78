//! Per-drill countdown.
//!
//! A plain local countdown shown next to the drill viewer. Not shared through
//! the store; the caller ticks it once per second.

use serde::{Deserialize, Serialize};

use crate::events::Event;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrillTimer {
    duration: u64,
    remaining: u64,
    running: bool,
}

impl DrillTimer {
    pub fn new(duration: u64) -> Self {
        Self {
            duration,
            remaining: duration,
            running: false,
        }
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start or pause. A finished countdown does not restart until reset.
    pub fn toggle(&mut self) -> bool {
        if !self.running && self.remaining == 0 {
            return false;
        }
        self.running = !self.running;
        true
    }

    /// Refill to the full duration without changing running state.
    pub fn reset(&mut self) {
        self.remaining = self.duration;
    }

    pub fn extend(&mut self, secs: u64) {
        self.remaining = self.remaining.saturating_add(secs);
    }

    /// Switching drills stops the countdown and loads the new duration.
    pub fn set_duration(&mut self, duration: u64) {
        *self = Self::new(duration);
    }

    pub fn tick(&mut self) -> Option<Event> {
        if !self.running {
            return None;
        }
        if self.remaining <= 1 {
            self.remaining = 0;
            self.running = false;
            return Some(Event::DrillCompleted {
                duration_secs: self.duration,
            });
        }
        self.remaining -= 1;
        None
    }

    /// `mm:ss` as shown on the drill card.
    pub fn display(&self) -> String {
        format!("{:02}:{:02}", self.remaining / 60, self.remaining % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_down_and_stops() {
        let mut drill = DrillTimer::new(3);
        assert!(drill.toggle());
        assert_eq!(drill.tick(), None);
        assert_eq!(drill.tick(), None);
        assert_eq!(drill.tick(), Some(Event::DrillCompleted { duration_secs: 3 }));
        assert!(!drill.is_running());
        assert_eq!(drill.tick(), None);
        assert!(!drill.toggle());
    }

    #[test]
    fn extend_and_reset() {
        let mut drill = DrillTimer::new(90);
        drill.toggle();
        drill.tick();
        drill.extend(30);
        assert_eq!(drill.remaining(), 119);
        drill.reset();
        assert_eq!(drill.remaining(), 90);
        assert!(drill.is_running());
    }

    #[test]
    fn set_duration_stops() {
        let mut drill = DrillTimer::new(90);
        drill.toggle();
        drill.set_duration(120);
        assert!(!drill.is_running());
        assert_eq!(drill.display(), "02:00");
    }
}
