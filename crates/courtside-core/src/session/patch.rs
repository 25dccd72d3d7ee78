//! Partial record updates.
//!
//! Patches serialize as JSON merge-patches: an absent field is left alone by
//! the store, `null` clears it. `start_time` is a double option so a patch can
//! say "clear" (`Some(None)`) as well as "untouched" (`None`).

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::record::{SessionStatus, TrackKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct ClockPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_at_pause: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct CircuitPatch {
    #[serde(flatten)]
    pub clock: ClockPatch,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rest: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rounds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stations: Option<Vec<String>>,
}

impl From<ClockPatch> for CircuitPatch {
    fn from(clock: ClockPatch) -> Self {
        Self {
            clock,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct TrackPatch {
    #[serde(flatten)]
    pub clock: ClockPatch,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rest: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<usize>,
}

impl From<ClockPatch> for TrackPatch {
    fn from(clock: ClockPatch) -> Self {
        Self {
            clock,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct StretchPatch {
    #[serde(rename = "dyn", skip_serializing_if = "Option::is_none")]
    pub dynamic: Option<TrackPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stat: Option<TrackPatch>,
}

impl StretchPatch {
    pub fn for_track(kind: TrackKind, patch: TrackPatch) -> Self {
        match kind {
            TrackKind::Dynamic => Self {
                dynamic: Some(patch),
                stat: None,
            },
            TrackKind::Static => Self {
                dynamic: None,
                stat: Some(patch),
            },
        }
    }
}

/// Anything that can be sent to the store as a merge-patch.
pub trait MergePatch: Serialize {
    fn to_merge_patch(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

impl MergePatch for CircuitPatch {}
impl MergePatch for StretchPatch {}
