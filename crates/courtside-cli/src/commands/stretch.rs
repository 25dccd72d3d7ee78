use clap::Subcommand;
use courtside_core::{
    Config, StretchController, StretchTrackSource, SystemClock, TrackKind, TrackSettings,
};
use serde_json::json;

use super::{open_store, print_json, print_outcome, watch, CliResult};

#[derive(Subcommand)]
pub enum StretchAction {
    /// Dynamic stretch track
    Dyn {
        #[command(subcommand)]
        action: TrackAction,
    },
    /// Static stretch track
    Stat {
        #[command(subcommand)]
        action: TrackAction,
    },
    /// Update both tracks' hold and rest seconds. Running or paused tracks
    /// pick the new values up on their next start or reset.
    Settings {
        #[arg(long)]
        dyn_duration: Option<u64>,
        #[arg(long)]
        dyn_rest: Option<u64>,
        #[arg(long)]
        stat_duration: Option<u64>,
        #[arg(long)]
        stat_rest: Option<u64>,
    },
}

#[derive(Subcommand)]
pub enum TrackAction {
    /// Start the track over the published stretches
    Start {
        /// Number of stretches in the published list
        #[arg(long)]
        items: usize,
    },
    /// Pause the running track
    Pause,
    /// Resume a paused track
    Resume,
    /// Reset to idle and apply the configured durations
    Reset,
    /// Print the track and its derived state as JSON
    Status,
    /// Follow the track, one JSON line per change or tick
    Watch {
        /// Stop after this many updates
        #[arg(long)]
        updates: Option<usize>,
    },
}

fn configured(config: &Config, kind: TrackKind) -> TrackSettings {
    match kind {
        TrackKind::Dynamic => config.stretch.dynamic,
        TrackKind::Static => config.stretch.stat,
    }
}

pub fn run(action: StretchAction) -> CliResult {
    let mut config = Config::load()?;
    match action {
        StretchAction::Dyn { action } => run_track(&config, TrackKind::Dynamic, action),
        StretchAction::Stat { action } => run_track(&config, TrackKind::Static, action),
        StretchAction::Settings {
            dyn_duration,
            dyn_rest,
            stat_duration,
            stat_rest,
        } => {
            let dynamic = &mut config.stretch.dynamic;
            dynamic.duration = dyn_duration.unwrap_or(dynamic.duration);
            dynamic.rest = dyn_rest.unwrap_or(dynamic.rest);
            let stat = &mut config.stretch.stat;
            stat.duration = stat_duration.unwrap_or(stat.duration);
            stat.rest = stat_rest.unwrap_or(stat.rest);
            config.save()?;

            let store = open_store(&config)?;
            let mut ctl = StretchController::load(store, SystemClock)?;
            let applied = ctl.update_settings(config.stretch.dynamic, config.stretch.stat)?;
            if !applied {
                eprintln!("saved: both tracks are active and keep their current durations");
            }
            print_json(&json!({
                "dyn": config.stretch.dynamic,
                "stat": config.stretch.stat,
                "applied": applied,
            }))
        }
    }
}

fn run_track(config: &Config, kind: TrackKind, action: TrackAction) -> CliResult {
    if let TrackAction::Watch { updates } = action {
        return watch(config, StretchTrackSource { kind }, updates);
    }

    let store = open_store(config)?;
    let mut ctl = StretchController::load(store, SystemClock)?;

    match action {
        TrackAction::Start { items } => {
            let outcome = ctl.start(kind, configured(config, kind), items)?;
            print_outcome(outcome, ctl.snapshot(kind))?;
        }
        TrackAction::Pause => {
            let outcome = ctl.pause(kind)?;
            print_outcome(outcome, ctl.snapshot(kind))?;
        }
        TrackAction::Resume => {
            let outcome = ctl.resume(kind)?;
            print_outcome(outcome, ctl.snapshot(kind))?;
        }
        TrackAction::Reset => {
            print_json(&ctl.reset(kind, configured(config, kind))?)?;
        }
        TrackAction::Status => {
            print_json(&json!({
                "track": ctl.record().track(kind),
                "state": ctl.snapshot(kind),
            }))?;
        }
        TrackAction::Watch { .. } => {}
    }
    Ok(())
}
