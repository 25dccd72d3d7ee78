use clap::Subcommand;
use courtside_core::{
    CircuitController, CircuitSelection, CircuitSource, Config, LocalCircuitTimer, SystemClock,
};
use serde_json::json;

use super::{open_store, print_json, print_outcome, watch, CliResult};

#[derive(Subcommand)]
pub enum CircuitAction {
    /// Start a session (configured defaults unless overridden)
    Start {
        /// Work seconds per station
        #[arg(long)]
        work: Option<u64>,
        /// Rest seconds between stations
        #[arg(long)]
        rest: Option<u64>,
        /// Number of rounds
        #[arg(long)]
        rounds: Option<u32>,
        /// Station id, in order (repeatable)
        #[arg(long = "station")]
        stations: Vec<String>,
    },
    /// Pause the running session
    Pause,
    /// Resume a paused session
    Resume,
    /// Reset to idle, keeping the last selection
    Reset,
    /// Print the shared record and its derived state as JSON
    Status,
    /// Follow the session, one JSON line per change or tick
    Watch {
        /// Stop after this many updates
        #[arg(long)]
        updates: Option<usize>,
    },
    /// Run the selection on a local timer without the shared store
    Simulate {
        /// Stop after this many seconds
        #[arg(long)]
        ticks: Option<u64>,
    },
}

fn selection(
    config: &Config,
    work: Option<u64>,
    rest: Option<u64>,
    rounds: Option<u32>,
    stations: Vec<String>,
) -> CircuitSelection {
    let base = config.circuit_selection();
    CircuitSelection {
        work: work.unwrap_or(base.work),
        rest: rest.unwrap_or(base.rest),
        rounds: rounds.unwrap_or(base.rounds),
        stations: if stations.is_empty() {
            base.stations
        } else {
            stations
        },
    }
}

pub fn run(action: CircuitAction) -> CliResult {
    let config = Config::load()?;

    if let CircuitAction::Watch { updates } = action {
        return watch(&config, CircuitSource, updates);
    }
    if let CircuitAction::Simulate { ticks } = action {
        return simulate(&config, ticks);
    }

    let store = open_store(&config)?;
    let mut ctl = CircuitController::load(store, SystemClock)?;

    match action {
        CircuitAction::Start {
            work,
            rest,
            rounds,
            stations,
        } => {
            let selection = selection(&config, work, rest, rounds, stations);
            let outcome = ctl.start(&selection)?;
            print_outcome(outcome, ctl.snapshot())?;
        }
        CircuitAction::Pause => {
            let outcome = ctl.pause()?;
            print_outcome(outcome, ctl.snapshot())?;
        }
        CircuitAction::Resume => {
            let outcome = ctl.resume()?;
            print_outcome(outcome, ctl.snapshot())?;
        }
        CircuitAction::Reset => {
            print_json(&ctl.reset()?)?;
        }
        CircuitAction::Status => {
            let derived = ctl.derived();
            let record = ctl.record();
            print_json(&json!({
                "record": record,
                "state": ctl.snapshot(),
                "station": record.station_at(&derived),
                "next_station": record
                    .stations
                    .get(derived.next_station_index(record.stations.len())),
            }))?;
        }
        CircuitAction::Watch { .. } | CircuitAction::Simulate { .. } => {}
    }
    Ok(())
}

/// Tick a local timer as fast as possible, printing each cue as a JSON line.
fn simulate(config: &Config, ticks: Option<u64>) -> CliResult {
    let selection = config.circuit_selection();
    selection.validate()?;
    let params = courtside_core::TimerParams::new(
        selection.work,
        selection.rest,
        selection.rounds,
        selection.stations.len(),
    );
    let mut timer = LocalCircuitTimer::new(params);
    if let Some(event) = timer.start() {
        println!("{}", serde_json::to_string(&event)?);
    }

    let limit = ticks.unwrap_or(params.total_duration());
    for _ in 0..limit {
        if let Some(event) = timer.tick() {
            println!("{}", serde_json::to_string(&event)?);
        }
    }
    print_json(&timer.state())
}
