use clap::Subcommand;
use courtside_core::{Config, DrillTimer};
use serde_json::json;

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum DrillAction {
    /// Run a drill countdown without waiting, printing each second
    Run {
        /// Countdown seconds (configured default otherwise)
        #[arg(long)]
        duration: Option<u64>,
        /// Stop after this many seconds
        #[arg(long)]
        ticks: Option<u64>,
        /// Press "+time" this many times before starting
        #[arg(long, default_value_t = 0)]
        extend: u32,
    },
}

pub fn run(action: DrillAction) -> CliResult {
    let config = Config::load()?;
    match action {
        DrillAction::Run {
            duration,
            ticks,
            extend,
        } => {
            let mut drill = DrillTimer::new(duration.unwrap_or(config.drill.duration));
            for _ in 0..extend {
                drill.extend(config.drill.extend_by);
            }
            drill.toggle();

            let limit = ticks.unwrap_or(drill.remaining());
            for _ in 0..limit {
                let cue = drill.tick();
                println!("{}", drill.display());
                if let Some(event) = cue {
                    print_json(&event)?;
                    break;
                }
            }
            print_json(&json!({
                "duration": drill.duration(),
                "remaining": drill.remaining(),
                "running": drill.is_running(),
            }))
        }
    }
}
