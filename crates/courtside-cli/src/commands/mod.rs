pub mod circuit;
pub mod config;
pub mod drill;
pub mod stretch;

use std::ops::ControlFlow;
use std::sync::Arc;

use courtside_core::storage::data_dir;
use courtside_core::{
    Config, Event, SessionStore, SqliteStore, SystemClock, TimerSource, TimerView, ViewUpdate,
};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Open the shared session database in the data directory.
pub fn open_store(config: &Config) -> Result<Arc<SqliteStore>, Box<dyn std::error::Error>> {
    let path = data_dir()?.join("sessions.db");
    tracing::debug!(path = %path.display(), "opening session store");
    let store = SqliteStore::open(path)?.with_poll_interval(config.refresh.poll_interval());
    Ok(Arc::new(store))
}

/// Print one value as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the event a control command produced, or a note when it was ignored.
pub fn print_outcome(outcome: Option<Event>, snapshot: Event) -> CliResult {
    match outcome {
        Some(event) => print_json(&event),
        None => {
            eprintln!("ignored: not valid from the current state");
            print_json(&snapshot)
        }
    }
}

/// Follow a shared timer, printing one JSON line per update.
///
/// Stops after `limit` updates when given, otherwise when the store goes away.
pub fn watch<T: TimerSource>(config: &Config, source: T, limit: Option<usize>) -> CliResult {
    let store = open_store(config)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(follow(store, config, source, limit))
}

async fn follow<T: TimerSource>(
    store: Arc<SqliteStore>,
    config: &Config,
    source: T,
    limit: Option<usize>,
) -> CliResult {
    let id = source.session_id();
    // Subscribe inside the runtime so the store starts its poller, and
    // before reading so no commit falls between the two.
    let subscription = store.subscribe(id)?;
    let initial = store.get(id)?;
    let mut view = TimerView::new(source, SystemClock, initial.as_ref())
        .with_tick_interval(config.refresh.tick_interval());

    let mut seen = 0usize;
    let mut failure: Option<serde_json::Error> = None;
    view.run(subscription, |update: &ViewUpdate| {
        match serde_json::to_string(update) {
            Ok(line) => println!("{line}"),
            Err(e) => {
                failure = Some(e);
                return ControlFlow::Break(());
            }
        }
        seen += 1;
        match limit {
            Some(limit) if seen >= limit => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    })
    .await;

    match failure {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
