use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Subcommand;
use megawork_core::render::status_line;
use megawork_core::{Config, CycleTimer, Database, Event, Phase, PhaseWatcher};
use tracing::{debug, info};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Print the cycle at an instant as JSON
    Status {
        /// Instant to read (RFC 3339), defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Print the timer every interval until the session is done
    Watch {
        /// Sampling interval, e.g. "1s" or "500ms" (defaults to ticker.interval_ms)
        #[arg(long, value_parser = humantime::parse_duration)]
        interval: Option<Duration>,
        /// Stop after this many readings
        #[arg(long)]
        count: Option<usize>,
        /// Print JSON snapshots instead of status lines
        #[arg(long)]
        json: bool,
    },
}

/// The current session's timer, or a timer built from the config that starts
/// at `now` when no session is in progress.
fn load_timer(
    db: &Database,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<CycleTimer, Box<dyn std::error::Error>> {
    match db.current_session()? {
        Some(record) => {
            debug!(session_id = record.id, "reading session timer");
            Ok(record.timer()?)
        }
        None => Ok(config.timer.cycle_timer(now, None)?),
    }
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;

    match action {
        TimerAction::Status { at } => {
            let now = at.unwrap_or_else(Utc::now);
            let timer = load_timer(&db, &config, now)?;
            let snapshot = Event::snapshot(&timer.cycle_at(now), timer.num_cycles(), now);
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        TimerAction::Watch {
            interval,
            count,
            json,
        } => {
            let timer = load_timer(&db, &config, Utc::now())?;
            let interval = interval.unwrap_or_else(|| config.ticker.interval());
            watch(timer, interval, count, json)?;
        }
    }
    Ok(())
}

fn watch(
    timer: CycleTimer,
    interval: Duration,
    count: Option<usize>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let mut ticker = timer.ticker(interval);
        let mut watcher = PhaseWatcher::new();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        let mut readings = 0;
        loop {
            let cycle = tokio::select! {
                sample = ticker.recv() => match sample {
                    Some(cycle) => cycle,
                    None => break,
                },
                _ = &mut ctrl_c => break,
            };

            if let Some(change) = watcher.observe(&cycle) {
                info!(%change, cycle = cycle.number, "phase changed");
            }
            if json {
                let snapshot = Event::snapshot(&cycle, timer.num_cycles(), Utc::now());
                println!("{}", serde_json::to_string(&snapshot)?);
            } else {
                println!("{}", status_line(&cycle, timer.num_cycles()));
            }

            readings += 1;
            if cycle.phase == Phase::Done || count.is_some_and(|n| readings >= n) {
                break;
            }
        }

        ticker.stop().await;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
