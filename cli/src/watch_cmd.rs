//! `riskboard watch` - resolve once, then follow the background poller.

use clap::Parser;
use owo_colors::OwoColorize;
use riskboard_sync::Resolution;
use riskboard_sync::SelectionKey;
use riskboard_sync::Snapshot;
use riskboard_sync::VolatileUpdate;
use std::path::Path;

#[derive(Debug, Parser)]
pub struct WatchArgs {
    /// Selection key
    pub key: String,

    /// Stop after this many updates (0 = until interrupted)
    #[arg(long, default_value_t = 0)]
    pub ticks: u32,

    /// Print each merged snapshot as one JSON line
    #[arg(long)]
    pub json: bool,
}

pub async fn run_watch(config_path: Option<&Path>, args: WatchArgs) -> i32 {
    let engine = match crate::load_engine(config_path) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red());
            return 2;
        }
    };

    let key = SelectionKey::new(args.key);
    let mut current = match engine.resolve(&key).await {
        Resolution::Cached(entry) | Resolution::Fresh(entry) => entry.snapshot.as_ref().clone(),
        Resolution::Blocked(snapshot) => {
            if let Some(failure) = &snapshot.failure {
                eprintln!("{} [{}] {}", "BLOCKED".red(), failure.code, failure.message);
            }
            *snapshot
        }
        Resolution::Superseded => return 1,
    };
    emit(&current, None, args.json);

    let mut poller = engine.spawn_poller(key);
    let mut seen = 0u32;
    loop {
        tokio::select! {
            update = poller.recv() => {
                let Some(update) = update else { break };
                current = apply_update(&current, &update);
                emit(&current, Some(&update), args.json);
                seen += 1;
                if args.ticks != 0 && seen >= args.ticks {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }
    poller.stop();

    if current.failure.is_some() { 2 } else { 0 }
}

/// Merge a poll result; a successful poll for this key lifts the blocked state.
pub(crate) fn apply_update(current: &Snapshot, update: &VolatileUpdate) -> Snapshot {
    let mut merged = current.merge_volatile(update);
    if update.key == current.key && !update.is_empty() {
        merged.clear_failure();
    }
    merged
}

fn emit(snapshot: &Snapshot, update: Option<&VolatileUpdate>, json: bool) {
    if json {
        println!("{}", serde_json::to_string(snapshot).unwrap_or_default());
        return;
    }
    println!("{}", update_line(snapshot, update));
}

/// Compact single-line view of the volatile fields.
pub(crate) fn update_line(snapshot: &Snapshot, update: Option<&VolatileUpdate>) -> String {
    let score = snapshot
        .risk
        .value()
        .and_then(|risk| risk.value)
        .map_or_else(|| "-".to_string(), |v| format!("{v:.1}"));
    let health = match snapshot.health.value() {
        Some(health) if health.ok => "ok",
        Some(_) => "degraded",
        None => "-",
    };
    let bursts = snapshot
        .bursts
        .value()
        .map_or(0, |bursts| bursts.items.len());
    let origin = match update {
        Some(update) => {
            let names: Vec<String> = update.fields().iter().map(ToString::to_string).collect();
            format!("poll [{}]", names.join(","))
        }
        None => "initial".to_string(),
    };

    format!(
        "{} {} risk={score} health={health} bursts={bursts} ({origin})",
        snapshot.refreshed_at.format("%H:%M:%S"),
        snapshot.key
    )
}
