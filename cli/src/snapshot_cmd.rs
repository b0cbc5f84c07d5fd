//! `riskboard snapshot` - resolve one selection key and print the result.

use clap::Parser;
use owo_colors::OwoColorize;
use riskboard_sync::FieldKind;
use riskboard_sync::Notice;
use riskboard_sync::Resolution;
use riskboard_sync::SelectionKey;
use riskboard_sync::Snapshot;
use std::path::Path;

#[derive(Debug, Parser)]
pub struct SnapshotArgs {
    /// Selection key (for example a game or entity identifier)
    pub key: String,

    /// Output the full snapshot as JSON
    #[arg(long)]
    pub json: bool,

    /// Bypass the cache and fetch again
    #[arg(long)]
    pub refresh: bool,
}

pub async fn run_snapshot(config_path: Option<&Path>, args: SnapshotArgs) -> i32 {
    let engine = match crate::load_engine(config_path) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red());
            return 2;
        }
    };

    let key = SelectionKey::new(args.key);
    let resolution = if args.refresh {
        engine.refresh(&key).await
    } else {
        engine.resolve(&key).await
    };

    let (origin, snapshot) = match &resolution {
        Resolution::Cached(entry) => ("cached", entry.snapshot.as_ref()),
        Resolution::Fresh(entry) => ("fresh", entry.snapshot.as_ref()),
        Resolution::Blocked(snapshot) => ("blocked", snapshot.as_ref()),
        Resolution::Superseded => {
            tracing::warn!(key = %key, "snapshot superseded before it settled");
            return 1;
        }
    };

    if args.json {
        let output = serde_json::json!({
            "resolution": origin,
            "snapshot": snapshot,
        });
        println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
    } else {
        print_human_snapshot(origin, snapshot, engine.aggregator().plan().fields());
    }

    match resolution {
        Resolution::Blocked(_) => 2,
        _ => 0,
    }
}

fn print_human_snapshot(origin: &str, snapshot: &Snapshot, fields: &[FieldKind]) {
    println!("\n {} {}\n", "Snapshot".bold(), snapshot.key.cyan());
    for line in summary_lines(snapshot, fields) {
        println!("  {line}");
    }
    println!();

    if let Some(failure) = &snapshot.failure {
        println!("{} [{}] {}", "BLOCKED".red(), failure.code, failure.message);
        if let Some(secs) = failure.retry_after_secs {
            println!("       Retry after {secs}s");
        }
    } else {
        println!("{} ({origin})", "OK".green());
    }
}

/// One plain line per field followed by one per notice.
pub(crate) fn summary_lines(snapshot: &Snapshot, fields: &[FieldKind]) -> Vec<String> {
    let mut lines: Vec<String> = fields
        .iter()
        .map(|kind| {
            let marker = if snapshot.mandatory.contains(kind) {
                "*"
            } else {
                " "
            };
            let mut line = format!(
                "{marker}{:<11} {}",
                kind.to_string(),
                snapshot.field_state(*kind)
            );
            if let Some(failure) = snapshot.field_failures.get(kind) {
                line.push_str(&format!(" [{}] {}", failure.code, failure.message));
            }
            line
        })
        .collect();

    if let Some(score) = snapshot.risk.value().and_then(|risk| risk.value) {
        lines.push(format!("risk score  {score:.1}"));
    }

    lines.extend(snapshot.notices.iter().map(|notice| match notice {
        Notice::PartialData { fields } => {
            let names: Vec<String> = fields.iter().map(ToString::to_string).collect();
            format!("notice: partial data ({})", names.join(", "))
        }
        Notice::Fallback { reason } => format!("notice: showing sample data ({reason:?})"),
        Notice::NoLiveData => "notice: no live data for this key".to_string(),
    }));
    lines
}
