//! `riskboard doctor` - configuration and backend diagnostics.
//!
//! Exit code is 2 when any check fails, 1 on warnings only, 0 otherwise.

use clap::Parser;
use owo_colors::OwoColorize;
use riskboard_protocol::HealthState;
use riskboard_sync::CancellationToken;
use riskboard_sync::DiagnosticScope;
use riskboard_sync::FallbackPolicy;
use riskboard_sync::FetchOutcome;
use riskboard_sync::FetchRequest;
use riskboard_sync::HttpTransport;
use riskboard_sync::RiskboardConfig;
use riskboard_sync::classify;
use riskboard_sync::config::LOCALHOST_IN_PRODUCTION;
use riskboard_sync::fetch;
use std::path::Path;

const HEALTH_PATH: &str = "/api/health";

#[derive(Debug, Parser)]
pub struct DoctorArgs {
    /// Output as JSON for automation
    #[arg(long)]
    pub json: bool,

    /// Skip the backend reachability check
    #[arg(long)]
    pub offline: bool,
}

/// Doctor check result
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    pub fix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl CheckStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Warn => "warn",
            Self::Fail => "fail",
        }
    }
}

impl CheckResult {
    fn pass(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Pass,
            message: message.into(),
            fix: None,
        }
    }

    fn warn(name: &'static str, message: impl Into<String>, fix: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Warn,
            message: message.into(),
            fix: Some(fix.into()),
        }
    }

    fn fail(name: &'static str, message: impl Into<String>, fix: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Fail,
            message: message.into(),
            fix: Some(fix.into()),
        }
    }
}

pub async fn run_doctor(config_path: Option<&Path>, args: DoctorArgs) -> i32 {
    let mut results: Vec<CheckResult> = Vec::new();

    let config = match crate::load_config(config_path) {
        Ok(config) => {
            results.push(check_config(&config));
            Some(config)
        }
        Err(e) => {
            results.push(CheckResult::fail(
                "config",
                format!("{e:#}"),
                "Fix the config file or point --config / RISKBOARD_CONFIG at a valid one",
            ));
            None
        }
    };

    if let Some(config) = &config {
        if !args.offline {
            results.push(check_backend(config).await);
        }
        results.push(check_fallback(config));
    }

    if args.json {
        print_json_results(&results);
    } else {
        print_human_results(&results);
    }

    exit_code(&results)
}

fn exit_code(results: &[CheckResult]) -> i32 {
    if results.iter().any(|r| r.status == CheckStatus::Fail) {
        2
    } else if results.iter().any(|r| r.status == CheckStatus::Warn) {
        1
    } else {
        0
    }
}

fn check_config(config: &RiskboardConfig) -> CheckResult {
    if config.api.guardrail().is_some() {
        return CheckResult::warn(
            "config",
            format!(
                "[{LOCALHOST_IN_PRODUCTION}] production build points at {}",
                config.api.base_url
            ),
            "Set api.base_url or RISKBOARD_API_BASE_URL to the deployed backend",
        );
    }
    CheckResult::pass(
        "config",
        format!(
            "{} fields, {} mandatory, base URL {}",
            config.dashboard.fields.len(),
            config.dashboard.mandatory.len(),
            config.api.base_url
        ),
    )
}

async fn check_backend(config: &RiskboardConfig) -> CheckResult {
    let transport = match HttpTransport::from_config(&config.api) {
        Ok(transport) => transport,
        Err(e) => {
            return CheckResult::fail(
                "backend",
                format!("Cannot build HTTP client: {e}"),
                "Check the TLS setup of this machine",
            );
        }
    };

    let request = FetchRequest::new(HEALTH_PATH);
    let outcome = fetch(&transport, &request, &CancellationToken::new())
        .await
        .decode::<Option<HealthState>>();
    health_result(&config.api.base_url, outcome)
}

fn health_result(base_url: &str, outcome: FetchOutcome<Option<HealthState>>) -> CheckResult {
    match outcome {
        FetchOutcome::Data(None) => CheckResult::pass(
            "backend",
            format!("Reachable at {base_url} (empty health response)"),
        ),
        FetchOutcome::Data(Some(health)) if health.ok => CheckResult::pass(
            "backend",
            format!(
                "Healthy at {base_url} (mode: {})",
                health.mode.as_deref().unwrap_or("unknown")
            ),
        ),
        FetchOutcome::Data(Some(_)) => CheckResult::warn(
            "backend",
            format!("Reachable at {base_url} but reports unhealthy"),
            "Check the backend's scheduler and collectors",
        ),
        FetchOutcome::Failed(failure) => {
            let record = classify(
                &failure,
                &DiagnosticScope::area("DOCTOR", "HEALTH"),
                "health endpoint unreachable",
            );
            CheckResult::fail(
                "backend",
                format!("[{}] {} ({failure})", record.code, record.message),
                format!("Start the backend or fix api.base_url ({base_url})"),
            )
        }
        FetchOutcome::Cancelled => CheckResult::warn("backend", "Health check cancelled", "Re-run doctor"),
    }
}

fn check_fallback(config: &RiskboardConfig) -> CheckResult {
    if !config.fallback.enabled {
        return CheckResult::pass("fallback", "Disabled");
    }
    match FallbackPolicy::from_config(config) {
        Ok(_) => {
            let source = config
                .resolved_dataset_path()
                .map_or_else(|| "built-in sample".to_string(), |p| p.display().to_string());
            CheckResult::pass("fallback", format!("Enabled, dataset: {source}"))
        }
        Err(e) => CheckResult::fail(
            "fallback",
            e.to_string(),
            "Fix fallback.dataset_path or unset it to use the built-in sample",
        ),
    }
}

fn print_human_results(results: &[CheckResult]) {
    println!("\n {}\n", "Riskboard Doctor".bold());

    for result in results {
        match result.status {
            CheckStatus::Pass => print!("{}", "[PASS]".green()),
            CheckStatus::Warn => print!("{}", "[WARN]".yellow()),
            CheckStatus::Fail => print!("{}", "[FAIL]".red()),
        }
        println!(" {}: {}", result.name, result.message);

        if let Some(fix) = &result.fix {
            println!("       Fix: {fix}");
        }
    }

    println!();

    let pass_count = results.iter().filter(|r| r.status == CheckStatus::Pass).count();
    let warn_count = results.iter().filter(|r| r.status == CheckStatus::Warn).count();
    let fail_count = results.iter().filter(|r| r.status == CheckStatus::Fail).count();

    println!("Summary: {pass_count} passed, {warn_count} warnings, {fail_count} failed");
}

fn print_json_results(results: &[CheckResult]) {
    let checks: Vec<serde_json::Value> = results
        .iter()
        .map(|r| {
            serde_json::json!({
                "name": r.name,
                "status": r.status.as_str(),
                "message": r.message,
                "fix": r.fix,
            })
        })
        .collect();

    let status = match exit_code(results) {
        2 => CheckStatus::Fail,
        1 => CheckStatus::Warn,
        _ => CheckStatus::Pass,
    };

    let output = serde_json::json!({
        "status": status.as_str(),
        "checks": checks,
    });

    println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
}
