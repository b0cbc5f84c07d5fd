mod articles;
mod dashboard;
mod http_transport;

use riskboard_sync::DashboardEngine;
use riskboard_sync::RiskboardConfig;
use wiremock::MockServer;

/// Engine pointed at `server` with the given extra TOML appended.
pub(crate) fn engine_for(server: &MockServer, extra_toml: &str) -> DashboardEngine {
    let toml = format!(
        "[api]\nbase_url = \"{}\"\ntimeout_ms = 2000\n{extra_toml}",
        server.uri()
    );
    let config = RiskboardConfig::parse(&toml).expect("config");
    DashboardEngine::from_config(config).expect("engine")
}
