//! Finds the admin API key of a locally running Syft Space container.
//!
//! The container whose published host port matches the API URL's port is
//! inspected for a `SYFT_ADMIN_API_KEY` entry in its environment.

use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

const KEY_VAR: &str = "SYFT_ADMIN_API_KEY";
const FALLBACK_PORT: u16 = 8080;
const DOCKER_TIMEOUT: Duration = Duration::from_secs(5);
const PORTS_FORMAT: &str =
    "{{range $p, $b := .NetworkSettings.Ports}}{{range $b}}{{.HostPort}} {{end}}{{end}}";
const ENV_FORMAT: &str = "{{range .Config.Env}}{{println .}}{{end}}";

/// Returns the discovered key, or an empty string when docker is unavailable,
/// slow to answer, or no container matches.
pub async fn resolve_api_key(api_url: &str) -> String {
    let port = target_port(api_url).to_string();
    let Some(names) = docker(&["ps", "--format", "{{.Names}}"]).await else {
        return String::new();
    };

    for name in names.lines().map(str::trim).filter(|n| !n.is_empty()) {
        let Some(ports) = docker(&["inspect", name, "--format", PORTS_FORMAT]).await else {
            continue;
        };
        if !ports.split_whitespace().any(|p| p == port) {
            continue;
        }
        debug!(container = name, port = %port, "Container publishes the API port");
        let Some(env) = docker(&["inspect", name, "--format", ENV_FORMAT]).await else {
            continue;
        };
        if let Some(key) = key_from_env_listing(&env) {
            info!(container = name, "Discovered admin API key from container");
            return key;
        }
    }
    String::new()
}

/// Port of `api_url`, 8080 when absent or unparsable. An explicitly written
/// scheme default such as `:80` is kept.
pub fn target_port(api_url: &str) -> u16 {
    let Ok(url) = reqwest::Url::parse(api_url) else {
        return FALLBACK_PORT;
    };
    if let Some(port) = url.port() {
        return port;
    }
    // `Url` drops a port equal to the scheme default, so look at the raw authority.
    let authority = api_url
        .split_once("://")
        .and_then(|(_, rest)| rest.split(['/', '?', '#']).next())
        .unwrap_or_default();
    url.port_or_known_default()
        .filter(|default| authority.ends_with(&format!(":{default}")))
        .unwrap_or(FALLBACK_PORT)
}

fn key_from_env_listing(listing: &str) -> Option<String> {
    listing
        .lines()
        .find_map(|line| line.strip_prefix(KEY_VAR)?.strip_prefix('='))
        .map(str::to_string)
}

async fn docker(args: &[&str]) -> Option<String> {
    run_bounded("docker", args, DOCKER_TIMEOUT).await
}

/// Runs `program` and returns its stdout, or `None` on failure or once `limit` elapses.
async fn run_bounded(program: &str, args: &[&str], limit: Duration) -> Option<String> {
    let output = Command::new(program).args(args).kill_on_drop(true).output();
    match timeout(limit, output).await {
        Ok(Ok(output)) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(Ok(output)) => {
            debug!(program, ?args, status = ?output.status, "Command exited with non-zero code");
            None
        }
        Ok(Err(e)) => {
            warn!(program, error = %e, "Could not run command to discover the API key");
            None
        }
        Err(_) => {
            warn!(program, ?args, ?limit, "Command timed out while discovering the API key");
            None
        }
    }
}
