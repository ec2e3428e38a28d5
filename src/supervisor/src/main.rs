use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use docnav_core::supervisor::ShutdownSignals;
use docnav_core::{Supervisor, SupervisorConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_filter())
        .init();

    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid supervisor configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(
        health = %config.health_bind,
        child_port = config.child_port,
        docs_source = %config.docs_source,
        docs_path = %config.docs_path.display(),
        "starting supervisor"
    );

    let signals = match ShutdownSignals::install() {
        Ok(signals) => signals,
        Err(err) => {
            tracing::error!(error = %err, "failed to install signal handlers");
            std::process::exit(1);
        }
    };

    let supervisor = match Supervisor::bind(config).await {
        Ok(supervisor) => supervisor,
        Err(err) => {
            tracing::error!(error = %err, "health listener unavailable");
            std::process::exit(1);
        }
    };

    let exit = supervisor.run(signals.recv()).await;
    tracing::info!(?exit, code = exit.exit_code(), "supervisor exiting");
    std::process::exit(exit.exit_code());
}

fn load_config() -> Result<SupervisorConfig, docnav_core::SupervisorError> {
    let defaults = SupervisorConfig::default();

    let host = parse_ip("HEALTH_HOST", defaults.health_bind.ip());
    let health_port = parse_u16("HEALTH_PORT", defaults.health_bind.port());
    let child_port = parse_u16("PORT", defaults.child_port);
    let docs_source = parse_string("DOCS_SOURCE", &defaults.docs_source);
    let docs_path = env::var("DOCS_PATH")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| default_docs_path(&defaults.docs_path));
    let command = match env::var("DOCTREE_COMMAND") {
        Ok(raw) => SupervisorConfig::parse_command(&raw)?,
        Err(_) => defaults.command,
    };
    let startup_grace = parse_duration("DOCTREE_READY_TIMEOUT_SECS", defaults.startup_grace);
    let ready_marker = parse_string("DOCTREE_READY_MARKER", &defaults.ready_marker);
    let ready_keywords = match env::var("DOCTREE_READY_KEYWORDS") {
        Ok(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect(),
        Err(_) => defaults.ready_keywords,
    };
    let service_name = parse_string("DOCTREE_SERVICE_NAME", &defaults.service_name);

    Ok(SupervisorConfig {
        health_bind: SocketAddr::new(host, health_port),
        child_port,
        docs_source,
        docs_path,
        command,
        working_dir: None,
        ready_marker,
        ready_keywords,
        startup_grace,
        service_name,
    })
}

fn default_docs_path(relative: &Path) -> PathBuf {
    match env::current_dir() {
        Ok(cwd) => cwd.join(relative),
        Err(_) => relative.to_path_buf(),
    }
}

fn parse_ip(key: &str, default: IpAddr) -> IpAddr {
    match env::var(key) {
        Ok(v) => v.parse().unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_u16(key: &str, default: u16) -> u16 {
    match env::var(key) {
        Ok(v) => v.parse::<u16>().unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_string(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => default.to_string(),
    }
}

fn parse_duration(key: &str, default: Duration) -> Duration {
    match env::var(key) {
        Ok(v) => v.parse::<u64>().map(Duration::from_secs).unwrap_or(default),
        Err(_) => default,
    }
}

fn tracing_filter() -> tracing_subscriber::EnvFilter {
    let explicit = env::var("DOCNAV_LOG").or_else(|_| env::var("RUST_LOG")).ok();
    if let Some(filter) = explicit {
        return tracing_subscriber::EnvFilter::new(filter);
    }
    if matches!(
        env::var("DOCNAV_DEBUG").as_deref(),
        Ok("1" | "true" | "TRUE" | "yes" | "YES")
    ) {
        return tracing_subscriber::EnvFilter::new("debug");
    }
    tracing_subscriber::EnvFilter::new("info")
}
