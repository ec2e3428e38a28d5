#![cfg(unix)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use docnav_core::supervisor::{ShutdownSignal, NOT_FOUND_HINT};
use docnav_core::{Supervisor, SupervisorConfig, SupervisorExit};
use docnav_protocol::{HealthReport, HealthStatus};
use reqwest::StatusCode;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

// ── Helpers ──────────────────────────────────────────────────────────

fn sh_config(script: &str) -> SupervisorConfig {
    SupervisorConfig {
        health_bind: "127.0.0.1:0".parse().unwrap(),
        command: vec!["sh".into(), "-c".into(), script.into()],
        startup_grace: Duration::from_secs(60),
        ..SupervisorConfig::default()
    }
}

struct Running {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<ShutdownSignal>>,
    task: JoinHandle<SupervisorExit>,
}

impl Running {
    async fn start(config: SupervisorConfig) -> Self {
        let supervisor = Supervisor::bind(config).await.unwrap();
        let addr = supervisor.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(supervisor.run(async move {
            rx.await.unwrap_or(ShutdownSignal::Terminate)
        }));
        Self {
            addr,
            shutdown: Some(tx),
            task,
        }
    }

    async fn signal(&mut self, signal: ShutdownSignal) -> SupervisorExit {
        self.shutdown.take().unwrap().send(signal).unwrap();
        self.finish().await
    }

    async fn finish(&mut self) -> SupervisorExit {
        tokio::time::timeout(Duration::from_secs(10), &mut self.task)
            .await
            .expect("supervisor did not exit")
            .unwrap()
    }
}

async fn health(addr: SocketAddr) -> (StatusCode, HealthReport) {
    let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

async fn wait_until_ready(addr: SocketAddr) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if health(addr).await.0 == StatusCode::OK {
            return;
        }
        assert!(tokio::time::Instant::now() < deadline, "never became ready");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

fn temp_path(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("docnav-{label}-{}", uuid::Uuid::new_v4()))
}

// ── Readiness ────────────────────────────────────────────────────────

#[tokio::test]
async fn starting_until_keyword_then_stays_ok() {
    let mut running =
        Running::start(sh_config("sleep 1; echo 'doctree-mcp listening on 3001'; exec sleep 30")).await;

    let (status, report) = health(running.addr).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(report.status, HealthStatus::Starting);
    assert_eq!(report.service, "doctree-mcp");

    wait_until_ready(running.addr).await;
    for _ in 0..5 {
        let (status, report) = health(running.addr).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report.status, HealthStatus::Ok);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let exit = running.signal(ShutdownSignal::Terminate).await;
    assert_eq!(exit, SupervisorExit::Shutdown(ShutdownSignal::Terminate));
    assert_eq!(exit.exit_code(), 0);
}

#[tokio::test]
async fn structured_marker_marks_ready() {
    let config = SupervisorConfig {
        ready_keywords: Vec::new(),
        service_name: "docs-staging".into(),
        ..sh_config("echo booting; echo DOCTREE_READY; exec sleep 30")
    };
    let mut running = Running::start(config).await;

    wait_until_ready(running.addr).await;
    assert_eq!(health(running.addr).await.1.service, "docs-staging");
    running.signal(ShutdownSignal::Interrupt).await;
}

#[tokio::test]
async fn grace_timeout_marks_ready_without_output() {
    let config = SupervisorConfig {
        startup_grace: Duration::from_millis(300),
        ..sh_config("exec sleep 30")
    };
    let mut running = Running::start(config).await;

    assert_eq!(health(running.addr).await.0, StatusCode::SERVICE_UNAVAILABLE);
    wait_until_ready(running.addr).await;
    running.signal(ShutdownSignal::Terminate).await;
}

#[tokio::test]
async fn keyword_without_trailing_newline_marks_ready() {
    let mut running = Running::start(sh_config("printf 'server listening'; exec sleep 30")).await;
    wait_until_ready(running.addr).await;
    running.signal(ShutdownSignal::Terminate).await;
}

#[tokio::test]
async fn stderr_keywords_do_not_count() {
    let mut running = Running::start(sh_config("echo ready 1>&2; exec sleep 30")).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(health(running.addr).await.0, StatusCode::SERVICE_UNAVAILABLE);
    running.signal(ShutdownSignal::Terminate).await;
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let mut running = Running::start(sh_config("exec sleep 30")).await;

    let response = reqwest::get(format!("http://{}/mcp", running.addr)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.text().await.unwrap(), NOT_FOUND_HINT);

    running.signal(ShutdownSignal::Terminate).await;
}

// ── Exit propagation ─────────────────────────────────────────────────

#[tokio::test]
async fn child_exit_code_is_propagated() {
    let supervisor = Supervisor::bind(sh_config("echo started; exit 7")).await.unwrap();
    let monitor = supervisor.monitor();
    let exit = supervisor.run(std::future::pending()).await;

    assert_eq!(exit, SupervisorExit::ChildExited { code: Some(7) });
    assert_eq!(exit.exit_code(), 7);
    let state = monitor.state();
    assert!(state.child_pid.is_some());
    assert_eq!(state.child_exit_code, Some(7));
}

#[tokio::test]
async fn clean_child_exit_still_fails_supervisor() {
    let supervisor = Supervisor::bind(sh_config("exit 0")).await.unwrap();
    let exit = supervisor.run(std::future::pending()).await;
    assert_eq!(exit, SupervisorExit::ChildExited { code: Some(0) });
    assert_eq!(exit.exit_code(), 1);
}

#[tokio::test]
async fn unspawnable_child_fails_immediately() {
    let config = SupervisorConfig {
        command: vec!["/nonexistent/doctree-mcp".into()],
        ..sh_config("")
    };
    let supervisor = Supervisor::bind(config).await.unwrap();
    let monitor = supervisor.monitor();
    let exit = supervisor.run(std::future::pending()).await;

    assert_eq!(exit, SupervisorExit::SpawnFailed);
    assert_eq!(exit.exit_code(), 1);
    assert!(monitor.state().child_pid.is_none());
}

// ── Shutdown ─────────────────────────────────────────────────────────

#[tokio::test]
async fn shutdown_forwards_signal_and_closes_health() {
    let marker = temp_path("sigterm");
    let script = format!(
        "trap 'echo term > {}; exit 0' TERM; echo ready; while true; do sleep 0.1; done",
        marker.display()
    );
    let mut running = Running::start(sh_config(&script)).await;
    wait_until_ready(running.addr).await;

    let exit = running.signal(ShutdownSignal::Terminate).await;
    assert_eq!(exit.exit_code(), 0);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !marker.exists() {
        assert!(tokio::time::Instant::now() < deadline, "child never saw SIGTERM");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(std::fs::read_to_string(&marker).unwrap().trim(), "term");
    let _ = std::fs::remove_file(&marker);

    assert!(reqwest::get(format!("http://{}/health", running.addr)).await.is_err());
}

#[tokio::test]
async fn child_receives_docs_environment() {
    let docs = temp_path("docs");
    let marker = temp_path("env");
    let config = SupervisorConfig {
        docs_source: "git".into(),
        docs_path: docs.clone(),
        child_port: 4711,
        ..sh_config(&format!(
            "echo \"$DOCS_SOURCE $DOCS_PATH $PORT\" > {}; echo ready; exec sleep 30",
            marker.display()
        ))
    };
    let mut running = Running::start(config).await;
    wait_until_ready(running.addr).await;

    let written = std::fs::read_to_string(&marker).unwrap();
    assert_eq!(written.trim(), format!("git {} 4711", docs.display()));
    let _ = std::fs::remove_file(&marker);
    running.signal(ShutdownSignal::Terminate).await;
}
