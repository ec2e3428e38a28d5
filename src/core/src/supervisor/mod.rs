mod child;
mod health;
mod readiness;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::config::SupervisorConfig;
use crate::error::SupervisorError;

pub use child::{spawn_child, ChildProcess, ShutdownSignal, ShutdownSignals};
pub use health::{build_health_router, NOT_FOUND_HINT};
pub use readiness::{spawn_grace_timer, ReadinessMatcher, Readiness, ReadySource};

const HEALTH_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Why [`Supervisor::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorExit {
    /// A termination signal arrived and was forwarded to the child.
    Shutdown(ShutdownSignal),
    /// The child could not be started.
    SpawnFailed,
    /// The child exited on its own. `None` when killed by a signal or
    /// the exit status could not be read.
    ChildExited { code: Option<i32> },
}

impl SupervisorExit {
    /// Process exit code for the supervisor itself. A child exit always
    /// yields a failure code, even when the child reported success.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Shutdown(_) => 0,
            Self::SpawnFailed => 1,
            Self::ChildExited { code: Some(code) } if code != 0 => code,
            Self::ChildExited { .. } => 1,
        }
    }
}

/// Point-in-time view of a running supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorState {
    pub ready: bool,
    pub child_pid: Option<u32>,
    pub child_exit_code: Option<i32>,
}

#[derive(Debug, Default)]
struct ChildInfo {
    pid: Option<u32>,
    exit_code: Option<i32>,
}

/// Cloneable observer of a [`Supervisor`].
#[derive(Debug, Clone, Default)]
pub struct SupervisorMonitor {
    readiness: Readiness,
    child: Arc<Mutex<ChildInfo>>,
}

impl SupervisorMonitor {
    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    pub fn state(&self) -> SupervisorState {
        let child = self.child();
        SupervisorState {
            ready: self.readiness.is_ready(),
            child_pid: child.pid,
            child_exit_code: child.exit_code,
        }
    }

    fn child(&self) -> std::sync::MutexGuard<'_, ChildInfo> {
        self.child
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Runs doctree-mcp as a child and serves `/health` until either the
/// child exits or a shutdown signal arrives.
pub struct Supervisor {
    config: SupervisorConfig,
    listener: TcpListener,
    monitor: SupervisorMonitor,
}

enum Outcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    Signalled(ShutdownSignal),
}

impl Supervisor {
    /// Bind the health listener. The child is not started until [`run`].
    ///
    /// [`run`]: Supervisor::run
    pub async fn bind(config: SupervisorConfig) -> Result<Self, SupervisorError> {
        let addr = config.health_bind;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| SupervisorError::Bind { addr, source })?;
        Ok(Self {
            config,
            listener,
            monitor: SupervisorMonitor::default(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn monitor(&self) -> SupervisorMonitor {
        self.monitor.clone()
    }

    pub async fn run<F>(self, shutdown: F) -> SupervisorExit
    where
        F: Future<Output = ShutdownSignal>,
    {
        let Self {
            config,
            listener,
            monitor,
        } = self;
        let readiness = monitor.readiness.clone();

        let mut child = match spawn_child(&config, readiness.clone()) {
            Ok(child) => child,
            Err(err) => {
                tracing::error!(error = %err, "failed to start doctree-mcp");
                return SupervisorExit::SpawnFailed;
            }
        };
        monitor.child().pid = child.pid();

        let grace_timer = spawn_grace_timer(readiness.clone(), config.startup_grace);

        let app = build_health_router(readiness, config.service_name.clone());
        let (close_tx, close_rx) = oneshot::channel::<()>();
        let addr = listener.local_addr().ok();
        let mut server = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = close_rx.await;
                })
                .await;
            if let Err(err) = result {
                tracing::error!(error = %err, "health server error");
            }
        });
        if let Some(addr) = addr {
            tracing::info!(%addr, "health endpoint listening");
        }

        let outcome = tokio::select! {
            status = child.wait() => Outcome::Exited(status),
            signal = shutdown => Outcome::Signalled(signal),
        };

        let exit = match outcome {
            Outcome::Exited(Ok(status)) => {
                let code = status.code();
                monitor.child().exit_code = code;
                tracing::warn!(?code, %status, "doctree-mcp exited");
                SupervisorExit::ChildExited { code }
            }
            Outcome::Exited(Err(err)) => {
                tracing::error!(error = %err, "failed to wait for doctree-mcp");
                SupervisorExit::ChildExited { code: None }
            }
            Outcome::Signalled(signal) => {
                tracing::info!(signal = signal.name(), "shutting down");
                child.forward(signal);
                SupervisorExit::Shutdown(signal)
            }
        };

        grace_timer.abort();
        let _ = close_tx.send(());
        if tokio::time::timeout(HEALTH_SHUTDOWN_TIMEOUT, &mut server)
            .await
            .is_err()
        {
            tracing::debug!("health server did not close in time; aborting");
            server.abort();
        }
        exit
    }
}
