use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use super::readiness::{Readiness, ReadinessMatcher};
use crate::config::SupervisorConfig;
use crate::error::SupervisorError;

const CHILD_LOG_TARGET: &str = "doctree_mcp";
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Termination request received by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Terminate,
    Interrupt,
}

impl ShutdownSignal {
    pub fn name(self) -> &'static str {
        match self {
            Self::Terminate => "SIGTERM",
            Self::Interrupt => "SIGINT",
        }
    }

    #[cfg(unix)]
    fn as_raw(self) -> libc::c_int {
        match self {
            Self::Terminate => libc::SIGTERM,
            Self::Interrupt => libc::SIGINT,
        }
    }
}

/// The supervised doctree-mcp process plus its output pumps.
pub struct ChildProcess {
    child: Child,
    stdout_task: Option<JoinHandle<()>>,
    stderr_task: Option<JoinHandle<()>>,
}

/// Spawn the configured command with the docs env injected.
///
/// Stdout is logged per line and checked for readiness as it arrives,
/// including a line still missing its newline; stderr is logged only.
pub fn spawn_child(
    config: &SupervisorConfig,
    readiness: Readiness,
) -> Result<ChildProcess, SupervisorError> {
    let (program, args) = config
        .command
        .split_first()
        .ok_or(SupervisorError::EmptyCommand)?;

    let mut command = Command::new(program);
    command
        .args(args)
        .envs(config.child_env())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(false);
    if let Some(dir) = config.working_dir.as_ref() {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(|source| SupervisorError::Spawn {
        program: program.clone(),
        source,
    })?;
    tracing::info!(
        pid = child.id(),
        program = %program,
        port = config.child_port,
        "doctree-mcp spawned"
    );

    let matcher = ReadinessMatcher::from_config(config);
    let stdout_task = child.stdout.take().map(|stdout| {
        tokio::spawn(pump_output(stdout, move |text, complete| {
            if complete {
                tracing::info!(target: CHILD_LOG_TARGET, "{text}");
            }
            if let Some(source) = matcher.classify(text) {
                readiness.mark_ready(source);
            }
        }))
    });
    let stderr_task = child.stderr.take().map(|stderr| {
        tokio::spawn(pump_output(stderr, |text, complete| {
            if complete {
                tracing::warn!(target: CHILD_LOG_TARGET, "{text}");
            }
        }))
    });

    Ok(ChildProcess {
        child,
        stdout_task,
        stderr_task,
    })
}

/// Forward child output as it arrives. Complete lines are reported with
/// `complete = true`; after each chunk an unterminated tail is reported
/// with `complete = false`, accumulated until its newline or EOF.
async fn pump_output<R, F>(reader: R, mut on_output: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(&str, bool),
{
    let mut reader = BufReader::new(reader);
    let mut pending: Vec<u8> = Vec::new();
    loop {
        let chunk = match reader.fill_buf().await {
            Ok(buf) if buf.is_empty() => break,
            Ok(buf) => buf.to_vec(),
            Err(err) => {
                tracing::debug!(error = %err, "child output closed");
                break;
            }
        };
        reader.consume(chunk.len());
        pending.extend_from_slice(&chunk);

        while let Some(newline) = pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = pending.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            on_output(line.trim_end_matches(['\n', '\r']), true);
        }
        if !pending.is_empty() {
            on_output(&String::from_utf8_lossy(&pending), false);
        }
    }
    if !pending.is_empty() {
        on_output(&String::from_utf8_lossy(&pending), true);
    }
}

impl ChildProcess {
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Deliver `signal` to the child. A child that already exited is ignored.
    pub fn forward(&mut self, signal: ShutdownSignal) {
        let Some(pid) = self.child.id() else {
            return;
        };
        #[cfg(unix)]
        {
            let Ok(pid) = libc::pid_t::try_from(pid) else {
                return;
            };
            // SAFETY: kill(2) has no memory-safety preconditions.
            let rc = unsafe { libc::kill(pid, signal.as_raw()) };
            if rc != 0 {
                let err = std::io::Error::last_os_error();
                tracing::warn!(pid, signal = signal.name(), error = %err, "signal forward failed");
                return;
            }
        }
        #[cfg(not(unix))]
        if let Err(err) = self.child.start_kill() {
            tracing::warn!(pid, signal = signal.name(), error = %err, "child kill failed");
            return;
        }
        tracing::info!(pid, signal = signal.name(), "forwarded signal to doctree-mcp");
    }

    /// Wait for the child to exit, then briefly for its output to drain.
    /// Pipes held open by grandchildren are abandoned.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        let status = self.child.wait().await?;
        for task in [self.stdout_task.take(), self.stderr_task.take()]
            .into_iter()
            .flatten()
        {
            if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, task).await.is_err() {
                tracing::debug!("child output still open after exit");
            }
        }
        Ok(status)
    }
}

/// Termination handlers, registered up front so a signal that arrives
/// before anything awaits [`ShutdownSignals::recv`] is still caught.
pub struct ShutdownSignals {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    #[cfg(unix)]
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Resolve on the first SIGTERM or SIGINT.
    #[cfg(unix)]
    pub async fn recv(mut self) -> ShutdownSignal {
        tokio::select! {
            Some(()) = self.terminate.recv() => ShutdownSignal::Terminate,
            Some(()) = self.interrupt.recv() => ShutdownSignal::Interrupt,
            else => std::future::pending().await,
        }
    }

    /// Resolve on the first Ctrl-C.
    #[cfg(not(unix))]
    pub async fn recv(self) -> ShutdownSignal {
        match tokio::signal::ctrl_c().await {
            Ok(()) => ShutdownSignal::Interrupt,
            Err(err) => {
                tracing::warn!(error = %err, "ctrl-c handler unavailable");
                std::future::pending().await
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> SupervisorConfig {
        SupervisorConfig {
            command: vec!["sh".into(), "-c".into(), script.into()],
            startup_grace: Duration::from_secs(60),
            ..SupervisorConfig::default()
        }
    }

    #[tokio::test]
    async fn stdout_keyword_marks_ready() {
        let readiness = Readiness::new();
        let mut child = spawn_child(&sh("echo 'server listening'"), readiness.clone()).unwrap();
        let status = child.wait().await.unwrap();
        assert!(status.success());
        assert!(readiness.is_ready());
    }

    #[tokio::test]
    async fn stderr_never_marks_ready() {
        let readiness = Readiness::new();
        let mut child = spawn_child(&sh("echo ready 1>&2"), readiness.clone()).unwrap();
        child.wait().await.unwrap();
        assert!(!readiness.is_ready());
    }

    #[tokio::test]
    async fn child_sees_injected_env() {
        let readiness = Readiness::new();
        let config = SupervisorConfig {
            child_port: 4555,
            ..sh(r#"[ "$PORT" = 4555 ] && [ "$DOCS_SOURCE" = filesystem ] && echo DOCTREE_READY"#)
        };
        let mut child = spawn_child(&config, readiness.clone()).unwrap();
        child.wait().await.unwrap();
        assert!(readiness.is_ready());
    }

    #[tokio::test]
    async fn exit_code_is_observed() {
        let mut child = spawn_child(&sh("exit 7"), Readiness::new()).unwrap();
        assert_eq!(child.wait().await.unwrap().code(), Some(7));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let config = SupervisorConfig {
            command: vec!["/nonexistent/doctree-mcp".into()],
            ..SupervisorConfig::default()
        };
        let err = spawn_child(&config, Readiness::new()).err().unwrap();
        assert!(matches!(err, SupervisorError::Spawn { .. }));
    }

    #[tokio::test]
    async fn forwarded_terminate_stops_child() {
        let mut child = spawn_child(&sh("sleep 30"), Readiness::new()).unwrap();
        child.forward(ShutdownSignal::Terminate);
        let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
            .await
            .unwrap()
            .unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn keyword_without_newline_marks_ready() {
        let readiness = Readiness::new();
        let mut child = spawn_child(&sh("printf 'server listening'; exec sleep 30"), readiness.clone())
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !readiness.is_ready() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("unterminated keyword never marked ready");
        child.forward(ShutdownSignal::Terminate);
        child.wait().await.unwrap();
    }

    #[tokio::test]
    async fn output_reports_complete_lines_and_pending_tail() {
        let mut seen = Vec::new();
        pump_output(b"booting\r\nserver list".as_slice(), |text, complete| {
            seen.push((text.to_string(), complete));
        })
        .await;
        assert_eq!(
            seen,
            vec![
                ("booting".to_string(), true),
                ("server list".to_string(), false),
                ("server list".to_string(), true),
            ]
        );
    }

    #[tokio::test]
    async fn signal_before_recv_is_not_lost() {
        let signals = ShutdownSignals::install().unwrap();
        // SAFETY: signalling our own pid; the handler above is installed.
        let rc = unsafe { libc::kill(libc::getpid(), libc::SIGTERM) };
        assert_eq!(rc, 0);
        let received = tokio::time::timeout(Duration::from_secs(5), signals.recv())
            .await
            .unwrap();
        assert_eq!(received, ShutdownSignal::Terminate);
    }
}
