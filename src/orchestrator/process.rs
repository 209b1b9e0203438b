//! Discovering and terminating validator processes.

use std::net::TcpListener;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tracing::{debug, info, warn};

use crate::error::ValidatorStartError;

const LIVENESS_POLL: Duration = Duration::from_millis(100);

/// A running process that looks like a validator for our ledger or port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatorProcess {
    pub pid: u32,
    pub command: String,
}

/// Finds validator processes bound to a ledger directory or RPC port.
pub trait ProcessLocator: Send + Sync {
    fn find_validators(&self, ledger: &Path, rpc_port: u16) -> Vec<ValidatorProcess>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermSignal {
    /// SIGTERM
    Graceful,
    /// SIGKILL
    Forced,
}

/// Sends termination signals and checks liveness.
pub trait ProcessTerminator: Send + Sync {
    fn signal(&self, pid: u32, signal: TermSignal) -> Result<(), String>;
    fn is_alive(&self, pid: u32) -> bool;
}

/// [`ProcessLocator`] over the OS process table.
#[derive(Debug, Default)]
pub struct SysinfoProcessLocator;

impl ProcessLocator for SysinfoProcessLocator {
    fn find_validators(&self, ledger: &Path, rpc_port: u16) -> Vec<ValidatorProcess> {
        let mut sys = System::new();
        sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::new().with_cmd(UpdateKind::Always),
        );
        let own_pid = std::process::id();

        let mut found: Vec<ValidatorProcess> = sys
            .processes()
            .iter()
            .filter(|(pid, _)| pid.as_u32() != own_pid)
            .filter_map(|(pid, process)| {
                let args: Vec<String> = process
                    .cmd()
                    .iter()
                    .map(|a| a.to_string_lossy().into_owned())
                    .collect();
                command_targets(&args, ledger, rpc_port).then(|| ValidatorProcess {
                    pid: pid.as_u32(),
                    command: args.join(" "),
                })
            })
            .collect();
        found.sort_by_key(|p| p.pid);
        found
    }
}

/// Whether a command line starts a validator on `ledger` or `rpc_port`.
pub fn command_targets(args: &[String], ledger: &Path, rpc_port: u16) -> bool {
    let port = rpc_port.to_string();

    let ledger_match = flag_values(args, "--ledger")
        .into_iter()
        .chain(flag_values(args, "-l"))
        .any(|v| same_path(Path::new(v), ledger));
    let port_match = flag_values(args, "--rpc-port").into_iter().any(|v| v == port);
    ledger_match || port_match
}

/// Values given to `flag`, as `flag value` or `flag=value`.
fn flag_values<'a>(args: &'a [String], flag: &str) -> Vec<&'a str> {
    let prefix = format!("{}=", flag);
    let mut values: Vec<&str> = args
        .windows(2)
        .filter(|w| w[0] == flag)
        .map(|w| w[1].as_str())
        .collect();
    values.extend(args.iter().filter_map(|a| a.strip_prefix(prefix.as_str())));
    values
}

fn same_path(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// [`ProcessTerminator`] sending POSIX signals.
#[derive(Debug, Default)]
pub struct SignalTerminator;

#[cfg(unix)]
impl ProcessTerminator for SignalTerminator {
    fn signal(&self, pid: u32, signal: TermSignal) -> Result<(), String> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let sig = match signal {
            TermSignal::Graceful => Signal::SIGTERM,
            TermSignal::Forced => Signal::SIGKILL,
        };
        kill(Pid::from_raw(pid as i32), sig).map_err(|e| e.to_string())
    }

    fn is_alive(&self, pid: u32) -> bool {
        pid_is_alive(pid)
    }
}

#[cfg(not(unix))]
impl ProcessTerminator for SignalTerminator {
    fn signal(&self, pid: u32, _signal: TermSignal) -> Result<(), String> {
        let mut sys = System::new();
        let target = sysinfo::Pid::from_u32(pid);
        sys.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
        match sys.process(target) {
            Some(p) if p.kill() => Ok(()),
            Some(_) => Err(format!("failed to kill pid {}", pid)),
            None => Ok(()),
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        pid_is_alive(pid)
    }
}

/// Liveness check used by the terminator and the ledger lock.
#[cfg(unix)]
pub fn pid_is_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }
    // EPERM means the process exists but belongs to someone else.
    matches!(kill(Pid::from_raw(pid as i32), None), Ok(()) | Err(Errno::EPERM))
}

#[cfg(not(unix))]
pub fn pid_is_alive(pid: u32) -> bool {
    let mut sys = System::new();
    let target = sysinfo::Pid::from_u32(pid);
    sys.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
    sys.process(target).is_some()
}

/// Stop a process: graceful signal, wait up to `grace`, then force.
pub async fn terminate(
    terminator: &dyn ProcessTerminator,
    pid: u32,
    grace: Duration,
) -> Result<(), ValidatorStartError> {
    info!(pid, "stopping validator");
    if let Err(e) = terminator.signal(pid, TermSignal::Graceful) {
        if !terminator.is_alive(pid) {
            return Ok(());
        }
        debug!(pid, error = %e, "graceful signal failed");
    }
    if wait_for_exit(terminator, pid, grace).await {
        return Ok(());
    }

    warn!(pid, grace_secs = grace.as_secs(), "validator ignored SIGTERM, killing");
    terminator
        .signal(pid, TermSignal::Forced)
        .map_err(|message| ValidatorStartError::Terminate { pid, message })?;
    if wait_for_exit(terminator, pid, grace).await {
        Ok(())
    } else {
        Err(ValidatorStartError::Terminate {
            pid,
            message: "still alive after SIGKILL".to_string(),
        })
    }
}

async fn wait_for_exit(terminator: &dyn ProcessTerminator, pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if !terminator.is_alive(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(LIVENESS_POLL).await;
    }
}

/// Whether nothing is listening on the local RPC port.
pub fn port_is_free(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}

/// Wait until the RPC port can be bound, or fail with `PortConflict`.
pub async fn wait_for_port(port: u16, timeout: Duration) -> Result<(), ValidatorStartError> {
    let deadline = Instant::now() + timeout;
    loop {
        if port_is_free(port) {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(ValidatorStartError::PortConflict { port });
        }
        tokio::time::sleep(LIVENESS_POLL).await;
    }
}
