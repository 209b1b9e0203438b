//! Scripted stand-ins for the cluster and the process table.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use localnet_sandbox::error::ValidatorStartError;
use localnet_sandbox::orchestrator::{
    HealthProbe, LaunchRequest, ProcessLocator, ProcessTerminator, RunningValidator, TermSignal,
    ValidatorLauncher, ValidatorProcess,
};
use localnet_sandbox_types::{Commitment, Pubkey};
use localnet_state_fetcher::{AccountSource, FetchError, RemoteAccount};
use parking_lot::Mutex;

/// In-memory cluster with per-address scripted timeouts.
#[derive(Default)]
pub struct FakeCluster {
    accounts: HashMap<Pubkey, RemoteAccount>,
    timeouts: Mutex<HashMap<Pubkey, usize>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl FakeCluster {
    pub fn with_account(mut self, address: Pubkey, account: RemoteAccount) -> Self {
        self.accounts.insert(address, account);
        self
    }

    /// Fail the next `times` reads of `address` with a timeout.
    pub fn timing_out(self, address: Pubkey, times: usize) -> Self {
        self.timeouts.lock().insert(address, times);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountSource for FakeCluster {
    async fn fetch_account(
        &self,
        _endpoint: &str,
        address: &Pubkey,
        _commitment: Commitment,
    ) -> Result<Option<RemoteAccount>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(remaining) = self.timeouts.lock().get_mut(address) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(FetchError::Timeout("scripted".into()));
            }
        }
        Ok(self.accounts.get(address).cloned())
    }
}

/// Process table holding a fixed set of "running validators".
#[derive(Default)]
pub struct FakeLocator {
    pub processes: Mutex<Vec<ValidatorProcess>>,
}

impl FakeLocator {
    pub fn with_process(pid: u32) -> Self {
        Self {
            processes: Mutex::new(vec![ValidatorProcess {
                pid,
                command: "solana-test-validator --ledger stale".to_string(),
            }]),
        }
    }
}

impl ProcessLocator for FakeLocator {
    fn find_validators(&self, _ledger: &Path, _rpc_port: u16) -> Vec<ValidatorProcess> {
        self.processes.lock().clone()
    }
}

/// Processes die on the first signal unless marked stubborn.
#[derive(Default)]
pub struct FakeTerminator {
    pub alive: Mutex<HashSet<u32>>,
    pub stubborn: Mutex<HashSet<u32>>,
    pub signals: Mutex<Vec<(u32, TermSignal)>>,
}

impl FakeTerminator {
    pub fn with_alive(pid: u32) -> Self {
        let t = Self::default();
        t.alive.lock().insert(pid);
        t
    }

    pub fn signals(&self) -> Vec<(u32, TermSignal)> {
        self.signals.lock().clone()
    }
}

impl ProcessTerminator for FakeTerminator {
    fn signal(&self, pid: u32, signal: TermSignal) -> Result<(), String> {
        self.signals.lock().push((pid, signal));
        if signal == TermSignal::Forced || !self.stubborn.lock().contains(&pid) {
            self.alive.lock().remove(&pid);
        }
        Ok(())
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.alive.lock().contains(&pid)
    }
}

/// What a launch was asked to do.
#[derive(Debug, Clone)]
pub struct LaunchRecord {
    pub args: Vec<String>,
    pub detached: bool,
    pub verify_fees: bool,
}

/// Launcher whose validators only exist in memory.
#[derive(Default)]
pub struct FakeLauncher {
    pub launches: Mutex<Vec<LaunchRecord>>,
    /// Launched validators report an exit before readiness.
    pub crash_on_start: bool,
    pub shutdowns: Arc<AtomicUsize>,
    next_pid: AtomicU32,
}

impl FakeLauncher {
    pub fn crashing() -> Self {
        Self {
            crash_on_start: true,
            ..Self::default()
        }
    }

    pub fn launches(&self) -> Vec<LaunchRecord> {
        self.launches.lock().clone()
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl ValidatorLauncher for FakeLauncher {
    fn launch(
        &self,
        request: &LaunchRequest<'_>,
    ) -> Result<Box<dyn RunningValidator>, ValidatorStartError> {
        self.launches.lock().push(LaunchRecord {
            args: request.args(),
            detached: request.detached,
            verify_fees: request.verify_fees,
        });
        let pid = 90_000 + self.next_pid.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeValidator {
            pid,
            crashed: self.crash_on_start,
            stopped: AtomicBool::new(false),
            shutdowns: self.shutdowns.clone(),
        }))
    }
}

struct FakeValidator {
    pid: u32,
    crashed: bool,
    stopped: AtomicBool,
    shutdowns: Arc<AtomicUsize>,
}

#[async_trait]
impl RunningValidator for FakeValidator {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn try_exited(&mut self) -> Option<String> {
        self.crashed.then(|| "exit status: 1".to_string())
    }

    async fn shutdown(&mut self, _grace: Duration) -> std::io::Result<()> {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn wait(&mut self) -> std::io::Result<String> {
        std::future::pending::<()>().await;
        Ok(String::new())
    }
}

/// Health probe with a fixed answer.
pub struct FakeProbe {
    pub healthy: bool,
    pub polls: AtomicUsize,
}

impl FakeProbe {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            polls: AtomicUsize::new(0),
        }
    }

    pub fn never() -> Self {
        Self {
            healthy: false,
            polls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl HealthProbe for FakeProbe {
    async fn is_healthy(&self, _rpc_url: &str) -> bool {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.healthy
    }
}
