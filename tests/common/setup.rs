//! Wiring for end-to-end runs against fakes.

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use localnet_sandbox::{ConfigResolver, Provisioner, RawConfig, ValidatorOrchestrator};
use localnet_sandbox_types::Pubkey;
use localnet_state_fetcher::RemoteAccount;
use tempfile::TempDir;

use super::fakes::{FakeCluster, FakeLauncher, FakeLocator, FakeProbe, FakeTerminator};

pub const TOKEN_PROGRAM: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

pub fn key(s: &str) -> Pubkey {
    s.parse().unwrap()
}

/// An 82-byte SPL mint owned by the token program.
pub fn mint_account() -> RemoteAccount {
    RemoteAccount {
        lamports: 1_461_600,
        owner: key(TOKEN_PROGRAM),
        data: vec![1; 82],
        executable: false,
        rent_epoch: 0,
    }
}

/// A port nothing is listening on right now.
pub fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Write `localnet.json` into `dir` and parse it back.
pub fn write_config(dir: &Path, json: &serde_json::Value) -> (PathBuf, RawConfig) {
    let path = dir.join("localnet.json");
    std::fs::write(&path, serde_json::to_vec_pretty(json).unwrap()).unwrap();
    let raw = RawConfig::load(&path).unwrap();
    (path, raw)
}

/// A provisioner plus handles on every fake it was built from.
pub struct Harness {
    pub dir: TempDir,
    pub port: u16,
    pub cluster: Arc<FakeCluster>,
    pub locator: Arc<FakeLocator>,
    pub terminator: Arc<FakeTerminator>,
    pub launcher: Arc<FakeLauncher>,
    pub probe: Arc<FakeProbe>,
}

impl Harness {
    pub fn new(cluster: FakeCluster) -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            port: free_port(),
            cluster: Arc::new(cluster),
            locator: Arc::new(FakeLocator::default()),
            terminator: Arc::new(FakeTerminator::default()),
            launcher: Arc::new(FakeLauncher::default()),
            probe: Arc::new(FakeProbe::healthy()),
        }
    }

    pub fn with_locator(mut self, locator: FakeLocator) -> Self {
        self.locator = Arc::new(locator);
        self
    }

    pub fn with_terminator(mut self, terminator: FakeTerminator) -> Self {
        self.terminator = Arc::new(terminator);
        self
    }

    pub fn with_launcher(mut self, launcher: FakeLauncher) -> Self {
        self.launcher = Arc::new(launcher);
        self
    }

    pub fn with_probe(mut self, probe: FakeProbe) -> Self {
        self.probe = Arc::new(probe);
        self
    }

    pub fn ledger_dir(&self) -> PathBuf {
        self.dir.path().join("ledger")
    }

    /// Base config: one USDC mint account, fast retries, local ledger.
    pub fn base_config(&self) -> serde_json::Value {
        serde_json::json!({
            "clusterRpcUrl": "https://api.devnet.solana.com",
            "localRpcUrl": format!("http://127.0.0.1:{}", self.port),
            "ledgerDir": "ledger",
            "detached": false,
            "accounts": [
                { "label": "usdc", "accountId": USDC_MINT }
            ],
            "retry": { "retries": 2, "initialBackoffMs": 1, "maxBackoffMs": 5 },
            "readinessTimeoutSecs": 1,
            "readinessPollMs": 10,
            "shutdownGraceSecs": 1
        })
    }

    pub fn config(&self, json: &serde_json::Value) -> RawConfig {
        write_config(self.dir.path(), json).1
    }

    pub fn provisioner(&self) -> Provisioner {
        let orchestrator = ValidatorOrchestrator::new(
            self.locator.clone(),
            self.terminator.clone(),
            self.launcher.clone(),
            self.probe.clone(),
        );
        Provisioner::new(
            ConfigResolver::default().with_base_dir(self.dir.path()),
            orchestrator,
        )
        .with_source(self.cluster.clone())
    }
}
