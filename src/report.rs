//! Human and machine readable run outcomes.

use localnet_state_fetcher::FetchStats;
use serde::Serialize;

use crate::error::ProvisionError;
use crate::orchestrator::Endpoints;
use crate::run::{PhaseTransition, Provisioned, RunFailure, RunPhase};

/// Exit code for a run that ended in `Failed`.
pub const EXIT_FAILED: i32 = 1;
/// Exit code for a run stopped by the user.
pub const EXIT_CANCELLED: i32 = 130;

#[derive(Debug, Clone, Serialize)]
pub struct TaskFailureReport {
    pub label: String,
    pub address: String,
    pub kind: &'static str,
    pub message: String,
}

/// Structured description of a failed run.
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    /// Phase that was active when the run failed.
    pub phase: RunPhase,
    pub kind: &'static str,
    pub message: String,
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<TaskFailureReport>,
    pub history: Vec<PhaseTransition>,
}

impl FailureReport {
    pub fn from_failure(failure: &RunFailure) -> Self {
        let failures = match &failure.error {
            ProvisionError::Fetch { failures } => failures
                .iter()
                .map(|f| TaskFailureReport {
                    label: f.label.clone(),
                    address: f.address.to_string(),
                    kind: f.error.kind(),
                    message: f.error.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        };
        Self {
            phase: failure.phase,
            kind: failure.error.kind(),
            message: failure.error.to_string(),
            labels: failure.error.labels(),
            failures,
            history: failure.history.clone(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.kind == "cancelled" {
            EXIT_CANCELLED
        } else {
            EXIT_FAILED
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn render_text(&self) -> String {
        let mut out = format!(
            "provisioning failed during {} ({}): {}\n",
            self.phase, self.kind, self.message
        );
        for f in &self.failures {
            out.push_str(&format!(
                "  - {} [{}] {}: {}\n",
                f.label, f.address, f.kind, f.message
            ));
        }
        if self.failures.is_empty() && !self.labels.is_empty() {
            out.push_str(&format!("  affected: {}\n", self.labels.join(", ")));
        }
        out
    }
}

/// Summary printed once a run reaches `Ready`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadySummary {
    pub endpoints: Endpoints,
    pub pid: u32,
    pub detached: bool,
    pub ledger_dir: String,
    pub accounts: usize,
    pub programs: usize,
    pub fetch: FetchStats,
}

impl ReadySummary {
    pub fn from_provisioned(p: &Provisioned) -> Self {
        Self {
            endpoints: p.endpoints.clone(),
            pid: p.handle.pid(),
            detached: p.handle.is_detached(),
            ledger_dir: p.plan.validator.ledger_dir.display().to_string(),
            accounts: p.accounts.len(),
            programs: p.staged.len(),
            fetch: p.fetch_report.stats,
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = format!(
            "validator ready at {} (pid {}{})\n",
            self.endpoints.rpc_url,
            self.pid,
            if self.detached { ", detached" } else { "" }
        );
        if let Some(ws) = &self.endpoints.websocket_url {
            out.push_str(&format!("  websocket: {}\n", ws));
        }
        out.push_str(&format!("  ledger:    {}\n", self.ledger_dir));
        out.push_str(&format!(
            "  accounts:  {} ({} cached, {} fetched, {} overridden)\n",
            self.accounts, self.fetch.from_cache, self.fetch.from_network, self.fetch.from_override
        ));
        out.push_str(&format!("  programs:  {}\n", self.programs));
        out
    }
}
