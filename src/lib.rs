//! Localnet Sandbox
//!
//! Provision a local test validator seeded with state cloned from a live
//! cluster:
//!
//! - **Configuration**: validate a declarative JSON file into an [`plan::ExecutionPlan`]
//! - **Account cloning**: fetch accounts (and program-data) through a snapshot cache
//! - **Program staging**: check locally built artifacts before launch
//! - **Validator lifecycle**: reclaim stale validators, launch, wait for readiness
//!
//! See [`run::Provisioner`] for the end-to-end flow.

#![allow(clippy::result_large_err)]
#![allow(clippy::type_complexity)]
#![allow(clippy::too_many_arguments)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod orchestrator;
pub mod plan;
pub mod provisioner;
pub mod report;
pub mod run;

pub use config::RawConfig;
pub use error::{ConfigError, DeployError, LedgerError, ProvisionError, ValidatorStartError};
pub use orchestrator::{Endpoints, ValidatorHandle, ValidatorOrchestrator};
pub use plan::{ConfigResolver, ExecutionPlan, Policy, ValidatorConfig};
pub use report::{FailureReport, ReadySummary};
pub use run::{Provisioned, Provisioner, ProvisioningRun, RunFailure, RunPhase};
