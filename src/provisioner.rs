//! Staging of locally built program artifacts.

use std::fs::File;
use std::io;
use std::path::PathBuf;

use localnet_sandbox_types::Pubkey;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::DeployError;
use crate::plan::DeployTask;

/// A program artifact checked and ready to be handed to the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedProgram {
    pub label: String,
    pub program_id: Pubkey,
    pub artifact: PathBuf,
    pub size: u64,
    /// Lowercase hex SHA-256 of the artifact at staging time.
    pub sha256: String,
}

/// Verifies deploy artifacts. Performs no network I/O and never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgramProvisioner;

impl ProgramProvisioner {
    pub fn new() -> Self {
        Self
    }

    /// Stage every task, stopping at the first unusable artifact.
    pub fn stage(&self, tasks: &[DeployTask]) -> Result<Vec<StagedProgram>, DeployError> {
        let staged = tasks
            .iter()
            .map(|task| self.stage_one(task))
            .collect::<Result<Vec<_>, _>>()?;
        info!(programs = staged.len(), "staged deploy artifacts");
        Ok(staged)
    }

    fn stage_one(&self, task: &DeployTask) -> Result<StagedProgram, DeployError> {
        let unreadable = |source: io::Error| DeployError::Unreadable {
            label: task.label.clone(),
            path: task.artifact.clone(),
            source,
        };

        let mut file = File::open(&task.artifact).map_err(unreadable)?;
        let mut hasher = Sha256::new();
        let size = io::copy(&mut file, &mut hasher).map_err(unreadable)?;
        if size == 0 {
            return Err(DeployError::Empty {
                label: task.label.clone(),
                path: task.artifact.clone(),
            });
        }
        let sha256 = hex::encode(hasher.finalize());
        debug!(label = %task.label, program_id = %task.program_id, size, sha256 = %sha256, "staged program");

        Ok(StagedProgram {
            label: task.label.clone(),
            program_id: task.program_id,
            artifact: task.artifact.clone(),
            size,
            sha256,
        })
    }
}
