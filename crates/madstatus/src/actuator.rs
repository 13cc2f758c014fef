//! Reboot actuators.
//!
//! The real actuator launches an external reboot command with the device
//! origin as its only argument and returns immediately.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::info;

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("Failed to spawn reboot command '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Triggers a reboot of one device
pub trait RebootActuator: Send + Sync {
    fn reboot(&self, origin: &str) -> Result<(), ActuatorError>;
}

/// Spawns `program <origin>` detached from our stdio
#[derive(Debug, Clone)]
pub struct CommandActuator {
    program: PathBuf,
}

impl CommandActuator {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl RebootActuator for CommandActuator {
    fn reboot(&self, origin: &str) -> Result<(), ActuatorError> {
        // The child is not awaited; tokio reaps it once it exits
        let child = Command::new(&self.program)
            .arg(origin)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ActuatorError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        info!(origin, pid = child.id(), program = %self.program.display(), "Reboot command started");
        Ok(())
    }
}

/// Logs the reboot instead of performing it
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunActuator;

impl RebootActuator for DryRunActuator {
    fn reboot(&self, origin: &str) -> Result<(), ActuatorError> {
        info!(origin, "Dry run: reboot command not started");
        Ok(())
    }
}
