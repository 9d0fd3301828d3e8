//! # Executor Module
//!
//! Carries out [`ActionCommand`]s produced by the dispatch engine.
//!
//! - [`VirtualDeviceExecutor`]: injects keyboard and mouse input through a
//!   Linux uinput virtual device
//! - [`LogExecutor`]: logs every command without touching the system

pub mod keys;
pub mod virtual_device;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::mapping::action::ActionCommand;

pub use virtual_device::VirtualDeviceExecutor;

/// Something that carries out action commands.
#[cfg_attr(test, mockall::automock)]
pub trait ActionExecutor {
    /// Carries out one command.
    ///
    /// Unknown action names are warned about and ignored, not errors.
    ///
    /// # Errors
    ///
    /// Returns `Executor` if the output device rejects the input.
    fn execute(&mut self, command: &ActionCommand) -> Result<()>;
}

/// Which executor the `run` command uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorBackend {
    /// uinput virtual keyboard and mouse.
    #[default]
    Uinput,
    /// Log commands only.
    Log,
}

/// Dry-run executor that logs every command.
#[derive(Debug, Default)]
pub struct LogExecutor {
    executed: usize,
}

impl LogExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commands seen so far.
    pub fn executed(&self) -> usize {
        self.executed
    }
}

impl ActionExecutor for LogExecutor {
    fn execute(&mut self, command: &ActionCommand) -> Result<()> {
        self.executed += 1;
        info!("Action: {}", command);
        Ok(())
    }
}
