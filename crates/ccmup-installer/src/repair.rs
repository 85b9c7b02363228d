use std::path::PathBuf;

use crate::fs_utils::path_occupied;
use crate::store::entrypoint_problem;
use crate::InstallLayout;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Runnability {
    Runnable { entrypoint: PathBuf },
    NotRunnable { reason: String },
}

impl Runnability {
    pub fn is_runnable(&self) -> bool {
        matches!(self, Self::Runnable { .. })
    }
}

/// Checks the entrypoint as reached through `current`.
pub fn check_runnable(layout: &InstallLayout) -> Runnability {
    if !path_occupied(&layout.current_path()) {
        return Runnability::NotRunnable {
            reason: format!("{} does not exist", layout.current_path().display()),
        };
    }
    let entrypoint = layout.current_entrypoint();
    match entrypoint_problem(&entrypoint) {
        Some(reason) => Runnability::NotRunnable { reason },
        None => Runnability::Runnable { entrypoint },
    }
}

/// Bounded number of destructive resets one invocation may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairBudget {
    remaining: u8,
    used: u8,
}

impl RepairBudget {
    pub fn single() -> Self {
        Self {
            remaining: 1,
            used: 0,
        }
    }

    pub fn try_spend(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        self.used += 1;
        true
    }

    pub fn used(&self) -> u8 {
        self.used
    }
}

impl Default for RepairBudget {
    fn default() -> Self {
        Self::single()
    }
}
