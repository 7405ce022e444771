//! Worker lifecycle state machine.
//!
//! ```text
//! Installing ──InstallSucceeded──▶ Waiting ──Activated──▶ Active(vN)
//!     │  │                           │                      ▲  │
//!     │  └──────────────────Restored─┼──────────────────────┘  │
//!     └──InstallFailed──▶ Redundant ◀┴──────Superseded─────────┘
//! ```
//!
//! `Restored` resumes a generation that an earlier process activated,
//! without precaching again.

use std::fmt;

use swcache_core::Error;

/// Lifecycle state of one worker version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerState {
    /// Precaching the manifest.
    Installing,
    /// Installed and eligible to take over.
    Waiting,
    /// Controlling clients with the named version's generation.
    Active { version: String },
    /// Failed to install or replaced by a newer version. Terminal.
    Redundant,
}

/// Events that drive [`WorkerState`] transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    InstallSucceeded,
    InstallFailed,
    Activated { version: String },
    Restored { version: String },
    Superseded,
}

impl WorkerState {
    /// Compute the state after `event`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` for transitions the lifecycle does not allow.
    pub fn transition(&self, event: &LifecycleEvent) -> Result<WorkerState, Error> {
        use LifecycleEvent as E;
        use WorkerState as S;

        match (self, event) {
            (S::Installing, E::InstallSucceeded) => Ok(S::Waiting),
            (S::Installing, E::InstallFailed) => Ok(S::Redundant),
            (S::Waiting, E::Activated { version }) => Ok(S::Active { version: version.clone() }),
            (S::Installing, E::Restored { version }) => Ok(S::Active { version: version.clone() }),
            (S::Waiting | S::Active { .. }, E::Superseded) => Ok(S::Redundant),
            (state, event) => Err(Error::InvalidState(format!("{event:?} not allowed while {state}"))),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, WorkerState::Active { .. })
    }

    pub fn is_redundant(&self) -> bool {
        matches!(self, WorkerState::Redundant)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Installing => f.write_str("installing"),
            WorkerState::Waiting => f.write_str("waiting"),
            WorkerState::Active { version } => write!(f, "active-{version}"),
            WorkerState::Redundant => f.write_str("redundant"),
        }
    }
}
