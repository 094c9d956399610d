//!
//! Defines error types for the warden subsystems.
//!
//! Only `PrivilegeError::IdentitySwitch` is ever fatal to a session. Capability
//! subsystem failures are absorbed by the controller and only logged.

use crate::privilege::PrivilegeState;
use crate::types::{CapFlag, Capability, UserId};

/// Failures reported by a `CapabilitySystem` backend.
///
/// Every call site of the external capability API maps to its own variant so the
/// controller can tell the failure modes apart.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    /// The kernel does not support capabilities at all (detected by the startup probe).
    #[error("kernel does not support capabilities: {0}")]
    Unsupported(String),
    /// Allocating a capability-set handle failed.
    #[error("failed to initialise capability set: {0}")]
    Init(String),
    /// Adding a capability to a flag set of the handle failed.
    #[error("failed to add {capability} to {flag} set: {reason}")]
    Add {
        capability: Capability,
        flag: CapFlag,
        reason: String,
    },
    /// Committing the handle to the process failed.
    #[error("failed to commit capability set: {0}")]
    Commit(String),
    /// Rendering the current process capabilities as text failed.
    #[error("failed to render capabilities: {0}")]
    Render(String),
}

impl CapabilityError {
    /// `true` for the errors that disable the engine for the rest of the process lifetime.
    pub fn is_init(&self) -> bool {
        matches!(self, CapabilityError::Unsupported(_) | CapabilityError::Init(_))
    }
}

/// The identity-switching primitive refused a `(real, effective)` pair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to switch identity to real={real} effective={effective}: {reason}")]
pub struct IdentityError {
    pub real: UserId,
    pub effective: UserId,
    pub reason: String,
}

/// Errors surfaced by the `PrivilegeController`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrivilegeError {
    /// Switching to or from root failed. The session must end.
    #[error("identity switch failed: {0}")]
    IdentitySwitch(#[from] IdentityError),
    /// The one-way latch is closed; no identity switch is allowed any more.
    #[error("identity switching is disabled (privilege state: {state:?})")]
    IdentitySwitchingDisabled { state: PrivilegeState },
}

impl PrivilegeError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, PrivilegeError::IdentitySwitch(_))
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("CapabilitiesSet needs at least one parameter")]
    MissingArgument,
    #[error("bad option: '{0}'")]
    BadOption(String),
    #[error("unknown capability: '{0}'")]
    UnknownCapability(String),
}

/// Errors surfaced by a `Session`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The session was ended after a fatal privilege failure.
    #[error("session terminated")]
    Terminated,
    #[error(transparent)]
    Privilege(#[from] PrivilegeError),
}
