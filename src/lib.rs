#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(deprecated)]

//!
//! Warden-Core is the least-privilege subsystem of a privileged network server.
//!
//! It provides two independent pieces:
//! * a one-shot privilege controller that, right after authentication, drops the
//!   process from full superuser to an explicit minimal set of capabilities and
//!   latches the outcome, and
//! * an access-control expression compiler and evaluator deciding whether an
//!   authenticated principal satisfies a configured user/group/class rule.
//!
//! Privileged syscalls stay behind the `CapabilitySystem` and `IdentityProvider`
//! traits; a Linux implementation lives in `privilege::linux`.

// Shared value types (UserId, Capability, CapFlag).
pub mod types;

// Error types for every subsystem.
pub mod error;

// Capability policy and the capability set builder.
pub mod policy;

// Access rules: compiler, evaluator, principal context.
pub mod access;

// Privilege reduction state machine and its backends.
pub mod privilege;

// Startup configuration.
pub mod config;

// Post-authentication hook and session guard.
pub mod session;

// In-memory backends for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use access::{AccessRule, CombinePolicy, Domain, EvaluationContext, Expression};
pub use error::{CapabilityError, ConfigError, IdentityError, PrivilegeError, SessionError};
pub use policy::{build, CapabilityPolicy, CapabilitySet};
pub use privilege::{PrivilegeController, PrivilegeState};
pub use types::{CapFlag, Capability, UserId};
