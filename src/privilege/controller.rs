//!
//! The one-shot privilege reduction state machine.
//!
//! After authentication the server process drops from full superuser to a
//! fixed, minimal set of capabilities. The transition happens at most once per
//! controller and is latched: whatever the outcome, no identity switch is
//! allowed afterwards.

use crate::error::{CapabilityError, PrivilegeError};
use crate::policy::{self, CapabilityPolicy, CapabilitySet};
use crate::privilege::backend::{CapabilitySystem, HandleGuard, IdentityProvider, RootScope};
use crate::types::{CapFlag, UserId};

/// Latched privilege state of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PrivilegeState {
    /// Initial state. Identity switches are still possible.
    Privileged,
    /// Terminal. The process runs with exactly the policy's capabilities.
    Reduced,
    /// Terminal. The process runs with no effective capabilities.
    Failed,
}

impl PrivilegeState {
    /// `true` once the one-way latch has closed.
    pub fn is_latched(self) -> bool {
        !matches!(self, PrivilegeState::Privileged)
    }
}

/// Whether the reduction engine may run at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Enabled,
    /// Turned off in configuration.
    DisabledByConfig,
    /// The startup probe found no kernel support.
    Unsupported,
    /// Allocating a capability handle failed; disabled for the process lifetime.
    InitFailed,
}

impl EngineStatus {
    pub fn is_enabled(self) -> bool {
        matches!(self, EngineStatus::Enabled)
    }
}

/// Owns the one-time transition of process identity and capability sets.
///
/// All mutation goes through `&mut self`, so the transition cannot race with
/// another identity change made through the same controller.
#[derive(Debug)]
pub struct PrivilegeController<S: CapabilitySystem, I: IdentityProvider> {
    system: S,
    identity: I,
    policy: CapabilityPolicy,
    state: PrivilegeState,
    engine: EngineStatus,
}

impl<S, I> PrivilegeController<S, I>
where
    S: CapabilitySystem,
    I: IdentityProvider,
{
    /// Creates a controller and runs the one-time support probe.
    pub fn new(system: S, identity: I, policy: CapabilityPolicy) -> Self {
        let engine = if !policy.enabled() {
            tracing::debug!("lowering of capabilities disabled");
            EngineStatus::DisabledByConfig
        } else {
            match system.probe() {
                Ok(()) => EngineStatus::Enabled,
                Err(CapabilityError::Unsupported(reason)) => {
                    tracing::debug!(%reason, "kernel does not support capabilities, disabling engine");
                    EngineStatus::Unsupported
                }
                Err(e) => {
                    // Only a definite "unsupported" disables the engine at startup.
                    tracing::warn!(error = %e, "capability probe failed");
                    EngineStatus::Enabled
                }
            }
        };

        if engine.is_enabled() && !policy.retain_chown() {
            tracing::debug!("removing CAP_CHOWN capability");
        }

        PrivilegeController {
            system,
            identity,
            policy,
            state: PrivilegeState::Privileged,
            engine,
        }
    }

    pub fn state(&self) -> PrivilegeState {
        self.state
    }

    pub fn engine(&self) -> EngineStatus {
        self.engine
    }

    pub fn policy(&self) -> &CapabilityPolicy {
        &self.policy
    }

    pub fn capability_system(&self) -> &S {
        &self.system
    }

    pub fn identity(&self) -> &I {
        &self.identity
    }

    /// Capabilities the process holds in its effective set after the
    /// transition: the policy's set when `Reduced`, empty otherwise.
    ///
    /// When only the effective step failed, the permitted set still carries the
    /// policy's capabilities. They are never raised again, since identity
    /// switching is latched off.
    pub fn retained(&self) -> CapabilitySet {
        match self.state {
            PrivilegeState::Reduced => policy::build(&self.policy),
            _ => CapabilitySet::new(),
        }
    }

    /// Switches identity through the controller. Refused once the latch is closed.
    pub fn switch_identity(&self, real: UserId, effective: UserId) -> Result<(), PrivilegeError> {
        if self.state.is_latched() {
            return Err(PrivilegeError::IdentitySwitchingDisabled { state: self.state });
        }
        self.identity.set_reuid(real, effective)?;
        Ok(())
    }

    /// Drops the process to `unprivileged` while retaining only the policy's
    /// capabilities. Call once, after authentication succeeded, while the
    /// process can still switch back to root.
    ///
    /// Capability subsystem failures never surface here: they are logged and the
    /// state latches `Failed`, leaving a fully dropped process with no retained
    /// capabilities. Only a failed identity switch is returned, and it is fatal
    /// to the session.
    ///
    /// # Returns
    /// The latched state, or `Privileged` unchanged if the engine is disabled.
    pub fn reduce_privileges(&mut self, unprivileged: UserId) -> Result<PrivilegeState, PrivilegeError> {
        if self.state.is_latched() {
            tracing::debug!(state = ?self.state, "privileges already reduced, ignoring");
            return Ok(self.state);
        }
        if !self.engine.is_enabled() {
            tracing::debug!(engine = ?self.engine, "capability engine disabled, skipping reduction");
            return Ok(self.state);
        }

        let caps = policy::build(&self.policy);

        // 1. Reacquire root.
        let root = match RootScope::enter(&self.identity, unprivileged) {
            Ok(scope) => scope,
            Err(e) => {
                tracing::error!(uid = %unprivileged, error = %e, "failed to reacquire root identity");
                self.state = PrivilegeState::Failed;
                return Err(e.into());
            }
        };

        // 2. Working capability set, released on every path out of this function.
        let mut guard = match HandleGuard::acquire(&self.system) {
            Ok(guard) => Some(guard),
            Err(e) => {
                tracing::error!(error = %e, "capability subsystem unusable, disabling engine");
                self.engine = EngineStatus::InitFailed;
                None
            }
        };

        // 3. Permitted set first: leaving root clears the effective set anyway.
        let permitted = match guard.as_mut() {
            Some(g) => g
                .add_all(CapFlag::Permitted, &caps)
                .and_then(|()| g.commit())
                .inspect_err(|e| tracing::error!(error = %e, "failed to set permitted capabilities"))
                .is_ok(),
            None => false,
        };

        // 4. Back to the unprivileged identity. A real backend never returns from
        // a failed restore; `guard` still releases if one does.
        if let Err(e) = root.restore() {
            tracing::error!(uid = %unprivileged, error = %e, "failed to restore unprivileged identity");
            self.state = PrivilegeState::Failed;
            return Err(e.into());
        }

        // 5. Raise the same capabilities into the effective set.
        let effective = match guard.as_mut() {
            Some(g) if permitted => g
                .add_all(CapFlag::Effective, &caps)
                .and_then(|()| g.commit())
                .inspect_err(|e| tracing::error!(error = %e, "failed to set effective capabilities"))
                .is_ok(),
            _ => false,
        };

        // 6. Release.
        drop(guard);

        // 7. Latch.
        if effective {
            self.state = PrivilegeState::Reduced;
            match self.system.render() {
                Ok(text) => tracing::debug!(uid = %unprivileged, capabilities = %text, "privileges reduced"),
                Err(e) => tracing::error!(error = %e, "failed to render capabilities"),
            }
        } else {
            self.state = PrivilegeState::Failed;
            tracing::warn!(
                uid = %unprivileged,
                "attempt to configure capabilities failed, reverting to normal operation"
            );
        }

        Ok(self.state)
    }
}
