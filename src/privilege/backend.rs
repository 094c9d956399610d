//! External collaborator abstractions for the privilege controller.
//!
//! The controller never issues privileged syscalls itself. A `CapabilitySystem`
//! manipulates kernel capability sets and an `IdentityProvider` swaps process
//! user ids. This keeps the one-shot state machine independent of the platform
//! and lets tests drive every failure path.

use std::mem;

use crate::error::{CapabilityError, IdentityError};
use crate::types::{CapFlag, Capability, UserId};

/// Trait implemented by capability subsystem backends.
///
/// A `Handle` is a working copy of the process capability sets. Nothing reaches
/// the kernel until `commit` is called with it.
pub trait CapabilitySystem {
    /// `Default` is the empty working set.
    type Handle: Default;

    /// One-time support check. `CapabilityError::Unsupported` disables the engine.
    fn probe(&self) -> Result<(), CapabilityError>;

    /// Allocates an empty working set.
    fn acquire(&self) -> Result<Self::Handle, CapabilityError>;

    /// Raises `capability` in the `flag` set of the working copy.
    fn add(&self, handle: &mut Self::Handle, flag: CapFlag, capability: Capability) -> Result<(), CapabilityError>;

    /// Applies the working copy to the calling process.
    fn commit(&self, handle: &Self::Handle) -> Result<(), CapabilityError>;

    /// Frees the working copy.
    fn release(&self, handle: Self::Handle);

    /// Current process capabilities as diagnostic text.
    fn render(&self) -> Result<String, CapabilityError>;
}

/// Trait implemented by identity-switching backends.
pub trait IdentityProvider {
    /// Atomically sets the real and effective user ids. All-or-nothing per call.
    fn set_reuid(&self, real: UserId, effective: UserId) -> Result<(), IdentityError>;

    /// Called when the process could not leave root identity.
    ///
    /// Control must not reach unguarded code at effective uid 0, so the default
    /// ends the process. In-memory backends may record the call and return,
    /// since no real identity is at stake.
    fn root_restore_failed(&self, error: &IdentityError) {
        tracing::error!(error = %error, "failed to leave root identity; aborting");
        std::process::abort();
    }
}

/// Scoped ownership of a capability-set handle.
///
/// The handle is released exactly once, on whichever path leaves the scope.
pub(crate) struct HandleGuard<'a, S: CapabilitySystem> {
    system: &'a S,
    handle: S::Handle,
}

impl<'a, S: CapabilitySystem> HandleGuard<'a, S> {
    pub(crate) fn acquire(system: &'a S) -> Result<Self, CapabilityError> {
        let handle = system.acquire()?;
        Ok(Self { system, handle })
    }

    /// Adds every capability in `caps` to `flag`, stopping at the first failure.
    pub(crate) fn add_all<'c, I>(&mut self, flag: CapFlag, caps: I) -> Result<(), CapabilityError>
    where
        I: IntoIterator<Item = &'c Capability>,
    {
        for cap in caps {
            self.system.add(&mut self.handle, flag, *cap)?;
        }
        Ok(())
    }

    pub(crate) fn commit(&self) -> Result<(), CapabilityError> {
        self.system.commit(&self.handle)
    }
}

impl<S: CapabilitySystem> Drop for HandleGuard<'_, S> {
    fn drop(&mut self) {
        self.system.release(mem::take(&mut self.handle));
    }
}

/// Temporary root identity.
///
/// Entering switches to `(real = user, effective = root)`. Leaving switches back
/// to `(real = root, effective = user)`, which keeps the permitted capability set
/// while clearing the effective one. `restore` is the normal exit; if the scope
/// is dropped without it the identity is restored in `drop`. Either way a
/// failure to leave root goes to `IdentityProvider::root_restore_failed`.
pub(crate) struct RootScope<'a, I: IdentityProvider> {
    identity: &'a I,
    user: UserId,
    restored: bool,
}

impl<'a, I: IdentityProvider> RootScope<'a, I> {
    pub(crate) fn enter(identity: &'a I, user: UserId) -> Result<Self, IdentityError> {
        identity.set_reuid(user, UserId::ROOT)?;
        Ok(Self { identity, user, restored: false })
    }

    /// Leaves root. On failure the provider's `root_restore_failed` runs before
    /// the error is returned.
    pub(crate) fn restore(mut self) -> Result<(), IdentityError> {
        self.restored = true;
        self.identity.set_reuid(UserId::ROOT, self.user).inspect_err(|e| self.identity.root_restore_failed(e))
    }
}

impl<I: IdentityProvider> Drop for RootScope<'_, I> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(e) = self.identity.set_reuid(UserId::ROOT, self.user) {
            self.identity.root_restore_failed(&e);
        }
    }
}
