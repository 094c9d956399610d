//! In-memory process model for driving the privilege controller in tests.
//!
//! `MockProcess` holds one simulated process (user ids and capability sets).
//! `MockCapabilitySystem` and `MockIdentity` are views onto it that implement
//! the backend traits, so identity switches and capability commits interact the
//! way they do on Linux:
//! * leaving effective uid 0 clears the effective set;
//! * entering effective uid 0 raises effective to permitted;
//! * a commit may never grow permitted, and effective must stay within permitted.
//!
//! A failure to leave root is counted instead of aborting the test process.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{CapabilityError, IdentityError};
use crate::privilege::backend::{CapabilitySystem, IdentityProvider};
use crate::types::{CapFlag, Capability, UserId};

/// Call sites where a failure can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Probe,
    Acquire,
    Add(CapFlag),
    /// The first commit (permitted set).
    CommitPermitted,
    /// The second commit (effective set).
    CommitEffective,
    Render,
    /// Switching to effective uid 0.
    Escalate,
    /// Switching away from effective uid 0.
    Restore,
}

/// Recorded identity switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdSwitch {
    pub real: UserId,
    pub effective: UserId,
}

#[derive(Debug)]
struct ProcessState {
    real: UserId,
    effective_uid: UserId,
    permitted: BTreeSet<Capability>,
    effective: BTreeSet<Capability>,
    failures: Vec<FailPoint>,
    commits: usize,
    outstanding_handles: usize,
    switches: Vec<IdSwitch>,
    /// Calls that would have ended a real process stuck at root.
    stuck_at_root: usize,
    /// Largest permitted set observed after the first commit.
    permitted_high_water: Option<BTreeSet<Capability>>,
}

fn all_capabilities() -> BTreeSet<Capability> {
    [Capability::NetBindService, Capability::Chown].into_iter().collect()
}

/// A simulated process shared by the mock backends.
#[derive(Debug, Clone)]
pub struct MockProcess {
    inner: Arc<Mutex<ProcessState>>,
}

impl Default for MockProcess {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProcess {
    /// A root process: real and effective uid 0, every capability permitted and effective.
    pub fn new() -> Self {
        MockProcess {
            inner: Arc::new(Mutex::new(ProcessState {
                real: UserId::ROOT,
                effective_uid: UserId::ROOT,
                permitted: all_capabilities(),
                effective: all_capabilities(),
                failures: Vec::new(),
                commits: 0,
                outstanding_handles: 0,
                switches: Vec::new(),
                stuck_at_root: 0,
                permitted_high_water: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProcessState> {
        // A poisoned lock only means another test thread panicked mid-update.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes the given call site fail from now on.
    pub fn fail_at(&self, point: FailPoint) -> &Self {
        self.lock().failures.push(point);
        self
    }

    pub fn capability_system(&self) -> MockCapabilitySystem {
        MockCapabilitySystem { process: self.clone() }
    }

    pub fn identity(&self) -> MockIdentity {
        MockIdentity { process: self.clone() }
    }

    pub fn permitted(&self) -> BTreeSet<Capability> {
        self.lock().permitted.clone()
    }

    pub fn effective(&self) -> BTreeSet<Capability> {
        self.lock().effective.clone()
    }

    /// Current `(real, effective)` user ids.
    pub fn ids(&self) -> (UserId, UserId) {
        let state = self.lock();
        (state.real, state.effective_uid)
    }

    pub fn switches(&self) -> Vec<IdSwitch> {
        self.lock().switches.clone()
    }

    pub fn commits(&self) -> usize {
        self.lock().commits
    }

    /// How often the process would have been ended for failing to leave root.
    pub fn stuck_at_root(&self) -> usize {
        self.lock().stuck_at_root
    }

    /// Handles acquired but not yet released.
    pub fn outstanding_handles(&self) -> usize {
        self.lock().outstanding_handles
    }

    /// `true` if permitted never grew after the first commit.
    pub fn permitted_never_grew(&self) -> bool {
        let state = self.lock();
        match &state.permitted_high_water {
            Some(high) => state.permitted.is_subset(high),
            None => true,
        }
    }

    fn should_fail(state: &ProcessState, point: FailPoint) -> bool {
        state.failures.contains(&point)
    }
}

/// Working copy handed out by `MockCapabilitySystem::acquire`.
#[derive(Debug, Default)]
pub struct MockHandle {
    permitted: BTreeSet<Capability>,
    effective: BTreeSet<Capability>,
}

/// `CapabilitySystem` view of a `MockProcess`.
#[derive(Debug, Clone)]
pub struct MockCapabilitySystem {
    process: MockProcess,
}

impl CapabilitySystem for MockCapabilitySystem {
    type Handle = MockHandle;

    fn probe(&self) -> Result<(), CapabilityError> {
        let state = self.process.lock();
        if MockProcess::should_fail(&state, FailPoint::Probe) {
            return Err(CapabilityError::Unsupported("ENOSYS".into()));
        }
        Ok(())
    }

    fn acquire(&self) -> Result<Self::Handle, CapabilityError> {
        let mut state = self.process.lock();
        if MockProcess::should_fail(&state, FailPoint::Acquire) {
            return Err(CapabilityError::Init("ENOMEM".into()));
        }
        state.outstanding_handles += 1;
        Ok(MockHandle::default())
    }

    fn add(&self, handle: &mut Self::Handle, flag: CapFlag, capability: Capability) -> Result<(), CapabilityError> {
        let state = self.process.lock();
        if MockProcess::should_fail(&state, FailPoint::Add(flag)) {
            return Err(CapabilityError::Add { capability, flag, reason: "EINVAL".into() });
        }
        match flag {
            CapFlag::Permitted => handle.permitted.insert(capability),
            CapFlag::Effective => handle.effective.insert(capability),
        };
        Ok(())
    }

    fn commit(&self, handle: &Self::Handle) -> Result<(), CapabilityError> {
        let mut state = self.process.lock();
        state.commits += 1;
        let point = if state.commits == 1 { FailPoint::CommitPermitted } else { FailPoint::CommitEffective };
        if MockProcess::should_fail(&state, point) {
            return Err(CapabilityError::Commit("EPERM".into()));
        }
        if !handle.permitted.is_subset(&state.permitted) {
            return Err(CapabilityError::Commit("EPERM: permitted set may not grow".into()));
        }
        if !handle.effective.is_subset(&handle.permitted) {
            return Err(CapabilityError::Commit("EPERM: effective exceeds permitted".into()));
        }
        state.permitted = handle.permitted.clone();
        state.effective = handle.effective.clone();
        if state.permitted_high_water.is_none() {
            state.permitted_high_water = Some(state.permitted.clone());
        }
        Ok(())
    }

    fn release(&self, handle: Self::Handle) {
        drop(handle);
        let mut state = self.process.lock();
        state.outstanding_handles = state.outstanding_handles.saturating_sub(1);
    }

    fn render(&self) -> Result<String, CapabilityError> {
        let state = self.process.lock();
        if MockProcess::should_fail(&state, FailPoint::Render) {
            return Err(CapabilityError::Render("EFAULT".into()));
        }
        let join = |set: &BTreeSet<Capability>| set.iter().map(|c| c.name()).collect::<Vec<_>>().join(",");
        Ok(format!("permitted={} effective={}", join(&state.permitted), join(&state.effective)))
    }
}

/// `IdentityProvider` view of a `MockProcess`.
#[derive(Debug, Clone)]
pub struct MockIdentity {
    process: MockProcess,
}

impl IdentityProvider for MockIdentity {
    fn set_reuid(&self, real: UserId, effective: UserId) -> Result<(), IdentityError> {
        let mut state = self.process.lock();
        let point = if effective.is_root() { FailPoint::Escalate } else { FailPoint::Restore };
        if MockProcess::should_fail(&state, point) {
            return Err(IdentityError { real, effective, reason: "EPERM".into() });
        }

        let was_root = state.effective_uid.is_root();
        state.real = real;
        state.effective_uid = effective;
        if was_root && !effective.is_root() {
            state.effective.clear();
        } else if !was_root && effective.is_root() {
            state.effective = state.permitted.clone();
        }
        state.switches.push(IdSwitch { real, effective });
        Ok(())
    }

    fn root_restore_failed(&self, error: &IdentityError) {
        tracing::error!(error = %error, "mock process stuck at root");
        self.process.lock().stuck_at_root += 1;
    }
}
