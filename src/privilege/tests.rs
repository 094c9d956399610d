#![cfg(test)]

use std::collections::BTreeSet;

use crate::error::PrivilegeError;
use crate::policy::CapabilityPolicy;
use crate::privilege::backend::RootScope;
use crate::privilege::controller::{EngineStatus, PrivilegeController, PrivilegeState};
use crate::testing::{FailPoint, IdSwitch, MockCapabilitySystem, MockIdentity, MockProcess};
use crate::types::{CapFlag, Capability, UserId};

// --- Test Utilities ---

const TEST_UID: UserId = UserId(1000);

type MockController = PrivilegeController<MockCapabilitySystem, MockIdentity>;

fn create_test_controller(process: &MockProcess, policy: CapabilityPolicy) -> MockController {
    PrivilegeController::new(process.capability_system(), process.identity(), policy)
}

fn caps(list: &[Capability]) -> BTreeSet<Capability> {
    list.iter().copied().collect()
}

fn escalate_then_restore() -> Vec<IdSwitch> {
    vec![
        IdSwitch { real: TEST_UID, effective: UserId::ROOT },
        IdSwitch { real: UserId::ROOT, effective: TEST_UID },
    ]
}

// --- Successful reduction ---

#[test]
fn test_reduce_retains_bind_and_chown() {
    let process = MockProcess::new();
    let mut controller = create_test_controller(&process, CapabilityPolicy::default());

    let state = controller.reduce_privileges(TEST_UID).expect("reduction must not be fatal");

    assert_eq!(state, PrivilegeState::Reduced);
    assert_eq!(controller.state(), PrivilegeState::Reduced);
    let expected = caps(&[Capability::NetBindService, Capability::Chown]);
    assert_eq!(process.permitted(), expected);
    assert_eq!(process.effective(), expected);
    assert_eq!(controller.retained(), expected);
    assert_eq!(process.ids(), (UserId::ROOT, TEST_UID));
    assert_eq!(process.switches(), escalate_then_restore());
    assert_eq!(process.commits(), 2);
    assert_eq!(process.outstanding_handles(), 0);
    assert!(process.permitted_never_grew());
}

#[test]
fn test_reduce_without_chown() {
    let process = MockProcess::new();
    let mut controller = create_test_controller(&process, CapabilityPolicy::new(true, false));

    assert_eq!(controller.reduce_privileges(TEST_UID), Ok(PrivilegeState::Reduced));

    let expected = caps(&[Capability::NetBindService]);
    assert_eq!(process.permitted(), expected);
    assert_eq!(process.effective(), expected);
}

#[test]
fn test_render_failure_does_not_change_outcome() {
    let process = MockProcess::new();
    process.fail_at(FailPoint::Render);
    let mut controller = create_test_controller(&process, CapabilityPolicy::default());

    assert_eq!(controller.reduce_privileges(TEST_UID), Ok(PrivilegeState::Reduced));
}

// --- Soft failures ---

#[test]
fn test_permitted_commit_failure_is_soft() {
    let process = MockProcess::new();
    process.fail_at(FailPoint::CommitPermitted);
    let mut controller = create_test_controller(&process, CapabilityPolicy::default());

    let state = controller.reduce_privileges(TEST_UID);

    assert_eq!(state, Ok(PrivilegeState::Failed));
    // No effective-set manipulation after a failed permitted commit.
    assert_eq!(process.commits(), 1);
    assert!(process.effective().is_empty());
    assert!(controller.retained().is_empty());
    // Identity was still restored and the handle released.
    assert_eq!(process.ids(), (UserId::ROOT, TEST_UID));
    assert_eq!(process.outstanding_handles(), 0);
    assert_eq!(controller.engine(), EngineStatus::Enabled);
}

#[test]
fn test_permitted_add_failure_is_soft() {
    let process = MockProcess::new();
    process.fail_at(FailPoint::Add(CapFlag::Permitted));
    let mut controller = create_test_controller(&process, CapabilityPolicy::default());

    assert_eq!(controller.reduce_privileges(TEST_UID), Ok(PrivilegeState::Failed));
    assert_eq!(process.commits(), 0);
    assert!(process.effective().is_empty());
    assert_eq!(process.outstanding_handles(), 0);
}

#[test]
fn test_effective_commit_failure_is_soft() {
    let process = MockProcess::new();
    process.fail_at(FailPoint::CommitEffective);
    let mut controller = create_test_controller(&process, CapabilityPolicy::default());

    assert_eq!(controller.reduce_privileges(TEST_UID), Ok(PrivilegeState::Failed));
    assert_eq!(process.commits(), 2);
    assert!(process.effective().is_empty());
    assert!(process.effective().is_subset(&process.permitted()));
    assert!(process.permitted_never_grew());
    assert_eq!(process.outstanding_handles(), 0);
    // Permitted kept the policy set, but nothing is effective or retained.
    assert_eq!(process.permitted(), caps(&[Capability::NetBindService, Capability::Chown]));
    assert!(controller.retained().is_empty());
}

#[test]
fn test_effective_add_failure_is_soft() {
    let process = MockProcess::new();
    process.fail_at(FailPoint::Add(CapFlag::Effective));
    let mut controller = create_test_controller(&process, CapabilityPolicy::default());

    assert_eq!(controller.reduce_privileges(TEST_UID), Ok(PrivilegeState::Failed));
    assert_eq!(process.commits(), 1);
    assert!(process.effective().is_empty());
}

#[test]
fn test_acquire_failure_disables_engine() {
    let process = MockProcess::new();
    process.fail_at(FailPoint::Acquire);
    let mut controller = create_test_controller(&process, CapabilityPolicy::default());

    assert_eq!(controller.reduce_privileges(TEST_UID), Ok(PrivilegeState::Failed));
    assert_eq!(controller.engine(), EngineStatus::InitFailed);
    assert_eq!(process.commits(), 0);
    // Root was still left.
    assert_eq!(process.switches(), escalate_then_restore());
    assert!(process.effective().is_empty());
}

// --- Fatal failures ---

#[test]
fn test_escalate_failure_is_fatal() {
    let process = MockProcess::new();
    process.fail_at(FailPoint::Escalate);
    let mut controller = create_test_controller(&process, CapabilityPolicy::default());

    let err = controller.reduce_privileges(TEST_UID).unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(err, PrivilegeError::IdentitySwitch(ref e) if e.effective == UserId::ROOT));
    assert_eq!(controller.state(), PrivilegeState::Failed);
    assert_eq!(process.outstanding_handles(), 0);
    assert_eq!(process.commits(), 0);
    // Root was never reached, so nothing has to end the process.
    assert_eq!(process.stuck_at_root(), 0);
}

#[test]
fn test_restore_failure_is_fatal_and_releases_handle() {
    let process = MockProcess::new();
    process.fail_at(FailPoint::Restore);
    let mut controller = create_test_controller(&process, CapabilityPolicy::default());

    let err = controller.reduce_privileges(TEST_UID).unwrap_err();

    assert!(matches!(err, PrivilegeError::IdentitySwitch(ref e) if e.effective == TEST_UID));
    assert_eq!(controller.state(), PrivilegeState::Failed);
    assert_eq!(process.outstanding_handles(), 0);
    // Effective set never manipulated after the failed restore.
    assert_eq!(process.commits(), 1);
}

#[test]
fn test_restore_failure_ends_process_before_returning() {
    let process = MockProcess::new();
    process.fail_at(FailPoint::Restore);
    let mut controller = create_test_controller(&process, CapabilityPolicy::default());

    assert!(controller.reduce_privileges(TEST_UID).is_err());

    // Still at effective uid 0: the backend was told exactly once, on the
    // restore path, before control came back to the caller.
    assert_eq!(process.ids(), (TEST_UID, UserId::ROOT));
    assert_eq!(process.stuck_at_root(), 1);
}

#[test]
fn test_successful_reduction_never_ends_process() {
    let process = MockProcess::new();
    let mut controller = create_test_controller(&process, CapabilityPolicy::default());

    controller.reduce_privileges(TEST_UID).unwrap();
    assert_eq!(process.stuck_at_root(), 0);
}

#[test]
fn test_root_scope_restores_on_drop() {
    let process = MockProcess::new();
    let identity = process.identity();

    drop(RootScope::enter(&identity, TEST_UID).unwrap());

    assert_eq!(process.ids(), (UserId::ROOT, TEST_UID));
    assert_eq!(process.switches(), escalate_then_restore());
    assert_eq!(process.stuck_at_root(), 0);
}

#[test]
fn test_root_scope_drop_failure_ends_process() {
    let process = MockProcess::new();
    let identity = process.identity();

    let scope = RootScope::enter(&identity, TEST_UID).unwrap();
    process.fail_at(FailPoint::Restore);
    drop(scope);

    assert_eq!(process.ids(), (TEST_UID, UserId::ROOT));
    assert_eq!(process.stuck_at_root(), 1);
}

// --- Engine gating and the latch ---

#[test]
fn test_disabled_engine_is_noop() {
    let process = MockProcess::new();
    let mut controller = create_test_controller(&process, CapabilityPolicy::disabled());

    assert_eq!(controller.engine(), EngineStatus::DisabledByConfig);
    assert_eq!(controller.reduce_privileges(TEST_UID), Ok(PrivilegeState::Privileged));
    assert!(process.switches().is_empty());
    assert_eq!(process.commits(), 0);
}

#[test]
fn test_unsupported_kernel_disables_engine() {
    let process = MockProcess::new();
    process.fail_at(FailPoint::Probe);
    let mut controller = create_test_controller(&process, CapabilityPolicy::default());

    assert_eq!(controller.engine(), EngineStatus::Unsupported);
    assert_eq!(controller.reduce_privileges(TEST_UID), Ok(PrivilegeState::Privileged));
    assert!(process.switches().is_empty());
}

#[test]
fn test_second_reduction_is_ignored() {
    let process = MockProcess::new();
    let mut controller = create_test_controller(&process, CapabilityPolicy::default());

    controller.reduce_privileges(TEST_UID).unwrap();
    let switches_after_first = process.switches().len();

    assert_eq!(controller.reduce_privileges(UserId(2000)), Ok(PrivilegeState::Reduced));
    assert_eq!(process.switches().len(), switches_after_first);
    assert_eq!(process.commits(), 2);
}

#[test]
fn test_identity_switching_latched_after_success() {
    let process = MockProcess::new();
    let mut controller = create_test_controller(&process, CapabilityPolicy::default());

    controller.switch_identity(UserId::ROOT, TEST_UID).expect("switch allowed before reduction");
    controller.reduce_privileges(TEST_UID).unwrap();

    let err = controller.switch_identity(UserId::ROOT, UserId::ROOT).unwrap_err();
    assert_eq!(err, PrivilegeError::IdentitySwitchingDisabled { state: PrivilegeState::Reduced });
}

#[test]
fn test_identity_switching_latched_after_soft_failure() {
    let process = MockProcess::new();
    process.fail_at(FailPoint::CommitPermitted);
    let mut controller = create_test_controller(&process, CapabilityPolicy::default());

    controller.reduce_privileges(TEST_UID).unwrap();
    let before = process.switches().len();

    assert!(matches!(
        controller.switch_identity(TEST_UID, UserId::ROOT),
        Err(PrivilegeError::IdentitySwitchingDisabled { state: PrivilegeState::Failed })
    ));
    assert_eq!(process.switches().len(), before);
}
