#![no_main]

// Harness: privilege_failures
// Focus: for any combination of injected backend failures the controller latches,
// releases its handle and never leaves effective outside permitted.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use warden_core::privilege::{PrivilegeController, PrivilegeState};
use warden_core::testing::{FailPoint, MockProcess};
use warden_core::{CapFlag, CapabilityPolicy, UserId};

#[derive(Arbitrary, Debug)]
struct FailureFrame {
    failures: u16,
    retain_chown: bool,
    uid: u32,
}

const POINTS: [FailPoint; 9] = [
    FailPoint::Probe,
    FailPoint::Acquire,
    FailPoint::Add(CapFlag::Permitted),
    FailPoint::Add(CapFlag::Effective),
    FailPoint::CommitPermitted,
    FailPoint::CommitEffective,
    FailPoint::Render,
    FailPoint::Escalate,
    FailPoint::Restore,
];

fuzz_target!(|frame: FailureFrame| {
    let uid = UserId(frame.uid.max(1));
    let process = MockProcess::new();
    for (i, point) in POINTS.iter().enumerate() {
        if frame.failures & (1 << i) != 0 {
            process.fail_at(*point);
        }
    }

    let policy = CapabilityPolicy::new(true, frame.retain_chown);
    let mut controller = PrivilegeController::new(process.capability_system(), process.identity(), policy);
    let outcome = controller.reduce_privileges(uid);

    assert_eq!(process.outstanding_handles(), 0);
    assert!(process.effective().is_subset(&process.permitted()));
    assert!(process.permitted_never_grew());
    match outcome {
        Ok(PrivilegeState::Reduced) => assert_eq!(process.effective(), controller.retained()),
        Ok(PrivilegeState::Privileged) => assert!(process.switches().is_empty()),
        Ok(PrivilegeState::Failed) => assert!(controller.retained().is_empty()),
        Err(e) => {
            assert!(e.is_fatal());
            assert_eq!(controller.state(), PrivilegeState::Failed);
        }
    }
});
