//! Linux backend: capability sets through the `caps` crate, identity through
//! `setresuid(2)`.

use caps::errors::CapsError;
use caps::{CapSet, CapsHashSet};
use nix::errno::Errno;
use nix::unistd::{setresuid, Uid};

use crate::error::{CapabilityError, IdentityError};
use crate::privilege::backend::{CapabilitySystem, IdentityProvider};
use crate::types::{CapFlag, Capability, UserId};

fn to_caps(capability: Capability) -> caps::Capability {
    match capability {
        Capability::NetBindService => caps::Capability::CAP_NET_BIND_SERVICE,
        Capability::Chown => caps::Capability::CAP_CHOWN,
    }
}

/// `caps` reports the OS error only as text, e.g. "... (os error 38)".
fn is_enosys(error: &CapsError) -> bool {
    error.to_string().contains(&format!("(os error {})", Errno::ENOSYS as i32))
}

/// Pending permitted/effective sets for the calling thread.
#[derive(Debug, Default, Clone)]
pub struct LinuxCapHandle {
    permitted: CapsHashSet,
    effective: CapsHashSet,
}

/// Capability subsystem of the running kernel.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxCapabilities;

impl CapabilitySystem for LinuxCapabilities {
    type Handle = LinuxCapHandle;

    fn probe(&self) -> Result<(), CapabilityError> {
        caps::read(None, CapSet::Permitted).map(|_| ()).map_err(|e| {
            if is_enosys(&e) {
                CapabilityError::Unsupported(e.to_string())
            } else {
                CapabilityError::Init(e.to_string())
            }
        })
    }

    fn acquire(&self) -> Result<Self::Handle, CapabilityError> {
        Ok(LinuxCapHandle::default())
    }

    fn add(&self, handle: &mut Self::Handle, flag: CapFlag, capability: Capability) -> Result<(), CapabilityError> {
        let set = match flag {
            CapFlag::Permitted => &mut handle.permitted,
            CapFlag::Effective => &mut handle.effective,
        };
        set.insert(to_caps(capability));
        Ok(())
    }

    fn commit(&self, handle: &Self::Handle) -> Result<(), CapabilityError> {
        // Effective first: the kernel rejects any state where effective is not a
        // subset of permitted, and the pending effective set always is.
        caps::set(None, CapSet::Effective, &handle.effective)
            .map_err(|e| CapabilityError::Commit(format!("effective: {}", e)))?;
        caps::set(None, CapSet::Permitted, &handle.permitted)
            .map_err(|e| CapabilityError::Commit(format!("permitted: {}", e)))
    }

    fn release(&self, handle: Self::Handle) {
        drop(handle);
    }

    fn render(&self) -> Result<String, CapabilityError> {
        let read = |set: CapSet| {
            caps::read(None, set)
                .map(|caps| {
                    let mut names: Vec<String> = caps.iter().map(|c| c.to_string().to_lowercase()).collect();
                    names.sort();
                    names.join(",")
                })
                .map_err(|e| CapabilityError::Render(e.to_string()))
        };
        Ok(format!("permitted={} effective={}", read(CapSet::Permitted)?, read(CapSet::Effective)?))
    }
}

/// Process identity switching via `setresuid`, saved uid following the effective uid.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxIdentity;

impl IdentityProvider for LinuxIdentity {
    fn set_reuid(&self, real: UserId, effective: UserId) -> Result<(), IdentityError> {
        let euid = Uid::from_raw(effective.0);
        setresuid(Uid::from_raw(real.0), euid, euid).map_err(|errno| IdentityError {
            real,
            effective,
            reason: errno.desc().to_string(),
        })
    }
}
