pub mod backend;
pub mod controller;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(test)]
mod tests;

pub use backend::{CapabilitySystem, IdentityProvider};
pub use controller::{EngineStatus, PrivilegeController, PrivilegeState};
