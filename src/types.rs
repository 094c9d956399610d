//!
//! Shared value types used across the privilege and access modules.

use std::fmt;

/// A numeric user identifier as understood by the OS identity primitive.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

impl UserId {
    /// The superuser.
    pub const ROOT: UserId = UserId(0);

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The OS-level capabilities this crate knows how to retain.
///
/// Only the two capabilities the server needs after authentication are modelled;
/// everything else is dropped by construction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Capability {
    /// Bind listening sockets below port 1024.
    NetBindService,
    /// Change file ownership.
    Chown,
}

impl Capability {
    /// Canonical kernel name, e.g. `CAP_CHOWN`.
    pub fn name(self) -> &'static str {
        match self {
            Capability::NetBindService => "CAP_NET_BIND_SERVICE",
            Capability::Chown => "CAP_CHOWN",
        }
    }

    /// Case-insensitive lookup by kernel name.
    pub fn from_name(name: &str) -> Option<Self> {
        [Capability::NetBindService, Capability::Chown]
            .into_iter()
            .find(|cap| cap.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which kernel capability set a flag operation targets.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CapFlag {
    /// Upper bound of what the process may raise.
    Permitted,
    /// What the kernel currently enforces.
    Effective,
}

impl fmt::Display for CapFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapFlag::Permitted => f.write_str("permitted"),
            CapFlag::Effective => f.write_str("effective"),
        }
    }
}
