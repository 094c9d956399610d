//!
//! Capability policy and the pure translation of policy flags into the concrete
//! capabilities requested from the kernel.

use std::collections::BTreeSet;

use crate::error::ConfigError;
use crate::types::Capability;

/// Ordered set of capabilities to retain. Iteration order is `NetBindService`, `Chown`.
pub type CapabilitySet = BTreeSet<Capability>;

/// What the privilege controller is asked to keep after authentication.
///
/// Built once at startup; there are no setters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CapabilityPolicy {
    enabled: bool,
    retain_chown: bool,
}

impl Default for CapabilityPolicy {
    fn default() -> Self {
        Self { enabled: true, retain_chown: true }
    }
}

impl CapabilityPolicy {
    pub fn new(enabled: bool, retain_chown: bool) -> Self {
        Self { enabled, retain_chown }
    }

    /// Policy with the reduction engine switched off.
    pub fn disabled() -> Self {
        Self { enabled: false, retain_chown: true }
    }

    /// Parses `CapabilitiesSet` style arguments such as `["-CAP_CHOWN"]`.
    ///
    /// Every argument must start with `+` (retain) or `-` (drop). Only `CAP_CHOWN`
    /// is configurable; `CAP_NET_BIND_SERVICE` is always retained.
    ///
    /// # Errors
    /// * `ConfigError::MissingArgument` if `args` is empty.
    /// * `ConfigError::BadOption` if an argument has no `+`/`-` prefix.
    /// * `ConfigError::UnknownCapability` for anything other than `CAP_CHOWN`.
    pub fn from_directive<S: AsRef<str>>(enabled: bool, args: &[S]) -> Result<Self, ConfigError> {
        if args.is_empty() {
            return Err(ConfigError::MissingArgument);
        }

        let mut retain_chown = true;
        for arg in args {
            let arg = arg.as_ref();
            let (retain, name) = match arg.split_at_checked(1) {
                Some(("+", rest)) => (true, rest),
                Some(("-", rest)) => (false, rest),
                _ => return Err(ConfigError::BadOption(arg.to_string())),
            };

            match Capability::from_name(name) {
                Some(Capability::Chown) => {
                    if !retain {
                        retain_chown = false;
                    }
                }
                _ => return Err(ConfigError::UnknownCapability(name.to_string())),
            }
        }

        Ok(Self { enabled, retain_chown })
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn retain_chown(&self) -> bool {
        self.retain_chown
    }
}

/// Translates a policy into the capabilities to request.
///
/// Always includes `NetBindService`, which is needed to rebind privileged
/// listening ports once the process has left the root identity. Includes
/// `Chown` unless the policy drops it. No side effects.
pub fn build(policy: &CapabilityPolicy) -> CapabilitySet {
    let mut set = CapabilitySet::new();
    set.insert(Capability::NetBindService);
    if policy.retain_chown {
        set.insert(Capability::Chown);
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_default_retains_both() {
        let set = build(&CapabilityPolicy::default());
        assert_eq!(
            set.into_iter().collect::<Vec<_>>(),
            vec![Capability::NetBindService, Capability::Chown]
        );
    }

    #[test]
    fn test_build_without_chown() {
        let set = build(&CapabilityPolicy::new(true, false));
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![Capability::NetBindService]);
    }

    #[test]
    fn test_build_ignores_enabled_flag() {
        // The builder is a pure translation; whether to apply it is the controller's call.
        assert_eq!(build(&CapabilityPolicy::disabled()), build(&CapabilityPolicy::default()));
    }

    #[test]
    fn test_directive_drop_chown() {
        let policy = CapabilityPolicy::from_directive(true, &["-CAP_CHOWN"]).unwrap();
        assert!(!policy.retain_chown());
        assert!(policy.enabled());
    }

    #[test]
    fn test_directive_is_case_insensitive() {
        let policy = CapabilityPolicy::from_directive(true, &["+cap_chown"]).unwrap();
        assert!(policy.retain_chown());
    }

    #[test]
    fn test_directive_minus_wins_over_plus() {
        let policy = CapabilityPolicy::from_directive(true, &["+CAP_CHOWN", "-CAP_CHOWN"]).unwrap();
        assert!(!policy.retain_chown());
        let policy = CapabilityPolicy::from_directive(true, &["-CAP_CHOWN", "+CAP_CHOWN"]).unwrap();
        assert!(!policy.retain_chown());
    }

    #[test]
    fn test_directive_errors() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            CapabilityPolicy::from_directive(true, &empty),
            Err(ConfigError::MissingArgument)
        ));
        assert!(matches!(
            CapabilityPolicy::from_directive(true, &["CAP_CHOWN"]),
            Err(ConfigError::BadOption(opt)) if opt == "CAP_CHOWN"
        ));
        assert!(matches!(
            CapabilityPolicy::from_directive(true, &["+CAP_NET_BIND_SERVICE"]),
            Err(ConfigError::UnknownCapability(name)) if name == "CAP_NET_BIND_SERVICE"
        ));
        assert!(matches!(
            CapabilityPolicy::from_directive(true, &[""]),
            Err(ConfigError::BadOption(_))
        ));
    }
}
