//! Per-session glue: the post-authentication hook and the guard that keeps a
//! terminated session from reaching any further protected operation.

use uuid::Uuid;

use crate::access::{AccessRule, EvaluationContext};
use crate::error::SessionError;
use crate::privilege::{CapabilitySystem, IdentityProvider, PrivilegeController, PrivilegeState};
use crate::types::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    /// Ended after a fatal identity-switch failure. Terminal.
    Terminated,
}

/// One client session of the server process.
#[derive(Debug)]
pub struct Session<S: CapabilitySystem, I: IdentityProvider> {
    id: Uuid,
    controller: PrivilegeController<S, I>,
    status: SessionStatus,
}

impl<S, I> Session<S, I>
where
    S: CapabilitySystem,
    I: IdentityProvider,
{
    pub fn new(controller: PrivilegeController<S, I>) -> Self {
        Self { id: Uuid::new_v4(), controller, status: SessionStatus::Active }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn privilege_state(&self) -> PrivilegeState {
        self.controller.state()
    }

    pub fn controller(&self) -> &PrivilegeController<S, I> {
        &self.controller
    }

    /// Runs after authentication succeeded.
    ///
    /// The authentication event always proceeds: capability failures are only
    /// logged by the controller. A failed identity switch ends the session and
    /// is returned so the caller can tear the connection down.
    pub fn on_authenticated(&mut self, uid: UserId) -> Result<PrivilegeState, SessionError> {
        self.ensure_active()?;
        let span = tracing::info_span!("session", id = %self.id, uid = %uid);
        let _enter = span.enter();

        match self.controller.reduce_privileges(uid) {
            Ok(state) => {
                tracing::info!(?state, "post-authentication privilege reduction finished");
                Ok(state)
            }
            Err(e) if e.is_fatal() => {
                tracing::error!(error = %e, "terminating session");
                self.status = SessionStatus::Terminated;
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Runs `op` only while the session is still active.
    pub fn protected<T>(&self, op: impl FnOnce() -> T) -> Result<T, SessionError> {
        self.ensure_active()?;
        Ok(op())
    }

    /// Evaluates an access rule for a principal of this session.
    pub fn authorize(&self, rule: &AccessRule, ctx: &EvaluationContext) -> Result<bool, SessionError> {
        self.protected(|| rule.matches(ctx))
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        match self.status {
            SessionStatus::Active => Ok(()),
            SessionStatus::Terminated => Err(SessionError::Terminated),
        }
    }
}
