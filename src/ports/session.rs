//! SessionPool trait - capability to hand out HSM sessions

use std::ops::Deref;

use tracing::debug;

use crate::error::EddsaResult;
use crate::model::SlotId;
use crate::ports::HsmSession;

/// Operation class a session is requested for
///
/// Pools use it to pick a token whose mechanisms cover the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// EdDSA key generation, signing and verification
    Eddsa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRequest {
    pub operation: Operation,
    pub read_write: bool,
    pub login: bool,
    pub slot: SlotId,
}

impl SessionRequest {
    /// Read-write EdDSA session on `slot`
    pub fn eddsa(slot: SlotId, login: bool) -> Self {
        Self {
            operation: Operation::Eddsa,
            read_write: true,
            login,
            slot,
        }
    }
}

/// Capability to acquire and release HSM sessions
///
/// The pool decides how sessions are cached, shared or logged in. The core
/// holds every session it acquires through `ScopedSession`, so each one is
/// released exactly once, on every exit path.
pub trait SessionPool {
    type Session: HsmSession;

    /// Slot chosen by the best-available-token policy for `operation`
    ///
    /// # Errors
    ///
    /// Returns `EddsaError::SessionUnavailable` when no token supports it
    fn best_slot(&self, operation: Operation) -> EddsaResult<SlotId>;

    /// Slot holding the token with the given label
    ///
    /// # Errors
    ///
    /// Returns `EddsaError::NotFound` when no token carries the label
    fn slot_for_token(&self, token_label: &str) -> EddsaResult<SlotId>;

    /// Open (or borrow) a session
    ///
    /// # Errors
    ///
    /// Returns `EddsaError::SessionUnavailable` if no session can be had
    fn acquire(&self, request: &SessionRequest) -> EddsaResult<Self::Session>;

    /// Hand a session back; it is not used again by the caller
    fn release(&self, session: &mut Self::Session);
}

/// A session released back to its pool when dropped
pub struct ScopedSession<'p, P: SessionPool + ?Sized> {
    pool: &'p P,
    session: P::Session,
}

impl<'p, P: SessionPool + ?Sized> ScopedSession<'p, P> {
    pub fn acquire(pool: &'p P, request: &SessionRequest) -> EddsaResult<Self> {
        let session = pool.acquire(request)?;
        debug!(
            "Acquired {:?} session on {} (rw={}, login={})",
            request.operation, request.slot, request.read_write, request.login
        );
        Ok(Self { pool, session })
    }
}

impl<P: SessionPool + ?Sized> Deref for ScopedSession<'_, P> {
    type Target = P::Session;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl<P: SessionPool + ?Sized> Drop for ScopedSession<'_, P> {
    fn drop(&mut self) {
        debug!("Releasing session on {}", self.session.slot());
        self.pool.release(&mut self.session);
    }
}
