//! Tracks which call the current thread is executing.
//!
//! A call posted to an actor from inside one of that actor's own calls records
//! the running call as its origin, which lets a worker held by a suspended call
//! serve the calls that suspended call depends on.

use std::cell::Cell;

use crate::ids::{ActorId, CallId};

thread_local! {
	static CURRENT: Cell<Option<(ActorId, CallId)>> = const { Cell::new(None) };
}

/// Restores the previous scope when dropped.
pub(crate) struct ScopeGuard {
	previous: Option<(ActorId, CallId)>,
}

impl Drop for ScopeGuard {
	fn drop(&mut self) {
		CURRENT.set(self.previous);
	}
}

/// Marks `call` of `actor` as running on this thread.
pub(crate) fn enter(actor: ActorId, call: CallId) -> ScopeGuard {
	ScopeGuard {
		previous: CURRENT.replace(Some((actor, call))),
	}
}

/// Returns the call of `actor` running on this thread, if any.
pub(crate) fn origin(actor: ActorId) -> Option<CallId> {
	CURRENT.get().and_then(|(running, call)| (running == actor).then_some(call))
}
