//! Caller-facing actor handles.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::error::UsageError;
use crate::future::Future;
use crate::ids::ActorId;
use crate::mailbox::Mailbox;
use crate::registry::ActorSnapshot;

/// Shared handle to a running actor.
///
/// Clones address the same mailbox. Calls are resolved by name and checked
/// against the registered argument and result types before anything is queued.
#[derive(Clone)]
pub struct Actor {
	mailbox: Arc<Mailbox>,
}

impl fmt::Debug for Actor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Actor").field("id", &self.mailbox.id()).field("name", &self.mailbox.name()).finish()
	}
}

impl Actor {
	pub(crate) fn new(mailbox: Arc<Mailbox>) -> Self {
		Self { mailbox }
	}

	pub fn id(&self) -> ActorId {
		self.mailbox.id()
	}

	pub fn name(&self) -> &str {
		self.mailbox.name()
	}

	/// Calls `method` with `args` and returns the future of its result.
	///
	/// ```ignore
	/// let total: Future<i64> = actor.call("plus", 5_i64)?;
	/// assert_eq!(total.wait()?, 5);
	/// ```
	///
	/// # Errors
	///
	/// Returns [`UsageError`] if no backing object offers `method` taking `A`
	/// and returning `R`.
	pub fn call<A, R>(&self, method: &str, args: A) -> Result<Future<R>, UsageError>
	where
		A: Send + 'static,
		R: Clone + Send + 'static,
	{
		self.mailbox.call(method, args)
	}

	/// Sorted names of every method some backing object offers.
	pub fn methods(&self) -> Vec<&'static str> {
		self.mailbox.methods()
	}

	/// Number of backing objects.
	pub fn workers(&self) -> usize {
		self.mailbox.worker_count()
	}

	pub fn snapshot(&self) -> ActorSnapshot {
		self.mailbox.snapshot()
	}

	/// Returns a reference that does not keep the actor alive.
	pub fn downgrade(&self) -> ActorRef {
		ActorRef::new(Arc::downgrade(&self.mailbox), Arc::clone(self.mailbox.shared_name()))
	}
}

/// Weak actor handle, typically held by the actor's own backing objects.
#[derive(Clone)]
pub struct ActorRef {
	mailbox: Weak<Mailbox>,
	name: Arc<str>,
}

impl fmt::Debug for ActorRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ActorRef").field("name", &self.name).field("live", &(self.mailbox.strong_count() > 0)).finish()
	}
}

impl ActorRef {
	pub(crate) fn new(mailbox: Weak<Mailbox>, name: Arc<str>) -> Self {
		Self { mailbox, name }
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn upgrade(&self) -> Option<Actor> {
		self.mailbox.upgrade().map(Actor::new)
	}

	/// Calls `method` on the referenced actor.
	///
	/// # Errors
	///
	/// Returns [`UsageError::Detached`] once every [`Actor`] handle is gone, and
	/// the errors of [`Actor::call`] otherwise.
	pub fn call<A, R>(&self, method: &str, args: A) -> Result<Future<R>, UsageError>
	where
		A: Send + 'static,
		R: Clone + Send + 'static,
	{
		let actor = self.upgrade().ok_or_else(|| UsageError::Detached { actor: self.name.to_string() })?;
		actor.call(method, args)
	}
}
