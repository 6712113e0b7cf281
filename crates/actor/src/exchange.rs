//! Spawning actors over a shared executor.

use std::fmt;
use std::sync::Arc;

use crate::executor::Executor;
use crate::handle::Actor;
use crate::mailbox::{Mailbox, Worker};
use crate::method::Behavior;
use crate::registry::{ActorRegistry, ActorSnapshot};

/// Spawn-time actor configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorSpec {
	pub(crate) name: Option<String>,
}

impl ActorSpec {
	/// Creates a spec for an actor with an explicit name.
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: Some(name.into()) }
	}

	/// Sets the actor name used in errors, snapshots and traces.
	#[must_use]
	pub fn name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}
}

/// Factory for actors that share one executor.
///
/// ```ignore
/// let exchange = Exchange::new(TokioExecutor::current());
/// let sum = exchange.spawn(Sum { total: 0 });
/// let pool = exchange.spawn_pool((0..4).map(|_| Encoder::default()));
/// ```
#[derive(Clone)]
pub struct Exchange {
	executor: Arc<dyn Executor>,
	registry: ActorRegistry,
}

impl fmt::Debug for Exchange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Exchange").field("actors", &self.registry.len()).finish_non_exhaustive()
	}
}

impl Exchange {
	pub fn new<E>(executor: E) -> Self
	where
		E: Executor,
	{
		Self {
			executor: Arc::new(executor),
			registry: ActorRegistry::default(),
		}
	}

	/// Spawns an actor backed by a single object.
	pub fn spawn<B>(&self, object: B) -> Actor
	where
		B: Behavior,
	{
		self.actor(ActorSpec::default()).worker(object).spawn()
	}

	/// Spawns one actor backed by every object of `objects`.
	///
	/// # Panics
	///
	/// Panics if `objects` is empty.
	pub fn spawn_pool<B>(&self, objects: impl IntoIterator<Item = B>) -> Actor
	where
		B: Behavior,
	{
		self.actor(ActorSpec::default()).workers(objects).spawn()
	}

	/// Starts an actor whose backing objects may have different types.
	pub fn actor(&self, spec: ActorSpec) -> ActorBuilder<'_> {
		ActorBuilder {
			exchange: self,
			spec,
			workers: Vec::new(),
		}
	}

	/// Snapshots of every live actor, sorted by name.
	pub fn snapshots(&self) -> Vec<ActorSnapshot> {
		self.registry.snapshots()
	}
}

/// Collects the backing objects of one actor.
#[must_use = "an actor is only created by `spawn`"]
pub struct ActorBuilder<'a> {
	exchange: &'a Exchange,
	spec: ActorSpec,
	workers: Vec<Worker>,
}

impl ActorBuilder<'_> {
	pub fn worker<B>(mut self, object: B) -> Self
	where
		B: Behavior,
	{
		self.workers.push(Worker::new(object));
		self
	}

	pub fn workers<B>(mut self, objects: impl IntoIterator<Item = B>) -> Self
	where
		B: Behavior,
	{
		self.workers.extend(objects.into_iter().map(Worker::new));
		self
	}

	/// Creates the actor.
	///
	/// # Panics
	///
	/// Panics if no backing object was added.
	pub fn spawn(self) -> Actor {
		let mailbox = Mailbox::new(self.spec.name, Arc::clone(&self.exchange.executor), self.workers);
		self.exchange.registry.insert(&mailbox);
		Actor::new(mailbox)
	}
}

#[cfg(test)]
mod tests;
