//! Write-once result slots shared between an actor call and its callers.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::outcome::{Failure, Outcome};

type Callback<T> = Box<dyn FnOnce(&Outcome<T>) + Send>;

struct State<T> {
	outcome: Option<Outcome<T>>,
	callbacks: Vec<Callback<T>>,
}

struct Shared<T> {
	state: Mutex<State<T>>,
	ready: Condvar,
}

/// Thread-safe slot receiving exactly one [`Outcome`].
///
/// Clones share the slot. Producers call [`Future::set`] once; consumers block
/// with [`Future::wait`], register [`Future::on_complete`] callbacks, or await
/// [`Future::wait_async`] from async code.
pub struct Future<T> {
	shared: Arc<Shared<T>>,
}

impl<T> Clone for Future<T> {
	fn clone(&self) -> Self {
		Self {
			shared: Arc::clone(&self.shared),
		}
	}
}

impl<T> fmt::Debug for Future<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.shared.state.lock();
		f.debug_struct("Future")
			.field("complete", &state.outcome.is_some())
			.field("callbacks", &state.callbacks.len())
			.finish()
	}
}

impl<T> Default for Future<T>
where
	T: Clone + Send + 'static,
{
	fn default() -> Self {
		Self::new()
	}
}

impl<T> Future<T>
where
	T: Clone + Send + 'static,
{
	/// Creates an empty future.
	pub fn new() -> Self {
		Self {
			shared: Arc::new(Shared {
				state: Mutex::new(State {
					outcome: None,
					callbacks: Vec::new(),
				}),
				ready: Condvar::new(),
			}),
		}
	}

	/// Creates a future already holding `outcome`.
	pub fn completed(outcome: Outcome<T>) -> Self {
		let future = Self::new();
		future.set(outcome);
		future
	}

	/// Completes the future, waking every waiter and then running queued
	/// callbacks on the calling thread.
	///
	/// # Panics
	///
	/// Panics if the future was already completed. A panicking callback does
	/// not stop the ones queued after it; the first panic is resumed once all
	/// of them have run.
	pub fn set(&self, outcome: Outcome<T>) {
		let delivered = outcome.clone();
		let callbacks = {
			let mut state = self.shared.state.lock();
			if state.outcome.is_some() {
				drop(state);
				panic!("future of {} completed twice", std::any::type_name::<T>());
			}
			state.outcome = Some(outcome);
			std::mem::take(&mut state.callbacks)
		};
		self.shared.ready.notify_all();
		let mut first_panic = None;
		for callback in callbacks {
			if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(&delivered))) {
				first_panic.get_or_insert(payload);
			}
		}
		if let Some(payload) = first_panic {
			resume_unwind(payload);
		}
	}

	/// Completes the future with a value.
	pub fn set_value(&self, value: T) {
		self.set(Outcome::Normal(value));
	}

	/// Completes the future with a failure.
	pub fn set_failure(&self, failure: Failure) {
		self.set(Outcome::Abrupt(failure));
	}

	/// Returns true once an outcome is present.
	pub fn is_complete(&self) -> bool {
		self.shared.state.lock().outcome.is_some()
	}

	/// Returns a copy of the outcome without blocking.
	pub fn outcome(&self) -> Option<Outcome<T>> {
		self.shared.state.lock().outcome.clone()
	}

	/// Blocks until the future completes and returns its outcome.
	pub fn wait_outcome(&self) -> Outcome<T> {
		let mut state = self.shared.state.lock();
		loop {
			if let Some(outcome) = &state.outcome {
				return outcome.clone();
			}
			self.shared.ready.wait(&mut state);
		}
	}

	/// Blocks until the future completes, then yields the value or failure.
	///
	/// Must not be called from an executor thread running actor work.
	pub fn wait(&self) -> Result<T, Failure> {
		self.wait_outcome().into_result()
	}

	/// Like [`Future::wait`] but gives up after `timeout`.
	pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T, Failure>> {
		let mut state = self.shared.state.lock();
		if state.outcome.is_none() {
			let _ = self.shared.ready.wait_while_for(&mut state, |state| state.outcome.is_none(), timeout);
		}
		state.outcome.as_ref().map(Outcome::yielded)
	}

	/// Runs `callback` once the future completes.
	///
	/// Runs immediately on the calling thread if an outcome is already present,
	/// otherwise on the thread that completes the future. Never runs while the
	/// future's lock is held.
	pub fn on_complete<F>(&self, callback: F)
	where
		F: FnOnce(&Outcome<T>) + Send + 'static,
	{
		let outcome = {
			let mut state = self.shared.state.lock();
			match &state.outcome {
				Some(outcome) => outcome.clone(),
				None => {
					state.callbacks.push(Box::new(callback));
					return;
				}
			}
		};
		callback(&outcome);
	}

	/// Awaits the outcome from async code without blocking a runtime thread.
	pub async fn wait_async(&self) -> Result<T, Failure> {
		let (tx, rx) = oneshot::channel();
		self.on_complete(move |outcome| {
			let _ = tx.send(outcome.clone());
		});
		match rx.await {
			Ok(outcome) => outcome.into_result(),
			Err(_) => Err(Failure::new(Abandoned)),
		}
	}
}

/// The completion callback registered by [`Future::wait_async`] was dropped
/// without running, so no outcome can arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("completion callback dropped without an outcome")]
pub struct Abandoned;

mod sealed {
	pub trait Sealed {}
}

/// Anything a suspendable method may wait on.
///
/// Sealed: only [`Future`] implements it.
pub trait Awaitable: sealed::Sealed + Send + 'static {
	/// Runs `notify` once the awaitable has an outcome.
	fn subscribe(&self, notify: Box<dyn FnOnce() + Send>);
}

impl<T> sealed::Sealed for Future<T> where T: Clone + Send + 'static {}

impl<T> Awaitable for Future<T>
where
	T: Clone + Send + 'static,
{
	fn subscribe(&self, notify: Box<dyn FnOnce() + Send>) {
		self.on_complete(move |_| notify());
	}
}
