//! Resumable results of suspendable methods.

use std::any::Any;
use std::error::Error;
use std::fmt;

use crate::future::{Awaitable, Future};
use crate::outcome::{Failure, Outcome};

/// Type-erased method arguments or return value.
pub(crate) type Value = Box<dyn Any + Send>;

/// Type-erased resumption of a suspended call, run against its backing object.
pub(crate) type Routine = Box<dyn FnOnce(&mut dyn Any) -> Step + Send>;

/// Type-erased result of one fire.
pub(crate) enum Step {
	Done(Outcome<Value>),
	Suspend(Suspension),
}

/// A suspended call: what it waits on and how it continues.
pub(crate) struct Suspension {
	pub(crate) awaited: Vec<Box<dyn Awaitable>>,
	pub(crate) routine: Routine,
}

/// What a suspendable method returns.
///
/// `S` is the backing object type and `R` the method's result type. A flow
/// either finishes the call or suspends it until one or more [`Future`]s
/// complete, after which the resumption routine runs against the same backing
/// object and produces the next flow.
///
/// While a call is suspended its worker serves nothing but the call's own
/// resumptions and the calls it addresses to its own actor.
pub enum Flow<S, R> {
	/// The call finished.
	Return(Result<R, Failure>),
	/// The call waits on other futures.
	Suspend(Suspend<S, R>),
}

/// Suspended state of a [`Flow`].
pub struct Suspend<S, R> {
	awaited: Vec<Box<dyn Awaitable>>,
	resume: Box<dyn FnOnce(&mut S) -> Flow<S, R> + Send>,
}

impl<S, R> fmt::Debug for Flow<S, R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Return(Ok(_)) => f.write_str("Flow::Return(Ok(..))"),
			Self::Return(Err(failure)) => write!(f, "Flow::Return(Err({failure}))"),
			Self::Suspend(suspend) => write!(f, "Flow::Suspend(awaiting {})", suspend.awaited.len()),
		}
	}
}

impl<S, R> Flow<S, R>
where
	S: 'static,
	R: Send + 'static,
{
	/// Finishes the call with a value.
	pub fn done(value: R) -> Self {
		Self::Return(Ok(value))
	}

	/// Finishes the call with a domain failure.
	pub fn fail<E>(error: E) -> Self
	where
		E: Error + Send + Sync + 'static,
	{
		Self::Return(Err(Failure::new(error)))
	}

	/// Suspends until `future` completes, then resumes with its outcome.
	pub fn await_outcome<T, F>(future: &Future<T>, then: F) -> Self
	where
		T: Clone + Send + 'static,
		F: FnOnce(&mut S, Outcome<T>) -> Flow<S, R> + Send + 'static,
	{
		let awaited = future.clone();
		Self::Suspend(Suspend {
			awaited: vec![Box::new(future.clone())],
			resume: Box::new(move |this| then(this, awaited.wait_outcome())),
		})
	}

	/// Suspends until `future` completes, then resumes with its value.
	///
	/// An abrupt outcome finishes the call with the same failure.
	pub fn await_value<T, F>(future: &Future<T>, then: F) -> Self
	where
		T: Clone + Send + 'static,
		F: FnOnce(&mut S, T) -> Flow<S, R> + Send + 'static,
	{
		Self::await_outcome(future, move |this, outcome| match outcome {
			Outcome::Normal(value) => then(this, value),
			Outcome::Abrupt(failure) => Flow::Return(Err(failure)),
		})
	}

	/// Suspends until every future completes, then resumes with their outcomes
	/// in the given order.
	pub fn await_all<T, F>(futures: Vec<Future<T>>, then: F) -> Self
	where
		T: Clone + Send + 'static,
		F: FnOnce(&mut S, Vec<Outcome<T>>) -> Flow<S, R> + Send + 'static,
	{
		let awaited = futures.iter().map(|future| Box::new(future.clone()) as Box<dyn Awaitable>).collect();
		Self::Suspend(Suspend {
			awaited,
			resume: Box::new(move |this| {
				let outcomes = futures.iter().map(Future::wait_outcome).collect();
				then(this, outcomes)
			}),
		})
	}

	/// Returns true if the flow waits on other futures.
	pub fn is_suspended(&self) -> bool {
		matches!(self, Self::Suspend(_))
	}

	pub(crate) fn into_step(self) -> Step {
		match self {
			Self::Return(result) => Step::Done(Outcome::from(result).map(|value| Box::new(value) as Value)),
			Self::Suspend(Suspend { awaited, resume }) => Step::Suspend(Suspension {
				awaited,
				routine: Box::new(move |object: &mut dyn Any| {
					let Some(this) = object.downcast_mut::<S>() else {
						unreachable!("continuation routed to a worker of another type")
					};
					resume(this).into_step()
				}),
			}),
		}
	}
}

impl<S, R> From<Result<R, Failure>> for Flow<S, R> {
	fn from(result: Result<R, Failure>) -> Self {
		Self::Return(result)
	}
}
