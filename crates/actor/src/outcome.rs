use std::any::Any;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Final result of one actor call.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
	/// The call returned a value.
	Normal(T),
	/// The call failed.
	Abrupt(Failure),
}

impl<T> Outcome<T> {
	/// Returns the value, or the failure as `Err`.
	pub fn into_result(self) -> Result<T, Failure> {
		match self {
			Self::Normal(value) => Ok(value),
			Self::Abrupt(failure) => Err(failure),
		}
	}

	/// Yields a copy of the content without consuming the outcome.
	pub fn yielded(&self) -> Result<T, Failure>
	where
		T: Clone,
	{
		self.clone().into_result()
	}

	pub fn is_normal(&self) -> bool {
		matches!(self, Self::Normal(_))
	}

	pub fn is_abrupt(&self) -> bool {
		matches!(self, Self::Abrupt(_))
	}

	/// Returns the failure of an abrupt outcome.
	pub fn failure(&self) -> Option<&Failure> {
		match self {
			Self::Normal(_) => None,
			Self::Abrupt(failure) => Some(failure),
		}
	}

	/// Maps the normal value, leaving failures untouched.
	pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
		match self {
			Self::Normal(value) => Outcome::Normal(f(value)),
			Self::Abrupt(failure) => Outcome::Abrupt(failure),
		}
	}
}

impl<T> From<Result<T, Failure>> for Outcome<T> {
	fn from(result: Result<T, Failure>) -> Self {
		match result {
			Ok(value) => Self::Normal(value),
			Err(failure) => Self::Abrupt(failure),
		}
	}
}

/// Domain failure raised by a backing method.
///
/// The original error value is kept behind a shared pointer: every clone of a
/// failure refers to the same allocation, and [`Failure::downcast_ref`]
/// recovers the concrete error type the method returned.
#[derive(Clone)]
pub struct Failure {
	error: Arc<dyn Error + Send + Sync + 'static>,
}

impl Failure {
	/// Wraps a domain error.
	///
	/// Passing a `Failure` returns it unchanged.
	pub fn new<E>(error: E) -> Self
	where
		E: Error + Send + Sync + 'static,
	{
		let error: Arc<dyn Error + Send + Sync + 'static> = Arc::new(error);
		match error.downcast_ref::<Failure>() {
			Some(failure) => failure.clone(),
			None => Self { error },
		}
	}

	/// Builds a failure from a caught panic payload.
	pub(crate) fn panicked(payload: &(dyn Any + Send)) -> Self {
		Self::new(Panicked {
			message: panic_message(payload).unwrap_or_else(|| "non-string panic payload".to_string()),
		})
	}

	/// Returns the original error if it has type `E`.
	pub fn downcast_ref<E>(&self) -> Option<&E>
	where
		E: Error + 'static,
	{
		self.error.downcast_ref::<E>()
	}

	/// Returns true if the original error has type `E`.
	pub fn is<E>(&self) -> bool
	where
		E: Error + 'static,
	{
		self.error.is::<E>()
	}

	/// Returns true if both failures carry the very same error instance.
	pub fn ptr_eq(&self, other: &Failure) -> bool {
		Arc::ptr_eq(&self.error, &other.error)
	}

	/// Returns the original error as a trait object.
	pub fn error(&self) -> &(dyn Error + Send + Sync + 'static) {
		&*self.error
	}
}

impl fmt::Debug for Failure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&*self.error, f)
	}
}

impl fmt::Display for Failure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&*self.error, f)
	}
}

impl Error for Failure {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		self.error.source()
	}
}

/// Failure recorded when a backing method or resumption routine panics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("actor method panicked: {message}")]
pub struct Panicked {
	message: String,
}

impl Panicked {
	pub fn message(&self) -> &str {
		&self.message
	}
}

/// Extracts the message of a `&'static str` or `String` panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> Option<String> {
	if let Some(s) = payload.downcast_ref::<&'static str>() {
		return Some((*s).to_string());
	}
	payload.downcast_ref::<String>().cloned()
}
