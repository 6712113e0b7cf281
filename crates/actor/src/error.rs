//! Caller mistakes reported by actor handles.

use thiserror::Error;

/// A call the actor can never serve.
///
/// Returned synchronously by [`crate::Actor::call`]; distinct from the
/// [`crate::Failure`] a backing method raises.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
	/// No backing object registered the method.
	#[error("actor `{actor}` has no method `{method}`")]
	UnknownMethod {
		/// Actor name.
		actor: String,
		/// Requested method.
		method: String,
	},

	/// The method exists but not with the requested argument and result types.
	#[error("method `{method}` of actor `{actor}` does not take `{args}` and return `{ret}` (registered: {registered})")]
	Signature {
		/// Actor name.
		actor: String,
		/// Requested method.
		method: String,
		/// Requested argument type.
		args: &'static str,
		/// Requested result type.
		ret: &'static str,
		/// Registered signatures, comma separated.
		registered: String,
	},

	/// The actor behind a weak reference no longer exists.
	#[error("actor `{actor}` is gone")]
	Detached {
		/// Actor name.
		actor: String,
	},
}
