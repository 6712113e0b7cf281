use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identifier of one spawned actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActorId(u64);

impl ActorId {
	/// Allocates the next actor id.
	pub(crate) fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(0);
		Self(NEXT.fetch_add(1, Ordering::Relaxed).wrapping_add(1))
	}

	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for ActorId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "actor#{}", self.0)
	}
}

/// Identifier of one logical call, unique within its mailbox.
///
/// A suspended call keeps its id across every resumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CallId(u64);

/// Monotonic call id clock, shared by clones.
#[derive(Debug, Default, Clone)]
pub(crate) struct CallClock {
	next: Arc<AtomicU64>,
}

impl CallClock {
	/// Creates a new clock starting at call 1.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the next call id.
	pub fn next(&self) -> CallId {
		CallId(self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1))
	}
}
