use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use crate::ids::ActorId;
use crate::mailbox::Mailbox;

/// Point-in-time dispatch state of one actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorSnapshot {
	pub id: ActorId,
	pub name: String,
	/// Backing objects.
	pub workers: usize,
	/// Workers running a message.
	pub busy: usize,
	/// Suspended calls holding a worker.
	pub suspended: usize,
	/// Queued messages no worker can take yet.
	pub pending: usize,
}

/// Actors spawned through one exchange, for status snapshots.
///
/// Entries are weak: dropping every handle to an actor removes it on the next
/// spawn or snapshot.
#[derive(Debug, Default, Clone)]
pub(crate) struct ActorRegistry {
	inner: Arc<RwLock<HashMap<ActorId, Weak<Mailbox>>>>,
}

impl ActorRegistry {
	pub fn insert(&self, mailbox: &Arc<Mailbox>) {
		if let Ok(mut guard) = self.inner.write() {
			guard.retain(|_, mailbox| mailbox.strong_count() > 0);
			guard.insert(mailbox.id(), Arc::downgrade(mailbox));
		}
	}

	/// Returns snapshots of live actors sorted by name, then id.
	pub fn snapshots(&self) -> Vec<ActorSnapshot> {
		let Ok(mut guard) = self.inner.write() else {
			return Vec::new();
		};
		guard.retain(|_, mailbox| mailbox.strong_count() > 0);
		let live: Vec<_> = guard.values().filter_map(Weak::upgrade).collect();
		drop(guard);

		let mut records: Vec<_> = live.iter().map(|mailbox| mailbox.snapshot()).collect();
		records.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
		records
	}

	pub fn len(&self) -> usize {
		self.inner.read().map_or(0, |guard| guard.values().filter(|mailbox| mailbox.strong_count() > 0).count())
	}
}
