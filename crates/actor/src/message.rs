//! Units of work queued on a mailbox.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::flow::{Routine, Step, Value};
use crate::ids::CallId;
use crate::mailbox::{Mailbox, Release, Slot, Worker};
use crate::method::Signature;
use crate::outcome::{Failure, Outcome};

/// Completes the caller's future with the erased outcome of a call.
pub(crate) type Reply = Box<dyn FnOnce(Outcome<Value>) + Send>;

pub(crate) enum Message {
	/// A fresh call from a handle.
	Call(Call),
	/// Resumption of a suspended call.
	Resume(Resume),
}

pub(crate) struct Call {
	pub id: CallId,
	/// Running call of the same actor that posted this one.
	pub origin: Option<CallId>,
	pub method: &'static str,
	pub signature: Signature,
	pub args: Value,
	pub reply: Reply,
}

pub(crate) struct Resume {
	pub call: CallId,
	/// Index of the worker that owns the suspended call.
	pub worker: usize,
	pub routine: Routine,
	pub reply: Reply,
}

impl Message {
	/// Returns true if `worker` can serve this message right now.
	///
	/// Pure probe: the mailbox may ask several workers before committing.
	pub fn resolves(&self, index: usize, worker: &Worker, slot: &Slot) -> bool {
		if slot.busy {
			return false;
		}
		match self {
			Self::Call(call) => {
				let admitted = match slot.held.last() {
					None => true,
					Some(held) => call.origin == Some(*held),
				};
				admitted && worker.offers(call.method, &call.signature)
			}
			Self::Resume(resume) => resume.worker == index && slot.held.last() == Some(&resume.call),
		}
	}

	/// Short label for diagnostics.
	pub fn label(&self) -> &'static str {
		match self {
			Self::Call(call) => call.method,
			Self::Resume(_) => "<resume>",
		}
	}

	/// Runs the message on worker `index`, which the mailbox marked busy for it.
	pub fn fire(self, mailbox: &Arc<Mailbox>, index: usize) {
		let worker = mailbox.worker(index);
		let (call, resumed, reply, step) = match self {
			Self::Call(Call { id, method, args, reply, .. }) => {
				let Some(entry) = worker.entry(method) else {
					unreachable!("call to `{method}` resolved on a worker without it")
				};
				tracing::trace!(actor = %mailbox.name(), worker = index, method, suspendable = entry.suspendable, "actor.call.fire");
				let step = worker.run(mailbox, id, |object: &mut dyn Any| entry.invoke(object, args));
				(id, false, reply, step)
			}
			Self::Resume(Resume { call, routine, reply, .. }) => {
				tracing::trace!(actor = %mailbox.name(), worker = index, "actor.call.resume");
				let step = worker.run(mailbox, call, routine);
				(call, true, reply, step)
			}
		};

		match step {
			Step::Done(outcome) => {
				deliver(mailbox, reply, outcome);
				mailbox.release(index, if resumed { Release::Finish(call) } else { Release::Keep });
			}
			Step::Suspend(suspension) => {
				mailbox.release(index, if resumed { Release::Keep } else { Release::Hold(call) });
				mailbox.arm(call, index, suspension, reply);
			}
		}
	}
}

/// Completes a reply; a panicking completion callback must not take the
/// worker down with it.
fn deliver(mailbox: &Mailbox, reply: Reply, outcome: Outcome<Value>) {
	if let Err(payload) = catch_unwind(AssertUnwindSafe(move || reply(outcome))) {
		let failure = Failure::panicked(&*payload);
		tracing::debug!(actor = %mailbox.name(), error = %failure, "actor.reply.panicked");
	}
}
