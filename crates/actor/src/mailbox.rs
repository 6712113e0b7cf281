//! Per-actor message queue and worker dispatch.
//!
//! Every actor owns one mailbox and one or more workers, each worker wrapping
//! a single backing object. A worker runs at most one message at a time. A
//! message that no worker can take right now waits in the queue until a
//! worker completing its current message picks it up.

use std::any::{Any, type_name};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::error::UsageError;
use crate::executor::Executor;
use crate::flow::{Step, Suspension, Value};
use crate::future::Future;
use crate::handle::ActorRef;
use crate::ids::{ActorId, CallClock, CallId};
use crate::message::{Call, Message, Reply, Resume};
use crate::method::{Backing, Behavior, MethodEntry, MethodTable, Methods, Signature};
use crate::outcome::{Failure, Outcome};
use crate::registry::ActorSnapshot;
use crate::scope;

/// One backing object with its capability table.
pub(crate) struct Worker {
	object: Mutex<Box<dyn Backing>>,
	methods: MethodTable,
	type_name: &'static str,
}

impl Worker {
	pub fn new<B>(object: B) -> Self
	where
		B: Behavior,
	{
		Self {
			object: Mutex::new(Box::new(object)),
			methods: Methods::<B>::collect(),
			type_name: type_name::<B>(),
		}
	}

	/// Returns true if the backing object registered `method` with `signature`.
	pub fn offers(&self, method: &str, signature: &Signature) -> bool {
		self.methods.get(method).is_some_and(|entry| entry.signature.matches(signature))
	}

	pub fn entry(&self, method: &str) -> Option<&MethodEntry> {
		self.methods.get(method)
	}

	/// Type name without its module path.
	pub fn short_type_name(&self) -> &'static str {
		let base = self.type_name.split('<').next().unwrap_or(self.type_name);
		base.rsplit("::").next().unwrap_or(base)
	}

	/// Runs `body` against the backing object inside the call's scope.
	///
	/// A panic becomes an abrupt outcome; the object lock is released before
	/// the caller sees the step.
	pub fn run(&self, mailbox: &Mailbox, call: CallId, body: impl FnOnce(&mut dyn Any) -> Step) -> Step {
		let mut object = self.object.lock();
		let _scope = scope::enter(mailbox.id, call);
		match catch_unwind(AssertUnwindSafe(|| body(object.as_any_mut()))) {
			Ok(step) => step,
			Err(payload) => {
				let failure = Failure::panicked(&*payload);
				tracing::debug!(actor = %mailbox.name, error = %failure, "actor.call.panicked");
				Step::Done(Outcome::Abrupt(failure))
			}
		}
	}
}

/// Dispatch state of one worker.
#[derive(Debug, Default)]
pub(crate) struct Slot {
	/// A message is running on the worker.
	pub busy: bool,
	/// Suspended calls holding the worker, innermost last.
	pub held: Vec<CallId>,
}

/// How a finished fire changes the worker's held calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Release {
	Keep,
	/// A fresh call suspended.
	Hold(CallId),
	/// A resumed call finished.
	Finish(CallId),
}

struct MailboxState {
	queue: VecDeque<Message>,
	slots: Vec<Slot>,
}

/// Queue and workers of one actor.
pub(crate) struct Mailbox {
	id: ActorId,
	name: Arc<str>,
	calls: CallClock,
	executor: Arc<dyn Executor>,
	workers: Vec<Worker>,
	state: Mutex<MailboxState>,
}

impl fmt::Debug for Mailbox {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Mailbox")
			.field("id", &self.id)
			.field("name", &self.name)
			.field("workers", &self.workers.len())
			.finish_non_exhaustive()
	}
}

impl Mailbox {
	/// Creates the mailbox and attaches every backing object to it.
	///
	/// Without an explicit name the actor is named after its first backing
	/// type, e.g. `SumActor` for `Sum`.
	pub fn new(name: Option<String>, executor: Arc<dyn Executor>, workers: Vec<Worker>) -> Arc<Self> {
		assert!(!workers.is_empty(), "actor needs at least one backing object");
		let name: Arc<str> = match name {
			Some(name) => name.into(),
			None => format!("{}Actor", workers[0].short_type_name()).into(),
		};
		let slots = workers.iter().map(|_| Slot::default()).collect();
		let mailbox = Arc::new(Self {
			id: ActorId::next(),
			name,
			calls: CallClock::new(),
			executor,
			workers,
			state: Mutex::new(MailboxState {
				queue: VecDeque::new(),
				slots,
			}),
		});
		for worker in &mailbox.workers {
			worker.object.lock().attach(ActorRef::new(Arc::downgrade(&mailbox), Arc::clone(&mailbox.name)));
		}
		tracing::trace!(actor = %mailbox.name, id = mailbox.id.get(), workers = mailbox.workers.len(), "actor.spawn");
		mailbox
	}

	pub fn id(&self) -> ActorId {
		self.id
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn shared_name(&self) -> &Arc<str> {
		&self.name
	}

	pub fn worker(&self, index: usize) -> &Worker {
		&self.workers[index]
	}

	pub fn worker_count(&self) -> usize {
		self.workers.len()
	}

	/// Sorted union of every worker's method names.
	pub fn methods(&self) -> Vec<&'static str> {
		let mut names: Vec<_> = self.workers.iter().flat_map(|worker| worker.methods.keys().copied()).collect();
		names.sort_unstable();
		names.dedup();
		names
	}

	/// Posts a call and returns the future of its result.
	pub fn call<A, R>(self: &Arc<Self>, method: &str, args: A) -> Result<Future<R>, UsageError>
	where
		A: Send + 'static,
		R: Clone + Send + 'static,
	{
		let signature = Signature::of::<A, R>();
		let method = self.lookup(method, &signature)?;
		let future = Future::new();
		let call = Call {
			id: self.calls.next(),
			origin: scope::origin(self.id),
			method,
			signature,
			args: Box::new(args),
			reply: reply_into(future.clone(), signature),
		};
		self.enqueue(Message::Call(call));
		Ok(future)
	}

	/// Finds the registered name of a method some worker offers with `signature`.
	fn lookup(&self, method: &str, signature: &Signature) -> Result<&'static str, UsageError> {
		let mut registered = Vec::new();
		for worker in &self.workers {
			if let Some((name, entry)) = worker.methods.get_key_value(method) {
				if entry.signature.matches(signature) {
					return Ok(*name);
				}
				registered.push(entry.signature.to_string());
			}
		}
		if registered.is_empty() {
			return Err(UsageError::UnknownMethod {
				actor: self.name.to_string(),
				method: method.to_string(),
			});
		}
		registered.sort_unstable();
		registered.dedup();
		Err(UsageError::Signature {
			actor: self.name.to_string(),
			method: method.to_string(),
			args: signature.args_name(),
			ret: signature.ret_name(),
			registered: registered.join(", "),
		})
	}

	/// Hands `message` to the first worker that can serve it, or queues it.
	pub fn enqueue(self: &Arc<Self>, message: Message) {
		let index = {
			let mut state = self.state.lock();
			let found = (0..self.workers.len()).find(|&index| message.resolves(index, &self.workers[index], &state.slots[index]));
			match found {
				Some(index) => {
					state.slots[index].busy = true;
					index
				}
				None => {
					tracing::trace!(actor = %self.name, message = message.label(), queued = state.queue.len() + 1, "actor.mailbox.queued");
					state.queue.push_back(message);
					return;
				}
			}
		};
		self.submit(index, message);
	}

	/// Frees worker `index` after a fire and hands it the first queued message
	/// it can serve.
	pub fn release(self: &Arc<Self>, index: usize, change: Release) {
		let next = {
			let mut state = self.state.lock();
			let MailboxState { queue, slots } = &mut *state;
			let slot = &mut slots[index];
			match change {
				Release::Keep => {}
				Release::Hold(call) => slot.held.push(call),
				Release::Finish(call) => {
					let finished = slot.held.pop();
					debug_assert_eq!(finished, Some(call), "resumed call was not the innermost hold");
				}
			}
			slot.busy = false;

			let worker = &self.workers[index];
			let position = queue.iter().position(|message| message.resolves(index, worker, slot));
			let next = position.and_then(|position| queue.remove(position));
			if next.is_some() {
				slot.busy = true;
			}
			next
		};
		if let Some(message) = next {
			self.submit(index, message);
		}
	}

	/// Waits for a suspension's futures, then queues its resumption.
	pub fn arm(self: &Arc<Self>, call: CallId, worker: usize, suspension: Suspension, reply: Reply) {
		let Suspension { awaited, routine } = suspension;
		tracing::trace!(actor = %self.name, worker, awaited = awaited.len(), "actor.call.suspend");
		let resume = Resume {
			call,
			worker,
			routine,
			reply,
		};
		if awaited.is_empty() {
			self.enqueue(Message::Resume(resume));
			return;
		}

		let pending = Arc::new(Mutex::new(Some(resume)));
		let remaining = Arc::new(AtomicUsize::new(awaited.len()));
		for awaitable in awaited {
			let mailbox = Arc::clone(self);
			let pending = Arc::clone(&pending);
			let remaining = Arc::clone(&remaining);
			awaitable.subscribe(Box::new(move || {
				if remaining.fetch_sub(1, Ordering::AcqRel) != 1 {
					return;
				}
				let resume = pending.lock().take();
				if let Some(resume) = resume {
					mailbox.enqueue(Message::Resume(resume));
				}
			}));
		}
	}

	fn submit(self: &Arc<Self>, index: usize, message: Message) {
		tracing::trace!(actor = %self.name, worker = index, message = message.label(), "actor.mailbox.dispatch");
		let mailbox = Arc::clone(self);
		self.executor.submit(Box::new(move || message.fire(&mailbox, index)));
	}

	pub fn snapshot(&self) -> ActorSnapshot {
		let state = self.state.lock();
		ActorSnapshot {
			id: self.id,
			name: self.name.to_string(),
			workers: self.workers.len(),
			busy: state.slots.iter().filter(|slot| slot.busy).count(),
			suspended: state.slots.iter().map(|slot| slot.held.len()).sum(),
			pending: state.queue.len(),
		}
	}
}

/// Builds the reply that completes `future` with a call's erased outcome.
fn reply_into<R>(future: Future<R>, signature: Signature) -> Reply
where
	R: Clone + Send + 'static,
{
	Box::new(move |outcome: Outcome<Value>| {
		let outcome = match outcome {
			Outcome::Normal(value) => match value.downcast::<R>() {
				Ok(value) => Outcome::Normal(*value),
				Err(_) => Outcome::Abrupt(Failure::new(ResultTypeMismatch { signature: signature.to_string() })),
			},
			Outcome::Abrupt(failure) => Outcome::Abrupt(failure),
		};
		future.set(outcome);
	})
}

/// A method produced a value of another type than its registered result.
#[derive(Debug, thiserror::Error)]
#[error("method result does not match its signature {signature}")]
struct ResultTypeMismatch {
	signature: String,
}
