//! Executors that run actor work on pool threads.
//!
//! A mailbox submits one unit of [`Work`] per message it dispatches. Units may
//! run on any thread and in any order; the mailbox alone guarantees that a
//! backing object never runs two messages at once.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};

/// One unit of actor work.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Shared pool that runs submitted work.
pub trait Executor: Send + Sync + 'static {
	/// Runs `work` at some later point, on some pool thread.
	fn submit(&self, work: Work);
}

impl<E> Executor for Arc<E>
where
	E: Executor + ?Sized,
{
	fn submit(&self, work: Work) {
		(**self).submit(work);
	}
}

fn runtime_handle() -> Handle {
	if let Ok(handle) = Handle::try_current() {
		return handle;
	}

	static GLOBAL_RT: OnceLock<Runtime> = OnceLock::new();
	let runtime = GLOBAL_RT.get_or_init(|| {
		Builder::new_multi_thread()
			.worker_threads(1)
			.thread_name("courier-global")
			.build()
			.expect("failed to build courier global tokio runtime")
	});
	runtime.handle().clone()
}

/// Sizing of a dedicated executor pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSpec {
	threads: usize,
	thread_name: String,
}

impl Default for PoolSpec {
	fn default() -> Self {
		Self {
			threads: std::thread::available_parallelism().map_or(4, usize::from),
			thread_name: "courier-pool".to_string(),
		}
	}
}

impl PoolSpec {
	/// Sets the maximum number of threads running actor work at once.
	///
	/// # Panics
	///
	/// Panics if `threads` is zero.
	#[must_use]
	pub fn threads(mut self, threads: usize) -> Self {
		assert!(threads > 0, "pool needs at least one thread");
		self.threads = threads;
		self
	}

	#[must_use]
	pub fn thread_name(mut self, name: impl Into<String>) -> Self {
		self.thread_name = name.into();
		self
	}

	pub fn thread_count(&self) -> usize {
		self.threads
	}
}

/// Owned runtime that shuts down without blocking.
///
/// The last handle to a pool may be dropped on one of the pool's own threads,
/// where a blocking shutdown would wait on itself.
struct OwnedRuntime(Option<Runtime>);

impl Drop for OwnedRuntime {
	fn drop(&mut self) {
		if let Some(runtime) = self.0.take() {
			runtime.shutdown_background();
		}
	}
}

/// Executor backed by the blocking pool of a tokio runtime.
#[derive(Clone)]
pub struct TokioExecutor {
	handle: Handle,
	runtime: Option<Arc<OwnedRuntime>>,
}

impl fmt::Debug for TokioExecutor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TokioExecutor").field("dedicated", &self.runtime.is_some()).finish()
	}
}

impl TokioExecutor {
	/// Uses the ambient runtime, or a lazily built global one outside any runtime.
	pub fn current() -> Self {
		Self::from_handle(runtime_handle())
	}

	pub fn from_handle(handle: Handle) -> Self {
		Self { handle, runtime: None }
	}

	/// Builds a dedicated runtime whose blocking pool is capped at
	/// `spec.threads` threads.
	pub fn new(spec: PoolSpec) -> std::io::Result<Self> {
		let runtime = Builder::new_multi_thread()
			.worker_threads(1)
			.max_blocking_threads(spec.threads)
			.thread_name(spec.thread_name.clone())
			.build()?;
		tracing::trace!(threads = spec.threads, name = %spec.thread_name, "actor.executor.pool");
		Ok(Self {
			handle: runtime.handle().clone(),
			runtime: Some(Arc::new(OwnedRuntime(Some(runtime)))),
		})
	}
}

impl Executor for TokioExecutor {
	fn submit(&self, work: Work) {
		drop(self.handle.spawn_blocking(work));
	}
}

/// Executor that runs work only when told to, for deterministic tests and
/// single-threaded embedding.
#[derive(Clone, Default)]
pub struct ManualExecutor {
	queue: Arc<Mutex<VecDeque<Work>>>,
}

impl fmt::Debug for ManualExecutor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ManualExecutor").field("pending", &self.pending()).finish()
	}
}

impl ManualExecutor {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of submitted units not yet run.
	pub fn pending(&self) -> usize {
		self.queue.lock().len()
	}

	/// Runs the oldest unit. Returns false if none was pending.
	pub fn run_next(&self) -> bool {
		self.run_at(0)
	}

	/// Runs the unit at `index` in submission order. Returns false if there is
	/// no such unit.
	pub fn run_at(&self, index: usize) -> bool {
		let work = self.queue.lock().remove(index);
		match work {
			Some(work) => {
				work();
				true
			}
			None => false,
		}
	}

	/// Runs units in submission order until none is left, including units
	/// submitted along the way. Returns how many ran.
	pub fn run_until_idle(&self) -> usize {
		let mut ran = 0;
		while self.run_next() {
			ran += 1;
		}
		ran
	}
}

impl Executor for ManualExecutor {
	fn submit(&self, work: Work) {
		self.queue.lock().push_back(work);
	}
}
