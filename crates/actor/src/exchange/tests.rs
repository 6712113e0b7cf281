use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use proptest::prelude::*;
use thiserror::Error;

use super::*;
use crate::error::UsageError;
use crate::executor::{ManualExecutor, PoolSpec, TokioExecutor};
use crate::flow::Flow;
use crate::future::Future;
use crate::handle::ActorRef;
use crate::method::Methods;
use crate::outcome::Failure;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("sum would overflow")]
struct Overflow;

struct Sum {
	total: i64,
}

impl Behavior for Sum {
	fn methods(methods: &mut Methods<Self>) {
		methods
			.method("plus", |this: &mut Sum, x: i64| {
				this.total += x;
				this.total
			})
			.method("total", |this: &mut Sum, (): ()| this.total)
			.fallible("checked_plus", |this: &mut Sum, x: i64| {
				this.total = this.total.checked_add(x).ok_or(Overflow)?;
				Ok::<_, Overflow>(this.total)
			});
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("network offline")]
struct Offline;

struct Network;

impl Behavior for Network {
	fn methods(methods: &mut Methods<Self>) {
		methods
			.method("download", |_: &mut Network, url: String| format!("{url}{url}"))
			.fallible("download_offline", |_: &mut Network, _: String| Err::<String, _>(Offline));
	}
}

/// Encodes whatever its network downloads.
struct Encoder {
	network: Actor,
}

impl Behavior for Encoder {
	fn methods(methods: &mut Methods<Self>) {
		methods
			.suspendable("encoded", |this: &mut Encoder, (): ()| this.fetch("download", "bar"))
			.suspendable("encoded_via", |this: &mut Encoder, method: String| this.fetch(&method, "bar"));
	}
}

impl Encoder {
	fn fetch(&self, method: &str, url: &str) -> Flow<Encoder, String> {
		let page: Future<String> = match self.network.call(method, url.to_string()) {
			Ok(page) => page,
			Err(error) => return Flow::fail(error),
		};
		Flow::await_value(&page, |_: &mut Encoder, page: String| Flow::done(format!("{page}baz")))
	}
}

/// Reports one more than another actor's total.
struct Relay {
	source: Actor,
}

impl Behavior for Relay {
	fn methods(methods: &mut Methods<Self>) {
		methods
			.suspendable("next", |this: &mut Relay, (): ()| match this.source.call::<(), i64>("total", ()) {
				Ok(total) => Flow::await_value(&total, |_: &mut Relay, total: i64| Flow::done(total + 1)),
				Err(error) => Flow::fail(error),
			})
			.method("ping", |_: &mut Relay, (): ()| 'p');
	}
}

/// Calls itself through its own actor while suspended.
#[derive(Default)]
struct Hmm {
	actor: Option<ActorRef>,
	depth: u32,
}

impl Behavior for Hmm {
	fn methods(methods: &mut Methods<Self>) {
		methods
			.method("hmmm", |this: &mut Hmm, (): ()| 100_i64 + i64::from(this.depth))
			.suspendable("hmm", |this: &mut Hmm, (): ()| {
				let Some(actor) = this.actor.as_ref() else {
					return Flow::fail(UsageError::Detached { actor: "Hmm".to_string() });
				};
				match actor.call::<(), i64>("hmmm", ()) {
					Ok(inner) => Flow::await_value(&inner, |_: &mut Hmm, value: i64| Flow::done(value)),
					Err(error) => Flow::fail(error),
				}
			})
			.suspendable("deeper", |this: &mut Hmm, levels: u32| {
				if levels == 0 {
					return Flow::done(i64::from(this.depth));
				}
				this.depth += 1;
				let nested = match this.actor.as_ref().map(|actor| actor.call::<u32, i64>("deeper", levels - 1)) {
					Some(Ok(nested)) => nested,
					Some(Err(error)) => return Flow::fail(error),
					None => return Flow::fail(UsageError::Detached { actor: "Hmm".to_string() }),
				};
				Flow::await_value(&nested, |this: &mut Hmm, value: i64| {
					this.depth -= 1;
					Flow::done(value)
				})
			});
	}

	fn attach(&mut self, actor: ActorRef) {
		self.actor = Some(actor);
	}
}

struct Tag {
	id: usize,
}

impl Behavior for Tag {
	fn methods(methods: &mut Methods<Self>) {
		methods.method("tag", |this: &mut Tag, (): ()| this.id);
	}
}

struct TypeA;
struct TypeB;
struct TypeC;

impl Behavior for TypeA {
	fn methods(methods: &mut Methods<Self>) {
		methods.method("typea", |_: &mut TypeA, (): ()| 'a').method("any", |_: &mut TypeA, (): ()| 'a');
	}
}

impl Behavior for TypeB {
	fn methods(methods: &mut Methods<Self>) {
		methods.method("typeb", |_: &mut TypeB, (): ()| 'b').method("any", |_: &mut TypeB, (): ()| 'b');
	}
}

impl Behavior for TypeC {
	fn methods(methods: &mut Methods<Self>) {
		methods.method("typec", |_: &mut TypeC, (): ()| 'c');
	}
}

/// Records overlapping entries into the same object.
struct Guarded {
	inside: Arc<AtomicBool>,
	overlaps: Arc<AtomicUsize>,
	running: Arc<AtomicUsize>,
	peak: Arc<AtomicUsize>,
}

impl Behavior for Guarded {
	fn methods(methods: &mut Methods<Self>) {
		methods.method("enter", |this: &mut Guarded, (): ()| {
			if this.inside.swap(true, Ordering::SeqCst) {
				this.overlaps.fetch_add(1, Ordering::SeqCst);
			}
			let now = this.running.fetch_add(1, Ordering::SeqCst) + 1;
			this.peak.fetch_max(now, Ordering::SeqCst);
			std::thread::sleep(Duration::from_millis(1));
			this.running.fetch_sub(1, Ordering::SeqCst);
			this.inside.store(false, Ordering::SeqCst);
		});
	}
}

fn manual() -> (ManualExecutor, Exchange) {
	let executor = ManualExecutor::new();
	let exchange = Exchange::new(executor.clone());
	(executor, exchange)
}

#[test]
fn plus_accumulates_on_one_object() {
	let (executor, exchange) = manual();
	let sum = exchange.spawn(Sum { total: 0 });
	let five: Future<i64> = sum.call("plus", 5_i64).expect("plus");
	let seven: Future<i64> = sum.call("plus", 2_i64).expect("plus");
	executor.run_until_idle();
	assert_eq!(five.wait().ok(), Some(5));
	assert_eq!(seven.wait().ok(), Some(7));
	assert_eq!(sum.name(), "SumActor");
}

#[test]
fn explicit_name_wins() {
	let (_, exchange) = manual();
	let sum = exchange.actor(ActorSpec::new("totals")).worker(Sum { total: 0 }).spawn();
	assert_eq!(sum.name(), "totals");
	assert_eq!(ActorSpec::default().name("x"), ActorSpec::new("x"));
}

#[test]
fn pool_shares_calls_across_objects() {
	let (executor, exchange) = manual();
	let pool = exchange.spawn_pool((0..5).map(|_| Sum { total: 0 }));
	let futures: Vec<Future<i64>> = (0..100).map(|_| pool.call("plus", 1_i64).expect("plus")).collect();
	executor.run_until_idle();
	assert!(futures.iter().all(Future::is_complete));

	// All workers idle, so each takes exactly one of these.
	let totals: Vec<Future<i64>> = (0..5).map(|_| pool.call("total", ()).expect("total")).collect();
	executor.run_until_idle();
	let totals: Vec<_> = totals.iter().filter_map(|f| f.wait().ok()).collect();
	assert_eq!(totals, [20; 5]);
	assert_eq!(totals.iter().sum::<i64>(), 100);
}

#[test]
fn suspendable_call_awaits_other_actor() {
	let (executor, exchange) = manual();
	let network = exchange.spawn(Network);
	let encoder = exchange.spawn(Encoder { network });
	let result: Future<String> = encoder.call("encoded", ()).expect("encoded");
	executor.run_until_idle();
	assert_eq!(result.wait().ok().as_deref(), Some("barbarbaz"));
}

#[test]
fn suspended_worker_waits_while_other_actors_run() {
	let (executor, exchange) = manual();
	let sum = exchange.spawn(Sum { total: 41 });
	let relay = exchange.spawn(Relay { source: sum.clone() });
	let next: Future<i64> = relay.call("next", ()).expect("next");

	// next suspends on the sum actor, which still runs.
	assert!(executor.run_next());
	let ping: Future<char> = relay.call("ping", ()).expect("ping");
	assert_eq!(relay.snapshot().pending, 1);
	let plus: Future<i64> = sum.call("plus", 1_i64).expect("plus");

	assert!(executor.run_next());
	assert!(!ping.is_complete());
	executor.run_until_idle();

	assert_eq!(next.wait().ok(), Some(42));
	assert_eq!(plus.wait().ok(), Some(42));
	assert_eq!(ping.wait().ok(), Some('p'));
}

#[test]
fn awaited_failure_propagates_unchanged() {
	let (executor, exchange) = manual();
	let network = exchange.spawn(Network);
	let direct: Future<String> = network.call("download_offline", "bar".to_string()).expect("download_offline");
	let encoder = exchange.spawn(Encoder { network });
	let relayed: Future<String> = encoder.call("encoded_via", "download_offline".to_string()).expect("encoded_via");
	executor.run_until_idle();

	let direct = direct.wait().expect_err("offline");
	let relayed = relayed.wait().expect_err("relay fails");
	assert!(direct.is::<Offline>());
	assert_eq!(relayed.downcast_ref::<Offline>(), Some(&Offline));
	assert_eq!(relayed.to_string(), "network offline");
}

#[test]
fn usage_error_inside_suspendable_becomes_failure() {
	let (executor, exchange) = manual();
	let encoder = exchange.spawn(Encoder { network: exchange.spawn(Network) });
	let result: Future<String> = encoder.call("encoded_via", "upload".to_string()).expect("encoded_via");
	executor.run_until_idle();
	let failure = result.wait().expect_err("unknown method on network");
	assert!(matches!(failure.downcast_ref::<UsageError>(), Some(UsageError::UnknownMethod { method, .. }) if method == "upload"));
}

#[test]
fn self_call_while_suspended() {
	let (executor, exchange) = manual();
	let hmm = exchange.spawn(Hmm::default());
	let result: Future<i64> = hmm.call("hmm", ()).expect("hmm");
	executor.run_until_idle();
	assert_eq!(result.wait().ok(), Some(100));
	let snapshot = hmm.snapshot();
	assert_eq!((snapshot.busy, snapshot.suspended, snapshot.pending), (0, 0, 0));
}

#[test]
fn nested_self_calls_unwind_in_order() {
	let (executor, exchange) = manual();
	let hmm = exchange.spawn(Hmm::default());
	let result: Future<i64> = hmm.call("deeper", 3_u32).expect("deeper");
	executor.run_until_idle();
	assert_eq!(result.wait().ok(), Some(3));
	let after: Future<i64> = hmm.call("hmmm", ()).expect("hmmm");
	executor.run_until_idle();
	assert_eq!(after.wait().ok(), Some(100));
}

#[test]
fn outside_calls_wait_for_suspended_self_call() {
	let (executor, exchange) = manual();
	let hmm = exchange.spawn(Hmm::default());
	let inner: Future<i64> = hmm.call("hmm", ()).expect("hmm");
	let outside: Future<i64> = hmm.call("hmmm", ()).expect("hmmm");

	// hmm runs and suspends; its own hmmm call jumps the outside one.
	assert!(executor.run_next());
	assert_eq!(hmm.snapshot().pending, 1);
	executor.run_until_idle();
	assert_eq!(inner.wait().ok(), Some(100));
	assert_eq!(outside.wait().ok(), Some(100));
}

#[test]
fn domain_failure_keeps_actor_usable() {
	let (executor, exchange) = manual();
	let sum = exchange.spawn(Sum { total: i64::MAX - 1 });
	let overflow: Future<i64> = sum.call("checked_plus", 5_i64).expect("checked_plus");
	let fine: Future<i64> = sum.call("checked_plus", 1_i64).expect("checked_plus");
	executor.run_until_idle();

	let failure = overflow.wait().expect_err("overflow");
	assert_eq!(failure.downcast_ref::<Overflow>(), Some(&Overflow));
	assert!(overflow.wait().expect_err("same failure").ptr_eq(&failure));
	assert_eq!(fine.wait().ok(), Some(i64::MAX));
}

#[test]
fn usage_errors_are_synchronous() {
	let (executor, exchange) = manual();
	let sum = exchange.spawn(Sum { total: 0 });
	assert!(matches!(sum.call::<i64, i64>("minus", 1), Err(UsageError::UnknownMethod { .. })));
	assert!(matches!(sum.call::<i32, i64>("plus", 1), Err(UsageError::Signature { .. })));
	assert!(matches!(sum.call::<i64, String>("plus", 1), Err(UsageError::Signature { .. })));
	assert_eq!(executor.pending(), 0);
	assert_eq!(sum.methods(), ["checked_plus", "plus", "total"]);
}

#[test]
fn weak_reference_detaches() {
	let (_, exchange) = manual();
	let sum = exchange.spawn(Sum { total: 0 });
	let weak = sum.downgrade();
	assert!(weak.upgrade().is_some());
	drop(sum);
	assert!(weak.upgrade().is_none());
	assert_eq!(
		weak.call::<i64, i64>("plus", 1).expect_err("detached"),
		UsageError::Detached {
			actor: "SumActor".to_string()
		}
	);
}

#[test]
fn heterogeneous_workers_serve_their_own_methods() {
	let (executor, exchange) = manual();
	let pool = exchange.actor(ActorSpec::new("workpool")).worker(TypeA).worker(TypeB).worker(TypeC).spawn();
	assert_eq!(pool.methods(), ["any", "typea", "typeb", "typec"]);
	assert_eq!(pool.workers(), 3);

	let bs: Vec<Future<char>> = (0..3).map(|_| pool.call("typeb", ()).expect("typeb")).collect();
	// Only the TypeB object can take these.
	assert_eq!(executor.pending(), 1);
	assert_eq!(pool.snapshot().pending, 2);

	let c: Future<char> = pool.call("typec", ()).expect("typec");
	let any: Future<char> = pool.call("any", ()).expect("any");
	assert_eq!(executor.pending(), 3);
	let snapshot = pool.snapshot();
	assert_eq!((snapshot.busy, snapshot.pending), (3, 2));

	executor.run_until_idle();
	assert!(bs.iter().all(|f| f.wait().ok() == Some('b')));
	assert_eq!(c.wait().ok(), Some('c'));
	assert_eq!(any.wait().ok(), Some('a'));
}

#[test]
fn pool_never_runs_one_object_twice_at_once() {
	const WORKERS: usize = 4;
	let executor = TokioExecutor::new(PoolSpec::default().threads(8).thread_name("courier-guard")).expect("pool");
	let exchange = Exchange::new(executor);
	let overlaps = Arc::new(AtomicUsize::new(0));
	let running = Arc::new(AtomicUsize::new(0));
	let peak = Arc::new(AtomicUsize::new(0));
	let pool = exchange.spawn_pool((0..WORKERS).map(|_| Guarded {
		inside: Arc::new(AtomicBool::new(false)),
		overlaps: Arc::clone(&overlaps),
		running: Arc::clone(&running),
		peak: Arc::clone(&peak),
	}));

	let futures: Vec<Future<()>> = (0..200).map(|_| pool.call("enter", ()).expect("enter")).collect();
	for future in &futures {
		assert!(future.wait_timeout(Duration::from_secs(10)).is_some_and(|r| r.is_ok()));
	}
	assert_eq!(overlaps.load(Ordering::SeqCst), 0);
	assert!(peak.load(Ordering::SeqCst) <= WORKERS);
}

#[tokio::test]
async fn calls_resolve_in_order_on_tokio() {
	let exchange = Exchange::new(TokioExecutor::current());
	let sum = exchange.spawn(Sum { total: 0 });
	let futures: Vec<Future<i64>> = (1_i64..=50).map(|x| sum.call("plus", x).expect("plus")).collect();
	let mut expected = 0;
	for (x, future) in (1_i64..=50).zip(&futures) {
		expected += x;
		assert_eq!(future.wait_async().await.ok(), Some(expected));
	}
}

#[tokio::test]
async fn suspension_chain_on_tokio() {
	let exchange = Exchange::new(TokioExecutor::current());
	let encoder = exchange.spawn(Encoder { network: exchange.spawn(Network) });
	let hmm = exchange.spawn(Hmm::default());
	let barbarbaz: Future<String> = encoder.call("encoded", ()).expect("encoded");
	let deeper: Future<i64> = hmm.call("deeper", 5_u32).expect("deeper");
	assert_eq!(barbarbaz.wait_async().await.ok().as_deref(), Some("barbarbaz"));
	assert_eq!(deeper.wait_async().await.ok(), Some(5));
}

#[test]
fn snapshots_list_live_actors_by_name() {
	let (_, exchange) = manual();
	let b = exchange.actor(ActorSpec::new("b-actor")).worker(Sum { total: 0 }).spawn();
	let a = exchange.actor(ActorSpec::new("a-actor")).workers((0..2).map(|id| Tag { id })).spawn();

	let names: Vec<_> = exchange.snapshots().into_iter().map(|s| (s.name, s.workers)).collect();
	assert_eq!(names, [("a-actor".to_string(), 2), ("b-actor".to_string(), 1)]);

	drop(a);
	let names: Vec<_> = exchange.snapshots().into_iter().map(|s| s.name).collect();
	assert_eq!(names, ["b-actor"]);
	assert_eq!(b.snapshot().id, b.id());
}

#[test]
#[should_panic(expected = "at least one backing object")]
fn empty_pool_rejected() {
	let (_, exchange) = manual();
	let _ = exchange.spawn_pool(Vec::<Sum>::new());
}

#[test]
fn abrupt_outcome_survives_as_failure_value() {
	let failure = Failure::new(Overflow);
	let future = Future::<i64>::completed(crate::outcome::Outcome::Abrupt(failure.clone()));
	assert!(future.wait().expect_err("abrupt").ptr_eq(&failure));
}

proptest! {
	#[test]
	fn idle_pool_spreads_calls_round_robin(workers in 1_usize..6, rounds in 1_usize..10) {
		let (executor, exchange) = manual();
		let pool = exchange.spawn_pool((0..workers).map(|id| Tag { id }));
		let futures: Vec<Future<usize>> = (0..workers * rounds).map(|_| pool.call("tag", ()).expect("tag")).collect();
		executor.run_until_idle();
		for (i, future) in futures.iter().enumerate() {
			prop_assert_eq!(future.wait().ok(), Some(i % workers));
		}
	}
}
