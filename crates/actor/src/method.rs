//! Capability tables: the methods a backing object exposes to its actor.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::marker::PhantomData;

use crate::flow::{Flow, Step, Value};
use crate::handle::ActorRef;
use crate::outcome::{Failure, Outcome};

/// A plain object that can back an actor.
///
/// ```ignore
/// struct Sum {
/// 	total: i64,
/// }
///
/// impl Behavior for Sum {
/// 	fn methods(methods: &mut Methods<Self>) {
/// 		methods.method("plus", |this: &mut Sum, x: i64| {
/// 			this.total += x;
/// 			this.total
/// 		});
/// 	}
/// }
/// ```
pub trait Behavior: Send + Sized + 'static {
	/// Registers every method callers may reach through the actor.
	fn methods(methods: &mut Methods<Self>);

	/// Receives a reference to the object's own actor before its first call.
	fn attach(&mut self, actor: ActorRef) {
		let _ = actor;
	}
}

/// Argument and result types of one registered method.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Signature {
	args: TypeId,
	ret: TypeId,
	args_name: &'static str,
	ret_name: &'static str,
}

impl Signature {
	pub fn of<A, R>() -> Self
	where
		A: 'static,
		R: 'static,
	{
		Self {
			args: TypeId::of::<A>(),
			ret: TypeId::of::<R>(),
			args_name: type_name::<A>(),
			ret_name: type_name::<R>(),
		}
	}

	pub fn matches(&self, other: &Signature) -> bool {
		self.args == other.args && self.ret == other.ret
	}

	pub fn args_name(&self) -> &'static str {
		self.args_name
	}

	pub fn ret_name(&self) -> &'static str {
		self.ret_name
	}
}

impl fmt::Display for Signature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "({}) -> {}", self.args_name, self.ret_name)
	}
}

type Invoker = Box<dyn Fn(&mut dyn Any, Value) -> Step + Send + Sync>;

/// One entry of a capability table.
pub(crate) struct MethodEntry {
	pub signature: Signature,
	pub suspendable: bool,
	invoke: Invoker,
}

impl MethodEntry {
	/// Runs the method against `object`, which must be the table's backing type.
	pub fn invoke(&self, object: &mut dyn Any, args: Value) -> Step {
		(self.invoke)(object, args)
	}
}

/// Capability table of one backing object, keyed by method name.
pub(crate) type MethodTable = HashMap<&'static str, MethodEntry>;

/// Registration surface handed to [`Behavior::methods`].
pub struct Methods<S> {
	entries: MethodTable,
	_object: PhantomData<fn(&mut S)>,
}

impl<S> Methods<S>
where
	S: Behavior,
{
	pub(crate) fn collect() -> MethodTable {
		let mut methods = Self {
			entries: HashMap::new(),
			_object: PhantomData,
		};
		S::methods(&mut methods);
		methods.entries
	}

	/// Registers a method that always returns a value.
	///
	/// # Panics
	///
	/// Panics if `name` is already registered.
	pub fn method<A, R, F>(&mut self, name: &'static str, f: F) -> &mut Self
	where
		A: Send + 'static,
		R: Send + 'static,
		F: Fn(&mut S, A) -> R + Send + Sync + 'static,
	{
		self.insert::<A, R>(name, false, bind::<S, A>(move |this, args| Step::Done(Outcome::Normal(Box::new(f(this, args)) as Value))))
	}

	/// Registers a method that may fail with a domain error.
	///
	/// # Panics
	///
	/// Panics if `name` is already registered.
	pub fn fallible<A, R, E, F>(&mut self, name: &'static str, f: F) -> &mut Self
	where
		A: Send + 'static,
		R: Send + 'static,
		E: Error + Send + Sync + 'static,
		F: Fn(&mut S, A) -> Result<R, E> + Send + Sync + 'static,
	{
		self.insert::<A, R>(
			name,
			false,
			bind::<S, A>(move |this, args| match f(this, args) {
				Ok(value) => Step::Done(Outcome::Normal(Box::new(value) as Value)),
				Err(error) => Step::Done(Outcome::Abrupt(Failure::new(error))),
			}),
		)
	}

	/// Registers a method that may suspend on other futures.
	///
	/// # Panics
	///
	/// Panics if `name` is already registered.
	pub fn suspendable<A, R, F>(&mut self, name: &'static str, f: F) -> &mut Self
	where
		A: Send + 'static,
		R: Send + 'static,
		F: Fn(&mut S, A) -> Flow<S, R> + Send + Sync + 'static,
	{
		self.insert::<A, R>(name, true, bind::<S, A>(move |this, args| f(this, args).into_step()))
	}

	fn insert<A, R>(&mut self, name: &'static str, suspendable: bool, invoke: Invoker) -> &mut Self
	where
		A: 'static,
		R: 'static,
	{
		let entry = MethodEntry {
			signature: Signature::of::<A, R>(),
			suspendable,
			invoke,
		};
		let previous = self.entries.insert(name, entry);
		assert!(previous.is_none(), "method `{name}` registered twice on {}", type_name::<S>());
		self
	}
}

fn bind<S, A>(body: impl Fn(&mut S, A) -> Step + Send + Sync + 'static) -> Invoker
where
	S: 'static,
	A: 'static,
{
	Box::new(move |object: &mut dyn Any, args: Value| {
		let Some(this) = object.downcast_mut::<S>() else {
			unreachable!("method table of {} bound to another type", type_name::<S>())
		};
		let Ok(args) = args.downcast::<A>() else {
			unreachable!("arguments of type {} checked at call time", type_name::<A>())
		};
		body(this, *args)
	})
}

/// Type-erased backing object owned by a worker.
pub(crate) trait Backing: Send + 'static {
	fn as_any_mut(&mut self) -> &mut dyn Any;

	fn attach(&mut self, actor: ActorRef);
}

impl<B> Backing for B
where
	B: Behavior,
{
	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}

	fn attach(&mut self, actor: ActorRef) {
		Behavior::attach(self, actor);
	}
}
