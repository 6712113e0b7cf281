#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Mailbox-serialized actors over a shared executor.
//!
//! An actor wraps one or more plain backing objects. Callers address it by
//! method name through an [`Actor`] handle and get a [`Future`] back; the
//! actor's mailbox runs each call on one of its backing objects, never running
//! two calls on the same object at once.
//!
//! # Main Types
//!
//! - [`Exchange`] - Spawns actors that share one [`Executor`]
//! - [`Behavior`] - Registers the methods of a backing object
//! - [`Actor`] / [`ActorRef`] - Strong and weak caller handles
//! - [`Future`] / [`Outcome`] - Completion slot and result of one call
//! - [`Flow`] - Result of a suspendable method that may wait on other futures
//!
//! # Dispatch
//!
//! ```text
//! Actor::call ─► Mailbox ─► idle worker? ─yes─► Executor::submit ─► fire
//!                              │ no                                  │
//!                              ▼                                     ▼
//!                            queue ◄──── next serviceable ◄──── release
//! ```
//!
//! A suspended call keeps its worker: until the call resumes and finishes,
//! that worker only serves the call's own resumptions and the calls the
//! suspended call made to its own actor.

pub mod error;
pub mod exchange;
pub mod executor;
pub mod flow;
pub mod future;
pub mod handle;
mod ids;
mod mailbox;
mod message;
pub mod method;
pub mod outcome;
mod registry;
mod scope;

pub use error::UsageError;
pub use exchange::{ActorBuilder, ActorSpec, Exchange};
pub use executor::{Executor, ManualExecutor, PoolSpec, TokioExecutor, Work};
pub use flow::{Flow, Suspend};
pub use future::{Abandoned, Awaitable, Future};
pub use handle::{Actor, ActorRef};
pub use ids::ActorId;
pub use method::{Behavior, Methods};
pub use outcome::{Failure, Outcome, Panicked};
pub use registry::ActorSnapshot;
