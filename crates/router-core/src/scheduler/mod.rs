//! # Step Scheduler
//!
//! Run-to-completion engine for chains and trees of steps.
//!
//! A step holds a value or a function producing the next value, possibly
//! asynchronously. Steps compose sequentially ([`Step::Sequence`]) or in
//! parallel ([`Step::Parallel`]). [`Runner`] drives a tree of steps and hands
//! back a [`StepHandle`] that can be awaited, cancelled, or detached onto the
//! runtime.
//!
//! ## Semantics
//!
//! - Within one branch steps execute one at a time in submission order.
//! - Parallel branches progress independently; their completion order is
//!   unspecified. They are polled by one task, interleaved, never threaded.
//! - Cancellation is cooperative: it is observed at the next step boundary and
//!   never pre-empts an in-flight future. A cancelled chain resolves
//!   `Err(RouterError::Cancelled)`.
//! - [`StepOutput::Exit`] skips the sequential continuation and resolves the
//!   root with the exiting step's value. In-flight parallel siblings still run
//!   to completion.

mod runner;
mod step;

pub use runner::{Runner, SpawnedStep, StepCanceller, StepHandle};
pub use step::{step_fn, Step, StepFn, StepOutput, StepResult};
