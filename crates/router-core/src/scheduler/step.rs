//! Step tree building blocks.

use crate::error::RouterResult;
use futures::future::BoxFuture;
use std::fmt;

/// A function run when its step is reached. The argument is the result of
/// the preceding step in the same sequence.
pub type StepFn<T> = Box<dyn FnOnce(StepResult<T>) -> StepOutput<T> + Send>;

/// Box a closure as a [`StepFn`].
pub fn step_fn<T, F>(f: F) -> StepFn<T>
where
    F: FnOnce(StepResult<T>) -> StepOutput<T> + Send + 'static,
{
    Box::new(f)
}

/// Node of a step tree.
pub enum Step<T> {
    /// Plain value, resolved immediately.
    Value(T),
    /// Function producing the step's output.
    Run(StepFn<T>),
    /// Children run one after another; the result is the last child's.
    Sequence(Vec<Step<T>>),
    /// Children run concurrently; the result holds every child's.
    Parallel(Vec<Step<T>>),
}

impl<T> Step<T> {
    /// Wrap a closure as a step.
    pub fn run<F>(f: F) -> Self
    where
        F: FnOnce(StepResult<T>) -> StepOutput<T> + Send + 'static,
    {
        Self::Run(Box::new(f))
    }
}

impl<T> fmt::Debug for Step<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(_) => f.write_str("Step::Value"),
            Self::Run(_) => f.write_str("Step::Run"),
            Self::Sequence(children) => write!(f, "Step::Sequence({})", children.len()),
            Self::Parallel(children) => write!(f, "Step::Parallel({})", children.len()),
        }
    }
}

/// What a step function hands back.
pub enum StepOutput<T> {
    /// The step resolved to a value.
    Value(T),
    /// The step resolved without a value.
    Empty,
    /// Another function to invoke before the step is done.
    Next(StepFn<T>),
    /// Suspend this branch until the future resolves.
    Pending(BoxFuture<'static, RouterResult<StepOutput<T>>>),
    /// Stop the whole chain successfully with this value.
    Exit(T),
}

/// Externally observable result of a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult<T> {
    /// No value.
    Empty,
    /// A single value.
    Value(T),
    /// Results of parallel children, in declaration order.
    All(Vec<StepResult<T>>),
}

impl<T> StepResult<T> {
    /// The single value, if this is one.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// All values in depth-first order.
    pub fn into_values(self) -> Vec<T> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    fn collect_into(self, out: &mut Vec<T>) {
        match self {
            Self::Empty => {}
            Self::Value(v) => out.push(v),
            Self::All(children) => children.into_iter().for_each(|c| c.collect_into(out)),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}
