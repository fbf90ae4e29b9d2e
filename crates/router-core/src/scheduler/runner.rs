//! Driving step trees to completion.

use super::step::{Step, StepOutput, StepResult};
use crate::error::{RouterError, RouterResult};
use futures::future::{join_all, BoxFuture, FutureExt};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cancels the chain it was handed out for.
#[derive(Debug, Clone, Default)]
pub struct StepCanceller {
    token: CancellationToken,
}

impl StepCanceller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the chain and its whole subtree terminal.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// A canceller that is cancelled together with this one.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }
}

enum Flow<T> {
    Continue(StepResult<T>),
    Exit(T),
}

/// Entry point of the scheduler.
pub struct Runner;

impl Runner {
    /// Run steps one after another.
    pub fn run<T: Send + 'static>(steps: Vec<Step<T>>) -> StepHandle<T> {
        Self::run_with(Step::Sequence(steps), StepCanceller::new())
    }

    /// Run steps as parallel siblings.
    pub fn run_parallel<T: Send + 'static>(steps: Vec<Step<T>>) -> StepHandle<T> {
        Self::run_with(Step::Parallel(steps), StepCanceller::new())
    }

    /// Run a step tree under an existing canceller.
    pub fn run_with<T: Send + 'static>(root: Step<T>, canceller: StepCanceller) -> StepHandle<T> {
        let token = canceller.token.clone();
        let future = async move {
            match execute(root, StepResult::Empty, token).await? {
                Flow::Continue(result) => Ok(result),
                Flow::Exit(value) => Ok(StepResult::Value(value)),
            }
        }
        .boxed();

        StepHandle { canceller, future }
    }
}

fn execute<T: Send + 'static>(
    step: Step<T>,
    input: StepResult<T>,
    token: CancellationToken,
) -> BoxFuture<'static, RouterResult<Flow<T>>> {
    async move {
        if token.is_cancelled() {
            return Err(RouterError::Cancelled);
        }

        match step {
            Step::Value(value) => Ok(Flow::Continue(StepResult::Value(value))),
            Step::Run(f) => drive(f(input), &token).await,
            Step::Sequence(children) => {
                if children.is_empty() {
                    return Ok(Flow::Continue(StepResult::Empty));
                }
                let mut last = input;
                for child in children {
                    match execute(child, last, token.clone()).await? {
                        Flow::Continue(result) => last = result,
                        Flow::Exit(value) => return Ok(Flow::Exit(value)),
                    }
                }
                Ok(Flow::Continue(last))
            }
            Step::Parallel(children) => {
                let branches = children
                    .into_iter()
                    .map(|child| execute(child, StepResult::Empty, token.clone()));
                let outcomes = join_all(branches).await;

                let mut results = Vec::with_capacity(outcomes.len());
                let mut exit = None;
                let mut cancelled = false;
                for outcome in outcomes {
                    match outcome {
                        Ok(Flow::Continue(result)) => results.push(result),
                        Ok(Flow::Exit(value)) => {
                            if exit.is_none() {
                                exit = Some(value);
                            }
                        }
                        Err(RouterError::Cancelled) => cancelled = true,
                        Err(err) => return Err(err),
                    }
                }

                if cancelled {
                    return Err(RouterError::Cancelled);
                }
                Ok(match exit {
                    Some(value) => Flow::Exit(value),
                    None => Flow::Continue(StepResult::All(results)),
                })
            }
        }
    }
    .boxed()
}

async fn drive<T: Send + 'static>(
    mut output: StepOutput<T>,
    token: &CancellationToken,
) -> RouterResult<Flow<T>> {
    loop {
        output = match output {
            StepOutput::Value(value) => return Ok(Flow::Continue(StepResult::Value(value))),
            StepOutput::Empty => return Ok(Flow::Continue(StepResult::Empty)),
            StepOutput::Exit(value) => return Ok(Flow::Exit(value)),
            StepOutput::Next(f) => f(StepResult::Empty),
            StepOutput::Pending(future) => future.await?,
        };
        if token.is_cancelled() {
            return Err(RouterError::Cancelled);
        }
    }
}

/// A running (not yet spawned) step chain.
///
/// Awaiting the handle drives the chain on the current task.
pub struct StepHandle<T> {
    canceller: StepCanceller,
    future: BoxFuture<'static, RouterResult<StepResult<T>>>,
}

impl<T: Send + 'static> StepHandle<T> {
    pub fn canceller(&self) -> StepCanceller {
        self.canceller.clone()
    }

    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    /// Detach the chain onto the runtime.
    pub fn spawn(self) -> SpawnedStep<T> {
        self.spawn_with(|_| {})
    }

    /// Detach the chain and run `on_done` with its result before the
    /// spawned task completes.
    pub fn spawn_with<F>(self, on_done: F) -> SpawnedStep<T>
    where
        F: FnOnce(&RouterResult<StepResult<T>>) + Send + 'static,
    {
        let canceller = self.canceller.clone();
        let future = self.future;
        let join = tokio::spawn(async move {
            let result = future.await;
            on_done(&result);
            result
        });
        SpawnedStep { canceller, join }
    }
}

impl<T> Future for StepHandle<T> {
    type Output = RouterResult<StepResult<T>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

/// A step chain running on its own task.
pub struct SpawnedStep<T> {
    canceller: StepCanceller,
    join: JoinHandle<RouterResult<StepResult<T>>>,
}

impl<T> SpawnedStep<T> {
    pub fn canceller(&self) -> StepCanceller {
        self.canceller.clone()
    }

    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl<T> Future for SpawnedStep<T> {
    type Output = RouterResult<StepResult<T>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.join).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(err)) => Poll::Ready(Err(RouterError::internal(format!(
                "step task failed: {err}"
            )))),
            Poll::Pending => Poll::Pending,
        }
    }
}
