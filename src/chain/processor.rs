//! Core processor traits and the chain composite.

use crate::error::Error;
use futures::future::BoxFuture;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Write half of the error channel shared by all stages of a chain.
///
/// Stages only ever write to the sink; the host reads it and decides
/// whether to cancel the chain scope.
pub type ErrorSink = kanal::AsyncSender<Error>;

/// Minimal lifecycle capability of a stage's worker object.
pub trait Worker {
    /// Release resources held by the worker.
    ///
    /// Must be idempotent; the runner calls it exactly once on exit.
    fn stop(&mut self);
}

/// Anything a [`Chain`] can run.
///
/// A processor runs exactly once, under the cancellation scope it is
/// given, and returns when its input is exhausted or the scope is
/// cancelled.
pub trait Processor: Send {
    /// Run the processor to completion under `scope`.
    fn process(self: Box<Self>, scope: CancellationToken) -> BoxFuture<'static, ()>;
}

/// A pipeline stage that still needs its error sink.
///
/// The sink binding is mandatory and happens exactly once, at
/// [`Chain::add_step`] time (or directly via [`Stage::into_processor`] for
/// standalone use). There is no way to run a stage without a sink.
pub trait Stage: Send {
    /// Bind the error sink and turn the stage into a runnable processor.
    fn into_processor(self: Box<Self>, errors: ErrorSink) -> Box<dyn Processor>;
}

impl Stage for Box<dyn Stage> {
    fn into_processor(self: Box<Self>, errors: ErrorSink) -> Box<dyn Processor> {
        (*self).into_processor(errors)
    }
}

/// A composite [`Processor`] that owns a set of child processors.
///
/// All children share the chain's error sink (propagated when a step is
/// added) and run concurrently under a cancellation scope derived from the
/// caller's. The chain itself never writes to the sink.
///
/// The chain returns once its scope has been cancelled — by the caller, a
/// deadline, or an explicit error-driven cancel by the host — and every
/// child has finished. A child error does not cancel the chain; a child
/// panic terminates that child's task only.
pub struct Chain {
    errors: ErrorSink,
    steps: Vec<Box<dyn Processor>>,
}

impl Chain {
    /// Create an empty chain writing non-fatal stage errors to `errors`.
    pub fn new(errors: ErrorSink) -> Self {
        Self {
            errors,
            steps: Vec::new(),
        }
    }

    /// Add a stage, binding the chain's error sink into it.
    pub fn add_step(&mut self, stage: impl Stage + 'static) {
        let bound = Box::new(stage).into_processor(self.errors.clone());
        self.steps.push(bound);
    }

    /// Number of steps added so far.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the chain has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run the chain under `scope` and wait for it to finish.
    pub async fn run(self, scope: &CancellationToken) {
        Box::new(self).process(scope.clone()).await;
    }

    /// Like [`Chain::run`] but taking the scope by value, convenient for
    /// `tokio::spawn`.
    pub async fn run_owned(self, scope: CancellationToken) {
        Box::new(self).process(scope).await;
    }
}

impl Processor for Chain {
    fn process(self: Box<Self>, scope: CancellationToken) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let scope = scope.child_token();

            let mut children = JoinSet::new();
            for step in self.steps {
                children.spawn(step.process(scope.clone()));
            }

            scope.cancelled().await;
            while let Some(joined) = children.join_next().await {
                if let Err(e) = joined {
                    if e.is_panic() {
                        tracing::error!(error = %e, "chain step panicked");
                    }
                }
            }
        })
    }
}

// A nested chain keeps the sink its own children were bound with when it
// was assembled; adding it to an outer chain does not rebind them.
impl Stage for Chain {
    fn into_processor(self: Box<Self>, _errors: ErrorSink) -> Box<dyn Processor> {
        self
    }
}
