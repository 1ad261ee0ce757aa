//! Switch stage: 1→N fan-out with index-addressed branches.

use super::processor::{ErrorSink, Processor, Stage, Worker};
use crate::error::{Error, Result};
use futures::future::BoxFuture;
use kanal::{AsyncReceiver, AsyncSender};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// A worker that decides on which branches an item's outputs belong.
///
/// For each input the worker returns a branch-index → value mapping; the
/// runner emits each pair to the corresponding output channel. A single
/// input may produce zero, one or many outputs on distinct branches;
/// duplicates to one branch are impossible because the branch index is the
/// map key.
pub trait Switcher<Ti, To>: Worker {
    /// Route one input item to zero or more branches.
    fn route(&mut self, input: Ti) -> Result<HashMap<usize, To>>;
}

/// A 1→N fan-out stage wrapping a [`Switcher`].
///
/// Branches are addressed by position in `outputs`. Indices outside
/// `0..outputs.len()` are silently dropped. Emission order across branches
/// is unspecified (the mapping is unordered); on a routing error the whole
/// input is dropped and the error forwarded to the sink.
pub struct SwitchStage<Ti, To, S> {
    input: AsyncReceiver<Ti>,
    outputs: Vec<AsyncSender<To>>,
    worker: S,
}

impl<Ti, To, S> SwitchStage<Ti, To, S>
where
    S: Switcher<Ti, To>,
{
    /// Create a stage over the given input and ordered branch outputs.
    pub fn new(input: AsyncReceiver<Ti>, outputs: Vec<AsyncSender<To>>, worker: S) -> Self {
        Self {
            input,
            outputs,
            worker,
        }
    }
}

impl<Ti, To, S> Stage for SwitchStage<Ti, To, S>
where
    Ti: Send + 'static,
    To: Send + 'static,
    S: Switcher<Ti, To> + Send + 'static,
{
    fn into_processor(self: Box<Self>, errors: ErrorSink) -> Box<dyn Processor> {
        Box::new(SwitchRunner {
            input: self.input,
            outputs: self.outputs,
            worker: self.worker,
            errors,
        })
    }
}

struct SwitchRunner<Ti, To, S> {
    input: AsyncReceiver<Ti>,
    outputs: Vec<AsyncSender<To>>,
    worker: S,
    errors: ErrorSink,
}

impl<Ti, To, S> Processor for SwitchRunner<Ti, To, S>
where
    Ti: Send + 'static,
    To: Send + 'static,
    S: Switcher<Ti, To> + Send + 'static,
{
    fn process(self: Box<Self>, scope: CancellationToken) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let scope = scope.child_token();
            let Self {
                input,
                outputs,
                mut worker,
                errors,
            } = *self;

            loop {
                tokio::select! {
                    _ = scope.cancelled() => {
                        worker.stop();
                        return;
                    }
                    item = input.recv() => {
                        let Ok(item) = item else {
                            worker.stop();
                            return;
                        };
                        match worker.route(item) {
                            Ok(routed) => {
                                for (branch, value) in routed {
                                    let Some(output) = outputs.get(branch) else {
                                        // out-of-range branch index
                                        continue;
                                    };
                                    if output.send(value).await.is_err() {
                                        worker.stop();
                                        return;
                                    }
                                }
                            }
                            Err(Error::SkippedItem) => {}
                            Err(e) => {
                                let _ = errors.send(e).await;
                            }
                        }
                    }
                }
            }
        })
    }
}
