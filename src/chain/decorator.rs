//! Decorator stage: 1→1 transformation of a typed item stream.

use super::processor::{ErrorSink, Processor, Stage, Worker};
use crate::error::{Error, Result};
use futures::future::BoxFuture;
use kanal::{AsyncReceiver, AsyncSender};
use tokio_util::sync::CancellationToken;

/// A worker that converts one item of `Ti` into one item of `To`.
///
/// Returning [`Error::SkippedItem`] drops the input without signalling a
/// failure; any other error is forwarded to the chain's error sink and the
/// input is dropped.
pub trait Decorator<Ti, To>: Worker {
    /// Transform one input item.
    fn decorate(&mut self, input: Ti) -> Result<To>;
}

/// A 1→1 pipeline stage wrapping a [`Decorator`].
///
/// The stage reads from `input`, transforms each item sequentially (single
/// worker, arrival order preserved) and emits results on `output`. The
/// output channel closes when the stage exits and drops its sender.
///
/// # Example
///
/// ```rust,ignore
/// let stage = DecoratorStage::new(rx_numbers, tx_letters, ToLetter);
/// chain.add_step(stage);
/// ```
pub struct DecoratorStage<Ti, To, D> {
    input: AsyncReceiver<Ti>,
    output: AsyncSender<To>,
    worker: D,
}

impl<Ti, To, D> DecoratorStage<Ti, To, D>
where
    D: Decorator<Ti, To>,
{
    /// Create a stage over the given channels and worker.
    pub fn new(input: AsyncReceiver<Ti>, output: AsyncSender<To>, worker: D) -> Self {
        Self {
            input,
            output,
            worker,
        }
    }
}

impl<Ti, To, D> Stage for DecoratorStage<Ti, To, D>
where
    Ti: Send + 'static,
    To: Send + 'static,
    D: Decorator<Ti, To> + Send + 'static,
{
    fn into_processor(self: Box<Self>, errors: ErrorSink) -> Box<dyn Processor> {
        Box::new(DecoratorRunner {
            input: self.input,
            output: self.output,
            worker: self.worker,
            errors,
        })
    }
}

struct DecoratorRunner<Ti, To, D> {
    input: AsyncReceiver<Ti>,
    output: AsyncSender<To>,
    worker: D,
    errors: ErrorSink,
}

impl<Ti, To, D> Processor for DecoratorRunner<Ti, To, D>
where
    Ti: Send + 'static,
    To: Send + 'static,
    D: Decorator<Ti, To> + Send + 'static,
{
    fn process(self: Box<Self>, scope: CancellationToken) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let scope = scope.child_token();
            let Self {
                input,
                output,
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
                            // input closed and drained
                            worker.stop();
                            return;
                        };
                        match worker.decorate(item) {
                            Ok(out) => {
                                if output.send(out).await.is_err() {
                                    // downstream gone
                                    worker.stop();
                                    return;
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
