//! Entry-point stage: a source that feeds the first channel of a chain.

use super::decorator::Decorator;
use super::processor::{ErrorSink, Processor, Stage};
use crate::error::Error;
use futures::future::BoxFuture;
use kanal::{AsyncReceiver, AsyncSender};
use std::marker::PhantomData;
use tokio_util::sync::CancellationToken;

/// A [`Decorator`] that also produces the items it decorates.
///
/// The runner owns the internal channel between the producer and the
/// decoration loop; [`EntryPoint::start`] returns the producer future,
/// which is spawned on a fresh task.
pub trait EntryPoint<Ti, To>: Decorator<Ti, To> {
    /// Build the producer future.
    ///
    /// The producer must be cooperative with respect to cancellation: when
    /// `scope` is cancelled it must return promptly, dropping `output` so
    /// the internal channel closes. The runner never force-closes it.
    fn start(
        &mut self,
        output: AsyncSender<Ti>,
        scope: CancellationToken,
    ) -> BoxFuture<'static, ()>;
}

/// A 0→1 source stage wrapping an [`EntryPoint`].
///
/// The stage launches the producer, then behaves exactly like a
/// [`DecoratorStage`]: items from the internal channel are decorated
/// sequentially and emitted on `output`.
///
/// [`DecoratorStage`]: super::DecoratorStage
pub struct EntryStage<Ti, To, E> {
    output: AsyncSender<To>,
    worker: E,
    _in: PhantomData<fn(Ti) -> Ti>,
}

impl<Ti, To, E> EntryStage<Ti, To, E>
where
    E: EntryPoint<Ti, To>,
{
    /// Create a stage emitting decorated items on `output`.
    pub fn new(output: AsyncSender<To>, worker: E) -> Self {
        Self {
            output,
            worker,
            _in: PhantomData,
        }
    }
}

impl<Ti, To, E> Stage for EntryStage<Ti, To, E>
where
    Ti: Send + 'static,
    To: Send + 'static,
    E: EntryPoint<Ti, To> + Send + 'static,
{
    fn into_processor(self: Box<Self>, errors: ErrorSink) -> Box<dyn Processor> {
        Box::new(EntryRunner {
            output: self.output,
            worker: self.worker,
            errors,
            _in: PhantomData,
        })
    }
}

struct EntryRunner<Ti, To, E> {
    output: AsyncSender<To>,
    worker: E,
    errors: ErrorSink,
    _in: PhantomData<fn(Ti) -> Ti>,
}

impl<Ti, To, E> Processor for EntryRunner<Ti, To, E>
where
    Ti: Send + 'static,
    To: Send + 'static,
    E: EntryPoint<Ti, To> + Send + 'static,
{
    fn process(self: Box<Self>, scope: CancellationToken) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let scope = scope.child_token();
            // Cancels the derived scope when the runner exits for any
            // reason, so a still-blocked producer unblocks.
            let _guard = scope.clone().drop_guard();

            let Self {
                output,
                mut worker,
                errors,
                _in,
            } = *self;

            let (feed_tx, feed_rx): (AsyncSender<Ti>, AsyncReceiver<Ti>) = kanal::bounded_async(0);
            tokio::spawn(worker.start(feed_tx, scope.clone()));

            loop {
                tokio::select! {
                    _ = scope.cancelled() => {
                        worker.stop();
                        return;
                    }
                    item = feed_rx.recv() => {
                        let Ok(item) = item else {
                            // producer finished and dropped its sender
                            worker.stop();
                            return;
                        };
                        match worker.decorate(item) {
                            Ok(out) => {
                                if output.send(out).await.is_err() {
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
