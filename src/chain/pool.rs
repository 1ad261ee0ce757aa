//! Stateless worker-pool helpers for batch decoration.
//!
//! A lightweight alternative to [`DecoratorStage`] for throughput
//! workloads that need neither per-item error reporting nor cooperative
//! cancellation. Items that fail to transform are dropped. Pool helpers
//! are not pluggable into a [`Chain`]; with more than one worker the item
//! order is not preserved.
//!
//! [`DecoratorStage`]: super::DecoratorStage
//! [`Chain`]: super::Chain

use crate::error::Result;
use kanal::{AsyncReceiver, AsyncSender};
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};

/// Shepherd `transform` across a channel with a fixed-width worker pool.
///
/// Spawns `count` workers; each drains `input`, applies `transform`, and
/// sends successes on `output`. When the input closes and every worker has
/// returned, the output closes (the last sender drops). With `count == 0`
/// the output is closed immediately and no items are emitted.
pub async fn decorate<Ti, To, F>(
    count: usize,
    input: AsyncReceiver<Ti>,
    output: AsyncSender<To>,
    transform: F,
) where
    Ti: Send + 'static,
    To: Send + 'static,
    F: Fn(Ti) -> Result<To> + Send + Sync + 'static,
{
    if count == 0 {
        // dropping `output` here closes it with zero items
        return;
    }

    let transform = Arc::new(transform);
    let mut workers = JoinSet::new();
    for _ in 0..count {
        let input = input.clone();
        let output = output.clone();
        let transform = Arc::clone(&transform);
        workers.spawn(async move {
            while let Ok(item) = input.recv().await {
                match transform(item) {
                    Ok(out) => {
                        if output.send(out).await.is_err() {
                            return;
                        }
                    }
                    Err(_) => {
                        // dropped on error, no error channel by design
                    }
                }
            }
        });
    }
    drop(output);
    drop(input);

    while workers.join_next().await.is_some() {}
}

/// Detached variant of [`decorate`].
///
/// Runs the pool on its own task; the returned handle completes on every
/// exit path, including the degenerate `count == 0` case, and serves as
/// the completion signal for the caller.
pub fn spawn_decorate<Ti, To, F>(
    count: usize,
    input: AsyncReceiver<Ti>,
    output: AsyncSender<To>,
    transform: F,
) -> JoinHandle<()>
where
    Ti: Send + 'static,
    To: Send + 'static,
    F: Fn(Ti) -> Result<To> + Send + Sync + 'static,
{
    tokio::spawn(decorate(count, input, output, transform))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::HashSet;
    use std::time::Duration;

    fn letter(i: u32) -> String {
        char::from_u32('A' as u32 + i).unwrap().to_string()
    }

    #[tokio::test]
    async fn test_decoration_with_two_workers() {
        let (chin_tx, chin_rx) = kanal::bounded_async(4);
        let (chout_tx, chout_rx) = kanal::bounded_async(4);

        for i in 0..3u32 {
            chin_tx.send(i).await.unwrap();
        }
        drop(chin_tx);

        decorate(2, chin_rx, chout_tx, |i| Ok(letter(i))).await;

        let mut results = HashSet::new();
        while let Ok(out) = chout_rx.recv().await {
            results.insert(out);
        }
        let expected: HashSet<_> = ["A", "B", "C"].map(String::from).into();
        assert_eq!(results, expected);
    }

    #[tokio::test]
    async fn test_identity_preserves_multiset() {
        for count in 1..=4usize {
            let (chin_tx, chin_rx) = kanal::bounded_async(16);
            let (chout_tx, chout_rx) = kanal::bounded_async(16);

            for i in 0..10u32 {
                chin_tx.send(i).await.unwrap();
            }
            drop(chin_tx);

            decorate(count, chin_rx, chout_tx, Ok).await;

            let mut results = Vec::new();
            while let Ok(out) = chout_rx.recv().await {
                results.push(out);
            }
            results.sort_unstable();
            assert_eq!(results, (0..10u32).collect::<Vec<_>>(), "count={count}");
        }
    }

    #[tokio::test]
    async fn test_errors_drop_items() {
        let (chin_tx, chin_rx) = kanal::bounded_async(4);
        let (chout_tx, chout_rx) = kanal::bounded_async(4);

        for i in 0..3u32 {
            chin_tx.send(i).await.unwrap();
        }
        drop(chin_tx);

        decorate(2, chin_rx, chout_tx, |i| {
            if i == 1 {
                Err(Error::Transform("bad item".into()))
            } else {
                Ok(letter(i))
            }
        })
        .await;

        let mut results = HashSet::new();
        while let Ok(out) = chout_rx.recv().await {
            results.insert(out);
        }
        let expected: HashSet<_> = ["A", "C"].map(String::from).into();
        assert_eq!(results, expected);
    }

    #[tokio::test]
    async fn test_zero_workers_closes_output() {
        let (chin_tx, chin_rx) = kanal::bounded_async::<u32>(4);
        let (chout_tx, chout_rx) = kanal::bounded_async::<u32>(4);
        chin_tx.send(1).await.unwrap();

        let handle = spawn_decorate(0, chin_rx, chout_tx, Ok);
        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("pool did not signal completion")
            .unwrap();

        // closed with zero items
        assert!(chout_rx.recv().await.is_err());
    }
}
