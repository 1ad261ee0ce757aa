//! Integration tests for the chain pipeline system.

use futures::future::BoxFuture;
use kanal::AsyncSender;
use percept::chain::{
    Chain, Decorator, DecoratorStage, EntryPoint, EntryStage, SwitchStage, Switcher, Worker,
};
use percept::error::{Error, Result};
use percept::prelude::CancellationToken;
use std::collections::HashMap;
use std::time::Duration;

/// Entry point producing `0..count` and passing items through unchanged.
struct NumberSource {
    count: u32,
}

impl Worker for NumberSource {
    fn stop(&mut self) {}
}

impl Decorator<u32, u32> for NumberSource {
    fn decorate(&mut self, input: u32) -> Result<u32> {
        Ok(input)
    }
}

impl EntryPoint<u32, u32> for NumberSource {
    fn start(
        &mut self,
        output: AsyncSender<u32>,
        scope: CancellationToken,
    ) -> BoxFuture<'static, ()> {
        let count = self.count;
        Box::pin(async move {
            for i in 0..count {
                tokio::select! {
                    _ = scope.cancelled() => return,
                    sent = output.send(i) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
        })
    }
}

/// Decorator mapping `0, 1, 2, ...` to `"A", "B", "C", ...`.
struct Letterer {
    fail_on: Option<u32>,
}

impl Worker for Letterer {
    fn stop(&mut self) {}
}

impl Decorator<u32, String> for Letterer {
    fn decorate(&mut self, input: u32) -> Result<String> {
        if Some(input) == self.fail_on {
            return Err(Error::Transform(format!("cannot decorate {input}")));
        }
        Ok(char::from_u32('A' as u32 + input).unwrap().to_string())
    }
}

/// Switch routing even numbers to branch 0 and odd numbers to branch 1.
struct ParitySwitch;

impl Worker for ParitySwitch {
    fn stop(&mut self) {}
}

impl Switcher<u32, String> for ParitySwitch {
    fn route(&mut self, input: u32) -> Result<HashMap<usize, String>> {
        let branch = (input % 2) as usize;
        let label = if branch == 0 { "even" } else { "odd" };
        Ok(HashMap::from([(branch, label.to_string())]))
    }
}

#[tokio::test]
async fn test_entry_and_decorator_chain() {
    let (errtx, errrx) = kanal::bounded_async(8);
    let (tx_nums, rx_nums) = kanal::bounded_async(0);
    let (tx_letters, rx_letters) = kanal::bounded_async(0);

    let mut chain = Chain::new(errtx);
    chain.add_step(EntryStage::new(tx_nums, NumberSource { count: 3 }));
    chain.add_step(DecoratorStage::new(
        rx_nums,
        tx_letters,
        Letterer { fail_on: None },
    ));

    let scope = CancellationToken::new();
    let handle = tokio::spawn(chain.run_owned(scope.clone()));

    let mut results = Vec::new();
    for _ in 0..3 {
        let out = tokio::time::timeout(Duration::from_secs(1), rx_letters.recv())
            .await
            .expect("timeout waiting for output")
            .unwrap();
        results.push(out);
    }
    results.sort();
    assert_eq!(results, ["A", "B", "C"]);
    assert!(errrx.is_empty());

    scope.cancel();
    tokio::time::timeout(Duration::from_millis(100), handle)
        .await
        .expect("chain did not return after cancel")
        .unwrap();
}

#[tokio::test]
async fn test_error_mid_stream_reaches_sink_once() {
    let (errtx, errrx) = kanal::bounded_async(8);
    let (tx_nums, rx_nums) = kanal::bounded_async(0);
    let (tx_letters, rx_letters) = kanal::bounded_async(4);

    let mut chain = Chain::new(errtx);
    chain.add_step(EntryStage::new(tx_nums, NumberSource { count: 3 }));
    chain.add_step(DecoratorStage::new(
        rx_nums,
        tx_letters,
        Letterer { fail_on: Some(1) },
    ));

    let scope = CancellationToken::new();
    let handle = tokio::spawn(chain.run_owned(scope.clone()));

    let mut results = Vec::new();
    for _ in 0..2 {
        let out = tokio::time::timeout(Duration::from_secs(1), rx_letters.recv())
            .await
            .expect("timeout waiting for output")
            .unwrap();
        results.push(out);
    }
    results.sort();
    assert_eq!(results, ["A", "C"]);

    // exactly one item on the sink
    let err = tokio::time::timeout(Duration::from_secs(1), errrx.recv())
        .await
        .expect("timeout waiting for sink error")
        .unwrap();
    assert!(matches!(err, Error::Transform(_)));
    assert!(errrx.is_empty());

    scope.cancel();
    tokio::time::timeout(Duration::from_millis(100), handle)
        .await
        .expect("chain did not return after cancel")
        .unwrap();
}

#[tokio::test]
async fn test_three_stage_chain_with_fanout() {
    let (errtx, errrx) = kanal::bounded_async(8);
    let (tx_raw, rx_raw) = kanal::bounded_async(0);
    let (tx_nums, rx_nums) = kanal::bounded_async(0);
    let (tx_even, rx_even) = kanal::bounded_async(4);
    let (tx_odd, rx_odd) = kanal::bounded_async(4);

    // identity decorator keeping the numbers numeric for the switch
    struct Passthrough;
    impl Worker for Passthrough {
        fn stop(&mut self) {}
    }
    impl Decorator<u32, u32> for Passthrough {
        fn decorate(&mut self, input: u32) -> Result<u32> {
            Ok(input)
        }
    }

    let mut chain = Chain::new(errtx);
    chain.add_step(EntryStage::new(tx_raw, NumberSource { count: 2 }));
    chain.add_step(DecoratorStage::new(rx_raw, tx_nums, Passthrough));
    chain.add_step(SwitchStage::new(rx_nums, vec![tx_even, tx_odd], ParitySwitch));

    let scope = CancellationToken::new();
    let handle = tokio::spawn(chain.run_owned(scope.clone()));

    let even = tokio::time::timeout(Duration::from_secs(1), rx_even.recv())
        .await
        .expect("timeout on even branch")
        .unwrap();
    let odd = tokio::time::timeout(Duration::from_secs(1), rx_odd.recv())
        .await
        .expect("timeout on odd branch")
        .unwrap();
    assert_eq!(even, "even");
    assert_eq!(odd, "odd");
    assert!(errrx.is_empty());

    scope.cancel();
    tokio::time::timeout(Duration::from_millis(100), handle)
        .await
        .expect("chain did not return after cancel")
        .unwrap();
}

#[tokio::test]
async fn test_cancel_tears_down_blocked_stages() {
    let (errtx, _errrx) = kanal::bounded_async(8);
    let (tx_nums, rx_nums) = kanal::bounded_async(0);
    // nothing ever reads the letters, so the decorator will block sending
    let (tx_letters, _rx_letters) = kanal::bounded_async::<String>(0);

    let mut chain = Chain::new(errtx);
    chain.add_step(EntryStage::new(tx_nums, NumberSource { count: 1000 }));
    chain.add_step(DecoratorStage::new(
        rx_nums,
        tx_letters,
        Letterer { fail_on: None },
    ));

    let scope = CancellationToken::new();
    let handle = tokio::spawn(chain.run_owned(scope.clone()));

    // let the pipeline wedge itself against the unread output
    tokio::time::sleep(Duration::from_millis(10)).await;
    scope.cancel();
    drop(_rx_letters);

    tokio::time::timeout(Duration::from_millis(100), handle)
        .await
        .expect("chain did not return after cancel")
        .unwrap();
}
