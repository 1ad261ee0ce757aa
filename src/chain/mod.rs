//! Chain-of-responsibility concurrency core.
//!
//! This module defines the staged pipeline framework:
//!
//! - [`EntryStage`]: 0→1 source stage that launches a producer task
//! - [`DecoratorStage`]: 1→1 stage that consumes, transforms and emits
//! - [`SwitchStage`]: 1→N fan-out stage with index-addressed branches
//! - [`Chain`]: a composite [`Processor`] owning child processors under one
//!   cancellation scope and one error sink
//!
//! # Design
//!
//! Stages follow the "sync processing, async orchestration" principle: the
//! worker objects ([`Decorator`], [`Switcher`]) are **synchronous**, while
//! the runners handle channel scheduling and cancellation.
//!
//! Every runner derives a child [`CancellationToken`] from the scope it is
//! given and selects on it in each blocking receive. Non-fatal transform
//! errors go to the shared error sink; the reader of that sink decides
//! whether to cancel the chain scope. The [`Error::SkippedItem`] sentinel
//! is recognised by every runner: the item is dropped silently and the
//! sentinel never reaches the sink.
//!
//! Channels between stages are bounded [`kanal`] MPMC channels. A channel
//! closes when its writing stage drops the sender on exit; readers observe
//! the closure after draining.
//!
//! # Example
//!
//! ```rust,ignore
//! let (errtx, errrx) = kanal::bounded_async(16);
//! let (tx_raw, rx_raw) = kanal::bounded_async(0);
//! let (tx_out, rx_out) = kanal::bounded_async(0);
//!
//! let mut chain = Chain::new(errtx);
//! chain.add_step(EntryStage::new(tx_raw, scanner));
//! chain.add_step(DecoratorStage::new(rx_raw, tx_out, tagger));
//! chain.run(&scope).await;
//! ```
//!
//! [`Error::SkippedItem`]: crate::error::Error::SkippedItem
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

mod decorator;
mod entry;
mod pool;
mod processor;
mod switch;

pub use decorator::{Decorator, DecoratorStage};
pub use entry::{EntryPoint, EntryStage};
pub use pool::{decorate, spawn_decorate};
pub use processor::{Chain, ErrorSink, Processor, Stage, Worker};
pub use switch::{SwitchStage, Switcher};
