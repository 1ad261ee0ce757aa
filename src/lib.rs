//! # Percept
//!
//! A plugin-oriented concurrent pipeline library for media-metadata
//! extraction and transformation.
//!
//! Plugins ("perceptors") consume typed items from an input channel,
//! produce transformed items on an output channel, and are composed into a
//! multi-stage pipeline executed under a shared cancellation scope.
//!
//! ## Features
//!
//! - **Staged pipelines**: entry points, decorators (1→1) and switches
//!   (1→N fan-out) composed into a [`chain::Chain`] with one error sink and
//!   one cancellation scope
//! - **Sync processing, async orchestration**: worker objects stay
//!   synchronous and deterministic; the runners handle scheduling,
//!   backpressure and cancellation
//! - **ExifTool coprocess driver**: a long-lived `exiftool -stay_open`
//!   child process with sentinel-framed responses, buffered and streamed
//!   output modes, and crash-recovery restart
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use percept::prelude::*;
//!
//! let (errtx, errrx) = kanal::bounded_async(16);
//! let mut chain = Chain::new(errtx);
//! chain.add_step(EntryStage::new(tx_items, scanner));
//! chain.add_step(DecoratorStage::new(rx_items, tx_tagged, tagger));
//!
//! let scope = CancellationToken::new();
//! chain.run(&scope).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod error;
pub mod exiftool;
pub mod item;
pub mod logging;
pub mod plugin;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::chain::{
        Chain, Decorator, DecoratorStage, EntryPoint, EntryStage, ErrorSink, Processor, Stage,
        SwitchStage, Switcher, Worker,
    };
    pub use crate::error::{Error, Result};
    pub use crate::item::{ItemData, ItemRef, RawExif, RawItem, Size};
    pub use crate::plugin::{DataProvider, ExifPerceptor, Perceptor, ProcessingMode};
    pub use tokio_util::sync::CancellationToken;
}

pub use error::{Error, Result};
