//! Perceptor plugin descriptors.
//!
//! A perceptor is a plugin that transforms items in a stream. It exports
//! just enough metadata for the host to build a chain from it: a unique
//! name, the kind of data it consumes, and how it groups items. The host
//! instantiates stages exclusively through these interfaces.

use crate::chain::Stage;
use crate::item::ItemRef;
use crate::logging::Logger;
use kanal::{AsyncReceiver, AsyncSender};

/// Source of data a perceptor works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DataProvider {
    /// Extracted EXIF metadata.
    Exif,
    /// Raw file contents.
    Raw,
    /// Derived metadata.
    Metadata,
}

/// How a perceptor handles items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ProcessingMode {
    /// One item at a time.
    SingleItem,
    /// Groups of related items.
    ItemGroup,
}

/// Core metadata every perceptor exports.
pub trait Perceptor: Send + Sync {
    /// Unique plugin name.
    fn name(&self) -> &str;
    /// The kind of data this perceptor consumes.
    fn data_provider(&self) -> DataProvider;
    /// How this perceptor groups items.
    fn processing_mode(&self) -> ProcessingMode;
}

/// A perceptor operating on extracted EXIF metadata.
pub trait ExifPerceptor: Perceptor {
    /// Build the pipeline stage for this perceptor over the given item
    /// channels. The chain binds its error sink when the stage is added.
    fn new_processor(
        &self,
        input: AsyncReceiver<ItemRef>,
        output: AsyncSender<ItemRef>,
        logger: Logger,
    ) -> Box<dyn Stage>;
}

/// Plain-data summary of a perceptor, for host-side listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerceptorInfo {
    /// Unique plugin name.
    pub name: String,
    /// The kind of data the perceptor consumes.
    pub data_provider: DataProvider,
    /// How the perceptor groups items.
    pub processing_mode: ProcessingMode,
}

impl PerceptorInfo {
    /// Describe a perceptor.
    pub fn from_perceptor(p: &dyn Perceptor) -> Self {
        Self {
            name: p.name().to_string(),
            data_provider: p.data_provider(),
            processing_mode: p.processing_mode(),
        }
    }
}
