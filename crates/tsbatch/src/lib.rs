//! # tsbatch
//!
//! Sliding-window mini-batches for financial time series sequence models.
//!
//! - **Series**: bars, timelines and the [`ScalarSeries`](core::ScalarSeries) capability
//! - **Splitting**: chronological head/tail views by position, fraction or date
//! - **Labels**: buy/sell/hold outputs from entry and exit rules
//! - **Batching**: masked windows, per-batch min-max scaling, shuffling
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tsbatch::prelude::*;
//!
//! let (train_in, valid_in) = train_test_split(&inputs, &SplitPoint::Fraction(0.8))?;
//! let (train_out, valid_out) = train_test_split(&outputs, &SplitPoint::Fraction(0.8))?;
//!
//! let mut train = WindowBatchIterator::builder(train_in, train_out)
//!     .batch_size(32)
//!     .input_length(60)
//!     .output_length(4)
//!     .scaling_per_dataset(true)
//!     .seed(Seed::new(42))
//!     .build()?;
//!
//! train.shuffle();
//! for batch in &mut train {
//!     let batch = batch?.to_burn::<NdArray>(&device);
//!     // forward / backward
//! }
//! train.reset();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub use tsbatch_core as core;
pub use tsbatch_data as data;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use tsbatch::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use tsbatch_core::{
        Bar, BatchNormalizer, BatchShape, BurnWindowBatch, Compose, CoreError, Identity,
        MinMaxLabelsFromFeatures, PreProcessor, ScalarSeries, Seed, SeriesGroup, Timeline,
        VecSeries, WindowBatch,
    };

    // Data
    pub use tsbatch_data::{
        split_group, train_test_split, DataError, IndexPermutation, LabelEncoder, Result,
        RuleError, RuleStrategy, SplitPoint, Strategy, TradeSignal, WindowBatchIterator,
        WindowConfig,
    };
}
