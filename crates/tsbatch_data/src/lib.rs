//! # tsbatch_data
//!
//! Splitting, labeling and sliding-window batching of series groups.
//!
//! This crate provides:
//! - [`split_group`] and [`train_test_split`] for chronological splits
//! - [`LabelEncoder`] turning entry/exit rules into categorical outputs
//! - [`WindowBatchIterator`] for masked, optionally scaled mini-batches
//! - [`IndexPermutation`] for shuffled iteration
//!
//! ## Example
//!
//! ```rust,ignore
//! use tsbatch_data::{train_test_split, SplitPoint, WindowBatchIterator};
//! use tsbatch_core::Seed;
//!
//! let (train_in, valid_in) = train_test_split(&inputs, &SplitPoint::Fraction(0.8))?;
//! let (train_out, valid_out) = train_test_split(&outputs, &SplitPoint::Fraction(0.8))?;
//!
//! let mut train = WindowBatchIterator::builder(train_in, train_out)
//!     .batch_size(32)
//!     .seed(Seed::new(42))
//!     .build()?;
//! train.shuffle();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod iterator;
mod labels;
mod permutation;
mod splitter;

pub use error::{DataError, Result, RuleError};
pub use iterator::{WindowBatchIterator, WindowBatchIteratorBuilder, WindowConfig};
pub use labels::{LabelEncoder, Rule, RuleStrategy, Strategy, TradeSignal, LABELS};
pub use permutation::IndexPermutation;
pub use splitter::{
    find_split_position, split_at_date, split_at_fraction, split_at_position, split_group,
    train_test_split, SplitPoint, SplitSeries,
};
