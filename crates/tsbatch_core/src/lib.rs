//! # tsbatch_core
//!
//! Core types and traits for windowed time series mini-batching.
//!
//! This crate provides:
//! - [`ScalarSeries`] capability, [`Bar`] and [`Timeline`] for indicator data
//! - [`WindowBatch`] input/output tensors with optional masks
//! - [`BatchShape`] shape metadata
//! - [`PreProcessor`] hooks and the [`BatchNormalizer`] contract
//! - [`Seed`] for reproducible shuffling
//! - Error types and common utilities
//!
//! ## Shape Convention
//!
//! Batch tensors follow `(B, F, T)`:
//! - `B`: Batch size (windows per batch)
//! - `F`: Features (series in a group)
//! - `T`: Time steps in the window
//!
//! Masks are `(B, T)` with 1.0 marking real data.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod normalize;
mod preprocess;
mod seed;
mod series;
mod shape;
mod tensor;

pub use error::{CoreError, Result};
pub use normalize::{BatchNormalizer, MinMaxLabelsFromFeatures};
pub use preprocess::{Compose, Identity, PreProcessor};
pub use seed::Seed;
pub use series::{Bar, ScalarSeries, SeriesGroup, Timeline, VecSeries};
pub use shape::BatchShape;
pub use tensor::{BurnWindowBatch, WindowBatch};
