//! Sliding-window batch iteration over aligned series groups.
//!
//! Each call to [`WindowBatchIterator::produce_batch`] cuts one input window
//! and one output window starting at the cursor and then moves the cursor by
//! the sliding step. Values are read through an [`IndexPermutation`], so a
//! shuffled iterator visits physical rows in random order while the cursor
//! itself still walks linearly.
//!
//! ```text
//!  logical   0   1   2   3   4   5   6 ...
//!  input     [ t=0 t=1 t=2 t=3 ]               input_length  = 4
//!  output                [ t=0 ]               output_length = 1, tAbs = 3
//!            ^ cursor, +step after each batch
//! ```
//!
//! The output window is end-aligned with the input window: output step `t`
//! sits at absolute slot `tAbs = t - output_length + input_length`.

use chrono::{DateTime, Utc};
use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tsbatch_core::{
    BatchShape, MinMaxLabelsFromFeatures, PreProcessor, ScalarSeries, Seed,
    SeriesGroup, WindowBatch,
};

use crate::error::{DataError, Result};
use crate::permutation::IndexPermutation;

/// Configuration for [`WindowBatchIterator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Rows per batch. Values below 1 are raised to 1.
    pub batch_size: usize,
    /// Time steps in the input window.
    pub input_length: usize,
    /// Time steps in the output window.
    pub output_length: usize,
    /// Cursor advance per batch. Values below 1 are raised to 1.
    pub sliding_window_step: usize,
    /// Allocate masks and a shared time axis for input and output.
    pub masking: bool,
    /// Fit and apply a min-max scaler on every batch.
    pub scaling_per_dataset: bool,
    /// Whether per-dataset scaling also scales the outputs.
    pub fit_label: bool,
    /// Advance the cursor after every row instead of once per batch.
    pub advance_per_row: bool,
    /// Seed for the shuffle stream; entropy when unset.
    pub seed: Option<Seed>,
}

impl Default for WindowConfig {
    /// One week of prediction from three months of history.
    fn default() -> Self {
        Self {
            batch_size: 1,
            input_length: 60,
            output_length: 4,
            sliding_window_step: 1,
            masking: true,
            scaling_per_dataset: false,
            fit_label: true,
            advance_per_row: false,
            seed: None,
        }
    }
}

impl WindowConfig {
    /// Create a configuration with the given window lengths.
    pub fn new(input_length: usize, output_length: usize) -> Self {
        Self {
            input_length,
            output_length,
            ..Default::default()
        }
    }

    /// Set the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the sliding window step.
    #[must_use]
    pub fn with_sliding_window_step(mut self, step: usize) -> Self {
        self.sliding_window_step = step;
        self
    }

    /// Enable or disable masking.
    #[must_use]
    pub fn with_masking(mut self, masking: bool) -> Self {
        self.masking = masking;
        self
    }

    /// Enable or disable per-dataset scaling.
    #[must_use]
    pub fn with_scaling_per_dataset(mut self, scaling: bool) -> Self {
        self.scaling_per_dataset = scaling;
        self
    }

    /// Set whether outputs are scaled.
    #[must_use]
    pub fn with_fit_label(mut self, fit_label: bool) -> Self {
        self.fit_label = fit_label;
        self
    }

    /// Advance the cursor per row.
    #[must_use]
    pub fn with_advance_per_row(mut self, per_row: bool) -> Self {
        self.advance_per_row = per_row;
        self
    }

    /// Set the shuffle seed.
    #[must_use]
    pub fn with_seed(mut self, seed: Seed) -> Self {
        self.seed = Some(seed);
        self
    }

    fn clamped(mut self) -> Self {
        if self.batch_size < 1 {
            tracing::debug!(batch_size = self.batch_size, "batch size raised to 1");
            self.batch_size = 1;
        }
        if self.sliding_window_step < 1 {
            tracing::debug!(
                step = self.sliding_window_step,
                "sliding window step raised to 1"
            );
            self.sliding_window_step = 1;
        }
        self
    }
}

/// Cells written in the batch under construction, `(B, T)` per tensor.
///
/// Tracked even when no masks are emitted so scaling never sees padding.
struct Validity {
    input: Array2<f32>,
    output: Array2<f32>,
}

/// Mutable iteration state. Only `produce_batch`, `reset` and `shuffle`
/// touch it.
#[derive(Debug, Clone)]
struct CursorState {
    current_index: usize,
    has_next: bool,
    permutation: IndexPermutation,
}

/// Produces fixed-shape mini-batches from input and output series groups.
///
/// # Example
///
/// ```rust,ignore
/// use tsbatch_data::{WindowBatchIterator, WindowConfig};
///
/// let mut it = WindowBatchIterator::builder(inputs, outputs)
///     .batch_size(32)
///     .input_length(60)
///     .output_length(4)
///     .build()?;
///
/// it.shuffle();
/// while it.has_next() {
///     let batch = it.next_batch()?;
///     // train on batch
/// }
/// it.reset();
/// ```
pub struct WindowBatchIterator {
    inputs: SeriesGroup,
    outputs: SeriesGroup,
    config: WindowConfig,
    label_positions: Vec<usize>,
    pre_processor: Option<Box<dyn PreProcessor>>,
    data_size: usize,
    rng: ChaCha8Rng,
    state: CursorState,
}

impl WindowBatchIterator {
    /// Create an iterator.
    ///
    /// # Errors
    ///
    /// Returns an error if either group is empty, the inputs hold no data, or
    /// scaling is enabled and an output has no input feature to borrow its
    /// range from.
    pub fn new(inputs: SeriesGroup, outputs: SeriesGroup, config: WindowConfig) -> Result<Self> {
        Self::with_label_positions(inputs, outputs, config, None)
    }

    fn with_label_positions(
        inputs: SeriesGroup,
        outputs: SeriesGroup,
        config: WindowConfig,
        label_positions: Option<Vec<usize>>,
    ) -> Result<Self> {
        if inputs.is_empty() {
            return Err(DataError::InvalidArgument(
                "input series group is empty".to_string(),
            ));
        }
        if outputs.is_empty() {
            return Err(DataError::InvalidArgument(
                "output series group is empty".to_string(),
            ));
        }
        let data_size = inputs[0].len();
        if data_size == 0 {
            return Err(DataError::InvalidArgument(
                "input series contain no data".to_string(),
            ));
        }

        let config = config.clamped();
        let rng = match config.seed {
            Some(seed) => seed.derive("shuffle").to_rng(),
            None => ChaCha8Rng::from_entropy(),
        };
        let label_positions = match label_positions {
            Some(positions) => {
                validate_label_positions(&positions, inputs.len(), outputs.len())?;
                positions
            }
            None => {
                let positions: Vec<usize> = (0..outputs.len()).collect();
                if config.scaling_per_dataset && config.fit_label {
                    validate_label_positions(&positions, inputs.len(), outputs.len())?;
                }
                positions
            }
        };

        tracing::debug!(
            inputs = inputs.len(),
            outputs = outputs.len(),
            data_size,
            batch_size = config.batch_size,
            input_length = config.input_length,
            output_length = config.output_length,
            step = config.sliding_window_step,
            masking = config.masking,
            "window batch iterator created"
        );

        Ok(Self {
            inputs,
            outputs,
            config,
            label_positions,
            pre_processor: None,
            data_size,
            rng,
            state: CursorState {
                current_index: 0,
                has_next: true,
                permutation: IndexPermutation::identity(data_size),
            },
        })
    }

    /// Create an iterator with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if either group is empty or the inputs hold no data.
    pub fn with_defaults(inputs: SeriesGroup, outputs: SeriesGroup) -> Result<Self> {
        Self::new(inputs, outputs, WindowConfig::default())
    }

    /// Create a builder.
    #[must_use]
    pub fn builder(inputs: SeriesGroup, outputs: SeriesGroup) -> WindowBatchIteratorBuilder {
        WindowBatchIteratorBuilder::new(inputs, outputs)
    }

    /// Produce a batch of up to `n` windows.
    ///
    /// Every row reads the window starting at the current cursor; the cursor
    /// then advances once by the sliding step (or once per row when
    /// `advance_per_row` is set). `n` above the batch size is clamped.
    ///
    /// # Errors
    ///
    /// Returns an error if per-dataset scaling or the pre-processing hook
    /// fails. The cursor and `has_next` are left unchanged in that case.
    pub fn produce_batch(&mut self, n: usize) -> Result<WindowBatch> {
        let rows = n.min(self.config.batch_size);
        if rows < n {
            tracing::debug!(requested = n, rows, "batch request clamped to batch size");
        }
        if self.config.scaling_per_dataset && self.config.fit_label {
            validate_label_positions(&self.label_positions, self.inputs.len(), self.outputs.len())?;
        }

        let mut batch = WindowBatch::zeros(
            self.config.batch_size,
            self.inputs.len(),
            self.outputs.len(),
            self.config.input_length,
            self.config.output_length,
            self.config.masking,
        )
        .with_labels(self.labels());
        let (input_steps, output_steps) = self.time_steps();
        let mut validity = Validity {
            input: Array2::zeros((self.config.batch_size, input_steps)),
            output: Array2::zeros((self.config.batch_size, output_steps)),
        };

        let step = self.config.sliding_window_step;
        let start = self.state.current_index;
        let mut cursor = start;
        let mut wrote = false;
        for row in 0..rows {
            wrote |= self.fill_row(&mut batch, &mut validity, row, cursor);
            if self.config.advance_per_row {
                cursor += step;
            }
        }
        if !self.config.advance_per_row {
            cursor += step;
        }

        if self.config.masking {
            batch.input_mask = Some(validity.input.clone());
            batch.output_mask = Some(validity.output.clone());
        }

        if self.config.scaling_per_dataset {
            let mut scaler = MinMaxLabelsFromFeatures::new(self.label_positions.clone())
                .fit_label(self.config.fit_label);
            scaler.fit_valid(&batch, Some(&validity.input))?;
            scaler.transform_valid(&mut batch, Some(&validity.input), Some(&validity.output))?;
            batch.scaler = Some(scaler);
        } else if let Some(hook) = &self.pre_processor {
            hook.apply(&mut batch)?;
        }

        // commit only once the batch is complete
        self.state.current_index = cursor;
        self.state.has_next = wrote;
        tracing::trace!(start, rows, has_next = wrote, cursor, "batch produced");

        Ok(batch)
    }

    /// Produce a full batch.
    ///
    /// # Errors
    ///
    /// See [`produce_batch`](Self::produce_batch).
    pub fn next_batch(&mut self) -> Result<WindowBatch> {
        self.produce_batch(self.config.batch_size)
    }

    /// Fill one row; returns whether any real value was written.
    fn fill_row(&self, batch: &mut WindowBatch, validity: &mut Validity, row: usize, start: usize) -> bool {
        let mut wrote = false;
        let input_length = self.config.input_length;
        let output_length = self.config.output_length;

        for (feature, series) in self.inputs.iter().enumerate() {
            for t in 0..input_length {
                if let Some(value) = self.read(series.as_ref(), start + t) {
                    batch.input[[row, feature, t]] = value as f32;
                    validity.input[[row, t]] = 1.0;
                    wrote = true;
                }
            }
        }

        for (feature, series) in self.outputs.iter().enumerate() {
            for t in 0..output_length {
                let t_abs = t as isize - output_length as isize + input_length as isize;
                let logical = start as isize + t_abs;
                if logical < 0 {
                    continue;
                }
                // masked batches share the input time axis; unmasked outputs
                // keep their own axis
                let column = if self.config.masking {
                    if t_abs < 0 {
                        continue;
                    }
                    t_abs as usize
                } else {
                    t
                };
                if let Some(value) = self.read(series.as_ref(), logical as usize) {
                    batch.output[[row, feature, column]] = value as f32;
                    validity.output[[row, column]] = 1.0;
                    wrote = true;
                }
            }
        }
        wrote
    }

    /// Value of `series` at logical position `logical`, if available.
    fn read(&self, series: &dyn ScalarSeries, logical: usize) -> Option<f64> {
        if logical >= series.len() {
            return None;
        }
        let physical = self.get_pos(logical)?;
        series.get(physical)
    }

    /// Physical row read for logical position `pos`.
    #[inline]
    #[must_use]
    pub fn get_pos(&self, pos: usize) -> Option<usize> {
        self.state.permutation.get(pos)
    }

    /// Whether the last batch contained any real value.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.state.has_next
    }

    /// Rewind the cursor. The permutation is kept.
    pub fn reset(&mut self) {
        self.state.current_index = 0;
        self.state.has_next = true;
    }

    /// Draw a new random permutation. The cursor is kept.
    pub fn shuffle(&mut self) {
        self.state.permutation.shuffle(&mut self.rng);
        tracing::debug!(data_size = self.data_size, "index permutation shuffled");
    }

    /// Next logical window start.
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.state.current_index
    }

    /// Last start position at which a full input window fits.
    #[must_use]
    pub fn max_index(&self) -> usize {
        self.data_size.saturating_sub(self.config.input_length)
    }

    /// Number of logical positions (length of the first input series).
    #[must_use]
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    /// The current permutation.
    #[must_use]
    pub fn permutation(&self) -> &IndexPermutation {
        &self.state.permutation
    }

    /// Number of input features.
    #[must_use]
    pub fn input_columns(&self) -> usize {
        self.inputs.len()
    }

    /// Number of output features.
    #[must_use]
    pub fn total_outcomes(&self) -> usize {
        self.outputs.len()
    }

    /// Rows per batch.
    #[must_use]
    pub fn batch(&self) -> usize {
        self.config.batch_size
    }

    /// Input window length.
    #[must_use]
    pub fn input_periods(&self) -> usize {
        self.config.input_length
    }

    /// Output window length.
    #[must_use]
    pub fn outcome_periods(&self) -> usize {
        self.config.output_length
    }

    /// Shape of produced input tensors.
    #[must_use]
    pub fn input_shape(&self) -> BatchShape {
        BatchShape::new(self.config.batch_size, self.inputs.len(), self.time_steps().0)
    }

    /// Shape of produced output tensors.
    #[must_use]
    pub fn output_shape(&self) -> BatchShape {
        BatchShape::new(self.config.batch_size, self.outputs.len(), self.time_steps().1)
    }

    fn time_steps(&self) -> (usize, usize) {
        let (input, output) = (self.config.input_length, self.config.output_length);
        if self.config.masking {
            let len = input.max(output);
            (len, len)
        } else {
            (input, output)
        }
    }

    /// Output label names, in output feature order.
    ///
    /// A categorical output contributes its class names; any other output
    /// contributes its series name.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.outputs
            .iter()
            .flat_map(|series| series.labels().unwrap_or_else(|| vec![series.name().to_string()]))
            .collect()
    }

    /// Begin times of the input timeline.
    #[must_use]
    pub fn dates(&self) -> Vec<DateTime<Utc>> {
        self.inputs[0].timeline().begin_times()
    }

    /// The effective configuration.
    #[must_use]
    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Always `true`: the cursor can be rewound.
    #[must_use]
    pub fn reset_supported(&self) -> bool {
        true
    }

    /// Always `false`: batches are produced synchronously.
    #[must_use]
    pub fn async_supported(&self) -> bool {
        false
    }

    /// Register the hook run on raw batches when scaling is off.
    pub fn set_pre_processor<P: PreProcessor + 'static>(&mut self, hook: P) {
        self.pre_processor = Some(Box::new(hook));
    }

    /// Remove the registered hook.
    pub fn clear_pre_processor(&mut self) {
        self.pre_processor = None;
    }

    /// The registered hook.
    #[must_use]
    pub fn pre_processor(&self) -> Option<&dyn PreProcessor> {
        self.pre_processor.as_deref()
    }

    /// Whether masks are produced.
    #[must_use]
    pub fn is_masking(&self) -> bool {
        self.config.masking
    }

    /// Enable or disable masking.
    pub fn set_masking(&mut self, masking: bool) {
        self.config.masking = masking;
    }

    /// Whether per-dataset scaling is active.
    #[must_use]
    pub fn is_scaling_per_dataset(&self) -> bool {
        self.config.scaling_per_dataset
    }

    /// Enable or disable per-dataset scaling.
    pub fn set_scaling_per_dataset(&mut self, scaling: bool) {
        self.config.scaling_per_dataset = scaling;
    }

    /// Whether scaling covers the outputs.
    #[must_use]
    pub fn is_fit_label(&self) -> bool {
        self.config.fit_label
    }

    /// Set whether scaling covers the outputs.
    pub fn set_fit_label(&mut self, fit_label: bool) {
        self.config.fit_label = fit_label;
    }

    /// Input feature whose range scales each output feature.
    #[must_use]
    pub fn label_positions(&self) -> &[usize] {
        &self.label_positions
    }

    /// Set the output to input position table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not cover every output feature or
    /// refers to a missing input feature.
    pub fn set_label_positions(&mut self, positions: Vec<usize>) -> Result<()> {
        validate_label_positions(&positions, self.inputs.len(), self.outputs.len())?;
        self.label_positions = positions;
        Ok(())
    }
}

fn validate_label_positions(positions: &[usize], inputs: usize, outputs: usize) -> Result<()> {
    if positions.len() < outputs {
        return Err(DataError::InvalidArgument(format!(
            "{} label positions for {} output features",
            positions.len(),
            outputs
        )));
    }
    if let Some(&bad) = positions.iter().find(|&&p| p >= inputs) {
        return Err(DataError::InvalidArgument(format!(
            "label position {} refers to missing input feature (have {})",
            bad, inputs
        )));
    }
    Ok(())
}

impl Iterator for WindowBatchIterator {
    type Item = Result<WindowBatch>;

    /// Yields batches until one comes back without any real value.
    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }
        match self.next_batch() {
            Ok(batch) if self.has_next() => Some(Ok(batch)),
            Ok(_) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

/// Builder for [`WindowBatchIterator`].
pub struct WindowBatchIteratorBuilder {
    inputs: SeriesGroup,
    outputs: SeriesGroup,
    config: WindowConfig,
    label_positions: Option<Vec<usize>>,
    pre_processor: Option<Box<dyn PreProcessor>>,
}

impl WindowBatchIteratorBuilder {
    /// Create a new builder with default settings.
    #[must_use]
    pub fn new(inputs: SeriesGroup, outputs: SeriesGroup) -> Self {
        Self {
            inputs,
            outputs,
            config: WindowConfig::default(),
            label_positions: None,
            pre_processor: None,
        }
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: WindowConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the batch size.
    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Set the input window length.
    #[must_use]
    pub fn input_length(mut self, length: usize) -> Self {
        self.config.input_length = length;
        self
    }

    /// Set the output window length.
    #[must_use]
    pub fn output_length(mut self, length: usize) -> Self {
        self.config.output_length = length;
        self
    }

    /// Set the sliding window step.
    #[must_use]
    pub fn sliding_window_step(mut self, step: usize) -> Self {
        self.config.sliding_window_step = step;
        self
    }

    /// Enable or disable masking.
    #[must_use]
    pub fn masking(mut self, masking: bool) -> Self {
        self.config.masking = masking;
        self
    }

    /// Enable or disable per-dataset scaling.
    #[must_use]
    pub fn scaling_per_dataset(mut self, scaling: bool) -> Self {
        self.config.scaling_per_dataset = scaling;
        self
    }

    /// Set whether scaling covers the outputs.
    #[must_use]
    pub fn fit_label(mut self, fit_label: bool) -> Self {
        self.config.fit_label = fit_label;
        self
    }

    /// Advance the cursor per row.
    #[must_use]
    pub fn advance_per_row(mut self, per_row: bool) -> Self {
        self.config.advance_per_row = per_row;
        self
    }

    /// Set the shuffle seed.
    #[must_use]
    pub fn seed(mut self, seed: Seed) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Set the output to input position table used by scaling.
    #[must_use]
    pub fn label_positions(mut self, positions: Vec<usize>) -> Self {
        self.label_positions = Some(positions);
        self
    }

    /// Register a pre-processing hook.
    #[must_use]
    pub fn pre_processor<P: PreProcessor + 'static>(mut self, hook: P) -> Self {
        self.pre_processor = Some(Box::new(hook));
        self
    }

    /// Build the iterator.
    ///
    /// # Errors
    ///
    /// Returns an error if the groups are empty, the inputs hold no data, or
    /// the label position table is invalid.
    pub fn build(self) -> Result<WindowBatchIterator> {
        let mut iterator = WindowBatchIterator::with_label_positions(
            self.inputs,
            self.outputs,
            self.config,
            self.label_positions,
        )?;
        iterator.pre_processor = self.pre_processor;
        Ok(iterator)
    }
}
