//! Per-batch normalization.
//!
//! Financial series are non-stationary, so a scaler fitted once on the whole
//! training set drifts away from the data it sees later. Per-dataset scaling
//! fits a fresh [`MinMaxLabelsFromFeatures`] on every batch instead.
//!
//! Outputs are usually derived from inputs (a future close is predicted from
//! past closes), so outputs are scaled with the statistics of the input
//! feature they correspond to rather than their own:
//!
//! ```text
//! input[f]  -> (x - min[f]) / (max[f] - min[f])
//! output[o] -> (y - min[p[o]]) / (max[p[o]] - min[p[o]])   p = label positions
//! ```

use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::tensor::WindowBatch;

/// Fit/transform contract for batch normalizers.
pub trait BatchNormalizer: Send + Sync {
    /// Collect statistics from `batch`.
    fn fit(&mut self, batch: &WindowBatch) -> Result<()>;

    /// Scale `batch` in place with the fitted statistics.
    fn transform(&self, batch: &mut WindowBatch) -> Result<()>;

    /// Undo the output scaling, e.g. on model predictions.
    fn revert_labels(&self, output: &mut Array3<f32>) -> Result<()>;

    /// Whether `fit` has run.
    fn is_fitted(&self) -> bool;
}

/// Min-max scaler whose output ranges are borrowed from input features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxLabelsFromFeatures {
    label_positions: Vec<usize>,
    fit_label: bool,
    min: Vec<f32>,
    max: Vec<f32>,
    fitted: bool,
}

impl MinMaxLabelsFromFeatures {
    /// Create a scaler mapping output feature `o` to input feature
    /// `label_positions[o]`.
    #[must_use]
    pub fn new(label_positions: Vec<usize>) -> Self {
        Self {
            label_positions,
            fit_label: true,
            min: Vec::new(),
            max: Vec::new(),
            fitted: false,
        }
    }

    /// Whether outputs are scaled too.
    #[must_use]
    pub fn fit_label(mut self, fit_label: bool) -> Self {
        self.fit_label = fit_label;
        self
    }

    /// Per input feature minimum.
    #[must_use]
    pub fn min(&self) -> &[f32] {
        &self.min
    }

    /// Per input feature maximum.
    #[must_use]
    pub fn max(&self) -> &[f32] {
        &self.max
    }

    /// The output to input position table.
    #[must_use]
    pub fn label_positions(&self) -> &[usize] {
        &self.label_positions
    }

    fn position_for(&self, output_feature: usize) -> Result<usize> {
        let pos = *self.label_positions.get(output_feature).ok_or_else(|| {
            CoreError::InvalidArgument(format!(
                "no input position configured for output feature {}",
                output_feature
            ))
        })?;
        if pos >= self.min.len() {
            return Err(CoreError::InvalidArgument(format!(
                "label position {} refers to missing input feature (have {})",
                pos,
                self.min.len()
            )));
        }
        Ok(pos)
    }

    fn scale(&self, feature: usize, value: f32) -> f32 {
        let range = self.max[feature] - self.min[feature];
        if range > 0.0 {
            (value - self.min[feature]) / range
        } else {
            0.0
        }
    }
}

fn is_valid(mask: Option<&Array2<f32>>, row: usize, t: usize) -> bool {
    mask.map_or(true, |m| m[[row, t]] > 0.0)
}

fn check_validity(valid: Option<&Array2<f32>>, rows: usize, len: usize, what: &str) -> Result<()> {
    match valid {
        Some(v) if v.dim() != (rows, len) => {
            tracing::warn!(expected = ?(rows, len), actual = ?v.dim(), what, "validity shape mismatch");
            Err(CoreError::ShapeMismatch(format!(
                "{} validity {:?} != ({}, {})",
                what,
                v.dim(),
                rows,
                len
            )))
        }
        _ => Ok(()),
    }
}

impl MinMaxLabelsFromFeatures {
    /// Fit on the input cells marked valid in `input_valid` `(B, T_in)`.
    ///
    /// `None` treats every cell as real data. Callers that pad unmasked
    /// batches pass their own validity so padding never enters the range.
    ///
    /// # Errors
    ///
    /// Returns an error if `input_valid` does not match the input tensor or a
    /// label position refers to a missing input feature.
    pub fn fit_valid(&mut self, batch: &WindowBatch, input_valid: Option<&Array2<f32>>) -> Result<()> {
        let (rows, features, len) = batch.input.dim();
        check_validity(input_valid, rows, len, "input")?;

        let mut min = vec![f32::INFINITY; features];
        let mut max = vec![f32::NEG_INFINITY; features];
        for f in 0..features {
            for row in 0..rows {
                for t in 0..len {
                    if is_valid(input_valid, row, t) {
                        let v = batch.input[[row, f, t]];
                        min[f] = min[f].min(v);
                        max[f] = max[f].max(v);
                    }
                }
            }
            // No valid cell: keep the feature untouched at zero.
            if min[f] > max[f] {
                tracing::debug!(feature = f, "no valid cells, range left at zero");
                min[f] = 0.0;
                max[f] = 0.0;
            }
        }
        self.min = min;
        self.max = max;
        self.fitted = true;

        if self.fit_label {
            for o in 0..batch.output.dim().1 {
                self.position_for(o)?;
            }
        }
        tracing::trace!(features, min = ?self.min, max = ?self.max, "min-max scaler fitted");
        Ok(())
    }

    /// Scale the cells marked valid; padding is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the scaler is not fitted, the feature count
    /// differs from the fit, or a validity array has the wrong shape.
    pub fn transform_valid(
        &self,
        batch: &mut WindowBatch,
        input_valid: Option<&Array2<f32>>,
        output_valid: Option<&Array2<f32>>,
    ) -> Result<()> {
        if !self.fitted {
            return Err(CoreError::NotFitted);
        }
        let (rows, features, len) = batch.input.dim();
        if features != self.min.len() {
            tracing::warn!(fitted = self.min.len(), features, "scaler feature count mismatch");
            return Err(CoreError::ShapeMismatch(format!(
                "scaler fitted on {} features, batch has {}",
                self.min.len(),
                features
            )));
        }
        check_validity(input_valid, rows, len, "input")?;

        for row in 0..rows {
            for t in 0..len {
                if !is_valid(input_valid, row, t) {
                    continue;
                }
                for f in 0..features {
                    let v = batch.input[[row, f, t]];
                    batch.input[[row, f, t]] = self.scale(f, v);
                }
            }
        }

        if self.fit_label {
            let (rows, outputs, len) = batch.output.dim();
            check_validity(output_valid, rows, len, "output")?;
            for o in 0..outputs {
                let pos = self.position_for(o)?;
                for row in 0..rows {
                    for t in 0..len {
                        if is_valid(output_valid, row, t) {
                            let v = batch.output[[row, o, t]];
                            batch.output[[row, o, t]] = self.scale(pos, v);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl BatchNormalizer for MinMaxLabelsFromFeatures {
    fn fit(&mut self, batch: &WindowBatch) -> Result<()> {
        self.fit_valid(batch, batch.input_mask.as_ref())
    }

    fn transform(&self, batch: &mut WindowBatch) -> Result<()> {
        let input_mask = batch.input_mask.take();
        let output_mask = batch.output_mask.take();
        let result = self.transform_valid(batch, input_mask.as_ref(), output_mask.as_ref());
        batch.input_mask = input_mask;
        batch.output_mask = output_mask;
        result
    }

    fn revert_labels(&self, output: &mut Array3<f32>) -> Result<()> {
        if !self.fitted {
            return Err(CoreError::NotFitted);
        }
        if !self.fit_label {
            return Ok(());
        }
        let outputs = output.dim().1;
        for o in 0..outputs {
            let pos = self.position_for(o)?;
            let (lo, hi) = (self.min[pos], self.max[pos]);
            output
                .index_axis_mut(ndarray::Axis(1), o)
                .mapv_inplace(|v| v * (hi - lo) + lo);
        }
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.fitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn batch() -> WindowBatch {
        // two input features over 4 steps, one output at the last step
        let input = array![[[10.0, 20.0, 30.0, 0.0], [1.0, 1.0, 1.0, 0.0]]];
        let output = array![[[0.0, 0.0, 25.0, 0.0]]];
        WindowBatch::new(input, output)
            .unwrap()
            .with_masks(array![[1.0, 1.0, 1.0, 0.0]], array![[0.0, 0.0, 1.0, 0.0]])
            .unwrap()
    }

    #[test]
    fn test_fit_ignores_padding() {
        let mut scaler = MinMaxLabelsFromFeatures::new(vec![0]);
        scaler.fit(&batch()).unwrap();
        assert_eq!(scaler.min(), &[10.0, 1.0]);
        assert_eq!(scaler.max(), &[30.0, 1.0]);
    }

    #[test]
    fn test_transform_scales_outputs_with_mapped_input() {
        let mut b = batch();
        let mut scaler = MinMaxLabelsFromFeatures::new(vec![0]);
        scaler.fit(&b).unwrap();
        scaler.transform(&mut b).unwrap();

        assert_eq!(b.input[[0, 0, 0]], 0.0);
        assert_eq!(b.input[[0, 0, 1]], 0.5);
        assert_eq!(b.input[[0, 0, 2]], 1.0);
        // constant feature maps to zero, padding untouched
        assert_eq!(b.input[[0, 1, 1]], 0.0);
        assert_eq!(b.input[[0, 0, 3]], 0.0);
        assert_eq!(b.output[[0, 0, 2]], 0.75);
        assert_eq!(b.output[[0, 0, 0]], 0.0);
    }

    #[test]
    fn test_fit_label_false_leaves_outputs() {
        let mut b = batch();
        let mut scaler = MinMaxLabelsFromFeatures::new(vec![]).fit_label(false);
        scaler.fit(&b).unwrap();
        scaler.transform(&mut b).unwrap();
        assert_eq!(b.output[[0, 0, 2]], 25.0);
    }

    #[test]
    fn test_revert_labels_inverts_transform() {
        let mut b = batch();
        let mut scaler = MinMaxLabelsFromFeatures::new(vec![0]);
        scaler.fit(&b).unwrap();
        scaler.transform(&mut b).unwrap();
        scaler.revert_labels(&mut b.output).unwrap();
        assert!((b.output[[0, 0, 2]] - 25.0).abs() < 1e-5);
    }

    #[test]
    fn test_invalid_position_is_rejected() {
        let mut scaler = MinMaxLabelsFromFeatures::new(vec![5]);
        assert!(matches!(
            scaler.fit(&batch()),
            Err(CoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_unmasked_fit_uses_explicit_validity() {
        // unmasked window [14, 15, pad, pad]
        let mut b = WindowBatch::new(array![[[14.0, 15.0, 0.0, 0.0]]], array![[[15.0]]]).unwrap();
        let input_valid = array![[1.0, 1.0, 0.0, 0.0]];
        let output_valid = array![[1.0]];

        let mut scaler = MinMaxLabelsFromFeatures::new(vec![0]);
        scaler.fit_valid(&b, Some(&input_valid)).unwrap();
        assert_eq!(scaler.min(), &[14.0]);
        assert_eq!(scaler.max(), &[15.0]);

        scaler
            .transform_valid(&mut b, Some(&input_valid), Some(&output_valid))
            .unwrap();
        assert_eq!(b.input[[0, 0, 0]], 0.0);
        assert_eq!(b.input[[0, 0, 1]], 1.0);
        assert_eq!(b.input[[0, 0, 2]], 0.0);
        assert_eq!(b.output[[0, 0, 0]], 1.0);
    }

    #[test]
    fn test_validity_shape_is_checked() {
        let b = batch();
        let mut scaler = MinMaxLabelsFromFeatures::new(vec![0]);
        assert!(matches!(
            scaler.fit_valid(&b, Some(&Array2::zeros((1, 3)))),
            Err(CoreError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_transform_requires_fit() {
        let scaler = MinMaxLabelsFromFeatures::new(vec![0]);
        assert!(matches!(
            scaler.transform(&mut batch()),
            Err(CoreError::NotFitted)
        ));
    }
}
