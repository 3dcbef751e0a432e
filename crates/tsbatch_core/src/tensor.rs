//! Batch tensor types.

use burn::prelude::*;
use burn::tensor::TensorData;
use ndarray::{Array2, Array3};

use crate::error::{CoreError, Result};
use crate::normalize::MinMaxLabelsFromFeatures;
use crate::shape::BatchShape;

/// A mini-batch of input/output windows with optional masks.
///
/// Shapes:
/// - `input`: `(B, F_in, T_in)`
/// - `output`: `(B, F_out, T_out)`
/// - masks: `(B, T)`, 1.0 for real data and 0.0 for padding
///
/// When masks are present both tensors share `T = max(T_in, T_out)`.
#[derive(Debug, Clone)]
pub struct WindowBatch {
    /// Input features.
    pub input: Array3<f32>,
    /// Output (target) features.
    pub output: Array3<f32>,
    /// Valid input time steps.
    pub input_mask: Option<Array2<f32>>,
    /// Valid output time steps.
    pub output_mask: Option<Array2<f32>>,
    /// Names of the output classes or features.
    pub labels: Vec<String>,
    /// Scaler fitted on this batch when per-dataset scaling is active.
    pub scaler: Option<MinMaxLabelsFromFeatures>,
}

impl WindowBatch {
    /// Allocate a zero-filled batch.
    ///
    /// With `masking` both tensors and the masks use the longer of the two
    /// window lengths; otherwise each tensor keeps its own length and no
    /// masks are allocated.
    #[must_use]
    pub fn zeros(
        batch_size: usize,
        input_features: usize,
        output_features: usize,
        input_len: usize,
        output_len: usize,
        masking: bool,
    ) -> Self {
        if masking {
            let len = input_len.max(output_len);
            Self {
                input: Array3::zeros((batch_size, input_features, len)),
                output: Array3::zeros((batch_size, output_features, len)),
                input_mask: Some(Array2::zeros((batch_size, len))),
                output_mask: Some(Array2::zeros((batch_size, len))),
                labels: Vec::new(),
                scaler: None,
            }
        } else {
            Self {
                input: Array3::zeros((batch_size, input_features, input_len)),
                output: Array3::zeros((batch_size, output_features, output_len)),
                input_mask: None,
                output_mask: None,
                labels: Vec::new(),
                scaler: None,
            }
        }
    }

    /// Create an unmasked batch from existing tensors.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch dimensions differ.
    pub fn new(input: Array3<f32>, output: Array3<f32>) -> Result<Self> {
        if input.dim().0 != output.dim().0 {
            return Err(CoreError::ShapeMismatch(format!(
                "input batch size {} != output batch size {}",
                input.dim().0,
                output.dim().0
            )));
        }
        Ok(Self {
            input,
            output,
            input_mask: None,
            output_mask: None,
            labels: Vec::new(),
            scaler: None,
        })
    }

    /// Attach masks.
    ///
    /// # Errors
    ///
    /// Returns an error if a mask does not match `(B, T)` of its tensor.
    pub fn with_masks(mut self, input_mask: Array2<f32>, output_mask: Array2<f32>) -> Result<Self> {
        let (b, _, t_in) = self.input.dim();
        let (_, _, t_out) = self.output.dim();
        if input_mask.dim() != (b, t_in) {
            return Err(CoreError::ShapeMismatch(format!(
                "input mask {:?} != ({}, {})",
                input_mask.dim(),
                b,
                t_in
            )));
        }
        if output_mask.dim() != (b, t_out) {
            return Err(CoreError::ShapeMismatch(format!(
                "output mask {:?} != ({}, {})",
                output_mask.dim(),
                b,
                t_out
            )));
        }
        self.input_mask = Some(input_mask);
        self.output_mask = Some(output_mask);
        Ok(self)
    }

    /// Attach label names.
    #[must_use]
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    /// Shape of the input tensor.
    #[must_use]
    pub fn input_shape(&self) -> BatchShape {
        self.input.dim().into()
    }

    /// Shape of the output tensor.
    #[must_use]
    pub fn output_shape(&self) -> BatchShape {
        self.output.dim().into()
    }

    /// Number of rows.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.input.dim().0
    }

    /// Whether the batch carries masks.
    #[must_use]
    pub fn is_masked(&self) -> bool {
        self.input_mask.is_some() && self.output_mask.is_some()
    }

    /// Convert to burn tensors on `device`.
    pub fn to_burn<B: Backend>(&self, device: &B::Device) -> BurnWindowBatch<B> {
        BurnWindowBatch {
            input: tensor3(&self.input, device),
            output: tensor3(&self.output, device),
            input_mask: self.input_mask.as_ref().map(|m| tensor2(m, device)),
            output_mask: self.output_mask.as_ref().map(|m| tensor2(m, device)),
        }
    }
}

fn tensor3<B: Backend>(array: &Array3<f32>, device: &B::Device) -> Tensor<B, 3> {
    let (a, b, c) = array.dim();
    let flat: Vec<f32> = array.iter().copied().collect();
    Tensor::<B, 3>::from_floats(TensorData::new(flat, [a, b, c]), device)
}

fn tensor2<B: Backend>(array: &Array2<f32>, device: &B::Device) -> Tensor<B, 2> {
    let (a, b) = array.dim();
    let flat: Vec<f32> = array.iter().copied().collect();
    Tensor::<B, 2>::from_floats(TensorData::new(flat, [a, b]), device)
}

/// A [`WindowBatch`] moved onto a burn device, ready for a training step.
#[derive(Debug, Clone)]
pub struct BurnWindowBatch<B: Backend> {
    /// Input features `(B, F_in, T)`.
    pub input: Tensor<B, 3>,
    /// Output features `(B, F_out, T)`.
    pub output: Tensor<B, 3>,
    /// Input mask `(B, T)`.
    pub input_mask: Option<Tensor<B, 2>>,
    /// Output mask `(B, T)`.
    pub output_mask: Option<Tensor<B, 2>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_zeros_masked_uses_longest_window() {
        let batch = WindowBatch::zeros(2, 3, 1, 4, 6, true);
        assert_eq!(batch.input_shape(), BatchShape::new(2, 3, 6));
        assert_eq!(batch.output_shape(), BatchShape::new(2, 1, 6));
        assert_eq!(batch.input_mask.as_ref().unwrap().dim(), (2, 6));
        assert!(batch.is_masked());
    }

    #[test]
    fn test_zeros_unmasked_keeps_own_lengths() {
        let batch = WindowBatch::zeros(2, 3, 1, 4, 6, false);
        assert_eq!(batch.input_shape(), BatchShape::new(2, 3, 4));
        assert_eq!(batch.output_shape(), BatchShape::new(2, 1, 6));
        assert!(!batch.is_masked());
    }

    #[test]
    fn test_new_rejects_batch_mismatch() {
        let err = WindowBatch::new(Array3::zeros((2, 1, 3)), Array3::zeros((3, 1, 3)));
        assert!(err.is_err());
    }

    #[test]
    fn test_with_masks_checks_dims() {
        let batch = WindowBatch::new(Array3::zeros((2, 1, 3)), Array3::zeros((2, 1, 3))).unwrap();
        assert!(batch
            .clone()
            .with_masks(Array2::zeros((2, 3)), Array2::zeros((2, 4)))
            .is_err());
        assert!(batch
            .with_masks(Array2::zeros((2, 3)), Array2::zeros((2, 3)))
            .is_ok());
    }

    #[test]
    fn test_to_burn_preserves_layout() {
        let mut batch = WindowBatch::zeros(1, 2, 1, 3, 1, true);
        batch.input[[0, 1, 2]] = 5.0;
        batch.output[[0, 0, 2]] = 1.0;

        let device = Default::default();
        let burn_batch = batch.to_burn::<TestBackend>(&device);

        assert_eq!(burn_batch.input.dims(), [1, 2, 3]);
        assert_eq!(burn_batch.output.dims(), [1, 1, 3]);
        assert_eq!(burn_batch.input_mask.as_ref().unwrap().dims(), [1, 3]);

        let values: Vec<f32> = burn_batch.input.into_data().to_vec().unwrap();
        assert_eq!(values, vec![0.0, 0.0, 0.0, 0.0, 0.0, 5.0]);
    }
}
