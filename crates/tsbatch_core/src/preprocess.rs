//! Pre-processing hooks applied to freshly produced batches.

use crate::error::Result;
use crate::tensor::WindowBatch;

/// A hook run on every raw batch before it is handed to the consumer.
///
/// The iterator only runs its hook when per-dataset scaling is disabled; the
/// two are alternative normalization paths.
///
/// # Example
///
/// ```rust
/// use tsbatch_core::{PreProcessor, WindowBatch, Result};
///
/// struct Clip(f32);
///
/// impl PreProcessor for Clip {
///     fn apply(&self, batch: &mut WindowBatch) -> Result<()> {
///         batch.input.mapv_inplace(|v| v.clamp(-self.0, self.0));
///         Ok(())
///     }
/// }
/// ```
pub trait PreProcessor: Send + Sync {
    /// Modify the batch in place.
    fn apply(&self, batch: &mut WindowBatch) -> Result<()>;

    /// Get the name of this hook for logging.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> PreProcessor for F
where
    F: Fn(&mut WindowBatch) -> Result<()> + Send + Sync,
{
    fn apply(&self, batch: &mut WindowBatch) -> Result<()> {
        self(batch)
    }
}

/// Hook that leaves the batch unchanged.
#[derive(Debug, Clone, Default)]
pub struct Identity;

impl PreProcessor for Identity {
    fn apply(&self, _batch: &mut WindowBatch) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "Identity"
    }
}

/// Runs several hooks in order, stopping at the first error.
#[derive(Default)]
pub struct Compose {
    hooks: Vec<Box<dyn PreProcessor>>,
}

impl Compose {
    /// Create an empty composition.
    #[must_use]
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Append a hook.
    pub fn push<P: PreProcessor + 'static>(&mut self, hook: P) {
        self.hooks.push(Box::new(hook));
    }

    /// Append a hook, builder style.
    #[must_use]
    pub fn then<P: PreProcessor + 'static>(mut self, hook: P) -> Self {
        self.push(hook);
        self
    }

    /// Number of hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Check if there are no hooks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl PreProcessor for Compose {
    fn apply(&self, batch: &mut WindowBatch) -> Result<()> {
        for hook in &self.hooks {
            hook.apply(batch)?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "Compose"
    }
}
