//! Categorical trading labels derived from strategy rules.
//!
//! A [`LabelEncoder`] turns a strategy into an output series: at every bar it
//! asks whether the entry rule fires (buy), otherwise whether the exit rule
//! fires (sell), otherwise it holds.
//!
//! | value | label  |
//! |-------|--------|
//! | 0.0   | `sell` |
//! | 1.0   | `buy`  |
//! | 2.0   | `hold` |

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tsbatch_core::{ScalarSeries, Timeline};

use crate::error::RuleError;

/// Label names in class-index order.
pub const LABELS: [&str; 3] = ["sell", "buy", "hold"];

/// Trading decision for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TradeSignal {
    /// Exit rule satisfied.
    #[default]
    Sell = 0,
    /// Entry rule satisfied.
    Buy = 1,
    /// Neither rule satisfied.
    Hold = 2,
}

impl TradeSignal {
    /// Class index as emitted into batch tensors.
    #[inline]
    pub fn value(&self) -> f64 {
        *self as u8 as f64
    }

    /// Position in [`LABELS`].
    #[inline]
    pub fn class_index(&self) -> usize {
        *self as usize
    }

    /// Label name.
    pub fn name(&self) -> &'static str {
        LABELS[self.class_index()]
    }

    /// Recover a signal from a tensor value.
    pub fn from_value(value: f64) -> Option<Self> {
        match value {
            v if v == 0.0 => Some(TradeSignal::Sell),
            v if v == 1.0 => Some(TradeSignal::Buy),
            v if v == 2.0 => Some(TradeSignal::Hold),
            _ => None,
        }
    }

    /// Recover a signal from its label name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sell" => Some(TradeSignal::Sell),
            "buy" => Some(TradeSignal::Buy),
            "hold" => Some(TradeSignal::Hold),
            _ => None,
        }
    }
}

impl std::fmt::Display for TradeSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A boolean condition evaluated at a bar index.
pub trait Rule: Send + Sync {
    /// Whether the rule holds at `index`.
    fn is_satisfied(&self, index: usize) -> Result<bool, RuleError>;
}

impl<F> Rule for F
where
    F: Fn(usize) -> Result<bool, RuleError> + Send + Sync,
{
    fn is_satisfied(&self, index: usize) -> Result<bool, RuleError> {
        self(index)
    }
}

/// Entry/exit rule pair of a trading strategy.
pub trait Strategy: Send + Sync {
    /// Whether a position should be opened at `index`.
    fn entry_satisfied(&self, index: usize) -> Result<bool, RuleError>;

    /// Whether a position should be closed at `index`.
    fn exit_satisfied(&self, index: usize) -> Result<bool, RuleError>;
}

/// A [`Strategy`] assembled from two rules.
pub struct RuleStrategy {
    entry: Box<dyn Rule>,
    exit: Box<dyn Rule>,
}

impl RuleStrategy {
    /// Create a strategy from its entry and exit rules.
    pub fn new(entry: impl Rule + 'static, exit: impl Rule + 'static) -> Self {
        Self {
            entry: Box::new(entry),
            exit: Box::new(exit),
        }
    }
}

impl Strategy for RuleStrategy {
    fn entry_satisfied(&self, index: usize) -> Result<bool, RuleError> {
        self.entry.is_satisfied(index)
    }

    fn exit_satisfied(&self, index: usize) -> Result<bool, RuleError> {
        self.exit.is_satisfied(index)
    }
}

/// Output series emitting a [`TradeSignal`] per bar.
///
/// Rule failures never escape: an error or a panic inside a rule yields the
/// default signal, which is [`TradeSignal::Sell`] unless configured otherwise.
///
/// Panics are caught with [`std::panic::catch_unwind`], so the process panic
/// hook still runs and prints its message for every panicking rule. Builds
/// with `panic = "abort"` cannot recover: a panicking rule aborts the process.
pub struct LabelEncoder {
    strategy: Arc<dyn Strategy>,
    timeline: Timeline,
    name: String,
    default_signal: TradeSignal,
    one_hot: bool,
}

impl LabelEncoder {
    /// Create an encoder for `strategy` over `timeline`.
    pub fn new(strategy: Arc<dyn Strategy>, timeline: Timeline) -> Self {
        Self {
            strategy,
            timeline,
            name: "signal".to_string(),
            default_signal: TradeSignal::Sell,
            one_hot: true,
        }
    }

    /// Set the series name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the signal used when rule evaluation fails.
    #[must_use]
    pub fn with_default_signal(mut self, signal: TradeSignal) -> Self {
        self.default_signal = signal;
        self
    }

    /// Mark values as categorical (one-hot) or continuous.
    #[must_use]
    pub fn with_one_hot(mut self, one_hot: bool) -> Self {
        self.one_hot = one_hot;
        self
    }

    /// The fallback signal.
    pub fn default_signal(&self) -> TradeSignal {
        self.default_signal
    }

    /// Set the fallback signal.
    pub fn set_default_signal(&mut self, signal: TradeSignal) {
        self.default_signal = signal;
    }

    /// Set the one-hot flag.
    pub fn set_one_hot(&mut self, one_hot: bool) {
        self.one_hot = one_hot;
    }

    /// Evaluate the strategy at `index`, falling back to the default signal.
    pub fn signal(&self, index: usize) -> TradeSignal {
        match self.evaluate(index) {
            Ok(signal) => signal,
            Err(err) => {
                tracing::warn!(index, error = %err, fallback = %self.default_signal, "rule evaluation failed");
                self.default_signal
            }
        }
    }

    /// Evaluate the strategy at `index`, surfacing failures.
    ///
    /// The exit rule is only consulted when the entry rule does not fire.
    pub fn evaluate(&self, index: usize) -> Result<TradeSignal, RuleError> {
        let strategy = &self.strategy;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<TradeSignal, RuleError> {
            if strategy.entry_satisfied(index)? {
                Ok(TradeSignal::Buy)
            } else if strategy.exit_satisfied(index)? {
                Ok(TradeSignal::Sell)
            } else {
                Ok(TradeSignal::Hold)
            }
        }));

        match outcome {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "rule panicked".to_string());
                Err(RuleError::new(index, message))
            }
        }
    }
}

impl ScalarSeries for LabelEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.timeline.len()
    }

    fn value(&self, index: usize) -> f64 {
        self.signal(index).value()
    }

    fn timeline(&self) -> Timeline {
        self.timeline.clone()
    }

    fn labels(&self) -> Option<Vec<String>> {
        Some(LABELS.iter().map(|s| s.to_string()).collect())
    }

    fn is_one_hot(&self) -> bool {
        self.one_hot
    }
}
