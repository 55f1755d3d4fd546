//! Configuration for portfolio risk aggregation.

use serde::{Deserialize, Serialize};

/// Controls how a portfolio is aggregated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Enable parallel processing (requires 'parallel' feature).
    pub parallel: bool,

    /// Minimum loan count to trigger parallel processing.
    pub parallel_threshold: usize,

    /// Attach a per-loan line to the portfolio summary.
    pub include_loan_detail: bool,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            parallel_threshold: 100,
            include_loan_detail: false,
        }
    }
}

impl AggregationConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A config that always runs sequentially.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_loan_detail(mut self, include: bool) -> Self {
        self.include_loan_detail = include;
        self
    }

    /// Returns true if parallel processing should be used for the given count.
    #[must_use]
    pub fn should_parallelize(&self, count: usize) -> bool {
        cfg!(feature = "parallel") && self.parallel && count >= self.parallel_threshold
    }
}
