//! Repair and escalation of non-finite policy outputs.

use tch::{Kind, Tensor};
use tracing::warn;

use super::error::PolicyError;

/// Sanitizes inference actions before they reach the environment.
///
/// Non-finite elements are replaced with `0.0` (the middle of every joint
/// range) and the tensor is clamped to `[-1, 1]`. A run of more than
/// `limit` anomalous batches in a row is escalated to
/// [`PolicyError::NumericAnomaly`]; one clean batch resets the run.
#[derive(Debug, Clone)]
pub struct AnomalyGuard {
    limit: usize,
    consecutive: usize,
    total: usize,
}

impl AnomalyGuard {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            consecutive: 0,
            total: 0,
        }
    }

    /// Returns the repaired actions, or an error once the run of anomalous
    /// batches exceeds the limit.
    pub fn inspect(&mut self, actions: Tensor) -> Result<Tensor, PolicyError> {
        let finite = actions.isfinite();
        let anomalous = finite.logical_not().sum(Kind::Int64).int64_value(&[]);
        if anomalous == 0 {
            self.consecutive = 0;
            return Ok(actions.clamp(-1.0, 1.0));
        }

        self.consecutive += 1;
        self.total += 1;
        warn!(
            anomalous,
            consecutive = self.consecutive,
            limit = self.limit,
            "non-finite actions replaced with 0.0"
        );
        if self.consecutive > self.limit {
            return Err(PolicyError::NumericAnomaly {
                consecutive: self.consecutive,
                limit: self.limit,
            });
        }
        Ok(actions
            .where_self(&finite, &actions.zeros_like())
            .clamp(-1.0, 1.0))
    }

    /// Anomalous batches in the current run.
    pub fn consecutive(&self) -> usize {
        self.consecutive
    }

    /// Anomalous batches seen since construction.
    pub fn total(&self) -> usize {
        self.total
    }
}
