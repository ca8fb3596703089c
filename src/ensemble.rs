//! Scenario-major ensembles of equal-length trajectories.

use crate::error::{BidError, BidResult};

/// An ordered collection of `S` trajectories, each holding `T` samples.
///
/// Storage is scenario-major: `trajectory(s)[t]` is the value of scenario `s`
/// at timestep `t`. Every solver in this crate reads ensembles through this
/// type, so there is exactly one axis convention. Use
/// [`ScenarioEnsemble::from_time_major`] when the source data is laid out as
/// one column per scenario.
///
/// # Examples
///
/// ```
/// use vpp_bid::ensemble::ScenarioEnsemble;
///
/// let ens = ScenarioEnsemble::new(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
/// assert_eq!(ens.num_scenarios(), 2);
/// assert_eq!(ens.horizon(), 3);
/// assert_eq!(ens.value(1, 0), 4.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioEnsemble {
    trajectories: Vec<Vec<f64>>,
    horizon: usize,
}

impl ScenarioEnsemble {
    /// Wraps scenario-major trajectories.
    ///
    /// # Errors
    ///
    /// Returns [`BidError::InvalidEnsemble`] if there are no scenarios, the
    /// horizon is zero, the trajectories differ in length, or any value is
    /// not finite.
    pub fn new(trajectories: Vec<Vec<f64>>) -> BidResult<Self> {
        let Some(first) = trajectories.first() else {
            return Err(BidError::InvalidEnsemble(
                "ensemble has no scenarios".to_string(),
            ));
        };
        let horizon = first.len();
        if horizon == 0 {
            return Err(BidError::InvalidEnsemble(
                "ensemble has an empty horizon".to_string(),
            ));
        }
        for (s, traj) in trajectories.iter().enumerate() {
            if traj.len() != horizon {
                return Err(BidError::InvalidEnsemble(format!(
                    "scenario {s} has {} samples, expected {horizon}",
                    traj.len()
                )));
            }
            if let Some(t) = traj.iter().position(|v| !v.is_finite()) {
                return Err(BidError::InvalidEnsemble(format!(
                    "scenario {s} has a non-finite value at t={t}"
                )));
            }
        }
        Ok(Self {
            trajectories,
            horizon,
        })
    }

    /// Builds an ensemble from time-major rows (`rows[t][s]`), transposing to
    /// the scenario-major layout.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ScenarioEnsemble::new`], checked after transposition.
    pub fn from_time_major(rows: &[Vec<f64>]) -> BidResult<Self> {
        let num_scenarios = rows.first().map_or(0, Vec::len);
        if let Some(t) = rows.iter().position(|r| r.len() != num_scenarios) {
            return Err(BidError::InvalidEnsemble(format!(
                "time-major row {t} has {} scenarios, expected {num_scenarios}",
                rows[t].len()
            )));
        }
        let trajectories = (0..num_scenarios)
            .map(|s| rows.iter().map(|row| row[s]).collect())
            .collect();
        Self::new(trajectories)
    }

    /// Single-scenario ensemble from one trajectory.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ScenarioEnsemble::new`].
    pub fn single(trajectory: Vec<f64>) -> BidResult<Self> {
        Self::new(vec![trajectory])
    }

    /// Number of scenarios `S`.
    pub fn num_scenarios(&self) -> usize {
        self.trajectories.len()
    }

    /// Number of timesteps `T`.
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Total number of (scenario, timestep) samples, `S * T`.
    pub fn num_samples(&self) -> usize {
        self.num_scenarios() * self.horizon
    }

    /// Value of scenario `s` at timestep `t`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    pub fn value(&self, s: usize, t: usize) -> f64 {
        self.trajectories[s][t]
    }

    /// Full trajectory of scenario `s`.
    pub fn trajectory(&self, s: usize) -> &[f64] {
        &self.trajectories[s]
    }

    /// Iterates over trajectories in scenario order.
    pub fn trajectories(&self) -> impl Iterator<Item = &[f64]> {
        self.trajectories.iter().map(Vec::as_slice)
    }

    /// Iterates over every sample regardless of axis.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.trajectories.iter().flatten().copied()
    }

    /// Smallest sample in the ensemble.
    pub fn min(&self) -> f64 {
        self.values().fold(f64::INFINITY, f64::min)
    }

    /// Largest sample in the ensemble.
    pub fn max(&self) -> f64 {
        self.values().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Per-timestep mean across scenarios.
    pub fn mean_trajectory(&self) -> Vec<f64> {
        let n = self.num_scenarios() as f64;
        (0..self.horizon)
            .map(|t| self.trajectories.iter().map(|traj| traj[t]).sum::<f64>() / n)
            .collect()
    }

    /// Checks the bounded random-walk invariant on every trajectory: all
    /// values within `[lower, upper]` and consecutive steps no larger than
    /// `max_step` in magnitude (up to `tol`).
    pub fn satisfies_bounds(&self, lower: f64, upper: f64, max_step: f64, tol: f64) -> bool {
        self.trajectories.iter().all(|traj| {
            traj.iter().all(|v| *v >= lower - tol && *v <= upper + tol)
                && traj.windows(2).all(|w| (w[1] - w[0]).abs() <= max_step + tol)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_ragged() {
        assert!(ScenarioEnsemble::new(Vec::new()).is_err());
        assert!(ScenarioEnsemble::new(vec![Vec::new()]).is_err());
        let ragged = ScenarioEnsemble::new(vec![vec![1.0, 2.0], vec![1.0]]);
        assert!(matches!(ragged, Err(BidError::InvalidEnsemble(_))));
    }

    #[test]
    fn rejects_non_finite_values() {
        let err = ScenarioEnsemble::new(vec![vec![1.0, f64::NAN]]);
        assert!(err.is_err());
    }

    #[test]
    fn time_major_input_is_transposed() {
        // rows[t][s]: 3 timesteps, 2 scenarios
        let rows = vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]];
        let ens = ScenarioEnsemble::from_time_major(&rows).expect("valid rows");
        assert_eq!(ens.num_scenarios(), 2);
        assert_eq!(ens.horizon(), 3);
        assert_eq!(ens.trajectory(0), &[1.0, 2.0, 3.0]);
        assert_eq!(ens.trajectory(1), &[10.0, 20.0, 30.0]);
        assert_eq!(ens.value(1, 2), 30.0);
    }

    #[test]
    fn statistics() {
        let ens = ScenarioEnsemble::new(vec![vec![1.0, 5.0], vec![3.0, -1.0]]).expect("valid");
        assert_eq!(ens.min(), -1.0);
        assert_eq!(ens.max(), 5.0);
        assert_eq!(ens.mean_trajectory(), vec![2.0, 2.0]);
        assert_eq!(ens.num_samples(), 4);
    }

    #[test]
    fn bound_check_detects_large_step() {
        let ens = ScenarioEnsemble::single(vec![0.0, 0.5, 0.6]).expect("valid");
        assert!(ens.satisfies_bounds(0.0, 1.0, 0.5, 1e-12));
        assert!(!ens.satisfies_bounds(0.0, 1.0, 0.4, 1e-12));
        assert!(!ens.satisfies_bounds(0.1, 1.0, 0.5, 1e-12));
    }
}
