//! Bounded, ramp-limited random-walk trajectories.
//!
//! Consumption profiles for the reserve-offer solvers and synthetic wind and
//! price ensembles for the bidding optimizer all come from the same walk: the
//! first value is uniform on `[lower, upper]` and every later step is drawn
//! uniformly from the *feasible step interval*
//!
//! ```text
//! [max(-max_step, lower - current), min(max_step, upper - current)]
//! ```
//!
//! which keeps the next value inside both the absolute band and the ramp limit.
//! Randomness always comes from a caller-owned [`Rng`], so seeding is explicit.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::ensemble::ScenarioEnsemble;
use crate::error::{BidError, BidResult};

/// Absolute band and ramp limit for a random-walk trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileBounds {
    /// Smallest admissible value.
    pub lower: f64,
    /// Largest admissible value.
    pub upper: f64,
    /// Largest admissible change between consecutive samples.
    pub max_step: f64,
}

impl ProfileBounds {
    /// Validates and builds the bounds.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any input is not finite, if
    /// `lower > upper`, or if `max_step` is negative.
    pub fn new(lower: f64, upper: f64, max_step: f64) -> BidResult<Self> {
        if !lower.is_finite() || !upper.is_finite() || !max_step.is_finite() {
            return Err(BidError::config(
                "profile",
                "bounds and max_step must be finite",
            ));
        }
        if lower > upper {
            return Err(BidError::config(
                "profile.lower_bound",
                format!("must be <= upper_bound ({lower} > {upper})"),
            ));
        }
        if max_step < 0.0 {
            return Err(BidError::config("profile.max_step", "must be >= 0"));
        }
        Ok(Self {
            lower,
            upper,
            max_step,
        })
    }

    /// Feasible step interval from `current`.
    fn step_interval(&self, current: f64) -> (f64, f64) {
        let lo = (-self.max_step).max(self.lower - current);
        let hi = self.max_step.min(self.upper - current);
        // current is always inside [lower, upper], so lo <= 0 <= hi up to rounding
        (lo.min(0.0), hi.max(0.0))
    }
}

/// Draws one trajectory of `num_minutes` samples.
pub fn generate_profile<R: Rng>(
    rng: &mut R,
    num_minutes: usize,
    bounds: &ProfileBounds,
) -> Vec<f64> {
    let mut profile = Vec::with_capacity(num_minutes);
    if num_minutes == 0 {
        return profile;
    }

    let mut current = rng.random_range(bounds.lower..=bounds.upper);
    profile.push(current);
    for _ in 1..num_minutes {
        let (lo, hi) = bounds.step_interval(current);
        let step = rng.random_range(lo..=hi);
        current = (current + step).clamp(bounds.lower, bounds.upper);
        profile.push(current);
    }
    profile
}

/// Draws `num_profiles` independent trajectories as an ensemble.
///
/// # Errors
///
/// Returns a configuration error if either count is zero.
pub fn generate_ensemble<R: Rng>(
    rng: &mut R,
    num_profiles: usize,
    num_minutes: usize,
    bounds: &ProfileBounds,
) -> BidResult<ScenarioEnsemble> {
    if num_profiles == 0 {
        return Err(BidError::config("profile.num_profiles", "must be > 0"));
    }
    if num_minutes == 0 {
        return Err(BidError::config("profile.num_minutes", "must be > 0"));
    }
    let trajectories = (0..num_profiles)
        .map(|_| generate_profile(rng, num_minutes, bounds))
        .collect();
    ScenarioEnsemble::new(trajectories)
}

/// Draws system imbalance sign trajectories: `+1.0` (system long) with
/// probability `p_long`, otherwise `-1.0` (system short).
///
/// # Errors
///
/// Returns a configuration error if `p_long` lies outside `[0, 1]` or either
/// count is zero.
pub fn generate_imbalance_signs<R: Rng>(
    rng: &mut R,
    num_scenarios: usize,
    horizon: usize,
    p_long: f64,
) -> BidResult<ScenarioEnsemble> {
    if !(0.0..=1.0).contains(&p_long) {
        return Err(BidError::config("market.p_long", "must be in [0.0, 1.0]"));
    }
    if num_scenarios == 0 || horizon == 0 {
        return Err(BidError::config(
            "market",
            "imbalance scenario count and horizon must be > 0",
        ));
    }
    let trajectories = (0..num_scenarios)
        .map(|_| {
            (0..horizon)
                .map(|_| if rng.random_bool(p_long) { 1.0 } else { -1.0 })
                .collect()
        })
        .collect();
    ScenarioEnsemble::new(trajectories)
}

/// Seeded generator for callers that prefer an owned random source.
///
/// # Examples
///
/// ```
/// use vpp_bid::profile::{ProfileBounds, ProfileGenerator};
///
/// let bounds = ProfileBounds::new(220.0, 600.0, 35.0).unwrap();
/// let mut a = ProfileGenerator::with_seed(bounds, 7);
/// let mut b = ProfileGenerator::with_seed(bounds, 7);
/// assert_eq!(a.profile(60), b.profile(60));
/// ```
#[derive(Debug, Clone)]
pub struct ProfileGenerator {
    bounds: ProfileBounds,
    rng: StdRng,
}

impl ProfileGenerator {
    /// Creates a generator seeded from `seed`.
    pub fn with_seed(bounds: ProfileBounds, seed: u64) -> Self {
        Self {
            bounds,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Bounds used for every trajectory.
    pub fn bounds(&self) -> &ProfileBounds {
        &self.bounds
    }

    /// Draws the next trajectory.
    pub fn profile(&mut self, num_minutes: usize) -> Vec<f64> {
        generate_profile(&mut self.rng, num_minutes, &self.bounds)
    }

    /// Draws the next `num_profiles` trajectories as an ensemble.
    ///
    /// # Errors
    ///
    /// See [`generate_ensemble`].
    pub fn ensemble(&mut self, num_profiles: usize, num_minutes: usize) -> BidResult<ScenarioEnsemble> {
        generate_ensemble(&mut self.rng, num_profiles, num_minutes, &self.bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_bounds() {
        let err = ProfileBounds::new(600.0, 220.0, 35.0);
        assert!(matches!(err, Err(BidError::Config(ref e)) if e.field == "profile.lower_bound"));
    }

    #[test]
    fn rejects_negative_step() {
        assert!(ProfileBounds::new(0.0, 1.0, -0.1).is_err());
    }

    #[test]
    fn profile_respects_band_and_ramp() {
        let bounds = ProfileBounds::new(220.0, 600.0, 35.0).expect("valid bounds");
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let p = generate_profile(&mut rng, 240, &bounds);
            assert_eq!(p.len(), 240);
            for v in &p {
                assert!((220.0..=600.0).contains(v), "value {v} out of band");
            }
            for w in p.windows(2) {
                assert!((w[1] - w[0]).abs() <= 35.0 + 1e-9, "step {} too large", w[1] - w[0]);
            }
        }
    }

    #[test]
    fn tight_band_hits_both_edges_without_escaping() {
        // max_step larger than the band, so the interval is clipped by the band every step
        let bounds = ProfileBounds::new(0.0, 1.0, 5.0).expect("valid bounds");
        let mut rng = StdRng::seed_from_u64(3);
        let p = generate_profile(&mut rng, 500, &bounds);
        assert!(p.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn degenerate_band_is_constant() {
        let bounds = ProfileBounds::new(5.0, 5.0, 1.0).expect("valid bounds");
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(generate_profile(&mut rng, 4, &bounds), vec![5.0; 4]);
    }

    #[test]
    fn zero_step_freezes_first_value() {
        let bounds = ProfileBounds::new(0.0, 10.0, 0.0).expect("valid bounds");
        let mut rng = StdRng::seed_from_u64(9);
        let p = generate_profile(&mut rng, 10, &bounds);
        assert!(p.iter().all(|v| *v == p[0]));
    }

    #[test]
    fn seeded_generators_are_reproducible() {
        let bounds = ProfileBounds::new(220.0, 600.0, 35.0).expect("valid bounds");
        let mut g1 = ProfileGenerator::with_seed(bounds, 11);
        let mut g2 = ProfileGenerator::with_seed(bounds, 11);
        let e1 = g1.ensemble(4, 30).expect("ensemble");
        let e2 = g2.ensemble(4, 30).expect("ensemble");
        assert_eq!(e1, e2);
        assert!(e1.satisfies_bounds(220.0, 600.0, 35.0, 1e-9));
    }

    #[test]
    fn ensemble_rejects_zero_counts() {
        let bounds = ProfileBounds::new(0.0, 1.0, 0.1).expect("valid bounds");
        let mut rng = StdRng::seed_from_u64(0);
        assert!(generate_ensemble(&mut rng, 0, 10, &bounds).is_err());
        assert!(generate_ensemble(&mut rng, 3, 0, &bounds).is_err());
    }

    #[test]
    fn imbalance_signs_are_unit_valued() {
        let mut rng = StdRng::seed_from_u64(5);
        let signs = generate_imbalance_signs(&mut rng, 3, 24, 0.5).expect("signs");
        assert!(signs.values().all(|v| v == 1.0 || v == -1.0));

        let all_long = generate_imbalance_signs(&mut rng, 2, 5, 1.0).expect("signs");
        assert!(all_long.values().all(|v| v == 1.0));
        assert!(generate_imbalance_signs(&mut rng, 2, 5, 1.5).is_err());
    }
}
