//! Chance-constrained capacity offer via ALSO-X bisection.
//!
//! The exact requirement is `P(offer - load > 0) <= eps` over the empirical
//! (timestep, scenario) samples. For a fixed violation budget `q` the
//! big-M relaxation
//!
//! ```text
//! max  offer
//! s.t. offer - load[s][t] <= M * y[t][s]        for all t, s
//!      sum(y) <= q
//!      0 <= y <= 1,  offer >= 0
//! ```
//!
//! is an LP whose optimal offer never decreases as `q` grows. The outer loop
//! bisects `q` on `[0, q_overbar]`, keeping the largest budget whose LP
//! solution still meets the chance constraint when checked sample by sample.

use good_lp::{Expression, Variable, constraint, variable};
use tracing::{debug, warn};

use crate::ensemble::ScenarioEnsemble;
use crate::error::{BidError, BidResult};
use crate::reserve::validate_eps;
use crate::solver::{Formulation, ProblemBuilder, ProblemSummary, Sense, SolvedProblem, solve};

/// Default bound on bisection iterations.
pub const DEFAULT_MAX_ITERATIONS: usize = 200;

/// Relative slack below which a sample counts as covered by the offer.
const VIOLATION_TOL: f64 = 1e-6;

/// Parameters of the violation-budget search.
#[derive(Debug, Clone, PartialEq)]
pub struct AlsoXParams {
    /// Allowed violation probability, in `(0, 1)`.
    pub eps: f64,
    /// Bisection stops once the bracket on `q` is narrower than this.
    pub tolerance: f64,
    /// Upper end of the initial bracket on the violation budget `q`.
    pub q_overbar: f64,
    /// Big-M constant; derived from the ensemble range when `None`.
    pub big_m: Option<f64>,
    /// Iteration bound after which the search reports non-convergence.
    pub max_iterations: usize,
}

impl AlsoXParams {
    /// Parameters with a derived big-M and the default iteration bound.
    pub fn new(eps: f64, tolerance: f64, q_overbar: f64) -> Self {
        Self {
            eps,
            tolerance,
            q_overbar,
            big_m: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Overrides the big-M constant.
    pub fn with_big_m(mut self, big_m: f64) -> Self {
        self.big_m = Some(big_m);
        self
    }

    /// Overrides the iteration bound.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    fn validate(&self) -> BidResult<()> {
        validate_eps(self.eps)?;
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(BidError::config("reserve.tolerance", "must be > 0"));
        }
        if !(self.q_overbar.is_finite() && self.q_overbar > 0.0) {
            return Err(BidError::config("reserve.q_overbar", "must be > 0"));
        }
        if self.max_iterations == 0 {
            return Err(BidError::config("reserve.max_iterations", "must be > 0"));
        }
        Ok(())
    }
}

/// Result of the violation-budget search.
#[derive(Debug, Clone, PartialEq)]
pub struct AlsoXOffer {
    /// Capacity pledged to the reserve market.
    pub offer_capacity: f64,
    /// Violation budget `q` of the accepted solve.
    pub violation_budget: f64,
    /// Fraction of samples the accepted offer exceeds.
    pub violation_fraction: f64,
    /// Big-M constant used in every inner solve.
    pub big_m: f64,
    /// Bisection iterations performed (the `q = 0` solve excluded).
    pub iterations: usize,
    /// Summary of the accepted solve.
    pub problem: ProblemSummary,
}

/// Smallest big-M that dominates every deficit an admissible offer can cause.
///
/// Offers above `max(load_max, 0)` violate every sample, so the largest
/// deficit that matters is `max(load_max, 0) - load_min`. A flat ensemble
/// falls back to its magnitude.
pub fn derive_big_m(profiles: &ScenarioEnsemble) -> f64 {
    let span = profiles.max().max(0.0) - profiles.min();
    if span > 0.0 {
        span
    } else {
        profiles.max().abs().max(1.0)
    }
}

/// Fraction of samples with `offer > load` beyond the numerical slack.
pub fn violation_fraction(profiles: &ScenarioEnsemble, offer: f64) -> f64 {
    let violated = profiles
        .values()
        .filter(|load| offer - load > VIOLATION_TOL * load.abs().max(1.0))
        .count();
    violated as f64 / profiles.num_samples() as f64
}

/// Inner LP for one violation budget.
struct BudgetedOffer<'a> {
    profiles: &'a ScenarioEnsemble,
    big_m: f64,
    q: f64,
}

impl Formulation for BudgetedOffer<'_> {
    type Handles = Variable;
    type Output = f64;

    fn label(&self) -> &'static str {
        "also_x_offer"
    }

    fn formulate(&self, builder: &mut ProblemBuilder) -> (Sense, Expression, Variable) {
        let p = self.profiles;
        let offer = builder.variable(variable().min(0.0));
        let y = builder.matrix(p.horizon(), p.num_scenarios(), variable().min(0.0).max(1.0));

        for (t, row) in y.iter().enumerate() {
            for (s, y_ts) in row.iter().enumerate() {
                builder.constrain(constraint!(offer - p.value(s, t) <= self.big_m * *y_ts));
            }
        }
        let total: Expression = y.iter().flatten().copied().sum();
        builder.constrain(constraint!(total <= self.q));

        (Sense::Maximise, Expression::from(offer), offer)
    }

    fn extract(&self, solved: &SolvedProblem, offer: Variable) -> f64 {
        solved.value(offer)
    }
}

struct Candidate {
    q: f64,
    offer: f64,
    fraction: f64,
    problem: ProblemSummary,
}

fn solve_budget(profiles: &ScenarioEnsemble, big_m: f64, q: f64) -> BidResult<Candidate> {
    let (offer, problem) = solve(&BudgetedOffer { profiles, big_m, q })?;
    Ok(Candidate {
        q,
        offer,
        fraction: violation_fraction(profiles, offer),
        problem,
    })
}

/// Largest offer meeting the empirical chance constraint, found by bisection
/// on the violation budget.
///
/// The `q = 0` problem admits no violations, so it is solved first and kept
/// as the fallback answer; every later midpoint only replaces it when its
/// solution passes the sample-by-sample check.
///
/// # Errors
///
/// * configuration error for `eps` outside `(0, 1)`, a non-positive
///   tolerance or `q_overbar`, or a big-M below [`derive_big_m`]
/// * solver error if an inner LP fails
/// * [`BidError::NotConverged`] if the bracket is still wider than the
///   tolerance after `max_iterations` midpoints
pub fn solve_also_x(profiles: &ScenarioEnsemble, params: &AlsoXParams) -> BidResult<AlsoXOffer> {
    params.validate()?;
    let derived = derive_big_m(profiles);
    let big_m = match params.big_m {
        Some(m) if !(m.is_finite() && m >= derived) => {
            return Err(BidError::config(
                "reserve.big_m",
                format!("must be >= {derived} (largest deficit in the ensemble), got {m}"),
            ));
        }
        Some(m) => m,
        None => derived,
    };

    let mut best = solve_budget(profiles, big_m, 0.0)?;
    let (mut lo, mut hi) = (0.0_f64, params.q_overbar);
    let mut iterations = 0_usize;

    while hi - lo >= params.tolerance {
        if iterations >= params.max_iterations {
            return Err(BidError::NotConverged {
                iterations,
                bracket_low: lo,
                bracket_high: hi,
            });
        }
        let q = 0.5 * (lo + hi);
        let candidate = solve_budget(profiles, big_m, q)?;
        let feasible = candidate.fraction <= params.eps;
        debug!(
            iteration = iterations,
            q,
            lo,
            hi,
            offer = candidate.offer,
            violation = candidate.fraction,
            feasible,
            "also-x bisection step"
        );
        if feasible {
            lo = q;
            best = candidate;
        } else {
            hi = q;
        }
        iterations += 1;
    }

    if hi == params.q_overbar {
        warn!(
            q_overbar = params.q_overbar,
            "no budget was rejected; the result may be capped by q_overbar"
        );
    }

    Ok(AlsoXOffer {
        offer_capacity: best.offer,
        violation_budget: best.q,
        violation_fraction: best.fraction,
        big_m,
        iterations,
        problem: best.problem,
    })
}
