//! CVaR-constrained capacity offer.
//!
//! Rockafellar-Uryasev linearisation over the empirical distribution of the
//! deficit `offer - load`:
//!
//! ```text
//! max  offer
//! s.t. offer - load[s][t] <= zeta[t][s]         for all t, s
//!      beta <= zeta[t][s]                       for all t, s
//!      beta <= 0
//!      (1 / (S*T)) * sum(zeta) <= (1 - eps) * beta
//!      offer >= 0
//! ```
//!
//! `beta` plays the role of the value-at-risk threshold and `zeta` the
//! per-sample loss above it. The optimum is the largest offer whose average
//! deficit over the worst `eps` fraction of samples is non-positive.

use good_lp::{Expression, Variable, constraint, variable};

use crate::ensemble::ScenarioEnsemble;
use crate::error::BidResult;
use crate::reserve::{CapacityOffer, validate_eps};
use crate::solver::{Formulation, ProblemBuilder, Sense, SolvedProblem, solve};

/// CVaR offer problem over a fixed ensemble.
struct CvarOffer<'a> {
    profiles: &'a ScenarioEnsemble,
    eps: f64,
}

impl Formulation for CvarOffer<'_> {
    type Handles = Variable;
    type Output = f64;

    fn label(&self) -> &'static str {
        "cvar_offer"
    }

    fn formulate(&self, builder: &mut ProblemBuilder) -> (Sense, Expression, Variable) {
        let p = self.profiles;
        let offer = builder.variable(variable().min(0.0));
        let beta = builder.variable(variable().max(0.0));
        let zeta = builder.matrix(p.horizon(), p.num_scenarios(), variable());

        for (t, row) in zeta.iter().enumerate() {
            for (s, z) in row.iter().enumerate() {
                builder.constrain(constraint!(offer - p.value(s, t) <= *z));
                builder.constrain(constraint!(beta <= *z));
            }
        }

        let n = p.num_samples() as f64;
        let total: Expression = zeta.iter().flatten().copied().sum();
        builder.constrain(constraint!((1.0 / n) * total <= (1.0 - self.eps) * beta));

        (Sense::Maximise, Expression::from(offer), offer)
    }

    fn extract(&self, solved: &SolvedProblem, offer: Variable) -> f64 {
        solved.value(offer)
    }
}

/// Largest offer whose empirical CVaR of `offer - load` at tail fraction
/// `eps` is non-positive.
///
/// # Errors
///
/// Returns a configuration error if `eps` lies outside `(0, 1)` and a solver
/// error if the LP cannot be solved.
pub fn solve_cvar(profiles: &ScenarioEnsemble, eps: f64) -> BidResult<CapacityOffer> {
    validate_eps(eps)?;
    let (offer_capacity, problem) = solve(&CvarOffer { profiles, eps })?;
    Ok(CapacityOffer {
        offer_capacity,
        problem,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BidError;

    /// Two scenarios of five minutes holding the values 1..=10.
    fn ladder() -> ScenarioEnsemble {
        ScenarioEnsemble::new(vec![
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
            vec![6.0, 7.0, 8.0, 9.0, 10.0],
        ])
        .expect("valid ensemble")
    }

    #[test]
    fn offer_is_mean_of_worst_tail() {
        // eps * N = 2 samples in the tail: mean(1, 2)
        let offer = solve_cvar(&ladder(), 0.2).expect("solves");
        assert!((offer.offer_capacity - 1.5).abs() < 1e-4, "{}", offer.offer_capacity);

        // eps * N = 5: mean(1..=5)
        let offer = solve_cvar(&ladder(), 0.5).expect("solves");
        assert!((offer.offer_capacity - 3.0).abs() < 1e-4, "{}", offer.offer_capacity);
    }

    #[test]
    fn small_eps_approaches_worst_case() {
        let offer = solve_cvar(&ladder(), 0.01).expect("solves");
        assert!((offer.offer_capacity - 1.0).abs() < 1e-4, "{}", offer.offer_capacity);
    }

    #[test]
    fn large_eps_approaches_ensemble_mean() {
        // tail of 9.9 samples: (1 + ... + 9 + 0.9 * 10) / 9.9
        let offer = solve_cvar(&ladder(), 0.99).expect("solves");
        let expected = 54.0 / 9.9;
        assert!((offer.offer_capacity - expected).abs() < 1e-3, "{}", offer.offer_capacity);
    }

    #[test]
    fn problem_size_matches_formulation() {
        let offer = solve_cvar(&ladder(), 0.2).expect("solves");
        // offer + beta + 10 zeta
        assert_eq!(offer.problem.num_variables, 12);
        // two per sample plus the budget row
        assert_eq!(offer.problem.num_constraints, 21);
        assert!((offer.problem.objective - offer.offer_capacity).abs() < 1e-9);
    }

    #[test]
    fn rejects_eps_outside_unit_interval() {
        for eps in [0.0, 1.0, -0.5, 1.5] {
            let err = solve_cvar(&ladder(), eps).expect_err("must reject");
            assert!(matches!(err, BidError::Config(_)), "eps={eps}: {err:?}");
        }
    }
}
