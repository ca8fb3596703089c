//! Risk-constrained reserve capacity offers.
//!
//! Both solvers pick one `offer_capacity` that must hold across every
//! (timestep, scenario) pair of a consumption ensemble; they differ in how
//! the reliability requirement is linearised.

pub mod also_x;
pub mod cvar;

pub use also_x::{AlsoXOffer, AlsoXParams, solve_also_x};
pub use cvar::solve_cvar;

use crate::error::{BidError, BidResult};
use crate::solver::ProblemSummary;

/// Offered capacity together with the summary of the problem that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityOffer {
    /// Capacity pledged to the reserve market.
    pub offer_capacity: f64,
    /// Summary of the final solve.
    pub problem: ProblemSummary,
}

/// Rejects risk levels outside the open unit interval.
pub(crate) fn validate_eps(eps: f64) -> BidResult<()> {
    if eps.is_finite() && eps > 0.0 && eps < 1.0 {
        Ok(())
    } else {
        Err(BidError::config(
            "reserve.eps",
            format!("must lie in (0, 1), got {eps}"),
        ))
    }
}
