//! Day-ahead wind bid under uncertain wind, price and system imbalance.
//!
//! The bid is a here-and-now trajectory shared by every scenario; imbalance
//! and its two legs are wait-and-see recourse, one trajectory per wind
//! scenario:
//!
//! ```text
//! max  sum_t da[t] * bid[t] + sum_{w,t} (surplus[w][t] * up[w][t] - deficit[w][t] * down[w][t])
//! s.t. imbalance[w][t] = wind[w][t] - bid[t]
//!      imbalance[w][t] = up[w][t] - down[w][t]
//!      0 <= bid, up, down <= bid_cap
//! ```
//!
//! The coefficients come from enumerating every (price, wind, imbalance sign)
//! combination with equal weight, pricing each one through
//! [`SettlementRule::prices`].
//!
//! Every interval must price its deficit at least as high as its surplus;
//! otherwise holding both legs at once would earn revenue no settlement pays.
//! With that checked up front the reported legs are taken from the signed
//! imbalance, and the expected revenue is re-evaluated from the bid.
//!
//! Settlement is often degenerate (a one-price market whose regulation price
//! equals spot pays the same for any bid), so an optional second stage keeps
//! the revenue within a relative tolerance of the optimum and minimises the
//! expected absolute imbalance instead.

use good_lp::{Expression, Variable, constraint, variable};
use tracing::warn;

use crate::bidding::evaluate::expected_profit;
use crate::bidding::settlement::{LegPrices, SettlementRule, SystemState};
use crate::ensemble::ScenarioEnsemble;
use crate::error::{BidError, BidResult};
use crate::solver::{Formulation, ProblemBuilder, ProblemSummary, Sense, SolvedProblem, solve};

/// Relative slack on the revenue floor of the tie-break stage.
pub const REVENUE_FLOOR_TOL: f64 = 1e-6;

/// Bounds and stages of the bid problem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BidSettings {
    /// Upper bound on the bid and on each imbalance leg (rated power).
    pub bid_cap: f64,
    /// Run the deviation tie-break stage after the revenue stage.
    pub deviation_tiebreak: bool,
}

impl Default for BidSettings {
    fn default() -> Self {
        Self {
            bid_cap: 1.0,
            deviation_tiebreak: true,
        }
    }
}

/// Optimal bid and its recourse.
#[derive(Debug, Clone, PartialEq)]
pub struct BidDecision {
    /// Day-ahead bid per timestep.
    pub bid: Vec<f64>,
    /// Expected revenue of `bid` over all scenario combinations.
    pub expected_revenue: f64,
    /// `wind - bid`, one trajectory per wind scenario.
    pub imbalance: ScenarioEnsemble,
    /// Positive part of the imbalance; never positive together with the deficit leg.
    pub imbalance_up: ScenarioEnsemble,
    /// Magnitude of the negative part of the imbalance.
    pub imbalance_down: ScenarioEnsemble,
    /// Revenue stage.
    pub problem: ProblemSummary,
    /// Tie-break stage, when it ran and solved.
    pub tiebreak: Option<ProblemSummary>,
}

/// Expected-revenue weights, `(1/N)`-scaled over all combinations.
#[derive(Debug, Clone, PartialEq)]
struct RevenueCoefficients {
    day_ahead: Vec<f64>,
    // [wind scenario][t]
    surplus: Vec<Vec<f64>>,
    deficit: Vec<Vec<f64>>,
}

impl RevenueCoefficients {
    fn accumulate(
        wind: &ScenarioEnsemble,
        price: &ScenarioEnsemble,
        signs: &ScenarioEnsemble,
        rule: &SettlementRule,
    ) -> Self {
        let horizon = wind.horizon();
        let combinations = price.num_scenarios() * wind.num_scenarios() * signs.num_scenarios();
        let weight = 1.0 / combinations as f64;

        let mut day_ahead = vec![0.0; horizon];
        let mut surplus = vec![vec![0.0; horizon]; wind.num_scenarios()];
        let mut deficit = vec![vec![0.0; horizon]; wind.num_scenarios()];

        for s1 in 0..price.num_scenarios() {
            for s2 in 0..wind.num_scenarios() {
                for s3 in 0..signs.num_scenarios() {
                    for t in 0..horizon {
                        let spot = price.value(s1, t);
                        let state = SystemState::from_imbalance(signs.value(s3, t));
                        let legs = rule.prices(spot, state);
                        day_ahead[t] += weight * spot;
                        surplus[s2][t] += weight * legs.surplus;
                        deficit[s2][t] += weight * legs.deficit;
                    }
                }
            }
        }

        Self {
            day_ahead,
            surplus,
            deficit,
        }
    }

    fn legs(&self, s: usize, t: usize) -> LegPrices {
        LegPrices {
            surplus: self.surplus[s][t],
            deficit: self.deficit[s][t],
        }
    }

    fn expression(&self, bid: &[Variable], up: &[Vec<Variable>], down: &[Vec<Variable>]) -> Expression {
        let mut revenue: Expression = bid
            .iter()
            .zip(&self.day_ahead)
            .map(|(b, price)| *price * *b)
            .sum();
        for (s, (up_row, down_row)) in up.iter().zip(down).enumerate() {
            for (t, (u, d)) in up_row.iter().zip(down_row).enumerate() {
                let legs = self.legs(s, t);
                revenue += legs.surplus * *u - legs.deficit * *d;
            }
        }
        revenue
    }
}

#[derive(Clone, Copy)]
struct WindBid<'a> {
    wind: &'a ScenarioEnsemble,
    coefficients: &'a RevenueCoefficients,
    bid_cap: f64,
    /// `Some` switches to the tie-break stage.
    revenue_floor: Option<f64>,
}

impl Formulation for WindBid<'_> {
    type Handles = Vec<Variable>;
    type Output = Vec<f64>;

    fn label(&self) -> &'static str {
        match self.revenue_floor {
            None => "wind_bid",
            Some(_) => "wind_bid_tiebreak",
        }
    }

    fn formulate(&self, builder: &mut ProblemBuilder) -> (Sense, Expression, Vec<Variable>) {
        let horizon = self.wind.horizon();
        let scenarios = self.wind.num_scenarios();
        let leg = variable().min(0.0).max(self.bid_cap);

        let bid = builder.variables(horizon, leg.clone());
        let imbalance = builder.matrix(scenarios, horizon, variable());
        let up = builder.matrix(scenarios, horizon, leg.clone());
        let down = builder.matrix(scenarios, horizon, leg);

        for s in 0..scenarios {
            for t in 0..horizon {
                let (imb, b, u, d) = (imbalance[s][t], bid[t], up[s][t], down[s][t]);
                builder.constrain(constraint!(imb + b == self.wind.value(s, t)));
                builder.constrain(constraint!(imb == u - d));
            }
        }

        let revenue = self.coefficients.expression(&bid, &up, &down);
        let (sense, objective) = match self.revenue_floor {
            None => (Sense::Maximise, revenue),
            Some(floor) => {
                builder.constrain(constraint!(revenue >= floor));
                let weight = 1.0 / scenarios as f64;
                let deviation: Expression = up
                    .iter()
                    .chain(&down)
                    .flatten()
                    .map(|v| weight * *v)
                    .sum();
                (Sense::Minimise, deviation)
            }
        };

        (sense, objective, bid)
    }

    fn extract(&self, solved: &SolvedProblem, bid: Vec<Variable>) -> Vec<f64> {
        solved.vector(&bid)
    }
}

fn check_inputs(
    wind: &ScenarioEnsemble,
    price: &ScenarioEnsemble,
    signs: &ScenarioEnsemble,
    rule: &SettlementRule,
    settings: &BidSettings,
) -> BidResult<()> {
    if !(settings.bid_cap.is_finite() && settings.bid_cap > 0.0) {
        return Err(BidError::config("market.bid_cap", "must be finite and > 0"));
    }
    let horizon = wind.horizon();
    if price.horizon() != horizon || signs.horizon() != horizon {
        return Err(BidError::InvalidEnsemble(format!(
            "horizon mismatch: wind {horizon}, price {}, imbalance {}",
            price.horizon(),
            signs.horizon()
        )));
    }
    if wind.min() < 0.0 || wind.max() > settings.bid_cap {
        return Err(BidError::InvalidEnsemble(format!(
            "wind must lie in [0, {}], got [{}, {}]",
            settings.bid_cap,
            wind.min(),
            wind.max()
        )));
    }
    for (p, spots) in price.trajectories().enumerate() {
        for (i, states) in signs.trajectories().enumerate() {
            for (t, (spot, sign)) in spots.iter().zip(states).enumerate() {
                let state = SystemState::from_imbalance(*sign);
                if !rule.is_consistent(*spot, state) {
                    let legs = rule.prices(*spot, state);
                    return Err(BidError::InvalidEnsemble(format!(
                        "{} surplus price {} exceeds deficit price {} \
                         (price scenario {p}, imbalance scenario {i}, timestep {t})",
                        rule.scheme, legs.surplus, legs.deficit
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Splits `wind - bid` per wind scenario into (imbalance, surplus, deficit).
fn recourse(wind: &ScenarioEnsemble, bid: &[f64]) -> BidResult<[ScenarioEnsemble; 3]> {
    let imbalance: Vec<Vec<f64>> = wind
        .trajectories()
        .map(|w| w.iter().zip(bid).map(|(w, b)| w - b).collect())
        .collect();
    let part = |sign: f64| -> Vec<Vec<f64>> {
        imbalance
            .iter()
            .map(|row| row.iter().map(|x| (sign * x).max(0.0)).collect())
            .collect()
    };
    let up = part(1.0);
    let down = part(-1.0);
    Ok([
        ScenarioEnsemble::new(imbalance)?,
        ScenarioEnsemble::new(up)?,
        ScenarioEnsemble::new(down)?,
    ])
}

/// Chooses the day-ahead bid maximising expected settlement revenue.
///
/// All three ensembles are scenario-major and must share a horizon. Wind is
/// expressed in the same unit as `settings.bid_cap`.
///
/// # Errors
///
/// Returns [`BidError::InvalidEnsemble`] on horizon mismatch, wind outside
/// `[0, bid_cap]`, or an interval whose surplus price exceeds its deficit
/// price (negative spot under two-price), and a solver error if the revenue
/// stage fails. A failed tie-break stage is logged and the revenue-optimal
/// bid is kept.
pub fn solve_bid(
    wind: &ScenarioEnsemble,
    price: &ScenarioEnsemble,
    imbalance_signs: &ScenarioEnsemble,
    rule: &SettlementRule,
    settings: &BidSettings,
) -> BidResult<BidDecision> {
    check_inputs(wind, price, imbalance_signs, rule, settings)?;
    let coefficients = RevenueCoefficients::accumulate(wind, price, imbalance_signs, rule);

    let stage = WindBid {
        wind,
        coefficients: &coefficients,
        bid_cap: settings.bid_cap,
        revenue_floor: None,
    };
    let (mut bid, problem) = solve(&stage)?;

    let mut tiebreak = None;
    if settings.deviation_tiebreak {
        let optimum = problem.objective;
        let floor = optimum - REVENUE_FLOOR_TOL * optimum.abs().max(1.0);
        let refine = WindBid {
            revenue_floor: Some(floor),
            ..stage
        };
        match solve(&refine) {
            Ok((refined, summary)) => {
                bid = refined;
                tiebreak = Some(summary);
            }
            Err(err) => warn!(error = %err, "deviation tie-break failed, keeping revenue-optimal bid"),
        }
    }

    let expected_revenue = expected_profit(&bid, wind, price, imbalance_signs, rule)?;
    let [imbalance, imbalance_up, imbalance_down] = recourse(wind, &bid)?;
    Ok(BidDecision {
        bid,
        expected_revenue,
        imbalance,
        imbalance_up,
        imbalance_down,
        problem,
        tiebreak,
    })
}
