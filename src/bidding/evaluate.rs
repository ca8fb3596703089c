//! Realised profit of a fixed bid.

use crate::bidding::settlement::{Profit, SettlementRule, SystemState};
use crate::ensemble::ScenarioEnsemble;
use crate::error::{BidError, BidResult};

/// Profit of `bid` against one realised trajectory, split into day-ahead
/// revenue and imbalance settlement.
///
/// # Errors
///
/// Returns [`BidError::InvalidEnsemble`] if the four slices differ in length.
pub fn evaluate_breakdown(
    bid: &[f64],
    realised_wind: &[f64],
    realised_price: &[f64],
    realised_imbalance: &[f64],
    rule: &SettlementRule,
) -> BidResult<Profit> {
    let horizon = bid.len();
    if realised_wind.len() != horizon
        || realised_price.len() != horizon
        || realised_imbalance.len() != horizon
    {
        return Err(BidError::InvalidEnsemble(format!(
            "evaluation length mismatch: bid {horizon}, wind {}, price {}, imbalance {}",
            realised_wind.len(),
            realised_price.len(),
            realised_imbalance.len()
        )));
    }

    let mut profit = Profit::default();
    for t in 0..horizon {
        let state = SystemState::from_imbalance(realised_imbalance[t]);
        profit += rule.interval_profit(bid[t], realised_wind[t], realised_price[t], state);
    }
    Ok(profit)
}

/// Total realised profit of `bid`.
///
/// # Errors
///
/// See [`evaluate_breakdown`].
pub fn evaluate(
    bid: &[f64],
    realised_wind: &[f64],
    realised_price: &[f64],
    realised_imbalance: &[f64],
    rule: &SettlementRule,
) -> BidResult<f64> {
    evaluate_breakdown(bid, realised_wind, realised_price, realised_imbalance, rule)
        .map(|p| p.total())
}

/// Mean realised profit of `bid` over every (price, wind, imbalance)
/// combination of the given ensembles.
///
/// # Errors
///
/// See [`evaluate_breakdown`].
pub fn expected_profit(
    bid: &[f64],
    wind: &ScenarioEnsemble,
    price: &ScenarioEnsemble,
    imbalance_signs: &ScenarioEnsemble,
    rule: &SettlementRule,
) -> BidResult<f64> {
    let mut total = 0.0;
    for p in price.trajectories() {
        for w in wind.trajectories() {
            for s in imbalance_signs.trajectories() {
                total += evaluate(bid, w, p, s, rule)?;
            }
        }
    }
    let combinations = price.num_scenarios() * wind.num_scenarios() * imbalance_signs.num_scenarios();
    Ok(total / combinations as f64)
}
