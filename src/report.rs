//! Post-hoc run report derived from a [`RunOutcome`].

use std::fmt;

use crate::bidding::SystemState;
use crate::runner::RunOutcome;

/// One settlement interval of the bid, with its forecasts and realisation.
#[derive(Debug, Clone, PartialEq)]
pub struct BidRow {
    /// Interval index.
    pub timestep: usize,
    /// Day-ahead bid.
    pub bid: f64,
    /// Mean wind over the in-sample scenarios.
    pub expected_wind: f64,
    /// Mean spot price over the in-sample scenarios.
    pub mean_price: f64,
    /// Realised wind.
    pub realised_wind: f64,
    /// Realised spot price.
    pub realised_price: f64,
    /// Whether the system was long in the realisation.
    pub system_long: bool,
}

/// Headline figures of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Scheme name.
    pub scheme: String,
    /// Profile ensemble shape (scenarios, samples).
    pub profile_shape: (usize, usize),
    /// CVaR reserve offer (kW).
    pub cvar_offer_kw: f64,
    /// Chance-constrained reserve offer (kW).
    pub also_x_offer_kw: f64,
    /// Share of samples the chance-constrained offer exceeds (%).
    pub also_x_violation_pct: f64,
    /// Bisection iterations.
    pub also_x_iterations: usize,
    /// Market ensemble counts (wind, price, imbalance).
    pub market_shape: (usize, usize, usize),
    /// Mean bid over the horizon (p.u.).
    pub mean_bid: f64,
    /// Expected in-sample revenue.
    pub expected_revenue: f64,
    /// Realised day-ahead revenue of the bid.
    pub realised_day_ahead: f64,
    /// Realised imbalance settlement of the bid.
    pub realised_imbalance: f64,
    /// Realised profit of the bid.
    pub realised_profit: f64,
    /// Realised profit when bidding the expected wind.
    pub forecast_bid_profit: f64,
    /// Realised profit when bidding the realised wind.
    pub perfect_forecast_profit: f64,
    /// Per-interval detail.
    pub rows: Vec<BidRow>,
}

impl RunReport {
    /// Summarises a finished run.
    pub fn from_outcome(outcome: &RunOutcome) -> Self {
        let decision = &outcome.decision;
        let expected_wind = outcome.market.wind.mean_trajectory();
        let mean_price = outcome.market.price.mean_trajectory();
        let holdout = &outcome.holdout;

        let rows = decision
            .bid
            .iter()
            .enumerate()
            .map(|(t, bid)| BidRow {
                timestep: t,
                bid: *bid,
                expected_wind: expected_wind[t],
                mean_price: mean_price[t],
                realised_wind: holdout.wind[t],
                realised_price: holdout.price[t],
                system_long: SystemState::from_imbalance(holdout.imbalance[t]) == SystemState::Long,
            })
            .collect();

        let mean_bid = if decision.bid.is_empty() {
            0.0
        } else {
            decision.bid.iter().sum::<f64>() / decision.bid.len() as f64
        };
        let b = &outcome.backtest;

        Self {
            scheme: outcome.rule.scheme.to_string(),
            profile_shape: (outcome.profiles.num_scenarios(), outcome.profiles.horizon()),
            cvar_offer_kw: outcome.cvar.offer_capacity,
            also_x_offer_kw: outcome.also_x.offer_capacity,
            also_x_violation_pct: 100.0 * outcome.also_x.violation_fraction,
            also_x_iterations: outcome.also_x.iterations,
            market_shape: (
                outcome.market.wind.num_scenarios(),
                outcome.market.price.num_scenarios(),
                outcome.market.imbalance.num_scenarios(),
            ),
            mean_bid,
            expected_revenue: decision.expected_revenue,
            realised_day_ahead: b.optimised.day_ahead,
            realised_imbalance: b.optimised.imbalance,
            realised_profit: b.optimised.total(),
            forecast_bid_profit: b.forecast_bid.total(),
            perfect_forecast_profit: b.perfect_forecast.total(),
            rows,
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (profiles, minutes) = self.profile_shape;
        let (wind, price, imbalance) = self.market_shape;
        writeln!(f, "--- Reserve Offer ---")?;
        writeln!(f, "Profiles:                {profiles} x {minutes} samples")?;
        writeln!(f, "CVaR offer:              {:.3} kW", self.cvar_offer_kw)?;
        writeln!(f, "ALSO-X offer:            {:.3} kW", self.also_x_offer_kw)?;
        writeln!(f, "ALSO-X violations:       {:.2}%", self.also_x_violation_pct)?;
        writeln!(f, "ALSO-X iterations:       {}", self.also_x_iterations)?;
        writeln!(f, "--- Wind Bid ---")?;
        writeln!(f, "Settlement scheme:       {}", self.scheme)?;
        writeln!(f, "Scenarios:               {wind} wind x {price} price x {imbalance} imbalance")?;
        writeln!(f, "Mean bid:                {:.4} p.u.", self.mean_bid)?;
        writeln!(f, "Expected revenue:        {:.3} EUR", self.expected_revenue)?;
        writeln!(
            f,
            "Realised profit:         {:.3} EUR (day-ahead {:.3}, imbalance {:.3})",
            self.realised_profit, self.realised_day_ahead, self.realised_imbalance
        )?;
        writeln!(f, "Forecast-bid profit:     {:.3} EUR", self.forecast_bid_profit)?;
        write!(f, "Perfect-forecast profit: {:.3} EUR", self.perfect_forecast_profit)
    }
}
