//! One end-to-end run: reserve offers, day-ahead bid and an out-of-sample
//! back-test of that bid.

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use crate::bidding::{BidDecision, Profit, SettlementRule, evaluate_breakdown, solve_bid};
use crate::config::ScenarioConfig;
use crate::ensemble::ScenarioEnsemble;
use crate::error::{BidError, BidResult};
use crate::profile::{generate_ensemble, generate_imbalance_signs};
use crate::reserve::{AlsoXOffer, CapacityOffer, solve_also_x, solve_cvar};

/// Seed offsets so each ensemble draws from its own stream.
const PROFILE_SEED_OFFSET: u64 = 0;
const WIND_SEED_OFFSET: u64 = 101;
const PRICE_SEED_OFFSET: u64 = 202;
const IMBALANCE_SEED_OFFSET: u64 = 303;
const HOLDOUT_SEED_OFFSET: u64 = 404;

/// In-sample ensembles handed to the bidding optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketEnsembles {
    /// Wind output, per unit of rated power.
    pub wind: ScenarioEnsemble,
    /// Spot price.
    pub price: ScenarioEnsemble,
    /// System imbalance sign (`+1` long, `-1` short).
    pub imbalance: ScenarioEnsemble,
}

/// One realised trajectory per uncertainty source.
#[derive(Debug, Clone, PartialEq)]
pub struct Realisation {
    /// Realised wind output.
    pub wind: Vec<f64>,
    /// Realised spot price.
    pub price: Vec<f64>,
    /// Realised system imbalance sign.
    pub imbalance: Vec<f64>,
}

/// Realised profit of the optimised bid and two reference bids.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backtest {
    /// The optimised bid.
    pub optimised: Profit,
    /// Bidding the expected wind.
    pub forecast_bid: Profit,
    /// Bidding the realised wind.
    pub perfect_forecast: Profit,
}

/// Everything produced by [`run`].
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Settlement rule used for both the bid and the back-test.
    pub rule: SettlementRule,
    /// Consumption profiles behind the reserve offers.
    pub profiles: ScenarioEnsemble,
    /// CVaR reserve offer.
    pub cvar: CapacityOffer,
    /// Chance-constrained reserve offer.
    pub also_x: AlsoXOffer,
    /// In-sample market ensembles.
    pub market: MarketEnsembles,
    /// Optimised bid.
    pub decision: BidDecision,
    /// Held-out realisation used for the back-test.
    pub holdout: Realisation,
    /// Realised profits.
    pub backtest: Backtest,
}

/// Draws the in-sample wind, price and imbalance ensembles.
///
/// # Errors
///
/// Returns a configuration error for invalid bounds or zero counts.
pub fn draw_market(config: &ScenarioConfig) -> BidResult<MarketEnsembles> {
    let m = &config.market;
    let seed = config.run.seed;

    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(WIND_SEED_OFFSET));
    let wind = generate_ensemble(&mut rng, m.wind_scenarios, m.horizon, &config.wind_bounds()?)?;

    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(PRICE_SEED_OFFSET));
    let price = generate_ensemble(&mut rng, m.price_scenarios, m.horizon, &config.price_bounds()?)?;

    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(IMBALANCE_SEED_OFFSET));
    let imbalance = generate_imbalance_signs(&mut rng, m.imbalance_scenarios, m.horizon, m.p_long)?;

    Ok(MarketEnsembles {
        wind,
        price,
        imbalance,
    })
}

/// Draws the held-out realisation from a stream disjoint from the ensembles.
///
/// # Errors
///
/// See [`draw_market`].
pub fn draw_realisation(config: &ScenarioConfig) -> BidResult<Realisation> {
    let m = &config.market;
    let mut rng = StdRng::seed_from_u64(config.run.seed.wrapping_add(HOLDOUT_SEED_OFFSET));
    let wind = generate_ensemble(&mut rng, 1, m.horizon, &config.wind_bounds()?)?;
    let price = generate_ensemble(&mut rng, 1, m.horizon, &config.price_bounds()?)?;
    let imbalance = generate_imbalance_signs(&mut rng, 1, m.horizon, m.p_long)?;
    Ok(Realisation {
        wind: wind.trajectory(0).to_vec(),
        price: price.trajectory(0).to_vec(),
        imbalance: imbalance.trajectory(0).to_vec(),
    })
}

/// Runs the configured scenario end to end.
///
/// # Errors
///
/// Returns the first validation error before any solver call, then any
/// solver or convergence error from the reserve and bidding stages.
pub fn run(config: &ScenarioConfig) -> BidResult<RunOutcome> {
    if let Some(first) = config.validate().into_iter().next() {
        return Err(BidError::Config(first));
    }
    let rule = config.settlement_rule()?;

    let p = &config.profile;
    let mut rng = StdRng::seed_from_u64(config.run.seed.wrapping_add(PROFILE_SEED_OFFSET));
    let profiles = generate_ensemble(&mut rng, p.num_profiles, p.num_minutes, &config.profile_bounds()?)?;
    info!(
        profiles = profiles.num_scenarios(),
        minutes = profiles.horizon(),
        "consumption profiles drawn"
    );

    let cvar = solve_cvar(&profiles, config.reserve.eps)?;
    let also_x = solve_also_x(&profiles, &config.also_x_params()?)?;

    let market = draw_market(config)?;
    let decision = solve_bid(
        &market.wind,
        &market.price,
        &market.imbalance,
        &rule,
        &config.bid_settings(),
    )?;

    let holdout = draw_realisation(config)?;
    let forecast = market.wind.mean_trajectory();
    let backtest = Backtest {
        optimised: settle(&decision.bid, &holdout, &rule)?,
        forecast_bid: settle(&forecast, &holdout, &rule)?,
        perfect_forecast: settle(&holdout.wind, &holdout, &rule)?,
    };
    info!(
        scheme = %rule.scheme,
        expected = decision.expected_revenue,
        realised = backtest.optimised.total(),
        "bid back-tested"
    );

    Ok(RunOutcome {
        rule,
        profiles,
        cvar,
        also_x,
        market,
        decision,
        holdout,
        backtest,
    })
}

fn settle(bid: &[f64], holdout: &Realisation, rule: &SettlementRule) -> BidResult<Profit> {
    evaluate_breakdown(bid, &holdout.wind, &holdout.price, &holdout.imbalance, rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ScenarioConfig {
        let mut cfg = ScenarioConfig::baseline();
        cfg.profile.num_profiles = 4;
        cfg.profile.num_minutes = 15;
        cfg.reserve.q_overbar = Some(6.0);
        cfg.market.horizon = 6;
        cfg.market.wind_scenarios = 3;
        cfg.market.price_scenarios = 2;
        cfg.market.imbalance_scenarios = 2;
        cfg
    }

    #[test]
    fn market_draws_respect_bands() {
        let cfg = small_config();
        let market = draw_market(&cfg).expect("market");
        assert_eq!(market.wind.num_scenarios(), 3);
        assert_eq!(market.price.horizon(), 6);
        assert!(market.wind.satisfies_bounds(0.0, 1.0, 0.15, 1e-9));
        assert!(market.price.satisfies_bounds(20.0, 80.0, 10.0, 1e-9));
    }

    #[test]
    fn holdout_differs_from_first_scenario() {
        let cfg = small_config();
        let market = draw_market(&cfg).expect("market");
        let holdout = draw_realisation(&cfg).expect("holdout");
        assert_eq!(holdout.wind.len(), 6);
        assert_ne!(holdout.wind.as_slice(), market.wind.trajectory(0));
    }

    #[test]
    fn invalid_config_fails_before_solving() {
        let mut cfg = small_config();
        cfg.bidding.price_scheme = "bogus".to_string();
        let err = run(&cfg).expect_err("invalid scheme");
        assert!(err.is_config());
    }

    #[test]
    fn same_config_and_seed_is_deterministic() {
        let cfg = small_config();
        let a = run(&cfg).expect("first run");
        let b = run(&cfg).expect("second run");
        assert_eq!(a.decision.bid, b.decision.bid);
        assert_eq!(a.cvar.offer_capacity, b.cvar.offer_capacity);
        assert_eq!(a.also_x.offer_capacity, b.also_x.offer_capacity);
        assert_eq!(a.backtest, b.backtest);
    }

    #[test]
    fn perfect_forecast_never_pays_imbalance() {
        let outcome = run(&small_config()).expect("run");
        assert_eq!(outcome.backtest.perfect_forecast.imbalance, 0.0);
        assert!(outcome.also_x.offer_capacity >= outcome.cvar.offer_capacity - 1e-3);
    }
}
