//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use rand::SeedableRng;
use rand::rngs::StdRng;
use vpp_bid::config::ScenarioConfig;
use vpp_bid::ensemble::ScenarioEnsemble;
use vpp_bid::profile::{ProfileBounds, generate_ensemble};

/// Seeded consumption ensemble with the baseline band (220-600 kW, 35 kW ramp).
pub fn consumption_ensemble(seed: u64, profiles: usize, minutes: usize) -> ScenarioEnsemble {
    let bounds = ProfileBounds::new(220.0, 600.0, 35.0).expect("valid bounds");
    let mut rng = StdRng::seed_from_u64(seed);
    generate_ensemble(&mut rng, profiles, minutes, &bounds).expect("valid ensemble")
}

/// Ensemble of constant trajectories, one per value.
pub fn flat(values: &[f64], horizon: usize) -> ScenarioEnsemble {
    ScenarioEnsemble::new(values.iter().map(|v| vec![*v; horizon]).collect())
        .expect("valid ensemble")
}

/// Baseline config shrunk so a full run stays fast.
pub fn small_config() -> ScenarioConfig {
    let mut cfg = ScenarioConfig::baseline();
    cfg.profile.num_profiles = 5;
    cfg.profile.num_minutes = 20;
    cfg.reserve.q_overbar = Some(10.0);
    cfg.market.horizon = 8;
    cfg.market.wind_scenarios = 4;
    cfg.market.price_scenarios = 3;
    cfg.market.imbalance_scenarios = 2;
    cfg
}
