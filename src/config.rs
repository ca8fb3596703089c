//! TOML-based run configuration and preset definitions.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::bidding::{BidSettings, SettlementRule, SettlementScheme};
use crate::error::{BidError, BidResult, ConfigError};
use crate::profile::ProfileBounds;
use crate::reserve::AlsoXParams;
use crate::reserve::also_x::DEFAULT_MAX_ITERATIONS;

/// Top-level run configuration parsed from TOML.
///
/// Every field except `reserve.q_overbar` has a default matching the
/// baseline preset. Load from TOML with [`ScenarioConfig::from_toml_file`] or
/// use [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Global run parameters.
    #[serde(default)]
    pub run: RunConfig,
    /// Consumption profile generator for the reserve offer.
    #[serde(default)]
    pub profile: ProfileConfig,
    /// Reserve offer risk parameters.
    #[serde(default)]
    pub reserve: ReserveConfig,
    /// Synthetic market ensembles and settlement multipliers.
    #[serde(default)]
    pub market: MarketConfig,
    /// Bidding optimizer options.
    #[serde(default)]
    pub bidding: BiddingConfig,
}

/// Global run parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Master random seed. Each ensemble derives its own seed from it.
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { seed: 42 }
    }
}

/// Consumption profile generator parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileConfig {
    /// Number of consumption scenarios (must be > 0).
    pub num_profiles: usize,
    /// Samples per scenario (must be > 0).
    pub num_minutes: usize,
    /// Smallest admissible consumption (kW).
    pub lower_bound: f64,
    /// Largest admissible consumption (kW).
    pub upper_bound: f64,
    /// Largest change between consecutive minutes (kW).
    pub max_step: f64,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            num_profiles: 20,
            num_minutes: 60,
            lower_bound: 220.0,
            upper_bound: 600.0,
            max_step: 35.0,
        }
    }
}

/// Reserve offer risk parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReserveConfig {
    /// Admissible violation probability, strictly inside (0, 1).
    pub eps: f64,
    /// Bisection stops once the violation-budget bracket is narrower than this.
    pub tolerance: f64,
    /// Upper end of the violation-budget search, in violated samples.
    /// No default: it must be chosen for the ensemble size.
    pub q_overbar: Option<f64>,
    /// Linearisation constant. Derived from the profile range when unset.
    pub big_m: Option<f64>,
    /// Bisection iteration bound.
    pub max_iterations: usize,
}

impl Default for ReserveConfig {
    fn default() -> Self {
        Self {
            eps: 0.1,
            tolerance: 1e-3,
            q_overbar: None,
            big_m: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Synthetic market ensembles and settlement multipliers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarketConfig {
    /// Settlement intervals in the bidding horizon (must be > 0).
    pub horizon: usize,
    /// Wind output scenarios (must be > 0).
    pub wind_scenarios: usize,
    /// Spot price scenarios (must be > 0).
    pub price_scenarios: usize,
    /// System imbalance sign scenarios (must be > 0).
    pub imbalance_scenarios: usize,
    /// Lowest wind output (per unit of rated power).
    pub wind_lower: f64,
    /// Highest wind output (per unit of rated power).
    pub wind_upper: f64,
    /// Largest wind change between intervals.
    pub wind_max_step: f64,
    /// Lowest spot price.
    pub price_lower: f64,
    /// Highest spot price.
    pub price_upper: f64,
    /// Largest price change between intervals.
    pub price_max_step: f64,
    /// Probability that the system is long in an interval (0.0-1.0).
    pub p_long: f64,
    /// Up-regulation price as a multiple of spot.
    pub f_up: f64,
    /// Down-regulation price as a multiple of spot.
    pub f_down: f64,
    /// Rated power; upper bound on the bid.
    pub bid_cap: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            horizon: 24,
            wind_scenarios: 10,
            price_scenarios: 5,
            imbalance_scenarios: 4,
            wind_lower: 0.0,
            wind_upper: 1.0,
            wind_max_step: 0.15,
            price_lower: 20.0,
            price_upper: 80.0,
            price_max_step: 10.0,
            p_long: 0.5,
            f_up: 1.2,
            f_down: 0.8,
            bid_cap: 1.0,
        }
    }
}

/// Bidding optimizer options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BiddingConfig {
    /// Settlement scheme: `"one_price"` or `"two_price"`.
    pub price_scheme: String,
    /// Break revenue ties towards the bid with the least expected imbalance.
    pub deviation_tiebreak: bool,
}

impl Default for BiddingConfig {
    fn default() -> Self {
        Self {
            price_scheme: "one_price".to_string(),
            deviation_tiebreak: true,
        }
    }
}

impl ScenarioConfig {
    /// Returns the baseline run: one-price settlement, 10% reserve risk.
    pub fn baseline() -> Self {
        let mut cfg = Self::default();
        cfg.reserve.q_overbar = Some(cfg.default_q_overbar());
        cfg
    }

    /// Returns the strict-reserve preset: more consumption scenarios and a 2% risk level.
    pub fn strict_reserve() -> Self {
        let mut cfg = Self {
            profile: ProfileConfig {
                num_profiles: 30,
                ..ProfileConfig::default()
            },
            reserve: ReserveConfig {
                eps: 0.02,
                tolerance: 1e-4,
                ..ReserveConfig::default()
            },
            ..Self::default()
        };
        cfg.reserve.q_overbar = Some(cfg.default_q_overbar());
        cfg
    }

    /// Returns the two-price preset: asymmetric settlement, system more often long.
    pub fn two_price() -> Self {
        let mut cfg = Self {
            market: MarketConfig {
                p_long: 0.6,
                f_up: 1.3,
                f_down: 0.7,
                ..MarketConfig::default()
            },
            bidding: BiddingConfig {
                price_scheme: "two_price".to_string(),
                ..BiddingConfig::default()
            },
            ..Self::default()
        };
        cfg.reserve.q_overbar = Some(cfg.default_q_overbar());
        cfg
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "strict_reserve", "two_price"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "strict_reserve" => Ok(Self::strict_reserve()),
            "two_price" => Ok(Self::two_price()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// `eps` times the number of profile samples.
    fn default_q_overbar(&self) -> f64 {
        self.reserve.eps * (self.profile.num_profiles * self.profile.num_minutes) as f64
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let p = &self.profile;
        if p.num_profiles == 0 {
            errors.push(ConfigError::new("profile.num_profiles", "must be > 0"));
        }
        if p.num_minutes == 0 {
            errors.push(ConfigError::new("profile.num_minutes", "must be > 0"));
        }
        check_band(
            &mut errors,
            "profile",
            ("lower_bound", p.lower_bound),
            ("upper_bound", p.upper_bound),
            ("max_step", p.max_step),
        );

        let r = &self.reserve;
        if !(r.eps > 0.0 && r.eps < 1.0) {
            errors.push(ConfigError::new(
                "reserve.eps",
                format!("must lie strictly inside (0, 1), got {}", r.eps),
            ));
        }
        if !(r.tolerance.is_finite() && r.tolerance > 0.0) {
            errors.push(ConfigError::new("reserve.tolerance", "must be > 0"));
        }
        match r.q_overbar {
            None => errors.push(ConfigError::new(
                "reserve.q_overbar",
                "must be set explicitly (violation budget upper bound, in samples)",
            )),
            Some(q) if !(q.is_finite() && q > 0.0) => {
                errors.push(ConfigError::new("reserve.q_overbar", "must be > 0"));
            }
            Some(_) => {}
        }
        if r.big_m.is_some_and(|m| !(m.is_finite() && m > 0.0)) {
            errors.push(ConfigError::new("reserve.big_m", "must be > 0"));
        }
        if r.max_iterations == 0 {
            errors.push(ConfigError::new("reserve.max_iterations", "must be > 0"));
        }

        let m = &self.market;
        for (field, count) in [
            ("market.horizon", m.horizon),
            ("market.wind_scenarios", m.wind_scenarios),
            ("market.price_scenarios", m.price_scenarios),
            ("market.imbalance_scenarios", m.imbalance_scenarios),
        ] {
            if count == 0 {
                errors.push(ConfigError::new(field, "must be > 0"));
            }
        }
        check_band(
            &mut errors,
            "market",
            ("wind_lower", m.wind_lower),
            ("wind_upper", m.wind_upper),
            ("wind_max_step", m.wind_max_step),
        );
        check_band(
            &mut errors,
            "market",
            ("price_lower", m.price_lower),
            ("price_upper", m.price_upper),
            ("price_max_step", m.price_max_step),
        );
        if !(m.bid_cap.is_finite() && m.bid_cap > 0.0) {
            errors.push(ConfigError::new("market.bid_cap", "must be > 0"));
        } else if m.wind_lower < 0.0 || m.wind_upper > m.bid_cap {
            errors.push(ConfigError::new(
                "market.wind_upper",
                "wind band must lie within [0, market.bid_cap]",
            ));
        }
        if !(0.0..=1.0).contains(&m.p_long) {
            errors.push(ConfigError::new("market.p_long", "must be in [0.0, 1.0]"));
        }
        if !(m.f_up.is_finite() && m.f_up >= 0.0) {
            errors.push(ConfigError::new("market.f_up", "must be >= 0"));
        }
        if !(m.f_down.is_finite() && m.f_down >= 0.0) {
            errors.push(ConfigError::new("market.f_down", "must be >= 0"));
        }

        match self.bidding.price_scheme.parse::<SettlementScheme>() {
            Ok(SettlementScheme::TwoPrice) => {
                // the deficit price must not drop below the surplus price
                if m.f_up < 1.0 {
                    errors.push(ConfigError::new("market.f_up", "must be >= 1 under two_price"));
                }
                if m.f_down > 1.0 {
                    errors.push(ConfigError::new("market.f_down", "must be <= 1 under two_price"));
                }
                if m.price_lower < 0.0 {
                    errors.push(ConfigError::new(
                        "market.price_lower",
                        "must be >= 0 under two_price",
                    ));
                }
            }
            Ok(SettlementScheme::OnePrice) => {}
            Err(BidError::Config(e)) => errors.push(e),
            Err(_) => {}
        }

        errors
    }

    /// Bounds for the consumption profile generator.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an inverted band or negative step.
    pub fn profile_bounds(&self) -> BidResult<ProfileBounds> {
        let p = &self.profile;
        ProfileBounds::new(p.lower_bound, p.upper_bound, p.max_step)
    }

    /// Bounds for the synthetic wind ensemble.
    ///
    /// # Errors
    ///
    /// See [`ScenarioConfig::profile_bounds`].
    pub fn wind_bounds(&self) -> BidResult<ProfileBounds> {
        let m = &self.market;
        ProfileBounds::new(m.wind_lower, m.wind_upper, m.wind_max_step)
    }

    /// Bounds for the synthetic spot price ensemble.
    ///
    /// # Errors
    ///
    /// See [`ScenarioConfig::profile_bounds`].
    pub fn price_bounds(&self) -> BidResult<ProfileBounds> {
        let m = &self.market;
        ProfileBounds::new(m.price_lower, m.price_upper, m.price_max_step)
    }

    /// Bisection parameters for the chance-constrained offer.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `reserve.q_overbar` is unset.
    pub fn also_x_params(&self) -> BidResult<AlsoXParams> {
        let r = &self.reserve;
        let q_overbar = r.q_overbar.ok_or_else(|| {
            ConfigError::new("reserve.q_overbar", "must be set explicitly")
        })?;
        let params = AlsoXParams::new(r.eps, r.tolerance, q_overbar)
            .with_max_iterations(r.max_iterations);
        Ok(match r.big_m {
            Some(m) => params.with_big_m(m),
            None => params,
        })
    }

    /// Settlement rule for the configured scheme and multipliers.
    ///
    /// # Errors
    ///
    /// Rejects an unknown scheme name or negative multipliers.
    pub fn settlement_rule(&self) -> BidResult<SettlementRule> {
        SettlementRule::from_name(&self.bidding.price_scheme, self.market.f_up, self.market.f_down)
    }

    /// Bidding optimizer settings.
    pub fn bid_settings(&self) -> BidSettings {
        BidSettings {
            bid_cap: self.market.bid_cap,
            deviation_tiebreak: self.bidding.deviation_tiebreak,
        }
    }
}

/// Checks a `[lower, upper]` band with a ramp limit.
fn check_band(
    errors: &mut Vec<ConfigError>,
    section: &str,
    lower: (&str, f64),
    upper: (&str, f64),
    step: (&str, f64),
) {
    for (name, value) in [lower, upper, step] {
        if !value.is_finite() {
            errors.push(ConfigError::new(format!("{section}.{name}"), "must be finite"));
        }
    }
    if lower.1 > upper.1 {
        errors.push(ConfigError::new(
            format!("{section}.{}", lower.0),
            format!("must be <= {section}.{}", upper.0),
        ));
    }
    if step.1 < 0.0 {
        errors.push(ConfigError::new(format!("{section}.{}", step.0), "must be >= 0"));
    }
}
