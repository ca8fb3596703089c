//! Imbalance settlement rules.
//!
//! A producer's deviation from its day-ahead bid is split into a surplus leg
//! (`realised - bid > 0`, paid to the producer) and a deficit leg
//! (`bid - realised > 0`, charged to the producer). Which price applies to
//! each leg depends on the scheme and on whether the wider system is long or
//! short. The optimizer and the evaluator both price deviations through
//! [`SettlementRule::prices`], so back-tests use the same arithmetic as the
//! objective.

use std::fmt;
use std::ops::AddAssign;
use std::str::FromStr;

use crate::error::{BidError, BidResult};

/// Imbalance pricing scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementScheme {
    /// Both legs settle at the single regulation price of the system state.
    OnePrice,
    /// The leg that helps the system settles at spot, the other at the regulation price.
    TwoPrice,
}

impl SettlementScheme {
    /// Recognised scheme names.
    pub const NAMES: &[&str] = &["one_price", "two_price"];

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementScheme::OnePrice => "one_price",
            SettlementScheme::TwoPrice => "two_price",
        }
    }
}

impl fmt::Display for SettlementScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettlementScheme {
    type Err = BidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one_price" => Ok(SettlementScheme::OnePrice),
            "two_price" => Ok(SettlementScheme::TwoPrice),
            other => Err(BidError::config(
                "bidding.price_scheme",
                format!(
                    "unknown scheme \"{other}\", expected one of: {}",
                    Self::NAMES.join(", ")
                ),
            )),
        }
    }
}

/// Direction of the aggregate system imbalance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    /// Supply exceeds demand; down-regulation is active.
    Long,
    /// Demand exceeds supply; up-regulation is active.
    Short,
}

impl SystemState {
    /// Classifies a system imbalance sample: non-negative is long.
    pub fn from_imbalance(value: f64) -> Self {
        if value >= 0.0 {
            SystemState::Long
        } else {
            SystemState::Short
        }
    }
}

/// Per-unit prices applied to the two deviation legs in one interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegPrices {
    /// Price paid per unit of surplus.
    pub surplus: f64,
    /// Price charged per unit of deficit.
    pub deficit: f64,
}

impl LegPrices {
    /// Settlement cash flow for the given legs (both non-negative).
    pub fn settle(&self, surplus: f64, deficit: f64) -> f64 {
        self.surplus * surplus - self.deficit * deficit
    }
}

/// Scheme plus the regulation price multipliers applied to spot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettlementRule {
    /// Active scheme.
    pub scheme: SettlementScheme,
    /// Up-regulation price as a multiple of spot (typically >= 1).
    pub f_up: f64,
    /// Down-regulation price as a multiple of spot (typically <= 1).
    pub f_down: f64,
}

impl SettlementRule {
    /// Builds a rule after checking the multipliers.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if either multiplier is negative or not
    /// finite. Under two-price settlement the deficit price must never fall
    /// below the surplus price, so `f_up >= 1` and `f_down <= 1` are required.
    pub fn new(scheme: SettlementScheme, f_up: f64, f_down: f64) -> BidResult<Self> {
        if !(f_up.is_finite() && f_up >= 0.0) {
            return Err(BidError::config("market.f_up", "must be finite and >= 0"));
        }
        if !(f_down.is_finite() && f_down >= 0.0) {
            return Err(BidError::config("market.f_down", "must be finite and >= 0"));
        }
        if scheme == SettlementScheme::TwoPrice {
            if f_up < 1.0 {
                return Err(BidError::config("market.f_up", "must be >= 1 under two_price"));
            }
            if f_down > 1.0 {
                return Err(BidError::config("market.f_down", "must be <= 1 under two_price"));
            }
        }
        Ok(Self {
            scheme,
            f_up,
            f_down,
        })
    }

    /// Parses the scheme name and builds the rule.
    ///
    /// # Errors
    ///
    /// Rejects unknown scheme names instead of falling back to a default.
    pub fn from_name(scheme: &str, f_up: f64, f_down: f64) -> BidResult<Self> {
        Self::new(scheme.parse()?, f_up, f_down)
    }

    /// Leg prices for one interval.
    ///
    /// | scheme    | system | surplus         | deficit         |
    /// |-----------|--------|-----------------|-----------------|
    /// | one-price | long   | f_down * spot   | f_down * spot   |
    /// | one-price | short  | f_up * spot     | f_up * spot     |
    /// | two-price | long   | f_down * spot   | spot            |
    /// | two-price | short  | spot            | f_up * spot     |
    pub fn prices(&self, spot: f64, state: SystemState) -> LegPrices {
        let down = self.f_down * spot;
        let up = self.f_up * spot;
        match (self.scheme, state) {
            (SettlementScheme::OnePrice, SystemState::Long) => LegPrices {
                surplus: down,
                deficit: down,
            },
            (SettlementScheme::OnePrice, SystemState::Short) => LegPrices {
                surplus: up,
                deficit: up,
            },
            (SettlementScheme::TwoPrice, SystemState::Long) => LegPrices {
                surplus: down,
                deficit: spot,
            },
            (SettlementScheme::TwoPrice, SystemState::Short) => LegPrices {
                surplus: spot,
                deficit: up,
            },
        }
    }

    /// Whether the legs at this spot price can be settled from the signed
    /// deviation alone: a surplus priced above the deficit would reward
    /// holding both legs at once.
    pub fn is_consistent(&self, spot: f64, state: SystemState) -> bool {
        let legs = self.prices(spot, state);
        legs.surplus <= legs.deficit
    }

    /// Day-ahead revenue plus imbalance settlement for one interval.
    pub fn interval_profit(&self, bid: f64, realised: f64, spot: f64, state: SystemState) -> Profit {
        let deviation = realised - bid;
        let day_ahead = bid * spot;
        let imbalance = self
            .prices(spot, state)
            .settle(deviation.max(0.0), (-deviation).max(0.0));
        Profit {
            day_ahead,
            imbalance,
        }
    }
}

/// Profit split into its day-ahead and imbalance components.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Profit {
    /// Bid times spot price.
    pub day_ahead: f64,
    /// Imbalance settlement cash flow (negative when charged).
    pub imbalance: f64,
}

impl Profit {
    /// Sum of both components.
    pub fn total(&self) -> f64 {
        self.day_ahead + self.imbalance
    }
}

impl AddAssign for Profit {
    fn add_assign(&mut self, rhs: Self) {
        self.day_ahead += rhs.day_ahead;
        self.imbalance += rhs.imbalance;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(scheme: SettlementScheme) -> SettlementRule {
        SettlementRule::new(scheme, 1.2, 0.8).expect("valid rule")
    }

    #[test]
    fn parses_known_schemes_and_rejects_others() {
        assert_eq!("one_price".parse::<SettlementScheme>().ok(), Some(SettlementScheme::OnePrice));
        assert_eq!("two_price".parse::<SettlementScheme>().ok(), Some(SettlementScheme::TwoPrice));
        let err = "three_price".parse::<SettlementScheme>().expect_err("unknown");
        assert!(err.is_config());
        assert!(err.to_string().contains("three_price"));
    }

    #[test]
    fn imbalance_sign_classification() {
        assert_eq!(SystemState::from_imbalance(0.0), SystemState::Long);
        assert_eq!(SystemState::from_imbalance(2.5), SystemState::Long);
        assert_eq!(SystemState::from_imbalance(-0.1), SystemState::Short);
    }

    #[test]
    fn one_price_uses_same_price_both_ways() {
        let r = rule(SettlementScheme::OnePrice);
        assert_eq!(r.prices(50.0, SystemState::Long), LegPrices { surplus: 40.0, deficit: 40.0 });
        assert_eq!(r.prices(50.0, SystemState::Short), LegPrices { surplus: 60.0, deficit: 60.0 });
    }

    #[test]
    fn two_price_settles_helpful_leg_at_spot() {
        let r = rule(SettlementScheme::TwoPrice);
        // long: surplus worsens the system, deficit helps
        assert_eq!(r.prices(50.0, SystemState::Long), LegPrices { surplus: 40.0, deficit: 50.0 });
        // short: surplus helps, deficit worsens
        assert_eq!(r.prices(50.0, SystemState::Short), LegPrices { surplus: 50.0, deficit: 60.0 });
    }

    #[test]
    fn interval_profit_signs() {
        let r = rule(SettlementScheme::TwoPrice);
        // produced 0.2 more than bid while system short: surplus paid at spot
        let p = r.interval_profit(0.5, 0.7, 50.0, SystemState::Short);
        assert!((p.day_ahead - 25.0).abs() < 1e-12);
        assert!((p.imbalance - 10.0).abs() < 1e-12);
        // produced 0.2 less than bid while system short: deficit charged at up price
        let p = r.interval_profit(0.5, 0.3, 50.0, SystemState::Short);
        assert!((p.imbalance + 12.0).abs() < 1e-12);
        assert!((p.total() - 13.0).abs() < 1e-12);
    }

    #[test]
    fn two_price_rejects_multipliers_that_invert_the_legs() {
        let err = SettlementRule::new(SettlementScheme::TwoPrice, 0.9, 0.8).expect_err("f_up < 1");
        assert!(err.to_string().contains("market.f_up"));
        let err = SettlementRule::new(SettlementScheme::TwoPrice, 1.2, 1.1).expect_err("f_down > 1");
        assert!(err.to_string().contains("market.f_down"));
        // one-price settles both legs at the same price, so any multiplier works
        assert!(SettlementRule::new(SettlementScheme::OnePrice, 0.9, 1.1).is_ok());
    }

    #[test]
    fn negative_spot_inverts_two_price_legs_only() {
        let two = rule(SettlementScheme::TwoPrice);
        assert!(two.is_consistent(50.0, SystemState::Long));
        assert!(two.is_consistent(0.0, SystemState::Short));
        assert!(!two.is_consistent(-10.0, SystemState::Long));
        assert!(!two.is_consistent(-10.0, SystemState::Short));
        let one = rule(SettlementScheme::OnePrice);
        assert!(one.is_consistent(-10.0, SystemState::Long));
        assert!(one.is_consistent(-10.0, SystemState::Short));
    }

    #[test]
    fn rejects_negative_multiplier() {
        assert!(SettlementRule::new(SettlementScheme::OnePrice, -1.0, 0.8).is_err());
        assert!(SettlementRule::from_name("bogus", 1.2, 0.8).is_err());
    }
}
